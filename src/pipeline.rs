//! Sequencing of preprocessing stages
//!
//! A pipeline threads an evolving [`PhraseSource`] through a list of stages,
//! each mapping one source to the next. Side effects are local to each stage
//! and the boundary between stages is always the file system: no stage may
//! assume in-memory record identity across stage boundaries.

use crate::{
    config::EngineOptions,
    engine, fs,
    hyphen::HyphenationJoiner,
    mapper::MapperChain,
    source::PhraseSource,
};
use anyhow::Context;
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};

/// One preprocessing stage, mapping a phrase source to its successor
pub enum Stage {
    /// Run a mapper chain through the engine into a fresh output directory
    Process {
        /// Output directory, which must be empty
        output: PathBuf,

        /// Mapper chain applied to every record
        mappers: MapperChain,

        /// Engine options for this stage
        options: EngineOptions,
    },

    /// Join hyphenated words in two corpus passes
    Hyphenation(HyphenationJoiner),

    /// Transfer ownership of all source files into a directory
    ///
    /// Files are renamed, never copied. Duplicate file names coming from
    /// combined sources are disambiguated with a counter prefix.
    MoveTo(PathBuf),

    /// Delete all source files and continue with an empty source
    Delete,
}
//
impl Stage {
    /// Apply this stage to a source
    pub async fn apply(&self, source: PhraseSource) -> crate::Result<PhraseSource> {
        match self {
            Self::Process {
                output,
                mappers,
                options,
            } => engine::process(&source, output, mappers, options).await,
            Self::Hyphenation(joiner) => joiner.apply(&source).await,
            Self::MoveTo(destination) => move_to(&source, destination).await,
            Self::Delete => delete(&source).await,
        }
    }
}

/// An ordered list of stages
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}
//
impl Pipeline {
    /// Start an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage
    pub fn add(&mut self, stage: Stage) -> &mut Self {
        self.stages.push(stage);
        self
    }

    /// Apply all stages left to right
    pub async fn run(&self, mut source: PhraseSource) -> crate::Result<PhraseSource> {
        for stage in &self.stages {
            source = stage.apply(source).await?;
        }
        Ok(source)
    }
}

/// Move all files of a source into a destination directory
async fn move_to(source: &PhraseSource, destination: &Path) -> crate::Result<PhraseSource> {
    log::info!("moving {source} to {}", destination.display());
    fs::create_empty_dir(destination).await?;

    let files = source.files()?;

    // Combined sources can contribute several files with the same name
    let mut names = FxHashSet::default();
    let contains_duplicate_names = files.iter().any(|file| {
        let name = file.path().file_name().map(|n| n.to_owned());
        !names.insert(name)
    });

    let mut moved = Vec::with_capacity(files.len());
    for (counter, file) in files.iter().enumerate() {
        let name = file
            .path()
            .file_name()
            .with_context(|| format!("moving nameless file {}", file.path().display()))?
            .to_string_lossy();
        let name = if contains_duplicate_names {
            format!("{counter}-{name}")
        } else {
            name.into_owned()
        };
        let target = destination.join(name);
        fs::move_file(file.path(), &target).await?;
        moved.push(file.with_path(target));
    }
    Ok(PhraseSource::from_files(moved))
}

/// Delete all files of a source
async fn delete(source: &PhraseSource) -> crate::Result<PhraseSource> {
    log::info!("deleting {source}");
    for file in source.files()? {
        tokio::fs::remove_file(file.path())
            .await
            .with_context(|| format!("deleting {}", file.path().display()))?;
    }
    Ok(PhraseSource::empty())
}
