//! Processing options shared by the preprocessing engine and its callers

use crate::{fs, source::PhraseSource};
use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

/// Default number of on-disk buckets used by merge-deduplication
///
/// Bucket count trades reduce-phase memory against split-phase I/O overhead.
/// It is a tuning knob, not derived from corpus statistics.
pub const DEFAULT_BUCKET_COUNT: usize = 1024;

/// Options of a single preprocessing engine run
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct EngineOptions {
    /// Maximum number of concurrently processed files or buckets
    pub parallel_degree: NonZeroUsize,

    /// Whether to merge duplicate phrases between and within files
    ///
    /// This is necessary whenever the input may contain duplicates, which
    /// includes the output of any phrase-altering mapper.
    pub merge_duplicates: bool,

    /// What to do with source files once they have been read
    pub delete_source: DeleteMode,

    /// Collect and print per-mapper statistics after the run
    ///
    /// Enabling this makes the run slower.
    pub verbose: bool,

    /// Number of on-disk buckets used by merge-deduplication
    pub bucket_count: NonZeroUsize,
}
//
impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            parallel_degree: NonZeroUsize::new(1).expect("1 is not zero"),
            merge_duplicates: false,
            delete_source: DeleteMode::None,
            verbose: false,
            bucket_count: NonZeroUsize::new(DEFAULT_BUCKET_COUNT).expect("1024 is not zero"),
        }
    }
}
/// Policy for deleting source files after they have been read
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum DeleteMode {
    /// No files will be deleted
    #[default]
    None,

    /// All files will be deleted at once after every file has been read
    Atomic,

    /// Each file will be deleted as soon as it has been fully processed
    Progressive,
}

/// Configuration of a whole language-profile processing job
///
/// This is the digested form of the CLI arguments, handed to a
/// [`Language`](crate::lang::Language) profile.
#[derive(Debug)]
pub struct JobConfig {
    /// Input corpus
    pub source: PhraseSource,

    /// Directory receiving the final output files
    pub output: PathBuf,

    /// Directory under which temporary trees are created
    ///
    /// Defaults to the parent of the output directory when unset, so that
    /// temporary trees never end up inside the output tree itself.
    pub temp: Option<PathBuf>,

    /// Maximum number of concurrently processed files
    pub parallel_degree: NonZeroUsize,

    /// Remove phrases with more than this many words
    pub max_n_gram: Option<NonZeroUsize>,

    /// Lower-case all phrases
    pub lowercase: bool,

    /// Merge duplicate phrases
    pub merge_duplicates: bool,

    /// Number of on-disk merge buckets
    pub bucket_count: NonZeroUsize,

    /// Print per-mapper statistics
    pub verbose: bool,
}
//
impl JobConfig {
    /// Engine options matching this job configuration
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            parallel_degree: self.parallel_degree,
            merge_duplicates: self.merge_duplicates,
            delete_source: DeleteMode::None,
            verbose: self.verbose,
            bucket_count: self.bucket_count,
        }
    }

    /// Directory under which profiles should create their temporary trees
    pub fn temp_root(&self) -> &Path {
        self.temp
            .as_deref()
            .or_else(|| self.output.parent())
            .unwrap_or_else(|| Path::new("."))
    }

    /// Path of a fresh temporary directory guaranteed not to exist yet
    pub fn new_temp_dir(&self, label: &str) -> crate::Result<PathBuf> {
        fs::unique_temp_dir(self.temp_root(), label)
    }
}
