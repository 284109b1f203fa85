//! Sources of phrases: files, directories and combinations thereof

use crate::io::{BoxedInput, PhraseReader, ReaderKind};
use anyhow::{bail, Context};
use async_compression::tokio::bufread::{BzDecoder, GzipDecoder};
use std::{
    fmt,
    path::{Path, PathBuf},
};
use tokio::{fs::File, io::BufReader};
use unicase::UniCase;

/// Compression of an input file, detected from its extension
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Compression {
    /// Plain uncompressed text
    #[default]
    Plain,

    /// gzip-compressed text
    Gzip,

    /// bzip2-compressed text
    Bzip2,
}
//
impl Compression {
    /// Detect the compression of a file from its extension
    pub fn detect(path: &Path) -> crate::Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(UniCase::new);
        match extension {
            Some(ext) if ext == UniCase::new("gz") => Ok(Self::Gzip),
            Some(ext) if ext == UniCase::new("bz2") => Ok(Self::Bzip2),
            Some(ext) if ext == UniCase::new("zip") => bail!(
                "{} is a .zip container, which this tool does not open; \
                 extract the archive first",
                path.display()
            ),
            _ => Ok(Self::Plain),
        }
    }
}

/// One input file of a phrase source
///
/// A source file owns its path, its detected compression, and the reader
/// factory used to decode it.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SourceFile {
    path: PathBuf,
    compression: Compression,
    reader_kind: ReaderKind,
}
//
impl SourceFile {
    /// Describe an input file, detecting its compression from the extension
    pub fn new(path: impl Into<PathBuf>, reader_kind: ReaderKind) -> crate::Result<Self> {
        let path = path.into();
        let compression = Compression::detect(&path)?;
        Ok(Self {
            path,
            compression,
            reader_kind,
        })
    }

    /// Location of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reader factory associated with the file
    pub fn reader_kind(&self) -> ReaderKind {
        self.reader_kind
    }

    /// Rebind this file description to a new location
    pub(crate) fn with_path(&self, path: PathBuf) -> Self {
        Self {
            path,
            ..self.clone()
        }
    }

    /// Open the file and set up a phrase reader over its decompressed bytes
    pub async fn create_reader(&self) -> crate::Result<PhraseReader> {
        let file = File::open(&self.path)
            .await
            .with_context(|| format!("opening input file {}", self.path.display()))?;
        let raw = BufReader::new(file);
        let input: BoxedInput = match self.compression {
            Compression::Plain => Box::new(raw),
            Compression::Gzip => Box::new(BufReader::new(GzipDecoder::new(raw))),
            Compression::Bzip2 => Box::new(BufReader::new(BzDecoder::new(raw))),
        };
        Ok(self.reader_kind.create_reader(input))
    }
}
//
impl fmt::Display for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// A source of phrases: a directory of files, an explicit file list, or a
/// combination of other sources
///
/// Sources are created by discovery or composition, consumed by the engine,
/// and replaced by pipeline stages as the dataset moves through the pipeline.
#[derive(Clone, Debug)]
pub enum PhraseSource {
    /// All files under a directory, read with one reader factory
    Directory {
        /// Root of the directory tree
        path: PathBuf,

        /// Reader factory for every discovered file
        reader_kind: ReaderKind,
    },

    /// An explicit list of files
    Files(Vec<SourceFile>),

    /// The files of several other sources
    Combined(Vec<PhraseSource>),
}
//
impl PhraseSource {
    /// Source over all files under a directory, in the simple CSV format
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::directory_with_reader(path, ReaderKind::SimpleCsv)
    }

    /// Source over all files under a directory, with a chosen reader factory
    pub fn directory_with_reader(path: impl Into<PathBuf>, reader_kind: ReaderKind) -> Self {
        Self::Directory {
            path: path.into(),
            reader_kind,
        }
    }

    /// Source over an explicit list of files
    pub fn from_files(files: Vec<SourceFile>) -> Self {
        Self::Files(files)
    }

    /// Source which contains the files of all the given sources
    pub fn combine(sources: impl IntoIterator<Item = PhraseSource>) -> Self {
        Self::Combined(sources.into_iter().collect())
    }

    /// Source without any files
    pub fn empty() -> Self {
        Self::Files(Vec::new())
    }

    /// Enumerate the files of this source
    ///
    /// Directory sources are walked recursively at this point, so the same
    /// source enumerated twice can see different files if the directory
    /// changed in between. The engine enumerates exactly once per phase.
    pub fn files(&self) -> crate::Result<Vec<SourceFile>> {
        let mut files = Vec::new();
        self.collect_files(&mut files)?;
        Ok(files)
    }

    fn collect_files(&self, files: &mut Vec<SourceFile>) -> crate::Result<()> {
        match self {
            Self::Directory { path, reader_kind } => {
                anyhow::ensure!(
                    path.is_dir(),
                    "phrase source {} is not a directory",
                    path.display()
                );
                let mut discovered = Vec::new();
                walk_dir(path, &mut discovered)
                    .with_context(|| format!("walking phrase source {}", path.display()))?;
                // Deterministic processing order across runs
                discovered.sort_unstable();
                for path in discovered {
                    files.push(SourceFile::new(path, *reader_kind)?);
                }
                Ok(())
            }
            Self::Files(list) => {
                files.extend(list.iter().cloned());
                Ok(())
            }
            Self::Combined(sources) => {
                for source in sources {
                    source.collect_files(files)?;
                }
                Ok(())
            }
        }
    }
}
//
impl fmt::Display for PhraseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory { path, .. } => write!(f, "{}", path.display()),
            Self::Files(files) => {
                for (i, file) in files.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{file}")?;
                }
                Ok(())
            }
            Self::Combined(sources) => {
                for (i, source) in sources.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{source}")?;
                }
                Ok(())
            }
        }
    }
}

/// Recursively enumerate the files under a directory
fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            walk_dir(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_compression_from_extension() {
        let detect = |name: &str| Compression::detect(Path::new(name));
        assert_eq!(detect("corpus.csv").unwrap(), Compression::Plain);
        assert_eq!(detect("corpus.txt").unwrap(), Compression::Plain);
        assert_eq!(detect("corpus.csv.gz").unwrap(), Compression::Gzip);
        assert_eq!(detect("corpus.CSV.GZ").unwrap(), Compression::Gzip);
        assert_eq!(detect("corpus.csv.bz2").unwrap(), Compression::Bzip2);
        assert!(detect("corpus.zip").is_err());
    }

    #[test]
    fn combined_sources_concatenate_files() {
        let file = |name: &str| SourceFile::new(name, ReaderKind::SimpleCsv).unwrap();
        let first = PhraseSource::from_files(vec![file("a.csv"), file("b.csv")]);
        let second = PhraseSource::from_files(vec![file("c.csv")]);
        let combined = PhraseSource::combine([first, second]);
        let names = combined
            .files()
            .unwrap()
            .into_iter()
            .map(|f| f.path().display().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a.csv", "b.csv", "c.csv"]);
    }

    #[test]
    fn directory_walk_is_recursive_and_sorted() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("nested")).unwrap();
        std::fs::write(root.path().join("b.csv"), "x\t1\n").unwrap();
        std::fs::write(root.path().join("nested/a.csv"), "y\t1\n").unwrap();
        let source = PhraseSource::directory(root.path());
        let files = source.files().unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].path().ends_with("b.csv"));
        assert!(files[1].path().ends_with("nested/a.csv"));
    }
}
