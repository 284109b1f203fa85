//! Readers and writers for the phrase file formats
//!
//! All corpus input funnels through [`PhraseReader`], which yields one
//! [`PhraseRecord`](crate::record::PhraseRecord) at a time regardless of the
//! underlying format. All output is written through [`SimpleCsvWriter`] in
//! the simple CSV format understood by the downstream index builder.

pub mod books;
pub mod simple;
pub mod split;

use crate::record::PhraseRecord;
use books::GoogleBooksCsvReader;
use simple::SimpleCsvReader;
use tokio::io::AsyncBufRead;

/// Buffered byte input of a phrase reader, after decompression
pub type BoxedInput = Box<dyn AsyncBufRead + Send + Unpin>;

/// Factory for phrase readers, chosen once per phrase source
///
/// This is a closed set: a distributed driver reusing the mapper chain only
/// has to know how to construct these two readers to preserve the engine's
/// reduction semantics.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ReaderKind {
    /// One `phrase\tfrequency` record per line
    #[default]
    SimpleCsv,

    /// Google Books n-gram files, with per-year lines aggregated per phrase
    GoogleBooksCsv,
}
//
impl ReaderKind {
    /// Construct a reader over decompressed input bytes
    pub fn create_reader(self, input: BoxedInput) -> PhraseReader {
        match self {
            Self::SimpleCsv => PhraseReader::Simple(SimpleCsvReader::new(input)),
            Self::GoogleBooksCsv => PhraseReader::GoogleBooks(GoogleBooksCsvReader::new(input)),
        }
    }
}

/// A reader yielding one phrase-frequency record at a time
pub enum PhraseReader {
    /// Reader for simple CSV files
    Simple(SimpleCsvReader),

    /// Reader for Google Books CSV files
    GoogleBooks(GoogleBooksCsvReader),
}
//
impl PhraseReader {
    /// Next record, or `None` once the input is exhausted
    ///
    /// Malformed lines are skipped, I/O errors abort the file.
    pub async fn next_record(&mut self) -> crate::Result<Option<PhraseRecord>> {
        match self {
            Self::Simple(reader) => reader.next_record().await,
            Self::GoogleBooks(reader) => reader.next_record().await,
        }
    }
}

pub use simple::SimpleCsvWriter;
pub use split::BucketWriter;
