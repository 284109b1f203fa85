//! Google Books n-gram CSV files
//!
//! These files are a bit tricky to read because the n-grams are also split by
//! year, so the same phrase appears on many consecutive lines:
//!
//! ```text
//! collision such	2000	4	4	4
//! collision such	2001	6	6	6
//! collision such	2002	6	6	6
//! ```
//!
//! Files are sorted by phrase and then by year, so this reader aggregates all
//! consecutive lines about one phrase into a single record whose frequency is
//! the summed match count. Unparseable lines are skipped, not fatal: these
//! dumps are large, old and occasionally scruffy, and one bad line should not
//! discard a multi-gigabyte file.

use super::BoxedInput;
use crate::{record::PhraseRecord, Phrase};
use anyhow::Context;
use csv_async::AsyncReaderBuilder;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::pin::Pin;

/// Entry from a Google Books data file
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq)]
struct BooksEntry {
    /// Phrase whose usage is being recorded
    phrase: String,

    /// Year on which the data was recorded
    year: i16,

    /// Number of recorded occurrences over that year
    match_count: u64,

    /// Number of distinct pages with occurrences
    page_count: u64,

    /// Number of distinct books with occurrences
    volume_count: u64,
}

/// Reader for Google Books CSV files
pub struct GoogleBooksCsvReader {
    /// Decoded entries, one per input line
    entries: Pin<Box<dyn Stream<Item = Result<BooksEntry, csv_async::Error>> + Send>>,

    /// Phrase currently being aggregated, with its frequency so far
    current: Option<(Phrase, u64)>,
}
//
impl GoogleBooksCsvReader {
    /// Wrap decompressed input bytes
    pub fn new(input: BoxedInput) -> Self {
        let entries = AsyncReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .quoting(false)
            .flexible(true)
            .create_deserializer(input)
            .into_deserialize::<BooksEntry>();
        Self {
            entries: Box::pin(entries),
            current: None,
        }
    }

    /// Next aggregated record, or `None` at end of input
    pub async fn next_record(&mut self) -> crate::Result<Option<PhraseRecord>> {
        loop {
            let entry = match self.entries.next().await {
                Some(Ok(entry)) => entry,
                Some(Err(e)) if is_io_error(&e) => {
                    return Err(e).context("reading a Google Books CSV line")
                }
                Some(Err(e)) => {
                    log::warn!("skipping unparseable Google Books CSV line: {e}");
                    continue;
                }
                None => return Ok(self.take_current()),
            };

            // Phrases sometimes carry stray surrounding whitespace
            let phrase = entry.phrase.trim();
            if phrase.is_empty() || entry.match_count == 0 {
                log::trace!("skipping degenerate Google Books entry {entry:?}");
                continue;
            }

            // Merge consecutive same-phrase lines, emit on phrase change
            match &mut self.current {
                Some((current, frequency)) if &**current == phrase => {
                    *frequency = frequency
                        .checked_add(entry.match_count)
                        .expect("overflow while summing phrase frequencies");
                }
                _ => {
                    let previous = self.take_current();
                    self.current = Some((phrase.into(), entry.match_count));
                    if previous.is_some() {
                        return Ok(previous);
                    }
                }
            }
        }
    }

    /// Turn the aggregation in progress into a finished record
    fn take_current(&mut self) -> Option<PhraseRecord> {
        self.current.take().map(|(phrase, frequency)| {
            let frequency = std::num::NonZeroU64::new(frequency)
                .expect("aggregated frequencies come from positive match counts");
            PhraseRecord::from_parts(phrase, frequency)
        })
    }
}

/// Truth that a CSV-layer error is actually an I/O error
///
/// I/O errors abort the file, anything else only costs the affected line.
fn is_io_error(error: &csv_async::Error) -> bool {
    matches!(error.kind(), csv_async::ErrorKind::Io(_))
}
