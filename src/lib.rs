//! Preprocessing engine for raw n-gram corpora (Google Books n-grams or
//! simple tab-separated phrase/frequency files), turning them into a
//! normalized, deduplicated phrase-frequency dataset for a downstream
//! phrase-search index builder.

pub mod config;
pub mod engine;
pub mod fs;
pub mod hyphen;
pub mod io;
pub mod lang;
pub mod mapper;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod source;

/// Use anyhow for Result type erasure
pub use anyhow::Result;

pub use config::{DeleteMode, EngineOptions};
pub use record::PhraseRecord;
pub use source::PhraseSource;

/// A phrase is a non-empty sequence of words joined by single spaces
pub type Phrase = Box<str>;

/// Number of occurrences of a phrase in the corpus
///
/// Frequencies are summed across an entire corpus during deduplication, and
/// a single Google Books 1-gram can already exceed the billions, so nothing
/// smaller than 64 bits would be safe.
pub type Frequency = std::num::NonZeroU64;

/// Addition operator for frequencies
pub fn add_frequencies(x: Frequency, y: Frequency) -> Frequency {
    x.checked_add(y.get())
        .expect("overflow while summing phrase frequencies")
}
