//! Phrase/frequency records, the unit of data flowing through the engine

use crate::{Frequency, Phrase};
use anyhow::ensure;
use std::num::NonZeroU64;

/// A phrase together with its occurrence count
///
/// The phrase is guaranteed to be non-empty and the frequency to be positive.
/// No further normalization is guaranteed: raw corpus records may contain
/// arbitrary junk, and cleaning them up is what the mapper chain is for.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PhraseRecord {
    phrase: Phrase,
    frequency: Frequency,
}
//
impl PhraseRecord {
    /// Build a record, enforcing the type invariants
    pub fn new(phrase: impl Into<Phrase>, frequency: u64) -> crate::Result<Self> {
        let phrase = phrase.into();
        ensure!(!phrase.is_empty(), "a phrase cannot be the empty string");
        let frequency = NonZeroU64::new(frequency)
            .ok_or_else(|| anyhow::format_err!("a phrase frequency must be positive"))?;
        Ok(Self { phrase, frequency })
    }

    /// Build a record from parts that are already known to be valid
    pub(crate) fn from_parts(phrase: Phrase, frequency: Frequency) -> Self {
        debug_assert!(!phrase.is_empty(), "violated non-empty phrase invariant");
        Self { phrase, frequency }
    }

    /// Text of the phrase
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    /// Number of occurrences
    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Split the record into its parts
    pub fn into_parts(self) -> (Phrase, Frequency) {
        (self.phrase, self.frequency)
    }
}
