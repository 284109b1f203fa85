//! Corpus vocabulary extraction
//!
//! The vocabulary extractor is a read-only mapper: it never alters a phrase,
//! it only accumulates the maximum observed frequency of every word it sees.
//! Accumulation must be thread-safe because the engine runs the chain from
//! many worker tasks at once, and it must be order-independent because no
//! processing order is guaranteed; max-accumulation is associative and
//! commutative, so a sharded map with per-shard locking is enough.

use super::{Mapped, PhraseMapper};
use crate::Frequency;
use anyhow::Context;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use std::{hash::Hasher, path::Path, sync::Mutex};

/// Number of independently locked vocabulary shards
///
/// Sharding only has to keep unrelated worker tasks from serializing on one
/// lock, so a small fixed power of two is plenty.
const SHARD_COUNT: usize = 64;

/// Read-only mapper accumulating per-word maximum frequency
#[derive(Debug)]
pub struct VocabularyExtractor {
    shards: Box<[Mutex<FxHashMap<Box<str>, u64>>]>,
}
//
impl Default for VocabularyExtractor {
    fn default() -> Self {
        Self::new()
    }
}
//
impl VocabularyExtractor {
    /// Set up an empty accumulator
    pub fn new() -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| Mutex::new(FxHashMap::default()))
            .collect::<Vec<_>>();
        Self {
            shards: shards.into_boxed_slice(),
        }
    }

    /// Shard holding a given word
    fn shard_of(&self, word: &str) -> &Mutex<FxHashMap<Box<str>, u64>> {
        let mut hasher = FxHasher::default();
        hasher.write(word.as_bytes());
        &self.shards[(hasher.finish() % SHARD_COUNT as u64) as usize]
    }

    /// Drain the accumulated counts into a ranked vocabulary
    ///
    /// This empties the extractor, releasing the accumulation structures
    /// before the memory-hungry pass that consumes the vocabulary begins.
    pub fn drain(&self) -> Vocabulary {
        let mut pairs = Vec::new();
        for shard in self.shards.iter() {
            let mut map = shard.lock().expect("a vocabulary shard lock was poisoned");
            pairs.extend(std::mem::take(&mut *map));
        }
        Vocabulary::from_pairs(pairs)
    }
}
//
impl PhraseMapper for VocabularyExtractor {
    fn name(&self) -> &str {
        "vocabulary-extractor"
    }

    fn map<'p>(&self, phrase: &'p str, frequency: Frequency) -> Mapped<'p> {
        for word in phrase.split(' ') {
            let mut shard = self
                .shard_of(word)
                .lock()
                .expect("a vocabulary shard lock was poisoned");
            match shard.get_mut(word) {
                Some(max) => *max = (*max).max(frequency.get()),
                None => {
                    shard.insert(word.into(), frequency.get());
                }
            }
        }
        Mapped::unchanged(phrase)
    }
}

/// Ranked word list extracted from one corpus pass
///
/// Words are ordered by decreasing maximum frequency, ties broken
/// lexicographically. The vocabulary is read-only during the pass that
/// consumes it and discarded afterwards.
#[derive(Debug, Default)]
pub struct Vocabulary {
    ranked: Vec<(Box<str>, u64)>,
    index: FxHashSet<Box<str>>,
}
//
impl Vocabulary {
    /// Rank raw word/frequency pairs
    fn from_pairs(mut pairs: Vec<(Box<str>, u64)>) -> Self {
        pairs.par_sort_unstable_by(|(word_a, freq_a), (word_b, freq_b)| {
            freq_b.cmp(freq_a).then_with(|| word_a.cmp(word_b))
        });
        let index = pairs.iter().map(|(word, _freq)| word.clone()).collect();
        Self {
            ranked: pairs,
            index,
        }
    }

    /// Truth that a word was seen in the corpus
    pub fn contains(&self, word: &str) -> bool {
        self.index.contains(word)
    }

    /// The `k` most frequent words, most frequent first
    pub fn top_words(&self, k: usize) -> impl Iterator<Item = &str> {
        self.ranked.iter().take(k).map(|(word, _freq)| &**word)
    }

    /// Number of distinct words
    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    /// Truth that no word was seen
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Dump the ranked `word\tfrequency` pairs to a simple CSV file
    pub async fn write_pairs(&self, path: &Path) -> crate::Result<()> {
        let mut out = String::new();
        for (word, frequency) in &self.ranked {
            out.push_str(word);
            out.push('\t');
            out.push_str(&frequency.to_string());
            out.push('\n');
        }
        tokio::fs::write(path, out)
            .await
            .with_context(|| format!("writing vocabulary pairs to {}", path.display()))
    }

    /// Dump the ranked words to a plain word list, one per line
    pub async fn write_words(&self, path: &Path) -> crate::Result<()> {
        let mut out = String::new();
        for (word, _frequency) in &self.ranked {
            out.push_str(word);
            out.push('\n');
        }
        tokio::fs::write(path, out)
            .await
            .with_context(|| format!("writing vocabulary words to {}", path.display()))
    }
}
