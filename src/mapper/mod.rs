//! Per-record transforms and their composition into chains
//!
//! A [`PhraseMapper`] is a named, pure `(phrase, frequency) -> phrase`
//! transform that can also drop the record altogether. Mappers compose into
//! ordered chains; any mapper removing a record short-circuits the rest of
//! the chain for that record.

pub mod contraction;
pub mod matcher;
pub mod standard;
pub mod vocabulary;

use crate::Frequency;
use std::{
    borrow::Cow,
    fmt::Write as _,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

/// Outcome of applying one mapper to one record
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Mapped<'p> {
    /// The record survives, with a possibly rewritten phrase
    ///
    /// `Cow::Borrowed` is the common unchanged case and costs nothing.
    Kept(Cow<'p, str>),

    /// The record is dropped; later mappers in the chain never see it
    Removed,
}
//
impl<'p> Mapped<'p> {
    /// Keep the phrase as it was
    pub fn unchanged(phrase: &'p str) -> Self {
        Self::Kept(Cow::Borrowed(phrase))
    }

    /// Keep the record with a rewritten phrase
    pub fn rewritten(phrase: String) -> Self {
        Self::Kept(Cow::Owned(phrase))
    }
}

/// A named, pure per-record transform
///
/// Mappers are shared across worker tasks, so any internal state must be
/// thread-safe. Most mappers have none; the notable exception is the
/// vocabulary extractor, whose whole point is its accumulated state.
pub trait PhraseMapper: Send + Sync {
    /// Name of the mapper, for statistics and diagnostics
    fn name(&self) -> &str;

    /// Transform one record
    fn map<'p>(&self, phrase: &'p str, frequency: Frequency) -> Mapped<'p>;
}

/// Ordered list of mappers applied to every record
pub type MapperChain = Vec<Arc<dyn PhraseMapper>>;

/// Build a mapper from a name and a mapping function
pub fn named<F>(name: &'static str, map: F) -> Arc<dyn PhraseMapper>
where
    F: for<'p> Fn(&'p str, Frequency) -> Mapped<'p> + Send + Sync + 'static,
{
    Arc::new(FnMapper { name, map })
}

/// Mapper defined by a plain function
struct FnMapper<F> {
    name: &'static str,
    map: F,
}
//
impl<F> PhraseMapper for FnMapper<F>
where
    F: for<'p> Fn(&'p str, Frequency) -> Mapped<'p> + Send + Sync,
{
    fn name(&self) -> &str {
        self.name
    }

    fn map<'p>(&self, phrase: &'p str, frequency: Frequency) -> Mapped<'p> {
        (self.map)(phrase, frequency)
    }
}

/// Apply a full mapper chain to one record
///
/// Returns the surviving phrase, or `None` if some mapper removed the record
/// or rewrote it into the empty string. When statistics are provided, they
/// must have been created for this very chain.
pub fn apply_chain<'p>(
    mappers: &[Arc<dyn PhraseMapper>],
    stats: Option<&ChainStats>,
    phrase: &'p str,
    frequency: Frequency,
) -> Option<Cow<'p, str>> {
    if phrase.is_empty() {
        return None;
    }
    let mut current = Cow::Borrowed(phrase);
    for (index, mapper) in mappers.iter().enumerate() {
        let timer = stats.map(|_| Instant::now());
        // The mapper may return a slice of its input, so any rewrite must be
        // materialized before `current` can be overwritten
        let outcome = match mapper.map(&current, frequency) {
            Mapped::Removed => None,
            Mapped::Kept(Cow::Borrowed(s)) if s == &*current => Some(None),
            Mapped::Kept(kept) => Some(Some(kept.into_owned())),
        };
        if let (Some(stats), Some(timer)) = (stats, timer) {
            stats.mappers[index].record_nanos(timer.elapsed().as_nanos() as u64);
        }
        match outcome {
            None => {
                if let Some(stats) = stats {
                    stats.mappers[index].record_removed();
                }
                return None;
            }
            Some(None) => {
                if let Some(stats) = stats {
                    stats.mappers[index].record_unchanged();
                }
            }
            Some(Some(rewritten)) => {
                if rewritten.is_empty() {
                    if let Some(stats) = stats {
                        stats.mappers[index].record_removed();
                    }
                    return None;
                }
                let changed = rewritten != *current;
                if let Some(stats) = stats {
                    if changed {
                        stats.mappers[index].record_changed();
                    } else {
                        stats.mappers[index].record_unchanged();
                    }
                }
                if changed {
                    current = Cow::Owned(rewritten);
                }
            }
        }
    }
    Some(current)
}

/// Thread-safe per-mapper counters for one engine run
///
/// Counter updates are plain atomic additions, so any worker can record into
/// the same statistics without coordination.
#[derive(Debug)]
pub struct ChainStats {
    mappers: Vec<MapperStats>,
}
//
impl ChainStats {
    /// Set up counters for a mapper chain
    pub fn new(mappers: &[Arc<dyn PhraseMapper>]) -> Self {
        Self {
            mappers: mappers
                .iter()
                .map(|mapper| MapperStats::new(mapper.name().to_owned()))
                .collect(),
        }
    }

    /// Render the statistics report printed after a verbose run
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push('\n');
        for stats in &self.mappers {
            let total = stats.total.load(Ordering::Relaxed);
            let removed = stats.removed.load(Ordering::Relaxed);
            let changed = stats.changed.load(Ordering::Relaxed);
            let unchanged = stats.unchanged.load(Ordering::Relaxed);
            let nanos = stats.nanos.load(Ordering::Relaxed);
            writeln!(out, "Mapper: {}", stats.name).expect("writing to a String cannot fail");
            writeln!(out, "  total  : {total:>12}").expect("writing to a String cannot fail");
            if total > 0 {
                let percent = |part: u64| 100.0 * part as f64 / total as f64;
                writeln!(out, "  removed: {removed:>12} ({:.2}%)", percent(removed))
                    .expect("writing to a String cannot fail");
                writeln!(out, "  changed: {changed:>12} ({:.2}%)", percent(changed))
                    .expect("writing to a String cannot fail");
                writeln!(out, "  kept   : {unchanged:>12} ({:.2}%)", percent(unchanged))
                    .expect("writing to a String cannot fail");
                writeln!(out, "  time/phrase: {:.2}ns/p", nanos as f64 / total as f64)
                    .expect("writing to a String cannot fail");
            }
        }
        out.push('\n');
        out
    }
}

/// Counters for a single mapper of the chain
#[derive(Debug)]
struct MapperStats {
    name: String,
    total: AtomicU64,
    removed: AtomicU64,
    changed: AtomicU64,
    unchanged: AtomicU64,
    nanos: AtomicU64,
}
//
impl MapperStats {
    fn new(name: String) -> Self {
        Self {
            name,
            total: AtomicU64::new(0),
            removed: AtomicU64::new(0),
            changed: AtomicU64::new(0),
            unchanged: AtomicU64::new(0),
            nanos: AtomicU64::new(0),
        }
    }

    fn record_nanos(&self, nanos: u64) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    fn record_removed(&self) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_changed(&self) {
        self.changed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_unchanged(&self) {
        self.unchanged.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::num::NonZeroU64;

    /// Shorthand for running a mapper over a phrase with a fixed frequency
    pub(crate) fn map(mapper: &Arc<dyn PhraseMapper>, phrase: &str) -> Option<String> {
        match mapper.map(phrase, NonZeroU64::new(100).unwrap()) {
            Mapped::Kept(kept) => Some(kept.into_owned()),
            Mapped::Removed => None,
        }
    }

    /// Check a mapper against expected unchanged/removed/changed phrases
    pub(crate) fn check_mapper(
        mapper: &Arc<dyn PhraseMapper>,
        unchanged: &[&str],
        removed: &[&str],
        changed: &[(&str, &str)],
    ) {
        let name = mapper.name();
        for &phrase in unchanged {
            assert_eq!(
                map(mapper, phrase).as_deref(),
                Some(phrase),
                "expected {name} to keep {phrase:?} unchanged"
            );
        }
        for &phrase in removed {
            assert_eq!(
                map(mapper, phrase),
                None,
                "expected {name} to remove {phrase:?}"
            );
        }
        for &(from, to) in changed {
            assert_eq!(
                map(mapper, from).as_deref(),
                Some(to),
                "expected {name} to map {from:?} to {to:?}"
            );
        }
    }

    struct Suffixer;
    impl PhraseMapper for Suffixer {
        fn name(&self) -> &str {
            "suffixer"
        }
        fn map<'p>(&self, phrase: &'p str, _frequency: Frequency) -> Mapped<'p> {
            Mapped::rewritten(format!("{phrase}!"))
        }
    }

    #[test]
    fn chain_short_circuits_on_removal() {
        let chain: MapperChain = vec![
            named("remove-foo", |phrase, _freq| {
                if phrase.contains("foo") {
                    Mapped::Removed
                } else {
                    Mapped::unchanged(phrase)
                }
            }),
            Arc::new(Suffixer),
        ];
        let freq = NonZeroU64::new(1).unwrap();
        assert_eq!(apply_chain(&chain, None, "foo bar", freq), None);
        assert_eq!(
            apply_chain(&chain, None, "hello", freq).as_deref(),
            Some("hello!")
        );
        assert_eq!(apply_chain(&chain, None, "", freq), None);
    }

    #[test]
    fn stats_track_outcomes() {
        let chain: MapperChain = vec![named("drop-long", |phrase: &str, _freq| {
            if phrase.len() > 5 {
                Mapped::Removed
            } else {
                Mapped::unchanged(phrase)
            }
        })];
        let stats = ChainStats::new(&chain);
        let freq = NonZeroU64::new(1).unwrap();
        let _ = apply_chain(&chain, Some(&stats), "short", freq);
        let _ = apply_chain(&chain, Some(&stats), "much too long", freq);
        assert_eq!(stats.mappers[0].total.load(Ordering::Relaxed), 2);
        assert_eq!(stats.mappers[0].removed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.mappers[0].unchanged.load(Ordering::Relaxed), 1);
    }
}
