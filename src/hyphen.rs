//! Joining of hyphenated words, in two corpus passes
//!
//! N-gram corpora split hyphenated compounds in inconsistent ways (`"co-
//! operation"` as `"co- operation"`, `"foo - bar"`, ...). Whether two word
//! halves should be fused back together is a language-specific decision, and
//! for German it additionally needs to know which fused words actually exist,
//! so the joiner runs in two sequential passes over the whole corpus:
//!
//! 1. A read-only vocabulary pass accumulates per-word maximum frequencies
//!    (skipped for joiners that declare no vocabulary requirement).
//! 2. The join pass runs the language-specific joiner mapper over every
//!    record into the final output. Joining creates duplicates, so this pass
//!    forces merge-deduplication, and the intermediate sources are deleted
//!    progressively.

use crate::{
    config::{DeleteMode, EngineOptions},
    engine,
    mapper::{
        vocabulary::{Vocabulary, VocabularyExtractor},
        Mapped, PhraseMapper,
    },
    source::PhraseSource,
    Frequency,
};
use anyhow::Context;
use rustc_hash::FxHashSet;
use std::{
    io::Write as _,
    path::PathBuf,
    sync::{Arc, Mutex},
};

/// Number of top vocabulary words treated as stop words by default
const DEFAULT_STOP_WORDS_TOP_K: usize = 100;

/// Language-specific joining strategy
///
/// This is a closed set, picked at configuration time.
#[derive(Clone, Debug)]
pub enum Joiner {
    /// German joining: fuse word pairs only when the fused word is known
    /// from the corpus vocabulary and the second half is not a stop word
    German {
        /// Configured stop word list, merged with the top vocabulary words
        stop_word_list: Vec<Box<str>>,

        /// How many top vocabulary words become stop words
        stop_words_top_k: usize,
    },

    /// English joining: purely positional, no vocabulary needed
    English,
}
//
impl Joiner {
    /// German joiner with a configured stop word list
    pub fn german(stop_word_list: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self::German {
            stop_word_list: stop_word_list
                .into_iter()
                .map(|w| w.as_ref().into())
                .collect(),
            stop_words_top_k: DEFAULT_STOP_WORDS_TOP_K,
        }
    }

    /// Truth that this joiner needs the vocabulary pass
    fn requires_vocabulary(&self) -> bool {
        match self {
            Self::German { .. } => true,
            Self::English => false,
        }
    }
}

/// Two-phase hyphenation joining over a whole corpus
pub struct HyphenationJoiner {
    joiner: Joiner,
    output: PathBuf,
    options: EngineOptions,
    log_file: Option<PathBuf>,
}
//
impl HyphenationJoiner {
    /// Configure a joiner writing its result to `output`
    pub fn new(joiner: Joiner, output: impl Into<PathBuf>, options: EngineOptions) -> Self {
        Self {
            joiner,
            output: output.into(),
            options,
            log_file: None,
        }
    }

    /// Also record every join decision into a log file, one line each
    ///
    /// Lines have the form `{action}: {result}: {phrase}`, where the actions
    /// are joiner-specific (`Normalize`, `Full join`, `Stop word`, `Join`).
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Run both passes and return a source over the joined output
    pub async fn apply(&self, source: &PhraseSource) -> crate::Result<PhraseSource> {
        // Pass 1: vocabulary
        let vocabulary = if self.joiner.requires_vocabulary() {
            log::info!("extracting vocabulary");
            let extractor = Arc::new(VocabularyExtractor::new());
            let chain = vec![extractor.clone() as Arc<dyn PhraseMapper>];
            engine::iterate(source, &chain, &self.options).await?;

            // Both passes scan the whole corpus; release the accumulation
            // structures before the join pass starts allocating
            let vocabulary = extractor.drain();
            drop(extractor);
            Some(vocabulary)
        } else {
            None
        };

        let log = match &self.log_file {
            Some(path) => Some(Arc::new(DecisionLog::create(path.clone())?)),
            None => None,
        };

        let mapper: Arc<dyn PhraseMapper> = match &self.joiner {
            Joiner::German {
                stop_word_list,
                stop_words_top_k,
            } => {
                let vocabulary = vocabulary
                    .expect("the German joiner declares a vocabulary requirement");
                let mut stop_words: FxHashSet<Box<str>> =
                    stop_word_list.iter().cloned().collect();
                stop_words.extend(
                    vocabulary
                        .top_words(*stop_words_top_k)
                        .map(Box::<str>::from),
                );
                Arc::new(GermanJoinMapper {
                    vocabulary,
                    stop_words,
                    log: log.clone(),
                })
            }
            Joiner::English => Arc::new(EnglishJoinMapper { log: log.clone() }),
        };

        // Pass 2: join. Joining creates duplicates, and the inputs of this
        // pass are intermediate files nobody needs afterwards.
        log::info!("joining hyphenated words");
        let mut join_options = self.options.clone();
        join_options.merge_duplicates = true;
        join_options.delete_source = DeleteMode::Progressive;
        let chain = vec![mapper];
        let result = engine::process(source, &self.output, &chain, &join_options).await?;

        if let Some(log) = &log {
            log.finish()?;
        }
        Ok(result)
    }
}

/// German joiner mapper
///
/// Per phrase: isolated `-` tokens are fused onto the preceding word, then
/// every adjacent pair `word-`/`next` is glued together. The pair becomes
/// the vocabulary word `word[..-1] + next` when that word exists, `next`
/// starts lowercase and `next` is not a stop word (full join, hyphen
/// dropped); in every other case it becomes the plain concatenation
/// `word + next`, keeping the hyphen that is already present.
struct GermanJoinMapper {
    vocabulary: Vocabulary,
    stop_words: FxHashSet<Box<str>>,
    log: Option<Arc<DecisionLog>>,
}
//
impl GermanJoinMapper {
    /// Fuse isolated `-` tokens onto the preceding word
    fn normalize_hyphens(&self, words: Vec<String>, phrase: &str) -> Vec<String> {
        if words.len() < 2 || !words.iter().skip(1).any(|w| w == "-") {
            return words;
        }
        let mut normalized: Vec<String> = Vec::with_capacity(words.len());
        let mut words = words.into_iter();
        normalized.push(words.next().expect("checked to have at least two words"));
        for word in words {
            if word == "-" {
                normalized
                    .last_mut()
                    .expect("starts with one word")
                    .push('-');
            } else {
                normalized.push(word);
            }
        }
        if let Some(log) = &self.log {
            log.record(format_args!(
                "Normalize: {}: {phrase}",
                normalized.join(" ")
            ));
        }
        normalized
    }

    /// Join adjacent `word-`/`next` pairs
    fn join_hyphens(&self, words: Vec<String>, phrase: &str) -> Vec<String> {
        let mut words: Vec<Option<String>> = words.into_iter().map(Some).collect();
        for i in 0..words.len().saturating_sub(1) {
            let Some(word) = words[i].clone() else {
                continue;
            };
            if word.len() <= 1 || !word.ends_with('-') {
                continue;
            }
            let Some(next) = words[i + 1].clone() else {
                continue;
            };

            // A stop word after the hyphen blocks the full join: frequent
            // little words fuse into existing vocabulary words far too often
            if self.stop_words.contains(next.as_str()) {
                if let Some(log) = &self.log {
                    log.record(format_args!("Stop word: {next}: {phrase}"));
                }
                words[i] = None;
                words[i + 1] = Some(format!("{word}{next}"));
                continue;
            }

            let mut joined = None;
            if next.chars().next().is_some_and(char::is_lowercase) {
                let fused = format!("{}{next}", &word[..word.len() - 1]);
                if self.vocabulary.contains(&fused) {
                    if let Some(log) = &self.log {
                        log.record(format_args!("Full join: {fused}: {phrase}"));
                    }
                    joined = Some(fused);
                }
            }

            words[i] = None;
            words[i + 1] = Some(joined.unwrap_or_else(|| format!("{word}{next}")));
        }
        words.into_iter().flatten().collect()
    }
}
//
impl PhraseMapper for GermanJoinMapper {
    fn name(&self) -> &str {
        "german-hyphenation-joiner"
    }

    fn map<'p>(&self, phrase: &'p str, _frequency: Frequency) -> Mapped<'p> {
        if !phrase.contains('-') {
            return Mapped::unchanged(phrase);
        }
        let words = phrase.split(' ').map(String::from).collect::<Vec<_>>();
        let words = self.normalize_hyphens(words, phrase);
        let words = self.join_hyphens(words, phrase);
        let result = words.join(" ");
        if result == phrase {
            Mapped::unchanged(phrase)
        } else {
            Mapped::rewritten(result)
        }
    }
}

/// The English joiner as a plain chain mapper
///
/// English joining needs no vocabulary pass, so it can also run as one more
/// mapper inside a standard chain instead of as a separate pipeline stage.
pub fn english_join_mapper() -> Arc<dyn PhraseMapper> {
    Arc::new(EnglishJoinMapper { log: None })
}

/// English joiner mapper
///
/// Dropping phrases that start or end with a bare `-` token removes the
/// transitive sub-n-grams of phrases joined elsewhere. The remaining
/// `"foo - bar"` and `"foo- bar"` spellings are joined to `"foo-bar"`,
/// except ahead of "and"/"or", which guards compound lists like
/// "pre- and post-war".
struct EnglishJoinMapper {
    log: Option<Arc<DecisionLog>>,
}
//
impl EnglishJoinMapper {
    /// Join `word- next` pairs
    fn join_word_pairs(phrase: &str) -> String {
        let words = phrase.split(' ').collect::<Vec<_>>();
        let mut out: Vec<String> = Vec::with_capacity(words.len());
        for word in words {
            if let Some(previous) = out.last() {
                let joinable_left = previous.len() > 1
                    && previous.ends_with('-')
                    && previous[..previous.len() - 1]
                        .ends_with(|c: char| c.is_ascii_alphabetic());
                let joinable_right =
                    word.starts_with(|c: char| c.is_ascii_alphabetic()) && !and_or_guard(word);
                if joinable_left && joinable_right {
                    out.last_mut()
                        .expect("just peeked at the last word")
                        .push_str(word);
                    continue;
                }
            }
            out.push(word.to_owned());
        }
        out.join(" ")
    }
}
//
impl PhraseMapper for EnglishJoinMapper {
    fn name(&self) -> &str {
        "english-hyphenation-joiner"
    }

    fn map<'p>(&self, phrase: &'p str, _frequency: Frequency) -> Mapped<'p> {
        if !phrase.contains('-') {
            return Mapped::unchanged(phrase);
        }

        // The corpus contains the transitive sub-n-grams of every phrase, so
        // the halves of "foo - bar" also show up as "foo -" and "- bar";
        // those fragments cannot be joined and would survive as junk
        if phrase == "-" || phrase.starts_with("- ") || phrase.ends_with(" -") {
            return Mapped::Removed;
        }

        let mut joined = phrase.replace(" - ", "-");
        joined = Self::join_word_pairs(&joined);

        if joined == phrase {
            Mapped::unchanged(phrase)
        } else {
            if let Some(log) = &self.log {
                log.record(format_args!("Join: {joined}: {phrase}"));
            }
            Mapped::rewritten(joined)
        }
    }
}

/// Truth that a word is the "and"/"or" of a compound list
fn and_or_guard(word: &str) -> bool {
    for head in ["and", "or"] {
        if word.len() >= head.len() && word[..head.len()].eq_ignore_ascii_case(head) {
            let tail = &word[head.len()..];
            if !tail.starts_with(|c: char| c.is_ascii_alphabetic()) {
                return true;
            }
        }
    }
    false
}

/// Append-only decision log shared by all worker tasks
struct DecisionLog {
    out: Mutex<std::io::BufWriter<std::fs::File>>,
}
//
impl DecisionLog {
    fn create(path: PathBuf) -> crate::Result<Self> {
        let file = std::fs::File::create(&path)
            .with_context(|| format!("creating join log file {}", path.display()))?;
        Ok(Self {
            out: Mutex::new(std::io::BufWriter::new(file)),
        })
    }

    /// Record one decision; logging failures must not fail the join
    fn record(&self, line: std::fmt::Arguments<'_>) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{line}");
        }
    }

    fn finish(&self) -> crate::Result<()> {
        let mut out = self.out.lock().expect("the join log lock was poisoned");
        out.flush().context("flushing the join log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU64;

    fn map(mapper: &dyn PhraseMapper, phrase: &str) -> Option<String> {
        match mapper.map(phrase, NonZeroU64::new(100).unwrap()) {
            Mapped::Kept(kept) => Some(kept.into_owned()),
            Mapped::Removed => None,
        }
    }

    fn german() -> GermanJoinMapper {
        let extractor = VocabularyExtractor::new();
        for word in ["cooperation", "operation", "Zeitung", "zeitungsartikel"] {
            extractor.map(word, NonZeroU64::new(10).unwrap());
        }
        GermanJoinMapper {
            vocabulary: extractor.drain(),
            stop_words: ["und", "oder"].iter().map(|&w| w.into()).collect(),
            log: None,
        }
    }

    #[test]
    fn german_full_join_through_vocabulary() {
        let mapper = german();
        // "cooperation" is in the vocabulary, so the hyphen is dropped
        assert_eq!(map(&mapper, "co- operation").as_deref(), Some("cooperation"));
        // "co-und" stays hyphenated because "und" is a stop word
        assert_eq!(map(&mapper, "co- und").as_deref(), Some("co-und"));
    }

    #[test]
    fn german_plain_concatenation_keeps_hyphen() {
        let mapper = german();
        assert_eq!(map(&mapper, "xyz- abc").as_deref(), Some("xyz-abc"));
        // Capitalized second halves are never fully joined
        assert_eq!(map(&mapper, "zeitungs- Artikel").as_deref(), Some("zeitungs-Artikel"));
    }

    #[test]
    fn german_stop_word_blocks_full_join() {
        let extractor = VocabularyExtractor::new();
        extractor.map("cooperation", NonZeroU64::new(10).unwrap());
        let mapper = GermanJoinMapper {
            vocabulary: extractor.drain(),
            stop_words: ["operation"].iter().map(|&w| w.into()).collect(),
            log: None,
        };
        // "cooperation" is in the vocabulary, but "operation" being a stop
        // word keeps the hyphen
        assert_eq!(map(&mapper, "co- operation").as_deref(), Some("co-operation"));
    }

    #[test]
    fn german_normalizes_isolated_hyphens() {
        let mapper = german();
        assert_eq!(map(&mapper, "co - operation").as_deref(), Some("cooperation"));
        // A leading isolated hyphen has no preceding word and stays
        assert_eq!(map(&mapper, "- foo").as_deref(), Some("- foo"));
    }

    #[test]
    fn german_leaves_unhyphenated_phrases_alone() {
        let mapper = german();
        assert_eq!(map(&mapper, "keine Bindestriche").as_deref(), Some("keine Bindestriche"));
    }

    #[test]
    fn english_joins_isolated_and_trailing_hyphens() {
        let mapper = EnglishJoinMapper { log: None };
        assert_eq!(map(&mapper, "foo - bar").as_deref(), Some("foo-bar"));
        assert_eq!(map(&mapper, "foo- bar").as_deref(), Some("foo-bar"));
        assert_eq!(map(&mapper, "foo-bar").as_deref(), Some("foo-bar"));
    }

    #[test]
    fn english_drops_bare_hyphen_fragments() {
        let mapper = EnglishJoinMapper { log: None };
        assert_eq!(map(&mapper, "- bar"), None);
        assert_eq!(map(&mapper, "foo -"), None);
        assert_eq!(map(&mapper, "-"), None);
    }

    #[test]
    fn english_guards_compound_lists() {
        let mapper = EnglishJoinMapper { log: None };
        assert_eq!(
            map(&mapper, "pre- and post-war").as_deref(),
            Some("pre- and post-war")
        );
        assert_eq!(
            map(&mapper, "pre- or post-war").as_deref(),
            Some("pre- or post-war")
        );
        // "android" is not a list conjunction
        assert_eq!(map(&mapper, "pre- android").as_deref(), Some("pre-android"));
    }
}
