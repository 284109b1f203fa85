//! Language profiles: named compositions of mapper chains and pipelines
//!
//! A profile is thin glue, it decides nothing interesting on its own: it
//! wires the standard mapper set, the language-specific mappers and the
//! pipeline stages together the way that language's corpora need.

use crate::{
    config::JobConfig,
    fs,
    hyphen::{english_join_mapper, HyphenationJoiner, Joiner},
    mapper::{contraction::ContractionMapper, standard, MapperChain, PhraseMapper},
    pipeline::{Pipeline, Stage},
};
use std::sync::Arc;

/// Word lists shipped with the binary
///
/// These are compiled in so a bare binary can process a corpus without a
/// data directory at its side.
const BLACKLIST: &str = include_str!("../data/blacklist.txt");
const SUPER_BLACKLIST: &str = include_str!("../data/super-blacklist.txt");
const CONTRACTIONS_EN: &str = include_str!("../data/contractions-en.txt");
const STOP_WORDS_DE: &str = include_str!("../data/stop-words-de.txt");

/// How many blacklisted words may be concatenated and still be blacklisted
const BLACKLIST_COMBINATIONS: usize = 4;

/// A language processing profile
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Language {
    /// English corpora
    English,

    /// German corpora
    German,

    /// Language-independent operations only
    ///
    /// Useful for converting between dataset formats, lower-casing or
    /// re-deduplicating an existing dataset.
    Agnostic,
}
//
impl Language {
    /// All profiles, with their human-readable names
    pub fn all() -> &'static [(&'static str, Language)] {
        &[
            ("English", Language::English),
            ("German", Language::German),
            ("Language-agnostic", Language::Agnostic),
        ]
    }

    /// Short identifier used on the command line
    pub fn id(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::German => "de",
            Self::Agnostic => "agnostic",
        }
    }

    /// Look a profile up by its short identifier
    pub fn from_id(id: &str) -> Option<Self> {
        Self::all()
            .iter()
            .map(|(_name, language)| *language)
            .find(|language| language.id() == id)
    }

    /// Process a corpus according to this profile
    pub async fn process(&self, job: &JobConfig) -> crate::Result<()> {
        match self {
            Self::English => english(job).await,
            Self::German => german(job).await,
            Self::Agnostic => agnostic(job).await,
        }
    }
}

/// The standard junk-removal and normalization mappers
///
/// The removal mappers come first so that obvious junk is dropped before any
/// phrase-altering work is spent on it; only then do the normalization
/// mappers rewrite what survived.
pub fn standard_mappers(job: &JobConfig) -> MapperChain {
    let mut mappers: MapperChain = vec![
        standard::remove_control_characters(),
        standard::super_blacklist(parse_word_list(SUPER_BLACKLIST)),
        standard::remove_google_web_markers(),
        standard::remove_html_entities(),
        standard::remove_urls_and_emails(),
        standard::remove_file_names(),
        standard::normalize_apostrophes(),
        standard::normalize_hyphens(),
        standard::explode_commas(),
        standard::remove_leading_double_quote(),
        standard::join_words_with_leading_apostrophe(),
        standard::blacklist(parse_word_list(BLACKLIST), BLACKLIST_COMBINATIONS),
    ];
    if let Some(max_n_gram) = job.max_n_gram {
        mappers.push(standard::max_n_gram(max_n_gram.get()));
    }
    if job.lowercase {
        mappers.push(standard::to_lower_case());
    }
    mappers
}

/// The bundled English contraction mapper
pub fn english_contractions() -> crate::Result<Arc<dyn PhraseMapper>> {
    Ok(Arc::new(ContractionMapper::new(parse_word_list(
        CONTRACTIONS_EN,
    ))?))
}

/// The bundled German stop word list
pub fn german_stop_words() -> Vec<&'static str> {
    parse_word_list(STOP_WORDS_DE)
}

/// English: standard mappers, hyphen joining, contraction resolution
async fn english(job: &JobConfig) -> crate::Result<()> {
    let temp = job.new_temp_dir("_temp")?;

    let mut mappers = standard_mappers(job);
    mappers.push(english_join_mapper());
    mappers.push(english_contractions()?);

    let mut pipeline = Pipeline::new();
    pipeline
        .add(Stage::Process {
            output: temp.clone(),
            mappers,
            options: job.engine_options(),
        })
        .add(Stage::MoveTo(job.output.clone()));

    let result = pipeline.run(job.source.clone()).await;
    fs::remove_tree(&temp).await?;
    result.map(drop)
}

/// German: standard mappers, then vocabulary-driven hyphenation joining
async fn german(job: &JobConfig) -> crate::Result<()> {
    let temp1 = job.new_temp_dir("_temp1")?;
    let temp2 = job.new_temp_dir("_temp2")?;

    let mut mappers = standard_mappers(job);
    mappers.push(english_contractions()?);

    // The first stage creates duplicates, so it always merges
    let mut stage_options = job.engine_options();
    stage_options.merge_duplicates = true;

    let mut pipeline = Pipeline::new();
    pipeline
        .add(Stage::Process {
            output: temp1.clone(),
            mappers,
            options: stage_options.clone(),
        })
        .add(Stage::Hyphenation(HyphenationJoiner::new(
            Joiner::german(german_stop_words()),
            temp2.clone(),
            stage_options,
        )))
        .add(Stage::MoveTo(job.output.clone()));

    let result = pipeline.run(job.source.clone()).await;
    fs::remove_tree(&temp1).await?;
    fs::remove_tree(&temp2).await?;
    result.map(drop)
}

/// Language-agnostic: only the configured size and case operations
async fn agnostic(job: &JobConfig) -> crate::Result<()> {
    let temp = job.new_temp_dir("_temp")?;

    let mut mappers = MapperChain::new();
    if let Some(max_n_gram) = job.max_n_gram {
        mappers.push(standard::max_n_gram(max_n_gram.get()));
    }
    if job.lowercase {
        mappers.push(standard::to_lower_case());
    }

    let mut pipeline = Pipeline::new();
    pipeline
        .add(Stage::Process {
            output: temp.clone(),
            mappers,
            options: job.engine_options(),
        })
        .add(Stage::MoveTo(job.output.clone()));

    let result = pipeline.run(job.source.clone()).await;
    fs::remove_tree(&temp).await?;
    result.map(drop)
}

/// Decode a bundled or user-provided word list
///
/// One word per line; blank lines and `#` comment lines are skipped.
pub fn parse_word_list(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_list_parsing() {
        let words = parse_word_list("# comment\nfoo\n\n  bar  \n#baz\n");
        assert_eq!(words, vec!["foo", "bar"]);
    }

    #[test]
    fn bundled_word_lists_are_sound() {
        assert!(!parse_word_list(BLACKLIST).is_empty());
        assert!(!parse_word_list(SUPER_BLACKLIST).is_empty());
        assert!(german_stop_words().contains(&"und"));
        english_contractions().expect("bundled contraction templates must compile");
    }

    #[test]
    fn profile_identifiers_round_trip() {
        for (_name, language) in Language::all() {
            assert_eq!(Language::from_id(language.id()), Some(*language));
        }
        assert_eq!(Language::from_id("tlh"), None);
    }
}
