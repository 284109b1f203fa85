//! Command-line driver turning raw n-gram corpora into the normalized,
//! deduplicated phrase dataset consumed by the phrase-search index builder.

use anyhow::Context;
use clap::Parser;
use dialoguer::FuzzySelect;
use log::LevelFilter;
use phrase_mill::{
    config::{JobConfig, DEFAULT_BUCKET_COUNT},
    io::ReaderKind,
    lang::Language,
    source::PhraseSource,
    Result,
};
use std::{num::NonZeroUsize, path::PathBuf};
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

/// Preprocess raw n-gram corpora into a phrase-frequency dataset
///
/// Reads one or more corpus directories, applies the selected language
/// profile, and leaves a deduplicated set of simple CSV files in the output
/// directory, ready for the index builder.
#[derive(Parser, Debug)]
#[command(version, author)]
struct Args {
    /// Short name of the language profile to apply, e.g. "en"
    ///
    /// Will interactively prompt for a supported profile if not specified.
    #[arg(short, long, default_value = None)]
    language: Option<String>,

    /// Input corpus directories
    ///
    /// Every file below these directories is processed. Plain, .gz and .bz2
    /// files are decompressed on the fly based on their extension.
    #[arg(short, long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Directory receiving the final output files
    ///
    /// Must be empty or absent; refusing to mix fresh output with leftovers
    /// of an earlier run is what keeps reruns restartable.
    #[arg(short, long)]
    output: PathBuf,

    /// Directory for temporary trees
    ///
    /// Intermediate pipeline stages can temporarily hold a whole corpus
    /// copy, so point this at a volume with enough room. Defaults to the
    /// parent of the output directory.
    #[arg(long, default_value = None)]
    temp: Option<PathBuf>,

    /// Input file format
    #[arg(short, long, value_enum, default_value = "simple-csv")]
    format: InputFormat,

    /// Maximum number of concurrently processed files
    ///
    /// Work is split at whole-file granularity, so parallelism beyond the
    /// number of input files buys nothing.
    #[arg(short, long, default_value = "1")]
    parallel_degree: NonZeroUsize,

    /// Remove phrases with more than this many words
    #[arg(short = 'n', long, default_value = None)]
    max_n_gram: Option<NonZeroUsize>,

    /// Lower-case all phrases
    #[arg(long)]
    lowercase: bool,

    /// Keep duplicate phrases instead of merging them
    ///
    /// Only sound when no mapper of the selected profile rewrites phrases;
    /// profiles that require merging will merge regardless.
    #[arg(long)]
    keep_duplicates: bool,

    /// Number of on-disk buckets used by merge-deduplication
    ///
    /// More buckets reduce the peak memory of the merge phase at the cost of
    /// more open files and more I/O overhead during the split phase. The
    /// default suits corpora up to a few hundred gigabytes.
    #[arg(long, default_value_t = DEFAULT_BUCKET_COUNT)]
    bucket_count: usize,

    /// Print per-mapper statistics after each processing stage
    #[arg(short, long)]
    verbose: bool,
}
//
impl Args {
    /// Decode and validate CLI arguments
    pub fn parse_and_check() -> Result<Self> {
        let args = Args::parse();
        anyhow::ensure!(
            args.bucket_count > 0,
            "there must be at least one merge bucket"
        );
        for input in &args.input {
            anyhow::ensure!(
                input.is_dir(),
                "input {} is not a directory",
                input.display()
            );
        }
        Ok(args)
    }

    /// Language profile, prompting interactively when none was given
    fn language(&self) -> Result<Language> {
        match &self.language {
            Some(id) => Language::from_id(id)
                .with_context(|| format!("failed to find user-requested language profile {id}")),
            None => {
                let profiles = Language::all();
                let names = profiles
                    .iter()
                    .map(|(name, language)| format!("{name} ({})", language.id()))
                    .collect::<Vec<_>>();
                let index = FuzzySelect::new()
                    .with_prompt("Which language profile should I apply?")
                    .items(&names)
                    .default(0)
                    .max_length(usize::MAX)
                    .interact()
                    .context("prompting for a language profile")?;
                Ok(profiles[index].1)
            }
        }
    }
}

/// Input file formats supported on the command line
#[derive(Copy, Clone, Debug, Eq, PartialEq, clap::ValueEnum)]
enum InputFormat {
    /// One phrase\tfrequency record per line
    SimpleCsv,

    /// Google Books n-gram export files
    GoogleBooks,
}
//
impl From<InputFormat> for ReaderKind {
    fn from(format: InputFormat) -> Self {
        match format {
            InputFormat::SimpleCsv => ReaderKind::SimpleCsv,
            InputFormat::GoogleBooks => ReaderKind::GoogleBooksCsv,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up logging
    setup_logging().map_err(|e| anyhow::format_err!("{e}"))?;

    // Decode CLI arguments
    let args = Args::parse_and_check()?;
    let language = args.language()?;

    // Combine the input directories into one phrase source
    let reader_kind = ReaderKind::from(args.format);
    let source = PhraseSource::combine(
        args.input
            .iter()
            .map(|dir| PhraseSource::directory_with_reader(dir, reader_kind)),
    );

    let job = JobConfig {
        source,
        output: args.output.clone(),
        temp: args.temp.clone(),
        parallel_degree: args.parallel_degree,
        max_n_gram: args.max_n_gram,
        lowercase: args.lowercase,
        merge_duplicates: !args.keep_duplicates,
        bucket_count: NonZeroUsize::new(args.bucket_count)
            .expect("bucket count was validated above"),
        verbose: args.verbose,
    };
    language.process(&job).await?;

    println!("Done.");
    Ok(())
}

/// Set up logging
fn setup_logging() -> syslog::Result<()> {
    syslog::init(
        syslog::Facility::LOG_USER,
        if cfg!(feature = "log-trace") {
            LevelFilter::Trace
        } else if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
        None,
    )
}

/// Use jemalloc for improved multi-thread performance
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;
