//! The preprocessing engine
//!
//! This orchestrates the parallel application of a mapper chain over a
//! [`PhraseSource`], in one of two modes:
//!
//! - **Direct mode** applies the chain to every record of every input file
//!   and writes survivors 1:1 to a matching output file. No cross-file
//!   aggregation happens, duplicates are preserved.
//! - **Merge-dedup mode** additionally collapses duplicate phrases across
//!   the whole corpus through a two-phase external reduction: records are
//!   first split into on-disk buckets by a hash of their phrase, then each
//!   bucket is reduced with a transient in-memory map. Because both phases
//!   hash the identical phrase string, every occurrence of a phrase reaches
//!   the same bucket, so per-bucket summation equals corpus-wide summation.

use crate::{
    add_frequencies,
    config::{DeleteMode, EngineOptions},
    fs,
    io::{BucketWriter, SimpleCsvWriter},
    mapper::{apply_chain, ChainStats, PhraseMapper},
    progress::{ProgressConfig, ProgressReport, Work},
    source::{PhraseSource, SourceFile},
    Frequency,
};
use anyhow::Context;
use indicatif::HumanDuration;
use std::{
    collections::{hash_map, HashMap},
    future::Future,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};
use tokio::{sync::Semaphore, task::JoinSet};

/// Mapper chain shared across worker tasks
type SharedChain = Arc<[Arc<dyn PhraseMapper>]>;

/// Apply a mapper chain to a phrase source, writing results to `output_dir`
///
/// The output directory must be empty. On success, a new source over the
/// output directory is returned, ready for the next pipeline stage.
pub async fn process(
    source: &PhraseSource,
    output_dir: &Path,
    mappers: &[Arc<dyn PhraseMapper>],
    options: &EngineOptions,
) -> crate::Result<PhraseSource> {
    let start = Instant::now();
    fs::create_empty_dir(output_dir).await?;

    let chain: SharedChain = mappers.to_vec().into();
    let stats = options.verbose.then(|| Arc::new(ChainStats::new(mappers)));
    let report = ProgressReport::new();

    if options.merge_duplicates {
        merge_dedup(source, output_dir, &chain, &stats, options, &report).await?;
    } else {
        direct(source, output_dir, &chain, &stats, options, &report).await?;
    }

    if let Some(stats) = &stats {
        print!("{}", stats.render());
    }
    println!("Took {}", HumanDuration(start.elapsed()));
    Ok(PhraseSource::directory(output_dir))
}

/// Iterate a mapper chain over a phrase source without touching the disk
///
/// This runs exactly like [`process`] but writes nothing and never deletes
/// sources; the mappers act as pure consumers. This is how read-only passes
/// such as vocabulary extraction see the whole corpus.
pub async fn iterate(
    source: &PhraseSource,
    mappers: &[Arc<dyn PhraseMapper>],
    options: &EngineOptions,
) -> crate::Result<()> {
    let start = Instant::now();
    let chain: SharedChain = mappers.to_vec().into();
    let stats = options.verbose.then(|| Arc::new(ChainStats::new(mappers)));
    let report = ProgressReport::new();

    let files = source.files()?;
    let task_chain = chain.clone();
    let task_stats = stats.clone();
    for_each_file(
        files,
        DeleteMode::None,
        options.parallel_degree,
        &report,
        "Applying mappers",
        move |file| {
            let chain = task_chain.clone();
            let stats = task_stats.clone();
            async move {
                let mut reader = file.create_reader().await?;
                while let Some(record) = reader.next_record().await? {
                    let (phrase, frequency) = record.into_parts();
                    let _consumed = apply_chain(&chain, stats.as_deref(), &phrase, frequency);
                }
                Ok(())
            }
        },
    )
    .await?;

    if let Some(stats) = &stats {
        print!("{}", stats.render());
    }
    println!("Took {}", HumanDuration(start.elapsed()));
    Ok(())
}

/// Two-phase external merge-deduplication
async fn merge_dedup(
    source: &PhraseSource,
    output_dir: &Path,
    chain: &SharedChain,
    stats: &Option<Arc<ChainStats>>,
    options: &EngineOptions,
    report: &ProgressReport,
) -> crate::Result<()> {
    let scratch = output_dir.join("tmp");
    fs::create_empty_dir(&scratch).await?;

    // Split: route every surviving record to the bucket of its phrase, so
    // duplicates from any input file meet in the same bucket file
    let splitter = Arc::new(BucketWriter::create(&scratch, options.bucket_count.get()).await?);
    let files = source.files()?;
    {
        let task_chain = chain.clone();
        let task_stats = stats.clone();
        let task_splitter = splitter.clone();
        for_each_file(
            files,
            options.delete_source,
            options.parallel_degree,
            report,
            "Applying mappers",
            move |file| {
                let chain = task_chain.clone();
                let stats = task_stats.clone();
                let splitter = task_splitter.clone();
                async move {
                    let mut reader = file.create_reader().await?;
                    while let Some(record) = reader.next_record().await? {
                        let (phrase, frequency) = record.into_parts();
                        if let Some(mapped) = apply_chain(&chain, stats.as_deref(), &phrase, frequency)
                        {
                            splitter.write(&mapped, frequency).await?;
                        }
                    }
                    Ok(())
                }
            },
        )
        .await?;
    }
    Arc::into_inner(splitter)
        .expect("all split tasks have completed and released the bucket writer")
        .finish()
        .await?;

    // Reduce: collapse each bucket with a transient in-memory map, deleting
    // the bucket file as soon as it has been reduced
    let buckets = PhraseSource::directory(&scratch).files()?;
    let totals = Arc::new(ReduceTotals::default());
    {
        let task_totals = totals.clone();
        let task_output = output_dir.to_owned();
        for_each_file(
            buckets,
            DeleteMode::Progressive,
            options.parallel_degree,
            report,
            "Merging duplicates",
            move |bucket| {
                let totals = task_totals.clone();
                let output_dir = task_output.clone();
                async move { reduce_bucket(&bucket, &output_dir, &totals).await }
            },
        )
        .await?;
    }

    let phrases = totals.phrases.load(Ordering::Relaxed);
    let duplicates = totals.duplicates.load(Ordering::Relaxed);
    let percentage = if phrases > 0 {
        (1000.0 * duplicates as f64 / phrases as f64).round() / 10.0
    } else {
        0.0
    };
    println!("Total of {phrases} phrases with {duplicates} ({percentage}%) duplicates merged.");

    fs::remove_tree(&scratch).await
}

/// Reduce one bucket file into one deduplicated output file
async fn reduce_bucket(
    bucket: &SourceFile,
    output_dir: &Path,
    totals: &ReduceTotals,
) -> crate::Result<()> {
    let mut merged: HashMap<Box<str>, Frequency> = HashMap::new();
    let mut records: u64 = 0;
    let mut duplicates: u64 = 0;

    let mut reader = bucket.create_reader().await?;
    while let Some(record) = reader.next_record().await? {
        records += 1;
        let (phrase, frequency) = record.into_parts();
        match merged.entry(phrase) {
            hash_map::Entry::Occupied(entry) => {
                duplicates += 1;
                let sum = entry.into_mut();
                *sum = add_frequencies(*sum, frequency);
            }
            hash_map::Entry::Vacant(entry) => {
                entry.insert(frequency);
            }
        }
    }

    let file_name = bucket
        .path()
        .file_name()
        .expect("bucket files always have a file name");
    let mut writer = SimpleCsvWriter::create(&output_dir.join(file_name)).await?;
    for (phrase, frequency) in &merged {
        writer.write(phrase, *frequency).await?;
    }
    writer.finish().await?;

    totals.record(records - duplicates, duplicates);
    Ok(())
}

/// Direct mode: per-file 1:1 mapping, duplicates preserved
async fn direct(
    source: &PhraseSource,
    output_dir: &Path,
    chain: &SharedChain,
    stats: &Option<Arc<ChainStats>>,
    options: &EngineOptions,
    report: &ProgressReport,
) -> crate::Result<()> {
    let files = source.files()?;
    let task_chain = chain.clone();
    let task_stats = stats.clone();
    let task_output = output_dir.to_owned();
    for_each_file(
        files,
        options.delete_source,
        options.parallel_degree,
        report,
        "Applying mappers",
        move |file| {
            let chain = task_chain.clone();
            let stats = task_stats.clone();
            let output_dir = task_output.clone();
            async move {
                let input_name = file
                    .path()
                    .file_name()
                    .expect("source files always have a file name")
                    .to_string_lossy();
                let out_path = output_dir.join(direct_output_name(&input_name));
                let mut reader = file.create_reader().await?;
                let mut writer = SimpleCsvWriter::create(&out_path).await?;
                while let Some(record) = reader.next_record().await? {
                    let (phrase, frequency) = record.into_parts();
                    if let Some(mapped) = apply_chain(&chain, stats.as_deref(), &phrase, frequency) {
                        writer.write(&mapped, frequency).await?;
                    }
                }
                writer.finish().await
            }
        },
    )
    .await
}

/// Output file name of a directly processed input file
///
/// Compression extensions are dropped along with everything else after the
/// `.csv` marker, so `corpus.csv.gz` maps to `corpus.csv`.
fn direct_output_name(input_name: &str) -> String {
    let bytes = input_name.as_bytes();
    let marker = (0..bytes.len().saturating_sub(3))
        .find(|&i| bytes[i] == b'.' && bytes[i + 1..i + 4].eq_ignore_ascii_case(b"csv"));
    match marker {
        Some(index) => format!("{}.csv", &input_name[..index]),
        None => format!("{input_name}.csv"),
    }
}

/// Totals accumulated across all reduce tasks
#[derive(Debug, Default)]
struct ReduceTotals {
    /// Number of distinct phrases written
    phrases: AtomicU64,

    /// Number of duplicate records collapsed into another record
    duplicates: AtomicU64,
}
//
impl ReduceTotals {
    fn record(&self, phrases: u64, duplicates: u64) {
        self.phrases.fetch_add(phrases, Ordering::Relaxed);
        self.duplicates.fetch_add(duplicates, Ordering::Relaxed);
    }
}

/// Run one task per file on a bounded worker pool
///
/// At most `parallel_degree` tasks run at any time. Task results are drained
/// in completion order, a fast later file never waits for an earlier slow
/// one. When tasks fail, already running siblings still run to completion and
/// the first observed failure is surfaced; there is no cancellation.
///
/// `DeleteMode::Progressive` removes each source file right after its task
/// succeeds; `DeleteMode::Atomic` removes all of them only once every task
/// has succeeded.
async fn for_each_file<F, Fut>(
    files: Vec<SourceFile>,
    delete_source: DeleteMode,
    parallel_degree: NonZeroUsize,
    report: &ProgressReport,
    what: &'static str,
    op: F,
) -> crate::Result<()>
where
    F: Fn(SourceFile) -> Fut,
    Fut: Future<Output = crate::Result<()>> + Send + 'static,
{
    let total = files.len();
    let tracker = report.add(what, ProgressConfig::new(Work::Steps(total)));
    let semaphore = Arc::new(Semaphore::new(parallel_degree.get()));
    let mut tasks = JoinSet::new();
    for (index, file) in files.iter().enumerate() {
        let task = op(file.clone());
        let semaphore = semaphore.clone();
        let tracker = tracker.clone();
        let path: PathBuf = file.path().to_owned();
        let number = index + 1;
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("the worker pool semaphore is never closed");
            let percent = number * 100 / total;
            tracker.println(format!(
                "[{percent}% {number}/{total}] Preprocessing {}",
                path.display()
            ));
            let mut result = task
                .await
                .with_context(|| format!("processing {}", path.display()));
            if result.is_ok() && delete_source == DeleteMode::Progressive {
                result = tokio::fs::remove_file(&path)
                    .await
                    .with_context(|| format!("deleting source file {}", path.display()));
            }
            tracker.make_progress(1);
            result
        });
    }

    // Await all tasks in completion order, surfacing the first failure only
    // after every already-running sibling has finished
    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined
            .unwrap_or_else(|e| Err(anyhow::Error::new(e).context("a preprocessing task died")));
        if let Err(error) = outcome {
            first_error.get_or_insert(error);
        }
    }
    if let Some(error) = first_error {
        return Err(error);
    }

    if delete_source == DeleteMode::Atomic {
        for file in &files {
            tokio::fs::remove_file(file.path())
                .await
                .with_context(|| format!("deleting source file {}", file.path().display()))?;
        }
    }
    Ok(())
}
