//! Hash-bucketed CSV output for the split phase of merge-deduplication
//!
//! A [`BucketWriter`] spreads records over a fixed number of CSV files, where
//! the bucket of a record is derived from a hash of its phrase. Every
//! occurrence of a given phrase, from any input file, lands in the same
//! bucket, which is what makes per-bucket deduplication equal to corpus-wide
//! deduplication.

use super::simple::SimpleCsvWriter;
use crate::Frequency;
use anyhow::Context;
use rustc_hash::FxHasher;
use std::{
    hash::Hasher,
    path::{Path, PathBuf},
};
use tokio::{fs::File, io::BufWriter, sync::Mutex};

/// Bucket of a phrase, for a given bucket count
///
/// The hash must be identical across worker threads, split/reduce phases,
/// runs and processes, so this uses `FxHasher` with its default state rather
/// than the randomly seeded std hasher.
pub fn bucket_index(phrase: &str, bucket_count: usize) -> usize {
    let mut hasher = FxHasher::default();
    hasher.write(phrase.as_bytes());
    (hasher.finish() % bucket_count as u64) as usize
}

/// Thread-safe writer spreading records over hash buckets
///
/// Each bucket has its own lock, so writers to different buckets proceed
/// concurrently while same-bucket writers serialize.
pub struct BucketWriter {
    buckets: Box<[Mutex<SimpleCsvWriter<BufWriter<File>>>]>,
}
//
impl BucketWriter {
    /// Allocate `bucket_count` bucket files inside a scratch directory
    pub async fn create(scratch_dir: &Path, bucket_count: usize) -> crate::Result<Self> {
        assert!(bucket_count > 0, "cannot split phrases over zero buckets");
        let mut buckets = Vec::with_capacity(bucket_count);
        for index in 0..bucket_count {
            let path = Self::bucket_path(scratch_dir, index);
            buckets.push(Mutex::new(SimpleCsvWriter::create(&path).await?));
        }
        Ok(Self {
            buckets: buckets.into_boxed_slice(),
        })
    }

    /// Path of bucket number `index`
    pub fn bucket_path(scratch_dir: &Path, index: usize) -> PathBuf {
        scratch_dir.join(format!("{index}.csv"))
    }

    /// Route one record to its bucket
    pub async fn write(&self, phrase: &str, frequency: Frequency) -> crate::Result<()> {
        let index = bucket_index(phrase, self.buckets.len());
        let mut writer = self.buckets[index].lock().await;
        writer
            .write(phrase, frequency)
            .await
            .with_context(|| format!("writing to phrase bucket {index}"))
    }

    /// Flush and close all bucket files
    pub async fn finish(self) -> crate::Result<()> {
        for (index, bucket) in Vec::from(self.buckets).into_iter().enumerate() {
            bucket
                .into_inner()
                .finish()
                .await
                .with_context(|| format!("closing phrase bucket {index}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU64;

    #[test]
    fn bucket_choice_is_stable() {
        for phrase in ["hello world", "i love you", "übermut"] {
            let first = bucket_index(phrase, 1024);
            assert_eq!(first, bucket_index(phrase, 1024));
            assert!(first < 1024);
        }
        assert_eq!(bucket_index("anything", 1), 0);
    }

    #[tokio::test]
    async fn routes_same_phrase_to_same_file() {
        let scratch = tempfile::tempdir().unwrap();
        let writer = BucketWriter::create(scratch.path(), 8).await.unwrap();
        let one = NonZeroU64::new(1).unwrap();
        writer.write("hello world", one).await.unwrap();
        writer.write("other phrase", one).await.unwrap();
        writer.write("hello world", one).await.unwrap();
        writer.finish().await.unwrap();

        let bucket = bucket_index("hello world", 8);
        let contents =
            std::fs::read_to_string(BucketWriter::bucket_path(scratch.path(), bucket)).unwrap();
        assert_eq!(contents.matches("hello world\t1\n").count(), 2);
    }
}
