//! File system helpers for pipeline stages
//!
//! Every pipeline stage owns its output and temporary directories, so the
//! helpers here revolve around creating guaranteed-empty directories and
//! tearing down whole temporary trees.

use anyhow::{ensure, Context};
use std::{
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::fs;

/// Create a directory, insisting that it does not already contain anything
///
/// A non-empty target is a configuration error: silently mixing fresh output
/// with leftovers from an earlier run would corrupt the dataset.
pub async fn create_empty_dir(dir: &Path) -> crate::Result<()> {
    match fs::read_dir(dir).await {
        Ok(mut entries) => {
            let first = entries
                .next_entry()
                .await
                .with_context(|| format!("listing {}", dir.display()))?;
            ensure!(
                first.is_none(),
                "directory {} is not empty",
                dir.display()
            );
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating directory {}", dir.display())),
        Err(e) => Err(e).with_context(|| format!("inspecting directory {}", dir.display())),
    }
}

/// Recursively delete a directory tree, tolerating its absence
pub async fn remove_tree(dir: &Path) -> crate::Result<()> {
    match fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("removing directory tree {}", dir.display())),
    }
}

/// Pick the path of a fresh temporary directory under `root`
///
/// The returned path is guaranteed not to exist at the time of the call. The
/// caller creates and later removes it, which keeps each pipeline stage
/// restartable from its own temporary tree.
pub fn unique_temp_dir(root: &Path, label: &str) -> crate::Result<PathBuf> {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("reading the system clock")?
        .as_millis();
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{label}-{stamp}")
        } else {
            format!("{label}-{stamp}-{attempt}")
        };
        let candidate = root.join(name);
        if !candidate.exists() {
            return Ok(candidate);
        }
        attempt += 1;
    }
}

/// Move a file to a new location
///
/// This renames, it never copies: pipeline stages transfer file ownership.
pub async fn move_file(from: &Path, to: &Path) -> crate::Result<()> {
    fs::rename(from, to)
        .await
        .with_context(|| format!("moving {} to {}", from.display(), to.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_dir_creation() {
        let root = tempfile::tempdir().unwrap();
        let fresh = root.path().join("fresh");
        create_empty_dir(&fresh).await.unwrap();
        assert!(fresh.is_dir());

        // Creating an existing empty directory is fine, a non-empty one is not
        create_empty_dir(&fresh).await.unwrap();
        std::fs::write(fresh.join("leftover"), "x").unwrap();
        assert!(create_empty_dir(&fresh).await.is_err());
    }

    #[tokio::test]
    async fn tree_removal_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let tree = root.path().join("tree");
        std::fs::create_dir_all(tree.join("nested")).unwrap();
        std::fs::write(tree.join("nested/file"), "x").unwrap();
        remove_tree(&tree).await.unwrap();
        assert!(!tree.exists());
        remove_tree(&tree).await.unwrap();
    }

    #[test]
    fn temp_dirs_are_unique() {
        let root = tempfile::tempdir().unwrap();
        let first = unique_temp_dir(root.path(), "_temp").unwrap();
        std::fs::create_dir_all(&first).unwrap();
        let second = unique_temp_dir(root.path(), "_temp").unwrap();
        assert_ne!(first, second);
    }
}
