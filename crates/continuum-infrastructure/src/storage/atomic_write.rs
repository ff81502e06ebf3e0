//! Whole-file writes that never leave a partially written target.
//!
//! Content goes to a hidden temporary sibling first, is flushed to disk,
//! and only then becomes visible under the target name.

use continuum_core::{ContinuumError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

fn temp_path(path: &Path) -> Result<PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| ContinuumError::io(format!("Path has no parent directory: {}", path.display())))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| ContinuumError::io(format!("Path has no file name: {}", path.display())))?;
    Ok(parent.join(format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        std::process::id()
    )))
}

async fn write_temp(path: &Path, contents: &str) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp_path = temp_path(path)?;
    let mut tmp_file = fs::File::create(&tmp_path).await?;
    tmp_file.write_all(contents.as_bytes()).await?;
    tmp_file.sync_all().await?;
    drop(tmp_file);
    Ok(tmp_path)
}

/// Replaces `path` with `contents` via tmp file + fsync + rename.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp_path = write_temp(path, contents).await?;
    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }
    Ok(())
}

/// Creates `path` with `contents` only if it does not exist yet.
///
/// The final step is a hard link, which fails instead of replacing an
/// existing target. Returns `false` when the target already existed.
pub async fn create_new_atomic(path: &Path, contents: &str) -> Result<bool> {
    if fs::try_exists(path).await? {
        return Ok(false);
    }
    let tmp_path = write_temp(path, contents).await?;
    let linked = fs::hard_link(&tmp_path, path).await;
    let _ = fs::remove_file(&tmp_path).await;
    match linked {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_atomic_replaces_and_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sessions").join("a.md");

        write_atomic(&path, "first").await.unwrap();
        write_atomic(&path, "second").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_create_new_atomic_never_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("context").join("claude-memory.md");

        assert!(create_new_atomic(&path, "original").await.unwrap());
        assert!(!create_new_atomic(&path, "replacement").await.unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original");
    }
}
