//! Filesystem helpers shared by the registry and the syncer

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Size of the file at `path`, or None if it is missing or not a regular file
pub(crate) async fn file_size(path: &Path) -> Option<u64> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Some(meta.len()),
        _ => None,
    }
}

/// A file consumers may open: exists and is non-empty
pub(crate) async fn is_usable(path: &Path) -> bool {
    file_size(path).await.is_some_and(|size| size > 0)
}

/// `<path>.<suffix>` next to `path`
pub(crate) fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Write `data` to `path` via a temp file and rename, creating parent directories
pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let tmp_path = sibling(path, "tmp");
    if let Err(e) = fs::write(&tmp_path, data).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e);
    }

    replace_with(&tmp_path, path).await
}

/// Copy `from` over `to` via a temp file and rename, so `to` is never half written
pub(crate) async fn copy_atomic(from: &Path, to: &Path) -> io::Result<()> {
    let tmp_path = sibling(to, "tmp");
    if let Err(e) = fs::copy(from, &tmp_path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e);
    }

    replace_with(&tmp_path, to).await
}

async fn replace_with(tmp_path: &Path, path: &Path) -> io::Result<()> {
    if let Err(e) = fs::rename(tmp_path, path).await {
        let _ = fs::remove_file(tmp_path).await;
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sibling() {
        assert_eq!(
            sibling(Path::new("/data/kospi/close.csv"), "backup"),
            PathBuf::from("/data/kospi/close.csv.backup")
        );
    }

    #[tokio::test]
    async fn test_write_atomic_creates_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/close.csv");

        write_atomic(&path, b"code,close\n").await.unwrap();

        assert_eq!(file_size(&path).await, Some(11));
        assert!(!sibling(&path, "tmp").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_temp_write_is_cleaned_up() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("close.csv");
        let tmp_path = sibling(&path, "tmp");
        // The temp path points into a directory that does not exist, so the write fails
        std::os::unix::fs::symlink(dir.path().join("gone/close.csv.tmp"), &tmp_path).unwrap();

        assert!(write_atomic(&path, b"data").await.is_err());

        assert!(fs::symlink_metadata(&tmp_path).await.is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_copy_atomic_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("close.csv");
        let backup = sibling(&cache, "backup");
        fs::write(&cache, b"today").await.unwrap();
        fs::write(&backup, b"a much longer copy from yesterday")
            .await
            .unwrap();

        copy_atomic(&cache, &backup).await.unwrap();

        assert_eq!(fs::read(&backup).await.unwrap(), b"today");
        assert!(!sibling(&backup, "tmp").exists());
        assert_eq!(fs::read(&cache).await.unwrap(), b"today");
    }

    #[tokio::test]
    async fn test_copy_atomic_failure_keeps_target() {
        let dir = tempdir().unwrap();
        let backup = dir.path().join("close.csv.backup");
        fs::write(&backup, b"last good").await.unwrap();

        let missing = dir.path().join("missing.csv");
        assert!(copy_atomic(&missing, &backup).await.is_err());

        assert_eq!(fs::read(&backup).await.unwrap(), b"last good");
        assert!(!sibling(&backup, "tmp").exists());
    }

    #[tokio::test]
    async fn test_is_usable() {
        let dir = tempdir().unwrap();
        let empty = dir.path().join("empty.csv");
        let full = dir.path().join("full.csv");
        fs::write(&empty, b"").await.unwrap();
        fs::write(&full, b"x").await.unwrap();

        assert!(!is_usable(&empty).await);
        assert!(is_usable(&full).await);
        assert!(!is_usable(&dir.path().join("missing.csv")).await);
        assert!(!is_usable(dir.path()).await);
    }
}
