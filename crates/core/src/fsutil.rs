//! Whole-file persistence helpers shared by the ledger, config cache and cursors.

use std::io::Write;
use std::path::Path;

use tokio::io::AsyncWriteExt;

fn temp_path_for(path: &Path) -> std::path::PathBuf {
    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file"),
        uuid::Uuid::new_v4().simple()
    );
    path.with_file_name(temp_name)
}

/// Writes `data` to a temp file next to `path`, fsyncs it, then renames it over `path`.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let temp_path = temp_path_for(path);

    let mut file = std::fs::File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}

/// Async variant of [`write_atomic`].
pub(crate) async fn write_atomic_async(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let temp_path = temp_path_for(path);

    let mut file = tokio::fs::File::create(&temp_path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }
    Ok(())
}

/// Reads a file to a string, treating a missing file as empty.
pub(crate) fn read_or_empty(path: &Path) -> std::io::Result<String> {
    match std::fs::read_to_string(path) {
        Ok(s) => Ok(s),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_write_atomic_async() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cursor.json");

        write_atomic_async(&path, b"{}").await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "{}");
    }

    #[test]
    fn test_read_or_empty_missing_file() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_or_empty(&dir.path().join("nope")).unwrap(), "");
    }
}
