//! Writing inbound upload streams to disk.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};

/// Copy `reader` to `dest` in full.
///
/// Bytes are written to a `.part` sibling first and renamed into place only
/// after the stream is exhausted and flushed, so `dest` either holds the whole
/// upload or does not exist. On any failure the partial file is removed.
/// Returns the number of bytes written.
pub async fn stage_stream<R>(reader: &mut R, dest: &Path) -> StorageResult<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::staging_failed(dest, e))?;
    }

    let part = part_path(dest);
    match copy_to(reader, &part).await {
        Ok(0) => {
            remove_quietly(&part).await;
            Err(StorageError::EmptyUpload)
        }
        Ok(written) => {
            if let Err(e) = fs::rename(&part, dest).await {
                remove_quietly(&part).await;
                return Err(StorageError::staging_failed(dest, e));
            }
            debug!(path = %dest.display(), bytes = written, "Staged upload");
            Ok(written)
        }
        Err(e) => {
            remove_quietly(&part).await;
            Err(StorageError::staging_failed(dest, e))
        }
    }
}

async fn copy_to<R>(reader: &mut R, path: &Path) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let file = fs::File::create(path).await?;
    let mut writer = BufWriter::new(file);
    let written = tokio::io::copy(reader, &mut writer).await?;
    writer.flush().await?;
    writer.into_inner().sync_all().await?;
    Ok(written)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Remove a file, logging instead of failing. Missing files are fine.
pub async fn remove_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "Failed to remove file: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tokio::io::ReadBuf;

    use super::*;

    /// Yields some bytes, then errors like a dropped client connection.
    struct BrokenReader {
        sent: bool,
    }

    impl AsyncRead for BrokenReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if !self.sent {
                self.sent = true;
                buf.put_slice(b"partial video bytes");
                Poll::Ready(Ok(()))
            } else {
                Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "client went away",
                )))
            }
        }
    }

    #[tokio::test]
    async fn test_stage_stream_writes_full_content() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("incoming/abc_video.mp4");
        let mut reader: &[u8] = b"fake mp4 payload";

        let written = stage_stream(&mut reader, &dest).await.unwrap();

        assert_eq!(written, 16);
        assert_eq!(fs::read(&dest).await.unwrap(), b"fake mp4 payload");
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_stage_stream_removes_partial_file_on_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("abc_video.mp4");
        let mut reader = BrokenReader { sent: false };

        let err = stage_stream(&mut reader, &dest).await.unwrap_err();

        assert!(matches!(err, StorageError::StagingFailed { .. }));
        assert!(!dest.exists());
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_stage_stream_rejects_empty_upload() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("empty.mp4");
        let mut reader: &[u8] = b"";

        let err = stage_stream(&mut reader, &dest).await.unwrap_err();

        assert!(matches!(err, StorageError::EmptyUpload));
        assert!(err.is_client_error());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_stage_stream_fails_when_parent_is_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("incoming");
        fs::write(&blocker, b"not a directory").await.unwrap();
        let dest = blocker.join("abc_video.mp4");
        let mut reader: &[u8] = b"data";

        let err = stage_stream(&mut reader, &dest).await.unwrap_err();

        assert!(matches!(err, StorageError::StagingFailed { .. }));
        assert!(!err.is_client_error());
    }

    #[tokio::test]
    async fn test_remove_quietly_ignores_missing() {
        let tmp = tempfile::tempdir().unwrap();
        remove_quietly(&tmp.path().join("nope")).await;
    }
}
