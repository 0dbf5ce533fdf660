//! Directory layout for staged uploads and produced artifacts.

use std::path::{Path, PathBuf};

use sorawm_models::TaskId;
use tracing::debug;

use crate::error::{StorageError, StorageResult};

/// Subdirectory for staged uploads.
pub const INCOMING_DIR: &str = "incoming";

/// Subdirectory for cleaned videos.
pub const OUTPUT_DIR: &str = "output";

/// Name used when nothing usable survives sanitizing.
const FALLBACK_FILENAME: &str = "upload.mp4";

/// Maximum length of a sanitized filename.
const MAX_FILENAME_LENGTH: usize = 128;

/// Extension given to every produced artifact.
const OUTPUT_EXTENSION: &str = "mp4";

/// Process-local storage rooted at a data directory.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
    incoming: PathBuf,
    output: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            incoming: root.join(INCOMING_DIR),
            output: root.join(OUTPUT_DIR),
            root,
        }
    }

    /// Create the incoming and output directories if missing.
    pub async fn ensure_dirs(&self) -> StorageResult<()> {
        for dir in [&self.incoming, &self.output] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| StorageError::CreateDir {
                    path: dir.clone(),
                    source,
                })?;
            debug!(path = %dir.display(), "Storage directory ready");
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn incoming_dir(&self) -> &Path {
        &self.incoming
    }

    pub fn output_dir(&self) -> &Path {
        &self.output
    }

    /// Staging path for an upload: `incoming/{task_id}_{sanitized_name}`.
    ///
    /// The task ID prefix makes the path unique even when clients upload the
    /// same filename concurrently.
    pub fn staging_path(&self, task_id: &TaskId, original_name: &str) -> PathBuf {
        self.incoming
            .join(format!("{}_{}", task_id, sanitize_filename(original_name)))
    }

    /// Output path for a task: `output/{task_id}.mp4`.
    pub fn output_path(&self, task_id: &TaskId) -> PathBuf {
        self.output.join(output_filename(task_id))
    }
}

/// File name clients receive when downloading a task's artifact.
pub fn output_filename(task_id: &TaskId) -> String {
    format!("{}.{}", task_id, OUTPUT_EXTENSION)
}

/// Sanitize a client-supplied filename for use on disk.
///
/// Drops any directory components, keeps ASCII alphanumerics, `.`, `-` and
/// `_`, replaces everything else with `_`, and never returns a name that is
/// empty or made only of dots.
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_' || c == '.') {
        return FALLBACK_FILENAME.to_string();
    }

    if cleaned.len() > MAX_FILENAME_LENGTH {
        // Keep the tail so the extension survives.
        cleaned[cleaned.len() - MAX_FILENAME_LENGTH..].to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_plain_name() {
        assert_eq!(sanitize_filename("clip_001-final.mp4"), "clip_001-final.mp4");
    }

    #[test]
    fn test_sanitize_strips_path_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\videos\\my clip.mp4"), "my_clip.mp4");
        assert_eq!(sanitize_filename(".."), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename(".hidden.mp4"), "hidden.mp4");
    }

    #[test]
    fn test_sanitize_replaces_unicode_and_spaces() {
        assert_eq!(sanitize_filename("vidéo été.mov"), "vid_o__t_.mov");
    }

    #[test]
    fn test_sanitize_empty_falls_back() {
        assert_eq!(sanitize_filename(""), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename("   "), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename("???"), FALLBACK_FILENAME);
    }

    #[test]
    fn test_sanitize_caps_length_keeping_extension() {
        let long = format!("{}.mp4", "a".repeat(500));
        let cleaned = sanitize_filename(&long);
        assert_eq!(cleaned.len(), MAX_FILENAME_LENGTH);
        assert!(cleaned.ends_with(".mp4"));
    }

    #[test]
    fn test_paths_are_keyed_by_task_id() {
        let layout = StorageLayout::new("/data");
        let a = TaskId::from("task-a");
        let b = TaskId::from("task-b");

        assert_eq!(
            layout.staging_path(&a, "video.mp4"),
            PathBuf::from("/data/incoming/task-a_video.mp4")
        );
        assert_ne!(layout.staging_path(&a, "video.mp4"), layout.staging_path(&b, "video.mp4"));
        assert_eq!(layout.output_path(&a), PathBuf::from("/data/output/task-a.mp4"));
    }

    #[tokio::test]
    async fn test_ensure_dirs_creates_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(tmp.path().join("data"));
        layout.ensure_dirs().await.unwrap();
        assert!(layout.incoming_dir().is_dir());
        assert!(layout.output_dir().is_dir());
        // Idempotent
        layout.ensure_dirs().await.unwrap();
    }
}
