//! File placement helpers: collision handling, name sanitizing and moves

use crate::config::FileCollisionAction;
use crate::error::{DownloadError, FileCollision};
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Longest file name (in UTF-8 bytes, extension excluded) produced by [`sanitize_file_name`]
///
/// Name components are limited to 255 bytes on common filesystems; the rest is
/// room for a ` (n)` rename suffix and the extension.
pub const MAX_FILE_NAME_BYTES: usize = 200;

/// Name used when a title sanitizes down to nothing
const FALLBACK_FILE_NAME: &str = "download";

/// Current wall-clock time as unix milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Decide where an output file goes when `path` may already be taken
///
/// For Rename this may add a ` (n)` suffix before the extension. Skip fails with a
/// storage-category error if the file already exists. Overwrite returns the path unchanged.
///
/// # Examples
///
/// ```
/// use lite_dl::utils::get_unique_path;
/// use lite_dl::config::FileCollisionAction;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/lite-dl-doc/clip.mp4");
/// let unique = get_unique_path(path, FileCollisionAction::Rename).unwrap();
/// // If clip.mp4 exists, returns "clip (1).mp4"; if that exists too, "clip (2).mp4", etc.
/// # let _ = unique;
/// ```
pub fn get_unique_path(
    path: &Path,
    action: FileCollisionAction,
) -> std::result::Result<PathBuf, DownloadError> {
    match action {
        FileCollisionAction::Overwrite => Ok(path.to_path_buf()),
        FileCollisionAction::Skip => {
            if path.exists() {
                return Err(DownloadError::storage(
                    "output exists and collision action is skip",
                    FileCollision {
                        path: path.to_path_buf(),
                    },
                ));
            }
            Ok(path.to_path_buf())
        }
        FileCollisionAction::Rename if !path.exists() => Ok(path.to_path_buf()),
        FileCollisionAction::Rename => {
            let (Some(parent), Some(stem)) = (path.parent(), path.file_stem()) else {
                return Err(DownloadError::storage(
                    format!("cannot derive a new name from {}", path.display()),
                    "invalid output path",
                ));
            };
            let stem = stem.to_string_lossy();
            let suffix = path
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy()))
                .unwrap_or_default();

            (1..=MAX_RENAME_ATTEMPTS)
                .map(|n| parent.join(format!("{} ({}){}", stem, n, suffix)))
                .find(|candidate| !candidate.exists())
                .ok_or_else(|| {
                    DownloadError::storage(
                        format!("no free name after {} attempts", MAX_RENAME_ATTEMPTS),
                        FileCollision {
                            path: path.to_path_buf(),
                        },
                    )
                })
        }
    }
}

/// Turn a video title into a file name that is valid on every common filesystem
///
/// Path separators, reserved characters and control characters become `_`. Any run of
/// whitespace (tabs and newlines included) collapses to one space, and leading/trailing
/// dots and spaces are dropped. The result is cut to at most
/// [`MAX_FILE_NAME_BYTES`] bytes on a character boundary. An empty result becomes `"download"`.
///
/// ```
/// use lite_dl::utils::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("AC/DC: Live?"), "AC_DC_ Live_");
/// assert_eq!(sanitize_file_name("  ...  "), "download");
/// ```
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_space = false;

    for c in name.chars() {
        let mapped = match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() => ' ',
            c if c.is_control() => '_',
            c => c,
        };
        if mapped == ' ' {
            if last_was_space {
                continue;
            }
            last_was_space = true;
        } else {
            last_was_space = false;
        }
        out.push(mapped);
    }

    let trimmed = truncate_to_bytes(
        out.trim_matches(|c: char| c == '.' || c == ' '),
        MAX_FILE_NAME_BYTES,
    )
    .trim_end_matches([' ', '.']);

    if trimmed.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Longest prefix of `s` that fits in `max_bytes` without splitting a character
fn truncate_to_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let end = (0..=max_bytes)
        .rev()
        .find(|&i| s.is_char_boundary(i))
        .unwrap_or(0);
    &s[..end]
}

/// Move a file, falling back to copy + delete when a rename is not possible
/// (e.g. source and destination are on different filesystems)
pub async fn move_file(source: &Path, destination: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(source, destination).await {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            tracing::debug!(
                ?source,
                ?destination,
                error = %rename_err,
                "rename failed, falling back to copy"
            );
            tokio::fs::copy(source, destination).await?;
            tokio::fs::remove_file(source).await
        }
    }
}

/// Remove a file or directory tree, logging (not returning) failures
///
/// A path that is already gone is not an error.
pub async fn remove_path_quietly(path: &Path) {
    let result = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(?path, error = %e, "failed to clean up intermediate files");
    }
}
