//! Stream selection and output naming.

use std::path::{Path, PathBuf};

use crate::error::DownloadError;
use crate::extractor::{StreamDescriptor, StreamDetails};
use crate::stream::StreamRequest;
use crate::types::{DownloadOptions, DownloadType, StreamKind};
use crate::utils::sanitize_file_name;

/// Extension used when a stream's format gives nothing usable
const FALLBACK_EXTENSION: &str = "bin";
/// Longest extension kept from a container format
const MAX_EXTENSION_LEN: usize = 16;

/// One stream the task will retrieve
#[derive(Debug, Clone)]
pub(super) struct PlannedStream {
    pub(super) request: StreamRequest,
    /// Name of the intermediate file inside the task's temp dir
    pub(super) temp_name: String,
}

/// Everything decided once streams are resolved
#[derive(Debug, Clone)]
pub(super) struct TaskPlan {
    pub(super) streams: Vec<PlannedStream>,
    /// Final file name, extension included
    pub(super) file_name: String,
    /// Canonical output location (collisions are resolved at move time)
    pub(super) output_path: PathBuf,
    /// Sum of the sizes the extractor knew (0 if none)
    pub(super) total_bytes: u64,
    /// Extension of the final artifact
    pub(super) extension: String,
}

/// Pick the streams `download_type` needs and decide where the result goes
pub(super) fn plan_task(
    details: &StreamDetails,
    vid: &str,
    download_type: DownloadType,
    options: &DownloadOptions,
    download_dir: &Path,
) -> Result<TaskPlan, DownloadError> {
    let selected: Vec<StreamDescriptor> = match download_type {
        DownloadType::AudioOnly => vec![require(details.best_audio(), StreamKind::Audio, vid)?.clone()],
        DownloadType::VideoOnly => vec![
            require(
                details.best_video(options.max_video_height),
                StreamKind::Video,
                vid,
            )?
            .clone(),
        ],
        DownloadType::Muxed => vec![
            require(details.best_audio(), StreamKind::Audio, vid)?.clone(),
            require(
                details.best_video(options.max_video_height),
                StreamKind::Video,
                vid,
            )?
            .clone(),
        ],
        DownloadType::Thumbnail => {
            vec![require(details.thumbnail.as_ref(), StreamKind::Thumbnail, vid)?.clone()]
        }
        DownloadType::Subtitle => {
            let track = details
                .subtitle(options.subtitle_language.as_deref())
                .ok_or_else(|| {
                    let wanted = options.subtitle_language.as_deref().unwrap_or("any language");
                    DownloadError::connection(
                        format!("no subtitle stream available for {}", vid),
                        format!("no track in {}", wanted),
                    )
                })?;
            vec![track.descriptor()]
        }
    };

    // Muxed output takes the video container
    let primary = match download_type {
        DownloadType::Muxed => selected.iter().find(|s| s.kind == StreamKind::Video),
        _ => selected.first(),
    };
    let extension = primary
        .map(|s| file_extension(&s.format))
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());

    let base = options
        .file_name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .or_else(|| Some(details.title.as_str()).filter(|t| !t.trim().is_empty()))
        .unwrap_or(vid);
    let file_name = format!("{}.{}", sanitize_file_name(base), extension);
    let output_path = options
        .destination
        .as_deref()
        .unwrap_or(download_dir)
        .join(&file_name);

    let total_bytes = selected.iter().filter_map(|s| s.size).sum();
    let streams = selected
        .into_iter()
        .map(|s| PlannedStream {
            temp_name: format!("{}.{}", s.kind, file_extension(&s.format)),
            request: StreamRequest {
                url: s.url,
                kind: s.kind,
                expected_size: s.size,
            },
        })
        .collect();

    Ok(TaskPlan {
        streams,
        file_name,
        output_path,
        total_bytes,
        extension,
    })
}

fn require<'a>(
    stream: Option<&'a StreamDescriptor>,
    kind: StreamKind,
    vid: &str,
) -> Result<&'a StreamDescriptor, DownloadError> {
    stream.ok_or_else(|| {
        DownloadError::connection(
            format!("no {} stream available for {}", kind, vid),
            "extractor returned no matching rendition",
        )
    })
}

/// Lowercase alphanumeric extension derived from a container format
fn file_extension(format: &str) -> String {
    let ext: String = format
        .trim()
        .trim_start_matches('.')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(MAX_EXTENSION_LEN)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if ext.is_empty() {
        FALLBACK_EXTENSION.to_string()
    } else {
        ext
    }
}
