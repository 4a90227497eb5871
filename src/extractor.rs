//! Stream-extraction collaborator
//!
//! Resolving a video id into downloadable renditions is done by an external library; the
//! orchestrator only sees the [`StreamExtractor`] trait and the plain descriptors below.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::StreamKind;

/// One downloadable rendition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Direct URL of the stream
    pub url: String,
    /// What the stream carries
    pub kind: StreamKind,
    /// Container format, used as the file extension (e.g. "m4a", "mp4", "webm")
    pub format: String,
    /// Codec name, if known
    #[serde(default)]
    pub codec: Option<String>,
    /// Average bitrate in bits per second (0 if unknown)
    #[serde(default)]
    pub bitrate: u64,
    /// Content length in bytes, if the extractor knows it
    #[serde(default)]
    pub size: Option<u64>,
    /// Frame height in pixels (video only)
    #[serde(default)]
    pub height: Option<u32>,
}

/// One subtitle track
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    /// Direct URL of the subtitle document
    pub url: String,
    /// Language code (e.g. "en", "pt-BR")
    pub language: String,
    /// Document format, used as the file extension (e.g. "vtt", "srt")
    pub format: String,
}

impl SubtitleTrack {
    /// The track as a transferable stream
    pub fn descriptor(&self) -> StreamDescriptor {
        StreamDescriptor {
            url: self.url.clone(),
            kind: StreamKind::Subtitle,
            format: self.format.clone(),
            codec: None,
            bitrate: 0,
            size: None,
            height: None,
        }
    }
}

/// Everything the extractor knows about one video
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamDetails {
    /// Video identifier the details belong to
    pub vid: String,
    /// Human-readable title (source of the default output file name)
    pub title: String,
    /// Audio-only renditions
    #[serde(default)]
    pub audio_streams: Vec<StreamDescriptor>,
    /// Video-only renditions
    #[serde(default)]
    pub video_streams: Vec<StreamDescriptor>,
    /// Best available thumbnail image
    #[serde(default)]
    pub thumbnail: Option<StreamDescriptor>,
    /// Available subtitle tracks
    #[serde(default)]
    pub subtitles: Vec<SubtitleTrack>,
}

/// Preferred container for audio-only output
const PREFERRED_AUDIO_FORMAT: &str = "m4a";
/// Preferred container for video-only and muxed output
const PREFERRED_VIDEO_FORMAT: &str = "mp4";

impl StreamDetails {
    /// Highest-bitrate audio stream, m4a preferred over other containers
    pub fn best_audio(&self) -> Option<&StreamDescriptor> {
        self.audio_streams.iter().max_by_key(|s| {
            (
                s.format.eq_ignore_ascii_case(PREFERRED_AUDIO_FORMAT),
                s.bitrate,
            )
        })
    }

    /// Tallest video stream not exceeding `max_height`, mp4 preferred, bitrate as tiebreak
    ///
    /// Streams with unknown height rank below every stream with a known height.
    pub fn best_video(&self, max_height: Option<u32>) -> Option<&StreamDescriptor> {
        self.video_streams
            .iter()
            .filter(|s| match (max_height, s.height) {
                (Some(max), Some(h)) => h <= max,
                _ => true,
            })
            .max_by_key(|s| {
                (
                    s.format.eq_ignore_ascii_case(PREFERRED_VIDEO_FORMAT),
                    s.height.unwrap_or(0),
                    s.bitrate,
                )
            })
    }

    /// Subtitle track in `language` (case-insensitive), or the first track if no language is given
    pub fn subtitle(&self, language: Option<&str>) -> Option<&SubtitleTrack> {
        match language {
            Some(lang) => self
                .subtitles
                .iter()
                .find(|t| t.language.eq_ignore_ascii_case(lang)),
            None => self.subtitles.first(),
        }
    }
}

/// Resolves a video id into its available streams
///
/// Implementations report any failure as [`Error::Extraction`](crate::Error::Extraction);
/// the orchestrator records it as a connection-category failure.
#[async_trait]
pub trait StreamExtractor: Send + Sync {
    /// Look up the streams of `vid`
    async fn extract(&self, vid: &str) -> Result<StreamDetails>;
}
