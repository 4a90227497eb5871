//! Combining separately downloaded audio and video into one container
//!
//! The core abstraction is the [`Muxer`] trait. Two implementations are provided:
//!
//! - [`FfmpegMuxer`]: runs an external `ffmpeg` binary (stream copy, no re-encode)
//! - [`UnavailableMuxer`]: stand-in when no ffmpeg is available
//!
//! [`muxer_from_config`] picks one from [`ToolsConfig`].

mod ffmpeg;
mod traits;
mod unavailable;

pub use ffmpeg::FfmpegMuxer;
pub use traits::Muxer;
pub use unavailable::UnavailableMuxer;

use crate::config::ToolsConfig;
use std::sync::Arc;

/// Choose a muxer: explicit `ffmpeg_path`, then a PATH lookup if allowed, else unavailable
pub fn muxer_from_config(tools: &ToolsConfig) -> Arc<dyn Muxer> {
    if let Some(ref ffmpeg_path) = tools.ffmpeg_path {
        Arc::new(FfmpegMuxer::new(ffmpeg_path.clone()))
    } else if tools.search_path {
        FfmpegMuxer::from_path()
            .map(|m| Arc::new(m) as Arc<dyn Muxer>)
            .unwrap_or_else(|| Arc::new(UnavailableMuxer))
    } else {
        Arc::new(UnavailableMuxer)
    }
}
