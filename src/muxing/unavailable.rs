//! Muxer used when no muxing backend exists

use super::traits::Muxer;
use async_trait::async_trait;
use std::path::Path;

/// Muxer that always reports `Error::NotSupported`
///
/// Selected when no ffmpeg binary is configured or found. Audio-only and other
/// single-stream tasks are unaffected; muxed tasks end as muxing failures.
///
/// ```
/// use lite_dl::muxing::{Muxer, UnavailableMuxer};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() {
/// let muxer = UnavailableMuxer;
/// assert!(!muxer.is_available());
/// let result = muxer.mux(Path::new("v"), Path::new("a"), Path::new("out.mp4")).await;
/// assert!(result.is_err());
/// # }
/// ```
pub struct UnavailableMuxer;

#[async_trait]
impl Muxer for UnavailableMuxer {
    async fn mux(&self, _video: &Path, _audio: &Path, _output: &Path) -> crate::Result<()> {
        Err(crate::Error::NotSupported(
            "muxing requires an ffmpeg binary. \
             Configure ffmpeg_path in config or ensure ffmpeg is in PATH."
                .into(),
        ))
    }

    fn is_available(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}
