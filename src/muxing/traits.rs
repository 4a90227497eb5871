//! The muxing seam

use async_trait::async_trait;
use std::path::Path;

/// Combines a video-only and an audio-only file into one container
///
/// Implementations take the first video track of `video` and the first audio track of
/// `audio`, without re-encoding, and write `output`. A running mux is never interrupted;
/// callers check for cancellation before starting one.
///
/// # Examples
///
/// ```no_run
/// use lite_dl::muxing::{FfmpegMuxer, Muxer};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let muxer = FfmpegMuxer::from_path().ok_or("ffmpeg not found")?;
/// muxer
///     .mux(Path::new("v.part"), Path::new("a.part"), Path::new("clip.mp4"))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Muxer: Send + Sync {
    /// Write `output` from the first video track of `video` and the first audio track of `audio`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The external binary cannot be started or exits unsuccessfully
    /// - No output file was produced
    /// - Muxing is not supported by this implementation
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> crate::Result<()>;

    /// Whether this implementation can actually mux
    fn is_available(&self) -> bool;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
