//! Muxer backed by an external ffmpeg binary

use super::traits::Muxer;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Longest stderr excerpt kept in an error message
const MAX_STDERR_CHARS: usize = 500;

/// Muxes by stream-copying with `ffmpeg`
///
/// Runs `ffmpeg -y -v error -i <video> -i <audio> -map 0:v:0 -map 1:a:0 -c copy <output>`.
///
/// ```no_run
/// use lite_dl::muxing::FfmpegMuxer;
/// use std::path::PathBuf;
///
/// // Explicit path
/// let muxer = FfmpegMuxer::new(PathBuf::from("/usr/bin/ffmpeg"));
///
/// // Or auto-discover from PATH
/// let muxer = FfmpegMuxer::from_path().expect("ffmpeg not found in PATH");
/// ```
pub struct FfmpegMuxer {
    binary_path: PathBuf,
}

impl FfmpegMuxer {
    /// Create a muxer using the ffmpeg binary at `binary_path`
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Look for `ffmpeg` in PATH
    pub fn from_path() -> Option<Self> {
        which::which("ffmpeg").ok().map(Self::new)
    }

    /// Path of the binary this muxer runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    fn command(&self, video: &Path, audio: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.arg("-y")
            .args(["-v", "error"])
            .arg("-i")
            .arg(video)
            .arg("-i")
            .arg(audio)
            .args(["-map", "0:v:0", "-map", "1:a:0", "-c", "copy"])
            .arg(output)
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> crate::Result<()> {
        tracing::debug!(?video, ?audio, ?output, binary = ?self.binary_path, "running ffmpeg");

        let result = self
            .command(video, audio, output)
            .output()
            .await
            .map_err(|e| crate::Error::ExternalTool(format!("Failed to execute ffmpeg: {}", e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let excerpt: String = stderr.trim().chars().take(MAX_STDERR_CHARS).collect();
            return Err(crate::Error::ExternalTool(format!(
                "ffmpeg exited with {}: {}",
                result.status, excerpt
            )));
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(crate::Error::ExternalTool(format!(
                "ffmpeg reported success but produced no file at {}",
                output.display()
            )));
        }

        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_maps_first_video_and_first_audio_track() {
        let muxer = FfmpegMuxer::new(PathBuf::from("/opt/ffmpeg"));
        let cmd = muxer.command(Path::new("v.part"), Path::new("a.part"), Path::new("o.mp4"));
        let std_cmd = cmd.as_std();

        assert_eq!(std_cmd.get_program(), "/opt/ffmpeg");
        let args: Vec<_> = std_cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-y", "-v", "error", "-i", "v.part", "-i", "a.part", "-map", "0:v:0", "-map",
                "1:a:0", "-c", "copy", "o.mp4"
            ]
        );
    }

    #[test]
    fn test_from_path_consistency_with_which_crate() {
        let which_result = which::which("ffmpeg");
        let from_path_result = FfmpegMuxer::from_path();

        assert_eq!(
            which_result.is_ok(),
            from_path_result.is_some(),
            "from_path() should return Some if and only if which::which() succeeds"
        );
        if let (Ok(expected), Some(muxer)) = (which_result, from_path_result) {
            assert_eq!(muxer.binary_path(), expected.as_path());
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_external_tool_error() {
        let muxer = FfmpegMuxer::new(PathBuf::from("/nonexistent/ffmpeg-xyz"));
        let temp_dir = tempfile::tempdir().unwrap();

        let result = muxer
            .mux(
                &temp_dir.path().join("v"),
                &temp_dir.path().join("a"),
                &temp_dir.path().join("o.mp4"),
            )
            .await;

        match result {
            Err(crate::Error::ExternalTool(msg)) => {
                assert!(msg.contains("Failed to execute ffmpeg"), "got: {msg}")
            }
            other => panic!("expected ExternalTool error, got {other:?}"),
        }
    }

    // Integration tests that require an actual ffmpeg binary
    // Run with: cargo test --lib muxing::ffmpeg -- --ignored

    #[tokio::test]
    #[ignore] // Requires ffmpeg binary in PATH
    async fn test_mux_generated_tracks() {
        let Some(muxer) = FfmpegMuxer::from_path() else {
            println!("Skipping test: ffmpeg binary not found in PATH");
            return;
        };
        let temp_dir = tempfile::tempdir().unwrap();
        let video = temp_dir.path().join("v.mp4");
        let audio = temp_dir.path().join("a.m4a");
        let output = temp_dir.path().join("out.mp4");

        let status = Command::new(muxer.binary_path())
            .args(["-y", "-v", "error", "-f", "lavfi", "-i", "testsrc=duration=1:size=64x64"])
            .arg("-an")
            .arg(&video)
            .status()
            .await
            .unwrap();
        assert!(status.success());
        let status = Command::new(muxer.binary_path())
            .args(["-y", "-v", "error", "-f", "lavfi", "-i", "sine=duration=1"])
            .args(["-c:a", "aac"])
            .arg(&audio)
            .status()
            .await
            .unwrap();
        assert!(status.success());

        muxer.mux(&video, &audio, &output).await.unwrap();
        assert!(std::fs::metadata(&output).unwrap().len() > 0);
    }

    #[tokio::test]
    #[ignore] // Requires ffmpeg binary in PATH
    async fn test_mux_with_garbage_input_fails() {
        let Some(muxer) = FfmpegMuxer::from_path() else {
            println!("Skipping test: ffmpeg binary not found in PATH");
            return;
        };
        let temp_dir = tempfile::tempdir().unwrap();
        let video = temp_dir.path().join("v.part");
        let audio = temp_dir.path().join("a.part");
        std::fs::write(&video, b"not a video").unwrap();
        std::fs::write(&audio, b"not audio").unwrap();

        let result = muxer
            .mux(&video, &audio, &temp_dir.path().join("o.mp4"))
            .await;
        assert!(matches!(result, Err(crate::Error::ExternalTool(_))));
    }
}
