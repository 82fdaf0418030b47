/*!
    Conversion settings.

    Every field has a default, so a YAML file only needs to name what it
    changes:

    ```yaml
    output_dir: /srv/media/reversed
    pacing: wall-clock
    progress_bar: true
    ```
*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/**
    How presentation timestamps of produced video frames advance.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Pacing {
    /// One frame interval per produced frame
    #[default]
    FrameRate,
    /// Elapsed time since production began
    WallClock,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ReverseConfig {
    /// Where finished files are published.
    pub output_dir: PathBuf,
    /// Parent directory of the per-run workspace.
    pub work_dir: PathBuf,
    pub audio_bit_rate: u64,
    /// Used when the source does not declare a bit rate.
    pub fallback_video_bit_rate: u64,
    pub fallback_frame_rate: u32,
    pub fallback_width: u32,
    pub fallback_height: u32,
    pub pacing: Pacing,
    /// Upper bound for one encoder poll, in milliseconds.
    pub encoder_timeout_ms: u64,
    /// Decoded frames the frame source keeps around.
    pub frame_cache: usize,
    pub progress_bar: bool,
    pub file_prefix: String,
}

impl Default for ReverseConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            work_dir: std::env::temp_dir(),
            audio_bit_rate: 192_000,
            fallback_video_bit_rate: 3_000_000,
            fallback_frame_rate: 30,
            fallback_width: 1280,
            fallback_height: 720,
            pacing: Pacing::default(),
            encoder_timeout_ms: 10,
            frame_cache: 90,
            progress_bar: false,
            file_prefix: "reverse_video".to_string(),
        }
    }
}

impl ReverseConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config YAML: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // an empty document deserializes to unit, not to an empty map
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn encoder_timeout(&self) -> Duration {
        Duration::from_millis(self.encoder_timeout_ms)
    }
}

fn default_output_dir() -> PathBuf {
    dirs::video_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("ReverseVideo")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = ReverseConfig::from_yaml(
            "output_dir: /tmp/out\npacing: wall-clock\nframe_cache: 12\n",
        )
        .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.pacing, Pacing::WallClock);
        assert_eq!(config.frame_cache, 12);
        assert_eq!(config.audio_bit_rate, 192_000);
        assert_eq!(config.file_prefix, "reverse_video");
    }

    #[test]
    fn empty_yaml_is_default() {
        let config = ReverseConfig::from_yaml("  \n").unwrap();
        assert_eq!(config.pacing, Pacing::FrameRate);
        assert_eq!(config.encoder_timeout(), Duration::from_millis(10));
        assert!(config.output_dir.ends_with("ReverseVideo"));
    }

    #[test]
    fn unknown_pacing_is_rejected() {
        assert!(ReverseConfig::from_yaml("pacing: sometimes\n").is_err());
    }
}
