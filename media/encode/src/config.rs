/*!
    Encoder configuration.
*/

use std::time::Duration;

use media_types::Rational;

/**
    x264 speed preset. Slower presets compress better.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EncoderPreset {
    Ultrafast,
    Veryfast,
    Fast,
    #[default]
    Medium,
    Slow,
}

impl EncoderPreset {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ultrafast => "ultrafast",
            Self::Veryfast => "veryfast",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
        }
    }
}

/**
    H.264 encoder settings. Input frames are YUV 4:2:0 at exactly
    `width`×`height`; B-frames are disabled so output arrives in
    presentation order.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct VideoEncoderConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: Rational,
    /// Target bit rate in bits per second.
    pub bit_rate: u64,
    /// Distance between keyframes.
    pub keyframe_interval: Duration,
    pub preset: EncoderPreset,
}

impl VideoEncoderConfig {
    pub fn h264(width: u32, height: u32, frame_rate: Rational) -> Self {
        Self {
            width,
            height,
            frame_rate,
            bit_rate: 3_000_000,
            keyframe_interval: Duration::from_secs(1),
            preset: EncoderPreset::default(),
        }
    }

    pub fn with_bit_rate(mut self, bit_rate: u64) -> Self {
        self.bit_rate = bit_rate;
        self
    }

    pub fn with_keyframe_interval(mut self, interval: Duration) -> Self {
        self.keyframe_interval = interval;
        self
    }

    pub fn with_preset(mut self, preset: EncoderPreset) -> Self {
        self.preset = preset;
        self
    }

    /// Keyframe interval in frames, at least one.
    pub fn gop_size(&self) -> u32 {
        let frames = self.keyframe_interval.as_secs_f64() * self.frame_rate.to_f64();
        (frames.round() as u32).max(1)
    }
}

/**
    AAC-LC encoder settings.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioEncoderConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_rate: u64,
}

impl AudioEncoderConfig {
    pub fn aac(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bit_rate: 192_000,
        }
    }

    pub fn with_bit_rate(mut self, bit_rate: u64) -> Self {
        self.bit_rate = bit_rate;
        self
    }
}
