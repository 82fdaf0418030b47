/*!
    Source metadata with defaults applied.
*/

use std::path::Path;
use std::time::Duration;

use tracing::warn;

use media_source::MediaInfo;
use media_types::{AudioParams, Error as MediaError, Rational};

use crate::{ReverseConfig, Result};

/**
    Everything the two branches need to know about the source up front.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct SourceProfile {
    pub duration: Duration,
    /// The audio track's own duration, or `duration` when it declares none.
    pub audio_duration: Duration,
    pub width: u32,
    pub height: u32,
    pub frame_rate: Rational,
    pub video_bit_rate: u64,
    /// As declared by the container. The decoder's announced format replaces it.
    pub audio: AudioParams,
}

impl SourceProfile {
    /**
        Read the source's metadata without configuring any codec.

        An unreadable file, a missing track or a missing or zero duration is
        a configuration error. Missing video dimensions, frame rate and bit
        rate fall back to configured defaults.
    */
    pub fn read(input: &Path, config: &ReverseConfig) -> Result<Self> {
        let info = media_source::probe(input).map_err(|e| {
            MediaError::configuration(format!("cannot read {}: {e}", input.display()))
        })?;
        Self::from_info(&info, config)
    }

    pub fn from_info(info: &MediaInfo, config: &ReverseConfig) -> Result<Self> {
        let video = info
            .video
            .as_ref()
            .ok_or_else(|| MediaError::configuration("source has no video track"))?;
        let audio_track = info
            .audio
            .as_ref()
            .ok_or_else(|| MediaError::configuration("source has no audio track"))?;
        let audio = audio_track
            .audio()
            .ok_or_else(|| MediaError::configuration("source has no audio track"))?;

        let duration = video
            .duration
            .or(info.duration)
            .filter(|d| !d.is_zero())
            .ok_or_else(|| MediaError::configuration("source duration is missing or zero"))?;

        let audio_duration = audio_track
            .duration
            .filter(|d| !d.is_zero())
            .unwrap_or(duration);

        let params = video.video();
        let (width, height) = match params.map(|v| (v.width, v.height)) {
            Some((w, h)) if w > 0 && h > 0 => (w, h),
            _ => {
                warn!(
                    width = config.fallback_width,
                    height = config.fallback_height,
                    "source dimensions unavailable, using defaults"
                );
                (config.fallback_width, config.fallback_height)
            }
        };
        let frame_rate = match params.and_then(|v| v.frame_rate) {
            Some(rate) if rate.num > 0 && rate.den > 0 => rate,
            _ => {
                warn!(
                    fps = config.fallback_frame_rate,
                    "source frame rate unavailable, using default"
                );
                Rational::new(config.fallback_frame_rate as i32, 1)
            }
        };
        let video_bit_rate = match video.bit_rate.filter(|&b| b > 0) {
            Some(bit_rate) => bit_rate,
            None => {
                warn!(
                    bit_rate = config.fallback_video_bit_rate,
                    "source bit rate unavailable, using default"
                );
                config.fallback_video_bit_rate
            }
        };

        Ok(Self {
            duration,
            audio_duration,
            // 4:2:0 chroma needs even dimensions
            width: (width & !1).max(2),
            height: (height & !1).max(2),
            frame_rate,
            video_bit_rate,
            audio: audio.clone(),
        })
    }

    pub fn duration_micros(&self) -> i64 {
        self.duration.as_micros() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_types::{CodecId, MediaParams, PixelFormat, StreamDescriptor, VideoParams};

    fn info(duration: Option<Duration>, width: u32, bit_rate: Option<u64>) -> MediaInfo {
        MediaInfo {
            duration,
            video: Some(StreamDescriptor {
                codec_id: CodecId::H264,
                time_base: Rational::new(1, 15_360),
                duration,
                bit_rate,
                extradata: None,
                media: MediaParams::Video(VideoParams {
                    width,
                    height: 720,
                    frame_rate: None,
                    pixel_format: PixelFormat::Yuv420p,
                }),
            }),
            audio: Some(StreamDescriptor {
                codec_id: CodecId::Aac,
                time_base: Rational::new(1, 44_100),
                duration,
                bit_rate: None,
                extradata: None,
                media: MediaParams::Audio(AudioParams {
                    sample_rate: 44_100,
                    channels: 2,
                    sample_format: None,
                    priming: 0,
                }),
            }),
        }
    }

    #[test]
    fn zero_duration_is_a_configuration_error() {
        let config = ReverseConfig::default();
        let err = SourceProfile::from_info(&info(Some(Duration::ZERO), 1280, None), &config)
            .unwrap_err();
        assert!(err.is_configuration());
        let err = SourceProfile::from_info(&info(None, 1280, None), &config).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = ReverseConfig::default();
        let profile =
            SourceProfile::from_info(&info(Some(Duration::from_secs(2)), 0, None), &config)
                .unwrap();
        assert_eq!((profile.width, profile.height), (1280, 720));
        assert_eq!(profile.frame_rate, Rational::new(30, 1));
        assert_eq!(profile.video_bit_rate, 3_000_000);
        assert_eq!(profile.duration_micros(), 2_000_000);
        assert_eq!(profile.audio.sample_rate, 44_100);
    }

    #[test]
    fn declared_values_win_and_odd_sizes_round_down() {
        let config = ReverseConfig::default();
        let profile = SourceProfile::from_info(
            &info(Some(Duration::from_secs(1)), 641, Some(800_000)),
            &config,
        )
        .unwrap();
        assert_eq!(profile.width, 640);
        assert_eq!(profile.video_bit_rate, 800_000);
    }

    #[test]
    fn audio_duration_comes_from_the_audio_track() {
        let config = ReverseConfig::default();
        let mut source = info(Some(Duration::from_secs(2)), 1280, None);
        source.audio.as_mut().unwrap().duration = Some(Duration::from_millis(1_950));
        let profile = SourceProfile::from_info(&source, &config).unwrap();
        assert_eq!(profile.duration, Duration::from_secs(2));
        assert_eq!(profile.audio_duration, Duration::from_millis(1_950));

        source.audio.as_mut().unwrap().duration = None;
        let profile = SourceProfile::from_info(&source, &config).unwrap();
        assert_eq!(profile.audio_duration, Duration::from_secs(2));
    }

    #[test]
    fn missing_audio_track_is_a_configuration_error() {
        let mut source = info(Some(Duration::from_secs(1)), 1280, None);
        source.audio = None;
        let err = SourceProfile::from_info(&source, &ReverseConfig::default()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn unreadable_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"definitely not a container").unwrap();
        let err = SourceProfile::read(&path, &ReverseConfig::default()).unwrap_err();
        assert!(err.is_configuration());
    }
}
