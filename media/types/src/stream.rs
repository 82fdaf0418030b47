/*!
    Stream descriptors.
*/

use std::time::Duration;

use crate::{CodecId, PixelFormat, Rational, SampleFormat, TrackKind};

/**
    Video-specific stream parameters.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct VideoParams {
    pub width: u32,
    pub height: u32,
    /// Frame rate (may be unavailable for variable-rate sources).
    pub frame_rate: Option<Rational>,
    pub pixel_format: PixelFormat,
}

/**
    Audio-specific stream parameters.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct AudioParams {
    pub sample_rate: u32,
    pub channels: u16,
    /// Sample format, when the producer reports one.
    pub sample_format: Option<SampleFormat>,
    /// Encoder delay in samples. Timestamps of priming samples are negative,
    /// so decoded audio starts at zero without them.
    pub priming: u32,
}

impl AudioParams {
    /**
        Bytes in one interleaved PCM frame (one sample for every channel),
        if the sample format is known.
    */
    pub fn frame_size(&self) -> Option<usize> {
        self.sample_format
            .map(|format| format.bytes_per_sample() * self.channels as usize)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MediaParams {
    Video(VideoParams),
    Audio(AudioParams),
}

/**
    Metadata describing one track.

    Read from a source container, or announced by a codec when its output
    format becomes known. Immutable once produced.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct StreamDescriptor {
    pub codec_id: CodecId,
    /// Time base of the track's timestamps.
    pub time_base: Rational,
    /// Total duration (may be unavailable).
    pub duration: Option<Duration>,
    /// Bit rate in bits per second, if known.
    pub bit_rate: Option<u64>,
    /// Codec-specific configuration (SPS/PPS for H.264, AudioSpecificConfig for AAC).
    pub extradata: Option<Vec<u8>>,
    pub media: MediaParams,
}

impl StreamDescriptor {
    pub fn kind(&self) -> TrackKind {
        match self.media {
            MediaParams::Video(_) => TrackKind::Video,
            MediaParams::Audio(_) => TrackKind::Audio,
        }
    }

    pub fn video(&self) -> Option<&VideoParams> {
        match &self.media {
            MediaParams::Video(video) => Some(video),
            MediaParams::Audio(_) => None,
        }
    }

    pub fn audio(&self) -> Option<&AudioParams> {
        match &self.media {
            MediaParams::Audio(audio) => Some(audio),
            MediaParams::Video(_) => None,
        }
    }

    pub fn duration_micros(&self) -> Option<i64> {
        self.duration.map(|d| d.as_micros() as i64)
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.audio().map(|a| a.sample_rate)
    }

    pub fn channel_count(&self) -> Option<u16> {
        self.audio().map(|a| a.channels)
    }

    pub fn width(&self) -> Option<u32> {
        self.video().map(|v| v.width)
    }

    pub fn height(&self) -> Option<u32> {
        self.video().map(|v| v.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_descriptor(format: Option<SampleFormat>) -> StreamDescriptor {
        StreamDescriptor {
            codec_id: CodecId::Aac,
            time_base: Rational::new(1, 44_100),
            duration: Some(Duration::from_millis(2_000)),
            bit_rate: Some(128_000),
            extradata: None,
            media: MediaParams::Audio(AudioParams {
                sample_rate: 44_100,
                channels: 2,
                sample_format: format,
                priming: 0,
            }),
        }
    }

    #[test]
    fn accessors_follow_media_kind() {
        let desc = audio_descriptor(Some(SampleFormat::F32));
        assert_eq!(desc.kind(), TrackKind::Audio);
        assert_eq!(desc.sample_rate(), Some(44_100));
        assert_eq!(desc.channel_count(), Some(2));
        assert_eq!(desc.width(), None);
        assert_eq!(desc.duration_micros(), Some(2_000_000));
    }

    #[test]
    fn audio_frame_size_needs_sample_format() {
        let known = audio_descriptor(Some(SampleFormat::S16));
        assert_eq!(known.audio().and_then(AudioParams::frame_size), Some(4));

        let unknown = audio_descriptor(None);
        assert_eq!(unknown.audio().and_then(AudioParams::frame_size), None);
    }
}
