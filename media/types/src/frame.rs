/*!
    Raw (uncompressed) frame types.
*/

use crate::{PixelFormat, Rational, SampleFormat};

/**
    A raw video frame with tightly packed planes.

    Planar formats store their planes back to back (Y, then U, then V).
*/
#[derive(Clone, Debug)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
    /// Presentation timestamp in `time_base` units.
    pub pts: Option<i64>,
    pub time_base: Rational,
}

impl VideoFrame {
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
        pts: Option<i64>,
        time_base: Rational,
    ) -> Self {
        Self {
            width,
            height,
            format,
            data,
            pts,
            time_base,
        }
    }

    pub fn pts_micros(&self) -> Option<i64> {
        self.pts.map(|pts| self.time_base.to_micros(pts))
    }

    /// True when `data` holds exactly one frame of the declared size and format.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.format.frame_size(self.width, self.height)
    }
}

/**
    A chunk of interleaved PCM audio.
*/
#[derive(Clone, Debug)]
pub struct AudioFrame {
    /// Interleaved sample bytes, native endianness.
    pub data: Vec<u8>,
    /// Number of samples per channel.
    pub samples: usize,
    pub sample_rate: u32,
    pub channels: u16,
    pub format: SampleFormat,
    pub pts: Option<i64>,
    pub time_base: Rational,
}

impl AudioFrame {
    pub fn new(
        data: Vec<u8>,
        samples: usize,
        sample_rate: u32,
        channels: u16,
        format: SampleFormat,
        pts: Option<i64>,
        time_base: Rational,
    ) -> Self {
        Self {
            data,
            samples,
            sample_rate,
            channels,
            format,
            pts,
            time_base,
        }
    }

    /// Bytes per interleaved frame (one sample for each channel).
    pub fn frame_size(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }

    pub fn pts_micros(&self) -> Option<i64> {
        self.pts.map(|pts| self.time_base.to_micros(pts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_frame_well_formed() {
        let frame = VideoFrame::new(
            2,
            2,
            PixelFormat::Rgba,
            vec![0; 16],
            Some(0),
            Rational::MICROS,
        );
        assert!(frame.is_well_formed());

        let short = VideoFrame { data: vec![0; 15], ..frame };
        assert!(!short.is_well_formed());
    }

    #[test]
    fn audio_frame_size_and_pts() {
        let frame = AudioFrame::new(
            vec![0; 4 * 2 * 10],
            10,
            48_000,
            2,
            SampleFormat::F32,
            Some(48_000),
            Rational::new(1, 48_000),
        );
        assert_eq!(frame.frame_size(), 8);
        assert_eq!(frame.pts_micros(), Some(1_000_000));
    }
}
