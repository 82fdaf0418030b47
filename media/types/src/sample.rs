/*!
    Encoded samples and timestamp arithmetic.
*/

use std::time::Duration;

/**
    A rational number, used for time bases and frame rates.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    /// One microsecond; the time base every timestamp is normalized to at API boundaries.
    pub const MICROS: Rational = Rational::new(1, 1_000_000);

    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// The reciprocal, e.g. frame rate to frame duration.
    pub const fn invert(self) -> Self {
        Self {
            num: self.den,
            den: self.num,
        }
    }

    /**
        Rescale a timestamp from one time base to another, rounding to nearest.
    */
    pub fn rescale(ts: i64, from: Rational, to: Rational) -> i64 {
        if from == to {
            return ts;
        }
        let num = ts as i128 * from.num as i128 * to.den as i128;
        let den = from.den as i128 * to.num as i128;
        if den == 0 {
            return 0;
        }
        let half = den.abs() / 2;
        let rounded = if (num >= 0) == (den > 0) {
            (num.abs() + half) / den.abs()
        } else {
            -((num.abs() + half) / den.abs())
        };
        rounded as i64
    }

    /// Convert a timestamp in this time base to microseconds.
    pub fn to_micros(self, ts: i64) -> i64 {
        Self::rescale(ts, self, Self::MICROS)
    }

    /// Convert microseconds to a timestamp in this time base.
    pub fn from_micros(self, micros: i64) -> i64 {
        Self::rescale(micros, Self::MICROS, self)
    }

    /// Convert a timestamp in this time base to a [`Duration`], clamping negatives to zero.
    pub fn to_duration(self, ts: i64) -> Duration {
        Duration::from_micros(self.to_micros(ts).max(0) as u64)
    }
}

/**
    Which kind of track a sample or descriptor belongs to.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

/**
    Per-sample flags carried from encoder to muxer.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SampleFlags {
    pub keyframe: bool,
    /// Decoder initialization data rather than playable media.
    pub codec_config: bool,
    pub end_of_stream: bool,
}

impl SampleFlags {
    pub const KEYFRAME: SampleFlags = SampleFlags {
        keyframe: true,
        codec_config: false,
        end_of_stream: false,
    };
}

/**
    One compressed sample of an elementary stream.

    Timestamps are expressed in `time_base` units. Within one encoder run
    they start at zero and increase strictly in generation order.
*/
#[derive(Clone, Debug)]
pub struct EncodedSample {
    pub data: Vec<u8>,
    pub pts: i64,
    pub dts: i64,
    pub duration: i64,
    pub time_base: Rational,
    pub flags: SampleFlags,
    pub kind: TrackKind,
}

impl EncodedSample {
    pub fn presentation_micros(&self) -> i64 {
        self.time_base.to_micros(self.pts)
    }

    pub fn decode_micros(&self) -> i64 {
        self.time_base.to_micros(self.dts)
    }

    pub fn is_keyframe(&self) -> bool {
        self.flags.keyframe
    }

    pub fn is_codec_config(&self) -> bool {
        self.flags.codec_config
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
