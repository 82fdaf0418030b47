/*!
    Pixel, sample and codec identifiers.
*/

/**
    Video pixel formats the pipeline moves around.

    Decoders may produce other layouts; those are converted before they
    reach the compositor.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// Planar YUV 4:2:0, 12bpp (encoder input)
    Yuv420p,
    /// Semi-planar YUV 4:2:0, 12bpp
    Nv12,
    /// Packed RGBA, 32bpp (compositor canvas)
    Rgba,
    /// Packed BGRA, 32bpp
    Bgra,
    /// Packed RGB, 24bpp
    Rgb24,
}

impl PixelFormat {
    /**
        Returns the number of bytes a tightly packed frame of the given size occupies.
    */
    pub const fn frame_size(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            Self::Yuv420p | Self::Nv12 => {
                let chroma = (width as usize).div_ceil(2) * (height as usize).div_ceil(2);
                pixels + 2 * chroma
            }
            Self::Rgba | Self::Bgra => pixels * 4,
            Self::Rgb24 => pixels * 3,
        }
    }

    pub const fn is_planar(self) -> bool {
        matches!(self, Self::Yuv420p | Self::Nv12)
    }
}

/**
    Audio sample formats.

    Raw PCM handed between pipeline stages is always interleaved, so the
    planar/packed distinction only exists inside the codec wrappers.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SampleFormat {
    /// Unsigned 8-bit integer
    U8,
    /// Signed 16-bit integer
    S16,
    /// Signed 32-bit integer
    S32,
    /// 32-bit floating point, range [-1.0, 1.0]
    F32,
    /// 64-bit floating point
    F64,
}

impl SampleFormat {
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::S16 => 2,
            Self::S32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

/**
    Codec identifiers.

    Only H.264 and AAC are produced by the encoders; the remaining variants
    describe what an extractor may find in a source container, or raw
    decoder output.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecId {
    H264,
    H265,
    Vp9,
    Av1,
    Mpeg4,
    Aac,
    Opus,
    Mp3,
    Flac,
    PcmS16Le,
    /// Uncompressed frames, as announced by decoders.
    Raw,
    Unknown,
}

impl CodecId {
    pub const fn is_video(self) -> bool {
        matches!(
            self,
            Self::H264 | Self::H265 | Self::Vp9 | Self::Av1 | Self::Mpeg4
        )
    }

    pub const fn is_audio(self) -> bool {
        matches!(
            self,
            Self::Aac | Self::Opus | Self::Mp3 | Self::Flac | Self::PcmS16Le
        )
    }
}
