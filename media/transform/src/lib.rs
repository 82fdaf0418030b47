/*!
    Raw frame conversion.

    [`Scaler`] converts between pixel formats and sizes using libswscale.
    The [`planes`] module moves tightly packed [`VideoFrame`] data in and out
    of FFmpeg frames, which carry per-plane strides. [`SampleConverter`]
    prepares interleaved PCM for audio encoders.

    [`VideoFrame`]: media_types::VideoFrame
*/

pub mod audio;
pub mod planes;
mod scale;

pub use audio::SampleConverter;
pub use scale::{ScaleTarget, Scaler, ScalingAlgorithm};
