/*!
    Shared types for the media crates.

    This crate defines the vocabulary that crosses crate boundaries: stream
    descriptors, encoded samples, raw frames and the codec lifecycle contract.
    It has no dependency on FFmpeg, so the pipeline logic built on top of it
    can be exercised with fake codecs.
*/

mod codec;
mod error;
mod format;
mod frame;
mod sample;
mod stream;

pub use codec::{Codec, CodecEvent, CodecState, FeedStatus, FormatGate, Lifecycle};
pub use error::{Error, Result};
pub use format::{CodecId, PixelFormat, SampleFormat};
pub use frame::{AudioFrame, VideoFrame};
pub use sample::{EncodedSample, Rational, SampleFlags, TrackKind};
pub use stream::{AudioParams, MediaParams, StreamDescriptor, VideoParams};
