/*!
    Decoders implementing [`media_types::Codec`].

    Both decoders are created from the [`CodecConfig`] of an extractor track
    and announce their real output format before the first frame. The audio
    decoder always produces interleaved PCM; the video decoder produces
    packed frames, converting layouts the pipeline does not model to
    YUV 4:2:0.

    [`CodecConfig`]: media_source::CodecConfig
*/

mod audio;
mod video;

pub use audio::AudioDecoder;
pub use video::VideoDecoder;

use ffmpeg_next::ffi;
use media_types::{Error, FeedStatus, Result};

/**
    Interpret the result of `send_packet`: EAGAIN means the decoder wants
    its output drained before it takes more input.
*/
pub(crate) fn feed_status(
    result: std::result::Result<(), ffmpeg_next::Error>,
) -> Result<FeedStatus> {
    match result {
        Ok(()) => Ok(FeedStatus::Accepted),
        Err(ffmpeg_next::Error::Other { errno }) if errno == ffi::EAGAIN => Ok(FeedStatus::Busy),
        Err(e) => Err(Error::codec(format!("send_packet failed: {e}"))),
    }
}

/**
    Interpret the result of `send_eof`. Returns false when the flush has to
    be retried after more output is drained.
*/
pub(crate) fn eof_sent(result: std::result::Result<(), ffmpeg_next::Error>) -> Result<bool> {
    match result {
        Ok(()) | Err(ffmpeg_next::Error::Eof) => Ok(true),
        Err(ffmpeg_next::Error::Other { errno }) if errno == ffi::EAGAIN => Ok(false),
        Err(e) => Err(Error::codec(format!("send_eof failed: {e}"))),
    }
}
