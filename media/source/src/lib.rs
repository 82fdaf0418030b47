/*!
    Container demuxing for the media crates.

    This crate handles the input side of the pipeline. It opens a container
    file, describes its tracks with [`StreamDescriptor`]s, and yields the
    compressed samples of one selected track. Decoders are created from the
    [`CodecConfig`] of a track.

    [`StreamDescriptor`]: media_types::StreamDescriptor
*/

mod codec_config;
pub mod convert;
mod extractor;
mod probe;

pub use codec_config::CodecConfig;
pub use extractor::Extractor;
pub use probe::{MediaInfo, probe};

/**
    Initialize the FFmpeg libraries. Cheap to call repeatedly.
*/
pub fn init() -> media_types::Result<()> {
    ffmpeg_next::init().map_err(|e| media_types::Error::codec(e.to_string()))
}
