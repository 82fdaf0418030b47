/*!
    Opaque decoder configuration for one track.
*/

use ffmpeg_next::codec;

use media_types::{Rational, TrackKind};

/**
    Everything a decoder needs to be configured for a track: the codec
    parameters as read from the container, and the time base the track's
    sample timestamps are expressed in.
*/
#[derive(Clone)]
pub struct CodecConfig {
    parameters: codec::Parameters,
    time_base: Rational,
    kind: TrackKind,
}

impl CodecConfig {
    pub(crate) fn new(parameters: codec::Parameters, time_base: Rational, kind: TrackKind) -> Self {
        Self {
            parameters,
            time_base,
            kind,
        }
    }

    pub fn parameters(&self) -> codec::Parameters {
        self.parameters.clone()
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }
}

impl std::fmt::Debug for CodecConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecConfig")
            .field("codec_id", &self.parameters.id())
            .field("time_base", &self.time_base)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
