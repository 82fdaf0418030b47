/*!
    Container writing.

    A [`Muxer`] is configured with tracks, started, fed samples and finally
    finalized. Calls made out of that order fail with
    [`Error::InvalidState`](media_types::Error::InvalidState) instead of
    producing a damaged file.
*/

mod muxer;
mod params;

pub use muxer::{MuxStats, Muxer, MuxerState};
