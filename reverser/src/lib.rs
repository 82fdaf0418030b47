/*!
    Reverse a video clip: both its picture and its sound play backwards.

    A conversion runs two independent branches and then joins them:

    ```text
    audio: Extractor -> AudioDecoder -> PCM file -> reverse frames -> AudioEncoder -> audio.mp4
    video: FrameSource -> Compositor -> VideoEncoder ------------------------------> video.mp4
    join:  merge_tracks(audio.mp4, video.mp4) -> publish
    ```

    [`Reverser::reverse`] is the entry point.
*/

pub mod audio;
mod cancel;
pub mod clock;
pub mod compositor;
mod config;
mod error;
pub mod frames;
pub mod merge;
pub mod pcm;
mod pipeline;
mod profile;
pub mod publish;
pub mod pump;
pub mod track;
pub mod video;
mod workspace;

pub use cancel::{CancelFlag, Canceller};
pub use config::{Pacing, ReverseConfig};
pub use error::{Branch, Error, Result};
pub use pipeline::{ReverseOutcome, Reverser};
pub use profile::SourceProfile;
pub use workspace::TempWorkspace;
