/*!
    Error type for a conversion run.
*/

use std::fmt;

use thiserror::Error as ThisError;

/**
    The independent halves of a conversion.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Branch {
    Audio,
    Video,
    Merge,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Merge => "merge",
        })
    }
}

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Media(#[from] media_types::Error),

    /// PCM data whose length is not a whole number of frames.
    #[error("pcm data of {len} bytes is not a whole number of {frame_size}-byte frames")]
    PartialFrame { len: u64, frame_size: usize },

    #[error("{branch} branch failed: {source}")]
    Branch {
        branch: Branch,
        #[source]
        source: Box<Error>,
    },

    /// A branch task panicked or was aborted.
    #[error("branch task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("conversion cancelled")]
    Cancelled,
}

impl Error {
    pub fn branch(branch: Branch, source: Error) -> Self {
        Self::Branch {
            branch,
            source: Box::new(source),
        }
    }

    fn root(&self) -> &Error {
        match self {
            Self::Branch { source, .. } => source.root(),
            other => other,
        }
    }

    /// Missing or unusable source metadata.
    pub fn is_configuration(&self) -> bool {
        matches!(self.root(), Self::Media(media_types::Error::Configuration(_)))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.root(),
            Self::Cancelled | Self::Media(media_types::Error::Cancelled)
        )
    }

    /// A codec or muxer was used outside its lifecycle.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self.root(), Self::Media(e) if e.is_invalid_state())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
