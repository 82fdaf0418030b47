/*!
    Error type shared by the media crates.
*/

use thiserror::Error as ThisError;

/**
    Errors produced by extractors, codecs and muxers.
*/
#[derive(Debug, ThisError)]
pub enum Error {
    /// Source metadata is missing or unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An operation was invoked outside the states in which it is valid.
    #[error("{component}: `{operation}` is not valid in state {state}")]
    InvalidState {
        component: &'static str,
        operation: &'static str,
        state: String,
    },

    /// The underlying codec or container library reported a failure.
    #[error("codec error: {0}")]
    Codec(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Work stopped because cancellation was requested.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    pub fn invalid_state(
        component: &'static str,
        operation: &'static str,
        state: impl std::fmt::Debug,
    ) -> Self {
        Self::InvalidState {
            component,
            operation,
            state: format!("{state:?}"),
        }
    }

    /**
        Returns true for usage errors: calls made on a codec or muxer outside
        its valid lifecycle state.
    */
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_message_names_operation() {
        let err = Error::invalid_state("muxer", "write_sample", "Configured");
        assert!(err.is_invalid_state());
        assert_eq!(
            err.to_string(),
            "muxer: `write_sample` is not valid in state \"Configured\""
        );
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_invalid_state());
    }
}
