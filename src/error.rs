use std::fmt;
use thiserror::Error;

/// Why a query could not be turned into a playable song.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveErrorKind {
    /// Nothing matched the query, or the URL points nowhere.
    NotFound,
    /// The resolver could not reach its backend.
    NetworkFailure,
    /// Age-restricted, region-blocked, private or otherwise unavailable.
    Restricted,
}

impl fmt::Display for ResolveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotFound => "not found",
            Self::NetworkFailure => "network failure",
            Self::Restricted => "restricted",
        };
        f.write_str(label)
    }
}

/// Errors produced by the playback core and the sources feeding it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MusicError {
    /// A query or playlist entry could not be resolved.
    #[error("could not resolve track ({kind}): {reason}")]
    Resolution {
        kind: ResolveErrorKind,
        reason: String,
    },

    /// A 1-based queue position outside `[1, len]`.
    #[error("position {index} is out of range (queue has {len} songs)")]
    OutOfRange { index: usize, len: usize },

    /// An argument outside its accepted domain, such as a volume above 1.0.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A control command was issued while no voice connection is attached.
    #[error("not connected to a voice channel")]
    NotConnected,

    /// The audio transport failed to open or control a track.
    #[error("audio sink error: {0}")]
    Sink(String),

    /// The session has already left its voice channel.
    #[error("voice session is closed")]
    SessionClosed,
}

impl MusicError {
    pub fn resolution(kind: ResolveErrorKind, reason: impl Into<String>) -> Self {
        Self::Resolution {
            kind,
            reason: reason.into(),
        }
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::resolution(ResolveErrorKind::NotFound, reason)
    }
}

pub type MusicResult<T> = Result<T, MusicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_error_names_its_kind() {
        let err = MusicError::resolution(ResolveErrorKind::Restricted, "Sign in to confirm your age");
        assert_eq!(
            err.to_string(),
            "could not resolve track (restricted): Sign in to confirm your age"
        );
    }

    #[test]
    fn out_of_range_mentions_queue_length() {
        let err = MusicError::OutOfRange { index: 5, len: 3 };
        assert!(err.to_string().contains("queue has 3 songs"));
    }
}
