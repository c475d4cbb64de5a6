//! Error type for the download pipeline.
//!
//! Library-level failures from the media and av crates are wrapped so the
//! orchestrator can surface one error per track.

use crate::fetch::FetchError;

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop one track from downloading.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The manifest could not be decoded, or a tag atom could not be built.
    #[error(transparent)]
    Media(#[from] trackforged_media::Error),

    /// One segment of the plan could not be fetched; the assembly is discarded.
    #[error("segment {index} ({url}) failed: {source}")]
    SegmentFetch {
        index: usize,
        url: String,
        #[source]
        source: FetchError,
    },

    /// The stream-info endpoint failed or returned something unusable.
    #[error("stream info error: {0}")]
    Resolve(String),

    /// The transcoding engine or workspace failed.
    #[error(transparent)]
    Av(#[from] trackforged_av::Error),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Convenience constructor for [`Error::SegmentFetch`].
    pub fn segment_fetch(index: usize, url: impl Into<String>, source: FetchError) -> Self {
        Error::SegmentFetch {
            index,
            url: url.into(),
            source,
        }
    }

    /// Convenience constructor for [`Error::Resolve`].
    pub fn resolve(message: impl Into<String>) -> Self {
        Error::Resolve(message.into())
    }

    /// Convenience constructor for [`Error::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}
