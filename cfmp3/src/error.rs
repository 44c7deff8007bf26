//! Types d'erreurs pour cfmp3

/// Errors that can occur while resolving an elapsed time to a byte offset.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum OffsetError {
    /// The stream ended before the requested elapsed time was covered.
    #[error("no frame found at the requested elapsed time")]
    NotFound,

    /// The underlying buffer failed while scanning.
    #[error(transparent)]
    Buffer(#[from] cfbuffer::BufferError),
}

/// Type Result spécialisé pour cfmp3
pub type Result<T> = std::result::Result<T, OffsetError>;
