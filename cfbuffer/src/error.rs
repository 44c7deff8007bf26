//! Types d'erreurs pour cfbuffer

/// Errors reported by the shared buffer and its readers.
///
/// Terminal upstream failures are cloned into every reader, so the variants
/// carry owned data rather than source errors.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("seek requested after reading started")]
    SeekAfterRead,

    #[error("upstream fetch failed: {0}")]
    Upstream(String),

    #[error("upstream returned HTTP status {0}")]
    HttpStatus(u16),
}

/// Type Result spécialisé pour cfbuffer
pub type Result<T> = std::result::Result<T, BufferError>;
