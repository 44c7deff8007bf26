//! Types d'erreurs pour cfsession

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("uuid {0} not known")]
    UnknownUuid(String),

    #[error("no cast device for room {0}")]
    NoDeviceForRoom(String),

    #[error("no play session for uuid {0}")]
    NoSession(String),

    #[error("the query resolved to an empty queue")]
    EmptyQueue,

    #[error("session is not playing")]
    NotPlaying,

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("device error: {0}")]
    Device(#[from] anyhow::Error),

    #[error(transparent)]
    Buffer(#[from] cfbuffer::BufferError),

    #[error(transparent)]
    Offset(#[from] cfmp3::OffsetError),
}

/// Type Result spécialisé pour cfsession
pub type Result<T> = std::result::Result<T, SessionError>;
