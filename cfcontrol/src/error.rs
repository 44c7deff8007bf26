//! Types d'erreurs pour cfcontrol

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("no cast device named '{0}' found")]
    DeviceNotFound(String),

    #[error("mDNS discovery failed: {0}")]
    Discovery(String),

    #[error("Chromecast Error: {0}")]
    Chromecast(String),
}
