//! # cfcontrol
//!
//! Chromecast playback control and device discovery for CastFollow.
//!
//! The [`MediaTarget`] trait is the seam between the playback session and
//! the device it drives: the session only needs to load a stream URL, poll
//! the player state and stop playback. [`ChromecastTarget`] implements it
//! over the Cast protocol (Protocol Buffers over TLS) via `rust_cast`.
//!
//! Devices are located by friendly name with [`discover_cast_host`], which
//! listens for `_googlecast._tcp.local` mDNS announcements. Chromecast
//! devices advertise their friendly name in the `fn` TXT record.

mod chromecast;
mod discovery;
mod error;
mod ip;
mod target;

pub use chromecast::ChromecastTarget;
pub use discovery::{CastHost, discover_cast_host, parse_cast_response};
pub use error::ControlError;
pub use ip::guess_local_ip;
pub use target::{MediaItem, MediaTarget, PlayerState};
