//! # cfsession
//!
//! The playback session layer of CastFollow: it ties the shared stream
//! buffer, the offset resolver and the cast device control together.
//!
//! A [`PlaySession`] sequences a queue of tracks for one user. The queue is
//! resolved from a [`Catalog`] search (album hits are expanded and
//! deduplicated by normalized title), each track's upstream stream is
//! captured once into a [`cfbuffer::SharedBuffer`], and the cast device
//! fetches the bytes back from this process over HTTP.
//!
//! The [`SessionContext`] holds the cross-session state: who is in which
//! room (presence), which cast device serves which room, and the active
//! sessions. When a user's presence changes rooms mid-playback the session
//! performs a handoff: stop the old device, resolve the elapsed time to a
//! byte offset with [`cfmp3::find_offset`], and resume on the new room's
//! device from a freshly seeked reader over the same buffer, without
//! re-downloading anything.
//!
//! [`session_router`] exposes the whole thing as axum routes, including the
//! `GET /stream/{uuid}` byte sink the devices pull from.

mod catalog;
mod context;
mod deps;
mod error;
mod model;
mod queue;
mod session;
mod sink;

pub use catalog::Catalog;
pub use context::SessionContext;
pub use deps::{
    CastConnector, HttpFetcher, Mp3Parsers, ParserFactory, StreamFetcher, TargetConnector,
};
pub use error::{Result, SessionError};
pub use model::{NowPlaying, SearchHit, Track};
pub use queue::resolve_queue;
pub use session::{PlaySession, SessionStatus};
pub use sink::session_router;
