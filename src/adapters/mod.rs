//! Adapter implementations for port traits.
//!
//! - `live/` - HTTP generation service
//! - `local/` - locally loaded pipeline
//! - `recording/` - Record interactions to cassettes
//! - `replaying/` - Replay interactions from cassettes

pub mod live;
pub mod local;
pub mod recording;
pub mod replaying;
