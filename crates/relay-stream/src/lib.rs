//! # relay-stream
//!
//! Turns a chunked response body into a sequence of [`StreamEvent`]s.
//!
//! - [`framing`]: newline framing over raw bytes and `data:` prefix stripping
//! - [`dialect`]: per-protocol classification of one frame into an event
//! - [`demux`]: the stream adapter enforcing the terminal-event rules
//!
//! [`StreamEvent`]: relay_core::StreamEvent

#![deny(unsafe_code)]

pub mod demux;
pub mod dialect;
pub mod framing;

pub use demux::{DemuxOptions, EventStream, demux, demux_with_options};
pub use dialect::{FrameDialect, FrameError};
pub use framing::{LineBuffer, MAX_LINE_BYTES, frame_payload};
