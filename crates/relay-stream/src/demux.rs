//! # Demultiplexer
//!
//! Adapts a byte stream into a stream of [`StreamEvent`]s:
//!
//! 1. Frame lines with [`LineBuffer`] and strip prefixes with [`frame_payload`]
//! 2. Classify each payload with the stream's [`FrameDialect`]
//! 3. Drop malformed frames and unknown discriminators (logged at `debug`)
//! 4. On a terminal event, yield it and stop reading; the source is dropped
//! 5. On a read error, yield [`StreamEvent::Error`] and stop
//! 6. On source exhaustion without a terminal event, yield [`StreamEvent::Done`]
//!
//! Every stream produced here therefore ends with exactly one terminal event.

use std::fmt::Display;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use relay_core::StreamEvent;
use relay_core::text::truncate_str;
use tracing::{debug, warn};

use crate::dialect::FrameDialect;
use crate::framing::{LineBuffer, frame_payload};

/// Boxed event stream.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Options for [`demux_with_options`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DemuxOptions {
    /// Frame dialect of the source.
    pub dialect: FrameDialect,
    /// Classify an unterminated trailing fragment when the source ends.
    ///
    /// Off by default: a line only counts once its newline arrives.
    pub flush_trailing_fragment: bool,
}

impl DemuxOptions {
    /// Default options for `dialect`.
    pub fn for_dialect(dialect: FrameDialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }
}

/// Demultiplex `source` using `dialect`.
pub fn demux<S, E>(source: S, dialect: FrameDialect) -> EventStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    demux_with_options(source, DemuxOptions::for_dialect(dialect))
}

/// Demultiplex `source` with explicit options.
pub fn demux_with_options<S, E>(source: S, options: DemuxOptions) -> EventStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut source = Box::pin(source);
        let mut lines = LineBuffer::new();

        loop {
            while let Some(line) = lines.next_line() {
                if let Some(event) = classify_line(&line, options.dialect) {
                    let terminal = event.is_terminal();
                    yield event;
                    if terminal {
                        return;
                    }
                }
            }

            match source.next().await {
                Some(Ok(chunk)) => lines.push(&chunk),
                Some(Err(e)) => {
                    warn!(error = %e, "agent stream read failed");
                    yield StreamEvent::error(format!("stream read failed: {e}"));
                    return;
                }
                None => break,
            }
        }

        if options.flush_trailing_fragment {
            if let Some(rest) = lines.take_remaining() {
                if let Some(event) = classify_line(&rest, options.dialect) {
                    let terminal = event.is_terminal();
                    yield event;
                    if terminal {
                        return;
                    }
                }
            }
        }

        debug!("agent stream closed without terminal frame, treating as done");
        yield StreamEvent::Done;
    })
}

/// Classify one line, dropping anything that is not an event.
fn classify_line(line: &str, dialect: FrameDialect) -> Option<StreamEvent> {
    let payload = frame_payload(line)?;
    match dialect.classify(payload) {
        Ok(Some(event)) => Some(event),
        Ok(None) => {
            debug!(
                ?dialect,
                frame = truncate_str(payload, 100),
                "ignoring frame with unknown discriminator"
            );
            None
        }
        Err(e) => {
            debug!(
                ?dialect,
                error = %e,
                frame = truncate_str(payload, 100),
                "dropping malformed frame"
            );
            metrics::counter!("relay_stream_frames_dropped_total").increment(1);
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
