// src/relay/mod.rs
//! StreamRelay: turns an upstream newline-delimited JSON body into SSE frames.
//!
//! One relay owns one upstream stream and one downstream sink. Reading and
//! writing happen in a single sequence, so a slow client slows down upstream
//! consumption. Both suspension points (upstream read, downstream send) race
//! against a `CancellationToken`.

pub mod event;
pub mod line_buffer;

use std::fmt::Display;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use event::{decode_line, RelayFrame};
use line_buffer::LineBuffer;

/// Frames buffered between the relay and the response body.
/// Small on purpose: the relay should not run ahead of the client.
pub const FRAME_CHANNEL_CAPACITY: usize = 8;

/// Reason code for a line that outgrew the line buffer cap.
pub const LINE_TOO_LONG: &str = "line_too_long";

/// Body item type for the SSE response.
pub type SseChunk = Result<Bytes, io::Error>;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("relay_frames_total", "SSE frames emitted to clients.");
        describe_counter!(
            "relay_lines_dropped_total",
            "Upstream lines dropped because they could not be decoded."
        );
        describe_counter!(
            "relay_streams_total",
            "Relays finished, labelled by outcome."
        );
        describe_counter!(
            "relay_bytes_discarded_total",
            "Unterminated trailing bytes discarded at upstream EOF."
        );
    });
}

/// The downstream side went away; nothing more can be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkClosed;

/// Where relay frames go. Implemented by the SSE channel and by test collectors.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_frame(&mut self, frame: Bytes) -> Result<(), SinkClosed>;
    /// Report a terminal upstream failure so the client sees an errored stream.
    async fn fail(&mut self, error: &TransportError);
}

/// Sink backed by a bounded channel feeding the HTTP response body.
pub struct ChannelSink {
    tx: mpsc::Sender<SseChunk>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<SseChunk>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send_frame(&mut self, frame: Bytes) -> Result<(), SinkClosed> {
        self.tx.send(Ok(frame)).await.map_err(|_| SinkClosed)
    }

    async fn fail(&mut self, error: &TransportError) {
        let _ = self.tx.send(Err(io::Error::other(error.to_string()))).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Upstream reached EOF and every complete line was processed.
    Completed,
    /// Cancellation was observed (client abort, deadline, or sink closed).
    Cancelled,
}

impl RelayOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayOutcome::Completed => "completed",
            RelayOutcome::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySummary {
    pub outcome: RelayOutcome,
    pub frames: usize,
    pub skipped: usize,
    pub dropped: usize,
    pub bytes_read: usize,
    pub bytes_discarded: usize,
}

impl RelaySummary {
    fn new() -> Self {
        Self {
            outcome: RelayOutcome::Completed,
            frames: 0,
            skipped: 0,
            dropped: 0,
            bytes_read: 0,
            bytes_discarded: 0,
        }
    }

    fn finish(mut self, outcome: RelayOutcome) -> Self {
        self.outcome = outcome;
        counter!("relay_streams_total", "outcome" => outcome.as_str()).increment(1);
        self
    }
}

/// Relay `upstream` into `downstream` until EOF, error, or cancellation.
///
/// Malformed lines are skipped and logged, as are lines longer than the line
/// buffer cap. An unterminated trailing line at EOF is discarded. An upstream read error is forwarded to the sink and
/// returned; the relay never retries.
pub async fn relay<S, E, W>(
    upstream: S,
    downstream: &mut W,
    cancel: &CancellationToken,
) -> Result<RelaySummary, TransportError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
    W: FrameSink + ?Sized,
{
    ensure_metrics_described();

    let mut upstream = std::pin::pin!(upstream);
    let mut lines = LineBuffer::new();
    let mut summary = RelaySummary::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(frames = summary.frames, "relay cancelled while reading upstream");
                return Ok(summary.finish(RelayOutcome::Cancelled));
            }
            next = upstream.next() => next,
        };

        let chunk = match next {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => {
                let err = TransportError::new(e.to_string());
                warn!(error = %err, frames = summary.frames, "upstream stream failed");
                counter!("relay_streams_total", "outcome" => "error").increment(1);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("relay cancelled before the failure reached the client");
                    }
                    _ = downstream.fail(&err) => {}
                }
                return Err(err);
            }
            None => {
                summary.bytes_discarded = lines.discard();
                if summary.bytes_discarded > 0 {
                    debug!(
                        bytes = summary.bytes_discarded,
                        "discarding unterminated trailing line at EOF"
                    );
                    counter!("relay_bytes_discarded_total")
                        .increment(summary.bytes_discarded as u64);
                }
                return Ok(summary.finish(RelayOutcome::Completed));
            }
        };

        summary.bytes_read += chunk.len();
        lines.push(&chunk);

        while let Some(line) = lines.next_line() {
            let Some(frame) = frame_for_line(&line, &mut summary) else {
                continue;
            };

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(SinkClosed),
                sent = downstream.send_frame(frame.encode()) => sent,
            };
            if sent.is_err() {
                debug!(frames = summary.frames, "downstream gone, stopping relay");
                return Ok(summary.finish(RelayOutcome::Cancelled));
            }
            summary.frames += 1;
            counter!("relay_frames_total").increment(1);
        }

        let already_overflowing = lines.is_overflowing();
        if let Some(shed) = lines.shed_overflow() {
            if !already_overflowing {
                summary.dropped += 1;
                warn!(
                    reason = LINE_TOO_LONG,
                    pending_bytes = shed,
                    "dropping oversized upstream line"
                );
                counter!("relay_lines_dropped_total", "reason" => LINE_TOO_LONG).increment(1);
            } else {
                debug!(bytes = shed, "still skipping oversized upstream line");
            }
        }
    }
}

fn frame_for_line(line: &[u8], summary: &mut RelaySummary) -> Option<RelayFrame> {
    if line.iter().all(u8::is_ascii_whitespace) {
        summary.skipped += 1;
        return None;
    }
    match decode_line(line) {
        Ok(ev) => match ev.fragment() {
            Some(fragment) => Some(RelayFrame::new(fragment)),
            None => {
                summary.skipped += 1;
                None
            }
        },
        Err(e) => {
            summary.dropped += 1;
            warn!(
                reason = e.reason_code(),
                error = %e,
                line = %preview(line),
                "dropping malformed upstream line"
            );
            counter!("relay_lines_dropped_total", "reason" => e.reason_code()).increment(1);
            None
        }
    }
}

fn preview(line: &[u8]) -> String {
    String::from_utf8_lossy(line).chars().take(120).collect()
}

/// Spawn a relay task and return the stream that feeds the SSE response body.
///
/// The relay is cancelled when the body is dropped (client disconnected) or
/// when `deadline` elapses, whichever comes first.
pub fn spawn<S, E>(upstream: S, deadline: Duration) -> ReceiverStream<SseChunk>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();

    let watch_tx = tx.clone();
    let watch_cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = watch_cancel.cancelled() => {}
            _ = watch_tx.closed() => {
                debug!("client disconnected, cancelling relay");
                watch_cancel.cancel();
            }
            _ = tokio::time::sleep(deadline) => {
                warn!(deadline_secs = deadline.as_secs(), "relay deadline elapsed, cancelling");
                watch_cancel.cancel();
            }
        }
    });

    tokio::spawn(async move {
        let _done = cancel.clone().drop_guard();
        let mut sink = ChannelSink::new(tx);
        match relay(upstream, &mut sink, &cancel).await {
            Ok(s) => info!(
                outcome = s.outcome.as_str(),
                frames = s.frames,
                dropped = s.dropped,
                skipped = s.skipped,
                bytes_read = s.bytes_read,
                "relay finished"
            ),
            Err(e) => warn!(error = %e, "relay ended with transport error"),
        }
    });

    ReceiverStream::new(rx)
}
