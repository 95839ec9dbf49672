//! StreamingPipeline: three fixed-order decorators wrapped
//! around a stream of already-formatted SSE frame strings.
//!
//! Grounded on `crates/llm/src/adapter.rs::LanguageModelAdapter::generate_stream`
//! for the `async_stream::stream! { ... yield ... }` idiom — a producer that
//! suspends at every upstream read, giving a lazy, finite iterator instead of
//! a generator. The three stages below are plain functions, composed in
//! `StreamingPipeline::wrap`, rather than axum middleware, for explicit
//! composition over a hidden middleware chain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Response;
use vandamme_convert::{OaSseLineReader, OaStreamEvent, OaToClaudeMachine};
use vandamme_core::GatewayError;

use crate::metrics::RequestMetrics;

fn read_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::UpstreamTimeout
    } else {
        GatewayError::from(err)
    }
}

/// Relay the upstream body unchanged: the inbound and provider dialects
/// match, so each received chunk of bytes is already a valid frame (or
/// partial frame) of the wire format the client expects.
pub fn passthrough_frames(resp: Response) -> impl Stream<Item = Result<String, GatewayError>> + Send + 'static {
    async_stream::stream! {
        let mut body = resp.bytes_stream();
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => yield Ok(String::from_utf8_lossy(&bytes).into_owned()),
                Err(e) => { yield Err(read_error(e)); return; }
            }
        }
    }
}

/// Drive an [`OaToClaudeMachine`] off the raw upstream byte stream.
pub fn oa_to_claude_frames(
    resp: Response,
    mut machine: OaToClaudeMachine,
) -> impl Stream<Item = Result<String, GatewayError>> + Send + 'static {
    async_stream::stream! {
        let mut body = resp.bytes_stream();
        let mut reader = OaSseLineReader::default();
        loop {
            match body.next().await {
                Some(Ok(bytes)) => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    for event in reader.push(&text) {
                        let done = matches!(event, OaStreamEvent::Done);
                        for frame in machine.feed(event) {
                            yield Ok(frame);
                        }
                        if done {
                            return;
                        }
                    }
                }
                Some(Err(e)) => { yield Err(read_error(e)); return; }
                None => {
                    for frame in machine.finalize_if_unfinished() {
                        yield Ok(frame);
                    }
                    return;
                }
            }
        }
    }
}

/// Disconnect signal shared between an external canceller and
/// [`poll_disconnect`]: polled once per emitted frame, and also flipped by
/// `poll_disconnect` itself if the body stream axum hands back is dropped
/// before it runs to completion — exactly what happens when hyper gives up
/// on a connection mid-response, since that drops the future driving this
/// generator without it ever getting to return normally.
pub type DisconnectFlag = Arc<AtomicBool>;

/// Innermost decorator: on an upstream error, emit one SSE error frame plus
/// the dialect's terminator, then stop. Never lets an error reach the wire
/// as anything other than a well-formed frame.
fn translate_errors(
    inner: impl Stream<Item = Result<String, GatewayError>> + Send + 'static,
) -> impl Stream<Item = String> + Send + 'static {
    async_stream::stream! {
        tokio::pin!(inner);
        while let Some(item) = inner.next().await {
            match item {
                Ok(frame) => yield frame,
                Err(err) => {
                    yield crate::error_mapper::to_sse_frame(&err);
                    yield "data: [DONE]\n\n".to_string();
                    return;
                }
            }
        }
    }
}

/// Middle decorator: guarantee metrics finalize exactly once, regardless of
/// how the inner stream ends (exhausted, errored-and-translated above).
fn finalize_metrics(
    inner: impl Stream<Item = String> + Send + 'static,
    metrics: RequestMetrics,
) -> impl Stream<Item = String> + Send + 'static {
    async_stream::stream! {
        tokio::pin!(inner);
        let mut frame_count = 0usize;
        while let Some(frame) = inner.next().await {
            frame_count += 1;
            yield frame;
        }
        metrics.end(if frame_count > 0 { "ok" } else { "error" });
    }
}

/// Outermost decorator: stop emitting as soon as the client has gone away,
/// and record that fact for anything else observing `cancelled`.
///
/// A pre-set `cancelled` (flipped by an external canceller) still stops
/// emission cooperatively between frames. But real client disconnects don't
/// look like that from inside this generator — hyper simply stops polling
/// the response body and drops it, which drops this future mid-`.await`
/// without another poll to cooperatively check anything. `DropGuard` below
/// exploits that: its `Drop` runs during that same abandonment, so it's the
/// one place that can tell a disconnect apart from the stream finishing on
/// its own.
struct DropGuard {
    cancelled: DisconnectFlag,
    completed: bool,
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        if !self.completed {
            self.cancelled.store(true, Ordering::Relaxed);
        }
    }
}

fn poll_disconnect(
    inner: impl Stream<Item = String> + Send + 'static,
    cancelled: DisconnectFlag,
) -> impl Stream<Item = Bytes> + Send + 'static {
    async_stream::stream! {
        let mut guard = DropGuard { cancelled: cancelled.clone(), completed: false };
        tokio::pin!(inner);
        while let Some(frame) = inner.next().await {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            yield Bytes::from(frame);
        }
        guard.completed = true;
    }
}

pub struct StreamingPipeline;

impl StreamingPipeline {
    /// Apply the three decorators in their fixed order: error translator,
    /// then metrics finalizer, then disconnect poller.
    pub fn wrap(
        frames: impl Stream<Item = Result<String, GatewayError>> + Send + 'static,
        metrics: RequestMetrics,
        cancelled: DisconnectFlag,
    ) -> impl Stream<Item = Bytes> + Send + 'static {
        let translated = translate_errors(frames);
        let metered = finalize_metrics(translated, metrics);
        poll_disconnect(metered, cancelled)
    }
}
