//! Interpretation of a streamed Claude response.
//!
//! [`StreamInterpreter`] is the per-call state machine; [`drive`] feeds it from an
//! event stream while watching the caller's cancellation token.

use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::providers::vertex::claude_types::StreamPayload;
use crate::sse_stream::SseEvent;
use crate::types::{Progress, StreamSummary, Termination};
use crate::Error;

/// Lifecycle of one streamed call. `Completed`, `Aborted` and `Failed` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Opening,
    Streaming,
    Completed(Termination),
    Aborted,
    Failed,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StreamState::Completed(_) | StreamState::Aborted | StreamState::Failed
        )
    }
}

/// Turns event records into progress values.
///
/// Events are handled one at a time and in arrival order; nothing is buffered.
/// The only way to reach `Completed` is through [`StreamInterpreter::complete`],
/// so `Done` is produced at most once whichever trigger fires first.
#[derive(Debug)]
pub struct StreamInterpreter {
    state: StreamState,
    fragments: usize,
    malformed: usize,
    unrecognized: usize,
}

impl Default for StreamInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamInterpreter {
    pub fn new() -> Self {
        Self {
            state: StreamState::Opening,
            fragments: 0,
            malformed: 0,
            unrecognized: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// The connection opened with HTTP 200.
    pub fn opened(&mut self) {
        if self.state == StreamState::Opening {
            self.state = StreamState::Streaming;
        }
    }

    /// The connection or the event source failed.
    pub fn fail(&mut self) {
        if !self.is_terminal() {
            self.state = StreamState::Failed;
        }
    }

    /// The caller cancelled the call.
    pub fn abort(&mut self) {
        if !self.is_terminal() {
            self.state = StreamState::Aborted;
        }
    }

    /// Handle one event record. Returns the value to hand to the progress callback, if any.
    pub fn on_event(&mut self, event: &SseEvent) -> Option<Progress> {
        if self.state != StreamState::Streaming {
            return None;
        }
        if event.is_heartbeat() {
            return None;
        }
        let payload = event.payload()?;

        if event.is_done() {
            return self.complete(Termination::Sentinel);
        }

        let value = match serde_json::from_str::<Value>(payload) {
            Ok(value) => value,
            Err(error) => {
                self.malformed += 1;
                tracing::warn!(%error, payload, "failed to parse stream payload, skipping");
                return None;
            }
        };

        let progress = match StreamPayload::classify(value) {
            payload @ StreamPayload::Batch { .. } => match payload.first_output_text() {
                Some(text) => Progress::Text(text.to_string()),
                None => {
                    tracing::debug!("batch payload without content, skipping");
                    return None;
                }
            },
            StreamPayload::Delta(value) | StreamPayload::ContentBlock(value) => {
                Progress::Fragment(value)
            }
            payload @ StreamPayload::Unrecognized(_) => {
                self.unrecognized += 1;
                tracing::debug!(
                    kind = payload.type_tag().unwrap_or("unknown"),
                    event = event.event.as_deref(),
                    "unrecognized stream payload"
                );
                return None;
            }
        };

        self.fragments += 1;
        Some(progress)
    }

    /// The remote side closed the connection. Completes the stream unless it
    /// already ended.
    pub fn on_close(&mut self) -> Option<Progress> {
        if self.state == StreamState::Streaming {
            tracing::debug!("connection closed without [DONE]");
        }
        self.complete(Termination::Closed)
    }

    fn complete(&mut self, termination: Termination) -> Option<Progress> {
        if self.state != StreamState::Streaming {
            return None;
        }
        self.state = StreamState::Completed(termination);
        Some(Progress::Done)
    }

    /// Counters for a completed stream.
    pub fn summary(&self) -> Option<StreamSummary> {
        match self.state {
            StreamState::Completed(termination) => Some(StreamSummary {
                termination,
                fragments: self.fragments,
                malformed: self.malformed,
                unrecognized: self.unrecognized,
            }),
            _ => None,
        }
    }
}

/// Feed `events` through `interpreter` until the stream completes, fails or is cancelled.
///
/// The interpreter must already be past `Opening`. Cancellation is checked before
/// every event; it yields [`Error::Aborted`]. A transport error from `events` is
/// returned as-is.
pub async fn drive<S, F>(
    mut interpreter: StreamInterpreter,
    events: S,
    cancel: &CancellationToken,
    mut on_progress: F,
) -> Result<StreamSummary, Error>
where
    S: Stream<Item = Result<SseEvent, Error>>,
    F: FnMut(Progress),
{
    futures_util::pin_mut!(events);

    while !interpreter.is_terminal() {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                interpreter.abort();
                tracing::debug!("stream aborted by caller");
                return Err(Error::Aborted);
            }
            next = events.next() => next,
        };

        match next {
            Some(Ok(event)) => {
                if let Some(progress) = interpreter.on_event(&event) {
                    on_progress(progress);
                }
            }
            Some(Err(error)) => {
                interpreter.fail();
                tracing::error!(%error, "stream failed");
                return Err(error);
            }
            None => {
                if let Some(progress) = interpreter.on_close() {
                    on_progress(progress);
                }
                break;
            }
        }
    }

    interpreter
        .summary()
        .ok_or_else(|| Error::streaming(format!("stream ended in state {:?}", interpreter.state())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use serde_json::json;

    fn streaming() -> StreamInterpreter {
        let mut interpreter = StreamInterpreter::new();
        interpreter.opened();
        interpreter
    }

    fn ok_events(events: Vec<SseEvent>) -> impl Stream<Item = Result<SseEvent, Error>> {
        stream::iter(events.into_iter().map(Ok))
    }

    async fn run(events: Vec<SseEvent>) -> (Result<StreamSummary, Error>, Vec<Progress>) {
        let mut received = Vec::new();
        let result = drive(
            streaming(),
            ok_events(events),
            &CancellationToken::new(),
            |p| received.push(p),
        )
        .await;
        (result, received)
    }

    #[tokio::test]
    async fn test_batch_outputs_then_sentinel() {
        let (result, received) = run(vec![
            SseEvent::data(r#"{"outputs":[{"content":"Hel"}]}"#),
            SseEvent::data(r#"{"outputs":[{"content":"lo"}]}"#),
            SseEvent::data("[DONE]"),
        ])
        .await;

        assert_eq!(
            received,
            vec![
                Progress::Text("Hel".into()),
                Progress::Text("lo".into()),
                Progress::Done
            ]
        );
        let summary = result.unwrap();
        assert_eq!(summary.termination, Termination::Sentinel);
        assert_eq!(summary.fragments, 2);
    }

    #[tokio::test]
    async fn test_close_without_sentinel_completes_once() {
        let (result, received) = run(vec![
            SseEvent::data(r#"{"outputs":[{"content":"a"}]}"#),
            SseEvent::data(r#"{"outputs":[{"content":"b"}]}"#),
        ])
        .await;

        assert_eq!(
            received,
            vec![
                Progress::Text("a".into()),
                Progress::Text("b".into()),
                Progress::Done
            ]
        );
        assert_eq!(result.unwrap().termination, Termination::Closed);
    }

    #[tokio::test]
    async fn test_events_after_sentinel_are_not_delivered() {
        let (result, received) = run(vec![
            SseEvent::data("[DONE]"),
            SseEvent::data(r#"{"outputs":[{"content":"late"}]}"#),
        ])
        .await;

        assert_eq!(received, vec![Progress::Done]);
        assert_eq!(result.unwrap().fragments, 0);
    }

    #[tokio::test]
    async fn test_heartbeats_and_empty_events_are_inert() {
        let mut interpreter = streaming();
        assert_eq!(interpreter.on_event(&SseEvent::named("ping", Some(r#"{"type":"ping"}"#))), None);
        assert_eq!(interpreter.on_event(&SseEvent::named("ping", Some("[DONE]"))), None);
        assert_eq!(interpreter.on_event(&SseEvent::named("message", None)), None);
        assert_eq!(interpreter.on_event(&SseEvent::data("  ")), None);
        assert_eq!(interpreter.state(), StreamState::Streaming);
    }

    #[tokio::test]
    async fn test_malformed_payload_does_not_stop_the_stream() {
        let (result, received) = run(vec![
            SseEvent::data("{not json"),
            SseEvent::data(r#"{"outputs":[{"content":"still here"}]}"#),
            SseEvent::data("[DONE]"),
        ])
        .await;

        assert_eq!(
            received,
            vec![Progress::Text("still here".into()), Progress::Done]
        );
        assert_eq!(result.unwrap().malformed, 1);
    }

    #[tokio::test]
    async fn test_fragments_are_forwarded_whole() {
        let delta = json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hi"}});
        let block = json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}});

        let (result, received) = run(vec![
            SseEvent::named("message_start", Some(r#"{"type":"message_start","message":{"id":"msg_1"}}"#)),
            SseEvent::named("content_block_start", Some(&block.to_string())),
            SseEvent::named("content_block_delta", Some(&delta.to_string())),
            SseEvent::named("message_stop", Some(r#"{"type":"message_stop"}"#)),
        ])
        .await;

        assert_eq!(
            received,
            vec![
                Progress::Fragment(block),
                Progress::Fragment(delta),
                Progress::Done
            ]
        );
        let summary = result.unwrap();
        assert_eq!(summary.unrecognized, 2);
        assert_eq!(summary.termination, Termination::Closed);
    }

    #[tokio::test]
    async fn test_batch_without_content_is_dropped() {
        let (_, received) = run(vec![
            SseEvent::data(r#"{"outputs":[{"content":""}]}"#),
            SseEvent::data(r#"{"outputs":[{"score":1}]}"#),
        ])
        .await;
        assert_eq!(received, vec![Progress::Done]);
    }

    #[tokio::test]
    async fn test_transport_error_fails_the_stream() {
        let events = stream::iter(vec![
            Ok(SseEvent::data(r#"{"outputs":[{"content":"a"}]}"#)),
            Err(Error::streaming("connection reset")),
            Ok(SseEvent::data("[DONE]")),
        ]);
        let mut received = Vec::new();
        let result = drive(streaming(), events, &CancellationToken::new(), |p| {
            received.push(p)
        })
        .await;

        assert!(matches!(result, Err(Error::Streaming(ref m)) if m == "connection reset"));
        assert_eq!(received, vec![Progress::Text("a".into())]);
    }

    #[tokio::test]
    async fn test_cancel_before_first_event() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut received = Vec::new();
        let result = drive(
            streaming(),
            ok_events(vec![SseEvent::data("[DONE]")]),
            &cancel,
            |p| received.push(p),
        )
        .await;

        assert!(matches!(result, Err(Error::Aborted)));
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_does_not_hang() {
        let cancel = CancellationToken::new();
        let events = ok_events(vec![SseEvent::data(r#"{"outputs":[{"content":"a"}]}"#)])
            .chain(stream::pending());

        let trigger = cancel.clone();
        let mut received = Vec::new();
        let result = drive(streaming(), events, &cancel, |p| {
            received.push(p);
            trigger.cancel();
        })
        .await;

        assert!(matches!(result, Err(Error::Aborted)));
        assert_eq!(received, vec![Progress::Text("a".into())]);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut interpreter = streaming();
        interpreter.fail();
        assert_eq!(interpreter.on_close(), None);
        interpreter.abort();
        assert_eq!(interpreter.state(), StreamState::Failed);
        assert!(interpreter.summary().is_none());

        let mut interpreter = streaming();
        assert_eq!(interpreter.on_event(&SseEvent::data("[DONE]")), Some(Progress::Done));
        assert_eq!(interpreter.on_close(), None);
        interpreter.abort();
        assert_eq!(
            interpreter.state(),
            StreamState::Completed(Termination::Sentinel)
        );
    }

    #[test]
    fn test_events_before_open_are_ignored() {
        let mut interpreter = StreamInterpreter::new();
        assert_eq!(interpreter.on_event(&SseEvent::data("[DONE]")), None);
        assert_eq!(interpreter.on_close(), None);
        assert_eq!(interpreter.state(), StreamState::Opening);
    }
}
