//! Stream adapter that turns a chunked byte stream into Server-Sent Events.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use crate::types::DONE_MARKER;
use crate::Error;

/// An unfinished event (collected data plus the partial line) larger than this
/// aborts the stream.
const MAX_EVENT_BYTES: usize = 1_000_000;

/// One event record from the stream.
///
/// Both fields are optional: keep-alive records often carry a name and no
/// data, and a record may carry data without naming itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event:` field.
    pub event: Option<String>,
    /// All `data:` lines, joined with `\n`.
    pub data: Option<String>,
    /// The `id:` field.
    pub id: Option<String>,
}

impl SseEvent {
    /// An unnamed event carrying `data`.
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::default()
        }
    }

    /// A named event, with or without data.
    pub fn named(event: impl Into<String>, data: Option<&str>) -> Self {
        Self {
            event: Some(event.into()),
            data: data.map(str::to_string),
            id: None,
        }
    }

    /// Keep-alive events sent while the model is still thinking.
    pub fn is_heartbeat(&self) -> bool {
        self.event.as_deref() == Some("ping")
    }

    /// Whether the payload is the `[DONE]` terminal sentinel.
    pub fn is_done(&self) -> bool {
        self.data.as_deref().map(str::trim) == Some(DONE_MARKER)
    }

    /// The payload, if present and not empty.
    pub fn payload(&self) -> Option<&str> {
        self.data.as_deref().filter(|d| !d.trim().is_empty())
    }
}

/// Fields collected for the event currently being read.
#[derive(Debug, Default)]
struct PendingEvent {
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    /// Bytes held in `data`.
    data_bytes: usize,
}

impl PendingEvent {
    fn apply_line(&mut self, line: &str) {
        // Comment lines start with a colon
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                self.data_bytes += value.len();
                self.data.push(value.to_string());
            }
            "id" => self.id = Some(value.to_string()),
            _ => {} // retry and unknown fields
        }
    }

    /// Finish the current event. Returns `None` when no field was seen.
    fn dispatch(&mut self) -> Option<SseEvent> {
        let pending = std::mem::take(self);
        if pending.event.is_none() && pending.data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event: pending.event,
            data: (!pending.data.is_empty()).then(|| pending.data.join("\n")),
            id: pending.id,
        })
    }
}

/// A stream adapter that parses SSE events from a byte stream.
///
/// Events may be split at any byte, including inside a multi-byte UTF-8
/// character. Lines end in `\n` or `\r\n`, and a blank line ends an event.
pub struct SseStream<S> {
    inner: S,
    /// Bytes of the line currently being received.
    buffer: Vec<u8>,
    pending: PendingEvent,
    /// Parsed events ready to be yielded.
    events: VecDeque<SseEvent>,
    finished: bool,
}

impl<S> SseStream<S> {
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: Vec::new(),
            pending: PendingEvent::default(),
            events: VecDeque::new(),
            finished: false,
        }
    }

    fn apply_line(&mut self, line: &[u8]) -> Result<(), Error> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let line = std::str::from_utf8(line)
            .map_err(|e| Error::streaming(format!("Invalid UTF-8 in SSE event: {e}")))?;

        if line.is_empty() {
            if let Some(event) = self.pending.dispatch() {
                self.events.push_back(event);
            }
        } else {
            self.pending.apply_line(line);
        }
        Ok(())
    }

    /// Consume every complete line in the buffer.
    fn parse_buffer(&mut self) -> Result<(), Error> {
        let mut start = 0;
        let mut result = Ok(());

        while let Some(pos) = memchr::memchr(b'\n', &self.buffer[start..]) {
            let end = start + pos;
            let line = self.buffer[start..end].to_vec();
            start = end + 1;
            if let Err(e) = self.apply_line(&line) {
                result = Err(e);
                break;
            }
        }

        if start > 0 {
            self.buffer.drain(..start);
        }
        result
    }

    /// Flush what is left once the byte stream has ended.
    fn finish(&mut self) -> Result<(), Error> {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.apply_line(&line)?;
        }
        if let Some(event) = self.pending.dispatch() {
            self.events.push_back(event);
        }
        Ok(())
    }
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<Error>,
{
    type Item = Result<SseEvent, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.events.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if self.finished {
                return Poll::Ready(None);
            }

            let chunk = match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => return Poll::Ready(Some(Err(e.into()))),
                None => {
                    self.finished = true;
                    if let Err(e) = self.finish() {
                        return Poll::Ready(Some(Err(e)));
                    }
                    continue;
                }
            };

            self.buffer.extend_from_slice(&chunk);

            if let Err(e) = self.parse_buffer() {
                return Poll::Ready(Some(Err(e)));
            }

            if self.buffer.len() + self.pending.data_bytes > MAX_EVENT_BYTES {
                self.buffer.clear();
                self.pending = PendingEvent::default();
                self.finished = true;
                return Poll::Ready(Some(Err(Error::streaming(
                    "SSE event exceeded maximum size",
                ))));
            }
        }
    }
}

/// Extension trait to add SSE parsing to byte streams.
pub trait SseStreamExt: Stream {
    /// Parse this byte stream as SSE events.
    fn sse_events(self) -> SseStream<Self>
    where
        Self: Sized,
    {
        SseStream::new(self)
    }
}

impl<S: Stream> SseStreamExt for S {}
