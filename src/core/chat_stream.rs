use std::borrow::Cow;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use memchr::memchr;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{ChatRequest, ChatResponse};
use crate::core::client::ChatBackend;
use crate::core::error::ChatError;

/// Raw body chunks as they come off the wire.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ChatError>> + Send>>;

#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    Chunk(String),
    Error(ChatError),
    End,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SseFrame {
    Delta(String),
    Done,
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

/// Interprets one trimmed protocol line.
///
/// `Ok(None)` covers lines that carry nothing: other SSE fields, comments,
/// empty payloads and frames without a content delta.
pub fn parse_line(line: &str) -> Result<Option<SseFrame>, ChatError> {
    let Some(payload) = extract_data_payload(line.trim()) else {
        return Ok(None);
    };
    if payload.is_empty() {
        return Ok(None);
    }
    if payload == "[DONE]" {
        return Ok(Some(SseFrame::Done));
    }

    let response: ChatResponse =
        serde_json::from_str(payload).map_err(|err| ChatError::StreamParse {
            payload: payload.to_string(),
            reason: err.to_string(),
        })?;

    Ok(response
        .first_delta()
        .filter(|content| !content.is_empty())
        .map(|content| SseFrame::Delta(content.to_string())))
}

/// Incremental line decoder for `data:` event streams.
///
/// Bytes are buffered until a `\n` arrives and only complete lines are
/// decoded as UTF-8, so characters split across chunks survive intact.
/// Stray invalid bytes become U+FFFD rather than costing the whole line.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    skipped: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if let Some(frame) = self.decode_line(&line[..newline_pos]) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Decodes whatever is left once the body has ended.
    pub fn finish(&mut self) -> Vec<SseFrame> {
        let rest = std::mem::take(&mut self.buffer);
        self.decode_line(&rest).into_iter().collect()
    }

    /// Number of lines dropped because they were not valid JSON frames.
    pub fn skipped_frames(&self) -> usize {
        self.skipped
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<SseFrame> {
        let line = String::from_utf8_lossy(raw);
        if let Cow::Owned(_) = line {
            debug!("Replaced invalid UTF-8 in stream line");
        }

        match parse_line(&line) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "Skipping malformed stream frame");
                self.skipped += 1;
                None
            }
        }
    }
}

/// Forwards a frame; returns `true` once the stream is over.
fn forward_frame(
    frame: SseFrame,
    tx: &mpsc::UnboundedSender<(StreamMessage, u64)>,
    stream_id: u64,
) -> bool {
    match frame {
        SseFrame::Delta(content) => {
            let _ = tx.send((StreamMessage::Chunk(content), stream_id));
            false
        }
        SseFrame::Done => {
            let _ = tx.send((StreamMessage::End, stream_id));
            true
        }
    }
}

/// Drives a response body through the decoder and publishes what it finds.
///
/// Every run ends with exactly one `End`, preceded by an `Error` when the
/// body failed mid-read.
pub async fn pump_stream(
    mut bytes: ByteStream,
    tx: mpsc::UnboundedSender<(StreamMessage, u64)>,
    stream_id: u64,
) {
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = bytes.next().await {
        match chunk {
            Ok(chunk) => {
                for frame in decoder.push(&chunk) {
                    if forward_frame(frame, &tx, stream_id) {
                        debug!(stream_id, skipped = decoder.skipped_frames(), "Stream done");
                        return;
                    }
                }
            }
            Err(err) => {
                warn!(stream_id, error = %err, "Stream broke off");
                let _ = tx.send((StreamMessage::Error(err), stream_id));
                let _ = tx.send((StreamMessage::End, stream_id));
                return;
            }
        }
    }

    for frame in decoder.finish() {
        if forward_frame(frame, &tx, stream_id) {
            return;
        }
    }
    debug!(stream_id, skipped = decoder.skipped_frames(), "Stream body ended");
    let _ = tx.send((StreamMessage::End, stream_id));
}

#[derive(Clone)]
pub struct ChatStreamService {
    tx: mpsc::UnboundedSender<(StreamMessage, u64)>,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn_stream(&self, backend: Arc<dyn ChatBackend>, request: ChatRequest, stream_id: u64) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            stream_reply(backend.as_ref(), &request, tx, stream_id).await;
        });
    }
}

/// Opens the streaming endpoint and pumps its body into `tx`. A request the
/// server refuses is reported as `Error` followed by `End`.
pub async fn stream_reply(
    backend: &dyn ChatBackend,
    request: &ChatRequest,
    tx: mpsc::UnboundedSender<(StreamMessage, u64)>,
    stream_id: u64,
) {
    match backend.open_stream(request).await {
        Ok(bytes) => pump_stream(bytes, tx, stream_id).await,
        Err(err) => {
            warn!(stream_id, error = %err, "Streaming request failed");
            let _ = tx.send((StreamMessage::Error(err), stream_id));
            let _ = tx.send((StreamMessage::End, stream_id));
        }
    }
}
