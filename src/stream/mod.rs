use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::core::traits::StreamCallbacks;
use crate::core::types::{NormalizedStreamEvent, StreamEventType};

pub type EventStream = BoxStream<'static, NormalizedStreamEvent>;

/// Normalized streaming result of one `chat` call plus caller-supplied headers.
pub struct StreamingResponse {
    headers: BTreeMap<String, String>,
    events: EventStream,
}

impl StreamingResponse {
    pub fn new(events: EventStream, headers: BTreeMap<String, String>) -> Self {
        Self { headers, events }
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn into_events(self) -> EventStream {
        self.events
    }

    /// Events rendered as server-sent-events frames.
    pub fn into_sse_frames(self) -> BoxStream<'static, String> {
        self.events.map(|event| event.to_sse_frame()).boxed()
    }

    /// Drains the stream and concatenates every text event.
    pub async fn collect_text(self) -> String {
        self.events
            .fold(String::new(), |mut text, event| async move {
                if let Some(chunk) = event.as_text() {
                    text.push_str(chunk);
                }
                text
            })
            .await
    }
}

impl fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Replays a complete response as a stream: one `text` event per line, each
/// line keeping a trailing newline. No terminal sentinel is emitted.
pub fn simulated_stream(id: &str, content: &str) -> EventStream {
    let events: Vec<NormalizedStreamEvent> = content
        .split('\n')
        .map(|line| NormalizedStreamEvent::text(id, format!("{line}\n")))
        .collect();

    stream::iter(events).boxed()
}

/// Ends `events` as soon as `token` is cancelled.
pub fn until_cancelled(events: EventStream, token: CancellationToken) -> EventStream {
    events.take_until(token.cancelled_owned()).boxed()
}

struct CallbackState {
    events: EventStream,
    callbacks: Arc<dyn StreamCallbacks>,
    completion: String,
    started: bool,
}

/// Reports events to `callbacks` as they pass through, without altering them.
pub fn with_callbacks(events: EventStream, callbacks: Arc<dyn StreamCallbacks>) -> EventStream {
    let state = CallbackState {
        events,
        callbacks,
        completion: String::new(),
        started: false,
    };

    stream::unfold(state, |mut state| async move {
        if !state.started {
            state.started = true;
            state.callbacks.on_start();
        }

        match state.events.next().await {
            Some(event) => {
                match event.event {
                    StreamEventType::Text => {
                        if let Some(text) = event.data.as_str() {
                            state.completion.push_str(text);
                            state.callbacks.on_text(text);
                        }
                    }
                    StreamEventType::ToolCalls => state.callbacks.on_tool_calls(&event.data),
                    _ => {}
                }
                Some((event, state))
            }
            None => {
                state.callbacks.on_completion(&state.completion);
                None
            }
        }
    })
    .boxed()
}
