use std::future::Future;

use eventsource_stream::{EventStreamError, Eventsource};
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, future};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::Response;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::core::error::{
    API_CONNECTION_ERROR, API_CONNECTION_TIMEOUT_ERROR, API_DECODE_ERROR, API_USER_ABORT_ERROR,
    INVALID_REQUEST_ERROR, ProviderFailure, status_error_name,
};
use crate::transform::camel_case_map;

const API_KEY_HEADER: &str = "api-key";
const EVENT_STREAM_MIME: &str = "text/event-stream";
const JSON_MIME: &str = "application/json";
const DONE_SENTINEL: &str = "[DONE]";

/// One raw server-sent event from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub id: String,
    pub event: String,
    pub data: String,
}

pub type RawEventStream = BoxStream<'static, Result<RawEvent, ProviderFailure>>;

#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Single-shot JSON request.
    pub async fn post_json(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &Value,
        cancellation: Option<&CancellationToken>,
    ) -> Result<Value, ProviderFailure> {
        let response = self
            .send(url, headers, body, JSON_MIME, cancellation)
            .await?;

        cancellable(response.json::<Value>(), cancellation)
            .await?
            .map_err(|error| {
                ProviderFailure::uncoded(
                    API_DECODE_ERROR,
                    error.without_url().to_string(),
                    None,
                )
            })
    }

    /// Streaming request. The returned stream ends at the `[DONE]` sentinel
    /// or when the connection closes.
    pub async fn post_event_stream(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &Value,
        cancellation: Option<&CancellationToken>,
    ) -> Result<RawEventStream, ProviderFailure> {
        let response = self
            .send(url, headers, body, EVENT_STREAM_MIME, cancellation)
            .await?;

        let events = response
            .bytes_stream()
            .eventsource()
            .map(|result| match result {
                Ok(event) => Ok(RawEvent {
                    id: event.id,
                    event: event.event,
                    data: event.data,
                }),
                Err(EventStreamError::Transport(error)) => Err(transport_failure(error)),
                Err(EventStreamError::Utf8(error)) => Err(ProviderFailure::uncoded(
                    API_DECODE_ERROR,
                    error.to_string(),
                    None,
                )),
                Err(EventStreamError::Parser(error)) => Err(ProviderFailure::uncoded(
                    API_DECODE_ERROR,
                    error.to_string(),
                    None,
                )),
            })
            .take_while(|item| {
                let done = matches!(item, Ok(raw) if raw.data.trim() == DONE_SENTINEL);
                future::ready(!done)
            })
            .boxed();

        Ok(events)
    }

    async fn send(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &Value,
        accept: &'static str,
        cancellation: Option<&CancellationToken>,
    ) -> Result<Response, ProviderFailure> {
        let payload = serde_json::to_vec(body).map_err(|error| {
            ProviderFailure::uncoded(INVALID_REQUEST_ERROR, error.to_string(), None)
        })?;

        let request = self
            .client
            .post(url)
            .headers(headers)
            .header(CONTENT_TYPE, HeaderValue::from_static(JSON_MIME))
            .header(ACCEPT, HeaderValue::from_static(accept))
            .body(payload)
            .send();

        let response = cancellable(request, cancellation)
            .await?
            .map_err(transport_failure)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = match cancellable(response.text(), cancellation).await? {
                Ok(body) => body,
                Err(error) => {
                    format!("failed to read response body: {}", error.without_url())
                }
            };
            return Err(decode_error_body(status, &body));
        }

        Ok(response)
    }
}

/// Builds the Azure key header. The value is marked sensitive and never echoed
/// in errors.
pub fn api_key_headers(api_key: &str) -> Result<HeaderMap, ProviderFailure> {
    let mut value = HeaderValue::from_str(api_key).map_err(|_| {
        ProviderFailure::uncoded(
            INVALID_REQUEST_ERROR,
            "api key contains characters not allowed in a header value",
            None,
        )
    })?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static(API_KEY_HEADER), value);
    Ok(headers)
}

/// Decodes a non-2xx body. A body carrying `error.code` (or a top-level `code`)
/// is a coded failure; anything else is named after the HTTP status.
pub fn decode_error_body(status: u16, body: &str) -> ProviderFailure {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let error_object = parsed.as_ref().and_then(|root| {
        root.get("error")
            .and_then(Value::as_object)
            .or_else(|| root.as_object())
    });

    let message = error_object
        .and_then(|object| object.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("http status {status}")
            } else {
                trimmed.to_string()
            }
        });

    let code = error_object
        .and_then(|object| object.get("code"))
        .and_then(code_as_string);

    match (code, error_object) {
        (Some(code), Some(object)) => {
            let rest: Map<String, Value> = object
                .iter()
                .filter(|(key, _)| key.as_str() != "code" && key.as_str() != "message")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();

            ProviderFailure::Coded {
                code,
                message,
                status: Some(status),
                details: camel_case_map(rest),
            }
        }
        _ => ProviderFailure::uncoded(status_error_name(status), format!("{status} {message}"), None),
    }
}

fn code_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(code) if !code.trim().is_empty() => Some(code.clone()),
        Value::Number(code) => Some(code.to_string()),
        _ => None,
    }
}

/// Maps a reqwest failure. The request URL is stripped so the resource name
/// never leaks through the message.
pub fn transport_failure(error: reqwest::Error) -> ProviderFailure {
    let name = if error.is_timeout() {
        API_CONNECTION_TIMEOUT_ERROR
    } else if error.is_decode() {
        API_DECODE_ERROR
    } else {
        API_CONNECTION_ERROR
    };
    let cause = std::error::Error::source(&error).map(ToString::to_string);

    ProviderFailure::uncoded(name, error.without_url().to_string(), cause)
}

pub fn abort_failure() -> ProviderFailure {
    ProviderFailure::uncoded(API_USER_ABORT_ERROR, "request was aborted", None)
}

async fn cancellable<F>(
    work: F,
    cancellation: Option<&CancellationToken>,
) -> Result<F::Output, ProviderFailure>
where
    F: Future,
{
    match cancellation {
        Some(token) => tokio::select! {
            biased;
            () = token.cancelled() => Err(abort_failure()),
            output = work => Ok(output),
        },
        None => Ok(work.await),
    }
}
