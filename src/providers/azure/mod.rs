use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use reqwest::Url;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::catalog::azure_catalog;
use crate::config::ProviderConfig;
use crate::core::error::{
    AdapterErrorDetails, ChatError, DEPLOYMENT_NOT_FOUND_CODE, INVALID_REQUEST_ERROR,
    ProviderBizDetails, ProviderFailure,
};
use crate::core::traits::ChatAdapter;
use crate::core::types::{
    ChatOptions, ChatRequest, ModelCatalog, NormalizedStreamEvent, ProviderId, StreamEventType,
};
use crate::diagnostics::{DiagnosticSink, TracingDiagnosticSink, tee};
use crate::providers::azure_translate::{
    ModelRoute, classify_model, decode_completion, decode_stream_chunk, encode_request,
};
use crate::stream::{EventStream, StreamingResponse, simulated_stream, until_cancelled, with_callbacks};
use crate::transform::redact_base_url;
use crate::transport::http::{HttpTransport, RawEventStream, api_key_headers};

pub struct AzureOpenAiAdapter {
    transport: HttpTransport,
    endpoint: String,
    redacted_endpoint: String,
    api_key: SecretString,
    api_version: String,
    diagnostic_sink: Option<Arc<dyn DiagnosticSink>>,
}

impl AzureOpenAiAdapter {
    /// Fails with `InvalidCredentials` when the key or endpoint is missing.
    pub fn new(config: ProviderConfig) -> Result<Self, ChatError> {
        Self::with_transport(config, HttpTransport::new())
    }

    pub fn from_env() -> Result<Self, ChatError> {
        Self::new(ProviderConfig::from_env())
    }

    pub(crate) fn with_transport(
        config: ProviderConfig,
        transport: HttpTransport,
    ) -> Result<Self, ChatError> {
        let resolved = config.resolve()?;
        let redacted_endpoint = redact_base_url(&resolved.endpoint);

        let diagnostic_sink: Option<Arc<dyn DiagnosticSink>> = if resolved.debug_stream {
            Some(Arc::new(TracingDiagnosticSink))
        } else {
            None
        };

        tracing::info!(
            provider = %ProviderId::Azure,
            endpoint = %redacted_endpoint,
            api_version = %resolved.api_version,
            debug_stream = resolved.debug_stream,
            "azure openai adapter configured"
        );

        Ok(Self {
            transport,
            endpoint: resolved.endpoint.trim_end_matches('/').to_string(),
            redacted_endpoint,
            api_key: resolved.api_key,
            api_version: resolved.api_version,
            diagnostic_sink,
        })
    }

    /// Replaces the raw-stream diagnostic sink.
    pub fn with_diagnostic_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostic_sink = Some(sink);
        self
    }

    pub fn redacted_endpoint(&self) -> &str {
        &self.redacted_endpoint
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version=..`
    /// with the deployment percent-encoded as a single path segment.
    fn completions_url(&self, deployment: &str) -> Result<Url, ProviderFailure> {
        let mut url = Url::parse(&self.endpoint).map_err(|error| {
            ProviderFailure::uncoded(
                INVALID_REQUEST_ERROR,
                format!("invalid endpoint: {error}"),
                None,
            )
        })?;

        url.path_segments_mut()
            .map_err(|()| {
                ProviderFailure::uncoded(
                    INVALID_REQUEST_ERROR,
                    "endpoint cannot carry a path",
                    None,
                )
            })?
            .pop_if_empty()
            .extend(["openai", "deployments", deployment, "chat", "completions"]);
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);

        Ok(url)
    }

    fn request_headers(
        &self,
        extra: &BTreeMap<String, String>,
    ) -> Result<HeaderMap, ProviderFailure> {
        let mut headers = api_key_headers(self.api_key.expose_secret())?;

        for (name, value) in extra {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                ProviderFailure::uncoded(
                    INVALID_REQUEST_ERROR,
                    format!("invalid header name: {name}"),
                    None,
                )
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                ProviderFailure::uncoded(
                    INVALID_REQUEST_ERROR,
                    format!("invalid value for header {name}"),
                    None,
                )
            })?;
            headers.insert(name, value);
        }

        Ok(headers)
    }

    async fn open_stream(
        &self,
        request: &ChatRequest,
        options: &ChatOptions,
    ) -> Result<EventStream, ProviderFailure> {
        let route = classify_model(&request.model);
        let body = encode_request(request, &route)?;
        let url = self.completions_url(route.deployment())?;
        let headers = self.request_headers(&options.headers)?;
        let cancellation = options.cancellation.as_ref();

        tracing::debug!(
            model = %request.model,
            deployment = %route.deployment(),
            simulated = route.is_simulated(),
            messages = request.messages.len(),
            "dispatching azure chat completion"
        );

        match route {
            ModelRoute::Reasoning { .. } => {
                let response = self
                    .transport
                    .post_json(url.as_str(), headers, &body, cancellation)
                    .await?;
                let (id, content) = decode_completion(&response)?;
                Ok(simulated_stream(&id, &content))
            }
            ModelRoute::Streaming { .. } => {
                let raw = self
                    .transport
                    .post_event_stream(url.as_str(), headers, &body, cancellation)
                    .await?;
                let raw = match &self.diagnostic_sink {
                    Some(sink) => tee(raw, Arc::clone(sink), |item| {
                        item.as_ref().ok().map(|event| event.data.clone())
                    }),
                    None => raw,
                };
                Ok(normalize_events(
                    raw,
                    request.model.clone(),
                    self.redacted_endpoint.clone(),
                ))
            }
        }
    }
}

#[async_trait]
impl ChatAdapter for AzureOpenAiAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Azure
    }

    fn catalog(&self) -> &ModelCatalog {
        azure_catalog()
    }

    async fn chat(
        &self,
        request: ChatRequest,
        options: ChatOptions,
    ) -> Result<StreamingResponse, ChatError> {
        let events = self
            .open_stream(&request, &options)
            .await
            .map_err(|failure| map_failure(failure, &request.model, &self.redacted_endpoint))?;

        let ChatOptions {
            cancellation,
            headers,
            callbacks,
        } = options;

        let events = match cancellation {
            Some(token) => until_cancelled(events, token),
            None => events,
        };
        let events = match callbacks {
            Some(callbacks) => with_callbacks(events, callbacks),
            None => events,
        };

        Ok(StreamingResponse::new(events, headers))
    }
}

impl fmt::Debug for AzureOpenAiAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureOpenAiAdapter")
            .field("endpoint", &self.redacted_endpoint)
            .field("api_key", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .field("diagnostic_sink", &self.diagnostic_sink.is_some())
            .finish_non_exhaustive()
    }
}

struct NormalizeState {
    raw: RawEventStream,
    last_id: String,
    model: String,
    endpoint: String,
}

/// Maps raw chunks to normalized events. A failed chunk becomes one `error`
/// event and ends the stream.
fn normalize_events(raw: RawEventStream, model: String, endpoint: String) -> EventStream {
    let state = NormalizeState {
        raw,
        last_id: String::new(),
        model,
        endpoint,
    };

    stream::unfold(Some(state), |state| async move {
        let Some(mut state) = state else {
            return None;
        };
        match state.raw.next().await {
            Some(Ok(event)) => {
                let events = decode_stream_chunk(&event.data);
                if let Some(last) = events.last() {
                    state.last_id.clone_from(&last.id);
                }
                Some((stream::iter(events), Some(state)))
            }
            Some(Err(failure)) => {
                let error = map_failure(failure, &state.model, &state.endpoint);
                let event = NormalizedStreamEvent::new(
                    state.last_id,
                    StreamEventType::Error,
                    error.to_payload(),
                );
                Some((stream::iter(vec![event]), None))
            }
            None => None,
        }
    })
    .flatten()
    .boxed()
}

/// Coded failures become `ProviderBizError`; everything else keeps only
/// `{cause, message, name}` as an `AdapterError`.
pub(crate) fn map_failure(failure: ProviderFailure, model: &str, endpoint: &str) -> ChatError {
    let error = match failure {
        ProviderFailure::Coded {
            code,
            message,
            status,
            mut details,
        } => {
            let deploy_id = (code == DEPLOYMENT_NOT_FOUND_CODE).then(|| model.to_string());
            details.remove("status");
            details.remove("deployId");

            ChatError::ProviderBizError {
                provider: ProviderId::Azure,
                endpoint: endpoint.to_string(),
                error: ProviderBizDetails {
                    code,
                    message,
                    status,
                    deploy_id,
                    extra: details,
                },
            }
        }
        ProviderFailure::Uncoded(AdapterErrorDetails {
            cause,
            message,
            name,
        }) => ChatError::AdapterError {
            provider: ProviderId::Azure,
            endpoint: endpoint.to_string(),
            error: AdapterErrorDetails {
                cause,
                message,
                name,
            },
        },
    };

    tracing::warn!(%error, model, "azure chat completion failed");
    error
}

#[cfg(test)]
mod tests;
