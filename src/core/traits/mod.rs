use async_trait::async_trait;
use serde_json::Value;

use crate::core::error::ChatError;
use crate::core::types::{ChatOptions, ChatRequest, ModelCatalog, ProviderId};
use crate::stream::StreamingResponse;

/// Chat adapter contract consumed by a provider registry.
///
/// Implementations hold only immutable construction-time configuration, so
/// concurrent `chat` calls are independent of each other.
#[async_trait]
pub trait ChatAdapter: Send + Sync {
    /// Stable provider identifier for routing and diagnostics.
    fn id(&self) -> ProviderId;

    /// Static model table the provider advertises.
    fn catalog(&self) -> &ModelCatalog;

    /// Sends one chat request and returns its normalized event stream.
    ///
    /// Every call yields either a stream or exactly one [`ChatError`].
    async fn chat(
        &self,
        request: ChatRequest,
        options: ChatOptions,
    ) -> Result<StreamingResponse, ChatError>;
}

/// Observer hooks over a normalized event stream. All methods default to no-ops.
pub trait StreamCallbacks: Send + Sync {
    fn on_start(&self) {}

    fn on_text(&self, _text: &str) {}

    fn on_tool_calls(&self, _tool_calls: &Value) {}

    /// Called once when the stream ends, with all text emitted.
    fn on_completion(&self, _completion: &str) {}
}
