use serde_json::{Map, Value, json};

use crate::core::error::{API_DECODE_ERROR, INVALID_REQUEST_ERROR, ProviderFailure};
use crate::core::types::{
    ChatMessage, ChatRequest, MessageContent, MessageRole, NormalizedStreamEvent, StreamEventType,
    ToolCall, ToolDefinition,
};

const O3_MINI_DEPLOYMENT: &str = "o3-mini";
const O3_MINI_EFFORT_PREFIX: &str = "o3-mini-";
const SIMULATED_STREAM_MODELS: [&str; 2] = ["o1-mini", "o1-preview"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    /// Unknown suffixes fall back to `Low`.
    pub(crate) fn from_suffix(suffix: &str) -> Self {
        match suffix {
            "high" => Self::High,
            "medium" => Self::Medium,
            _ => Self::Low,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// How a model id is sent to Azure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ModelRoute {
    /// Native streaming against a deployment named after the model.
    Streaming { deployment: String },
    /// Single-shot call replayed as a simulated stream.
    Reasoning {
        deployment: String,
        reasoning_effort: Option<ReasoningEffort>,
    },
}

impl ModelRoute {
    pub(crate) fn deployment(&self) -> &str {
        match self {
            Self::Streaming { deployment } | Self::Reasoning { deployment, .. } => deployment,
        }
    }

    pub(crate) fn is_simulated(&self) -> bool {
        matches!(self, Self::Reasoning { .. })
    }
}

pub(crate) fn classify_model(model: &str) -> ModelRoute {
    if let Some(suffix) = model.strip_prefix(O3_MINI_EFFORT_PREFIX) {
        return ModelRoute::Reasoning {
            deployment: O3_MINI_DEPLOYMENT.to_string(),
            reasoning_effort: Some(ReasoningEffort::from_suffix(suffix)),
        };
    }

    if SIMULATED_STREAM_MODELS.contains(&model) {
        return ModelRoute::Reasoning {
            deployment: model.to_string(),
            reasoning_effort: None,
        };
    }

    ModelRoute::Streaming {
        deployment: model.to_string(),
    }
}

/// Builds the chat-completions body for `route`.
pub(crate) fn encode_request(
    req: &ChatRequest,
    route: &ModelRoute,
) -> Result<Value, ProviderFailure> {
    if req.messages.is_empty() {
        return Err(ProviderFailure::uncoded(
            INVALID_REQUEST_ERROR,
            "messages must contain at least one message",
            None,
        ));
    }

    let simulated = route.is_simulated();

    let messages: Vec<Value> = req
        .messages
        .iter()
        .map(|message| encode_message(message, simulated))
        .collect();

    let mut body = Map::new();
    body.insert("model".to_string(), json!(route.deployment()));
    body.insert("messages".to_string(), Value::Array(messages));

    if let Some(top_p) = req.top_p {
        body.insert("top_p".to_string(), json!(top_p));
    }
    if let Some(frequency_penalty) = req.frequency_penalty {
        body.insert("frequency_penalty".to_string(), json!(frequency_penalty));
    }
    if let Some(presence_penalty) = req.presence_penalty {
        body.insert("presence_penalty".to_string(), json!(presence_penalty));
    }
    if let Some(n) = req.n {
        body.insert("n".to_string(), json!(n));
    }

    match route {
        ModelRoute::Streaming { .. } => {
            body.insert("stream".to_string(), Value::Bool(true));
            if let Some(temperature) = req.temperature {
                body.insert("temperature".to_string(), json!(temperature));
            }
            if let Some(max_tokens) = req.max_tokens {
                body.insert("max_tokens".to_string(), json!(max_tokens));
            }
            if !req.tools.is_empty() {
                let tools = req.tools.iter().map(encode_tool).collect();
                body.insert("tools".to_string(), Value::Array(tools));
            }
        }
        ModelRoute::Reasoning {
            reasoning_effort, ..
        } => {
            if let Some(max_tokens) = req.max_tokens {
                body.insert("max_completion_tokens".to_string(), json!(max_tokens));
            }
            if let Some(effort) = reasoning_effort {
                body.insert("reasoning_effort".to_string(), json!(effort.as_str()));
            }
        }
    }

    Ok(Value::Object(body))
}

fn encode_message(message: &ChatMessage, simulated: bool) -> Value {
    let role = match message.role {
        MessageRole::System if simulated => MessageRole::User,
        role => role,
    };

    let mut encoded = Map::new();
    encoded.insert("role".to_string(), json!(role.as_str()));
    encoded.insert("content".to_string(), encode_content(&message.content));
    if let Some(name) = &message.name {
        encoded.insert("name".to_string(), json!(name));
    }
    if let Some(tool_call_id) = &message.tool_call_id {
        encoded.insert("tool_call_id".to_string(), json!(tool_call_id));
    }
    if !message.tool_calls.is_empty() {
        let tool_calls = message.tool_calls.iter().map(encode_tool_call).collect();
        encoded.insert("tool_calls".to_string(), Value::Array(tool_calls));
    }

    Value::Object(encoded)
}

fn encode_content(content: &MessageContent) -> Value {
    match content {
        MessageContent::Text(text) => json!(text),
        MessageContent::Parts(parts) => json!(parts),
    }
}

fn encode_tool_call(call: &ToolCall) -> Value {
    json!({
        "id": call.id,
        "type": "function",
        "function": {
            "name": call.function.name,
            "arguments": call.function.arguments,
        }
    })
}

fn encode_tool(tool: &ToolDefinition) -> Value {
    let mut function = Map::new();
    function.insert("name".to_string(), json!(tool.name));
    if let Some(description) = &tool.description {
        function.insert("description".to_string(), json!(description));
    }
    function.insert("parameters".to_string(), tool.parameters.clone());

    json!({ "type": "function", "function": function })
}

/// Extracts `(id, content)` from a non-streamed completion. Missing content is
/// the empty string.
pub(crate) fn decode_completion(body: &Value) -> Result<(String, String), ProviderFailure> {
    let root = body.as_object().ok_or_else(|| {
        ProviderFailure::uncoded(
            API_DECODE_ERROR,
            "chat completion payload must be a JSON object",
            None,
        )
    })?;

    let id = root
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let content = root
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok((id, content))
}

/// Normalizes one streamed chunk. Chunks that yield no other event become a
/// single `data` event.
pub(crate) fn decode_stream_chunk(data: &str) -> Vec<NormalizedStreamEvent> {
    let chunk = match serde_json::from_str::<Value>(data) {
        Ok(chunk) => chunk,
        Err(error) => {
            tracing::debug!(%error, "skipping unparseable chat completion chunk");
            return Vec::new();
        }
    };

    let id = chunk
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let Some(choice) = chunk
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
    else {
        return vec![NormalizedStreamEvent::new(id, StreamEventType::Data, chunk)];
    };

    let delta = choice.get("delta");
    let mut events = Vec::new();

    if let Some(text) = delta
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
    {
        events.push(NormalizedStreamEvent::text(id.clone(), text));
    }

    if let Some(tool_calls) = delta
        .and_then(|delta| delta.get("tool_calls"))
        .and_then(Value::as_array)
        .filter(|calls| !calls.is_empty())
    {
        let normalized = tool_calls
            .iter()
            .enumerate()
            .map(|(position, call)| normalize_tool_call(position, call))
            .collect();
        events.push(NormalizedStreamEvent::new(
            id.clone(),
            StreamEventType::ToolCalls,
            Value::Array(normalized),
        ));
    }

    if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
        events.push(NormalizedStreamEvent::new(
            id.clone(),
            StreamEventType::Stop,
            json!(reason),
        ));
    }

    if events.is_empty() {
        events.push(NormalizedStreamEvent::new(id, StreamEventType::Data, chunk));
    }

    events
}

fn normalize_tool_call(position: usize, call: &Value) -> Value {
    let index = call
        .get("index")
        .and_then(Value::as_u64)
        .unwrap_or(position as u64);
    let function = call.get("function");

    json!({
        "id": string_field(Some(call), "id"),
        "index": index,
        "type": call.get("type").and_then(Value::as_str).unwrap_or("function"),
        "function": {
            "name": string_field(function, "name"),
            "arguments": string_field(function, "arguments"),
        }
    })
}

fn string_field(value: Option<&Value>, key: &str) -> String {
    value
        .and_then(|value| value.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests;
