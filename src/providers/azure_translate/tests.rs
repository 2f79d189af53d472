use serde_json::json;

use super::*;
use crate::core::types::{ContentPart, FunctionCall, ImageUrl};

fn reasoning(deployment: &str, effort: Option<ReasoningEffort>) -> ModelRoute {
    ModelRoute::Reasoning {
        deployment: deployment.to_string(),
        reasoning_effort: effort,
    }
}

#[test]
fn test_classify_model_routes() {
    assert_eq!(
        classify_model("gpt-4o"),
        ModelRoute::Streaming {
            deployment: "gpt-4o".to_string()
        }
    );
    assert_eq!(classify_model("o1-mini"), reasoning("o1-mini", None));
    assert_eq!(classify_model("o1-preview"), reasoning("o1-preview", None));
    assert_eq!(
        classify_model("o3-mini"),
        ModelRoute::Streaming {
            deployment: "o3-mini".to_string()
        }
    );
    assert_eq!(
        classify_model("o3-mini-high"),
        reasoning("o3-mini", Some(ReasoningEffort::High))
    );
    assert_eq!(
        classify_model("o3-mini-medium"),
        reasoning("o3-mini", Some(ReasoningEffort::Medium))
    );
    assert_eq!(
        classify_model("o3-mini-turbo"),
        reasoning("o3-mini", Some(ReasoningEffort::Low))
    );
    assert_eq!(
        classify_model("o3-mini-"),
        reasoning("o3-mini", Some(ReasoningEffort::Low))
    );
    assert!(!classify_model("o1").is_simulated());
}

#[test]
fn test_streaming_body_keeps_parameters_and_forces_stream() {
    let mut req = ChatRequest::new(
        "gpt-4o",
        vec![ChatMessage::system("be brief"), ChatMessage::user("hi")],
    );
    req.temperature = Some(0.5);
    req.top_p = Some(0.9);
    req.max_tokens = Some(64);
    req.n = Some(1);
    req.stream = Some(false);
    req.stop = Some(json!(["\n\n", "END"]));
    req.tools = vec![ToolDefinition {
        name: "lookup".to_string(),
        description: Some("find a thing".to_string()),
        parameters: json!({"type": "object"}),
    }];

    let body = encode_request(&req, &classify_model(&req.model)).expect("valid request");

    assert_eq!(
        body,
        json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hi"}
            ],
            "top_p": 0.9_f32,
            "n": 1,
            "stream": true,
            "temperature": 0.5,
            "max_tokens": 64,
            "tools": [{
                "type": "function",
                "function": {
                    "name": "lookup",
                    "description": "find a thing",
                    "parameters": {"type": "object"}
                }
            }]
        })
    );
    assert!(body.get("stop").is_none());
}

#[test]
fn test_reasoning_body_strips_streaming_parameters() {
    let mut req = ChatRequest::new(
        "o3-mini-high",
        vec![ChatMessage::system("rules"), ChatMessage::user("solve")],
    );
    req.temperature = Some(1.0);
    req.stream = Some(true);
    req.max_tokens = Some(500);
    req.stop = Some(json!("END"));
    req.tools = vec![ToolDefinition {
        name: "noop".to_string(),
        description: None,
        parameters: json!({}),
    }];

    let body = encode_request(&req, &classify_model(&req.model)).expect("valid request");

    assert_eq!(body["model"], json!("o3-mini"));
    assert_eq!(body["reasoning_effort"], json!("high"));
    assert_eq!(body["max_completion_tokens"], json!(500));
    assert_eq!(body["messages"][0]["role"], json!("user"));
    assert_eq!(body["messages"][1]["role"], json!("user"));
    for dropped in ["stream", "temperature", "tools", "max_tokens", "stop"] {
        assert!(body.get(dropped).is_none(), "{dropped} should be absent");
    }
}

#[test]
fn test_reasoning_body_without_effort_suffix() {
    let req = ChatRequest::new("o1-preview", vec![ChatMessage::user("hi")]);
    let body = encode_request(&req, &classify_model(&req.model)).expect("valid request");

    assert_eq!(body["model"], json!("o1-preview"));
    assert!(body.get("reasoning_effort").is_none());
}

#[test]
fn test_bare_o3_mini_streams_natively() {
    let mut req = ChatRequest::new(
        "o3-mini",
        vec![ChatMessage::system("rules"), ChatMessage::user("hi")],
    );
    req.temperature = Some(0.5);
    req.max_tokens = Some(32);
    req.tools = vec![ToolDefinition {
        name: "noop".to_string(),
        description: None,
        parameters: json!({}),
    }];

    let body = encode_request(&req, &classify_model(&req.model)).expect("valid request");

    assert_eq!(body["model"], json!("o3-mini"));
    assert_eq!(body["stream"], json!(true));
    assert_eq!(body["temperature"], json!(0.5));
    assert_eq!(body["max_tokens"], json!(32));
    assert_eq!(body["tools"][0]["function"]["name"], json!("noop"));
    assert_eq!(body["messages"][0]["role"], json!("system"));
    assert!(body.get("reasoning_effort").is_none());
    assert!(body.get("max_completion_tokens").is_none());
}

#[test]
fn test_messages_keep_parts_and_tool_fields() {
    let mut assistant = ChatMessage::assistant("");
    assistant.tool_calls = vec![ToolCall {
        id: "call_1".to_string(),
        function: FunctionCall {
            name: "lookup".to_string(),
            arguments: "{\"q\":\"x\"}".to_string(),
        },
    }];
    let mut tool = ChatMessage::new(MessageRole::Tool, "found");
    tool.tool_call_id = Some("call_1".to_string());
    let user = ChatMessage::user(MessageContent::Parts(vec![
        ContentPart::Text {
            text: "what is this".to_string(),
        },
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: "https://example.com/cat.png".to_string(),
                detail: None,
            },
        },
    ]));

    let req = ChatRequest::new("gpt-4o", vec![user, assistant, tool]);
    let body = encode_request(&req, &classify_model(&req.model)).expect("valid request");

    assert_eq!(
        body["messages"],
        json!([
            {"role": "user", "content": [
                {"type": "text", "text": "what is this"},
                {"type": "image_url", "image_url": {"url": "https://example.com/cat.png"}}
            ]},
            {"role": "assistant", "content": "", "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": "lookup", "arguments": "{\"q\":\"x\"}"}
            }]},
            {"role": "tool", "content": "found", "tool_call_id": "call_1"}
        ])
    );
}

#[test]
fn test_empty_messages_are_rejected() {
    let req = ChatRequest::new("gpt-4o", Vec::new());
    let failure = encode_request(&req, &classify_model(&req.model)).expect_err("no messages");

    match failure {
        ProviderFailure::Uncoded(details) => assert_eq!(details.name, INVALID_REQUEST_ERROR),
        other => panic!("expected uncoded failure, got {other:?}"),
    }
}

#[test]
fn test_decode_completion_defaults_missing_content() {
    let body = json!({
        "id": "chatcmpl-9",
        "choices": [{"message": {"role": "assistant", "content": "line one\nline two"}}]
    });
    assert_eq!(
        decode_completion(&body).expect("object payload"),
        ("chatcmpl-9".to_string(), "line one\nline two".to_string())
    );

    let body = json!({"id": "chatcmpl-10", "choices": []});
    assert_eq!(
        decode_completion(&body).expect("object payload"),
        ("chatcmpl-10".to_string(), String::new())
    );

    let body = json!({"id": "chatcmpl-11", "choices": [{"message": {"content": null}}]});
    assert_eq!(decode_completion(&body).expect("object payload").1, "");

    assert!(decode_completion(&json!("nope")).is_err());
}

#[test]
fn test_decode_stream_chunk_kinds() {
    let filter_only = r#"{"id":"","choices":[],"prompt_filter_results":[{"prompt_index":0}]}"#;
    let events = decode_stream_chunk(filter_only);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, StreamEventType::Data);

    let role_only = r#"{"id":"c1","choices":[{"index":0,"delta":{"role":"assistant","content":""},"finish_reason":null}]}"#;
    let events = decode_stream_chunk(role_only);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, StreamEventType::Data);

    let text = r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#;
    assert_eq!(
        decode_stream_chunk(text),
        vec![NormalizedStreamEvent::text("c1", "Hel")]
    );

    let stop = r#"{"id":"c1","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#;
    assert_eq!(
        decode_stream_chunk(stop),
        vec![NormalizedStreamEvent::new(
            "c1",
            StreamEventType::Stop,
            json!("stop")
        )]
    );

    assert!(decode_stream_chunk("not json").is_empty());
}

#[test]
fn test_decode_stream_chunk_normalizes_tool_calls() {
    let chunk = r#"{"id":"c2","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_a","type":"function","function":{"name":"lookup","arguments":""}},{"function":{"arguments":"{\"q\""}}]},"finish_reason":null}]}"#;

    let events = decode_stream_chunk(chunk);

    assert_eq!(
        events,
        vec![NormalizedStreamEvent::new(
            "c2",
            StreamEventType::ToolCalls,
            json!([
                {"id": "call_a", "index": 0, "type": "function", "function": {"name": "lookup", "arguments": ""}},
                {"id": "", "index": 1, "type": "function", "function": {"name": "", "arguments": "{\"q\""}}
            ])
        )]
    );
}
