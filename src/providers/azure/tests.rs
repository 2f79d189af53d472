use std::io;
use std::sync::Mutex;

use serde_json::{Map, json};

use super::*;
use crate::core::error::{API_CONNECTION_ERROR, ChatErrorType};
use crate::core::types::ChatMessage;
use crate::transport::http::RawEvent;

const ENDPOINT: &str = "https://contoso.openai.azure.com/";

fn adapter() -> AzureOpenAiAdapter {
    let config = ProviderConfig::new(
        Some(ENDPOINT.to_string()),
        Some("sk-azure-secret".to_string()),
        None,
    );
    AzureOpenAiAdapter::with_transport(config, HttpTransport::new()).expect("valid config")
}

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("log buffer lock")).to_string()
    }
}

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn raw(data: &str) -> Result<RawEvent, ProviderFailure> {
    Ok(RawEvent {
        id: String::new(),
        event: "message".to_string(),
        data: data.to_string(),
    })
}

#[test]
fn test_new_requires_key_and_endpoint() {
    let error = AzureOpenAiAdapter::new(ProviderConfig::new(None, Some(" ".to_string()), None))
        .expect_err("credentials are missing");

    assert_eq!(error.error_type(), ChatErrorType::InvalidCredentials);
    assert_eq!(
        error,
        ChatError::invalid_credentials(ProviderId::Azure, &["apiKey", "endpoint"])
    );
}

#[test]
fn test_completions_url_and_redaction() {
    let adapter = adapter();

    assert_eq!(
        adapter
            .completions_url("gpt-4o")
            .expect("valid endpoint")
            .as_str(),
        "https://contoso.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-15-preview"
    );
    assert_eq!(adapter.redacted_endpoint(), "https://***.openai.azure.com/");
    assert_eq!(adapter.api_version(), "2024-02-15-preview");
    assert_eq!(adapter.id(), ProviderId::Azure);
    assert!(adapter.catalog().contains("o3-mini"));
}

#[test]
fn test_completions_url_escapes_deployment_segment() {
    let url = adapter()
        .completions_url("team/gpt-4o?api-version=1#frag")
        .expect("valid endpoint");

    assert_eq!(
        url.as_str(),
        "https://contoso.openai.azure.com/openai/deployments/team%2Fgpt-4o%3Fapi-version=1%23frag/chat/completions?api-version=2024-02-15-preview"
    );
    assert_eq!(url.query_pairs().count(), 1);
    assert_eq!(url.fragment(), None);
}

#[test]
fn test_completions_url_keeps_endpoint_path_prefix() {
    let config = ProviderConfig::new(
        Some("http://127.0.0.1:8080/proxy/".to_string()),
        Some("key".to_string()),
        Some("2024-10-21".to_string()),
    );
    let adapter = AzureOpenAiAdapter::new(config).expect("valid config");

    assert_eq!(
        adapter
            .completions_url("o1-mini")
            .expect("valid endpoint")
            .as_str(),
        "http://127.0.0.1:8080/proxy/openai/deployments/o1-mini/chat/completions?api-version=2024-10-21"
    );
}

#[test]
fn test_debug_output_hides_secrets() {
    let rendered = format!("{:?}", adapter());

    assert!(!rendered.contains("sk-azure-secret"));
    assert!(!rendered.contains("contoso"));
    assert!(rendered.contains("[REDACTED]"));
}

#[test]
fn test_debug_flag_installs_tracing_sink() {
    let config = ProviderConfig::new(
        Some(ENDPOINT.to_string()),
        Some("key".to_string()),
        None,
    )
    .with_debug_stream(true);
    let adapter = AzureOpenAiAdapter::new(config).expect("valid config");
    assert!(adapter.diagnostic_sink.is_some());

    assert!(self::adapter().diagnostic_sink.is_none());
}

#[test]
fn test_logs_never_contain_resource_name_or_key() {
    let buffer = SharedBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("test runtime");

    let error = tracing::subscriber::with_default(subscriber, || {
        let adapter = AzureOpenAiAdapter::new(ProviderConfig::new(
            Some("https://my-resource.openai.azure.com/".to_string()),
            Some("sk-secret".to_string()),
            None,
        ))
        .expect("valid config");
        runtime
            .block_on(adapter.chat(ChatRequest::new("gpt-4o", Vec::new()), ChatOptions::default()))
            .expect_err("empty messages")
    });

    assert_eq!(error.error_type(), ChatErrorType::AdapterError);
    let logs = buffer.contents();
    assert!(logs.contains("azure openai adapter configured"), "{logs}");
    assert!(logs.contains("azure chat completion failed"), "{logs}");
    assert!(logs.contains("***.openai.azure.com"), "{logs}");
    assert!(!logs.contains("my-resource"), "{logs}");
    assert!(!logs.contains("sk-secret"), "{logs}");
}

#[test]
fn test_map_failure_attaches_deploy_id_for_missing_deployment() {
    let mut details = Map::new();
    details.insert("innerError".to_string(), json!({"code": "x"}));
    details.insert("status".to_string(), json!(404));

    let error = map_failure(
        ProviderFailure::Coded {
            code: DEPLOYMENT_NOT_FOUND_CODE.to_string(),
            message: "missing".to_string(),
            status: Some(404),
            details,
        },
        "gpt-5-nano",
        "https://***.openai.azure.com/",
    );

    assert_eq!(error.error_type(), ChatErrorType::ProviderBizError);
    assert_eq!(
        error.to_payload(),
        json!({
            "errorType": "ProviderBizError",
            "provider": "azure",
            "endpoint": "https://***.openai.azure.com/",
            "error": {
                "code": "DeploymentNotFound",
                "message": "missing",
                "status": 404,
                "deployId": "gpt-5-nano",
                "innerError": {"code": "x"}
            }
        })
    );
}

#[test]
fn test_map_failure_keeps_other_codes_without_deploy_id() {
    let error = map_failure(
        ProviderFailure::Coded {
            code: "content_filter".to_string(),
            message: "filtered".to_string(),
            status: Some(400),
            details: Map::new(),
        },
        "gpt-4o",
        "",
    );

    match error {
        ChatError::ProviderBizError { error, .. } => assert_eq!(error.deploy_id, None),
        other => panic!("expected provider business error, got {other:?}"),
    }
}

#[test]
fn test_map_failure_uncoded_keeps_three_fields() {
    let error = map_failure(
        ProviderFailure::uncoded(API_CONNECTION_ERROR, "connect refused", Some("os error 111".to_string())),
        "gpt-4o",
        "https://***.openai.azure.com/",
    );

    assert_eq!(error.error_type(), ChatErrorType::AdapterError);
    assert_eq!(
        error.to_payload()["error"],
        json!({"cause": "os error 111", "message": "connect refused", "name": "APIConnectionError"})
    );
}

#[tokio::test]
async fn test_normalize_events_ends_after_error_event() {
    let raw_events: RawEventStream = stream::iter(vec![
        raw(r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"Hi"},"finish_reason":null}]}"#),
        Err(ProviderFailure::uncoded("APIDecodeError", "bad utf-8", None)),
        raw(r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"never"},"finish_reason":null}]}"#),
    ])
    .boxed();

    let events: Vec<_> = normalize_events(raw_events, "gpt-4o".to_string(), String::new())
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0], NormalizedStreamEvent::text("c1", "Hi"));
    assert_eq!(events[1].id, "c1");
    assert_eq!(events[1].event, StreamEventType::Error);
    assert_eq!(events[1].data["errorType"], json!("AdapterError"));
    assert_eq!(events[1].data["error"]["name"], json!("APIDecodeError"));
}

#[tokio::test]
async fn test_chat_rejects_empty_messages_before_network() {
    let error = adapter()
        .chat(ChatRequest::new("gpt-4o", Vec::new()), ChatOptions::default())
        .await
        .expect_err("empty messages");

    match error {
        ChatError::AdapterError { error, endpoint, .. } => {
            assert_eq!(error.name, INVALID_REQUEST_ERROR);
            assert_eq!(endpoint, "https://***.openai.azure.com/");
        }
        other => panic!("expected adapter error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_chat_rejects_invalid_forwarded_header() {
    let mut options = ChatOptions::default();
    options
        .headers
        .insert("bad header".to_string(), "value".to_string());

    let error = adapter()
        .chat(ChatRequest::new("gpt-4o", vec![ChatMessage::user("hi")]), options)
        .await
        .expect_err("invalid header name");

    assert_eq!(error.error_type(), ChatErrorType::AdapterError);
}
