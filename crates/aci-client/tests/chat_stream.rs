// Chat streaming against a mock backend, end to end through ChatSession

use std::sync::Arc;

use aci_client::{PortalClient, DATA_STREAM_HEADER};
use aci_core::stream::encode_stream_event;
use aci_core::{
    ChatConfig, ChatContext, ChatSession, ChatStreamEvent, InMemorySessionStorage, PortalError,
    ToolBridgeConfig, ToolInvocationState, TurnOutcome,
};
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn stream_body(events: &[ChatStreamEvent]) -> String {
    events.iter().map(encode_stream_event).collect()
}

fn finish(reason: &str) -> Vec<ChatStreamEvent> {
    vec![
        ChatStreamEvent::FinishStep {
            finish_reason: Some(reason.to_string()),
            is_continued: false,
            usage: None,
        },
        ChatStreamEvent::FinishMessage {
            finish_reason: Some(reason.to_string()),
            usage: None,
        },
    ]
}

fn ctx() -> ChatContext {
    ChatContext {
        api_key: "key-1".to_string(),
        linked_account_owner_id: "alice".to_string(),
        selected_apps: vec!["GMAIL".to_string()],
        selected_functions: vec![],
    }
}

#[tokio::test]
async fn test_stream_decodes_events() {
    let server = MockServer::start().await;
    let mut events = vec![
        ChatStreamEvent::StartStep { message_id: None },
        ChatStreamEvent::TextDelta("Hi ".into()),
        ChatStreamEvent::TextDelta("there".into()),
    ];
    events.extend(finish("stop"));

    Mock::given(method("POST"))
        .and(path("/v1/agent/chat"))
        .and(header("X-API-KEY", "key-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(DATA_STREAM_HEADER, "v1")
                .set_body_string(stream_body(&events)),
        )
        .mount(&server)
        .await;

    let client = PortalClient::new(&server.uri());
    let request = aci_core::ChatRequest {
        id: "chat-1".into(),
        messages: vec![],
        linked_account_owner_id: "alice".into(),
        selected_apps: vec![],
        selected_functions: vec![],
    };
    let decoded: Vec<_> = client
        .chat_stream("key-1", &request)
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(decoded, events);
}

#[tokio::test]
async fn test_chat_rejection_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/agent/chat"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"error": "forbidden"})))
        .mount(&server)
        .await;

    let client = Arc::new(PortalClient::new(&server.uri()));
    let chat = ChatSession::with_backend(
        client,
        Arc::new(InMemorySessionStorage::new()),
        ChatConfig::default(),
        ToolBridgeConfig::default(),
    );
    let err = chat.submit("hello", &ctx()).await.unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert!(matches!(err, PortalError::Http { .. }));
}

#[tokio::test]
async fn test_tool_round_trip_over_http() {
    let server = MockServer::start().await;

    // First step: the model asks for a tool call
    let mut first = vec![
        ChatStreamEvent::StartStep { message_id: None },
        ChatStreamEvent::ToolCall {
            tool_call_id: "call-1".into(),
            tool_name: "GMAIL__SEND_EMAIL".into(),
            args: json!({"to": "bob@example.com"}),
        },
    ];
    first.extend(finish("tool-calls"));

    // Second step: the result is in the history, the model answers
    let mut second = vec![
        ChatStreamEvent::StartStep { message_id: None },
        ChatStreamEvent::TextDelta("Done".into()),
    ];
    second.extend(finish("stop"));

    Mock::given(method("POST"))
        .and(path("/v1/agent/chat"))
        .and(|req: &Request| {
            String::from_utf8_lossy(&req.body).contains(r#""state":"result""#)
        })
        .respond_with(ResponseTemplate::new(200).set_body_string(stream_body(&second)))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/agent/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string(stream_body(&first)))
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/functions/GMAIL__SEND_EMAIL/execute"))
        .and(body_partial_json(json!({"linked_account_owner_id": "alice"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "data": {"id": "msg-1"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let chat = ChatSession::with_backend(
        Arc::new(PortalClient::new(&server.uri())),
        Arc::new(InMemorySessionStorage::new()),
        ChatConfig::default(),
        ToolBridgeConfig::default().with_debounce(Duration::from_millis(10)),
    );
    let outcome = chat.submit("email bob", &ctx()).await.unwrap();
    assert_eq!(outcome, TurnOutcome::Completed);

    let messages = chat.messages();
    let assistant = &messages[1];
    let invocation = assistant.tool_invocations().next().unwrap();
    assert_eq!(invocation.state, ToolInvocationState::Result);
    assert_eq!(invocation.result.as_ref().unwrap()["data"]["id"], "msg-1");
    assert_eq!(assistant.content, "Done");
}
