// Chat stream protocol
//
// The agent chat endpoint streams the AI SDK "data stream" line protocol
// (response header `x-vercel-ai-data-stream: v1`). Every line is
// `<code>:<json>`:
//
//   0  text delta (string)          g  reasoning delta (string)
//   9  tool call                    a  tool result
//   b  tool call streaming start    c  tool call args delta
//   f  start step                   e  finish step
//   d  finish message               3  error (string)
//
// Unknown codes are skipped. Lines that fail to decode surface as
// ChatStreamEvent::Error instead of aborting the stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::message::{ChatRole, ToolInvocation, ToolInvocationState, UiMessage};

// ============================================================================
// Request
// ============================================================================

/// Tool invocation as the chat endpoint expects it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientToolInvocation {
    pub tool_call_id: String,
    pub tool_name: String,
    pub step: u32,
    pub state: ToolInvocationState,
    pub args: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl From<&ToolInvocation> for ClientToolInvocation {
    fn from(t: &ToolInvocation) -> Self {
        Self {
            tool_call_id: t.tool_call_id.clone(),
            tool_name: t.tool_name.clone(),
            step: t.step,
            state: t.state,
            args: t.args.clone(),
            result: t.result.clone(),
        }
    }
}

/// Message as the chat endpoint expects it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_invocations: Option<Vec<ClientToolInvocation>>,
}

impl From<&UiMessage> for ClientMessage {
    fn from(msg: &UiMessage) -> Self {
        let invocations: Vec<ClientToolInvocation> =
            msg.tool_invocations().map(ClientToolInvocation::from).collect();
        Self {
            role: msg.role,
            content: msg.content.clone(),
            tool_invocations: (!invocations.is_empty()).then_some(invocations),
        }
    }
}

/// Body of `POST /v1/agent/chat`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub id: String,
    pub messages: Vec<ClientMessage>,
    pub linked_account_owner_id: String,
    pub selected_apps: Vec<String>,
    pub selected_functions: Vec<String>,
}

// ============================================================================
// Response
// ============================================================================

/// Token usage reported at the end of a step or message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamUsage {
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    #[serde(default)]
    pub completion_tokens: Option<u64>,
}

/// Decoded chat stream event
#[derive(Debug, Clone, PartialEq)]
pub enum ChatStreamEvent {
    TextDelta(String),
    ReasoningDelta(String),
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        args: Value,
    },
    ToolResult {
        tool_call_id: String,
        result: Value,
    },
    ToolCallStreamingStart {
        tool_call_id: String,
        tool_name: String,
    },
    ToolCallDelta {
        tool_call_id: String,
        args_text_delta: String,
    },
    StartStep {
        message_id: Option<String>,
    },
    FinishStep {
        finish_reason: Option<String>,
        is_continued: bool,
        usage: Option<StreamUsage>,
    },
    FinishMessage {
        finish_reason: Option<String>,
        usage: Option<StreamUsage>,
    },
    /// Error reported by the backend or a decode failure
    Error(String),
}

impl ChatStreamEvent {
    /// True when this event ends the response
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatStreamEvent::FinishMessage { .. })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallPayload {
    tool_call_id: String,
    tool_name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolResultPayload {
    tool_call_id: String,
    #[serde(default)]
    result: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallStartPayload {
    tool_call_id: String,
    tool_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallDeltaPayload {
    tool_call_id: String,
    args_text_delta: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartStepPayload {
    #[serde(default)]
    message_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinishPayload {
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    usage: Option<StreamUsage>,
    #[serde(default)]
    is_continued: bool,
}

/// Decode one protocol line. Returns None for blank lines and unknown codes.
pub fn parse_stream_line(line: &str) -> Option<ChatStreamEvent> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }

    let Some((code, payload)) = line.split_once(':') else {
        return Some(ChatStreamEvent::Error(format!(
            "Malformed stream line: {}",
            line
        )));
    };

    let decoded = match code {
        "0" => serde_json::from_str::<String>(payload).map(ChatStreamEvent::TextDelta),
        "g" => serde_json::from_str::<String>(payload).map(ChatStreamEvent::ReasoningDelta),
        "3" => serde_json::from_str::<String>(payload).map(ChatStreamEvent::Error),
        "9" => serde_json::from_str::<ToolCallPayload>(payload).map(|p| ChatStreamEvent::ToolCall {
            tool_call_id: p.tool_call_id,
            tool_name: p.tool_name,
            args: p.args,
        }),
        "a" => serde_json::from_str::<ToolResultPayload>(payload).map(|p| {
            ChatStreamEvent::ToolResult {
                tool_call_id: p.tool_call_id,
                result: p.result,
            }
        }),
        "b" => serde_json::from_str::<ToolCallStartPayload>(payload).map(|p| {
            ChatStreamEvent::ToolCallStreamingStart {
                tool_call_id: p.tool_call_id,
                tool_name: p.tool_name,
            }
        }),
        "c" => serde_json::from_str::<ToolCallDeltaPayload>(payload).map(|p| {
            ChatStreamEvent::ToolCallDelta {
                tool_call_id: p.tool_call_id,
                args_text_delta: p.args_text_delta,
            }
        }),
        "f" => serde_json::from_str::<StartStepPayload>(payload).map(|p| ChatStreamEvent::StartStep {
            message_id: p.message_id,
        }),
        "e" => serde_json::from_str::<FinishPayload>(payload).map(|p| ChatStreamEvent::FinishStep {
            finish_reason: p.finish_reason,
            is_continued: p.is_continued,
            usage: p.usage,
        }),
        "d" => serde_json::from_str::<FinishPayload>(payload).map(|p| {
            ChatStreamEvent::FinishMessage {
                finish_reason: p.finish_reason,
                usage: p.usage,
            }
        }),
        other => {
            debug!(code = %other, "Skipping unknown stream part");
            return None;
        }
    };

    Some(decoded.unwrap_or_else(|e| {
        ChatStreamEvent::Error(format!("Failed to decode stream part '{}': {}", code, e))
    }))
}

/// Splits arbitrary byte chunks into protocol lines
///
/// Network chunks do not respect line boundaries; the decoder buffers the
/// trailing partial line until the next chunk (or `finish`) completes it.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ChatStreamEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = parse_stream_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush the remaining partial line at end of stream
    pub fn finish(&mut self) -> Option<ChatStreamEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        parse_stream_line(&String::from_utf8_lossy(&rest))
    }
}

/// Encode an event back into a protocol line (used by test servers and fakes)
pub fn encode_stream_event(event: &ChatStreamEvent) -> String {
    use serde_json::json;

    let (code, payload) = match event {
        ChatStreamEvent::TextDelta(s) => ("0", json!(s)),
        ChatStreamEvent::ReasoningDelta(s) => ("g", json!(s)),
        ChatStreamEvent::Error(s) => ("3", json!(s)),
        ChatStreamEvent::ToolCall {
            tool_call_id,
            tool_name,
            args,
        } => (
            "9",
            json!({"toolCallId": tool_call_id, "toolName": tool_name, "args": args}),
        ),
        ChatStreamEvent::ToolResult {
            tool_call_id,
            result,
        } => ("a", json!({"toolCallId": tool_call_id, "result": result})),
        ChatStreamEvent::ToolCallStreamingStart {
            tool_call_id,
            tool_name,
        } => ("b", json!({"toolCallId": tool_call_id, "toolName": tool_name})),
        ChatStreamEvent::ToolCallDelta {
            tool_call_id,
            args_text_delta,
        } => (
            "c",
            json!({"toolCallId": tool_call_id, "argsTextDelta": args_text_delta}),
        ),
        ChatStreamEvent::StartStep { message_id } => ("f", json!({"messageId": message_id})),
        ChatStreamEvent::FinishStep {
            finish_reason,
            is_continued,
            usage,
        } => (
            "e",
            json!({"finishReason": finish_reason, "isContinued": is_continued, "usage": usage}),
        ),
        ChatStreamEvent::FinishMessage {
            finish_reason,
            usage,
        } => ("d", json!({"finishReason": finish_reason, "usage": usage})),
    };
    format!("{}:{}\n", code, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_text_and_tool_call() {
        assert_eq!(
            parse_stream_line("0:\"Hello\"\n"),
            Some(ChatStreamEvent::TextDelta("Hello".to_string()))
        );

        let event = parse_stream_line(
            r#"9:{"toolCallId":"call_1","toolName":"GMAIL__SEND_EMAIL","args":{"to":"a@b.c"}}"#,
        );
        assert_eq!(
            event,
            Some(ChatStreamEvent::ToolCall {
                tool_call_id: "call_1".to_string(),
                tool_name: "GMAIL__SEND_EMAIL".to_string(),
                args: json!({"to": "a@b.c"}),
            })
        );
    }

    #[test]
    fn test_parse_finish_message_usage() {
        let event = parse_stream_line(
            r#"d:{"finishReason":"tool-calls","usage":{"promptTokens":12,"completionTokens":3}}"#,
        )
        .unwrap();
        assert!(event.is_terminal());
        match event {
            ChatStreamEvent::FinishMessage {
                finish_reason,
                usage,
            } => {
                assert_eq!(finish_reason.as_deref(), Some("tool-calls"));
                assert_eq!(usage.unwrap().prompt_tokens, Some(12));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_and_blank_lines_skipped() {
        assert_eq!(parse_stream_line(""), None);
        assert_eq!(parse_stream_line("   \n"), None);
        assert_eq!(parse_stream_line("8:[{\"x\":1}]"), None);
    }

    #[test]
    fn test_malformed_lines_become_errors() {
        assert!(matches!(
            parse_stream_line("no separator here"),
            Some(ChatStreamEvent::Error(_))
        ));
        assert!(matches!(
            parse_stream_line("9:{not json"),
            Some(ChatStreamEvent::Error(_))
        ));
    }

    #[test]
    fn test_line_decoder_handles_split_chunks() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"0:\"Hel").is_empty());
        let events = decoder.push(b"lo\"\n0:\"!\"\nd:{\"finishReason\":\"stop\"}");
        assert_eq!(
            events,
            vec![
                ChatStreamEvent::TextDelta("Hello".to_string()),
                ChatStreamEvent::TextDelta("!".to_string()),
            ]
        );
        assert!(matches!(
            decoder.finish(),
            Some(ChatStreamEvent::FinishMessage { .. })
        ));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_line_decoder_keeps_multibyte_chars_across_chunks() {
        let line = "0:\"caf\u{e9}\"\n".as_bytes();
        let (a, b) = line.split_at(7);
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(a).is_empty());
        assert_eq!(
            decoder.push(b),
            vec![ChatStreamEvent::TextDelta("caf\u{e9}".to_string())]
        );
    }

    #[test]
    fn test_client_message_includes_tool_invocations() {
        let mut msg = UiMessage::assistant();
        msg.append_text("Sending");
        msg.upsert_tool_invocation(ToolInvocation::call("c1", "GMAIL__SEND", json!({"to": "x"}), 1));
        msg.set_tool_result("c1", json!({"success": true}));

        let body = serde_json::to_value(ClientMessage::from(&msg)).unwrap();
        assert_eq!(body["role"], "assistant");
        assert_eq!(body["content"], "Sending");
        assert_eq!(body["toolInvocations"][0]["toolCallId"], "c1");
        assert_eq!(body["toolInvocations"][0]["step"], 1);
        assert_eq!(body["toolInvocations"][0]["state"], "result");
        assert_eq!(body["toolInvocations"][0]["result"]["success"], true);

        let user = serde_json::to_value(ClientMessage::from(&UiMessage::user("hi"))).unwrap();
        assert!(user.get("toolInvocations").is_none());
    }

    #[test]
    fn test_encode_matches_parse() {
        let event = ChatStreamEvent::ToolCallDelta {
            tool_call_id: "c".to_string(),
            args_text_delta: "{\"a\":".to_string(),
        };
        assert_eq!(parse_stream_line(&encode_stream_event(&event)), Some(event));
    }
}
