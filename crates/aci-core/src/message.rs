// Chat message types
//
// UiMessage is the client-side view of one conversation entry. Assistant
// messages are built up incrementally from stream events and may span
// several steps (text, tool invocations, more text).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Message role in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatRole::System => write!(f, "system"),
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Lifecycle of a tool invocation inside a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolInvocationState {
    /// Arguments are still streaming
    PartialCall,
    /// Call is complete and waiting for a result
    Call,
    /// Result has been attached
    Result,
}

/// Tool call requested by the model during a chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub args: Value,
    pub state: ToolInvocationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default)]
    pub step: u32,
    /// Raw argument text while state is partial-call
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub args_text: String,
}

impl ToolInvocation {
    pub fn call(tool_call_id: impl Into<String>, tool_name: impl Into<String>, args: Value, step: u32) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            args,
            state: ToolInvocationState::Call,
            result: None,
            step,
            args_text: String::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == ToolInvocationState::Call
    }
}

/// One part of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
    Text {
        text: String,
    },
    Reasoning {
        reasoning: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolInvocation {
        tool_invocation: ToolInvocation,
    },
    StepStart,
}

/// A message in the playground conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiMessage {
    pub id: String,
    pub role: ChatRole,
    /// Concatenated text of all text parts
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl UiMessage {
    fn new(role: ChatRole) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            role,
            content: String::new(),
            parts: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut msg = Self::new(ChatRole::User);
        msg.content = text.clone();
        msg.parts.push(MessagePart::Text { text });
        msg
    }

    /// Create an empty assistant message to stream into
    pub fn assistant() -> Self {
        Self::new(ChatRole::Assistant)
    }

    /// Append streamed text, extending the trailing text part if there is one
    pub fn append_text(&mut self, delta: &str) {
        self.content.push_str(delta);
        if let Some(MessagePart::Text { text }) = self.parts.last_mut() {
            text.push_str(delta);
        } else {
            self.parts.push(MessagePart::Text {
                text: delta.to_string(),
            });
        }
    }

    /// Append streamed reasoning, extending the trailing reasoning part
    pub fn append_reasoning(&mut self, delta: &str) {
        if let Some(MessagePart::Reasoning { reasoning }) = self.parts.last_mut() {
            reasoning.push_str(delta);
        } else {
            self.parts.push(MessagePart::Reasoning {
                reasoning: delta.to_string(),
            });
        }
    }

    pub fn start_step(&mut self) {
        self.parts.push(MessagePart::StepStart);
    }

    /// Number of steps started in this message
    pub fn step_count(&self) -> u32 {
        self.parts
            .iter()
            .filter(|p| matches!(p, MessagePart::StepStart))
            .count() as u32
    }

    /// Insert or replace a tool invocation by call ID
    pub fn upsert_tool_invocation(&mut self, invocation: ToolInvocation) {
        match self.tool_invocation_mut(&invocation.tool_call_id) {
            Some(existing) => *existing = invocation,
            None => self.parts.push(MessagePart::ToolInvocation {
                tool_invocation: invocation,
            }),
        }
    }

    pub fn tool_invocation_mut(&mut self, tool_call_id: &str) -> Option<&mut ToolInvocation> {
        self.parts.iter_mut().find_map(|p| match p {
            MessagePart::ToolInvocation { tool_invocation } if tool_invocation.tool_call_id == tool_call_id => {
                Some(tool_invocation)
            }
            _ => None,
        })
    }

    pub fn tool_invocations(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.parts.iter().filter_map(|p| match p {
            MessagePart::ToolInvocation { tool_invocation } => Some(tool_invocation),
            _ => None,
        })
    }

    /// Invocations still waiting for a result
    pub fn pending_tool_invocations(&self) -> Vec<ToolInvocation> {
        self.tool_invocations()
            .filter(|t| t.is_pending())
            .cloned()
            .collect()
    }

    /// Attach a result to a tool invocation. Returns false if the call ID is unknown.
    pub fn set_tool_result(&mut self, tool_call_id: &str, result: Value) -> bool {
        match self.tool_invocation_mut(tool_call_id) {
            Some(invocation) => {
                invocation.result = Some(result);
                invocation.state = ToolInvocationState::Result;
                true
            }
            None => false,
        }
    }

    pub fn reasoning(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Reasoning { reasoning } => Some(reasoning.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_append_text_merges_adjacent_parts() {
        let mut msg = UiMessage::assistant();
        msg.append_text("Hel");
        msg.append_text("lo");
        assert_eq!(msg.parts.len(), 1);
        assert_eq!(msg.content, "Hello");

        msg.upsert_tool_invocation(ToolInvocation::call("c1", "GMAIL__SEND", json!({}), 0));
        msg.append_text("Done");
        assert_eq!(msg.parts.len(), 3);
        assert_eq!(msg.content, "HelloDone");
    }

    #[test]
    fn test_tool_result_lifecycle() {
        let mut msg = UiMessage::assistant();
        msg.upsert_tool_invocation(ToolInvocation::call("c1", "GMAIL__SEND", json!({"to": "a"}), 0));
        assert_eq!(msg.pending_tool_invocations().len(), 1);

        assert!(msg.set_tool_result("c1", json!({"ok": true})));
        assert!(msg.pending_tool_invocations().is_empty());
        assert!(!msg.set_tool_result("missing", json!(null)));

        let inv = msg.tool_invocations().next().unwrap();
        assert_eq!(inv.state, ToolInvocationState::Result);
        assert_eq!(inv.result, Some(json!({"ok": true})));
    }

    #[test]
    fn test_wire_shape() {
        let mut msg = UiMessage::assistant();
        msg.start_step();
        msg.upsert_tool_invocation(ToolInvocation::call("c1", "X__Y", json!({"a": 1}), 0));
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["role"], "assistant");
        assert_eq!(value["parts"][0]["type"], "step-start");
        assert_eq!(value["parts"][1]["type"], "tool-invocation");
        assert_eq!(value["parts"][1]["toolInvocation"]["toolCallId"], "c1");
        assert_eq!(value["parts"][1]["toolInvocation"]["state"], "call");
        assert!(value.get("createdAt").is_some());

        let back: UiMessage = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
    }
}
