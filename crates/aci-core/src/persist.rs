// Persistence schema for playground state
//
// Two keys live in session storage:
// - `playground-config-history`: selection subset, versioned
// - `playground-chat-history`: message list
//
// Stored selections are validated on load. A record with the wrong version,
// malformed JSON, or more apps than the selection cap is removed and the
// caller keeps its defaults. Collections (apps, functions, accounts, agents)
// are never persisted; they are refetched.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PortalError, Result};
use crate::message::UiMessage;
use crate::selection::MAX_SELECTED_APPS;
use crate::storage::SessionStorage;

pub const SELECTION_STORAGE_KEY: &str = "playground-config-history";
pub const CHAT_HISTORY_STORAGE_KEY: &str = "playground-chat-history";

/// Current schema version of the persisted selection
pub const SELECTION_SCHEMA_VERSION: u32 = 1;

/// The part of the selection that survives a reload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedSelection {
    #[serde(default)]
    pub selected_apps: Vec<String>,
    #[serde(default)]
    pub selected_linked_account_owner_id: String,
    #[serde(default)]
    pub selected_functions: Vec<String>,
    #[serde(default)]
    pub selected_agent: String,
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    state: T,
    version: u32,
}

impl PersistedSelection {
    /// Load and validate the stored selection
    ///
    /// Returns `Ok(None)` when nothing valid is stored. Invalid records are
    /// removed from storage.
    pub fn load(storage: &dyn SessionStorage) -> Result<Option<Self>> {
        let Some(raw) = storage.get(SELECTION_STORAGE_KEY)? else {
            return Ok(None);
        };

        match Self::decode(&raw) {
            Ok(selection) => {
                debug!(
                    apps = selection.selected_apps.len(),
                    functions = selection.selected_functions.len(),
                    "Restored playground selection"
                );
                Ok(Some(selection))
            }
            Err(reason) => {
                warn!(reason = %reason, "Discarding stored playground selection");
                storage.remove(SELECTION_STORAGE_KEY)?;
                Ok(None)
            }
        }
    }

    fn decode(raw: &str) -> std::result::Result<Self, String> {
        let envelope: Envelope<serde_json::Value> =
            serde_json::from_str(raw).map_err(|e| format!("malformed record: {}", e))?;
        if envelope.version != SELECTION_SCHEMA_VERSION {
            return Err(format!(
                "version {} does not match {}",
                envelope.version, SELECTION_SCHEMA_VERSION
            ));
        }
        let selection: PersistedSelection = serde_json::from_value(envelope.state)
            .map_err(|e| format!("malformed state: {}", e))?;
        if selection.selected_apps.len() > MAX_SELECTED_APPS {
            return Err(format!(
                "{} apps selected, limit is {}",
                selection.selected_apps.len(),
                MAX_SELECTED_APPS
            ));
        }
        Ok(selection)
    }

    pub fn save(&self, storage: &dyn SessionStorage) -> Result<()> {
        let envelope = Envelope {
            state: self,
            version: SELECTION_SCHEMA_VERSION,
        };
        let json = serde_json::to_string(&envelope)
            .map_err(|e| PortalError::storage(format!("Failed to encode selection: {}", e)))?;
        storage.set(SELECTION_STORAGE_KEY, &json)
    }
}

/// Restore chat history; failures are logged and yield an empty history
pub fn load_chat_history(storage: &dyn SessionStorage) -> Vec<UiMessage> {
    let raw = match storage.get(CHAT_HISTORY_STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(error = %e, "Failed to read stored chat history");
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<UiMessage>>(&raw) {
        Ok(messages) => messages,
        Err(e) => {
            warn!(error = %e, "Failed to parse stored messages");
            Vec::new()
        }
    }
}

/// Write the full message list back to storage
pub fn save_chat_history(storage: &dyn SessionStorage, messages: &[UiMessage]) -> Result<()> {
    let json = serde_json::to_string(messages)
        .map_err(|e| PortalError::storage(format!("Failed to encode chat history: {}", e)))?;
    storage.set(CHAT_HISTORY_STORAGE_KEY, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemorySessionStorage;
    use serde_json::json;

    fn selection() -> PersistedSelection {
        PersistedSelection {
            selected_apps: vec!["GMAIL".into(), "SLACK".into()],
            selected_linked_account_owner_id: "user-1".into(),
            selected_functions: vec!["GMAIL__SEND_EMAIL".into()],
            selected_agent: "agent-1".into(),
        }
    }

    #[test]
    fn test_selection_roundtrip_through_envelope() {
        let storage = InMemorySessionStorage::new();
        selection().save(&storage).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&storage.get(SELECTION_STORAGE_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["state"]["selected_agent"], "agent-1");

        assert_eq!(PersistedSelection::load(&storage).unwrap(), Some(selection()));
    }

    #[test]
    fn test_version_mismatch_is_discarded() {
        let storage = InMemorySessionStorage::new();
        let record = json!({"state": {"selected_apps": ["GMAIL"]}, "version": 0});
        storage
            .set(SELECTION_STORAGE_KEY, &record.to_string())
            .unwrap();

        assert_eq!(PersistedSelection::load(&storage).unwrap(), None);
        assert_eq!(storage.get(SELECTION_STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn test_too_many_apps_is_discarded() {
        let storage = InMemorySessionStorage::new();
        let apps: Vec<String> = (0..7).map(|i| format!("APP{}", i)).collect();
        let record = json!({"state": {"selected_apps": apps}, "version": 1});
        storage
            .set(SELECTION_STORAGE_KEY, &record.to_string())
            .unwrap();

        assert_eq!(PersistedSelection::load(&storage).unwrap(), None);
        assert_eq!(storage.get(SELECTION_STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn test_malformed_selection_is_discarded() {
        let storage = InMemorySessionStorage::new();
        storage.set(SELECTION_STORAGE_KEY, "{oops").unwrap();
        assert_eq!(PersistedSelection::load(&storage).unwrap(), None);
        assert_eq!(storage.get(SELECTION_STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn test_chat_history_best_effort() {
        let storage = InMemorySessionStorage::new();
        assert!(load_chat_history(&storage).is_empty());

        storage.set(CHAT_HISTORY_STORAGE_KEY, "not json").unwrap();
        assert!(load_chat_history(&storage).is_empty());

        let messages = vec![UiMessage::user("hello")];
        save_chat_history(&storage, &messages).unwrap();
        assert_eq!(load_chat_history(&storage), messages);
    }
}
