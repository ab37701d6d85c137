//! Webview message protocol
//!
//! Both directions are JSON objects tagged by `command`. Payloads travel in
//! `data`, except `search` (top-level `text`) and `stream:error` (top-level
//! `message`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::ConnectionTestResult;
use crate::config::ExtensionSettings;

/// Messages from the chat panel to the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum Command {
    #[serde(rename = "search")]
    Search { text: String },

    #[serde(rename = "search:cancel")]
    SearchCancel {},

    #[serde(rename = "settings:get")]
    SettingsGet {},

    /// Raw settings object; invalid fields are coerced, never rejected
    #[serde(rename = "settings:save")]
    SettingsSave {
        #[serde(default)]
        data: Value,
    },

    #[serde(rename = "settings:key:set")]
    SettingsKeySet { data: KeyPayload },

    #[serde(rename = "settings:key:delete")]
    SettingsKeyDelete {},

    #[serde(rename = "settings:key:test")]
    SettingsKeyTest {},
}

impl Command {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Search { .. } => "search",
            Command::SearchCancel {} => "search:cancel",
            Command::SettingsGet {} => "settings:get",
            Command::SettingsSave { .. } => "settings:save",
            Command::SettingsKeySet { .. } => "settings:key:set",
            Command::SettingsKeyDelete {} => "settings:key:delete",
            Command::SettingsKeyTest {} => "settings:key:test",
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPayload {
    #[serde(default)]
    pub key: String,
}

impl std::fmt::Debug for KeyPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPayload")
            .field("key", &crate::logging::describe_key(Some(self.key.as_str())))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyStatus {
    Saved,
    Missing,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSnapshot {
    pub settings: ExtensionSettings,
    pub api_key_status: ApiKeyStatus,
}

/// Reply to a key mutation: `status` on success, `error` on failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyUpdate {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ApiKeyStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl KeyUpdate {
    pub fn status(status: ApiKeyStatus) -> Self {
        Self {
            ok: true,
            status: Some(status),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            status: None,
            error: Some(message.into()),
        }
    }
}

/// Messages from the core to the chat panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum Event {
    #[serde(rename = "stream:chunk")]
    StreamChunk { data: String },

    #[serde(rename = "stream:end")]
    StreamEnd {},

    #[serde(rename = "stream:error")]
    StreamError { message: String },

    #[serde(rename = "settings:update")]
    SettingsUpdate { data: SettingsSnapshot },

    #[serde(rename = "settings:key:update")]
    KeyUpdate { data: KeyUpdate },

    #[serde(rename = "settings:key:testResult")]
    KeyTestResult { data: ConnectionTestResult },

    #[serde(rename = "updateModels")]
    UpdateModels { data: Vec<String> },
}

impl Event {
    pub fn to_json(&self) -> String {
        // Every payload is plain data; serialization cannot fail
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_shapes() {
        assert_eq!(
            Command::from_json(r#"{"command":"search","text":"What is 2+2?"}"#).unwrap(),
            Command::Search { text: "What is 2+2?".into() }
        );
        assert_eq!(
            Command::from_json(r#"{"command":"search:cancel"}"#).unwrap(),
            Command::SearchCancel {}
        );
        assert_eq!(
            Command::from_json(r#"{"command":"settings:key:delete","data":{}}"#).unwrap(),
            Command::SettingsKeyDelete {}
        );
        assert_eq!(
            Command::from_json(r#"{"command":"settings:key:set","data":{"key":"pplx-1"}}"#).unwrap(),
            Command::SettingsKeySet { data: KeyPayload { key: "pplx-1".into() } }
        );
        let Command::SettingsSave { data } =
            Command::from_json(r#"{"command":"settings:save","data":{"defaultModel":"gpt-4"}}"#).unwrap()
        else {
            panic!("expected settings:save");
        };
        assert_eq!(data, json!({"defaultModel": "gpt-4"}));
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(Command::from_json(r#"{"command":"getWorkspaceContext"}"#).is_err());
        assert!(Command::from_json(r#"{"text":"no tag"}"#).is_err());
    }

    #[test]
    fn test_event_shapes() {
        let to_value = |e: Event| serde_json::from_str::<Value>(&e.to_json()).unwrap();

        assert_eq!(to_value(Event::StreamChunk { data: "4".into() }), json!({"command": "stream:chunk", "data": "4"}));
        assert_eq!(to_value(Event::StreamEnd {}), json!({"command": "stream:end"}));
        assert_eq!(
            to_value(Event::StreamError { message: "boom".into() }),
            json!({"command": "stream:error", "message": "boom"})
        );
        assert_eq!(
            to_value(Event::SettingsUpdate {
                data: SettingsSnapshot {
                    settings: ExtensionSettings::default(),
                    api_key_status: ApiKeyStatus::Missing,
                }
            }),
            json!({
                "command": "settings:update",
                "data": {
                    "settings": {
                        "defaultModel": "sonar",
                        "enrichWorkspaceContext": true,
                        "enrichActiveFileContext": true
                    },
                    "apiKeyStatus": "missing"
                }
            })
        );
        assert_eq!(
            to_value(Event::KeyUpdate { data: KeyUpdate::error("API key cannot be empty.") }),
            json!({"command": "settings:key:update", "data": {"ok": false, "error": "API key cannot be empty."}})
        );
        assert_eq!(
            to_value(Event::KeyTestResult { data: ConnectionTestResult::success(42) }),
            json!({"command": "settings:key:testResult", "data": {"ok": true, "latencyMs": 42}})
        );
    }

    #[test]
    fn test_key_payload_debug_hides_key() {
        let payload = KeyPayload { key: "pplx-secret".into() };
        assert!(!format!("{:?}", payload).contains("pplx-secret"));
    }
}
