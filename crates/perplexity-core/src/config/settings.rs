//! User-facing extension settings

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::PerplexityModel;

/// Flat settings object persisted by the extension
///
/// Parsing from untrusted input goes through [`ExtensionSettings::from_raw`],
/// which never fails: unknown models and mistyped fields fall back to
/// defaults instead of rejecting the save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionSettings {
    pub default_model: PerplexityModel,
    pub enrich_workspace_context: bool,
    pub enrich_active_file_context: bool,
    /// Per-request HTTP timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Total attempts for retried (non-streaming) requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
}

impl Default for ExtensionSettings {
    fn default() -> Self {
        Self {
            default_model: PerplexityModel::Sonar,
            enrich_workspace_context: true,
            enrich_active_file_context: true,
            timeout_ms: None,
            retries: None,
        }
    }
}

impl ExtensionSettings {
    /// Build settings from a loosely-typed JSON object
    pub fn from_raw(raw: &Value) -> Self {
        let defaults = Self::default();
        let field = |name: &str| raw.get(name);

        let default_model = field("defaultModel")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.default_model);

        Self {
            default_model,
            enrich_workspace_context: field("enrichWorkspaceContext")
                .and_then(Value::as_bool)
                .unwrap_or(defaults.enrich_workspace_context),
            enrich_active_file_context: field("enrichActiveFileContext")
                .and_then(Value::as_bool)
                .unwrap_or(defaults.enrich_active_file_context),
            timeout_ms: field("timeoutMs").and_then(Value::as_u64).filter(|ms| *ms > 0),
            retries: field("retries")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let s = ExtensionSettings::default();
        assert_eq!(s.default_model, PerplexityModel::Sonar);
        assert!(s.enrich_workspace_context);
        assert!(s.enrich_active_file_context);
    }

    #[test]
    fn test_from_raw_valid() {
        let s = ExtensionSettings::from_raw(&json!({
            "defaultModel": "sonar-pro",
            "enrichWorkspaceContext": false,
            "enrichActiveFileContext": true,
            "timeoutMs": 15000,
            "retries": 2
        }));
        assert_eq!(s.default_model, PerplexityModel::SonarPro);
        assert!(!s.enrich_workspace_context);
        assert_eq!(s.timeout_ms, Some(15000));
        assert_eq!(s.retries, Some(2));
    }

    #[test]
    fn test_from_raw_coerces_unknown_model() {
        let s = ExtensionSettings::from_raw(&json!({
            "defaultModel": "gpt-5-ultra",
            "enrichWorkspaceContext": false
        }));
        assert_eq!(s.default_model, PerplexityModel::Sonar);
        assert!(!s.enrich_workspace_context);
    }

    #[test]
    fn test_from_raw_non_object() {
        assert_eq!(ExtensionSettings::from_raw(&json!("nope")), ExtensionSettings::default());
    }

    #[test]
    fn test_serialized_camel_case() {
        let json = serde_json::to_value(ExtensionSettings::default()).unwrap();
        assert_eq!(
            json,
            json!({
                "defaultModel": "sonar",
                "enrichWorkspaceContext": true,
                "enrichActiveFileContext": true
            })
        );
    }
}
