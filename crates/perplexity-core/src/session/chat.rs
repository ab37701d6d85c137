//! Chat session: dispatches panel commands and emits events

use std::sync::Arc;

use tokio::sync::mpsc;

use super::messages::{ApiKeyStatus, Command, Event, KeyUpdate, SettingsSnapshot};
use crate::client::{ClientError, CompletionClient, ConnectionTestResult, MISSING_KEY_MESSAGE};
use crate::config::{ExtensionSettings, SettingsStore};
use crate::logging::{redact, Logger};
use crate::{log_debug, log_error, log_info, log_warn};
use crate::orchestrator::{Orchestrator, RequestId, SearchQuery, StreamCallbacks};
use crate::secrets::{SecretStore, API_KEY_SECRET};
use crate::tools::ToolRegistry;
use crate::types::PerplexityModel;

pub const EMPTY_KEY_MESSAGE: &str = "API key cannot be empty.";

/// Relays orchestrator output to the panel
struct EventCallbacks {
    events: mpsc::UnboundedSender<Event>,
}

impl EventCallbacks {
    fn emit(&self, event: Event) {
        // The panel may already be gone; nothing to do then
        let _ = self.events.send(event);
    }
}

impl StreamCallbacks for EventCallbacks {
    fn on_data(&self, chunk: &str) {
        self.emit(Event::StreamChunk { data: chunk.to_string() });
    }

    fn on_end(&self) {
        self.emit(Event::StreamEnd {});
    }

    fn on_error(&self, error: &ClientError) {
        self.emit(Event::StreamError { message: error.to_string() });
    }
}

/// One chat panel's view of the core
///
/// Commands may be handled concurrently (a `search:cancel` arrives while a
/// `search` is still streaming), so every method takes `&self`.
pub struct ChatSession {
    orchestrator: Arc<Orchestrator>,
    client: Arc<dyn CompletionClient>,
    settings: Arc<dyn SettingsStore>,
    secrets: Arc<dyn SecretStore>,
    events: EventCallbacks,
    logger: Arc<dyn Logger>,
}

impl ChatSession {
    /// Build a session; events for the panel arrive on the returned receiver
    pub fn new(
        client: Arc<dyn CompletionClient>,
        tools: Arc<ToolRegistry>,
        settings: Arc<dyn SettingsStore>,
        secrets: Arc<dyn SecretStore>,
        logger: Arc<dyn Logger>,
    ) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&client), tools, Arc::clone(&logger)));
        let session = Self {
            orchestrator,
            client,
            settings,
            secrets,
            events: EventCallbacks { events: tx },
            logger,
        };
        (session, rx)
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Handle one inbound command to completion
    pub async fn handle(&self, command: Command) {
        log_debug!(self.logger, "[ChatSession] Handling {}", command.name());
        match command {
            Command::Search { text } => {
                self.search(text).await;
            }
            Command::SearchCancel {} => {
                let cancelled = self.orchestrator.cancel_all();
                log_info!(self.logger, "[ChatSession] Cancelled {} request(s)", cancelled);
            }
            Command::SettingsGet {} => self.send_settings().await,
            Command::SettingsSave { data } => self.save_settings(data).await,
            Command::SettingsKeySet { data } => self.set_key(&data.key),
            Command::SettingsKeyDelete {} => self.delete_key(),
            Command::SettingsKeyTest {} => self.test_key().await,
        }
    }

    /// Parse and handle a JSON command; malformed input is logged and dropped
    pub async fn handle_json(&self, json: &str) {
        match Command::from_json(json) {
            Ok(command) => self.handle(command).await,
            Err(e) => log_warn!(self.logger, "[ChatSession] Ignoring malformed command: {}", e),
        }
    }

    /// Run one query; a query already in flight is cancelled first
    ///
    /// The id is reserved before anything is awaited so that a `search:cancel`
    /// arriving while settings load still reaches this query.
    pub async fn search(&self, text: String) -> RequestId {
        let id = self.orchestrator.begin();
        let previous = self.orchestrator.cancel_others(id);
        if previous > 0 {
            log_info!(self.logger, "[ChatSession] New search superseded {} active request(s)", previous);
        }

        let settings = self.load_settings().await;
        let api_key = self.secrets.get(API_KEY_SECRET).unwrap_or_default();
        let query = SearchQuery::from_settings(text, &settings, api_key);

        self.orchestrator.run_with_id(id, query, &self.events).await;
        id
    }

    async fn load_settings(&self) -> ExtensionSettings {
        match self.settings.load().await {
            Ok(settings) => settings,
            Err(e) => {
                log_warn!(self.logger, "[ChatSession] Failed to load settings, using defaults: {}", e);
                ExtensionSettings::default()
            }
        }
    }

    fn key_status(&self) -> ApiKeyStatus {
        if self.secrets.has(API_KEY_SECRET) {
            ApiKeyStatus::Saved
        } else {
            ApiKeyStatus::Missing
        }
    }

    async fn send_settings(&self) {
        let models = PerplexityModel::all().iter().map(|m| m.as_str().to_string()).collect();
        self.events.emit(Event::UpdateModels { data: models });
        self.emit_snapshot(self.load_settings().await);
    }

    fn emit_snapshot(&self, settings: ExtensionSettings) {
        self.events.emit(Event::SettingsUpdate {
            data: SettingsSnapshot {
                settings,
                api_key_status: self.key_status(),
            },
        });
    }

    async fn save_settings(&self, raw: serde_json::Value) {
        match self.settings.save_raw(&raw).await {
            Ok(saved) => {
                log_info!(self.logger, "[ChatSession] Settings saved (model={})", saved.default_model);
                self.emit_snapshot(saved);
            }
            Err(e) => {
                log_error!(self.logger, "[ChatSession] Failed to save settings: {}", e);
                self.emit_snapshot(self.load_settings().await);
            }
        }
    }

    fn set_key(&self, key: &str) {
        let key = key.trim();
        if key.is_empty() {
            self.events.emit(Event::KeyUpdate { data: KeyUpdate::error(EMPTY_KEY_MESSAGE) });
            return;
        }
        let update = match self.secrets.store(API_KEY_SECRET, key) {
            Ok(()) => {
                log_info!(self.logger, "[ChatSession] API key saved to {}", self.secrets.name());
                KeyUpdate::status(ApiKeyStatus::Saved)
            }
            Err(e) => {
                let message = redact(&e.to_string(), key);
                log_error!(self.logger, "[ChatSession] Failed to save API key: {}", message);
                KeyUpdate::error(message)
            }
        };
        self.events.emit(Event::KeyUpdate { data: update });
    }

    fn delete_key(&self) {
        let update = match self.secrets.delete(API_KEY_SECRET) {
            Ok(()) => {
                self.logger.info("[ChatSession] API key deleted");
                KeyUpdate::status(ApiKeyStatus::Missing)
            }
            Err(e) => {
                log_error!(self.logger, "[ChatSession] Failed to delete API key: {}", e);
                KeyUpdate::error(e.to_string())
            }
        };
        self.events.emit(Event::KeyUpdate { data: update });
    }

    async fn test_key(&self) {
        let result = match self.secrets.get(API_KEY_SECRET).filter(|k| !k.trim().is_empty()) {
            None => ConnectionTestResult::failure(MISSING_KEY_MESSAGE),
            Some(key) => {
                let model = self.load_settings().await.default_model;
                let mut result = self.client.test_connection(model, &key).await;
                result.error = result.error.map(|e| redact(&e, &key));
                result
            }
        };
        log_info!(self.logger, "[ChatSession] Key test ok={} latency={:?}", result.ok, result.latency_ms);
        self.events.emit(Event::KeyTestResult { data: result });
    }
}
