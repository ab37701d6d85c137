//! Chat panel session
//!
//! The panel and the core talk through JSON messages tagged by `command`.
//! [`ChatSession`] turns inbound [`Command`]s into orchestrator runs, settings
//! and key operations, and pushes outbound [`Event`]s onto a channel the host
//! forwards to the panel.

mod messages;
mod chat;

pub use messages::{ApiKeyStatus, Command, Event, KeyPayload, KeyUpdate, SettingsSnapshot};
pub use chat::{ChatSession, EMPTY_KEY_MESSAGE};
