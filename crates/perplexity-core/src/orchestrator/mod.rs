//! Tool-calling orchestrator
//!
//! One pass per user query:
//!
//! ```text
//! Idle ─▶ AwaitingFirstCompletion ─┬─ no tag ─▶ Streaming ──────────────────────────────────────┬─▶ Done
//!                                  └─ tag ───▶ ToolDetected ─▶ AwaitingToolExecution          │
//!                                                   ─▶ AwaitingSecondCompletion ─▶ Streaming ──┘
//! ```
//!
//! The first completion is non-streaming and retried; the second is streamed
//! and never retried. Each query gets its own [`RequestId`] and cancellation
//! token, so overlapping queries can be cancelled independently.

mod prompt;

pub use prompt::{
    build_system_prompt, format_tool_call_trace, format_tool_response_trace, parse_tool_call,
    tool_result_turn,
};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;

use crate::client::{ClientError, ClientResult, CompletionClient, CompletionRequest, RetryPolicy};
use crate::config::ExtensionSettings;
use crate::logging::Logger;
use crate::tools::{ToolDefinition, ToolRegistry, ToolScope};
use crate::types::{CancellationToken, ChatMessage, PerplexityModel, ToolExecutionResult};

/// Identifies one orchestration pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    AwaitingFirstCompletion,
    ToolDetected,
    AwaitingToolExecution,
    AwaitingSecondCompletion,
    Streaming,
    Done,
}

/// Receiver of a query's output
///
/// `on_data` may fire any number of times. Afterwards exactly one of
/// `on_end` or `on_error` fires, unless the query was cancelled, in which
/// case neither does.
pub trait StreamCallbacks: Send + Sync {
    fn on_data(&self, chunk: &str);

    fn on_end(&self);

    fn on_error(&self, error: &ClientError);

    /// Observe state transitions; ignored by default
    fn on_state(&self, _id: RequestId, _state: OrchestratorState) {}
}

/// Everything one query needs, captured when the user submits it
#[derive(Clone)]
pub struct SearchQuery {
    pub text: String,
    pub model: PerplexityModel,
    pub api_key: String,
    pub retry: RetryPolicy,
    pub timeout: Option<Duration>,
    /// Offer tools that read the workspace folder
    pub workspace_tools: bool,
    /// Offer tools that read the focused editor
    pub active_file_tools: bool,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, model: PerplexityModel, api_key: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model,
            api_key: api_key.into(),
            retry: RetryPolicy::default(),
            timeout: None,
            workspace_tools: true,
            active_file_tools: true,
        }
    }

    pub fn from_settings(text: impl Into<String>, settings: &ExtensionSettings, api_key: impl Into<String>) -> Self {
        Self {
            retry: RetryPolicy::from_settings(settings),
            timeout: settings.timeout_ms.map(Duration::from_millis),
            workspace_tools: settings.enrich_workspace_context,
            active_file_tools: settings.enrich_active_file_context,
            ..Self::new(text, settings.default_model, api_key)
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn allows(&self, scope: ToolScope) -> bool {
        match scope {
            ToolScope::Workspace => self.workspace_tools,
            ToolScope::ActiveFile => self.active_file_tools,
        }
    }

    fn request(&self, messages: Vec<ChatMessage>) -> CompletionRequest {
        CompletionRequest::new(self.model, messages, self.api_key.clone()).with_timeout(self.timeout)
    }
}

impl std::fmt::Debug for SearchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchQuery")
            .field("text", &self.text)
            .field("model", &self.model)
            .field("api_key", &crate::logging::describe_key(Some(self.api_key.as_str())))
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("workspace_tools", &self.workspace_tools)
            .field("active_file_tools", &self.active_file_tools)
            .finish()
    }
}

struct ActiveQuery {
    cancel: CancellationToken,
    state: OrchestratorState,
}

/// Runs the two-call tool protocol against a completion client
pub struct Orchestrator {
    client: Arc<dyn CompletionClient>,
    tools: Arc<ToolRegistry>,
    logger: Arc<dyn Logger>,
    active: Mutex<HashMap<RequestId, ActiveQuery>>,
    next_id: AtomicU64,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn CompletionClient>, tools: Arc<ToolRegistry>, logger: Arc<dyn Logger>) -> Self {
        Self {
            client,
            tools,
            logger,
            active: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Reserve an id for a query about to be run with [`run_with_id`](Self::run_with_id)
    ///
    /// The query is cancellable from this point on.
    pub fn begin(&self) -> RequestId {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.active.lock().insert(
            id,
            ActiveQuery {
                cancel: CancellationToken::new(),
                state: OrchestratorState::Idle,
            },
        );
        id
    }

    /// Run a query to completion and return its id
    pub async fn run(&self, query: SearchQuery, callbacks: &dyn StreamCallbacks) -> RequestId {
        let id = self.begin();
        self.run_with_id(id, query, callbacks).await;
        id
    }

    pub async fn run_with_id(&self, id: RequestId, query: SearchQuery, callbacks: &dyn StreamCallbacks) {
        let cancel = {
            let mut active = self.active.lock();
            active
                .entry(id)
                .or_insert_with(|| ActiveQuery {
                    cancel: CancellationToken::new(),
                    state: OrchestratorState::Idle,
                })
                .cancel
                .clone()
        };

        self.logger.info(&format!(
            "[Orchestrator] Request {} started (model={}, {} chars)",
            id,
            query.model,
            query.text.chars().count()
        ));

        let outcome = self.drive(id, &query, &cancel, callbacks).await;
        self.transition(id, OrchestratorState::Done, callbacks);
        self.active.lock().remove(&id);

        match outcome {
            _ if cancel.is_cancelled() => {
                self.logger.info(&format!("[Orchestrator] Request {} cancelled", id));
            }
            Ok(()) => {
                self.logger.info(&format!("[Orchestrator] Request {} completed", id));
                callbacks.on_end();
            }
            Err(ClientError::Cancelled) => {
                self.logger.info(&format!("[Orchestrator] Request {} cancelled", id));
            }
            Err(e) => {
                self.logger
                    .error(&format!("[Orchestrator] Request {} failed ({}): {}", id, e.code(), e));
                callbacks.on_error(&e);
            }
        }
    }

    /// Cancel one query; returns false when it is not active
    pub fn cancel(&self, id: RequestId) -> bool {
        match self.active.lock().get(&id) {
            Some(query) => {
                query.cancel.cancel();
                self.logger.info(&format!("[Orchestrator] Cancel requested for {}", id));
                true
            }
            None => false,
        }
    }

    /// Cancel every active query except `keep`; returns how many were signalled
    pub fn cancel_others(&self, keep: RequestId) -> usize {
        let active = self.active.lock();
        let mut signalled = 0;
        for (id, query) in active.iter().filter(|(id, _)| **id != keep) {
            query.cancel.cancel();
            self.logger.info(&format!("[Orchestrator] Cancel requested for {}", id));
            signalled += 1;
        }
        signalled
    }

    /// Cancel every active query; returns how many were signalled
    pub fn cancel_all(&self) -> usize {
        let active = self.active.lock();
        for query in active.values() {
            query.cancel.cancel();
        }
        if !active.is_empty() {
            self.logger
                .info(&format!("[Orchestrator] Cancel requested for {} active request(s)", active.len()));
        }
        active.len()
    }

    /// Current state of an active query; finished or unknown ids are `Idle`
    pub fn state(&self, id: RequestId) -> OrchestratorState {
        self.active
            .lock()
            .get(&id)
            .map(|q| q.state)
            .unwrap_or(OrchestratorState::Idle)
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    fn transition(&self, id: RequestId, state: OrchestratorState, callbacks: &dyn StreamCallbacks) {
        if let Some(query) = self.active.lock().get_mut(&id) {
            query.state = state;
        }
        self.logger.debug(&format!("[Orchestrator] {} -> {:?}", id, state));
        callbacks.on_state(id, state);
    }

    fn visible_tools(&self, query: &SearchQuery) -> Vec<ToolDefinition> {
        self.tools
            .definitions()
            .into_iter()
            .filter(|t| query.allows(t.scope))
            .collect()
    }

    async fn drive(
        &self,
        id: RequestId,
        query: &SearchQuery,
        cancel: &CancellationToken,
        callbacks: &dyn StreamCallbacks,
    ) -> ClientResult<()> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        if query.api_key.trim().is_empty() {
            return Err(ClientError::missing_api_key());
        }

        let tools = self.visible_tools(query);
        let mut messages = vec![
            ChatMessage::system(build_system_prompt(&tools)),
            ChatMessage::user(query.text.clone()),
        ];

        self.transition(id, OrchestratorState::AwaitingFirstCompletion, callbacks);
        let first = query
            .retry
            .run(cancel, self.logger.as_ref(), |attempt| {
                let client = Arc::clone(&self.client);
                let request = query.request(messages.clone());
                let cancel = cancel.clone();
                if attempt > 1 {
                    self.logger.info(&format!("[Orchestrator] {} first completion attempt {}", id, attempt));
                }
                async move { client.complete(request, cancel).await }
            })
            .await?;

        let Some(directive) = parse_tool_call(&first) else {
            self.transition(id, OrchestratorState::Streaming, callbacks);
            if !first.is_empty() {
                relay(cancel, callbacks, &first)?;
            }
            return Ok(());
        };

        self.transition(id, OrchestratorState::ToolDetected, callbacks);
        self.logger
            .info(&format!("[Orchestrator] {} model requested tool {}", id, directive.tool_name));
        relay(cancel, callbacks, &format_tool_call_trace(&directive))?;

        self.transition(id, OrchestratorState::AwaitingToolExecution, callbacks);
        let result = if tools.iter().any(|t| t.name == directive.tool_name) {
            let args = directive.args_value();
            cancel
                .run_until_cancelled(self.tools.execute_tool(&directive.tool_name, Some(&args)))
                .await
                .ok_or(ClientError::Cancelled)?
        } else {
            self.logger
                .warn(&format!("[Orchestrator] {} tool {} is not available", id, directive.tool_name));
            ToolExecutionResult::not_found(&directive.tool_name)
        };
        let rendered = result.render();
        relay(cancel, callbacks, &format_tool_response_trace(&rendered))?;

        messages.push(ChatMessage::assistant(first));
        messages.push(ChatMessage::user(tool_result_turn(&directive.tool_name, &rendered)));

        self.transition(id, OrchestratorState::AwaitingSecondCompletion, callbacks);
        let mut stream = self.client.stream(query.request(messages), cancel.clone()).await?;

        self.transition(id, OrchestratorState::Streaming, callbacks);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if !chunk.is_empty() {
                relay(cancel, callbacks, &chunk)?;
            }
        }
        Ok(())
    }
}

/// Deliver a chunk unless the query has been cancelled
fn relay(cancel: &CancellationToken, callbacks: &dyn StreamCallbacks, chunk: &str) -> ClientResult<()> {
    if cancel.is_cancelled() {
        return Err(ClientError::Cancelled);
    }
    callbacks.on_data(chunk);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockCompletionClient, MockReply, MISSING_KEY_MESSAGE};
    use crate::context::{ContextCache, ContextManager};
    use crate::logging::NoOpLogger;
    use crate::tools::{builtin_registry, ToolError, FILE_SEARCH};
    use crate::types::{shared_workspace, MessageRole, Workspace};
    use serde_json::{json, Value};
    use std::fs;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Data(String),
        End,
        Error(ClientError),
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<Seen>>,
        states: Mutex<Vec<OrchestratorState>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<Seen> {
            self.events.lock().clone()
        }

        fn data(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Seen::Data(d) => Some(d),
                    _ => None,
                })
                .collect()
        }
    }

    impl StreamCallbacks for Recorder {
        fn on_data(&self, chunk: &str) {
            self.events.lock().push(Seen::Data(chunk.to_string()));
        }

        fn on_end(&self) {
            self.events.lock().push(Seen::End);
        }

        fn on_error(&self, error: &ClientError) {
            self.events.lock().push(Seen::Error(error.clone()));
        }

        fn on_state(&self, _id: RequestId, state: OrchestratorState) {
            self.states.lock().push(state);
        }
    }

    fn echo_registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new(Arc::new(NoOpLogger::new()));
        registry.register_fn(
            ToolDefinition::new(FILE_SEARCH, "Search for files by glob", ToolScope::Workspace),
            |args| async move { Ok(json!(["src/a.ts", format!("args={}", Value::Object(args))])) },
        );
        registry.register_fn(
            ToolDefinition::new("codeExplanation", "Read the active editor", ToolScope::ActiveFile),
            |_| async { Ok(json!("fn main() {}")) },
        );
        registry.register_fn(
            ToolDefinition::new("broken", "Always fails", ToolScope::Workspace),
            |_| async { Err::<Value, _>(ToolError::failed("disk on fire")) },
        );
        Arc::new(registry)
    }

    fn orchestrator(client: Arc<MockCompletionClient>, tools: Arc<ToolRegistry>) -> Orchestrator {
        Orchestrator::new(client, tools, Arc::new(NoOpLogger::new()))
    }

    fn query(text: &str) -> SearchQuery {
        SearchQuery::new(text, PerplexityModel::Sonar, "pplx-test")
    }

    #[tokio::test]
    async fn test_plain_answer_is_relayed_once_without_second_call() {
        let client = Arc::new(MockCompletionClient::new(vec![MockReply::text("4. Two plus two is four.")]));
        let orch = orchestrator(client.clone(), echo_registry());
        let recorder = Recorder::default();

        let id = orch.run(query("What is 2+2?"), &recorder).await;

        assert_eq!(
            recorder.events(),
            vec![Seen::Data("4. Two plus two is four.".into()), Seen::End]
        );
        assert_eq!(client.call_count(), 1);
        assert_eq!(client.stream_call_count(), 0);
        assert_eq!(
            *recorder.states.lock(),
            vec![
                OrchestratorState::AwaitingFirstCompletion,
                OrchestratorState::Streaming,
                OrchestratorState::Done
            ]
        );
        assert_eq!(orch.state(id), OrchestratorState::Idle);
        assert_eq!(orch.active_count(), 0);
    }

    #[tokio::test]
    async fn test_first_call_carries_system_prompt_and_user_text() {
        let client = Arc::new(MockCompletionClient::new(vec![MockReply::text("hi")]));
        let orch = orchestrator(client.clone(), echo_registry());
        orch.run(query("hello"), &Recorder::default()).await;

        let call = &client.calls()[0];
        assert!(!call.streaming);
        assert_eq!(call.request.messages.len(), 2);
        assert_eq!(call.request.messages[0].role, MessageRole::System);
        assert!(call.request.messages[0].content.contains("- fileSearch: Search for files by glob"));
        assert_eq!(call.request.messages[1], ChatMessage::user("hello"));
    }

    #[tokio::test]
    async fn test_empty_answer_ends_without_data() {
        let client = Arc::new(MockCompletionClient::new(vec![MockReply::text("")]));
        let orch = orchestrator(client, echo_registry());
        let recorder = Recorder::default();
        orch.run(query("?"), &recorder).await;
        assert_eq!(recorder.events(), vec![Seen::End]);
    }

    #[tokio::test]
    async fn test_tool_traces_precede_streamed_answer() {
        let client = Arc::new(MockCompletionClient::new(vec![
            MockReply::text(r#"<tool_call name="fileSearch" args='{"globPattern": "**/*.ts"}' />"#),
            MockReply::chunks(["Found ", "src/a.ts"]),
        ]));
        let orch = orchestrator(client.clone(), echo_registry());
        let recorder = Recorder::default();

        orch.run(query("find typescript files"), &recorder).await;

        let events = recorder.events();
        assert_eq!(events.len(), 5);
        let Seen::Data(call_trace) = &events[0] else { panic!("expected trace") };
        assert!(call_trace.starts_with("\n```json\nTool call: fileSearch({"));
        assert!(call_trace.contains("\"globPattern\": \"**/*.ts\""));
        let Seen::Data(response_trace) = &events[1] else { panic!("expected trace") };
        assert!(response_trace.starts_with("\n```json\nTool response: [\n  \"src/a.ts\""));
        assert_eq!(events[2], Seen::Data("Found ".into()));
        assert_eq!(events[3], Seen::Data("src/a.ts".into()));
        assert_eq!(events[4], Seen::End);

        assert_eq!(
            *recorder.states.lock(),
            vec![
                OrchestratorState::AwaitingFirstCompletion,
                OrchestratorState::ToolDetected,
                OrchestratorState::AwaitingToolExecution,
                OrchestratorState::AwaitingSecondCompletion,
                OrchestratorState::Streaming,
                OrchestratorState::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_second_call_extends_history() {
        let directive = r#"<tool_call name="codeExplanation" />"#;
        let client = Arc::new(MockCompletionClient::new(vec![
            MockReply::text(directive),
            MockReply::chunks(["It prints nothing."]),
        ]));
        let orch = orchestrator(client.clone(), echo_registry());
        orch.run(query("explain this"), &Recorder::default()).await;

        let calls = client.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].streaming);
        let history = &calls[1].request.messages;
        assert_eq!(history.len(), 4);
        assert_eq!(history[2], ChatMessage::assistant(directive));
        assert_eq!(
            history[3],
            ChatMessage::user("TOOL_RESULT for codeExplanation: fn main() {}")
        );
    }

    #[tokio::test]
    async fn test_malformed_args_execute_with_empty_object() {
        let client = Arc::new(MockCompletionClient::new(vec![
            MockReply::text(r#"<tool_call name="fileSearch" args='{not json' />"#),
            MockReply::chunks(["ok"]),
        ]));
        let orch = orchestrator(client, echo_registry());
        let recorder = Recorder::default();
        orch.run(query("files"), &recorder).await;

        let data = recorder.data();
        assert_eq!(data[0], "\n```json\nTool call: fileSearch({})\n```\n");
        assert!(data[1].contains("args={}"));
    }

    #[tokio::test]
    async fn test_tool_failures_are_relayed_as_data() {
        let client = Arc::new(MockCompletionClient::new(vec![
            MockReply::text(r#"<tool_call name="deleteEverything" />"#),
            MockReply::chunks(["I can't do that."]),
        ]));
        let orch = orchestrator(client.clone(), echo_registry());
        let recorder = Recorder::default();
        orch.run(query("wipe it"), &recorder).await;

        let data = recorder.data();
        assert!(data[1].contains("Tool deleteEverything not found"));
        assert_eq!(recorder.events().last(), Some(&Seen::End));
        assert!(client.calls()[1].request.messages[3]
            .content
            .starts_with("TOOL_RESULT for deleteEverything: {"));

        let client = Arc::new(MockCompletionClient::new(vec![
            MockReply::text(r#"<tool_call name="broken" />"#),
            MockReply::chunks(["Sorry."]),
        ]));
        let orch = orchestrator(client, echo_registry());
        let recorder = Recorder::default();
        orch.run(query("break"), &recorder).await;
        assert!(recorder.data()[1].contains("disk on fire"));
        assert_eq!(recorder.events().last(), Some(&Seen::End));
    }

    #[tokio::test]
    async fn test_hidden_scope_is_not_offered_or_executed() {
        let client = Arc::new(MockCompletionClient::new(vec![
            MockReply::text(r#"<tool_call name="codeExplanation" />"#),
            MockReply::chunks(["no"]),
        ]));
        let orch = orchestrator(client.clone(), echo_registry());
        let recorder = Recorder::default();
        let mut q = query("explain");
        q.active_file_tools = false;
        orch.run(q, &recorder).await;

        let system = &client.calls()[0].request.messages[0].content;
        assert!(!system.contains("- codeExplanation:"));
        assert!(system.contains("- fileSearch:"));
        assert!(recorder.data()[1].contains("Tool codeExplanation not found"));
    }

    #[tokio::test]
    async fn test_missing_key_errors_before_any_data() {
        let client = Arc::new(MockCompletionClient::new(vec![MockReply::text("never")]));
        let orch = orchestrator(client.clone(), echo_registry());
        let recorder = Recorder::default();
        orch.run(SearchQuery::new("hi", PerplexityModel::Sonar, "  "), &recorder).await;

        assert_eq!(
            recorder.events(),
            vec![Seen::Error(ClientError::Configuration(MISSING_KEY_MESSAGE.into()))]
        );
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_first_call_gets_three_attempts() {
        let client = Arc::new(MockCompletionClient::new(vec![
            MockReply::Error(ClientError::from_status(503, "down")),
            MockReply::Error(ClientError::from_status(429, "")),
            MockReply::Error(ClientError::from_status(502, "still down")),
            MockReply::text("unused"),
        ]));
        let orch = orchestrator(client.clone(), echo_registry());
        let recorder = Recorder::default();
        orch.run(query("hi"), &recorder).await;

        assert_eq!(client.call_count(), 3);
        assert_eq!(
            recorder.events(),
            vec![Seen::Error(ClientError::from_status(502, "still down"))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_request_fails_after_one_attempt() {
        let client = Arc::new(MockCompletionClient::new(vec![
            MockReply::Error(ClientError::from_status(400, "Invalid model")),
            MockReply::text("unused"),
        ]));
        let orch = orchestrator(client.clone(), echo_registry());
        let recorder = Recorder::default();
        orch.run(query("hi"), &recorder).await;

        assert_eq!(client.call_count(), 1);
        assert!(matches!(recorder.events().as_slice(), [Seen::Error(ClientError::Api { retryable: false, .. })]));
    }

    #[tokio::test]
    async fn test_stream_failure_is_not_retried() {
        let client = Arc::new(MockCompletionClient::new(vec![
            MockReply::text(r#"<tool_call name="codeExplanation" />"#),
            MockReply::chunks(["partial "]).then_fail(ClientError::from_status(503, "dropped")),
            MockReply::chunks(["unused"]),
        ]));
        let orch = orchestrator(client.clone(), echo_registry());
        let recorder = Recorder::default();
        orch.run(query("explain"), &recorder).await;

        assert_eq!(client.call_count(), 2);
        let events = recorder.events();
        assert_eq!(events[2], Seen::Data("partial ".into()));
        assert_eq!(events[3], Seen::Error(ClientError::from_status(503, "dropped")));
        assert_eq!(events.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_stream_suppresses_end() {
        let client = Arc::new(MockCompletionClient::new(vec![
            MockReply::text(r#"<tool_call name="codeExplanation" />"#),
            MockReply::chunks(["one ", "two ", "three"]).with_delay(Duration::from_millis(100)),
        ]));
        let orch = Arc::new(orchestrator(client, echo_registry()));
        let recorder = Arc::new(Recorder::default());

        let id = orch.begin();
        let task = {
            let orch = orch.clone();
            let recorder = recorder.clone();
            tokio::spawn(async move { orch.run_with_id(id, query("explain"), &*recorder).await })
        };

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(orch.state(id), OrchestratorState::Streaming);
        assert!(orch.cancel(id));
        task.await.unwrap();

        let events = recorder.events();
        assert_eq!(events.last(), Some(&Seen::Data("one ".into())));
        assert!(!events.contains(&Seen::End));
        assert!(!events.iter().any(|e| matches!(e, Seen::Error(_))));
        assert!(!orch.cancel(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_targets_every_active_query() {
        let client = Arc::new(MockCompletionClient::new(vec![
            MockReply::text(r#"<tool_call name="codeExplanation" />"#),
            MockReply::chunks(["a", "b"]).with_delay(Duration::from_secs(1)),
            MockReply::text(r#"<tool_call name="codeExplanation" />"#),
            MockReply::chunks(["c", "d"]).with_delay(Duration::from_secs(1)),
        ]));
        let orch = Arc::new(orchestrator(client.clone(), echo_registry()));
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());

        let spawn = |recorder: Arc<Recorder>| {
            let orch = orch.clone();
            let id = orch.begin();
            (id, tokio::spawn(async move { orch.run_with_id(id, query("x"), &*recorder).await }))
        };

        // Each query parks in its own stream before the next one starts
        let (a, task_a) = spawn(first.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(orch.state(a), OrchestratorState::Streaming);

        let (b, task_b) = spawn(second.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(orch.state(b), OrchestratorState::Streaming);
        assert_ne!(a, b);
        assert_eq!(client.stream_call_count(), 2);

        assert_eq!(orch.active_count(), 2);
        assert_eq!(orch.cancel_all(), 2);
        task_a.await.unwrap();
        task_b.await.unwrap();

        for recorder in [&first, &second] {
            let events = recorder.events();
            assert!(!events.contains(&Seen::End));
            assert!(!events.iter().any(|e| matches!(e, Seen::Error(_))));
            assert!(!events.contains(&Seen::Data("a".into())));
            assert!(!events.contains(&Seen::Data("c".into())));
        }
        assert_eq!(orch.active_count(), 0);
        assert_eq!(orch.cancel_all(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_others_spares_the_given_query() {
        let client = Arc::new(MockCompletionClient::new(vec![
            MockReply::text(r#"<tool_call name="codeExplanation" />"#),
            MockReply::chunks(["old"]).with_delay(Duration::from_secs(1)),
            MockReply::text("new answer"),
        ]));
        let orch = Arc::new(orchestrator(client, echo_registry()));
        let stale = Arc::new(Recorder::default());

        let old_id = orch.begin();
        let task = {
            let orch = orch.clone();
            let stale = stale.clone();
            tokio::spawn(async move { orch.run_with_id(old_id, query("x"), &*stale).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let new_id = orch.begin();
        assert_eq!(orch.cancel_others(new_id), 1);
        task.await.unwrap();

        let fresh = Recorder::default();
        orch.run_with_id(new_id, query("y"), &fresh).await;

        assert!(!stale.events().contains(&Seen::End));
        assert_eq!(fresh.events(), vec![Seen::Data("new answer".into()), Seen::End]);
    }

    #[tokio::test]
    async fn test_file_search_scenario_against_real_workspace() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/index.ts"), "export {}\n").unwrap();
        fs::write(dir.path().join("README.md"), "# demo\n").unwrap();

        let logger: Arc<dyn Logger> = Arc::new(NoOpLogger::new());
        let context = Arc::new(ContextManager::new(Arc::new(ContextCache::default()), logger.clone()));
        let tools = Arc::new(builtin_registry(
            shared_workspace(Workspace::new(dir.path())),
            context,
            logger,
        ));
        let client = Arc::new(MockCompletionClient::new(vec![
            MockReply::text(r#"<tool_call name="fileSearch" args='{"globPattern": "**/*.ts"}' />"#),
            MockReply::chunks(["The workspace has ", "one TypeScript file: src/index.ts"]),
        ]));
        let orch = orchestrator(client.clone(), tools);
        let recorder = Recorder::default();

        orch.run(query("list ts files"), &recorder).await;

        let data = recorder.data();
        assert_eq!(data.len(), 4);
        assert!(data[0].contains("Tool call: fileSearch"));
        assert!(data[1].contains("Tool response: ["));
        assert!(data[1].contains("index.ts"));
        assert!(!data[1].contains("README.md"));
        assert_eq!(data[2..].concat(), "The workspace has one TypeScript file: src/index.ts");
        assert_eq!(recorder.events().last(), Some(&Seen::End));
        assert!(client.calls()[1].request.messages[3].content.contains("index.ts"));
    }

    #[test]
    fn test_query_from_settings() {
        let mut settings = ExtensionSettings::default();
        settings.default_model = PerplexityModel::SonarPro;
        settings.enrich_workspace_context = false;
        settings.retries = Some(1);
        settings.timeout_ms = Some(15000);

        let q = SearchQuery::from_settings("hi", &settings, "pplx-secret");
        assert_eq!(q.model, PerplexityModel::SonarPro);
        assert!(!q.workspace_tools);
        assert!(q.active_file_tools);
        assert_eq!(q.retry.max_attempts, 1);
        assert_eq!(q.timeout, Some(Duration::from_millis(15000)));
        assert!(!format!("{:?}", q).contains("pplx-secret"));
    }
}
