use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};
use uranus_core::{Arguments, Config, Error, Paths, Result, ToolResult, Turn, TurnOutcome};
use uranus_storage::{AuditLogger, ConversationMemory, SessionStore};
use uranus_tools::terminate::TERMINATED_KEY;
use uranus_tools::{ToolContext, ToolRegistry};

use crate::router::IntentRouter;

pub const DEFAULT_SESSION: &str = "cli:default";
pub const LAST_TOOL_KEY: &str = "last_tool";

/// How long a timed-out handler gets to unwind after abort.
const ABORT_GRACE: Duration = Duration::from_millis(100);

/// Where a turn is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Received,
    Routed,
    Invoking,
    Completed,
    NoMatch,
    RoutingFailed,
}

/// What the session hands back for one submitted input.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Completed { tool: String, result: ToolResult },
    NoMatch { confidence: f64 },
    RoutingFailed { reason: String },
}

impl Response {
    pub fn is_completed(&self) -> bool {
        matches!(self, Response::Completed { .. })
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Completed { tool, result } if result.is_timeout() => {
                write!(f, "{} timed out", tool)
            }
            Response::Completed { tool, result } if !result.is_success() => write!(
                f,
                "{} failed: {}",
                tool,
                result.error_detail().unwrap_or("unknown error")
            ),
            Response::Completed { result, .. } => match result.payload() {
                Value::String(s) => f.write_str(s),
                Value::Null => f.write_str("(done)"),
                other => {
                    let rendered =
                        serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string());
                    f.write_str(&rendered)
                }
            },
            Response::NoMatch { .. } => {
                f.write_str("Sorry, no matching capability for that request.")
            }
            Response::RoutingFailed { reason } => {
                write!(f, "Could not understand the request or info is missing: {}", reason)
            }
        }
    }
}

/// Cancellation scope for one invocation. Dropping it cancels the token the
/// handler was given, on every exit path.
struct InvocationScope {
    token: CancellationToken,
    _guard: DropGuard,
}

impl InvocationScope {
    fn new(parent: &CancellationToken) -> Self {
        let token = parent.child_token();
        let guard = token.clone().drop_guard();
        Self {
            token,
            _guard: guard,
        }
    }

    fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// One conversation session: routes each input to a tool, runs it under a
/// timeout, and records the turn.
///
/// Sessions share the registry through an `Arc` and own everything else, so
/// separate sessions can run on separate tasks without locking.
pub struct AgentRuntime {
    registry: Arc<ToolRegistry>,
    config: Arc<Config>,
    workspace: PathBuf,
    session_key: String,
    memory: ConversationMemory,
    router: IntentRouter,
    store: Option<SessionStore>,
    /// Lines in the session file since it was last rewritten.
    persisted: usize,
    audit: Option<AuditLogger>,
    shutdown: CancellationToken,
}

impl AgentRuntime {
    pub fn new(registry: Arc<ToolRegistry>, config: Arc<Config>, workspace: PathBuf) -> Self {
        let memory = ConversationMemory::new(config.agent.max_history);
        let router = IntentRouter::from_config(&config.agent);
        Self {
            registry,
            config,
            workspace,
            session_key: DEFAULT_SESSION.to_string(),
            memory,
            router,
            store: None,
            persisted: 0,
            audit: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_session(mut self, session_key: impl Into<String>) -> Self {
        self.session_key = session_key.into();
        self
    }

    /// Persist turns and audit events under `paths`, restoring any history
    /// already stored for this session. Call after `with_session`.
    pub fn with_persistence(mut self, paths: &Paths) -> Result<Self> {
        let store = SessionStore::new(paths.clone());
        let turns = store.load(&self.session_key)?;
        if !turns.is_empty() {
            info!(
                session_key = %self.session_key,
                turns = turns.len(),
                "Restored session history"
            );
        }
        let stored = turns.len();
        self.memory = ConversationMemory::from_turns(turns, self.config.agent.max_history);
        self.store = Some(store);
        self.persisted = stored;
        if stored > self.memory.max_history() {
            self.compact()?;
        }
        self.audit = Some(AuditLogger::new(paths.clone()));
        Ok(self)
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Cancelling this token cancels whatever invocation is in flight.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// The most recent `n` turns, oldest first.
    pub fn get_history(&self, n: usize) -> Vec<Turn> {
        self.memory.recent(n).cloned().collect()
    }

    /// Whether a `terminate` call has ended this session.
    pub fn is_terminated(&self) -> bool {
        self.memory
            .get_scratch(TERMINATED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Forget all turns and scratch state, including anything persisted.
    pub fn clear(&mut self) -> Result<()> {
        self.memory.clear();
        if let Some(store) = &self.store {
            store.clear(&self.session_key)?;
            self.persisted = 0;
        }
        info!(session_key = %self.session_key, "Session cleared");
        Ok(())
    }

    pub async fn submit(&mut self, input: &str) -> Response {
        let trace_id = uuid::Uuid::new_v4().to_string();
        self.enter(TurnPhase::Received, &trace_id);

        let decision = match self.router.route(input, &self.registry, &self.memory) {
            Ok(decision) => decision,
            Err(e) => {
                let reason = e.to_string();
                self.enter(TurnPhase::RoutingFailed, &trace_id);
                info!(trace_id = %trace_id, reason = %reason, "Routing failed");
                if let Some(audit) = &self.audit {
                    if let Err(e) = audit.log_routing_failed(
                        input,
                        &reason,
                        &self.session_key,
                        Some(trace_id.clone()),
                    ) {
                        warn!(error = %e, "Failed to write audit event");
                    }
                }
                let matched = match &e {
                    Error::MissingArgument { tool, .. } => Some(tool.clone()),
                    _ => None,
                };
                self.record(Turn::new(
                    self.memory.next_turn_id(),
                    input,
                    matched,
                    Arguments::new(),
                    TurnOutcome::RoutingFailed {
                        reason: reason.clone(),
                    },
                ));
                return Response::RoutingFailed { reason };
            }
        };
        self.enter(TurnPhase::Routed, &trace_id);

        let Some(tool) = decision.tool_name else {
            self.enter(TurnPhase::NoMatch, &trace_id);
            let confidence = decision.confidence;
            self.record(Turn::new(
                self.memory.next_turn_id(),
                input,
                None,
                Arguments::new(),
                TurnOutcome::NoMatch { confidence },
            ));
            return Response::NoMatch { confidence };
        };
        let arguments = decision.extracted_arguments;

        self.enter(TurnPhase::Invoking, &trace_id);
        info!(
            trace_id = %trace_id,
            tool = %tool,
            confidence = decision.confidence,
            "Invoking tool"
        );
        let start = Instant::now();
        let result = self.invoke(&tool, &arguments).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        if result.is_success() {
            info!(trace_id = %trace_id, tool = %tool, duration_ms, "Tool completed");
        } else {
            warn!(
                trace_id = %trace_id,
                tool = %tool,
                duration_ms,
                error = result.error_detail().unwrap_or_default(),
                "Tool failed"
            );
        }

        if let Some(audit) = &self.audit {
            if let Err(e) = audit.log_tool_call(
                &tool,
                Value::Object(arguments.clone()),
                &result,
                &self.session_key,
                Some(trace_id.clone()),
                Some(duration_ms),
            ) {
                warn!(error = %e, "Failed to write audit event");
            }
        }

        if result.is_success() {
            self.remember(&tool, &arguments, result.payload());
        }
        self.enter(TurnPhase::Completed, &trace_id);
        self.record(Turn::new(
            self.memory.next_turn_id(),
            input,
            Some(tool.clone()),
            arguments,
            TurnOutcome::Completed(result.clone()),
        ));

        Response::Completed { tool, result }
    }

    fn enter(&self, phase: TurnPhase, trace_id: &str) {
        debug!(session_key = %self.session_key, trace_id, ?phase, "Turn phase");
    }

    /// Run the handler on its own task so a panic or a timeout cannot take the
    /// session down with it.
    async fn invoke(&self, tool: &str, arguments: &Arguments) -> ToolResult {
        let scope = InvocationScope::new(&self.shutdown);
        let ctx = ToolContext::new(self.workspace.clone(), self.config.clone())
            .with_session(self.session_key.clone())
            .with_scratch(self.memory.scratch_snapshot())
            .with_cancel(scope.token());

        let registry = self.registry.clone();
        let name = tool.to_string();
        let params = Value::Object(arguments.clone());
        let mut handle = tokio::spawn(async move { registry.execute(&name, ctx, params).await });

        let limit = self.config.agent.timeout_for(tool);
        let result = match tokio::time::timeout(limit, &mut handle).await {
            Ok(Ok(Ok(payload))) => ToolResult::success(payload),
            Ok(Ok(Err(e))) => handler_error(tool, e),
            Ok(Err(join_err)) if join_err.is_panic() => {
                warn!(tool, "Tool handler panicked");
                ToolResult::failure("tool panicked")
            }
            Ok(Err(_)) => ToolResult::failure("tool cancelled"),
            Err(_) => {
                warn!(tool, timeout_secs = limit.as_secs_f64(), "Tool timed out, aborting");
                handle.abort();
                // A handler blocking its thread ignores abort; leave it detached.
                if tokio::time::timeout(ABORT_GRACE, handle).await.is_err() {
                    warn!(tool, "Tool did not stop after abort, detaching");
                }
                ToolResult::timeout()
            }
        };
        drop(scope);
        result
    }

    fn remember(&mut self, tool: &str, arguments: &Arguments, payload: &Value) {
        self.memory.set_scratch(LAST_TOOL_KEY, Value::String(tool.to_string()));
        for (param, value) in arguments {
            self.memory
                .set_scratch(format!("{}.{}", tool, param), value.clone());
        }
        if let Some(scratch) = payload.get("scratch").and_then(Value::as_object) {
            for (key, value) in scratch {
                self.memory.set_scratch(key.clone(), value.clone());
            }
        }
    }

    fn record(&mut self, turn: Turn) {
        if let Some(store) = &self.store {
            if let Err(e) = store.append(&self.session_key, &turn) {
                warn!(error = %e, session_key = %self.session_key, "Failed to persist turn");
            }
            self.persisted += 1;
        }
        self.memory.append(turn);

        if self.persisted >= 2 * self.memory.max_history() {
            if let Err(e) = self.compact() {
                warn!(error = %e, session_key = %self.session_key, "Failed to compact session file");
            }
        }
    }

    /// Rewrite the session file with only the turns memory still holds.
    fn compact(&mut self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let kept: Vec<Turn> = self.memory.recent(self.memory.len()).cloned().collect();
        store.save(&self.session_key, &kept)?;
        info!(
            session_key = %self.session_key,
            dropped = self.persisted.saturating_sub(kept.len()),
            kept = kept.len(),
            "Compacted session file"
        );
        self.persisted = kept.len();
        Ok(())
    }
}

fn handler_error(tool: &str, e: Error) -> ToolResult {
    if e.is_registry_error() {
        warn!(tool, error = %e, "Routed tool is not runnable");
    } else if !e.is_invocation_failure() {
        debug!(tool, error = %e, "Tool rejected its input");
    }
    match e {
        Error::Timeout(_) => ToolResult::timeout(),
        e => ToolResult::failure(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use uranus_core::ToolStatus;
    use uranus_tools::echo::EchoTool;
    use uranus_tools::{ParamSpec, Tool, ToolSchema, Trigger};

    struct SleepTool {
        live: Arc<AtomicUsize>,
        seen_cancel: Arc<Mutex<Option<CancellationToken>>>,
    }

    struct LiveGuard(Arc<AtomicUsize>);

    impl Drop for LiveGuard {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Tool for SleepTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "sleep",
                description: "Wait for a long time",
                parameters: vec![],
                triggers: vec![Trigger::new("nap")],
            }
        }

        async fn execute(&self, ctx: ToolContext, _params: Value) -> Result<Value> {
            self.live.fetch_add(1, Ordering::SeqCst);
            let _guard = LiveGuard(self.live.clone());
            *self.seen_cancel.lock().unwrap() = Some(ctx.cancel.clone());
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Value::Null)
        }
    }

    struct PanicTool;

    #[async_trait]
    impl Tool for PanicTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "explode",
                description: "Always panics",
                parameters: vec![],
                triggers: vec![],
            }
        }

        async fn execute(&self, _ctx: ToolContext, _params: Value) -> Result<Value> {
            panic!("boom");
        }
    }

    struct FailTool;

    #[async_trait]
    impl Tool for FailTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "fail",
                description: "Always returns an error",
                parameters: vec![ParamSpec::string("path").required()],
                triggers: vec![],
            }
        }

        async fn execute(&self, _ctx: ToolContext, _params: Value) -> Result<Value> {
            Err(Error::ToolInvocation("disk on fire".into()))
        }
    }

    struct StallTool;

    #[async_trait]
    impl Tool for StallTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "stall",
                description: "Blocks its worker thread",
                parameters: vec![],
                triggers: vec![Trigger::new("stall")],
            }
        }

        async fn execute(&self, _ctx: ToolContext, _params: Value) -> Result<Value> {
            std::thread::sleep(Duration::from_secs(2));
            Ok(Value::Null)
        }
    }

    struct Fixture {
        registry: Arc<ToolRegistry>,
        live: Arc<AtomicUsize>,
        seen_cancel: Arc<Mutex<Option<CancellationToken>>>,
    }

    fn fixture() -> Fixture {
        let live = Arc::new(AtomicUsize::new(0));
        let seen_cancel = Arc::new(Mutex::new(None));
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        registry
            .register(Arc::new(SleepTool {
                live: live.clone(),
                seen_cancel: seen_cancel.clone(),
            }))
            .unwrap();
        registry.register(Arc::new(PanicTool)).unwrap();
        registry.register(Arc::new(FailTool)).unwrap();
        Fixture {
            registry: Arc::new(registry),
            live,
            seen_cancel,
        }
    }

    fn runtime(registry: Arc<ToolRegistry>) -> AgentRuntime {
        let mut config = Config::default();
        config.agent.tool_timeouts.insert("sleep".into(), 0.2);
        AgentRuntime::new(registry, Arc::new(config), std::env::temp_dir())
    }

    #[tokio::test]
    async fn test_echo_turn() {
        let mut rt = runtime(fixture().registry);
        let response = rt.submit("echo hello world").await;

        match &response {
            Response::Completed { tool, result } => {
                assert_eq!(tool, "echo");
                assert_eq!(result.status(), ToolStatus::Success);
                assert_eq!(result.payload(), &json!("hello world"));
            }
            other => panic!("unexpected response: {:?}", other),
        }
        assert_eq!(response.to_string(), "hello world");

        let history = rt.get_history(10);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].matched_tool.as_deref(), Some("echo"));
        assert_eq!(history[0].arguments_used["text"], "hello world");
        assert_eq!(
            rt.memory().get_scratch("echo.text"),
            Some(&json!("hello world"))
        );
        assert_eq!(rt.memory().get_scratch(LAST_TOOL_KEY), Some(&json!("echo")));
    }

    #[tokio::test]
    async fn test_no_match_turn() {
        let mut rt = runtime(fixture().registry);
        let response = rt.submit("zzz qux").await;
        assert!(matches!(response, Response::NoMatch { confidence } if confidence < 0.5));

        let history = rt.get_history(1);
        assert!(history[0].matched_tool.is_none());
        assert!(history[0].result().is_none());
    }

    #[tokio::test]
    async fn test_missing_argument_turn() {
        let mut rt = runtime(fixture().registry);
        let response = rt.submit("echo").await;
        match response {
            Response::RoutingFailed { reason } => assert!(reason.contains("text")),
            other => panic!("unexpected response: {:?}", other),
        }
        let history = rt.get_history(1);
        assert!(matches!(history[0].outcome, TurnOutcome::RoutingFailed { .. }));
        assert_eq!(history[0].matched_tool.as_deref(), Some("echo"));

        rt.submit("zzz qux").await;
        assert!(rt.get_history(1)[0].matched_tool.is_none());
    }

    #[tokio::test]
    async fn test_scratch_fills_missing_argument() {
        let mut rt = runtime(fixture().registry);
        rt.submit("echo first").await;
        let response = rt.submit("echo").await;
        assert_eq!(response.to_string(), "first");
    }

    #[tokio::test]
    async fn test_timeout_releases_scope_and_session_survives() {
        let fx = fixture();
        let mut rt = runtime(fx.registry.clone());

        let response = rt.submit("nap").await;
        match &response {
            Response::Completed { tool, result } => {
                assert_eq!(tool, "sleep");
                assert!(result.is_timeout());
                assert_eq!(result.error_detail(), Some("timeout"));
            }
            other => panic!("unexpected response: {:?}", other),
        }

        assert_eq!(fx.live.load(Ordering::SeqCst), 0);
        let token = fx.seen_cancel.lock().unwrap().clone().unwrap();
        assert!(token.is_cancelled());
        assert!(!rt.shutdown_token().is_cancelled());

        let response = rt.submit("echo still here").await;
        assert_eq!(response.to_string(), "still here");
        assert_eq!(rt.get_history(10).len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_handler_times_out_on_schedule() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StallTool)).unwrap();
        registry.register(Arc::new(EchoTool)).unwrap();
        let mut config = Config::default();
        config.agent.tool_timeouts.insert("stall".into(), 0.2);
        let mut rt = AgentRuntime::new(Arc::new(registry), Arc::new(config), std::env::temp_dir());

        let started = Instant::now();
        let response = rt.submit("stall").await;
        assert!(started.elapsed() < Duration::from_secs(1));
        match &response {
            Response::Completed { result, .. } => assert!(result.is_timeout()),
            other => panic!("unexpected response: {:?}", other),
        }
        assert!(rt.get_history(1)[0].result().unwrap().is_timeout());
    }

    #[test]
    fn test_handler_error_mapping() {
        assert!(handler_error("x", Error::Timeout("slow".into())).is_timeout());
        let unknown = handler_error("x", Error::UnknownTool("x".into()));
        assert_eq!(unknown.status(), ToolStatus::Failure);
        assert_eq!(unknown.error_detail(), Some("Unknown tool: x"));
        let invalid = handler_error("x", Error::Validation("bad".into()));
        assert!(!invalid.is_timeout());
        assert_eq!(invalid.status(), ToolStatus::Failure);
    }

    #[tokio::test]
    async fn test_panicking_tool_is_failure() {
        let mut rt = runtime(fixture().registry);
        let response = rt.submit("explode").await;
        match response {
            Response::Completed { result, .. } => {
                assert_eq!(result.status(), ToolStatus::Failure);
                assert!(!result.is_timeout());
            }
            other => panic!("unexpected response: {:?}", other),
        }
        assert!(rt.submit("echo ok").await.is_completed());
    }

    #[tokio::test]
    async fn test_handler_error_is_failure_without_scratch() {
        let mut rt = runtime(fixture().registry);
        let response = rt.submit("fail a.txt").await;
        assert_eq!(response.to_string(), "fail failed: Tool error: disk on fire");
        assert!(rt.memory().get_scratch("fail.path").is_none());
        assert_eq!(rt.get_history(1)[0].arguments_used["path"], "a.txt");
    }

    #[tokio::test]
    async fn test_history_is_bounded_and_ordered() {
        let registry = fixture().registry;
        let mut config = Config::default();
        config.agent.max_history = 3;
        let mut rt = AgentRuntime::new(registry, Arc::new(config), std::env::temp_dir());
        for i in 0..5 {
            rt.submit(&format!("echo {}", i)).await;
        }
        let inputs: Vec<String> = rt.get_history(10).into_iter().map(|t| t.input_text).collect();
        assert_eq!(inputs, vec!["echo 2", "echo 3", "echo 4"]);
        assert_eq!(rt.get_history(1)[0].input_text, "echo 4");
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let paths = Paths::with_base(temp_dir.path().to_path_buf());
        let registry = fixture().registry;

        let mut rt = runtime(registry.clone())
            .with_session("test:one")
            .with_persistence(&paths)
            .unwrap();
        rt.submit("echo saved").await;
        rt.submit("zzz").await;

        let restored = runtime(registry.clone())
            .with_session("test:one")
            .with_persistence(&paths)
            .unwrap();
        let history = restored.get_history(10);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].input_text, "echo saved");

        let events = AuditLogger::new(paths.clone()).read_today().unwrap();
        assert_eq!(events.len(), 1);

        let mut restored = restored;
        restored.clear().unwrap();
        let again = runtime(registry)
            .with_session("test:one")
            .with_persistence(&paths)
            .unwrap();
        assert!(again.get_history(10).is_empty());
    }

    #[tokio::test]
    async fn test_session_file_is_compacted_to_max_history() {
        let temp_dir = TempDir::new().unwrap();
        let paths = Paths::with_base(temp_dir.path().to_path_buf());
        let registry = fixture().registry;
        let store = SessionStore::new(paths.clone());

        let mut wide = Config::default();
        wide.agent.max_history = 50;
        let mut rt = AgentRuntime::new(registry.clone(), Arc::new(wide), std::env::temp_dir())
            .with_session("test:compact")
            .with_persistence(&paths)
            .unwrap();
        for i in 0..6 {
            rt.submit(&format!("echo {}", i)).await;
        }
        assert_eq!(store.load("test:compact").unwrap().len(), 6);

        let mut narrow = Config::default();
        narrow.agent.max_history = 2;
        let narrow = Arc::new(narrow);
        let mut rt = AgentRuntime::new(registry, narrow, std::env::temp_dir())
            .with_session("test:compact")
            .with_persistence(&paths)
            .unwrap();
        let inputs: Vec<String> = store
            .load("test:compact")
            .unwrap()
            .into_iter()
            .map(|t| t.input_text)
            .collect();
        assert_eq!(inputs, vec!["echo 4", "echo 5"]);

        for i in 6..10 {
            rt.submit(&format!("echo {}", i)).await;
        }
        let stored = store.load("test:compact").unwrap();
        assert!(stored.len() < 4);
        assert_eq!(stored.last().unwrap().input_text, "echo 9");
    }

    #[tokio::test]
    async fn test_sessions_run_in_parallel() {
        let registry = fixture().registry;
        let mut handles = Vec::new();
        for n in 0..4 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let mut rt = runtime(registry).with_session(format!("s{}", n));
                for i in 0..5 {
                    rt.submit(&format!("echo {} {}", n, i)).await;
                }
                rt.get_history(100)
            }));
        }
        for (n, handle) in handles.into_iter().enumerate() {
            let history = handle.await.unwrap();
            assert_eq!(history.len(), 5);
            assert!(history
                .iter()
                .all(|t| t.input_text.starts_with(&format!("echo {} ", n))));
        }
    }

    #[test]
    fn test_response_display() {
        let failed = Response::Completed {
            tool: "x".into(),
            result: ToolResult::timeout(),
        };
        assert_eq!(failed.to_string(), "x timed out");
        let structured = Response::Completed {
            tool: "x".into(),
            result: ToolResult::success(json!({"a": 1})),
        };
        assert!(structured.to_string().contains("\"a\": 1"));
    }
}
