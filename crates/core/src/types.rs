use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameter name to value, in insertion order.
pub type Arguments = serde_json::Map<String, Value>;

/// `error_detail` value used for invocations that exceeded their deadline.
pub const TIMEOUT_DETAIL: &str = "timeout";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Failure,
}

/// Outcome of a single tool invocation.
///
/// `error_detail` is present iff `status` is `Failure`; the constructors are
/// the only way to build one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    status: ToolStatus,
    #[serde(default)]
    payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_detail: Option<String>,
}

impl ToolResult {
    pub fn success(payload: Value) -> Self {
        Self {
            status: ToolStatus::Success,
            payload,
            error_detail: None,
        }
    }

    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Failure,
            payload: Value::Null,
            error_detail: Some(detail.into()),
        }
    }

    pub fn timeout() -> Self {
        Self::failure(TIMEOUT_DETAIL)
    }

    pub fn status(&self) -> ToolStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }

    pub fn is_timeout(&self) -> bool {
        self.error_detail.as_deref() == Some(TIMEOUT_DETAIL)
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnOutcome {
    Completed(ToolResult),
    NoMatch { confidence: f64 },
    RoutingFailed { reason: String },
}

/// One recorded exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: u64,
    pub input_text: String,
    pub matched_tool: Option<String>,
    #[serde(default)]
    pub arguments_used: Arguments,
    pub outcome: TurnOutcome,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(
        id: u64,
        input_text: impl Into<String>,
        matched_tool: Option<String>,
        arguments_used: Arguments,
        outcome: TurnOutcome,
    ) -> Self {
        Self {
            id,
            input_text: input_text.into(),
            matched_tool,
            arguments_used,
            outcome,
            timestamp: Utc::now(),
        }
    }

    /// The tool result, when a tool was actually invoked.
    pub fn result(&self) -> Option<&ToolResult> {
        match &self.outcome {
            TurnOutcome::Completed(result) => Some(result),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    pub tool_name: Option<String>,
    pub confidence: f64,
    pub extracted_arguments: Arguments,
}

impl RoutingDecision {
    pub fn no_match(confidence: f64) -> Self {
        Self {
            tool_name: None,
            confidence,
            extracted_arguments: Arguments::new(),
        }
    }

    pub fn matched(tool: impl Into<String>, confidence: f64, arguments: Arguments) -> Self {
        Self {
            tool_name: Some(tool.into()),
            confidence,
            extracted_arguments: arguments,
        }
    }

    pub fn is_match(&self) -> bool {
        self.tool_name.is_some()
    }
}
