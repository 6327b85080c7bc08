use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::error;
use uranus_core::{Paths, Result, ToolResult, ToolStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    ToolCall {
        tool_name: String,
        params: Value,
        status: ToolStatus,
        error: Option<String>,
        timestamp_ms: i64,
        session_key: String,
        trace_id: Option<String>,
        duration_ms: Option<u64>,
    },
    RoutingFailed {
        input: String,
        reason: String,
        timestamp_ms: i64,
        session_key: String,
        trace_id: Option<String>,
    },
}

/// Append-only daily JSONL audit trail under `<base>/audit/YYYY-MM-DD.jsonl`.
pub struct AuditLogger {
    paths: Paths,
}

impl AuditLogger {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    pub fn log_tool_call(
        &self,
        tool_name: &str,
        params: Value,
        result: &ToolResult,
        session_key: &str,
        trace_id: Option<String>,
        duration_ms: Option<u64>,
    ) -> Result<()> {
        self.write_event(&AuditEvent::ToolCall {
            tool_name: tool_name.to_string(),
            params,
            status: result.status(),
            error: result.error_detail().map(String::from),
            timestamp_ms: Utc::now().timestamp_millis(),
            session_key: session_key.to_string(),
            trace_id,
            duration_ms,
        })
    }

    pub fn log_routing_failed(
        &self,
        input: &str,
        reason: &str,
        session_key: &str,
        trace_id: Option<String>,
    ) -> Result<()> {
        self.write_event(&AuditEvent::RoutingFailed {
            input: input.to_string(),
            reason: reason.to_string(),
            timestamp_ms: Utc::now().timestamp_millis(),
            session_key: session_key.to_string(),
            trace_id,
        })
    }

    fn write_event(&self, event: &AuditEvent) -> Result<()> {
        let log_file = self.log_file_for(&today());

        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)?;
        writeln!(file, "{}", serde_json::to_string(event)?)?;

        Ok(())
    }

    fn log_file_for(&self, date: &str) -> PathBuf {
        self.paths.audit_dir().join(format!("{}.jsonl", date))
    }

    /// Read audit events from a specific date (`YYYY-MM-DD`).
    pub fn read_events(&self, date: &str) -> Result<Vec<AuditEvent>> {
        let log_file = self.log_file_for(date);

        if !log_file.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&log_file)?;
        let mut events = Vec::new();

        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => {
                    error!(error = %e, line = %line, "Failed to parse audit event");
                }
            }
        }

        Ok(events)
    }

    pub fn read_today(&self) -> Result<Vec<AuditEvent>> {
        self.read_events(&today())
    }
}

fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_audit_logger() {
        let temp_dir = TempDir::new().unwrap();
        let paths = Paths::with_base(temp_dir.path().to_path_buf());
        let logger = AuditLogger::new(paths);

        logger
            .log_tool_call(
                "file_operations",
                serde_json::json!({"operation": "read", "path": "a.txt"}),
                &ToolResult::timeout(),
                "cli:default",
                Some("trace-123".to_string()),
                Some(100),
            )
            .unwrap();
        logger
            .log_routing_failed("file read", "missing path", "cli:default", None)
            .unwrap();

        let events = logger.read_today().unwrap();
        assert_eq!(events.len(), 2);

        match &events[0] {
            AuditEvent::ToolCall {
                tool_name,
                status,
                error,
                ..
            } => {
                assert_eq!(tool_name, "file_operations");
                assert_eq!(*status, ToolStatus::Failure);
                assert_eq!(error.as_deref(), Some("timeout"));
            }
            _ => panic!("Expected ToolCall event"),
        }
        assert!(matches!(&events[1], AuditEvent::RoutingFailed { reason, .. } if reason == "missing path"));
    }

    #[test]
    fn test_read_missing_date() {
        let temp_dir = TempDir::new().unwrap();
        let logger = AuditLogger::new(Paths::with_base(temp_dir.path().to_path_buf()));
        assert!(logger.read_events("1999-01-01").unwrap().is_empty());
    }
}
