use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::info;
use uranus_core::{Error, Result};

use crate::{safe_truncate, str_param, ParamSpec, Tool, ToolContext, ToolSchema, Trigger};

const MAX_OUTPUT_CHARS: usize = 10000;

pub struct PythonExecuteTool;

#[async_trait]
impl Tool for PythonExecuteTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "python_execute",
            description: "Execute python code. Only printed output is captured",
            parameters: vec![
                ParamSpec::string("code")
                    .required()
                    .greedy()
                    .describe("Python source to run"),
                ParamSpec::integer("timeout_secs")
                    .default_value(json!(5))
                    .describe("Maximum execution time in seconds"),
            ],
            triggers: vec![Trigger::new("python"), Trigger::new("py")],
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        if str_param(params, "code")?.trim().is_empty() {
            return Err(Error::Validation("Code must not be empty".to_string()));
        }
        if let Some(secs) = params.get("timeout_secs").and_then(|v| v.as_i64()) {
            if secs <= 0 {
                return Err(Error::Validation("timeout_secs must be positive".to_string()));
            }
        }
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let code = str_param(&params, "code")?;
        let secs = params
            .get("timeout_secs")
            .and_then(|v| v.as_u64())
            .unwrap_or(5);
        let interpreter = &ctx.config.tools.python.interpreter;

        tokio::fs::create_dir_all(&ctx.workspace).await?;
        info!(interpreter = %interpreter, timeout_secs = secs, "Running python code");

        let mut cmd = Command::new(interpreter);
        cmd.arg("-c")
            .arg(code)
            .current_dir(&ctx.workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(Duration::from_secs(secs), cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(Error::ToolInvocation(format!(
                    "Failed to start {}: {}",
                    interpreter, e
                )))
            }
            Err(_) => {
                return Err(Error::Timeout(format!(
                    "Python execution timed out after {} seconds",
                    secs
                )))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let last_line = stderr.trim().lines().last().unwrap_or("python exited with an error");
            return Err(Error::ToolInvocation(last_line.to_string()));
        }

        Ok(json!({
            "observation": safe_truncate(&stdout, MAX_OUTPUT_CHARS),
            "stderr": safe_truncate(&stderr, MAX_OUTPUT_CHARS),
        }))
    }
}
