use async_trait::async_trait;
use serde_json::{json, Value};
use uranus_core::Result;

use crate::{ParamSpec, Tool, ToolContext, ToolSchema, Trigger};

/// Scratch key set once a session has been asked to end.
pub const TERMINATED_KEY: &str = "terminated";

/// `terminate`: marks the interaction finished. Front ends close the
/// session when they see a successful call to it.
pub struct TerminateTool;

#[async_trait]
impl Tool for TerminateTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "terminate",
            description: "Terminate the interaction when the request is met or cannot proceed further",
            parameters: vec![ParamSpec::string("status")
                .choices(&["success", "failure"])
                .default_value(json!("success"))
                .describe("The finish status of the interaction")],
            triggers: vec![Trigger::new("terminate"), Trigger::new("finish")],
        }
    }

    async fn execute(&self, _ctx: ToolContext, params: Value) -> Result<Value> {
        let status = params
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("success");
        Ok(json!({
            "message": format!("The interaction has been completed with status: {}", status),
            "status": status,
            "scratch": { TERMINATED_KEY: true },
        }))
    }
}
