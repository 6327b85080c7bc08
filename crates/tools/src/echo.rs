use async_trait::async_trait;
use serde_json::Value;
use uranus_core::Result;

use crate::{str_param, ParamSpec, Tool, ToolContext, ToolSchema, Trigger};

pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "echo",
            description: "Repeat the given text back",
            parameters: vec![ParamSpec::string("text")
                .required()
                .greedy()
                .describe("Text to repeat")],
            triggers: vec![Trigger::new("echo"), Trigger::new("say")],
        }
    }

    async fn execute(&self, _ctx: ToolContext, params: Value) -> Result<Value> {
        Ok(Value::String(str_param(&params, "text")?.to_string()))
    }
}
