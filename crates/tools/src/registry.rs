use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};
use uranus_core::{Error, Result};

use crate::browser::BrowserTool;
use crate::echo::EchoTool;
use crate::file_ops::FileOpsTool;
use crate::python::PythonExecuteTool;
use crate::system_info::SystemInfoTool;
use crate::terminal::TerminalTool;
use crate::terminate::TerminateTool;
use crate::web_search::WebSearchTool;
use crate::{ParamSpec, Tool, ToolContext, ToolSchema, Trigger};

/// A registered tool: its schema, captured once at registration, plus the handler.
#[derive(Clone)]
pub struct ToolDescriptor {
    schema: ToolSchema,
    handler: Arc<dyn Tool>,
}

impl ToolDescriptor {
    pub fn name(&self) -> &'static str {
        self.schema.name
    }

    pub fn description(&self) -> &'static str {
        self.schema.description
    }

    pub fn parameters(&self) -> &[ParamSpec] {
        &self.schema.parameters
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.schema.triggers
    }

    pub fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    pub fn handler(&self) -> Arc<dyn Tool> {
        Arc::clone(&self.handler)
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.schema.name)
            .finish()
    }
}

/// Registration-ordered set of tools. Filled once at startup and then shared
/// read-only (usually as `Arc<ToolRegistry>`).
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in tool set, in routing priority order.
    pub fn with_defaults() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(EchoTool))?;
        registry.register(Arc::new(SystemInfoTool))?;
        registry.register(Arc::new(FileOpsTool))?;
        registry.register(Arc::new(TerminalTool))?;
        registry.register(Arc::new(PythonExecuteTool))?;
        registry.register(Arc::new(BrowserTool))?;
        registry.register(Arc::new(WebSearchTool))?;
        registry.register(Arc::new(TerminateTool))?;
        Ok(registry)
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let schema = tool.schema();
        if self.index.contains_key(schema.name) {
            warn!(tool = schema.name, "Duplicate tool registration rejected");
            return Err(Error::DuplicateTool(schema.name.to_string()));
        }
        check_schema(&schema)?;

        debug!(tool = schema.name, "Registered tool");
        self.index.insert(schema.name, self.tools.len());
        self.tools.push(ToolDescriptor {
            schema,
            handler: tool,
        });
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&ToolDescriptor> {
        self.index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| Error::UnknownTool(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Descriptors in registration order. The iterator is `Clone`, so callers
    /// can restart it without touching the registry.
    pub fn list_all(&self) -> std::slice::Iter<'_, ToolDescriptor> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|d| d.name()).collect()
    }

    pub fn tool_schemas(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|d| {
                json!({
                    "type": "function",
                    "function": {
                        "name": d.name(),
                        "description": d.description(),
                        "parameters": d.schema.parameters_json(),
                        "triggers": d.triggers().iter().map(|t| t.phrase).collect::<Vec<_>>(),
                    }
                })
            })
            .collect()
    }

    /// Insert declared defaults for optional parameters the caller left out.
    pub fn fill_defaults(&self, name: &str, params: &mut Value) -> Result<()> {
        let descriptor = self.lookup(name)?;
        let Some(obj) = params.as_object_mut() else {
            return Ok(());
        };
        for p in descriptor.parameters() {
            if let Some(default) = &p.default {
                obj.entry(p.name).or_insert_with(|| default.clone());
            }
        }
        Ok(())
    }

    /// Check arguments against the declared schema: only declared names,
    /// required ones present, every value of the declared kind.
    pub fn validate_arguments(&self, name: &str, params: &Value) -> Result<()> {
        let descriptor = self.lookup(name)?;
        let obj = params.as_object().ok_or_else(|| {
            Error::Validation(format!("Arguments for '{}' must be a JSON object", name))
        })?;

        for key in obj.keys() {
            if descriptor.schema.param(key).is_none() {
                return Err(Error::Validation(format!(
                    "Tool '{}' has no parameter '{}'",
                    name, key
                )));
            }
        }
        for p in descriptor.parameters() {
            match obj.get(p.name) {
                Some(value) => p.check(value).map_err(Error::Validation)?,
                None if p.required => {
                    return Err(Error::MissingArgument {
                        tool: name.to_string(),
                        parameter: p.name.to_string(),
                    })
                }
                None => {}
            }
        }
        Ok(())
    }

    pub async fn execute(&self, name: &str, ctx: ToolContext, params: Value) -> Result<Value> {
        let descriptor = self.lookup(name)?;

        if let Err(e) = self
            .validate_arguments(name, &params)
            .and_then(|_| descriptor.handler.validate(&params))
        {
            warn!(tool = name, error = %e, "Tool validation failed");
            return Err(e);
        }

        debug!(tool = name, "Executing tool");
        descriptor.handler.execute(ctx, params).await
    }
}

fn check_schema(schema: &ToolSchema) -> Result<()> {
    if schema.name.trim().is_empty() {
        return Err(Error::Validation("Tool name must not be empty".to_string()));
    }
    let mut seen = HashSet::new();
    for p in &schema.parameters {
        if !seen.insert(p.name) {
            return Err(Error::Validation(format!(
                "Tool '{}' declares parameter '{}' twice",
                schema.name, p.name
            )));
        }
        if let Some(default) = &p.default {
            p.check(default).map_err(|e| {
                Error::Validation(format!("Tool '{}' has a bad default: {}", schema.name, e))
            })?;
        }
    }
    for trigger in &schema.triggers {
        if trigger.phrase.trim().is_empty() {
            return Err(Error::Validation(format!(
                "Tool '{}' has an empty trigger phrase",
                schema.name
            )));
        }
        for (param, value) in &trigger.preset {
            let spec = schema.param(param).ok_or_else(|| {
                Error::Validation(format!(
                    "Trigger '{}' of tool '{}' presets undeclared parameter '{}'",
                    trigger.phrase, schema.name, param
                ))
            })?;
            spec.check(value).map_err(Error::Validation)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use uranus_core::Config;

    struct StubTool {
        name: &'static str,
        params: Vec<ParamSpec>,
        triggers: Vec<Trigger>,
    }

    impl StubTool {
        fn named(name: &'static str) -> Self {
            Self {
                name,
                params: vec![ParamSpec::string("text").required()],
                triggers: vec![],
            }
        }
    }

    #[async_trait]
    impl Tool for StubTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: self.name,
                description: "stub",
                parameters: self.params.clone(),
                triggers: self.triggers.clone(),
            }
        }

        async fn execute(&self, _ctx: ToolContext, params: Value) -> Result<Value> {
            Ok(params)
        }
    }

    fn ctx() -> ToolContext {
        ToolContext::new(PathBuf::from("/tmp"), Arc::new(Config::default()))
    }

    #[test]
    fn test_registry_new_empty() {
        let reg = ToolRegistry::new();
        assert!(reg.is_empty());
        assert!(matches!(reg.lookup("echo"), Err(Error::UnknownTool(_))));
    }

    #[test]
    fn test_registry_with_defaults_has_builtin_tools() {
        let reg = ToolRegistry::with_defaults().unwrap();
        let names = reg.tool_names();
        for expected in [
            "echo",
            "system_info",
            "file_operations",
            "terminal",
            "python_execute",
            "web_search",
            "browser",
            "terminate",
        ] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_duplicate_keeps_first() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(StubTool::named("a"))).unwrap();
        let mut second = StubTool::named("a");
        second.params = vec![];
        let err = reg.register(Arc::new(second)).unwrap_err();
        assert!(matches!(err, Error::DuplicateTool(ref n) if n == "a"));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.lookup("a").unwrap().parameters().len(), 1);
    }

    #[test]
    fn test_list_all_is_ordered_and_restartable() {
        let mut reg = ToolRegistry::new();
        for name in ["c", "a", "b"] {
            reg.register(Arc::new(StubTool::named(name))).unwrap();
        }
        let iter = reg.list_all();
        let first: Vec<_> = iter.clone().map(|d| d.name()).collect();
        let second: Vec<_> = iter.map(|d| d.name()).collect();
        assert_eq!(first, vec!["c", "a", "b"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_rejects_malformed_schema() {
        let mut reg = ToolRegistry::new();
        let mut dup_param = StubTool::named("dup");
        dup_param.params.push(ParamSpec::string("text"));
        assert!(matches!(
            reg.register(Arc::new(dup_param)),
            Err(Error::Validation(_))
        ));

        let mut bad_preset = StubTool::named("preset");
        bad_preset.triggers = vec![Trigger::new("go").preset("nope", json!(1))];
        assert!(matches!(
            reg.register(Arc::new(bad_preset)),
            Err(Error::Validation(_))
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_validate_arguments() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(StubTool::named("a"))).unwrap();
        assert!(reg.validate_arguments("a", &json!({"text": "x"})).is_ok());
        assert!(matches!(
            reg.validate_arguments("a", &json!({})),
            Err(Error::MissingArgument { .. })
        ));
        assert!(matches!(
            reg.validate_arguments("a", &json!({"text": 3})),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            reg.validate_arguments("a", &json!({"text": "x", "extra": 1})),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_fill_defaults() {
        let mut reg = ToolRegistry::new();
        let mut tool = StubTool::named("a");
        tool.params
            .push(ParamSpec::integer("times").default_value(json!(2)));
        reg.register(Arc::new(tool)).unwrap();
        let mut params = json!({"text": "x"});
        reg.fill_defaults("a", &mut params).unwrap();
        assert_eq!(params["times"], 2);
    }

    #[test]
    fn test_tool_schemas_export() {
        let reg = ToolRegistry::with_defaults().unwrap();
        for schema in reg.tool_schemas() {
            assert_eq!(schema["type"], "function");
            assert!(schema["function"]["name"].is_string());
            assert_eq!(schema["function"]["parameters"]["type"], "object");
        }
    }

    #[tokio::test]
    async fn test_execute_validates_then_runs() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(StubTool::named("a"))).unwrap();
        let out = reg.execute("a", ctx(), json!({"text": "hi"})).await.unwrap();
        assert_eq!(out["text"], "hi");
        assert!(reg.execute("a", ctx(), json!({})).await.is_err());
        assert!(matches!(
            reg.execute("zzz", ctx(), json!({})).await,
            Err(Error::UnknownTool(_))
        ));
    }
}
