pub mod browser;
pub mod echo;
pub mod file_ops;
pub mod python;
pub mod registry;
pub mod system_info;
pub mod terminal;
pub mod terminate;
pub mod web_search;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uranus_core::{Config, Error, Result};

pub use registry::{ToolDescriptor, ToolRegistry};

/// Truncate a string to at most `max_chars` bytes, respecting UTF-8 char boundaries.
pub fn safe_truncate(s: &str, max_chars: usize) -> &str {
    if s.len() <= max_chars {
        return s;
    }
    let mut end = max_chars;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Everything a handler may read while it runs. Handlers never write session
/// state directly; a `"scratch"` object in their payload is applied by the
/// dispatch loop after a successful invocation.
#[derive(Clone)]
pub struct ToolContext {
    pub workspace: PathBuf,
    pub config: Arc<Config>,
    pub session_key: String,
    pub scratch: Arc<HashMap<String, Value>>,
    pub cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(workspace: PathBuf, config: Arc<Config>) -> Self {
        Self {
            workspace,
            config,
            session_key: "default".to_string(),
            scratch: Arc::new(HashMap::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_session(mut self, session_key: impl Into<String>) -> Self {
        self.session_key = session_key.into();
        self
    }

    pub fn with_scratch(mut self, scratch: HashMap<String, Value>) -> Self {
        self.scratch = Arc::new(scratch);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn scratch_str(&self, key: &str) -> Option<&str> {
        self.scratch.get(key).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
        }
    }

    /// Convert a raw token from user text into a typed value.
    pub fn convert(&self, raw: &str) -> std::result::Result<Value, String> {
        match self {
            ParamKind::String => Ok(Value::String(raw.to_string())),
            ParamKind::Integer => raw
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("expected an integer, got '{}'", raw)),
            ParamKind::Number => raw
                .parse::<f64>()
                .ok()
                .and_then(|n| serde_json::Number::from_f64(n).map(Value::Number))
                .ok_or_else(|| format!("expected a number, got '{}'", raw)),
            ParamKind::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "off" | "0" => Ok(Value::Bool(false)),
                _ => Err(format!("expected a boolean, got '{}'", raw)),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<Value>,
    /// Takes the rest of the input verbatim when filled positionally.
    pub greedy: bool,
    pub choices: &'static [&'static str],
    pub description: &'static str,
}

impl ParamSpec {
    pub fn new(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
            greedy: false,
            choices: &[],
            description: "",
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, ParamKind::String)
    }

    pub fn integer(name: &'static str) -> Self {
        Self::new(name, ParamKind::Integer)
    }

    pub fn number(name: &'static str) -> Self {
        Self::new(name, ParamKind::Number)
    }

    pub fn boolean(name: &'static str) -> Self {
        Self::new(name, ParamKind::Boolean)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn greedy(mut self) -> Self {
        self.greedy = true;
        self
    }

    pub fn choices(mut self, choices: &'static [&'static str]) -> Self {
        self.choices = choices;
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Type and choice check for an already-typed value.
    pub fn check(&self, value: &Value) -> std::result::Result<(), String> {
        if !self.kind.accepts(value) {
            return Err(format!("'{}' must be of type {}", self.name, self.kind.as_str()));
        }
        if !self.choices.is_empty() {
            let s = value.as_str().unwrap_or_default();
            if !self.choices.contains(&s) {
                return Err(format!(
                    "'{}' must be one of: {}",
                    self.name,
                    self.choices.join(", ")
                ));
            }
        }
        Ok(())
    }
}

/// A phrase that routes to a tool, optionally binding argument values.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub phrase: &'static str,
    pub preset: Vec<(&'static str, Value)>,
}

impl Trigger {
    pub fn new(phrase: &'static str) -> Self {
        Self {
            phrase,
            preset: Vec::new(),
        }
    }

    pub fn preset(mut self, param: &'static str, value: Value) -> Self {
        self.preset.push((param, value));
        self
    }
}

#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ParamSpec>,
    pub triggers: Vec<Trigger>,
}

impl ToolSchema {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// JSON-schema style description of the parameters.
    pub fn parameters_json(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for p in &self.parameters {
            let mut prop = json!({
                "type": p.kind.as_str(),
                "description": p.description,
            });
            if !p.choices.is_empty() {
                prop["enum"] = json!(p.choices);
            }
            if let Some(default) = &p.default {
                prop["default"] = default.clone();
            }
            properties.insert(p.name.to_string(), prop);
            if p.required {
                required.push(p.name);
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> ToolSchema;

    /// Tool-specific checks beyond the declared schema.
    fn validate(&self, _params: &Value) -> Result<()> {
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value>;
}

/// Read a string parameter that the schema already guarantees is present.
pub(crate) fn str_param<'a>(params: &'a Value, name: &str) -> Result<&'a str> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Validation(format!("Missing parameter: {}", name)))
}
