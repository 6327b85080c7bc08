use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate tool: {0}")]
    DuplicateTool(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing argument '{parameter}' for tool '{tool}'")]
    MissingArgument { tool: String, parameter: String },

    #[error("Tool error: {0}")]
    ToolInvocation(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Registry misuse. Fatal when it happens during startup registration.
    pub fn is_registry_error(&self) -> bool {
        matches!(self, Error::DuplicateTool(_) | Error::UnknownTool(_))
    }

    /// Handler-level failures; a timeout counts as one.
    pub fn is_invocation_failure(&self) -> bool {
        matches!(self, Error::ToolInvocation(_) | Error::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
