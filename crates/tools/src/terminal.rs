use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};
use uranus_core::{Error, Result};

use crate::{safe_truncate, str_param, ParamSpec, Tool, ToolContext, ToolSchema, Trigger};

/// Scratch key holding the session's current directory.
pub const CWD_KEY: &str = "cwd";

const MAX_OUTPUT_CHARS: usize = 10000;

const DENY_PATTERNS: &[&str] = &[
    r"rm\s+-rf\s+/",
    r"rm\s+-rf\s+~",
    r"rm\s+-rf\s+\*",
    r"\bdd\b.*\bif=",
    r"\bmkfs\b",
    r"\bshutdown\b",
    r"\breboot\b",
    r":\(\)\s*\{\s*:\|:\s*&\s*\}\s*;", // fork bomb
    r">\s*/dev/sd",
];

static DENY_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    DENY_PATTERNS
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
});

fn is_dangerous_command(command: &str) -> bool {
    DENY_REGEXES.iter().any(|re| re.is_match(command))
}

/// `terminal`: runs a shell command in the session's current directory.
/// A bare `cd` changes that directory for later turns.
pub struct TerminalTool;

#[async_trait]
impl Tool for TerminalTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "terminal",
            description: "Execute terminal shell commands on the system",
            parameters: vec![
                ParamSpec::string("command")
                    .required()
                    .greedy()
                    .describe("The command to execute"),
                ParamSpec::string("working_dir")
                    .describe("Working directory for the command (optional)"),
            ],
            triggers: vec![
                Trigger::new("terminal"),
                Trigger::new("shell"),
                Trigger::new("exec"),
                Trigger::new("run"),
                Trigger::new("$"),
            ],
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        let command = str_param(params, "command")?;
        if command.trim().is_empty() {
            return Err(Error::Validation("Command must not be empty".to_string()));
        }
        if is_dangerous_command(command) {
            return Err(Error::PermissionDenied(
                "Command matches dangerous pattern and is blocked".to_string(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let command = str_param(&params, "command")?.trim();
        let cwd = current_dir(&ctx, params.get("working_dir").and_then(|v| v.as_str()))?;

        if let Some(target) = parse_cd(command) {
            return change_dir(&ctx, &cwd, target).await;
        }

        info!(command = %command, cwd = %cwd.display(), "Executing terminal command");
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::select! {
            out = cmd.output() => out.map_err(|e| {
                Error::ToolInvocation(format!("Failed to execute command: {}", e))
            })?,
            _ = ctx.cancel.cancelled() => {
                return Err(Error::ToolInvocation("Command cancelled".to_string()));
            }
        };

        let (stdout, out_cut) = clip(String::from_utf8_lossy(&output.stdout).to_string());
        let (stderr, err_cut) = clip(String::from_utf8_lossy(&output.stderr).to_string());

        Ok(json!({
            "exit_code": output.status.code(),
            "stdout": stdout,
            "stderr": stderr,
            "truncated": out_cut || err_cut,
            "cwd": cwd.display().to_string(),
        }))
    }
}

fn clip(s: String) -> (String, bool) {
    if s.len() > MAX_OUTPUT_CHARS {
        (
            format!("{}\n... (output truncated)", safe_truncate(&s, MAX_OUTPUT_CHARS)),
            true,
        )
    } else {
        (s, false)
    }
}

/// `cd` or `cd <dir>`; anything chained after it goes to the shell as usual.
fn parse_cd(command: &str) -> Option<&str> {
    if command == "cd" {
        return Some("");
    }
    let rest = command.strip_prefix("cd ")?.trim();
    if rest.contains("&&") || rest.contains(';') || rest.contains('|') {
        return None;
    }
    Some(rest.trim_matches(|c| c == '"' || c == '\''))
}

fn resolve(base: &Path, raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Explicit `working_dir`, else the session's `cwd`, else the workspace.
fn current_dir(ctx: &ToolContext, working_dir: Option<&str>) -> Result<PathBuf> {
    let dir = match working_dir.filter(|s| !s.trim().is_empty()) {
        Some(wd) => resolve(&ctx.workspace, wd),
        None => ctx
            .scratch_str(CWD_KEY)
            .map(PathBuf::from)
            .unwrap_or_else(|| ctx.workspace.clone()),
    };
    check_allowed(ctx, &dir)?;
    if !dir.is_dir() {
        return Err(Error::NotFound(format!(
            "Working directory not found: {}",
            dir.display()
        )));
    }
    Ok(dir)
}

fn check_allowed(ctx: &ToolContext, dir: &Path) -> Result<()> {
    if !ctx.config.tools.exec.restrict_to_workspace {
        return Ok(());
    }
    let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    let root = ctx
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| ctx.workspace.clone());
    if canonical.starts_with(&root) {
        Ok(())
    } else {
        Err(Error::PermissionDenied(format!(
            "{} is outside the workspace",
            dir.display()
        )))
    }
}

async fn change_dir(ctx: &ToolContext, cwd: &Path, target: &str) -> Result<Value> {
    let dir = if target.is_empty() {
        ctx.workspace.clone()
    } else {
        resolve(cwd, target)
    };
    let dir = tokio::fs::canonicalize(&dir)
        .await
        .map_err(|_| Error::NotFound(format!("Directory not found: {}", dir.display())))?;
    if !dir.is_dir() {
        return Err(Error::NotFound(format!("Not a directory: {}", dir.display())));
    }
    check_allowed(ctx, &dir)?;

    let cwd = dir.display().to_string();
    debug!(cwd = %cwd, "Changed session directory");
    Ok(json!({
        "stdout": format!("Changed directory to {}", cwd),
        "cwd": cwd,
        "scratch": { CWD_KEY: cwd },
    }))
}
