use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::info;
use uranus_core::{Error, Result};

use crate::{str_param, ParamSpec, Tool, ToolContext, ToolSchema, Trigger};

const SEARCH_URL: &str = "https://www.google.com/search?q=";

/// `browser`: opens a URL or a search page in the system browser.
pub struct BrowserTool;

#[async_trait]
impl Tool for BrowserTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "browser",
            description: "Open web pages in the browser: navigate to a url or search the web",
            parameters: vec![
                ParamSpec::string("action")
                    .required()
                    .choices(&["navigate", "search"])
                    .describe("navigate or search"),
                ParamSpec::string("target")
                    .required()
                    .greedy()
                    .describe("URL to open, or the search query"),
            ],
            triggers: vec![
                Trigger::new("navigate to").preset("action", json!("navigate")),
                Trigger::new("go to").preset("action", json!("navigate")),
                Trigger::new("open url").preset("action", json!("navigate")),
                Trigger::new("search the web for").preset("action", json!("search")),
                Trigger::new("browse").preset("action", json!("search")),
            ],
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        build_url(str_param(params, "action")?, str_param(params, "target")?).map(|_| ())
    }

    async fn execute(&self, _ctx: ToolContext, params: Value) -> Result<Value> {
        let action = str_param(&params, "action")?;
        let url = build_url(action, str_param(&params, "target")?)?;
        info!(action, url = %url, "Opening browser");
        open_in_browser(&url).await?;
        Ok(json!({ "action": action, "url": url }))
    }
}

/// The URL to open: navigation targets get `https://` when they carry no
/// scheme, searches become an encoded query URL.
pub fn build_url(action: &str, target: &str) -> Result<String> {
    let target = target.trim();
    if target.is_empty() {
        return Err(Error::Validation("Browser target must not be empty".to_string()));
    }
    match action {
        "navigate" => {
            if target.contains(char::is_whitespace) {
                return Err(Error::Validation(format!("Not a URL: {}", target)));
            }
            if target.starts_with("http://") || target.starts_with("https://") {
                Ok(target.to_string())
            } else {
                Ok(format!("https://{}", target))
            }
        }
        "search" => Ok(format!("{}{}", SEARCH_URL, urlencoding::encode(target))),
        other => Err(Error::Validation(format!(
            "Unknown action: {}. Supported actions: navigate, search",
            other
        ))),
    }
}

async fn open_in_browser(url: &str) -> Result<()> {
    let mut cmd = if cfg!(target_os = "macos") {
        let mut c = Command::new("open");
        c.arg(url);
        c
    } else if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", "", url]);
        c
    } else {
        let mut c = Command::new("xdg-open");
        c.arg(url);
        c
    };
    let status = cmd
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|e| Error::ToolInvocation(format!("Failed to launch browser: {}", e)))?;
    if !status.success() {
        return Err(Error::ToolInvocation(format!(
            "Browser launcher exited with {}",
            status
        )));
    }
    Ok(())
}
