use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use uranus_core::{Error, Result};

use crate::{str_param, ParamSpec, Tool, ToolContext, ToolSchema, Trigger};

const MAX_RESULTS: u64 = 20;

pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "web_search",
            description: "Search the web for information and return result titles, links and snippets",
            parameters: vec![
                ParamSpec::string("query")
                    .required()
                    .greedy()
                    .describe("Search query"),
                ParamSpec::integer("num_results")
                    .describe("Number of results to return, tools.webSearch.maxResults when omitted"),
            ],
            triggers: vec![
                Trigger::new("web search"),
                Trigger::new("search"),
                Trigger::new("look up"),
                Trigger::new("google"),
            ],
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        if str_param(params, "query")?.trim().is_empty() {
            return Err(Error::Validation("Query must not be empty".to_string()));
        }
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let query = str_param(&params, "query")?;
        let search = &ctx.config.tools.web_search;
        if search.api_key.is_empty() {
            return Err(Error::Config(
                "Web search requires tools.webSearch.apiKey".to_string(),
            ));
        }
        let count = result_count(&params, search.max_results);

        debug!(query = %query, count, "Web search");
        let results = brave_search(&search.endpoint, &search.api_key, query, count).await?;
        Ok(json!({ "query": query, "results": results, "source": "brave" }))
    }
}

/// Requested `num_results`, else the configured `maxResults`, clamped to the
/// API's range.
fn result_count(params: &Value, max_results: u32) -> u64 {
    params
        .get("num_results")
        .and_then(|v| v.as_u64())
        .unwrap_or(max_results as u64)
        .clamp(1, MAX_RESULTS)
}

async fn brave_search(endpoint: &str, api_key: &str, query: &str, count: u64) -> Result<Vec<Value>> {
    let client = Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|e| Error::ToolInvocation(format!("Failed to create HTTP client: {}", e)))?;

    let response = client
        .get(endpoint)
        .header("X-Subscription-Token", api_key)
        .header("Accept", "application/json")
        .query(&[("q", query), ("count", &count.to_string())])
        .send()
        .await
        .map_err(|e| Error::ToolInvocation(format!("Search request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(Error::ToolInvocation(format!(
            "Search API error {}: {}",
            status, text
        )));
    }

    let data: Value = response
        .json()
        .await
        .map_err(|e| Error::ToolInvocation(format!("Failed to parse search response: {}", e)))?;

    Ok(parse_results(&data, count as usize))
}

fn parse_results(data: &Value, limit: usize) -> Vec<Value> {
    data["web"]["results"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .take(limit)
                .map(|r| {
                    json!({
                        "title": r["title"],
                        "url": r["url"],
                        "snippet": r["description"]
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;
    use uranus_core::Config;

    #[test]
    fn test_parse_results() {
        let data = json!({
            "web": { "results": [
                { "title": "Rust", "url": "https://rust-lang.org", "description": "A language" },
                { "title": "Crates", "url": "https://crates.io", "description": "Registry" }
            ]}
        });
        let results = parse_results(&data, 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["snippet"], "A language");
        assert!(parse_results(&json!({}), 5).is_empty());
    }

    #[test]
    fn test_result_count_falls_back_to_config() {
        assert_eq!(result_count(&json!({"query": "rust"}), 8), 8);
        assert_eq!(result_count(&json!({"query": "rust", "num_results": 3}), 8), 3);
        assert_eq!(result_count(&json!({"num_results": 500}), 8), MAX_RESULTS);
        assert_eq!(result_count(&json!({}), 0), 1);

        let mut params = json!({"query": "rust"});
        crate::ToolRegistry::with_defaults()
            .unwrap()
            .fill_defaults("web_search", &mut params)
            .unwrap();
        assert!(params.get("num_results").is_none());
    }

    #[tokio::test]
    async fn test_missing_api_key_is_config_error() {
        let ctx = ToolContext::new(PathBuf::from("/tmp"), Arc::new(Config::default()));
        let err = WebSearchTool
            .execute(ctx, json!({"query": "rust"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
