use serde_json::Value;
use uranus_tools::ToolContext;

use super::Env;

/// Run a direct tool call, bypassing the router.
pub async fn tool(tool_name: &str, params_json: &str) -> anyhow::Result<()> {
    let env = Env::load()?;

    if !env.registry.contains(tool_name) {
        anyhow::bail!(
            "Tool '{}' not found. Use `uranus tools list` to see available tools.",
            tool_name
        );
    }

    let mut params: Value = serde_json::from_str(params_json)
        .map_err(|e| anyhow::anyhow!("Failed to parse JSON params: {}\nInput: {}", e, params_json))?;
    env.registry.fill_defaults(tool_name, &mut params)?;

    if let Err(e) = env.registry.validate_arguments(tool_name, &params) {
        anyhow::bail!(
            "Parameter validation failed: {}\nUse `uranus tools info {}` for parameter details.",
            e,
            tool_name
        );
    }

    let ctx = ToolContext::new(env.workspace.clone(), env.config.clone()).with_session("cli:run");
    let limit = env.config.agent.timeout_for(tool_name);
    let result = tokio::time::timeout(limit, env.registry.execute(tool_name, ctx, params))
        .await
        .map_err(|_| anyhow::anyhow!("Tool '{}' timed out after {:?}", tool_name, limit))??;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
