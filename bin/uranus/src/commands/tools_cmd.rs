use uranus_tools::{ToolDescriptor, ToolRegistry};

pub fn print_tools(registry: &ToolRegistry) {
    println!();
    println!("🔧 Registered tools ({} total)", registry.len());
    println!();
    for tool in registry.list_all() {
        let desc = tool.description();
        let short_desc: String = desc.chars().take(60).collect();
        let ellipsis = if desc.chars().count() > 60 { "..." } else { "" };
        println!("  {:<18} {}{}", tool.name(), short_desc, ellipsis);
    }
    println!();
}

/// List all registered tools, in routing order.
pub async fn list() -> anyhow::Result<()> {
    let registry = ToolRegistry::with_defaults()?;
    print_tools(&registry);
    Ok(())
}

fn print_info(tool: &ToolDescriptor) {
    println!();
    println!("🔧 {}", tool.name());
    println!();
    println!("  Description: {}", tool.description());
    println!();

    if !tool.parameters().is_empty() {
        println!("  Parameters:");
        for param in tool.parameters() {
            let req = if param.required { " (required)" } else { "" };
            let greedy = if param.greedy { " (rest of input)" } else { "" };
            let choices = if param.choices.is_empty() {
                String::new()
            } else {
                format!(" [{}]", param.choices.join("|"))
            };
            let default = param
                .default
                .as_ref()
                .map(|d| format!(" = {}", d))
                .unwrap_or_default();
            println!(
                "    {:<16} {:<8}{}{}{}{}",
                param.name,
                param.kind.as_str(),
                req,
                greedy,
                choices,
                default
            );
            if !param.description.is_empty() {
                println!("      {}", param.description);
            }
        }
        println!();
    }

    if !tool.triggers().is_empty() {
        println!("  Triggers:");
        for trigger in tool.triggers() {
            if trigger.preset.is_empty() {
                println!("    \"{}\"", trigger.phrase);
            } else {
                let presets: Vec<String> = trigger
                    .preset
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect();
                println!("    \"{}\"  ({})", trigger.phrase, presets.join(", "));
            }
        }
        println!();
    }
}

/// Show detailed info for a specific tool.
pub async fn info(tool_name: &str) -> anyhow::Result<()> {
    let registry = ToolRegistry::with_defaults()?;
    match registry.lookup(tool_name) {
        Ok(tool) => {
            print_info(tool);
            Ok(())
        }
        Err(_) => {
            anyhow::bail!(
                "Tool '{}' not found. Use `uranus tools list` to see all available tools.",
                tool_name
            )
        }
    }
}
