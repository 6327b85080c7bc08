use uranus_core::{Config, Paths};

/// Show the current configuration as pretty-printed JSON.
pub async fn show() -> anyhow::Result<()> {
    let paths = Paths::new();
    let config_file = paths.config_file();
    let config = Config::load_or_default(&paths)?;
    let json = serde_json::to_value(&config)?;

    println!();
    println!("📋 Current Configuration");
    if config_file.exists() {
        println!("  File: {}", config_file.display());
    } else {
        println!("  File: {} (not created, showing defaults)", config_file.display());
    }
    println!("  Workspace: {}", config.workspace_path(&paths).display());
    println!();
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// Write the default configuration and create the data directories.
pub async fn init(force: bool) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config_file = paths.config_file();

    if config_file.exists() && !force {
        anyhow::bail!(
            "Config already exists at {}. Use --force to overwrite.",
            config_file.display()
        );
    }

    let config = Config::default();
    config.save(&config_file)?;
    paths.ensure_dirs()?;
    std::fs::create_dir_all(config.workspace_path(&paths))?;

    println!("✅ Wrote {}", config_file.display());
    println!("   Workspace: {}", config.workspace_path(&paths).display());
    Ok(())
}
