mod commands;

use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uranus_core::Paths;

#[derive(Parser)]
#[command(name = "uranus")]
#[command(about = "A local agent that routes plain requests to built-in tools", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent
    Agent {
        /// Message to send (interactive mode if not provided)
        #[arg(short, long)]
        message: Option<String>,

        /// Session ID
        #[arg(short, long, default_value = "cli:default")]
        session: String,
    },

    /// Inspect registered tools
    Tools {
        #[command(subcommand)]
        command: ToolsCommands,
    },

    /// Run a tool directly with JSON params, bypassing the router
    Run {
        /// Tool name
        tool_name: String,
        /// JSON parameters (e.g. '{"text":"hi"}')
        #[arg(default_value = "{}")]
        params: String,
    },

    /// Show the stored turn history of a session
    History {
        /// Session ID
        #[arg(short, long, default_value = "cli:default")]
        session: String,
        /// Number of most recent turns to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ToolsCommands {
    /// List all registered tools
    List,
    /// Show detailed info for a specific tool
    Info {
        /// Tool name
        tool_name: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write a default config file and create the data directories
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(verbose: bool, paths: &Paths) {
    let console_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    // No log file when the data directory is unwritable; console logging still works.
    let file_layer = std::fs::create_dir_all(&paths.base)
        .and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(paths.log_file())
        })
        .ok()
        .map(|file| {
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(LevelFilter::INFO)
        });

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let paths = Paths::new();
    init_tracing(cli.verbose, &paths);

    match cli.command {
        Commands::Agent { message, session } => {
            commands::agent::run(message, session).await?;
        }
        Commands::Tools { command } => match command {
            ToolsCommands::List => {
                commands::tools_cmd::list().await?;
            }
            ToolsCommands::Info { tool_name } => {
                commands::tools_cmd::info(&tool_name).await?;
            }
        },
        Commands::Run { tool_name, params } => {
            commands::run_cmd::tool(&tool_name, &params).await?;
        }
        Commands::History { session, limit } => {
            commands::history::show(&session, limit).await?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                commands::config_cmd::show().await?;
            }
            ConfigCommands::Init { force } => {
                commands::config_cmd::init(force).await?;
            }
        },
    }

    Ok(())
}
