use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use uranus_agent::AgentRuntime;

use super::history::describe_turn;
use super::tools_cmd::print_tools;
use super::Env;

const DEFAULT_HISTORY_LINES: usize = 10;

pub async fn run(message: Option<String>, session: String) -> anyhow::Result<()> {
    let env = Env::load()?;
    let mut runtime = AgentRuntime::new(
        env.registry.clone(),
        env.config.clone(),
        env.workspace.clone(),
    )
    .with_session(session.clone())
    .with_persistence(&env.paths)?;

    if let Some(msg) = message {
        let response = runtime.submit(&msg).await;
        println!("{}", response);
        return Ok(());
    }

    println!("uranus interactive mode (exit, quit or q to leave, Ctrl+C to abort)");
    println!("Session: {}", session);
    println!("Commands: /history [n] | /tools | /clear");

    // Ctrl+C cancels the running tool and ends the session.
    let shutdown = runtime.shutdown_token();
    let watcher = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher.cancel();
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = shutdown.cancelled() => {
                println!();
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "exit" | "quit" | "q" => break,
            "/tools" => print_tools(runtime.registry()),
            "/clear" => {
                runtime.clear()?;
                println!("History cleared.");
            }
            _ if input == "/history" || input.starts_with("/history ") => {
                let n = input["/history".len()..]
                    .trim()
                    .parse()
                    .unwrap_or(DEFAULT_HISTORY_LINES);
                let turns = runtime.get_history(n);
                if turns.is_empty() {
                    println!("  (No history)");
                }
                for turn in &turns {
                    println!("{}", describe_turn(turn));
                }
            }
            _ => {
                let response = runtime.submit(input).await;
                println!("{}", response);
                if shutdown.is_cancelled() {
                    break;
                }
                if runtime.is_terminated() {
                    info!(session_key = %session, "Session terminated by request");
                    println!("Session ended.");
                    break;
                }
            }
        }
    }

    Ok(())
}
