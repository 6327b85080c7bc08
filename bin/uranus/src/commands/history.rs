use uranus_core::{Paths, Turn, TurnOutcome};
use uranus_storage::SessionStore;

/// One-line summary of a turn.
pub fn describe_turn(turn: &Turn) -> String {
    let when = turn.timestamp.format("%Y-%m-%d %H:%M:%S");
    let outcome = match &turn.outcome {
        TurnOutcome::Completed(result) => {
            let tool = turn.matched_tool.as_deref().unwrap_or("?");
            match result.error_detail() {
                None => format!("{} ✓", tool),
                Some(detail) => format!("{} ✗ {}", tool, detail),
            }
        }
        TurnOutcome::NoMatch { confidence } => format!("no match ({:.2})", confidence),
        TurnOutcome::RoutingFailed { reason } => format!("routing failed: {}", reason),
    };
    format!("  #{:<4} {}  {:<40} → {}", turn.id, when, turn.input_text, outcome)
}

/// Print the last `limit` stored turns of a session.
pub async fn show(session: &str, limit: usize) -> anyhow::Result<()> {
    let paths = Paths::new();
    let store = SessionStore::new(paths);
    let turns = store.load(session)?;

    if turns.is_empty() {
        println!("No history for session '{}'.", session);
        let sessions = store.list_sessions()?;
        if !sessions.is_empty() {
            println!("Stored sessions: {}", sessions.join(", "));
        }
        return Ok(());
    }

    println!();
    println!("📜 Session {} ({} turns)", session, turns.len());
    println!();
    let skip = turns.len().saturating_sub(limit);
    for turn in &turns[skip..] {
        println!("{}", describe_turn(turn));
    }
    println!();
    Ok(())
}
