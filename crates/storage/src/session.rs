use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::debug;
use uranus_core::{Paths, Result, Turn};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_type")]
enum SessionLine {
    #[serde(rename = "metadata")]
    Metadata {
        created_at: String,
        updated_at: String,
        session_key: String,
    },
    #[serde(untagged)]
    Turn(Turn),
}

/// JSONL persistence for session turn history: one metadata line, then one
/// line per turn in append order.
#[derive(Debug, Clone)]
pub struct SessionStore {
    paths: Paths,
}

impl SessionStore {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    pub fn load(&self, session_key: &str) -> Result<Vec<Turn>> {
        let path = self.paths.session_file(session_key);

        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut turns = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<SessionLine>(&line) {
                Ok(SessionLine::Turn(turn)) => turns.push(turn),
                Ok(SessionLine::Metadata { .. }) => {}
                Err(e) => {
                    debug!(error = %e, "Failed to parse session line, skipping");
                }
            }
        }

        Ok(turns)
    }

    pub fn save(&self, session_key: &str, turns: &[Turn]) -> Result<()> {
        let path = self.paths.session_file(session_key);
        ensure_parent(&path)?;

        let mut file = File::create(&path)?;
        write_metadata(&mut file, session_key)?;
        for turn in turns {
            writeln!(file, "{}", serde_json::to_string(turn)?)?;
        }

        Ok(())
    }

    pub fn append(&self, session_key: &str, turn: &Turn) -> Result<()> {
        let path = self.paths.session_file(session_key);
        ensure_parent(&path)?;

        if !path.exists() {
            let mut file = File::create(&path)?;
            write_metadata(&mut file, session_key)?;
        }

        let mut file = OpenOptions::new().append(true).open(&path)?;
        writeln!(file, "{}", serde_json::to_string(turn)?)?;

        Ok(())
    }

    /// Remove the session's history file. Missing files are fine.
    pub fn clear(&self, session_key: &str) -> Result<()> {
        let path = self.paths.session_file(session_key);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Stored session file stems, sorted.
    pub fn list_sessions(&self) -> Result<Vec<String>> {
        let dir = self.paths.sessions_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut keys: Vec<String> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("jsonl"))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn write_metadata(file: &mut File, session_key: &str) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    let metadata = SessionLine::Metadata {
        created_at: now.clone(),
        updated_at: now,
        session_key: session_key.to_string(),
    };
    writeln!(file, "{}", serde_json::to_string(&metadata)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use uranus_core::{Arguments, ToolResult, TurnOutcome};

    fn turn(id: u64, text: &str) -> Turn {
        Turn::new(
            id,
            text,
            Some("echo".into()),
            Arguments::new(),
            TurnOutcome::Completed(ToolResult::success(json!({ "text": text }))),
        )
    }

    #[test]
    fn test_append_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionStore::new(Paths::with_base(temp_dir.path().to_path_buf()));

        store.append("cli:default", &turn(1, "echo a")).unwrap();
        store.append("cli:default", &turn(2, "echo b")).unwrap();
        let miss = Turn::new(
            3,
            "blorp",
            None,
            Arguments::new(),
            TurnOutcome::NoMatch { confidence: 0.0 },
        );
        store.append("cli:default", &miss).unwrap();

        let turns = store.load("cli:default").unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].input_text, "echo a");
        assert_eq!(turns[2].outcome, TurnOutcome::NoMatch { confidence: 0.0 });
    }

    #[test]
    fn test_load_missing_session_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionStore::new(Paths::with_base(temp_dir.path().to_path_buf()));
        assert!(store.load("nobody").unwrap().is_empty());
    }

    #[test]
    fn test_save_overwrites_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionStore::new(Paths::with_base(temp_dir.path().to_path_buf()));

        store.append("s", &turn(1, "old")).unwrap();
        store.save("s", &[turn(5, "new")]).unwrap();
        let turns = store.load("s").unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].id, 5);

        assert_eq!(store.list_sessions().unwrap(), vec!["s".to_string()]);
        store.clear("s").unwrap();
        assert!(store.load("s").unwrap().is_empty());
        store.clear("s").unwrap();
    }

    #[test]
    fn test_corrupt_line_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let paths = Paths::with_base(temp_dir.path().to_path_buf());
        let store = SessionStore::new(paths.clone());
        store.append("s", &turn(1, "a")).unwrap();

        let mut file = OpenOptions::new()
            .append(true)
            .open(paths.session_file("s"))
            .unwrap();
        writeln!(file, "{{not json").unwrap();
        store.append("s", &turn(2, "b")).unwrap();

        let turns = store.load("s").unwrap();
        assert_eq!(turns.len(), 2);
    }
}
