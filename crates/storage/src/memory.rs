use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use uranus_core::Turn;

/// Per-session conversation state: the ordered turn history (most recent
/// last) and a key/value scratch map for facts that carry across turns.
///
/// Turns are only handed out as shared references, so nothing can change a
/// turn once it has been appended.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    turns: VecDeque<Turn>,
    scratch: HashMap<String, Value>,
    max_history: usize,
    next_id: u64,
}

impl ConversationMemory {
    pub fn new(max_history: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            scratch: HashMap::new(),
            max_history: max_history.max(1),
            next_id: 1,
        }
    }

    /// Seed from persisted turns, keeping only the newest `max_history`.
    pub fn from_turns(turns: Vec<Turn>, max_history: usize) -> Self {
        let mut memory = Self::new(max_history);
        for turn in turns {
            memory.append(turn);
        }
        memory
    }

    /// Always succeeds. Once the cap is reached the oldest turn is dropped.
    pub fn append(&mut self, turn: Turn) {
        self.next_id = self.next_id.max(turn.id + 1);
        if self.turns.len() == self.max_history {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> impl DoubleEndedIterator<Item = &Turn> + ExactSizeIterator {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip)
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.back()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Id for the next turn; ids keep increasing even after old turns are dropped.
    pub fn next_turn_id(&self) -> u64 {
        self.next_id
    }

    pub fn get_scratch(&self, key: &str) -> Option<&Value> {
        self.scratch.get(key)
    }

    pub fn set_scratch(&mut self, key: impl Into<String>, value: Value) {
        self.scratch.insert(key.into(), value);
    }

    pub fn scratch_snapshot(&self) -> HashMap<String, Value> {
        self.scratch.clone()
    }

    /// Session boundary reset. Turn ids restart too.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.scratch.clear();
        self.next_id = 1;
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uranus_core::{Arguments, ToolResult, TurnOutcome};

    fn turn(memory: &ConversationMemory, text: &str) -> Turn {
        Turn::new(
            memory.next_turn_id(),
            text,
            Some("echo".into()),
            Arguments::new(),
            TurnOutcome::Completed(ToolResult::success(json!(text))),
        )
    }

    fn texts<'a>(turns: impl Iterator<Item = &'a Turn>) -> Vec<&'a str> {
        turns.map(|t| t.input_text.as_str()).collect()
    }

    #[test]
    fn test_recent_is_most_recent_last() {
        let mut memory = ConversationMemory::new(10);
        for text in ["a", "b", "c"] {
            let t = turn(&memory, text);
            memory.append(t);
        }
        assert_eq!(texts(memory.recent(2)), vec!["b", "c"]);
        assert_eq!(texts(memory.recent(10)), vec!["a", "b", "c"]);
        assert_eq!(memory.recent(0).count(), 0);
        assert_eq!(memory.len(), 3);
    }

    #[test]
    fn test_recent_does_not_mutate() {
        let mut memory = ConversationMemory::new(10);
        let t = turn(&memory, "a");
        memory.append(t);
        let before = memory.recent(5).cloned().collect::<Vec<_>>();
        let after = memory.recent(5).cloned().collect::<Vec<_>>();
        assert_eq!(before, after);
    }

    #[test]
    fn test_cap_discards_oldest() {
        let mut memory = ConversationMemory::new(2);
        for text in ["a", "b", "c"] {
            let t = turn(&memory, text);
            memory.append(t);
        }
        assert_eq!(texts(memory.recent(5)), vec!["b", "c"]);
        assert_eq!(memory.next_turn_id(), 4);
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut memory = ConversationMemory::new(10);
        let mut last = 0;
        for text in ["a", "b", "c"] {
            let t = turn(&memory, text);
            assert!(t.id > last);
            last = t.id;
            memory.append(t);
        }
    }

    #[test]
    fn test_scratch_last_write_wins() {
        let mut memory = ConversationMemory::default();
        assert!(memory.get_scratch("cwd").is_none());
        memory.set_scratch("cwd", json!("/a"));
        memory.set_scratch("cwd", json!("/b"));
        assert_eq!(memory.get_scratch("cwd"), Some(&json!("/b")));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut memory = ConversationMemory::default();
        let t = turn(&memory, "a");
        memory.append(t);
        memory.set_scratch("k", json!(1));
        memory.clear();
        assert!(memory.is_empty());
        assert!(memory.get_scratch("k").is_none());
        assert_eq!(memory.next_turn_id(), 1);
    }

    #[test]
    fn test_from_turns_trims() {
        let mut source = ConversationMemory::new(10);
        for text in ["a", "b", "c", "d"] {
            let t = turn(&source, text);
            source.append(t);
        }
        let turns: Vec<Turn> = source.recent(10).cloned().collect();
        let memory = ConversationMemory::from_turns(turns, 3);
        assert_eq!(texts(memory.recent(10)), vec!["b", "c", "d"]);
        assert_eq!(memory.next_turn_id(), 5);
    }
}
