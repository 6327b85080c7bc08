pub mod router;
pub mod runtime;

pub use router::{IntentRouter, MatchKind};
pub use runtime::{AgentRuntime, Response, TurnPhase, DEFAULT_SESSION};
