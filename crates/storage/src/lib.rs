pub mod audit;
pub mod memory;
pub mod session;

pub use audit::{AuditEvent, AuditLogger};
pub use memory::ConversationMemory;
pub use session::SessionStore;
