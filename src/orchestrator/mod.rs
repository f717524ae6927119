pub mod engine;
pub mod locks;
pub mod types;

pub use engine::ExecutionOrchestrator;
pub use locks::{TaskGuard, TaskLocks};
pub use types::{AdvanceOutcome, ExecutionStatus, OrchestratorConfig};
