// Consensus coordination: dispatching one request across heterogeneous,
// independently-failing engines and selecting a winning result.

pub mod coordinator;
pub mod selector;

pub use coordinator::{ConsensusCoordinator, MEMORY_ENGINE_ID};
pub use selector::ResultSelector;
