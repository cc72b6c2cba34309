//! Task orchestration: per-task state, the turn loop, and sub-agents.

pub mod loop_driver;
pub mod state;
pub mod subagent;

pub use loop_driver::{ModelTurn, TaskExit, TaskLoop, TurnProvider};
pub use state::{PhaseCell, TaskId, TaskPhase, TaskState};
pub use subagent::{spawn_task, LoopSpawner, ProviderFactory};
