//! Hierarchical multi-agent team execution.
//!
//! Teams are described by a [`TopologyConfig`]: nodes of agents connected by
//! edges, with a global supervisor routing work between nodes and a
//! supervisor inside each node routing work between its agents. The
//! [`HierarchicalTeamEngine`] drives both loops, contains every LLM failure
//! as data, and synthesizes accumulated results into one final answer.
//!
//! ```no_run
//! use serde_json::Map;
//! use taskforce::{HierarchicalTeamEngine, TopologyConfig};
//!
//! # async fn run(topology: TopologyConfig) {
//! let engine = HierarchicalTeamEngine::new();
//! let state = engine
//!     .execute(&topology, "Summarize the quarterly numbers", Map::new(), None)
//!     .await;
//! println!("{}", state.final_output);
//! # }
//! ```
//!
//! For incremental consumption use
//! [`HierarchicalTeamEngine::execute_stream`], which yields typed
//! [`ExecutionEvent`]s as the run progresses.

pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod events;
pub mod llm;
pub mod state;
pub mod text;
pub mod topology;

pub use config::EngineSettings;
pub use engine::HierarchicalTeamEngine;
pub use error::LlmError;
pub use events::{EventType, ExecutionEvent};
pub use llm::{create_client, ChatMessage, LlmClient, ToolCall};
pub use state::{
    AgentResult, GlobalSupervisorDecision, NodeResult, NodeSupervisorDecision, ResultStatus,
    RouteAction, TeamExecutionState,
};
pub use topology::{
    validate_topology, AgentConfig, EdgeConfig, NodeConfig, SupervisorConfig, TopologyConfig,
    ValidationResult,
};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
