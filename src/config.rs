//! Engine settings.
//!
//! Iteration caps are the engine's load-shedding mechanism: the global and
//! node caps are independent, separately configurable bounds so one
//! pathological node cannot starve the rest of the topology.

use serde::Serialize;

/// Tunables for a [`crate::engine::HierarchicalTeamEngine`].
#[derive(Debug, Clone, Serialize)]
pub struct EngineSettings {
    /// Hard cap on global supervisor loop passes.
    pub max_iterations: u32,
    /// Hard cap on loop passes within one node activation.
    pub node_max_iterations: u32,
    /// Character limit for outputs embedded in streamed events.
    pub event_output_limit: usize,
    /// Character limit for node outputs summarized in supervisor prompts.
    pub node_summary_limit: usize,
    /// Character limit for agent outputs summarized in supervisor prompts.
    pub agent_summary_limit: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            node_max_iterations: 20,
            event_output_limit: 500,
            node_summary_limit: 200,
            agent_summary_limit: 150,
        }
    }
}

impl EngineSettings {
    /// Load settings from the environment, falling back to defaults.
    ///
    /// Recognized variables: `TASKFORCE_MAX_ITERATIONS`,
    /// `TASKFORCE_NODE_MAX_ITERATIONS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_iterations: env_u32("TASKFORCE_MAX_ITERATIONS", defaults.max_iterations),
            node_max_iterations: env_u32(
                "TASKFORCE_NODE_MAX_ITERATIONS",
                defaults.node_max_iterations,
            ),
            ..defaults
        }
    }
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.max_iterations, 50);
        assert_eq!(settings.node_max_iterations, 20);
        assert_eq!(settings.event_output_limit, 500);
    }

    #[test]
    fn test_env_u32_ignores_garbage() {
        std::env::set_var("TASKFORCE_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_u32("TASKFORCE_TEST_GARBAGE", 7), 7);
        std::env::remove_var("TASKFORCE_TEST_GARBAGE");
    }
}
