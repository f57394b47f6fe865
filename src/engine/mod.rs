//! Hierarchical team execution engine.
//!
//! Dynamic supervisor-based routing over a two-level hierarchy:
//!
//! ```text
//! Global Supervisor (decides which Node to activate)
//!        │
//!        ▼
//! ┌──────┴──────┐
//! Node A        Node B
//! Supervisor    Supervisor
//! (decides      (decides
//! which Agent)  which Agent)
//!     │             │
//! ┌───┴───┐     ┌───┴───┐
//! A1  A2  A3    B1  B2  B3
//! ```
//!
//! Each supervisor decision is one LLM call parsed into a typed
//! [`RouteAction`] variant, with a total fallback for unusable output, so
//! the loops always make forward progress or stop at their iteration caps.

mod node;
pub mod prompts;
mod synthesis;

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::EngineSettings;
use crate::decision;
use crate::error::LlmError;
use crate::llm::{create_client, ChatMessage, LlmClient};
use crate::state::{GlobalSupervisorDecision, RouteAction, TeamExecutionState};
use crate::topology::{NodeConfig, SupervisorConfig, TopologyConfig};

/// Provider used when a config omits one.
pub(crate) const DEFAULT_PROVIDER: &str = "openrouter";

/// Model used when a config omits one.
pub(crate) const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Temperature for supervisor routing calls.
pub(crate) const SUPERVISOR_TEMPERATURE: f64 = 0.2;

/// Temperature for synthesis calls.
pub(crate) const SYNTHESIS_TEMPERATURE: f64 = 0.3;

/// Temperature for agent calls when the agent config omits one.
pub(crate) const DEFAULT_AGENT_TEMPERATURE: f64 = 0.7;

/// Execution engine for hierarchical agent teams.
///
/// The engine owns no persistent state; each [`execute`] call builds a fresh
/// [`TeamExecutionState`], drives the global supervisor loop to completion
/// or the iteration cap, and returns the final state to the caller.
///
/// [`execute`]: HierarchicalTeamEngine::execute
#[derive(Debug)]
pub struct HierarchicalTeamEngine {
    /// Injected client used for every call when present; otherwise clients
    /// are built per-config from the provider factory.
    client: Option<Arc<dyn LlmClient>>,
    settings: EngineSettings,
}

impl HierarchicalTeamEngine {
    /// Create an engine that builds per-config clients from the provider
    /// factory, with default settings.
    pub fn new() -> Self {
        Self {
            client: None,
            settings: EngineSettings::default(),
        }
    }

    /// Create an engine that routes every LLM call through one client.
    pub fn with_client(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client: Some(client),
            settings: EngineSettings::default(),
        }
    }

    /// Override the engine settings.
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Engine settings in effect.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Resolve the client for a call: the injected one if present, else a
    /// factory-built client for the config's provider.
    pub(crate) fn client_for(
        &self,
        provider: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<Arc<dyn LlmClient>, LlmError> {
        if let Some(client) = &self.client {
            return Ok(Arc::clone(client));
        }
        let provider = provider.unwrap_or(DEFAULT_PROVIDER);
        let api_key = api_key.ok_or_else(|| LlmError::MissingApiKey(provider.to_string()))?;
        create_client(provider, api_key, None)
    }

    /// One supervisor LLM round-trip, returning the raw response text.
    pub(crate) async fn supervisor_completion(
        &self,
        config: &SupervisorConfig,
        system: String,
        user: String,
    ) -> Result<String, LlmError> {
        let client = self.client_for(config.model_provider.as_deref(), config.api_key.as_deref())?;
        let model = config.model_id.as_deref().unwrap_or(DEFAULT_MODEL);
        let messages = [ChatMessage::system(system), ChatMessage::user(user)];
        let (content, _) = client
            .complete(&messages, model, SUPERVISOR_TEMPERATURE)
            .await?;
        Ok(content)
    }

    // -----------------------------------------------------------------------
    // Global supervisor
    // -----------------------------------------------------------------------

    /// Ask the global supervisor which node to activate next.
    ///
    /// Total over all LLM outcomes: transport failures and unparsable output
    /// both collapse into the default decision (first available node, or
    /// finish), with the error recorded in `reasoning`.
    pub(crate) async fn call_global_supervisor(
        &self,
        state: &TeamExecutionState,
    ) -> GlobalSupervisorDecision {
        let system = prompts::global_supervisor_prompt(state, &self.settings);
        let user = prompts::global_supervisor_user_message(state);

        let decision = match self
            .supervisor_completion(&state.global_supervisor_config, system, user)
            .await
        {
            Ok(content) => match decision::parse_global_decision(&content) {
                Ok(decision) => decision,
                Err(e) => {
                    log::warn!("failed to parse global supervisor decision: {}, using default", e);
                    GlobalSupervisorDecision::fallback(
                        &state.available_nodes(),
                        &state.input_task,
                        &e,
                    )
                }
            },
            Err(e) => {
                log::warn!("global supervisor call failed: {}, using default", e);
                GlobalSupervisorDecision::fallback(&state.available_nodes(), &state.input_task, &e)
            }
        };

        log::info!(
            "global supervisor decision: action={:?}, next_node={:?}, reasoning={}",
            decision.action,
            decision.next_node,
            crate::text::truncate(&decision.reasoning, 100)
        );
        decision
    }

    // -----------------------------------------------------------------------
    // Main entry point
    // -----------------------------------------------------------------------

    /// Execute a team with the given topology and task.
    ///
    /// Runs the global supervisor loop to completion or the iteration cap,
    /// then performs one final synthesis over all accumulated node results.
    /// LLM failures inside the loop are contained as data; this method does
    /// not fail.
    pub async fn execute(
        &self,
        topology: &TopologyConfig,
        input_task: &str,
        input_context: Map<String, Value>,
        execution_id: Option<String>,
    ) -> TeamExecutionState {
        let mut state = self.init_state(topology, input_task, input_context, execution_id);

        while !state.is_complete && state.iteration_count < state.max_iterations {
            let decision = self.call_global_supervisor(&state).await;
            state.add_supervisor_decision(decision.clone());

            if decision.action == RouteAction::Finish || !decision.should_continue {
                state.is_complete = true;
                break;
            }

            match decision.action {
                RouteAction::Delegate => {
                    let Some(node_id) = decision.next_node.as_deref() else {
                        continue;
                    };
                    let Some(config) = state.node_config(node_id).cloned() else {
                        log::warn!("node {} not found in topology, skipping", node_id);
                        continue;
                    };
                    let task = task_or(&decision.task_for_node, input_task);
                    let result = self.execute_node(&config, task, &state.input_context).await;
                    state.add_node_result(&config.id, result);
                }
                RouteAction::Parallel => {
                    let configs: Vec<NodeConfig> = decision
                        .parallel_nodes
                        .iter()
                        .filter_map(|id| {
                            let config = state.node_config(id).cloned();
                            if config.is_none() {
                                log::warn!("node {} not found in topology, skipping", id);
                            }
                            config
                        })
                        .collect();
                    if configs.is_empty() {
                        continue;
                    }
                    let task = task_or(&decision.task_for_node, input_task);
                    // Join barrier: state is only touched after every
                    // concurrent activation has returned.
                    let results = join_all(
                        configs
                            .iter()
                            .map(|config| self.execute_node(config, task, &state.input_context)),
                    )
                    .await;
                    for result in results {
                        let node_id = result.node_id.clone();
                        state.add_node_result(&node_id, result);
                    }
                }
                RouteAction::Finish | RouteAction::Escalate => {}
            }
        }

        if !state.node_results.is_empty() {
            let labeled = labeled_node_outputs(&state);
            state.final_output = self
                .synthesize_results(input_task, &labeled, &state.global_supervisor_config)
                .await;
        }

        state
    }

    // -----------------------------------------------------------------------
    // State initialization
    // -----------------------------------------------------------------------

    /// Build a fresh execution state from a topology snapshot.
    pub(crate) fn init_state(
        &self,
        topology: &TopologyConfig,
        input_task: &str,
        input_context: Map<String, Value>,
        execution_id: Option<String>,
    ) -> TeamExecutionState {
        TeamExecutionState {
            execution_id: execution_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            team_id: topology
                .team_id
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            input_task: input_task.to_string(),
            input_context,
            final_output: String::new(),
            nodes: topology.nodes.clone(),
            global_supervisor_config: topology.global_supervisor.clone(),
            executed_nodes: Vec::new(),
            node_results: std::collections::HashMap::new(),
            global_supervisor_decisions: Vec::new(),
            iteration_count: 0,
            max_iterations: self.settings.max_iterations,
            is_complete: false,
            started_at: Utc::now(),
        }
    }
}

impl Default for HierarchicalTeamEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Prefer a non-empty decision task over the fallback task.
pub(crate) fn task_or<'a>(decision_task: &'a str, fallback: &'a str) -> &'a str {
    if decision_task.is_empty() {
        fallback
    } else {
        decision_task
    }
}

/// Node outputs labeled by node id, in execution order, for synthesis.
pub(crate) fn labeled_node_outputs(state: &TeamExecutionState) -> Vec<(String, String)> {
    state
        .executed_nodes
        .iter()
        .filter_map(|id| {
            state
                .node_results
                .get(id)
                .map(|r| (id.clone(), r.output.clone()))
        })
        .collect()
}
