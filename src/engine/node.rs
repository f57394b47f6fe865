//! Node-level execution: the node supervisor loop and the agent invoker.
//!
//! A node activation is a sub-execution with its own fresh
//! [`NodeExecutionState`], its own (typically smaller) iteration cap, and
//! its own supervisor. Agent invocation failures become `failed` results —
//! they are data, never control flow.

use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use serde_json::{Map, Value};

use crate::decision;
use crate::engine::prompts;
use crate::engine::{task_or, HierarchicalTeamEngine, DEFAULT_AGENT_TEMPERATURE, DEFAULT_MODEL};
use crate::llm::ChatMessage;
use crate::state::{
    AgentResult, NodeExecutionState, NodeResult, NodeSupervisorDecision, ResultStatus, RouteAction,
};
use crate::topology::{AgentConfig, NodeConfig};

impl HierarchicalTeamEngine {
    // -----------------------------------------------------------------------
    // Node supervisor
    // -----------------------------------------------------------------------

    /// Ask the node supervisor which agent to run next. Total over all LLM
    /// outcomes, like the global counterpart.
    pub(crate) async fn call_node_supervisor(
        &self,
        state: &NodeExecutionState,
    ) -> NodeSupervisorDecision {
        let system = prompts::node_supervisor_prompt(state, &self.settings);
        let user = prompts::node_supervisor_user_message(state);

        let decision = match self
            .supervisor_completion(&state.supervisor_config, system, user)
            .await
        {
            Ok(content) => match decision::parse_node_decision(&content) {
                Ok(decision) => decision,
                Err(e) => {
                    log::warn!(
                        "failed to parse node supervisor decision in {}: {}, using default",
                        state.node_id,
                        e
                    );
                    NodeSupervisorDecision::fallback(&state.available_agents(), &state.task, &e)
                }
            },
            Err(e) => {
                log::warn!(
                    "node supervisor call failed in {}: {}, using default",
                    state.node_id,
                    e
                );
                NodeSupervisorDecision::fallback(&state.available_agents(), &state.task, &e)
            }
        };

        log::info!(
            "node supervisor [{}] decision: action={:?}, next_agent={:?}",
            state.node_id,
            decision.action,
            decision.next_agent
        );
        decision
    }

    // -----------------------------------------------------------------------
    // Node execution loop
    // -----------------------------------------------------------------------

    /// Run one node activation to completion or its iteration cap.
    ///
    /// A node that exhausts its cap without an explicit finish is reported
    /// with `timeout` status, but its partial results are still returned.
    pub(crate) async fn execute_node(
        &self,
        config: &NodeConfig,
        task: &str,
        context: &Map<String, Value>,
    ) -> NodeResult {
        let start = Instant::now();
        let mut state = NodeExecutionState::new(
            config,
            task,
            context.clone(),
            self.settings.node_max_iterations,
        );

        while !state.is_complete && state.iteration_count < state.max_iterations {
            state.iteration_count += 1;

            let decision = self.call_node_supervisor(&state).await;
            state.supervisor_decisions.push(decision.clone());

            if decision.action == RouteAction::Finish || decision.node_complete {
                state.is_complete = true;
                if state.agent_results.len() > 1 {
                    let labeled = labeled_agent_outputs(&state);
                    state.output = self
                        .synthesize_results(&state.task, &labeled, &state.supervisor_config)
                        .await;
                } else if let Some(result) = state.agent_results.values().next() {
                    // Single result: passthrough, no synthesis round-trip.
                    state.output = result.output.clone();
                }
                break;
            }

            match decision.action {
                RouteAction::Delegate => {
                    let Some(agent_id) = decision.next_agent.as_deref() else {
                        continue;
                    };
                    if state.executed_agents.iter().any(|e| e == agent_id) {
                        log::debug!(
                            "agent {} already ran in node {}, skipping",
                            agent_id,
                            state.node_id
                        );
                        continue;
                    }
                    let Some(agent) = state.agent_config(agent_id).cloned() else {
                        log::warn!("agent {} not found in node {}", agent_id, state.node_id);
                        continue;
                    };
                    let agent_task = task_or(&decision.task_for_agent, &state.task).to_string();
                    let result = self.execute_agent(&agent, &agent_task, &state.context).await;
                    state.add_agent_result(result);
                }
                RouteAction::Parallel => {
                    let agents: Vec<AgentConfig> = decision
                        .parallel_agents
                        .iter()
                        .filter_map(|id| {
                            let agent = state.agent_config(id).cloned();
                            if agent.is_none() {
                                log::warn!("agent {} not found in node {}", id, state.node_id);
                            }
                            agent
                        })
                        .collect();
                    if agents.is_empty() {
                        continue;
                    }
                    let agent_task = task_or(&decision.task_for_agent, &state.task).to_string();
                    // Join barrier: results fold into state only after every
                    // concurrent invocation has returned.
                    let results = join_all(
                        agents
                            .iter()
                            .map(|agent| self.execute_agent(agent, &agent_task, &state.context)),
                    )
                    .await;
                    for result in results {
                        state.add_agent_result(result);
                    }
                }
                RouteAction::Finish | RouteAction::Escalate => {}
            }
        }

        NodeResult {
            node_id: state.node_id,
            node_name: state.node_name,
            status: if state.is_complete {
                ResultStatus::Success
            } else {
                ResultStatus::Timeout
            },
            output: state.output,
            agent_results: state.agent_results,
            supervisor_decisions: state.supervisor_decisions,
            execution_time_ms: start.elapsed().as_millis() as u64,
            iterations: state.iteration_count,
        }
    }

    // -----------------------------------------------------------------------
    // Agent invoker
    // -----------------------------------------------------------------------

    /// Invoke a single agent with a task and context.
    ///
    /// Builds a two-message exchange (configured system prompt, user message
    /// embedding task + serialized context) and measures wall-clock
    /// duration. Any failure is converted into a `failed` result; this
    /// method never returns an error.
    pub(crate) async fn execute_agent(
        &self,
        agent: &AgentConfig,
        task: &str,
        context: &Map<String, Value>,
    ) -> AgentResult {
        let start = Instant::now();

        let outcome = async {
            let client =
                self.client_for(agent.model_provider.as_deref(), agent.api_key.as_deref())?;
            let model = agent.model_id.as_deref().unwrap_or(DEFAULT_MODEL);
            let system = agent
                .system_prompt
                .clone()
                .unwrap_or_else(|| format!("You are agent {}.", agent.agent_id));
            let user = format!(
                "Task: {}\n\nContext: {}",
                task,
                Value::Object(context.clone())
            );
            let messages = [ChatMessage::system(system), ChatMessage::user(user)];
            let temperature = agent.temperature.unwrap_or(DEFAULT_AGENT_TEMPERATURE);
            client.complete(&messages, model, temperature).await
        }
        .await;

        let execution_time_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok((content, _tool_calls)) => AgentResult {
                agent_id: agent.agent_id.clone(),
                output: content,
                status: ResultStatus::Success,
                error: None,
                execution_time_ms,
                timestamp: Utc::now(),
            },
            Err(e) => {
                log::error!("agent {} execution failed: {}", agent.agent_id, e);
                AgentResult {
                    agent_id: agent.agent_id.clone(),
                    output: String::new(),
                    status: ResultStatus::Failed,
                    error: Some(e.to_string()),
                    execution_time_ms,
                    timestamp: Utc::now(),
                }
            }
        }
    }
}

/// Agent outputs labeled by agent id, in execution order, for synthesis.
fn labeled_agent_outputs(state: &NodeExecutionState) -> Vec<(String, String)> {
    state
        .executed_agents
        .iter()
        .filter_map(|id| {
            state
                .agent_results
                .get(id)
                .map(|r| (id.clone(), r.output.clone()))
        })
        .collect()
}
