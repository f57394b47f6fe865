//! Streaming event protocol for team executions.
//!
//! [`HierarchicalTeamEngine::execute_stream`] wraps the execution loop and
//! mirrors its state transitions as an ordered sequence of typed events,
//! suitable for re-emission as Server-Sent Events by an enclosing HTTP
//! layer. Every run is bracketed by `execution_start` and
//! `execution_complete`, even when no node is ever activated.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::engine::{labeled_node_outputs, task_or, HierarchicalTeamEngine};
use crate::state::RouteAction;
use crate::text::truncate;
use crate::topology::TopologyConfig;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Discriminator for execution events, in their temporal order of appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// The run has started. Data: `execution_id`, `team_id`, `task`.
    ExecutionStart,
    /// A global supervisor call is about to be made. Data: `iteration`.
    GlobalSupervisorThinking,
    /// A global supervisor decision was recorded. Data: the full decision.
    GlobalSupervisorDecision,
    /// A node activation is starting. Data: `node_id`.
    NodeStart,
    /// An agent inside the active node produced a result. Data: `node_id`,
    /// `agent_id`, `output` (truncated), `status`.
    AgentResult,
    /// A node activation finished. Data: `node_id`, `status`, `output`
    /// (truncated).
    NodeComplete,
    /// Final synthesis is starting. Emitted only when node results exist.
    SynthesisStart,
    /// The run is over; always the last event. Data: `execution_id`,
    /// `status` (`success` or `timeout`), `output`, `iterations`.
    ExecutionComplete,
}

/// One streamed execution event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEvent {
    /// Event discriminator.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Event payload; fields depend on `event_type`.
    pub data: Value,
    /// UTC creation time (ISO-8601 on the wire).
    pub timestamp: DateTime<Utc>,
}

impl ExecutionEvent {
    /// Create an event stamped with the current time.
    pub fn new(event_type: EventType, data: Value) -> Self {
        Self {
            event_type,
            data,
            timestamp: Utc::now(),
        }
    }
}

/// Send an event; false when the consumer has gone away.
fn emit(tx: &UnboundedSender<ExecutionEvent>, event_type: EventType, data: Value) -> bool {
    tx.unbounded_send(ExecutionEvent::new(event_type, data))
        .is_ok()
}

fn status_str(complete: bool) -> &'static str {
    if complete {
        "success"
    } else {
        "timeout"
    }
}

// ---------------------------------------------------------------------------
// Streaming adapter
// ---------------------------------------------------------------------------

impl HierarchicalTeamEngine {
    /// Execute a team, yielding lifecycle events as they happen.
    ///
    /// The returned receiver implements `Stream`. The execution runs on a
    /// spawned task; dropping the receiver cooperatively stops it at the
    /// next emission point. Activated nodes of one decision are executed
    /// and emitted sequentially so the `node_start`/`node_complete`
    /// brackets stay ordered.
    pub fn execute_stream(
        self: Arc<Self>,
        topology: TopologyConfig,
        input_task: impl Into<String>,
        input_context: Map<String, Value>,
        execution_id: Option<String>,
    ) -> UnboundedReceiver<ExecutionEvent> {
        let (tx, rx) = mpsc::unbounded();
        let input_task = input_task.into();
        tokio::spawn(async move {
            self.run_streaming(topology, input_task, input_context, execution_id, tx)
                .await;
        });
        rx
    }

    /// Drive one streamed execution, emitting events in protocol order.
    async fn run_streaming(
        &self,
        topology: TopologyConfig,
        input_task: String,
        input_context: Map<String, Value>,
        execution_id: Option<String>,
        tx: UnboundedSender<ExecutionEvent>,
    ) {
        let mut state = self.init_state(&topology, &input_task, input_context, execution_id);

        if !emit(
            &tx,
            EventType::ExecutionStart,
            json!({
                "execution_id": state.execution_id,
                "team_id": state.team_id,
                "task": state.input_task,
            }),
        ) {
            return;
        }

        while !state.is_complete && state.iteration_count < state.max_iterations {
            if !emit(
                &tx,
                EventType::GlobalSupervisorThinking,
                json!({ "iteration": state.iteration_count }),
            ) {
                return;
            }

            let decision = self.call_global_supervisor(&state).await;
            state.add_supervisor_decision(decision.clone());

            if !emit(
                &tx,
                EventType::GlobalSupervisorDecision,
                serde_json::to_value(&decision).unwrap_or(Value::Null),
            ) {
                return;
            }

            if decision.action == RouteAction::Finish || !decision.should_continue {
                state.is_complete = true;
                break;
            }

            let nodes_to_execute: Vec<String> = match decision.action {
                RouteAction::Delegate => decision.next_node.clone().into_iter().collect(),
                RouteAction::Parallel => decision.parallel_nodes.clone(),
                RouteAction::Finish | RouteAction::Escalate => Vec::new(),
            };

            for node_id in nodes_to_execute {
                let Some(config) = state.node_config(&node_id).cloned() else {
                    log::warn!("node {} not found in topology, skipping", node_id);
                    continue;
                };

                if !emit(&tx, EventType::NodeStart, json!({ "node_id": config.id })) {
                    return;
                }

                let node_task = task_or(&decision.task_for_node, &state.input_task).to_string();
                let result = self
                    .execute_node(&config, &node_task, &state.input_context)
                    .await;

                // Agent results in configuration order for determinism.
                for agent in &config.agents {
                    if let Some(agent_result) = result.agent_results.get(&agent.agent_id) {
                        if !emit(
                            &tx,
                            EventType::AgentResult,
                            json!({
                                "node_id": config.id,
                                "agent_id": agent_result.agent_id,
                                "output": truncate(
                                    &agent_result.output,
                                    self.settings().event_output_limit
                                ),
                                "status": agent_result.status,
                            }),
                        ) {
                            return;
                        }
                    }
                }

                if !emit(
                    &tx,
                    EventType::NodeComplete,
                    json!({
                        "node_id": config.id,
                        "status": result.status,
                        "output": truncate(&result.output, self.settings().event_output_limit),
                    }),
                ) {
                    return;
                }

                state.add_node_result(&config.id, result);
            }
        }

        if !state.node_results.is_empty() {
            if !emit(&tx, EventType::SynthesisStart, json!({})) {
                return;
            }
            let labeled = labeled_node_outputs(&state);
            state.final_output = self
                .synthesize_results(&state.input_task, &labeled, &state.global_supervisor_config)
                .await;
        }

        emit(
            &tx,
            EventType::ExecutionComplete,
            json!({
                "execution_id": state.execution_id,
                "status": status_str(state.is_complete),
                "output": state.final_output,
                "iterations": state.iteration_count,
            }),
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ResultStatus;

    #[test]
    fn test_event_type_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&EventType::GlobalSupervisorThinking).unwrap(),
            "\"global_supervisor_thinking\""
        );
        assert_eq!(
            serde_json::to_string(&EventType::ExecutionComplete).unwrap(),
            "\"execution_complete\""
        );
    }

    #[test]
    fn test_event_wire_shape() {
        let event = ExecutionEvent::new(EventType::NodeStart, json!({"node_id": "n1"}));
        let wire: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["type"], "node_start");
        assert_eq!(wire["data"]["node_id"], "n1");
        assert!(wire["timestamp"].is_string());
    }

    #[test]
    fn test_status_str() {
        assert_eq!(status_str(true), "success");
        assert_eq!(status_str(false), "timeout");
    }

    #[test]
    fn test_result_status_serializes_lowercase_in_events() {
        let data = json!({"status": ResultStatus::Timeout});
        assert_eq!(data["status"], "timeout");
    }
}
