//! Execution state and supervisor decision types.
//!
//! Two mutable aggregates track a run: [`TeamExecutionState`] (owned by the
//! global engine for the whole execution) and [`NodeExecutionState`] (owned
//! by one node activation and discarded once its [`NodeResult`] is produced).
//! Supervisor decisions are tagged-variant structs parsed from LLM output;
//! the parsing and fallback logic lives in [`crate::decision`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::topology::{AgentConfig, NodeConfig, SupervisorConfig};

// ---------------------------------------------------------------------------
// RouteAction
// ---------------------------------------------------------------------------

/// Actions a supervisor can take in a routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteAction {
    /// Route to exactly one target (node or agent).
    Delegate,
    /// Route to a fixed list of targets concurrently.
    Parallel,
    /// Terminate the current scope.
    Finish,
    /// Escalate to the parent supervisor. Reserved; the current loops record
    /// it in the audit trail but take no routing action.
    Escalate,
}

// ---------------------------------------------------------------------------
// Supervisor decisions
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

/// Decision from the global supervisor about which node(s) to activate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSupervisorDecision {
    /// The routing action to take at the team level.
    pub action: RouteAction,
    /// Node id to activate. Required when `action` is `delegate`.
    #[serde(default)]
    pub next_node: Option<String>,
    /// Node ids to activate concurrently. Required when `action` is `parallel`.
    #[serde(default)]
    pub parallel_nodes: Vec<String>,
    /// Explanation for the routing choice; always recorded for the audit trail.
    pub reasoning: String,
    /// Sub-task text forwarded to the activated node(s).
    #[serde(default)]
    pub task_for_node: String,
    /// Explicit continuation flag, checked before the action itself.
    #[serde(default = "default_true")]
    pub should_continue: bool,
}

/// Decision from a node supervisor about which agent(s) to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSupervisorDecision {
    /// The routing action to take within the node.
    pub action: RouteAction,
    /// Agent id to run. Required when `action` is `delegate`.
    #[serde(default)]
    pub next_agent: Option<String>,
    /// Agent ids to run concurrently. Required when `action` is `parallel`.
    #[serde(default)]
    pub parallel_agents: Vec<String>,
    /// Explanation for the agent selection.
    pub reasoning: String,
    /// Sub-task text forwarded to the selected agent(s).
    #[serde(default)]
    pub task_for_agent: String,
    /// True when the node has finished its work (inverted sense of
    /// `should_continue`).
    #[serde(default)]
    pub node_complete: bool,
}

// ---------------------------------------------------------------------------
// Result records
// ---------------------------------------------------------------------------

/// Terminal status of an agent, node, or whole execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    /// Completed normally.
    Success,
    /// An invocation raised; the error text is carried alongside.
    Failed,
    /// The iteration cap was exhausted without an explicit finish.
    Timeout,
}

/// Immutable record of one agent invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    /// The invoked agent's id.
    pub agent_id: String,
    /// The agent's text output; empty on failure.
    pub output: String,
    /// Terminal status of the invocation.
    pub status: ResultStatus,
    /// Stringified error when `status` is `failed`.
    pub error: Option<String>,
    /// Wall-clock duration of the invocation in milliseconds.
    pub execution_time_ms: u64,
    /// When the result was produced.
    pub timestamp: DateTime<Utc>,
}

/// Aggregated result of one node activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeResult {
    /// The node's id.
    pub node_id: String,
    /// The node's display name.
    pub node_name: String,
    /// `success` when the supervisor finished explicitly, `timeout` when the
    /// node exhausted its iteration cap. Partial results are kept either way.
    pub status: ResultStatus,
    /// The node's synthesized (or passthrough) output.
    pub output: String,
    /// Every agent result produced inside the node, keyed by agent id.
    pub agent_results: HashMap<String, AgentResult>,
    /// Full node-supervisor decision audit trail.
    pub supervisor_decisions: Vec<NodeSupervisorDecision>,
    /// Wall-clock duration of the node activation in milliseconds.
    pub execution_time_ms: u64,
    /// Number of node-supervisor loop passes taken.
    pub iterations: u32,
}

// ---------------------------------------------------------------------------
// TeamExecutionState
// ---------------------------------------------------------------------------

/// Complete mutable state for one hierarchical team execution.
///
/// Created fresh per execution, owned exclusively by the engine for the
/// run's lifetime, and never reused. Invariant: a node id appears in
/// `executed_nodes` iff it has an entry in `node_results` (maintained by
/// [`TeamExecutionState::add_node_result`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamExecutionState {
    /// Unique execution identifier.
    pub execution_id: String,
    /// Identifier of the team being executed.
    pub team_id: String,

    /// The original task text.
    pub input_task: String,
    /// Caller-supplied context mapping, serialized into agent prompts.
    pub input_context: Map<String, Value>,
    /// Final synthesized output; empty until synthesis runs.
    pub final_output: String,

    /// Node configurations in topology order.
    pub nodes: Vec<NodeConfig>,
    /// The global supervisor's model selection.
    pub global_supervisor_config: SupervisorConfig,

    /// Node ids that have produced a result, in completion order.
    pub executed_nodes: Vec<String>,
    /// Node results keyed by node id.
    pub node_results: HashMap<String, NodeResult>,
    /// Full global-supervisor decision audit trail.
    pub global_supervisor_decisions: Vec<GlobalSupervisorDecision>,

    /// Number of global supervisor loop passes taken so far.
    pub iteration_count: u32,
    /// Hard cap on global loop passes.
    pub max_iterations: u32,
    /// True once the supervisor finished or the loop was marked done.
    pub is_complete: bool,

    /// When the execution started.
    pub started_at: DateTime<Utc>,
}

impl TeamExecutionState {
    /// Node ids that have not yet executed, in topology order.
    pub fn available_nodes(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| !self.executed_nodes.iter().any(|e| e == id))
            .collect()
    }

    /// Look up a node configuration by id.
    pub fn node_config(&self, node_id: &str) -> Option<&NodeConfig> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// Record a node result and mark the node executed.
    pub fn add_node_result(&mut self, node_id: &str, result: NodeResult) {
        self.node_results.insert(node_id.to_string(), result);
        if !self.executed_nodes.iter().any(|e| e == node_id) {
            self.executed_nodes.push(node_id.to_string());
        }
    }

    /// Record a global supervisor decision and advance the iteration counter.
    pub fn add_supervisor_decision(&mut self, decision: GlobalSupervisorDecision) {
        self.global_supervisor_decisions.push(decision);
        self.iteration_count += 1;
    }
}

// ---------------------------------------------------------------------------
// NodeExecutionState
// ---------------------------------------------------------------------------

/// Mutable state for one node activation.
///
/// Created fresh per activation — parallel activations never share one —
/// and discarded after the [`NodeResult`] is returned upward. The iteration
/// counter and cap are node-local, independent of the global ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecutionState {
    /// The activated node's id.
    pub node_id: String,
    /// The activated node's display name.
    pub node_name: String,
    /// Task text forwarded from the parent decision.
    pub task: String,
    /// Context mapping forwarded from the execution input.
    pub context: Map<String, Value>,

    /// The node's agent configurations.
    pub agents: Vec<AgentConfig>,
    /// The node supervisor's model selection.
    pub supervisor_config: SupervisorConfig,

    /// Agent ids that have produced a result, in completion order.
    pub executed_agents: Vec<String>,
    /// Agent results keyed by agent id.
    pub agent_results: HashMap<String, AgentResult>,
    /// Full node-supervisor decision audit trail.
    pub supervisor_decisions: Vec<NodeSupervisorDecision>,

    /// Number of node-supervisor loop passes taken so far.
    pub iteration_count: u32,
    /// Hard cap on node loop passes.
    pub max_iterations: u32,
    /// True once the node supervisor finished or the loop was marked done.
    pub is_complete: bool,
    /// The node's synthesized or passthrough output.
    pub output: String,
}

impl NodeExecutionState {
    /// Build a fresh activation state from a node configuration.
    pub fn new(
        config: &NodeConfig,
        task: impl Into<String>,
        context: Map<String, Value>,
        max_iterations: u32,
    ) -> Self {
        Self {
            node_id: config.id.clone(),
            node_name: config.display_name().to_string(),
            task: task.into(),
            context,
            agents: config.agents.clone(),
            supervisor_config: config.supervisor_config.clone(),
            executed_agents: Vec::new(),
            agent_results: HashMap::new(),
            supervisor_decisions: Vec::new(),
            iteration_count: 0,
            max_iterations,
            is_complete: false,
            output: String::new(),
        }
    }

    /// Agent ids that have not yet run, in configuration order.
    pub fn available_agents(&self) -> Vec<&str> {
        self.agents
            .iter()
            .map(|a| a.agent_id.as_str())
            .filter(|id| !self.executed_agents.iter().any(|e| e == id))
            .collect()
    }

    /// Look up an agent configuration by id.
    pub fn agent_config(&self, agent_id: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|a| a.agent_id == agent_id)
    }

    /// Record an agent result and mark the agent executed.
    pub fn add_agent_result(&mut self, result: AgentResult) {
        let agent_id = result.agent_id.clone();
        self.agent_results.insert(agent_id.clone(), result);
        if !self.executed_agents.iter().any(|e| e == &agent_id) {
            self.executed_agents.push(agent_id);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::SupervisorConfig;

    fn agent(id: &str) -> AgentConfig {
        AgentConfig {
            agent_id: id.to_string(),
            role: String::new(),
            model_provider: None,
            model_id: None,
            api_key: None,
            system_prompt: None,
            temperature: None,
            max_tokens: None,
            tools: Vec::new(),
        }
    }

    fn node_state(agent_ids: &[&str]) -> NodeExecutionState {
        let config = NodeConfig {
            id: "n1".to_string(),
            name: "Node One".to_string(),
            node_type: "agent".to_string(),
            agents: agent_ids.iter().map(|id| agent(id)).collect(),
            supervisor_config: SupervisorConfig::default(),
        };
        NodeExecutionState::new(&config, "task", Map::new(), 20)
    }

    fn agent_result(id: &str) -> AgentResult {
        AgentResult {
            agent_id: id.to_string(),
            output: format!("output from {}", id),
            status: ResultStatus::Success,
            error: None,
            execution_time_ms: 1,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_available_agents_shrinks_in_order() {
        let mut state = node_state(&["a", "b", "c"]);
        assert_eq!(state.available_agents(), vec!["a", "b", "c"]);

        state.add_agent_result(agent_result("b"));
        assert_eq!(state.available_agents(), vec!["a", "c"]);
        assert_eq!(state.executed_agents, vec!["b"]);
    }

    #[test]
    fn test_add_agent_result_is_idempotent_on_executed_list() {
        let mut state = node_state(&["a"]);
        state.add_agent_result(agent_result("a"));
        state.add_agent_result(agent_result("a"));
        assert_eq!(state.executed_agents, vec!["a"]);
        assert_eq!(state.agent_results.len(), 1);
    }

    #[test]
    fn test_executed_nodes_matches_node_results() {
        let mut state = TeamExecutionState {
            execution_id: "e1".to_string(),
            team_id: "t1".to_string(),
            input_task: "task".to_string(),
            input_context: Map::new(),
            final_output: String::new(),
            nodes: Vec::new(),
            global_supervisor_config: SupervisorConfig::default(),
            executed_nodes: Vec::new(),
            node_results: HashMap::new(),
            global_supervisor_decisions: Vec::new(),
            iteration_count: 0,
            max_iterations: 50,
            is_complete: false,
            started_at: Utc::now(),
        };

        let result = NodeResult {
            node_id: "n1".to_string(),
            node_name: "n1".to_string(),
            status: ResultStatus::Success,
            output: "done".to_string(),
            agent_results: HashMap::new(),
            supervisor_decisions: Vec::new(),
            execution_time_ms: 2,
            iterations: 1,
        };
        state.add_node_result("n1", result.clone());
        state.add_node_result("n1", result);

        assert_eq!(state.executed_nodes, vec!["n1"]);
        assert_eq!(state.node_results.len(), 1);
    }

    #[test]
    fn test_decision_counter_increments_per_decision() {
        let mut state = TeamExecutionState {
            execution_id: "e1".to_string(),
            team_id: "t1".to_string(),
            input_task: "task".to_string(),
            input_context: Map::new(),
            final_output: String::new(),
            nodes: Vec::new(),
            global_supervisor_config: SupervisorConfig::default(),
            executed_nodes: Vec::new(),
            node_results: HashMap::new(),
            global_supervisor_decisions: Vec::new(),
            iteration_count: 0,
            max_iterations: 50,
            is_complete: false,
            started_at: Utc::now(),
        };

        for i in 0..3 {
            state.add_supervisor_decision(GlobalSupervisorDecision {
                action: RouteAction::Delegate,
                next_node: Some("n1".to_string()),
                parallel_nodes: Vec::new(),
                reasoning: format!("pass {}", i),
                task_for_node: String::new(),
                should_continue: true,
            });
        }
        assert_eq!(state.iteration_count, 3);
        assert_eq!(state.global_supervisor_decisions.len(), 3);
    }

    #[test]
    fn test_route_action_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&RouteAction::Delegate).unwrap(),
            "\"delegate\""
        );
        let action: RouteAction = serde_json::from_str("\"parallel\"").unwrap();
        assert_eq!(action, RouteAction::Parallel);
    }
}
