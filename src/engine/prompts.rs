//! Prompt construction for supervisor and synthesis calls.
//!
//! Supervisors are instructed to answer with a JSON object matching the
//! decision schemas in [`crate::state`]; the tolerant parser in
//! [`crate::decision`] handles the cases where they wrap it in prose anyway.

use crate::config::EngineSettings;
use crate::state::{NodeExecutionState, TeamExecutionState};
use crate::text::truncate;

/// System prompt for the global supervisor, parameterized on the current
/// team state: node descriptions with executed-status, and truncated
/// summaries of results produced so far.
pub fn global_supervisor_prompt(state: &TeamExecutionState, settings: &EngineSettings) -> String {
    let mut node_descriptions = Vec::with_capacity(state.nodes.len());
    for node in &state.nodes {
        let agent_info = node
            .agents
            .iter()
            .map(|a| {
                if a.role.is_empty() {
                    a.agent_id.as_str()
                } else {
                    a.role.as_str()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        let status = if state.executed_nodes.iter().any(|e| e == &node.id) {
            "completed"
        } else {
            "available"
        };
        node_descriptions.push(format!(
            "- {} ({}): type={}, agents=[{}] [{}]",
            node.id,
            node.display_name(),
            node.node_type,
            agent_info,
            status
        ));
    }

    let executed = if state.executed_nodes.is_empty() {
        "none".to_string()
    } else {
        state.executed_nodes.join(", ")
    };

    let mut pending_results = Vec::new();
    for node in &state.nodes {
        if let Some(result) = state.node_results.get(&node.id) {
            pending_results.push(format!(
                "- {}: {}",
                node.id,
                truncate(&result.output, settings.node_summary_limit)
            ));
        }
    }
    let pending = if pending_results.is_empty() {
        "none yet".to_string()
    } else {
        pending_results.join("\n")
    };

    format!(
        r#"You are a Global Supervisor coordinating a team of specialized node groups.
Your job is to analyze the task and decide which node should handle it next.

Available nodes and their capabilities:
{node_descriptions}

Current execution state:
- Executed nodes: {executed}
- Pending results: {pending}

Rules:
1. Analyze the task requirements carefully
2. Select the most appropriate node based on its capabilities
3. You can delegate to one node at a time, or run multiple nodes in parallel if their tasks are independent
4. When all necessary work is complete, use action "finish"
5. Always provide clear reasoning for your decisions

You MUST respond with a JSON object matching this exact schema:
{{
    "action": "delegate" | "parallel" | "finish",
    "next_node": "node_id or null",
    "parallel_nodes": ["node_id1", "node_id2"] or [],
    "reasoning": "explanation of your decision",
    "task_for_node": "specific task for the selected node",
    "should_continue": true | false
}}"#,
        node_descriptions = node_descriptions.join("\n"),
        executed = executed,
        pending = pending,
    )
}

/// User message for a global supervisor call.
pub fn global_supervisor_user_message(state: &TeamExecutionState) -> String {
    format!(
        "Task: {}\n\nContext: {}\n\nDecide which node should execute next.",
        state.input_task,
        serde_json::Value::Object(state.input_context.clone()),
    )
}

/// System prompt for a node supervisor, parameterized on the node's
/// activation state: agent descriptions with executed-status and truncated
/// agent result summaries.
pub fn node_supervisor_prompt(state: &NodeExecutionState, settings: &EngineSettings) -> String {
    let mut agent_descriptions = Vec::with_capacity(state.agents.len());
    for agent in &state.agents {
        let status = if state.executed_agents.iter().any(|e| e == &agent.agent_id) {
            "executed"
        } else {
            "available"
        };
        agent_descriptions.push(format!(
            "- {}: role={}, tools={:?} [{}]",
            agent.agent_id, agent.role, agent.tools, status
        ));
    }

    let executed = if state.executed_agents.is_empty() {
        "none".to_string()
    } else {
        state.executed_agents.join(", ")
    };

    let mut result_lines = Vec::new();
    for agent in &state.agents {
        if let Some(result) = state.agent_results.get(&agent.agent_id) {
            result_lines.push(format!(
                "- {}: {}",
                agent.agent_id,
                truncate(&result.output, settings.agent_summary_limit)
            ));
        }
    }
    let results = if result_lines.is_empty() {
        "none yet".to_string()
    } else {
        result_lines.join("\n")
    };

    format!(
        r#"You are a Node Supervisor managing a team of specialized agents.
Your job is to analyze the assigned task and decide which agent should handle it.

Your node: {node_name}
Assigned task: {task}

Available agents in your node:
{agent_descriptions}

Current state:
- Executed agents: {executed}
- Agent results so far: {results}

Rules:
1. Select the agent best suited for the current sub-task
2. You can delegate to one agent, or run multiple in parallel if appropriate
3. When the node's task is complete, use action "finish" and set node_complete to true
4. Synthesize results from agents before marking complete

You MUST respond with a JSON object matching this exact schema:
{{
    "action": "delegate" | "parallel" | "finish",
    "next_agent": "agent_id or null",
    "parallel_agents": ["agent_id1", "agent_id2"] or [],
    "reasoning": "explanation of your decision",
    "task_for_agent": "specific task for the selected agent",
    "node_complete": true | false
}}"#,
        node_name = state.node_name,
        task = state.task,
        agent_descriptions = agent_descriptions.join("\n"),
        executed = executed,
        results = results,
    )
}

/// User message for a node supervisor call.
pub fn node_supervisor_user_message(state: &NodeExecutionState) -> String {
    format!(
        "Decide which agent should handle the task: {}",
        state.task
    )
}

/// System prompt for a synthesis call over labeled result texts.
pub fn synthesis_prompt(original_task: &str, results: &[(String, String)]) -> String {
    let results_text = results
        .iter()
        .map(|(label, output)| format!("[{}]:\n{}", label, output))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"You are synthesizing the results from multiple agents/nodes.

Original task: {original_task}

Results to synthesize:
{results_text}

Please provide a coherent summary that:
1. Integrates all relevant findings
2. Highlights key insights
3. Provides actionable conclusions
4. Notes any conflicts or uncertainties between results"#,
        original_task = original_task,
        results_text = results_text,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{AgentConfig, NodeConfig, SupervisorConfig};
    use serde_json::Map;

    fn sample_state() -> TeamExecutionState {
        TeamExecutionState {
            execution_id: "e1".to_string(),
            team_id: "t1".to_string(),
            input_task: "write a report".to_string(),
            input_context: Map::new(),
            final_output: String::new(),
            nodes: vec![NodeConfig {
                id: "research".to_string(),
                name: "Research".to_string(),
                node_type: "agent".to_string(),
                agents: vec![AgentConfig {
                    agent_id: "a1".to_string(),
                    role: "researcher".to_string(),
                    model_provider: None,
                    model_id: None,
                    api_key: None,
                    system_prompt: None,
                    temperature: None,
                    max_tokens: None,
                    tools: vec!["web_search".to_string()],
                }],
                supervisor_config: SupervisorConfig::default(),
            }],
            global_supervisor_config: SupervisorConfig::default(),
            executed_nodes: Vec::new(),
            node_results: std::collections::HashMap::new(),
            global_supervisor_decisions: Vec::new(),
            iteration_count: 0,
            max_iterations: 50,
            is_complete: false,
            started_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_global_prompt_lists_nodes_and_schema() {
        let prompt = global_supervisor_prompt(&sample_state(), &EngineSettings::default());
        assert!(prompt.contains("- research (Research): type=agent, agents=[researcher] [available]"));
        assert!(prompt.contains("\"should_continue\": true | false"));
        assert!(prompt.contains("Executed nodes: none"));
        assert!(prompt.contains("Pending results: none yet"));
    }

    #[test]
    fn test_global_prompt_marks_executed_nodes() {
        let mut state = sample_state();
        state.executed_nodes.push("research".to_string());
        let prompt = global_supervisor_prompt(&state, &EngineSettings::default());
        assert!(prompt.contains("[completed]"));
        assert!(prompt.contains("Executed nodes: research"));
    }

    #[test]
    fn test_synthesis_prompt_labels_results() {
        let results = vec![
            ("a1".to_string(), "finding one".to_string()),
            ("a2".to_string(), "finding two".to_string()),
        ];
        let prompt = synthesis_prompt("the task", &results);
        assert!(prompt.contains("[a1]:\nfinding one"));
        assert!(prompt.contains("[a2]:\nfinding two"));
        assert!(prompt.contains("Original task: the task"));
    }
}
