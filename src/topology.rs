//! Topology configuration and validation for agent teams.
//!
//! A topology describes the declarative structure of a team: a set of nodes
//! (each a named group of agents under one node supervisor), directed edges
//! between nodes, and a global supervisor. The engine treats edges as
//! informational only; routing is decided at runtime by the supervisors.
//!
//! [`validate_topology`] guards team creation: it rejects empty node sets,
//! edges with missing or dangling endpoints, cycles, and orphan nodes before
//! any execution is allowed to start.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Configuration types
// ---------------------------------------------------------------------------

/// Configuration for an individual agent within a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Unique identifier for the agent within its node.
    pub agent_id: String,
    /// Role description, shown to the node supervisor when routing.
    #[serde(default)]
    pub role: String,
    /// Provider key (e.g. "openrouter", "openai").
    #[serde(default)]
    pub model_provider: Option<String>,
    /// Model identifier passed to the LLM transport.
    #[serde(default)]
    pub model_id: Option<String>,
    /// API key for the provider, if the engine must build its own client.
    #[serde(default)]
    pub api_key: Option<String>,
    /// System prompt override for the agent.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Sampling temperature. Defaults to 0.7 when unset.
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Maximum output tokens, if constrained.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Names of tools available to the agent (informational for routing).
    #[serde(default)]
    pub tools: Vec<String>,
}

/// Model selection for a supervisor (global or node level).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Provider key. Defaults to "openrouter" when unset.
    #[serde(default)]
    pub model_provider: Option<String>,
    /// Model identifier. Defaults to "openai/gpt-4o-mini" when unset.
    #[serde(default)]
    pub model_id: Option<String>,
    /// API key for the provider.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Configuration for a node in the topology graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique node identifier.
    pub id: String,
    /// Display name. Falls back to the id when empty.
    #[serde(default)]
    pub name: String,
    /// Node type: "agent", "supervisor", or "aggregator".
    #[serde(rename = "type", default = "default_node_type")]
    pub node_type: String,
    /// Agents assigned to this node.
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
    /// The node supervisor's model selection.
    #[serde(default)]
    pub supervisor_config: SupervisorConfig,
}

fn default_node_type() -> String {
    "agent".to_string()
}

impl NodeConfig {
    /// Display name for prompts and results: the configured name, or the id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// A directed edge between two nodes.
///
/// Endpoints are optional so that malformed graph-builder output reaches
/// validation (which reports it) instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeConfig {
    /// Source node id.
    #[serde(default)]
    pub source: Option<String>,
    /// Target node id.
    #[serde(default)]
    pub target: Option<String>,
    /// Relation label. Informational only; never used for routing.
    #[serde(default)]
    pub relation: Option<String>,
}

/// Complete topology configuration for an agent team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Identifier of the team this topology belongs to.
    #[serde(default)]
    pub team_id: Option<String>,
    /// The team's nodes.
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
    /// Directed edges between nodes.
    #[serde(default)]
    pub edges: Vec<EdgeConfig>,
    /// The global supervisor's model selection.
    #[serde(default)]
    pub global_supervisor: SupervisorConfig,
}

impl TopologyConfig {
    /// Validate this topology. See [`validate_topology`].
    pub fn validate(&self) -> ValidationResult {
        validate_topology(&self.nodes, &self.edges)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Result of topology validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// True iff no errors were found.
    pub valid: bool,
    /// One message per problem found; empty when valid.
    pub errors: Vec<String>,
}

/// Validate a topology graph for cycles, orphans, and invalid references.
///
/// All edge-level errors are collected in one pass; a malformed edge does
/// not abort the scan. Cycle detection stops after the first cycle found.
/// A topology with a single node and no edges is valid (a lone node is
/// never an orphan).
pub fn validate_topology(nodes: &[NodeConfig], edges: &[EdgeConfig]) -> ValidationResult {
    let mut errors: Vec<String> = Vec::new();

    let node_ids: BTreeSet<&str> = nodes
        .iter()
        .filter(|n| !n.id.is_empty())
        .map(|n| n.id.as_str())
        .collect();

    if node_ids.is_empty() {
        errors.push("No valid nodes defined in topology".to_string());
        return ValidationResult {
            valid: false,
            errors,
        };
    }

    // Adjacency over valid edges only; invalid edges are reported and skipped.
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut incoming: HashMap<&str, usize> = HashMap::new();

    for edge in edges {
        let (source, target) = match (edge.source.as_deref(), edge.target.as_deref()) {
            (Some(s), Some(t)) if !s.is_empty() && !t.is_empty() => (s, t),
            _ => {
                errors.push(format!(
                    "Edge missing source or target: {:?} -> {:?}",
                    edge.source, edge.target
                ));
                continue;
            }
        };

        if !node_ids.contains(source) {
            errors.push(format!("Invalid source node reference: '{}'", source));
            continue;
        }
        if !node_ids.contains(target) {
            errors.push(format!("Invalid target node reference: '{}'", target));
            continue;
        }

        adjacency.entry(source).or_default().push(target);
        *incoming.entry(target).or_default() += 1;
    }

    detect_cycles(&node_ids, &adjacency, &mut errors);
    detect_orphans(&node_ids, &adjacency, &incoming, &mut errors);

    ValidationResult {
        valid: errors.is_empty(),
        errors,
    }
}

/// Three-color DFS state.
#[derive(Clone, Copy, PartialEq)]
enum Color {
    Unvisited,
    Visiting,
    Visited,
}

/// Detect cycles via depth-first traversal; stops after the first one found
/// and reports the full cycle path (`A -> B -> C -> A`).
fn detect_cycles<'a>(
    node_ids: &BTreeSet<&'a str>,
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
    errors: &mut Vec<String>,
) {
    let mut color: HashMap<&str, Color> = node_ids
        .iter()
        .map(|&id| (id, Color::Unvisited))
        .collect();
    let mut path: Vec<&str> = Vec::new();

    fn dfs<'a>(
        node: &'a str,
        adjacency: &HashMap<&'a str, Vec<&'a str>>,
        color: &mut HashMap<&'a str, Color>,
        path: &mut Vec<&'a str>,
        errors: &mut Vec<String>,
    ) -> bool {
        match color[node] {
            Color::Visiting => {
                // Back edge: the cycle is the path suffix starting at `node`.
                let start = path.iter().position(|&p| p == node).unwrap_or(0);
                let mut cycle: Vec<&str> = path[start..].to_vec();
                cycle.push(node);
                errors.push(format!("Cycle detected: {}", cycle.join(" -> ")));
                return true;
            }
            Color::Visited => return false,
            Color::Unvisited => {}
        }

        color.insert(node, Color::Visiting);
        path.push(node);

        if let Some(neighbors) = adjacency.get(node) {
            for &neighbor in neighbors {
                if dfs(neighbor, adjacency, color, path, errors) {
                    return true;
                }
            }
        }

        path.pop();
        color.insert(node, Color::Visited);
        false
    }

    for &id in node_ids {
        if color[id] == Color::Unvisited && dfs(id, adjacency, &mut color, &mut path, errors) {
            break;
        }
    }
}

/// Report nodes with neither incoming nor outgoing edges. Skipped entirely
/// for single-node topologies.
fn detect_orphans(
    node_ids: &BTreeSet<&str>,
    adjacency: &HashMap<&str, Vec<&str>>,
    incoming: &HashMap<&str, usize>,
    errors: &mut Vec<String>,
) {
    if node_ids.len() <= 1 {
        return;
    }

    for &id in node_ids {
        let has_outgoing = adjacency.get(id).map_or(false, |n| !n.is_empty());
        let has_incoming = incoming.get(id).copied().unwrap_or(0) > 0;
        if !has_outgoing && !has_incoming {
            errors.push(format!("Orphan node detected: '{}' has no connections", id));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> NodeConfig {
        NodeConfig {
            id: id.to_string(),
            name: String::new(),
            node_type: "agent".to_string(),
            agents: Vec::new(),
            supervisor_config: SupervisorConfig::default(),
        }
    }

    fn edge(source: &str, target: &str) -> EdgeConfig {
        EdgeConfig {
            source: Some(source.to_string()),
            target: Some(target.to_string()),
            relation: None,
        }
    }

    #[test]
    fn test_empty_topology_invalid() {
        let result = validate_topology(&[], &[]);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("No valid nodes"));
    }

    #[test]
    fn test_single_node_no_edges_valid() {
        let result = validate_topology(&[node("a")], &[]);
        assert!(result.valid, "errors: {:?}", result.errors);
    }

    #[test]
    fn test_linear_chain_valid() {
        let nodes = vec![node("a"), node("b"), node("c")];
        let edges = vec![edge("a", "b"), edge("b", "c")];
        let result = validate_topology(&nodes, &edges);
        assert!(result.valid, "errors: {:?}", result.errors);
    }

    #[test]
    fn test_cycle_detected_with_path() {
        let nodes = vec![node("a"), node("b"), node("c")];
        let edges = vec![edge("a", "b"), edge("b", "c"), edge("c", "a")];
        let result = validate_topology(&nodes, &edges);
        assert!(!result.valid);
        let cycle_errors: Vec<&String> = result
            .errors
            .iter()
            .filter(|e| e.contains("Cycle detected"))
            .collect();
        assert_eq!(cycle_errors.len(), 1, "only first cycle reported");
        assert!(cycle_errors[0].contains(" -> "));
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let nodes = vec![node("a")];
        let edges = vec![edge("a", "a")];
        let result = validate_topology(&nodes, &edges);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("Cycle detected: a -> a")));
    }

    #[test]
    fn test_dangling_reference() {
        let nodes = vec![node("a"), node("b")];
        let edges = vec![edge("a", "b"), edge("a", "ghost")];
        let result = validate_topology(&nodes, &edges);
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("Invalid target node reference: 'ghost'")));
    }

    #[test]
    fn test_missing_endpoint_reported_and_scan_continues() {
        let nodes = vec![node("a"), node("b"), node("c")];
        let edges = vec![
            EdgeConfig {
                source: Some("a".to_string()),
                target: None,
                relation: None,
            },
            edge("a", "b"),
            edge("b", "c"),
        ];
        let result = validate_topology(&nodes, &edges);
        assert!(!result.valid);
        // Only the malformed edge is reported; the valid edges still connect
        // every node, so no orphan errors appear.
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("missing source or target"));
    }

    #[test]
    fn test_orphan_detected() {
        let nodes = vec![node("a"), node("b"), node("loner")];
        let edges = vec![edge("a", "b")];
        let result = validate_topology(&nodes, &edges);
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("Orphan node detected: 'loner'")));
    }

    #[test]
    fn test_all_errors_collected() {
        let nodes = vec![node("a"), node("b"), node("x")];
        let edges = vec![
            edge("a", "ghost1"),
            edge("ghost2", "b"),
            edge("a", "b"),
        ];
        let result = validate_topology(&nodes, &edges);
        assert!(!result.valid);
        // Two dangling references plus one orphan ("x").
        assert_eq!(result.errors.len(), 3);
    }

    #[test]
    fn test_topology_config_validate() {
        let topology = TopologyConfig {
            team_id: Some("team-1".to_string()),
            nodes: vec![node("a")],
            edges: vec![],
            global_supervisor: SupervisorConfig::default(),
        };
        assert!(topology.validate().valid);
    }

    #[test]
    fn test_deserializes_minimal_json() {
        let raw = r#"{
            "team_id": "t1",
            "nodes": [
                {"id": "research", "name": "Research", "agents": [
                    {"agent_id": "a1", "role": "researcher"}
                ]}
            ],
            "edges": [{"source": "research", "target": "research"}]
        }"#;
        let topology: TopologyConfig = serde_json::from_str(raw).expect("parses");
        assert_eq!(topology.nodes.len(), 1);
        assert_eq!(topology.nodes[0].node_type, "agent");
        assert_eq!(topology.nodes[0].agents[0].tools.len(), 0);
    }
}
