//! Tolerant parsing of supervisor decisions from raw LLM output.
//!
//! LLMs asked for JSON frequently wrap it in markdown fences or surround it
//! with prose. Extraction runs fence detection first, then brace matching
//! (which, unlike a regex, handles nested objects), then a `serde_json`
//! decode into the typed decision. Any failure is answered with a total
//! fallback decision so the supervisor loops always make forward progress
//! or terminate; a parse error never escapes to the engine's caller.

use std::fmt;

use thiserror::Error;

use crate::state::{GlobalSupervisorDecision, NodeSupervisorDecision, RouteAction};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a supervisor response could not be turned into a decision.
#[derive(Debug, Error)]
pub enum DecisionParseError {
    /// No `{` found anywhere in the response.
    #[error("no JSON object found in response")]
    NoJsonObject,
    /// A `{` was found but never closed.
    #[error("unbalanced braces in response")]
    UnbalancedBraces,
    /// The extracted span was not valid JSON for the decision schema.
    #[error("invalid decision JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract the first JSON object from raw LLM text.
///
/// Strips whitespace, prefers the interior of a ```json fenced block (then
/// any fenced block), and finally scans from the first `{` tracking brace
/// depth to the matching `}`. Prose before or after the object is tolerated.
pub fn extract_json_object(content: &str) -> Result<&str, DecisionParseError> {
    let mut content = content.trim();

    if let Some(inner) = fenced_block(content, "```json") {
        content = inner;
    } else if let Some(inner) = fenced_block(content, "```") {
        content = inner;
    }

    let start = content.find('{').ok_or(DecisionParseError::NoJsonObject)?;
    let mut depth = 0usize;
    for (offset, ch) in content[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&content[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    Err(DecisionParseError::UnbalancedBraces)
}

/// Interior of the first fenced block opened by `fence`, if present.
fn fenced_block<'a>(content: &'a str, fence: &str) -> Option<&'a str> {
    let start = content.find(fence)? + fence.len();
    let end = content[start..].find("```")?;
    Some(content[start..start + end].trim())
}

// ---------------------------------------------------------------------------
// Typed parsing
// ---------------------------------------------------------------------------

/// Parse a global supervisor response into a typed decision.
pub fn parse_global_decision(
    content: &str,
) -> Result<GlobalSupervisorDecision, DecisionParseError> {
    let span = extract_json_object(content)?;
    Ok(serde_json::from_str(span)?)
}

/// Parse a node supervisor response into a typed decision.
pub fn parse_node_decision(content: &str) -> Result<NodeSupervisorDecision, DecisionParseError> {
    let span = extract_json_object(content)?;
    Ok(serde_json::from_str(span)?)
}

// ---------------------------------------------------------------------------
// Fallback decisions
// ---------------------------------------------------------------------------

impl GlobalSupervisorDecision {
    /// Default decision used when the supervisor response is unusable:
    /// delegate to the first available node if one exists, otherwise finish.
    /// The triggering error is recorded in `reasoning` for observability.
    pub fn fallback(available: &[&str], task: &str, error: &dyn fmt::Display) -> Self {
        let next = available.first().map(|id| id.to_string());
        Self {
            action: if next.is_some() {
                RouteAction::Delegate
            } else {
                RouteAction::Finish
            },
            should_continue: next.is_some(),
            next_node: next,
            parallel_nodes: Vec::new(),
            reasoning: format!("Default routing due to parse error: {}", error),
            task_for_node: task.to_string(),
        }
    }
}

impl NodeSupervisorDecision {
    /// Default decision used when the node supervisor response is unusable:
    /// delegate to the first not-yet-run agent if one exists, otherwise
    /// finish and mark the node complete.
    pub fn fallback(available: &[&str], task: &str, error: &dyn fmt::Display) -> Self {
        let next = available.first().map(|id| id.to_string());
        Self {
            action: if next.is_some() {
                RouteAction::Delegate
            } else {
                RouteAction::Finish
            },
            node_complete: next.is_none(),
            next_agent: next,
            parallel_agents: Vec::new(),
            reasoning: format!("Default routing due to parse error: {}", error),
            task_for_agent: task.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const DECISION_JSON: &str = r#"{
        "action": "delegate",
        "next_node": "research",
        "parallel_nodes": [],
        "reasoning": "research first",
        "task_for_node": "gather sources",
        "should_continue": true
    }"#;

    #[test]
    fn test_parse_bare_json() {
        let decision = parse_global_decision(DECISION_JSON).unwrap();
        assert_eq!(decision.action, RouteAction::Delegate);
        assert_eq!(decision.next_node.as_deref(), Some("research"));
        assert!(decision.should_continue);
    }

    #[test]
    fn test_parse_json_fenced_block() {
        let wrapped = format!("Here is my decision:\n```json\n{}\n```\nDone.", DECISION_JSON);
        let decision = parse_global_decision(&wrapped).unwrap();
        assert_eq!(decision.next_node.as_deref(), Some("research"));
    }

    #[test]
    fn test_parse_plain_fenced_block() {
        let wrapped = format!("```\n{}\n```", DECISION_JSON);
        let decision = parse_global_decision(&wrapped).unwrap();
        assert_eq!(decision.reasoning, "research first");
    }

    #[test]
    fn test_parse_with_surrounding_prose() {
        let wrapped = format!(
            "After careful thought I conclude: {} — that is my final answer.",
            DECISION_JSON
        );
        let decision = parse_global_decision(&wrapped).unwrap();
        assert_eq!(decision.task_for_node, "gather sources");
    }

    #[test]
    fn test_brace_matching_handles_nested_objects() {
        let raw = r#"prefix {"action": "finish", "reasoning": "done", "meta": {"inner": {"deep": 1}}} suffix"#;
        let span = extract_json_object(raw).unwrap();
        assert!(span.starts_with('{') && span.ends_with('}'));
        let decision = parse_global_decision(raw).unwrap();
        assert_eq!(decision.action, RouteAction::Finish);
    }

    #[test]
    fn test_no_object_is_an_error() {
        let err = extract_json_object("no json here at all").unwrap_err();
        assert!(matches!(err, DecisionParseError::NoJsonObject));
    }

    #[test]
    fn test_unbalanced_braces_is_an_error() {
        let err = extract_json_object(r#"{"action": "finish""#).unwrap_err();
        assert!(matches!(err, DecisionParseError::UnbalancedBraces));
    }

    #[test]
    fn test_missing_required_field_is_an_error() {
        // `reasoning` is required by the schema.
        let raw = r#"{"action": "finish"}"#;
        assert!(parse_global_decision(raw).is_err());
    }

    #[test]
    fn test_node_decision_defaults() {
        let raw = r#"{"action": "finish", "reasoning": "all done"}"#;
        let decision = parse_node_decision(raw).unwrap();
        assert!(!decision.node_complete);
        assert!(decision.parallel_agents.is_empty());
        assert_eq!(decision.task_for_agent, "");
    }

    #[test]
    fn test_global_fallback_with_available_target() {
        let decision =
            GlobalSupervisorDecision::fallback(&["alpha", "beta"], "the task", &"boom");
        assert_eq!(decision.action, RouteAction::Delegate);
        assert_eq!(decision.next_node.as_deref(), Some("alpha"));
        assert!(decision.should_continue);
        assert!(decision.reasoning.contains("boom"));
        assert_eq!(decision.task_for_node, "the task");
    }

    #[test]
    fn test_global_fallback_without_targets() {
        let decision = GlobalSupervisorDecision::fallback(&[], "the task", &"boom");
        assert_eq!(decision.action, RouteAction::Finish);
        assert!(decision.next_node.is_none());
        assert!(!decision.should_continue);
    }

    #[test]
    fn test_node_fallback_marks_complete_when_exhausted() {
        let decision = NodeSupervisorDecision::fallback(&[], "t", &"boom");
        assert_eq!(decision.action, RouteAction::Finish);
        assert!(decision.node_complete);

        let decision = NodeSupervisorDecision::fallback(&["a1"], "t", &"boom");
        assert_eq!(decision.next_agent.as_deref(), Some("a1"));
        assert!(!decision.node_complete);
    }
}
