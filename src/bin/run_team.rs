//! Run a team topology from a JSON file and print the event stream.
//!
//! Usage: `run-team <topology.json> <task...>`
//!
//! Each event is printed as one JSON line, so the output can be piped into
//! `jq` or tailed by another process.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use futures::StreamExt;
use serde_json::Map;

use taskforce::{EngineSettings, HierarchicalTeamEngine, TopologyConfig};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: run-team <topology.json> <task...>");
    };
    let task = args.collect::<Vec<_>>().join(" ");
    if task.is_empty() {
        bail!("usage: run-team <topology.json> <task...>");
    }

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read topology file {}", path))?;
    let topology: TopologyConfig =
        serde_json::from_str(&raw).with_context(|| format!("invalid topology JSON in {}", path))?;

    let validation = topology.validate();
    if !validation.valid {
        for error in &validation.errors {
            eprintln!("topology error: {}", error);
        }
        bail!("topology validation failed");
    }

    let engine = Arc::new(HierarchicalTeamEngine::new().with_settings(EngineSettings::from_env()));

    let mut events = engine.execute_stream(topology, task, Map::new(), None);
    while let Some(event) = events.next().await {
        println!("{}", serde_json::to_string(&event)?);
    }

    Ok(())
}
