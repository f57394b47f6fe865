//! Synthesis: one LLM round-trip merging labeled results into a summary.

use crate::engine::{prompts, HierarchicalTeamEngine, DEFAULT_MODEL, SYNTHESIS_TEMPERATURE};
use crate::llm::ChatMessage;
use crate::topology::SupervisorConfig;

impl HierarchicalTeamEngine {
    /// Merge labeled result texts into one coherent summary.
    ///
    /// Always a single round-trip regardless of how many results are being
    /// merged. When the synthesis call itself fails, the labeled outputs
    /// are concatenated instead so the run still produces an answer.
    pub(crate) async fn synthesize_results(
        &self,
        original_task: &str,
        results: &[(String, String)],
        supervisor: &SupervisorConfig,
    ) -> String {
        let outcome = async {
            let client = self.client_for(
                supervisor.model_provider.as_deref(),
                supervisor.api_key.as_deref(),
            )?;
            let model = supervisor.model_id.as_deref().unwrap_or(DEFAULT_MODEL);
            let messages = [
                ChatMessage::system(prompts::synthesis_prompt(original_task, results)),
                ChatMessage::user("Please synthesize these results."),
            ];
            client.complete(&messages, model, SYNTHESIS_TEMPERATURE).await
        }
        .await;

        match outcome {
            Ok((content, _)) => content,
            Err(e) => {
                log::warn!("synthesis call failed, concatenating results instead: {}", e);
                results
                    .iter()
                    .map(|(label, output)| format!("[{}]:\n{}", label, output))
                    .collect::<Vec<_>>()
                    .join("\n\n")
            }
        }
    }
}
