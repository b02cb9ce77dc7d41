//! End-to-end orchestrator run against a scripted mock LLM.
//!
//! Shows the whole pipeline working without network access: the orchestrator
//! creates a task, auto-launches an explorer subagent, the subagent pokes the
//! (local) sandbox and reports, and the orchestrator finishes.  Run with:
//!
//! ```bash
//! RUST_LOG=info cargo run --example orchestrator_mock_run
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use crewmind::{
    LlmClient, LlmConfig, LlmError, LocalExecutor, Message, OrchestratorAgent,
};

/// Pops one scripted reply per call, shared by orchestrator and subagents.
struct ScriptedClient {
    replies: Mutex<VecDeque<String>>,
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(
        &self,
        _messages: &[Message],
        _config: &LlmConfig,
    ) -> Result<String, LlmError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::Provider("script exhausted".to_string()))
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let script = vec![
        // Orchestrator turn 1: delegate the survey.
        r#"<think>
I should delegate the environment survey to an explorer.
</think>
<task_create>
agent_type: explorer
title: "Survey the environment"
description: "Check which shell utilities are available and report back."
auto_launch: true
</task_create>"#
            .to_string(),
        // Explorer turn 1: look around.
        r#"<bash>
cmd: "uname -s && which bash grep find | tr '\n' ' '"
</bash>"#
            .to_string(),
        // Explorer turn 2: report findings.
        r#"<report>
contexts:
  - id: "env_tools"
    content: "Linux sandbox with bash, grep, and find on the PATH."
comments: "Survey complete."
</report>"#
            .to_string(),
        // Orchestrator turn 2: wrap up.
        r#"<finish>
message: "Environment surveyed; findings stored under env_tools."
</finish>"#
            .to_string(),
    ];

    let client = Arc::new(ScriptedClient {
        replies: Mutex::new(script.into_iter().collect()),
    });
    let executor = Arc::new(LocalExecutor::new());

    let mut orchestrator =
        OrchestratorAgent::new(executor, client, LlmConfig::new("mock/scripted"));

    let result = orchestrator.run("Survey the sandbox environment.").await;

    println!("\ncompleted:         {}", result.completed);
    println!("finish message:    {:?}", result.finish_message);
    println!("turns executed:    {}", result.turns_executed);
    let totals = orchestrator.token_totals();
    println!(
        "token totals:      {} in / {} out (estimated)",
        totals.input_tokens, totals.output_tokens
    );

    let hub = orchestrator.hub();
    let hub = hub.lock().unwrap();
    println!("\n{}", hub.view_all_tasks());
    println!("\n{}", hub.view_context_store());
}
