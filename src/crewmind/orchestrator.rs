//! Top-level orchestrator driver.
//!
//! The orchestrator runs the outermost perceive–act loop.  It deliberately
//! does **not** feed its own growing message history back to the model:
//! every turn sends exactly two messages - the system prompt and a freshly
//! rebuilt user message containing the task instruction plus a dump of the
//! hub state and the (bounded) conversation history.  The dump is the
//! model's working memory; the hub is the ground truth.
//!
//! Subagent launches happen inside the turn's action handling and block the
//! loop until the subagent reports.  Their trajectories are harvested into
//! the turn record so that final token totals can account for the whole
//! tree, not just the orchestrator's own calls.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::crewmind::command_executor::CommandExecutor;
use crate::crewmind::handlers::ActionHandler;
use crate::crewmind::history::{ConversationHistory, Turn};
use crate::crewmind::hub::OrchestratorHub;
use crate::crewmind::llm::{
    count_input_tokens, count_output_tokens, get_llm_response, LlmClient, LlmConfig, LlmError,
    Message,
};
use crate::crewmind::parser::ActionParser;
use crate::crewmind::system_msgs;
use crate::crewmind::turn_executor::TurnExecutor;
use crate::crewmind::turn_logger::TurnLogger;

/// Default turn budget for the orchestrator loop.
pub const DEFAULT_ORCHESTRATOR_MAX_TURNS: usize = 50;

/// Complete state the orchestrator rebuilds its prompt from each turn.
pub struct OrchestratorState {
    hub: Arc<Mutex<OrchestratorHub>>,
    history: ConversationHistory,
    pub done: bool,
    pub finish_message: Option<String>,
}

impl OrchestratorState {
    pub fn new(hub: Arc<Mutex<OrchestratorHub>>) -> Self {
        OrchestratorState {
            hub,
            history: ConversationHistory::new(),
            done: false,
            finish_message: None,
        }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn add_turn(&mut self, turn: Turn) {
        self.history.add_turn(turn);
    }

    /// Render the full state dump fed to the model each turn.
    pub fn to_prompt(&self) -> String {
        let hub = self.hub.lock().unwrap();
        let sections = vec![
            "## Task Manager State\n".to_string(),
            hub.view_all_tasks(),
            "\n## Context Store\n".to_string(),
            hub.view_context_store(),
            "\n## Conversation History\n".to_string(),
            self.history.to_prompt(),
        ];
        sections.join("\n")
    }

    /// Structured snapshot for turn logs.
    pub fn to_log_value(&self) -> serde_json::Value {
        let hub = self.hub.lock().unwrap();
        json!({
            "done": self.done,
            "finish_message": self.finish_message,
            "tasks": hub.view_all_tasks(),
            "context_store": hub.view_context_store(),
            "conversation_history": self.history.to_log_value(),
        })
    }
}

/// Final summary of an orchestrator run.
#[derive(Debug, Clone)]
pub struct OrchestratorRunResult {
    pub completed: bool,
    pub finish_message: Option<String>,
    pub turns_executed: usize,
    pub max_turns_reached: bool,
}

/// Estimated token totals for a run: the orchestrator's own calls plus every
/// harvested subagent.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenTotals {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Orchestrator agent coordinating tasks and subagents.
pub struct OrchestratorAgent {
    system_message: String,
    llm_client: Arc<dyn LlmClient>,
    llm_config: LlmConfig,
    hub: Arc<Mutex<OrchestratorHub>>,
    state: OrchestratorState,
    turn_executor: TurnExecutor,
    /// Mirror of every request/response, kept only for token accounting.
    orchestrator_messages: Vec<Message>,
    max_turns: usize,
    logging_dir: Option<PathBuf>,
}

impl OrchestratorAgent {
    /// Wire up an orchestrator around a shared executor and LLM client.
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        llm_client: Arc<dyn LlmClient>,
        llm_config: LlmConfig,
    ) -> Self {
        Self::with_logging(executor, llm_client, llm_config, None)
    }

    /// Like [`OrchestratorAgent::new`], with per-turn JSON logging under
    /// `logging_dir` (shared with spawned subagents).
    pub fn with_logging(
        executor: Arc<dyn CommandExecutor>,
        llm_client: Arc<dyn LlmClient>,
        llm_config: LlmConfig,
        logging_dir: Option<PathBuf>,
    ) -> Self {
        let hub = Arc::new(Mutex::new(OrchestratorHub::new()));
        let handler = ActionHandler::for_orchestrator(
            executor,
            hub.clone(),
            llm_client.clone(),
            llm_config.clone(),
            logging_dir.clone(),
        );

        OrchestratorAgent {
            system_message: system_msgs::orchestrator_system_message().to_string(),
            llm_client,
            llm_config,
            state: OrchestratorState::new(hub.clone()),
            hub,
            turn_executor: TurnExecutor::new(ActionParser::new(), handler),
            orchestrator_messages: Vec::new(),
            max_turns: DEFAULT_ORCHESTRATOR_MAX_TURNS,
            logging_dir,
        }
    }

    /// Replace the built-in orchestrator system prompt.
    pub fn with_system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = system_message.into();
        self
    }

    /// Override the turn budget.
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Shared handle to the coordination hub (tasks + context store).
    pub fn hub(&self) -> Arc<Mutex<OrchestratorHub>> {
        self.hub.clone()
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    /// The request/response mirror used for the orchestrator's own token
    /// accounting.
    pub fn orchestrator_messages(&self) -> &[Message] {
        &self.orchestrator_messages
    }

    async fn request_llm(&mut self, user_message: String) -> Result<String, LlmError> {
        let messages = vec![
            Message::system(self.system_message.clone()),
            Message::user(user_message),
        ];

        // The accounting mirror records the system prompt only once.
        if self.orchestrator_messages.is_empty() {
            self.orchestrator_messages
                .push(Message::system(self.system_message.clone()));
        }
        self.orchestrator_messages.push(messages[1].clone());

        let response = get_llm_response(&*self.llm_client, &messages, &self.llm_config).await?;
        self.orchestrator_messages
            .push(Message::assistant(response.clone()));
        Ok(response)
    }

    async fn execute_turn(
        &mut self,
        instruction: &str,
        turn_num: usize,
        turn_logger: &TurnLogger,
    ) -> Result<(), LlmError> {
        let user_message = format!(
            "## Current Task\n{}\n\n{}",
            instruction,
            self.state.to_prompt()
        );

        let llm_response = self.request_llm(user_message.clone()).await?;

        let result = self.turn_executor.execute(&llm_response).await;
        log::info!(
            "Orchestrator turn {}: {} action(s) executed",
            turn_num,
            result.actions_executed.len()
        );

        if let Some(trajectories) = &result.subagent_trajectories {
            for (task_id, trajectory) in trajectories {
                log::info!(
                    "Harvested subagent report for {}: {}",
                    task_id,
                    trajectory.title
                );
            }
        }

        turn_logger.log_turn(
            turn_num,
            json!({
                "instruction": instruction,
                "user_message": user_message,
                "llm_response": llm_response,
                "actions_executed": result
                    .actions_executed
                    .iter()
                    .map(|a| format!("{:?}", a))
                    .collect::<Vec<String>>(),
                "env_responses": result.env_responses,
                "done": result.done,
                "finish_message": result.finish_message,
                "has_error": result.has_error,
                "state_snapshot": self.state.to_log_value(),
            }),
        );

        let done = result.done;
        let finish_message = result.finish_message.clone();

        self.state.add_turn(Turn {
            llm_output: llm_response,
            actions_executed: result.actions_executed,
            env_responses: result.env_responses,
            subagent_trajectories: result.subagent_trajectories,
        });

        if done {
            self.state.done = true;
            self.state.finish_message = finish_message;
            log::info!(
                "Orchestrator marked the task done: {}",
                self.state.finish_message.as_deref().unwrap_or_default()
            );
        }

        Ok(())
    }

    /// Run the orchestrator until a finish action or the turn budget.
    pub async fn run(&mut self, instruction: &str) -> OrchestratorRunResult {
        let turn_logger = TurnLogger::new(self.logging_dir.clone(), "orchestrator");
        let mut turns_executed = 0;

        while !self.state.done && turns_executed < self.max_turns {
            turns_executed += 1;
            log::info!(
                "Orchestrator main loop - turn {}/{}",
                turns_executed,
                self.max_turns
            );

            if let Err(e) = self
                .execute_turn(instruction, turns_executed, &turn_logger)
                .await
            {
                // A failed LLM call costs the turn but not the run.
                log::error!("Error in turn {}: {}", turns_executed, e);
            }
        }

        let result = OrchestratorRunResult {
            completed: self.state.done,
            finish_message: self.state.finish_message.clone(),
            turns_executed,
            max_turns_reached: turns_executed >= self.max_turns,
        };

        let totals = self.token_totals();
        turn_logger.log_final_summary(json!({
            "instruction": instruction,
            "completed": result.completed,
            "finish_message": result.finish_message,
            "turns_executed": result.turns_executed,
            "max_turns_reached": result.max_turns_reached,
            "total_input_tokens": totals.input_tokens,
            "total_output_tokens": totals.output_tokens,
        }));

        result
    }

    /// Estimated token totals: the orchestrator's own messages plus the sum
    /// over every subagent trajectory harvested into the history.
    pub fn token_totals(&self) -> TokenTotals {
        let mut totals = TokenTotals {
            input_tokens: count_input_tokens(&self.orchestrator_messages),
            output_tokens: count_output_tokens(&self.orchestrator_messages),
        };

        for turn in self.state.history().turns() {
            if let Some(trajectories) = &turn.subagent_trajectories {
                for trajectory in trajectories.values() {
                    totals.input_tokens += trajectory.total_input_tokens;
                    totals.output_tokens += trajectory.total_output_tokens;
                }
            }
        }

        totals
    }
}
