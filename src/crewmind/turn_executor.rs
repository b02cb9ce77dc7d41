//! Single-turn execution: one LLM reply in, one collated result out.
//!
//! The turn executor is deliberately stateless between calls - it owns the
//! parser and the action handler but carries nothing from one reply to the
//! next.  Errors never halt a turn early: parse errors surface as
//! `[PARSE ERROR]` responses next to the actions that did decode, and a
//! handler failure renders as `[ERROR]` while the remaining actions still
//! run.  Only a finish action (or an empty reply) ends the turn's iteration.

use crate::crewmind::actions::Action;
use crate::crewmind::handlers::ActionHandler;
use crate::crewmind::history::ExecutionResult;
use crate::crewmind::parser::ActionParser;

/// Executes a single turn of agent interaction.
pub struct TurnExecutor {
    action_parser: ActionParser,
    action_handler: ActionHandler,
}

impl TurnExecutor {
    pub fn new(action_parser: ActionParser, action_handler: ActionHandler) -> Self {
        TurnExecutor {
            action_parser,
            action_handler,
        }
    }

    pub fn handler(&self) -> &ActionHandler {
        &self.action_handler
    }

    /// Parse `llm_output` and execute every valid action in order.
    pub async fn execute(&mut self, llm_output: &str) -> ExecutionResult {
        let parsed = self.action_parser.parse_response(llm_output);

        if !parsed.found_action_attempt {
            log::warn!("No actions attempted in response");
            return ExecutionResult {
                actions_executed: Vec::new(),
                env_responses: vec!["No actions were attempted.".to_string()],
                has_error: true,
                finish_message: None,
                done: true,
                subagent_trajectories: None,
            };
        }

        let mut actions_executed = Vec::new();
        let mut env_responses = Vec::new();
        let mut has_error = false;
        let mut finish_message = None;
        let mut done = false;

        if !parsed.errors.is_empty() {
            has_error = true;
            for error in &parsed.errors {
                env_responses.push(format!("[PARSE ERROR] {}", error));
            }

            if parsed.actions.is_empty() {
                return ExecutionResult {
                    actions_executed,
                    env_responses,
                    has_error,
                    finish_message,
                    done: false,
                    subagent_trajectories: None,
                };
            }
        }

        for action in parsed.actions {
            match self.action_handler.handle_action(&action).await {
                Ok((output, is_error)) => {
                    let is_finish = matches!(&action, Action::Finish(_));
                    if let Action::Finish(finish) = &action {
                        finish_message = Some(finish.message.clone());
                    }
                    actions_executed.push(action);

                    if is_error {
                        has_error = true;
                    }
                    env_responses.push(output);

                    if is_finish {
                        done = true;
                        log::info!(
                            "Task finished: {}",
                            finish_message.as_deref().unwrap_or_default()
                        );
                        break;
                    }
                }
                Err(e) => {
                    log::error!("Action execution failed: {}", e);
                    env_responses.push(format!("[ERROR] Action execution failed: {}", e));
                    has_error = true;
                }
            }
        }

        let trajectories = self.action_handler.take_subagent_trajectories();

        ExecutionResult {
            actions_executed,
            env_responses,
            has_error,
            finish_message,
            done,
            subagent_trajectories: if trajectories.is_empty() {
                None
            } else {
                Some(trajectories)
            },
        }
    }
}
