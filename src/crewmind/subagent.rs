//! Bounded subagent driver: one delegated task, one report.
//!
//! A subagent owns its entire world - message list, todo list, scratchpad,
//! parser - and shares only the command executor with the orchestrator that
//! spawned it.  It never sees the coordination hub; the [`SubagentReport`] it
//! returns is the sole channel back up the hierarchy.
//!
//! The loop is strictly bounded.  Within the turn budget the driver watches
//! for a `report` action in each executed turn.  When the budget runs out, a
//! final demand for a report is appended to the last environment response and
//! the model gets exactly one more call; if even that yields no report, a
//! fallback report is synthesized so the orchestrator always gets an answer
//! in at most `max_turns + 1` LLM calls.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;

use crate::crewmind::actions::{Action, AgentType, ReportAction};
use crate::crewmind::command_executor::CommandExecutor;
use crate::crewmind::handlers::ActionHandler;
use crate::crewmind::hub::{SubagentMeta, SubagentReport};
use crate::crewmind::llm::{
    count_input_tokens, count_output_tokens, get_llm_response, LlmClient, LlmConfig, Message,
    Role,
};
use crate::crewmind::parser::ActionParser;
use crate::crewmind::system_msgs;
use crate::crewmind::turn_executor::TurnExecutor;
use crate::crewmind::turn_logger::TurnLogger;

/// Default turn budget for a subagent run.
pub const DEFAULT_SUBAGENT_MAX_TURNS: usize = 30;

/// Injected into the last environment response when the budget is exhausted.
const FORCE_REPORT_MSG: &str = "\n\nCRITICAL: MAXIMUM TURNS REACHED\n\
You have reached the maximum number of allowed turns.\n\
You MUST now submit a report using ONLY the <report> action.\n\
NO OTHER ACTIONS ARE ALLOWED.\n\n\
Instructions:\n\
1. Use ONLY the <report> action\n\
2. Include ALL contexts you have discovered so far\n\
3. In the comments section:\n\
   - Summarize what you have accomplished\n\
   - If the task is incomplete, explain what remains to be done\n\
   - Describe what you were about to do next and why\n\n\
SUBMIT YOUR REPORT NOW.";

/// A file or directory listing materialized into the subagent's first prompt.
#[derive(Debug, Clone)]
pub struct BootstrapContext {
    pub path: String,
    pub content: String,
    pub reason: String,
}

/// Task specification handed to a subagent.
#[derive(Debug, Clone)]
pub struct SubagentTask {
    pub agent_type: AgentType,
    pub title: String,
    pub description: String,
    /// Contexts resolved from the store, in reference order.
    pub ctx_store_ctxts: Vec<(String, String)>,
    pub bootstrap_ctxts: Vec<BootstrapContext>,
}

/// Executes a single delegated task and returns a structured report.
pub struct Subagent {
    task: SubagentTask,
    llm_client: Arc<dyn LlmClient>,
    llm_config: LlmConfig,
    max_turns: usize,
    turn_executor: TurnExecutor,
    messages: Vec<Message>,
    logging_dir: Option<PathBuf>,
    task_id: Option<String>,
}

impl Subagent {
    /// Create a subagent with its own state and the shared executor.
    pub fn new(
        task: SubagentTask,
        executor: Arc<dyn CommandExecutor>,
        llm_client: Arc<dyn LlmClient>,
        llm_config: LlmConfig,
    ) -> Self {
        let handler = ActionHandler::for_subagent(executor);
        Subagent {
            task,
            llm_client,
            llm_config,
            max_turns: DEFAULT_SUBAGENT_MAX_TURNS,
            turn_executor: TurnExecutor::new(ActionParser::new(), handler),
            messages: Vec::new(),
            logging_dir: None,
            task_id: None,
        }
    }

    /// Override the turn budget.
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Enable per-turn JSON logging under `dir`.
    pub fn with_logging_dir(mut self, dir: PathBuf) -> Self {
        self.logging_dir = Some(dir);
        self
    }

    /// Tag log files with the hub task id.
    pub fn with_task_id(mut self, task_id: String) -> Self {
        self.task_id = Some(task_id);
        self
    }

    fn build_task_prompt(&self) -> String {
        let mut sections = Vec::new();

        sections.push(format!("# Task: {}\n", self.task.title));
        sections.push(format!("{}\n", self.task.description));

        if !self.task.ctx_store_ctxts.is_empty() {
            sections.push("## Provided Context\n".to_string());
            for (ctx_id, content) in &self.task.ctx_store_ctxts {
                sections.push(format!("### Context: {}\n", ctx_id));
                sections.push(format!("{}\n", content));
            }
        }

        if !self.task.bootstrap_ctxts.is_empty() {
            sections.push("## Relevant Files/Directories\n".to_string());
            for item in &self.task.bootstrap_ctxts {
                sections.push(format!("- {}: {}\n", item.path, item.reason));
            }
        }

        sections.push("\nBegin your investigation/implementation now.".to_string());
        sections.join("\n")
    }

    fn find_report(actions: &[Action]) -> Option<ReportAction> {
        actions.iter().find_map(|action| match action {
            Action::Report(report) => Some(report.clone()),
            _ => None,
        })
    }

    fn build_report(&self, action: ReportAction, num_turns: usize) -> SubagentReport {
        SubagentReport {
            contexts: action.contexts,
            comments: action.comments,
            meta: SubagentMeta {
                trajectory: Some(self.messages.clone()),
                num_turns: Some(num_turns),
                total_input_tokens: count_input_tokens(&self.messages),
                total_output_tokens: count_output_tokens(&self.messages),
            },
        }
    }

    /// Execute the task and return the report.
    pub async fn run(&mut self) -> SubagentReport {
        let prefix = match &self.task_id {
            Some(task_id) => format!("subagent_{}", task_id),
            None => format!("subagent_{}", self.task.agent_type),
        };
        let turn_logger = TurnLogger::new(self.logging_dir.clone(), &prefix);

        self.messages = vec![
            Message::system(system_msgs::system_message_for(self.task.agent_type)),
            Message::user(self.build_task_prompt()),
        ];

        for turn_num in 1..=self.max_turns {
            log::debug!(
                "Subagent {} executing turn {}",
                self.task.agent_type,
                turn_num
            );

            let llm_response =
                match get_llm_response(&*self.llm_client, &self.messages, &self.llm_config).await
                {
                    Ok(response) => response,
                    Err(e) => {
                        log::error!("Error in subagent turn {}: {}", turn_num, e);
                        self.messages.push(Message::user(format!(
                            "Error occurred: {}. Please continue.",
                            e
                        )));
                        continue;
                    }
                };

            self.messages.push(Message::assistant(llm_response.clone()));

            let result = self.turn_executor.execute(&llm_response).await;

            let env_response = result.env_responses.join("\n");
            self.messages.push(Message::user(env_response.clone()));
            log::debug!("Environment response:\n{}", env_response);

            turn_logger.log_turn(
                turn_num,
                json!({
                    "task_type": self.task.agent_type.as_str(),
                    "task_title": self.task.title,
                    "llm_response": llm_response,
                    "actions_executed": result
                        .actions_executed
                        .iter()
                        .map(|a| format!("{:?}", a))
                        .collect::<Vec<String>>(),
                    "env_responses": result.env_responses,
                    "messages_count": self.messages.len(),
                }),
            );

            if let Some(report_action) = Self::find_report(&result.actions_executed) {
                let report = self.build_report(report_action, turn_num);
                log::info!(
                    "Subagent report received on turn {} ({} contexts): {}",
                    turn_num,
                    report.contexts.len(),
                    report.comments
                );
                turn_logger.log_final_summary(self.summary_value(&report, true));
                return report;
            }
        }

        // Budget exhausted: demand a report with one final call.
        log::warn!("Subagent reached max turns without reporting - forcing report");
        turn_logger.log_turn(
            self.max_turns + 1,
            json!({
                "task_type": self.task.agent_type.as_str(),
                "task_title": self.task.title,
                "event": "forcing_report",
                "reason": "max_turns_reached",
            }),
        );

        match self.messages.last_mut() {
            Some(last) if last.role == Role::User => {
                last.content.push_str(FORCE_REPORT_MSG);
            }
            _ => {
                self.messages
                    .push(Message::user(FORCE_REPORT_MSG.trim_start().to_string()));
            }
        }

        match get_llm_response(&*self.llm_client, &self.messages, &self.llm_config).await {
            Ok(llm_response) => {
                self.messages.push(Message::assistant(llm_response.clone()));
                let result = self.turn_executor.execute(&llm_response).await;

                if let Some(report_action) = Self::find_report(&result.actions_executed) {
                    let report = self.build_report(report_action, self.max_turns + 1);
                    log::info!(
                        "Subagent forced report received after {} turns ({} contexts)",
                        self.max_turns,
                        report.contexts.len()
                    );
                    turn_logger.log_final_summary(self.summary_value(&report, true));
                    return report;
                }
            }
            Err(e) => {
                log::error!("Error forcing report: {}", e);
            }
        }

        // Even the forced turn produced no report; synthesize one.
        log::warn!(
            "Subagent produced no report after {} turns, returning fallback",
            self.max_turns
        );
        let fallback = SubagentReport {
            contexts: Vec::new(),
            comments: format!(
                "Task incomplete - reached maximum turns ({}) without proper completion. \
                 Agent failed to provide report when requested.",
                self.max_turns
            ),
            meta: SubagentMeta {
                trajectory: Some(self.messages.clone()),
                num_turns: Some(self.max_turns),
                total_input_tokens: count_input_tokens(&self.messages),
                total_output_tokens: count_output_tokens(&self.messages),
            },
        };
        turn_logger.log_final_summary(self.summary_value(&fallback, false));
        fallback
    }

    fn summary_value(&self, report: &SubagentReport, completed: bool) -> serde_json::Value {
        json!({
            "task_type": self.task.agent_type.as_str(),
            "task_title": self.task.title,
            "completed": completed,
            "num_turns": report.meta.num_turns,
            "total_input_tokens": report.meta.total_input_tokens,
            "total_output_tokens": report.meta.total_output_tokens,
            "contexts_returned": report.contexts.len(),
            "comments": report.comments,
        })
    }
}
