//! Dispatch of parsed actions to their tool implementations.
//!
//! The [`ActionHandler`] owns the per-agent state (todo list, scratchpad) and
//! borrows the shared pieces (executor, hub, LLM client).  Every handler
//! returns `(rendered_output, is_error)` where the output is wrapped in a
//! `<label_output>` envelope; hard failures bubble up as errors and are
//! rendered by the turn executor.
//!
//! Orchestrator and subagent handlers are the same type in two trims: the
//! orchestrator variant carries the coordination hub and an LLM client so it
//! can create tasks and launch subagents; the subagent variant has neither,
//! and the corresponding actions fail with a tool error instead.

use std::error::Error;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use crate::crewmind::actions::{
    Action, AddContextAction, AddNoteAction, BashAction, BatchTodoAction, EditAction,
    FileMetadataAction, FinishAction, GlobAction, GrepAction, LaunchSubagentAction, LsAction,
    MultiEditAction, ReadAction, TaskCreateAction, TodoOpKind, WriteAction,
    WriteTempScriptAction,
};
use crate::crewmind::command_executor::CommandExecutor;
use crate::crewmind::file_manager::FileManager;
use crate::crewmind::history::{SubagentTrajectories, SubagentTrajectory};
use crate::crewmind::hub::{OrchestratorHub, SubagentReport};
use crate::crewmind::llm::{LlmClient, LlmConfig};
use crate::crewmind::search_manager::SearchManager;
use crate::crewmind::state_managers::{ScratchpadManager, TodoManager, TodoStatus};
use crate::crewmind::subagent::{BootstrapContext, Subagent, SubagentTask};

/// Line-count window used when a bootstrap file is read into a subagent prompt.
const BOOTSTRAP_READ_LIMIT: u64 = 1000;

/// Wrap tool output in its `<label_output>` envelope.
pub fn format_tool_output(tool_name: &str, content: &str) -> String {
    format!("<{0}_output>\n{1}\n</{0}_output>", tool_name, content)
}

/// Truncate `content` for display in result echoes.
fn truncate_content(content: &str) -> String {
    const MAX_LENGTH: usize = 15;
    if content.chars().count() > MAX_LENGTH {
        let head: String = content.chars().take(MAX_LENGTH).collect();
        format!("{}...", head)
    } else {
        content.to_string()
    }
}

type HandlerResult = Result<(String, bool), Box<dyn Error + Send + Sync>>;

/// Executes parsed actions against the environment and shared state.
pub struct ActionHandler {
    executor: Arc<dyn CommandExecutor>,
    todo_manager: TodoManager,
    scratchpad_manager: ScratchpadManager,
    file_manager: FileManager,
    search_manager: SearchManager,
    /// Present only on the orchestrator's handler.
    hub: Option<Arc<Mutex<OrchestratorHub>>>,
    /// LLM access for spawned subagents; orchestrator only.
    llm_client: Option<Arc<dyn LlmClient>>,
    llm_config: Option<LlmConfig>,
    logging_dir: Option<PathBuf>,
    /// Trajectories collected from subagents launched during the current
    /// turn; drained by the turn executor.
    subagent_trajectories: SubagentTrajectories,
}

impl ActionHandler {
    /// Handler for a subagent: own state, shared executor, no hub.
    pub fn for_subagent(executor: Arc<dyn CommandExecutor>) -> Self {
        ActionHandler {
            file_manager: FileManager::new(executor.clone()),
            search_manager: SearchManager::new(executor.clone()),
            executor,
            todo_manager: TodoManager::new(),
            scratchpad_manager: ScratchpadManager::new(),
            hub: None,
            llm_client: None,
            llm_config: None,
            logging_dir: None,
            subagent_trajectories: SubagentTrajectories::new(),
        }
    }

    /// Handler for the orchestrator: hub plus LLM configuration so tasks can
    /// be created and delegated.
    pub fn for_orchestrator(
        executor: Arc<dyn CommandExecutor>,
        hub: Arc<Mutex<OrchestratorHub>>,
        llm_client: Arc<dyn LlmClient>,
        llm_config: LlmConfig,
        logging_dir: Option<PathBuf>,
    ) -> Self {
        ActionHandler {
            file_manager: FileManager::new(executor.clone()),
            search_manager: SearchManager::new(executor.clone()),
            executor,
            todo_manager: TodoManager::new(),
            scratchpad_manager: ScratchpadManager::new(),
            hub: Some(hub),
            llm_client: Some(llm_client),
            llm_config: Some(llm_config),
            logging_dir,
            subagent_trajectories: SubagentTrajectories::new(),
        }
    }

    /// Execute one action and return `(rendered_output, is_error)`.
    ///
    /// Boxed explicitly: this method recurses through
    /// `handle_launch_subagent` -> `Subagent::run` -> `TurnExecutor::execute`
    /// -> `handle_action`, and the compiler cannot prove `Send` for a
    /// self-referential `async fn` cycle like that. Boxing here breaks the
    /// cycle the same way `handle_launch_subagent` already boxes the
    /// subagent's run future.
    pub fn handle_action<'a>(
        &'a mut self,
        action: &'a Action,
    ) -> Pin<Box<dyn Future<Output = HandlerResult> + Send + 'a>> {
        Box::pin(async move {
            match action {
                Action::Bash(a) => self.handle_bash(a).await,
                Action::Finish(a) => self.handle_finish(a),
                Action::BatchTodo(a) => self.handle_batch_todo(a),
                Action::Read(a) => self.handle_read(a).await,
                Action::Write(a) => self.handle_write(a).await,
                Action::Edit(a) => self.handle_edit(a).await,
                Action::MultiEdit(a) => self.handle_multi_edit(a).await,
                Action::FileMetadata(a) => self.handle_file_metadata(a).await,
                Action::Grep(a) => self.handle_grep(a).await,
                Action::Glob(a) => self.handle_glob(a).await,
                Action::Ls(a) => self.handle_ls(a).await,
                Action::AddNote(a) => self.handle_add_note(a),
                Action::ViewAllNotes(_) => self.handle_view_all_notes(),
                Action::TaskCreate(a) => self.handle_task_create(a).await,
                Action::AddContext(a) => self.handle_add_context(a),
                Action::LaunchSubagent(a) => self.handle_launch_subagent(a).await,
                Action::Report(_) => self.handle_report(),
                Action::WriteTempScript(a) => self.handle_write_temp_script(a).await,
            }
        })
    }

    /// Hand over the trajectories collected this turn, clearing the store.
    pub fn take_subagent_trajectories(&mut self) -> SubagentTrajectories {
        std::mem::take(&mut self.subagent_trajectories)
    }

    pub fn todo_manager(&self) -> &TodoManager {
        &self.todo_manager
    }

    pub fn scratchpad_manager(&self) -> &ScratchpadManager {
        &self.scratchpad_manager
    }

    async fn handle_bash(&mut self, action: &BashAction) -> HandlerResult {
        if action.block {
            let (output, exit_code) = self
                .executor
                .execute(&action.cmd, action.timeout_secs)
                .await;
            Ok((format_tool_output("bash", &output), exit_code != 0))
        } else {
            self.executor.execute_background(&action.cmd).await;
            Ok((
                format_tool_output("bash", "Command started in background"),
                false,
            ))
        }
    }

    fn handle_finish(&mut self, action: &FinishAction) -> HandlerResult {
        let response = format!("Task marked as complete: {}", action.message);
        Ok((format_tool_output("finish", &response), false))
    }

    fn handle_batch_todo(&mut self, action: &BatchTodoAction) -> HandlerResult {
        let mut results = Vec::new();
        let mut has_error = false;
        let mut view_requested = action.view_all;

        for op in &action.operations {
            match op.kind {
                TodoOpKind::Add => {
                    let content = op.content.as_deref().unwrap_or("");
                    let task_id = self.todo_manager.add_task(content);
                    results.push(format!(
                        "Added todo [{}]: {}",
                        task_id,
                        truncate_content(content)
                    ));
                }
                TodoOpKind::Complete => {
                    let task_id = op.task_id.unwrap_or(0);
                    match self.todo_manager.get_task(task_id) {
                        None => {
                            results.push(format!("[ERROR] Task {} not found", task_id));
                            has_error = true;
                        }
                        Some(item) if item.status == TodoStatus::Completed => {
                            results.push(format!("Task {} is already completed", task_id));
                        }
                        Some(item) => {
                            let echo = truncate_content(&item.content);
                            self.todo_manager.complete_task(task_id);
                            results.push(format!("Completed task [{}]: {}", task_id, echo));
                        }
                    }
                }
                TodoOpKind::Delete => {
                    let task_id = op.task_id.unwrap_or(0);
                    match self.todo_manager.get_task(task_id) {
                        None => {
                            results.push(format!("[ERROR] Task {} not found", task_id));
                            has_error = true;
                        }
                        Some(item) => {
                            let echo = truncate_content(&item.content);
                            self.todo_manager.delete_task(task_id);
                            results.push(format!("Deleted task [{}]: {}", task_id, echo));
                        }
                    }
                }
                TodoOpKind::ViewAll => {
                    view_requested = true;
                }
            }
        }

        let mut response = results.join("\n");
        if view_requested {
            response.push_str("\n\n");
            response.push_str(&self.todo_manager.view_all());
        }

        Ok((format_tool_output("todo", &response), has_error))
    }

    fn handle_add_note(&mut self, action: &AddNoteAction) -> HandlerResult {
        if action.content.is_empty() {
            return Ok((
                format_tool_output("scratchpad", "[ERROR] Cannot add empty note"),
                true,
            ));
        }
        let note_idx = self.scratchpad_manager.add_note(&action.content);
        let response = format!("Added note {} to scratchpad", note_idx + 1);
        Ok((format_tool_output("scratchpad", &response), false))
    }

    fn handle_view_all_notes(&mut self) -> HandlerResult {
        Ok((
            format_tool_output("scratchpad", &self.scratchpad_manager.view_all()),
            false,
        ))
    }

    async fn handle_read(&mut self, action: &ReadAction) -> HandlerResult {
        let (content, is_error) = self
            .file_manager
            .read_file(&action.file_path, action.offset, action.limit)
            .await;
        Ok((format_tool_output("file", &content), is_error))
    }

    async fn handle_write(&mut self, action: &WriteAction) -> HandlerResult {
        let (content, is_error) = self
            .file_manager
            .write_file(&action.file_path, &action.content)
            .await;
        Ok((format_tool_output("file", &content), is_error))
    }

    async fn handle_edit(&mut self, action: &EditAction) -> HandlerResult {
        let (content, is_error) = self
            .file_manager
            .edit_file(
                &action.file_path,
                &action.old_string,
                &action.new_string,
                action.replace_all,
            )
            .await;
        Ok((format_tool_output("file", &content), is_error))
    }

    async fn handle_multi_edit(&mut self, action: &MultiEditAction) -> HandlerResult {
        let (content, is_error) = self
            .file_manager
            .multi_edit_file(&action.file_path, &action.edits)
            .await;
        Ok((format_tool_output("file", &content), is_error))
    }

    async fn handle_file_metadata(&mut self, action: &FileMetadataAction) -> HandlerResult {
        let (content, is_error) = self.file_manager.get_metadata(&action.file_paths).await;
        Ok((format_tool_output("file", &content), is_error))
    }

    async fn handle_write_temp_script(&mut self, action: &WriteTempScriptAction) -> HandlerResult {
        let (content, is_error) = self
            .file_manager
            .write_file(&action.file_path, &action.content)
            .await;
        Ok((format_tool_output("file", &content), is_error))
    }

    async fn handle_grep(&mut self, action: &GrepAction) -> HandlerResult {
        let (content, is_error) = self
            .search_manager
            .grep(
                &action.pattern,
                action.path.as_deref(),
                action.include.as_deref(),
            )
            .await;
        Ok((format_tool_output("search", &content), is_error))
    }

    async fn handle_glob(&mut self, action: &GlobAction) -> HandlerResult {
        let (content, is_error) = self
            .search_manager
            .glob(&action.pattern, action.path.as_deref())
            .await;
        Ok((format_tool_output("search", &content), is_error))
    }

    async fn handle_ls(&mut self, action: &LsAction) -> HandlerResult {
        let (content, is_error) = self.search_manager.ls(&action.path, &action.ignore).await;
        Ok((format_tool_output("search", &content), is_error))
    }

    async fn handle_task_create(&mut self, action: &TaskCreateAction) -> HandlerResult {
        let hub = match &self.hub {
            Some(hub) => hub.clone(),
            None => {
                return Ok((
                    format_tool_output(
                        "task",
                        "[ERROR] Task management is not available for this agent",
                    ),
                    true,
                ));
            }
        };

        let task_id = hub.lock().unwrap().create_task(
            action.agent_type,
            action.title.clone(),
            action.description.clone(),
            action.context_refs.clone(),
            action.context_bootstrap.clone(),
        );

        let mut response = format!("Created task {}: {}", task_id, action.title);

        if action.auto_launch {
            let launch = LaunchSubagentAction { task_id };
            let (launch_response, launch_error) = self.handle_launch_subagent(&launch).await?;
            response.push('\n');
            response.push_str(&launch_response);
            return Ok((format_tool_output("task", &response), launch_error));
        }

        Ok((format_tool_output("task", &response), false))
    }

    fn handle_add_context(&mut self, action: &AddContextAction) -> HandlerResult {
        let hub = match &self.hub {
            Some(hub) => hub.clone(),
            None => {
                return Ok((
                    format_tool_output(
                        "context",
                        "[ERROR] The context store is not available for this agent",
                    ),
                    true,
                ));
            }
        };

        let success = hub.lock().unwrap().add_context(
            action.id.clone(),
            action.content.clone(),
            action.reported_by.clone(),
            action.task_id.clone(),
        );

        let response = if success {
            format!("Added context '{}' to store", action.id)
        } else {
            format!("[WARNING] Context '{}' already exists in store", action.id)
        };

        Ok((format_tool_output("context", &response), !success))
    }

    async fn handle_launch_subagent(&mut self, action: &LaunchSubagentAction) -> HandlerResult {
        let hub = match &self.hub {
            Some(hub) => hub.clone(),
            None => {
                return Ok((
                    format_tool_output(
                        "subagent",
                        "[ERROR] Subagent launch is not available for this agent",
                    ),
                    true,
                ));
            }
        };
        let (llm_client, llm_config) = match (&self.llm_client, &self.llm_config) {
            (Some(client), Some(config)) => (client.clone(), config.clone()),
            _ => {
                return Ok((
                    format_tool_output(
                        "subagent",
                        "[ERROR] No LLM configuration available for subagents",
                    ),
                    true,
                ));
            }
        };

        // Resolve the task and its context references while holding the lock,
        // then release it for the (long) subagent run.
        let (task, ctx_store_ctxts) = {
            let hub_ref = hub.lock().unwrap();
            let task = match hub_ref.get_task(&action.task_id) {
                Some(task) => task.clone(),
                None => {
                    return Ok((
                        format_tool_output(
                            "subagent",
                            &format!("[ERROR] Task {} not found", action.task_id),
                        ),
                        true,
                    ));
                }
            };
            let contexts = hub_ref.get_contexts_for_task(&task.context_refs);
            (task, contexts)
        };

        let mut bootstrap_ctxts = Vec::new();
        for item in &task.context_bootstrap {
            let content = if item.path.ends_with('/') {
                let (listing, _) = self.search_manager.ls(&item.path, &[]).await;
                listing
            } else {
                let (content, _) = self
                    .file_manager
                    .read_file(&item.path, Some(0), Some(BOOTSTRAP_READ_LIMIT))
                    .await;
                content
            };
            bootstrap_ctxts.push(BootstrapContext {
                path: item.path.clone(),
                content,
                reason: item.reason.clone(),
            });
        }

        let subagent_task = SubagentTask {
            agent_type: task.agent_type,
            title: task.title.clone(),
            description: task.description.clone(),
            ctx_store_ctxts,
            bootstrap_ctxts,
        };

        let mut subagent = Subagent::new(
            subagent_task,
            self.executor.clone(),
            llm_client,
            llm_config,
        )
        .with_task_id(action.task_id.clone());
        if let Some(dir) = &self.logging_dir {
            subagent = subagent.with_logging_dir(dir.clone());
        }

        log::info!(
            "Launching {} subagent for task: {}",
            task.agent_type,
            task.title
        );

        // Boxed to erase the future type: the subagent's turn loop eventually
        // re-enters handle_action, which would otherwise make this future
        // infinitely recursive at the type level.
        let run: Pin<Box<dyn Future<Output = SubagentReport> + Send + '_>> =
            Box::pin(subagent.run());
        let report = run.await;

        self.subagent_trajectories.insert(
            action.task_id.clone(),
            SubagentTrajectory {
                agent_type: task.agent_type,
                title: task.title.clone(),
                trajectory: report.meta.trajectory.clone(),
                total_input_tokens: report.meta.total_input_tokens,
                total_output_tokens: report.meta.total_output_tokens,
            },
        );

        let result = hub
            .lock()
            .unwrap()
            .process_subagent_result(&action.task_id, &report);

        let mut response_lines = vec![
            format!("Subagent completed task {}", action.task_id),
            format!("Contexts stored: {}", result.context_ids_stored.join(", ")),
        ];
        if !result.comments.is_empty() {
            response_lines.push(format!("Comments: {}", result.comments));
        }

        Ok((
            format_tool_output("subagent", &response_lines.join("\n")),
            false,
        ))
    }

    /// The orchestrator acknowledges `report` actions without doing anything;
    /// for subagents the surrounding driver watches for the action itself.
    fn handle_report(&mut self) -> HandlerResult {
        Ok((
            format_tool_output("report", "Report submission successful"),
            false,
        ))
    }
}
