use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use crewmind::crewmind::handlers::ActionHandler;
use crewmind::crewmind::parser::ActionParser;
use crewmind::crewmind::turn_executor::TurnExecutor;
use crewmind::{Action, LlmClient, LlmConfig, LlmError, LocalExecutor, Message, OrchestratorHub};

struct MockClient;

#[async_trait]
impl LlmClient for MockClient {
    async fn complete(
        &self,
        _messages: &[Message],
        _config: &LlmConfig,
    ) -> Result<String, LlmError> {
        Ok(String::new())
    }
}

fn subagent_executor(dir: &std::path::Path) -> TurnExecutor {
    let executor = Arc::new(LocalExecutor::new().with_working_dir(dir.to_path_buf()));
    TurnExecutor::new(ActionParser::new(), ActionHandler::for_subagent(executor))
}

fn orchestrator_executor(
    dir: &std::path::Path,
) -> (TurnExecutor, Arc<Mutex<OrchestratorHub>>) {
    let executor = Arc::new(LocalExecutor::new().with_working_dir(dir.to_path_buf()));
    let hub = Arc::new(Mutex::new(OrchestratorHub::new()));
    let handler = ActionHandler::for_orchestrator(
        executor,
        hub.clone(),
        Arc::new(MockClient),
        LlmConfig::new("mock/model"),
        None,
    );
    (TurnExecutor::new(ActionParser::new(), handler), hub)
}

#[tokio::test]
async fn bash_then_finish_single_shot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut executor = subagent_executor(dir.path());

    let reply = "<bash>cmd: \"echo hi\"</bash>\n<finish>message: \"ok\"</finish>";
    let result = executor.execute(reply).await;

    assert_eq!(result.actions_executed.len(), 2);
    assert!(matches!(result.actions_executed[0], Action::Bash(_)));
    assert!(matches!(result.actions_executed[1], Action::Finish(_)));
    assert_eq!(result.env_responses.len(), 2);
    assert!(result.env_responses[0].starts_with("<bash_output>"));
    assert!(result.env_responses[0].contains("hi"));
    assert!(result.done);
    assert_eq!(result.finish_message.as_deref(), Some("ok"));
    assert!(!result.has_error);
}

#[tokio::test]
async fn finish_stops_iteration() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut executor = subagent_executor(dir.path());

    let reply = "<finish>message: \"early\"</finish>\n<bash>cmd: \"echo never\"</bash>";
    let result = executor.execute(reply).await;

    // The bash action after the finish never runs.
    assert_eq!(result.actions_executed.len(), 1);
    assert!(result.done);
    assert_eq!(result.finish_message.as_deref(), Some("early"));
}

#[tokio::test]
async fn no_attempt_terminates_the_turn() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut executor = subagent_executor(dir.path());

    let result = executor.execute("Just prose, no tags at all.").await;
    assert!(result.done);
    assert!(result.has_error);
    assert!(result.actions_executed.is_empty());
    assert_eq!(result.env_responses, vec!["No actions were attempted.".to_string()]);
}

#[tokio::test]
async fn only_ignored_tags_also_terminates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut executor = subagent_executor(dir.path());

    let result = executor.execute("<think>\nplanning quietly\n</think>").await;
    assert!(result.done);
    assert!(result.has_error);
    assert!(result.actions_executed.is_empty());
}

#[tokio::test]
async fn parse_errors_accompany_valid_actions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut executor = subagent_executor(dir.path());

    let reply = "<file>\naction: bogus\nfile_path: \"/tmp/x\"\n</file>\n<bash>cmd: \"echo ok\"</bash>";
    let result = executor.execute(reply).await;

    assert!(result.has_error);
    assert!(!result.done);
    assert_eq!(result.actions_executed.len(), 1);
    assert_eq!(result.env_responses.len(), 2);
    assert!(result.env_responses[0].starts_with("[PARSE ERROR] [file]"));
    assert!(result.env_responses[1].contains("ok"));
}

#[tokio::test]
async fn only_parse_errors_returns_early_without_done() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut executor = subagent_executor(dir.path());

    let result = executor.execute("<unknown_tag>\nfield: 1\n</unknown_tag>").await;
    assert!(result.has_error);
    assert!(!result.done);
    assert!(result.actions_executed.is_empty());
    assert_eq!(result.env_responses.len(), 1);
    assert!(result.env_responses[0].starts_with("[PARSE ERROR]"));
}

#[tokio::test]
async fn duplicate_context_sets_error_but_keeps_first_value() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut executor, hub) = orchestrator_executor(dir.path());

    let reply = "<add_context>\nid: \"finding\"\ncontent: \"first value\"\nreported_by: \"orchestrator\"\n</add_context>\n\
                 <add_context>\nid: \"finding\"\ncontent: \"second value\"\nreported_by: \"orchestrator\"\n</add_context>";
    let result = executor.execute(reply).await;

    assert_eq!(result.actions_executed.len(), 2);
    assert!(result.has_error);
    assert!(result.env_responses[0].contains("Added context 'finding' to store"));
    assert!(result.env_responses[1].contains("[WARNING] Context 'finding' already exists in store"));

    let hub = hub.lock().unwrap();
    assert_eq!(hub.context_count(), 1);
    assert_eq!(
        hub.get_context("finding").map(|c| c.content.as_str()),
        Some("first value")
    );
}

#[tokio::test]
async fn tool_error_does_not_stop_later_actions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut executor = subagent_executor(dir.path());

    let reply = "<file>\naction: read\nfile_path: \"/missing/file.txt\"\n</file>\n<bash>cmd: \"echo after\"</bash>";
    let result = executor.execute(reply).await;

    assert!(result.has_error);
    assert_eq!(result.actions_executed.len(), 2);
    assert!(result.env_responses[0].contains("File not found"));
    assert!(result.env_responses[1].contains("after"));
}
