use crewmind::crewmind::actions::{ContextBootstrapItem, ContextItem};
use crewmind::crewmind::hub::{SubagentMeta, SubagentReport, TaskStatus};
use crewmind::{AgentType, OrchestratorHub};

fn report_with(ids: &[&str]) -> SubagentReport {
    SubagentReport {
        contexts: ids
            .iter()
            .map(|id| ContextItem {
                id: id.to_string(),
                content: format!("content for {}", id),
            })
            .collect(),
        comments: "subagent comments".to_string(),
        meta: SubagentMeta::default(),
    }
}

#[test]
fn task_ids_match_the_expected_format() {
    let mut hub = OrchestratorHub::new();
    let mut previous = String::new();
    for i in 0..12 {
        let id = hub.create_task(
            AgentType::Coder,
            format!("task {}", i),
            "description",
            Vec::new(),
            Vec::new(),
        );
        assert!(id.starts_with("task_"), "bad id: {}", id);
        let digits = &id["task_".len()..];
        assert!(digits.len() >= 3, "bad padding: {}", id);
        assert!(digits.chars().all(|c| c.is_ascii_digit()), "bad id: {}", id);
        assert!(id > previous, "ids must increase: {} after {}", id, previous);
        previous = id;
    }
    assert_eq!(hub.get_task("task_001").map(|t| t.task_id.as_str()), Some("task_001"));
}

#[test]
fn completed_only_via_process_subagent_result() {
    let mut hub = OrchestratorHub::new();
    let task_id = hub.create_task(
        AgentType::Explorer,
        "Investigate",
        "Find the config file.",
        Vec::new(),
        Vec::new(),
    );

    assert_eq!(hub.get_task(&task_id).map(|t| t.status), Some(TaskStatus::Created));
    assert!(hub.get_task(&task_id).and_then(|t| t.completed_at.clone()).is_none());

    let result = hub.process_subagent_result(&task_id, &report_with(&["cfg_location"]));

    let task = hub.get_task(&task_id).expect("task exists");
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.completed_at.is_some());

    // Everything the result claims to have stored must actually be stored.
    for id in &result.context_ids_stored {
        assert!(hub.get_context(id).is_some(), "missing context {}", id);
    }
}

#[test]
fn context_store_is_append_only() {
    let mut hub = OrchestratorHub::new();
    assert!(hub.add_context("k", "first", "orchestrator", None));

    for attempt in 0..3 {
        assert!(
            !hub.add_context("k", format!("overwrite {}", attempt), "orchestrator", None),
            "duplicate insert must be rejected"
        );
        assert_eq!(hub.get_context("k").map(|c| c.content.as_str()), Some("first"));
    }
}

#[test]
fn duplicate_report_contexts_are_skipped() {
    let mut hub = OrchestratorHub::new();
    hub.add_context("shared", "already here", "orchestrator", None);

    let task_id = hub.create_task(
        AgentType::Explorer,
        "t",
        "d",
        Vec::new(),
        Vec::new(),
    );
    let result = hub.process_subagent_result(&task_id, &report_with(&["shared", "fresh"]));

    assert_eq!(result.context_ids_stored, vec!["fresh".to_string()]);
    assert_eq!(hub.get_context("shared").map(|c| c.content.as_str()), Some("already here"));
    assert_eq!(hub.context_count(), 2);
}

#[test]
fn renderings_cover_tasks_and_contexts() {
    let mut hub = OrchestratorHub::new();
    assert_eq!(hub.view_all_tasks(), "No tasks created yet.");
    assert_eq!(hub.view_context_store(), "Context store is empty.");

    let task_id = hub.create_task(
        AgentType::Coder,
        "Patch the server",
        "Bump the connection cap.",
        vec!["cfg_location".to_string()],
        vec![ContextBootstrapItem {
            path: "/workspace/src/".to_string(),
            reason: "source root".to_string(),
        }],
    );
    hub.add_context("cfg_location", "config is at /etc/app.toml", "orchestrator", None);

    let tasks_view = hub.view_all_tasks();
    assert!(tasks_view.contains("[task_001] Patch the server (coder)"));
    assert!(tasks_view.contains("Status: created"));
    assert!(tasks_view.contains("Context refs: cfg_location"));
    assert!(tasks_view.contains("Bootstrap: /workspace/src/"));

    let store_view = hub.view_context_store();
    assert!(store_view.contains("Id: [cfg_location]"));
    assert!(store_view.contains("Content: config is at /etc/app.toml"));

    hub.process_subagent_result(&task_id, &report_with(&["patch_notes"]));
    let tasks_view = hub.view_all_tasks();
    assert!(tasks_view.contains("Status: completed"));
    assert!(tasks_view.contains("Completed at:"));
    assert!(tasks_view.contains("patch_notes"));
}

#[test]
fn get_contexts_preserves_reference_order() {
    let mut hub = OrchestratorHub::new();
    hub.add_context("b", "second", "orchestrator", None);
    hub.add_context("a", "first", "orchestrator", None);

    let refs = vec!["a".to_string(), "missing".to_string(), "b".to_string()];
    let resolved = hub.get_contexts_for_task(&refs);
    assert_eq!(
        resolved,
        vec![
            ("a".to_string(), "first".to_string()),
            ("b".to_string(), "second".to_string()),
        ]
    );
}
