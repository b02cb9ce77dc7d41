//! Parser for tagged action blocks in LLM replies.
//!
//! A reply is free-form text interleaved with top-level blocks of the form
//! `<name>…</name>` whose body is a YAML document.  The parser extracts the
//! blocks in document order, decodes each into its typed [`Action`] variant,
//! and accumulates per-block errors without ever letting one malformed block
//! abort its siblings.  Reasoning tags (`think`, `reasoning`, `plan_md`) are
//! skipped entirely and do not count as an action attempt.

use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_yaml::Value;

use crate::crewmind::actions::{
    Action, AddContextAction, AddNoteAction, BashAction, BatchTodoAction, EditAction,
    FileMetadataAction, FinishAction, GlobAction, GrepAction, LaunchSubagentAction, LsAction,
    MultiEditAction, ReadAction, ReportAction, TaskCreateAction, ViewAllNotesAction,
    WriteAction, WriteTempScriptAction,
};

lazy_static! {
    /// Opening tag anchored at (possibly indented) line start.
    static ref OPEN_TAG: Regex = Regex::new(r"(?m)^\s*<(\w+)>").unwrap();
}

/// Tags that carry reasoning rather than actions.
const IGNORED_TAGS: [&str; 3] = ["think", "reasoning", "plan_md"];

/// Result of parsing one LLM reply.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    /// Successfully decoded actions, in document order.
    pub actions: Vec<Action>,
    /// One entry per malformed block; never aborts siblings.
    pub errors: Vec<String>,
    /// True when at least one non-ignored tag was present, well formed or not.
    pub found_action_attempt: bool,
}

/// Stateless parser for agent replies.
#[derive(Debug, Default)]
pub struct ActionParser;

impl ActionParser {
    pub fn new() -> Self {
        ActionParser
    }

    /// Parse a raw LLM reply into actions and per-block errors.
    ///
    /// Repeated calls on the same input produce identical results; the parser
    /// keeps no state between replies.
    pub fn parse_response(&self, response: &str) -> ParseOutcome {
        let mut outcome = ParseOutcome::default();

        for (tag, body) in extract_tag_blocks(response) {
            if IGNORED_TAGS.contains(&tag.to_lowercase().as_str()) {
                log::debug!("Skipping {} tag (not an action)", tag);
                continue;
            }

            outcome.found_action_attempt = true;

            let value: Value = match serde_yaml::from_str(body.trim()) {
                Ok(v) => v,
                Err(e) => {
                    outcome.errors.push(format!("[{}] YAML error: {}", tag, e));
                    continue;
                }
            };

            match resolve_action(&tag, value) {
                Ok(action) => outcome.actions.push(action),
                Err(msg) => outcome.errors.push(msg),
            }
        }

        outcome
    }
}

/// Extract non-nested top-level `<name>…</name>` blocks in document order.
///
/// Opening tags are matched with a line-anchored regex; the block ends at the
/// first matching closing tag.  An opening tag with no closing counterpart is
/// skipped and scanning resumes right after it.
fn extract_tag_blocks(text: &str) -> Vec<(String, String)> {
    let mut blocks = Vec::new();
    let mut pos = 0;

    while let Some(caps) = OPEN_TAG.captures_at(text, pos) {
        let open = caps.get(0).expect("match has a full capture");
        let name = &caps[1];
        let body_start = open.end();
        let close = format!("</{}>", name);

        match text[body_start..].find(&close) {
            Some(rel) => {
                let body = &text[body_start..body_start + rel];
                blocks.push((name.to_string(), body.to_string()));
                pos = body_start + rel + close.len();
            }
            None => {
                pos = body_start;
            }
        }
    }

    blocks
}

/// Decode `value` into `T`, formatting failures against the enclosing tag.
fn decode<T: DeserializeOwned>(tag: &str, value: Value) -> Result<T, String> {
    serde_yaml::from_value(value).map_err(|e| format!("[{}] Validation error: {}", tag, e))
}

/// Attach the tag name to a record-level validation failure.
fn invalid(tag: &str, err: String) -> String {
    format!("[{}] Validation error: {}", tag, err)
}

/// Pull the `action` discriminator out of a multiplexed tag body, returning
/// the discriminator and the remaining mapping.
fn split_discriminator(tag: &str, value: Value) -> Result<(String, Value), String> {
    let mut mapping = match value {
        Value::Mapping(m) => m,
        _ => return Err(format!("[{}] Missing 'action' discriminator", tag)),
    };
    match mapping.remove("action") {
        Some(Value::String(discriminator)) => Ok((discriminator, Value::Mapping(mapping))),
        _ => Err(format!("[{}] Missing 'action' discriminator", tag)),
    }
}

/// Resolve a tag name plus decoded YAML payload into an [`Action`].
fn resolve_action(tag: &str, value: Value) -> Result<Action, String> {
    match tag {
        "bash" => {
            let action: BashAction = decode(tag, value)?;
            action.validate().map_err(|e| invalid(tag, e))?;
            Ok(Action::Bash(action))
        }
        "finish" => {
            let action: FinishAction = decode(tag, value)?;
            Ok(Action::Finish(action))
        }
        "todo" => {
            let action: BatchTodoAction = decode(tag, value)?;
            action.validate().map_err(|e| invalid(tag, e))?;
            Ok(Action::BatchTodo(action))
        }
        "task_create" => {
            let action: TaskCreateAction = decode(tag, value)?;
            action.validate().map_err(|e| invalid(tag, e))?;
            Ok(Action::TaskCreate(action))
        }
        "add_context" => {
            let action: AddContextAction = decode(tag, value)?;
            action.validate().map_err(|e| invalid(tag, e))?;
            Ok(Action::AddContext(action))
        }
        "launch_subagent" => {
            let action: LaunchSubagentAction = decode(tag, value)?;
            action.validate().map_err(|e| invalid(tag, e))?;
            Ok(Action::LaunchSubagent(action))
        }
        "report" => {
            let action: ReportAction = decode(tag, value)?;
            Ok(Action::Report(action))
        }
        "write_temp_script" => {
            let action: WriteTempScriptAction = decode(tag, value)?;
            action.validate().map_err(|e| invalid(tag, e))?;
            Ok(Action::WriteTempScript(action))
        }
        "file" => {
            let (discriminator, rest) = split_discriminator(tag, value)?;
            match discriminator.as_str() {
                "read" => {
                    let action: ReadAction = decode(tag, rest)?;
                    action.validate().map_err(|e| invalid(tag, e))?;
                    Ok(Action::Read(action))
                }
                "write" => {
                    let action: WriteAction = decode(tag, rest)?;
                    action.validate().map_err(|e| invalid(tag, e))?;
                    Ok(Action::Write(action))
                }
                "edit" => {
                    let action: EditAction = decode(tag, rest)?;
                    action.validate().map_err(|e| invalid(tag, e))?;
                    Ok(Action::Edit(action))
                }
                "multi_edit" => {
                    let action: MultiEditAction = decode(tag, rest)?;
                    action.validate().map_err(|e| invalid(tag, e))?;
                    Ok(Action::MultiEdit(action))
                }
                "metadata" => {
                    let action: FileMetadataAction = decode(tag, rest)?;
                    action.validate().map_err(|e| invalid(tag, e))?;
                    Ok(Action::FileMetadata(action))
                }
                other => Err(format!("[file] Unknown file action: {}", other)),
            }
        }
        "search" => {
            let (discriminator, rest) = split_discriminator(tag, value)?;
            match discriminator.as_str() {
                "grep" => {
                    let action: GrepAction = decode(tag, rest)?;
                    action.validate().map_err(|e| invalid(tag, e))?;
                    Ok(Action::Grep(action))
                }
                "glob" => {
                    let action: GlobAction = decode(tag, rest)?;
                    action.validate().map_err(|e| invalid(tag, e))?;
                    Ok(Action::Glob(action))
                }
                "ls" => {
                    let action: LsAction = decode(tag, rest)?;
                    action.validate().map_err(|e| invalid(tag, e))?;
                    Ok(Action::Ls(action))
                }
                other => Err(format!("[search] Unknown search action: {}", other)),
            }
        }
        "scratchpad" => {
            let (discriminator, rest) = split_discriminator(tag, value)?;
            match discriminator.as_str() {
                "add_note" => {
                    // Only the note text survives; any other fields are dropped.
                    let content = match &rest {
                        Value::Mapping(m) => m
                            .get("content")
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string(),
                        _ => String::new(),
                    };
                    let action = AddNoteAction { content };
                    action.validate().map_err(|e| invalid(tag, e))?;
                    Ok(Action::AddNote(action))
                }
                "view_all_notes" => Ok(Action::ViewAllNotes(ViewAllNotesAction {})),
                other => Err(format!("[scratchpad] Unknown scratchpad action: {}", other)),
            }
        }
        other => Err(format!("Unknown action type: {}", other)),
    }
}
