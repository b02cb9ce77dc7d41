//! Drive a single turn of the action pipeline by hand.
//!
//! Feeds a canned "LLM reply" through the parser, handlers, and turn
//! executor against a local temp directory, then prints each environment
//! response.  Run with:
//!
//! ```bash
//! RUST_LOG=debug cargo run --example local_tools_session
//! ```

use std::sync::Arc;

use crewmind::crewmind::handlers::ActionHandler;
use crewmind::crewmind::turn_executor::TurnExecutor;
use crewmind::{ActionParser, LocalExecutor};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let workdir = std::env::temp_dir().join(format!("crewmind_demo_{}", std::process::id()));
    std::fs::create_dir_all(&workdir).expect("create demo workdir");

    let executor = Arc::new(LocalExecutor::new().with_working_dir(workdir.clone()));
    let mut turn_executor =
        TurnExecutor::new(ActionParser::new(), ActionHandler::for_subagent(executor));

    let reply = r#"<todo>
operations:
  - action: add
    content: "Create the greeting file"
  - action: add
    content: "Verify its contents"
view_all: true
</todo>

<file>
action: write
file_path: "greeting.txt"
content: |
  hello from the action pipeline
</file>

<file>
action: read
file_path: "greeting.txt"
</file>

<search>
action: grep
pattern: "hello"
path: "."
</search>

<bash>
cmd: "wc -c greeting.txt"
</bash>

<finish>
message: "Demo turn complete."
</finish>"#;

    let result = turn_executor.execute(reply).await;

    for (i, response) in result.env_responses.iter().enumerate() {
        println!("--- env response {} ---\n{}\n", i + 1, response);
    }
    println!("done = {}, finish = {:?}", result.done, result.finish_message);

    let _ = std::fs::remove_dir_all(&workdir);
}
