//! CLI tests for the `cmdgate` binary.
//!
//! Each test runs in a fresh temp directory so the default
//! `.cmdgate/config.toml` lookup and relative cache paths stay isolated.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use cmdgate::exit_codes;
use serde_json::Value;

fn cmdgate(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cmdgate"))
        .current_dir(dir)
        .env_remove("CMDGATE_CONFIG")
        .env_remove("CMDGATE_STRATEGY")
        .env("RUST_LOG", "off")
        .args(args)
        .output()
        .expect("spawn cmdgate")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_json(output: &Output) -> Value {
    let text = String::from_utf8_lossy(&output.stderr);
    let line = text.lines().last().expect("stderr line");
    serde_json::from_str(line).expect("stderr json")
}

#[test]
fn segregation_check_exit_codes() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = cmdgate(
        temp.path(),
        &["segregation", "check", "commercial_payment", "--uses-ai", "--inputs-validated"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::VIOLATION));
    let err = stderr_json(&output);
    assert_eq!(err["type"], "SegregationViolation");
    assert!(err["error"].as_str().expect("message").contains("cannot use AI"));

    let output = cmdgate(
        temp.path(),
        &["segregation", "check", "commercial_payment", "--inputs-validated"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let allowed: Value = serde_json::from_str(&stdout(&output)).expect("json");
    assert_eq!(allowed["allowed"], true);
    assert_eq!(allowed["operation"], "commercial_payment");

    let output = cmdgate(temp.path(), &["segregation", "check", "launch_rockets"]);
    assert_eq!(output.status.code(), Some(exit_codes::ERROR));
}

#[test]
fn prohibited_context_is_a_violation() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = cmdgate(
        temp.path(),
        &[
            "segregation",
            "check",
            "ai_analysis",
            "--uses-ai",
            "--follows-laws",
            "--context",
            "refund_processing",
        ],
    );
    assert_eq!(output.status.code(), Some(exit_codes::VIOLATION));

    let output = cmdgate(
        temp.path(),
        &[
            "segregation",
            "check",
            "ai_content_generation",
            "--uses-ai",
            "--follows-laws",
            "--context",
            "marketing_content",
        ],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let verdict: Value = serde_json::from_str(&stdout(&output)).expect("json");
    assert_eq!(verdict["context"], "marketing_content");
    assert_eq!(verdict["context_ai_allowed"], true);
}

#[test]
fn capabilities_and_tools_are_listed() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = cmdgate(temp.path(), &["capabilities"]);
    assert!(output.status.success());
    let caps: Vec<String> = stdout(&output).lines().map(str::to_string).collect();
    assert_eq!(caps.len(), 11);
    assert!(caps.contains(&"research".to_string()));
    assert!(caps.windows(2).all(|pair| pair[0] <= pair[1]));

    let output = cmdgate(temp.path(), &["tools"]);
    assert!(output.status.success());
    assert!(stdout(&output).lines().any(|line| line == "code_generate"));
}

#[test]
fn run_without_backends_fails_after_retries() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = cmdgate(temp.path(), &["run", "do something"]);
    assert_eq!(output.status.code(), Some(exit_codes::ERROR));
    let err = stderr_json(&output);
    assert_eq!(err["type"], "RecoveryError");
}

#[test]
fn run_rejects_blank_instruction() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = cmdgate(temp.path(), &["run", "   "]);
    assert_eq!(output.status.code(), Some(exit_codes::REJECTED));
    assert_eq!(stderr_json(&output)["type"], "CommandError");
}

#[cfg(unix)]
#[test]
fn run_executes_plan_from_command_backend() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config_dir = temp.path().join(".cmdgate");
    fs::create_dir_all(&config_dir).expect("config dir");
    fs::write(
        config_dir.join("config.toml"),
        r#"
[[backends]]
name = "scripted"
command = ['sh', '-c', '''cat >/dev/null; echo '{"steps":[{"action":"notebook_query","payload":{"topic":"rust"}}]}' ''']
"#,
    )
    .expect("write config");

    let output = cmdgate(temp.path(), &["cache", "store", "rust", r#"{"kind":"language"}"#]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let output = cmdgate(temp.path(), &["run", "look up rust", "--conversation-id", "cli-1"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let ctx: Value = serde_json::from_str(&stdout(&output)).expect("json");
    assert_eq!(ctx["conversation_id"], "cli-1");
    assert_eq!(ctx["steps_total"], 1);
    assert_eq!(ctx["steps_executed"], 1);
    assert_eq!(ctx["notebook_query"]["found"], true);
    assert_eq!(ctx["notebook_query"]["data"]["kind"], "language");

    let output = cmdgate(temp.path(), &["run", "look up rust", "--trace"]);
    assert!(output.status.success());
    let trace: Value = serde_json::from_str(&stdout(&output)).expect("json");
    assert_eq!(trace["plan"][0]["action"], "notebook_query");
    assert_eq!(trace["results"]["steps_executed"], 1);

    let output = cmdgate(temp.path(), &["backends"]);
    assert_eq!(stdout(&output).trim(), "scripted");
}

#[test]
fn config_init_then_show() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = cmdgate(temp.path(), &["config", "init"]);
    assert!(output.status.success());
    assert!(temp.path().join(".cmdgate/config.toml").is_file());

    let output = cmdgate(temp.path(), &["config", "init"]);
    assert_eq!(output.status.code(), Some(exit_codes::ERROR));

    let output = cmdgate(temp.path(), &["config", "init", "--force"]);
    assert!(output.status.success());

    let output = cmdgate(temp.path(), &["config", "show"]);
    assert!(output.status.success());
    let shown = stdout(&output);
    assert!(shown.contains("strategy = \"fallback\""));
    assert!(shown.contains("max_steps = 20"));
}

#[test]
fn explicit_config_flag_overrides_default_path() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("custom.toml");
    fs::write(&path, "[router]\nstrategy = \"smartest\"\n").expect("write");

    let output = cmdgate(
        temp.path(),
        &["--config", path.to_str().expect("utf8 path"), "config", "show"],
    );
    assert!(output.status.success());
    assert!(stdout(&output).contains("strategy = \"smartest\""));
}
