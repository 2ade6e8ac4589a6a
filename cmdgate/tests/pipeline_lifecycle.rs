//! End-to-end pipeline scenarios driven through the control plane.
//!
//! Backends are scripted and tools are recording fakes, so every scenario is
//! deterministic and never spawns a process or sleeps.

use std::rc::Rc;
use std::time::Duration;

use cmdgate::bootstrap::PipelineBuilder;
use cmdgate::core::capabilities::CapabilityRegistry;
use cmdgate::core::segregation::{OperationContext, OperationType};
use cmdgate::core::types::Step;
use cmdgate::error::{BackendError, PipelineError};
use cmdgate::io::config::PipelineConfig;
use cmdgate::recovery::FailureRecovery;
use cmdgate::router::{BackendOutput, Router, Strategy};
use cmdgate::step_executor::StepExecutor;
use cmdgate::test_support::{
    CallLog, FailingTool, RecordingSleeper, RecordingTool, ScriptedBackend, quiet_builder,
};
use cmdgate::tools::{ToolRegistry, object};
use serde_json::{Value, json};

const RESEARCH_PLAN: &str = r#"{"steps":[{"action":"research","payload":{"query":"rust"}}]}"#;

const THREE_STEP_PLAN: &str = r#"{"steps":[
    {"action":"research","payload":{"query":"q"}},
    {"action":"notebook_query","payload":{"topic":"t"}},
    {"action":"artifact_write","payload":{"files":{}}}
]}"#;

fn planner(reply: &str, log: &CallLog) -> Box<ScriptedBackend> {
    Box::new(ScriptedBackend::always("planner", reply, log))
}

fn execute(instructions: &str) -> Value {
    json!({"command": "EXECUTE", "conversation_id": "conv-1", "instructions": instructions})
}

/// Single research step with a stub tool: one step total, one executed, result keyed by action.
#[test]
fn research_plan_runs_single_step() {
    let log = CallLog::default();
    let sleeper = RecordingSleeper::default();
    let research = RecordingTool::new("research", json!({"summary": "rust is a language"}));
    let inputs = research.inputs();
    let pipeline = quiet_builder(&sleeper)
        .backend("planner", planner(RESEARCH_PLAN, &log))
        .tool(Box::new(research))
        .build()
        .expect("build");

    let ctx = pipeline
        .control_plane
        .handle(&execute("research rust"))
        .expect("execute");

    assert_eq!(ctx.conversation_id(), "conv-1");
    assert_eq!(ctx.steps_total(), 1);
    assert_eq!(ctx.steps_executed(), 1);
    assert_eq!(ctx.result("research"), Some(&json!({"summary": "rust is a language"})));

    let inputs = inputs.borrow();
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0]["query"], "rust");
    assert_eq!(inputs[0]["conversation_id"], "conv-1");
    assert_eq!(inputs[0]["context"]["steps_executed"], 0);
    assert!(sleeper.delays().is_empty());
}

#[test]
fn rejected_commands_never_reach_a_backend() {
    let log = CallLog::default();
    let sleeper = RecordingSleeper::default();
    let pipeline = quiet_builder(&sleeper)
        .backend("planner", planner(RESEARCH_PLAN, &log))
        .build()
        .expect("build");

    let err = pipeline
        .control_plane
        .handle(&json!({"command": "DELETE", "instructions": "drop everything"}))
        .unwrap_err();
    assert_eq!(err.kind(), "CommandError");
    assert!(err.to_string().contains("DELETE"));

    let err = pipeline
        .control_plane
        .handle(&json!({"command": "EXECUTE", "instructions": ""}))
        .unwrap_err();
    assert_eq!(err.kind(), "CommandError");
    assert_eq!(err.to_string(), "no instructions provided");

    assert!(log.is_empty());
    assert!(sleeper.delays().is_empty());
}

#[test]
fn fallback_stops_at_first_successful_backend() {
    let log = CallLog::default();
    let mut router = Router::new(Strategy::Fallback);
    router.register("a", Box::new(ScriptedBackend::failing("a", &log)));
    router.register("b", Box::new(ScriptedBackend::failing("b", &log)));
    router.register("c", Box::new(ScriptedBackend::always("c", "from c", &log)));
    router.register("d", Box::new(ScriptedBackend::always("d", "from d", &log)));

    let outputs = router.generate_default("prompt", 0.7);

    assert_eq!(log.calls(), vec!["a", "b", "c"]);
    assert_eq!(outputs.names(), vec!["a", "b", "c"]);
    assert!(outputs.get("a").is_some_and(BackendOutput::is_error));
    assert!(outputs.get("b").is_some_and(BackendOutput::is_error));
    assert_eq!(outputs.get("c").and_then(BackendOutput::text), Some("from c"));
    assert!(outputs.get("d").is_none());
}

#[test]
fn consensus_queries_at_most_three_quality_backends() {
    let log = CallLog::default();
    let mut router = Router::new(Strategy::Consensus);
    for name in ["cohere", "mistral", "gemini", "openai", "claude"] {
        router.register(name, Box::new(ScriptedBackend::always(name, name, &log)));
    }

    let outputs = router.generate_default("prompt", 0.7);

    assert_eq!(outputs.len(), 3);
    assert_eq!(log.calls(), vec!["claude", "openai", "gemini"]);
}

/// An invalid plan on attempt 1 is replanned; attempt 2 succeeds after one fixed delay.
#[test]
fn invalid_plan_is_retried_until_valid() {
    let log = CallLog::default();
    let sleeper = RecordingSleeper::default();
    let backend = ScriptedBackend::new(
        "planner",
        vec![Ok("I cannot help with that.".to_string()), Ok(RESEARCH_PLAN.to_string())],
        &log,
    );
    let pipeline = quiet_builder(&sleeper)
        .backend("planner", Box::new(backend))
        .tool(Box::new(RecordingTool::new("research", json!({"ok": true}))))
        .build()
        .expect("build");

    let ctx = pipeline
        .control_plane
        .handle(&execute("research rust"))
        .expect("execute");

    assert!(ctx.is_complete());
    assert_eq!(log.len(), 2);
    assert_eq!(sleeper.delays(), vec![Duration::from_secs(1)]);
}

#[test]
fn persistent_planning_failure_exhausts_three_attempts() {
    let log = CallLog::default();
    let sleeper = RecordingSleeper::default();
    let pipeline = quiet_builder(&sleeper)
        .backend("planner", planner(r#"{"steps":[]}"#, &log))
        .build()
        .expect("build");

    let err = pipeline
        .control_plane
        .handle(&execute("anything"))
        .unwrap_err();

    let PipelineError::Recovery(recovery) = &err else {
        panic!("expected recovery error, got {err:?}");
    };
    assert_eq!(recovery.attempts, 3);
    assert!(recovery.description.starts_with("instruction execution: anything"));
    assert_eq!(recovery.log.matches("PlanningError: no valid plan").count(), 3);
    assert!(recovery.log.contains("\nAttempt 3: PlanningError"));
    assert!(recovery.log.starts_with("Attempt 1: PlanningError: no valid plan"));
    assert_eq!(err.root_cause().kind(), "PlanningError");
    assert_eq!(log.len(), 3);
    assert_eq!(sleeper.delays(), vec![Duration::from_secs(1); 2]);
}

#[test]
fn no_backends_fails_every_attempt_with_planning_error() {
    let sleeper = RecordingSleeper::default();
    let pipeline = quiet_builder(&sleeper).build().expect("build");

    let err = pipeline
        .control_plane
        .handle(&execute("anything"))
        .unwrap_err();
    assert_eq!(err.kind(), "RecoveryError");
    assert!(err.root_cause().to_string().contains("no backends available"));
}

#[test]
fn backoff_delays_grow_and_cap() {
    let sleeper = RecordingSleeper::default();
    let recovery =
        FailureRecovery::with_sleeper(Duration::from_secs(1), Box::new(sleeper.clone()));
    let mut calls = 0;

    let result: Result<(), PipelineError> = recovery.retry_with_backoff(
        || {
            calls += 1;
            Err(cmdgate::error::PlanningError("still bad".to_string()).into())
        },
        "plan",
        Duration::from_millis(200),
        Duration::from_millis(300),
    );

    assert!(result.is_err());
    assert_eq!(calls, 3);
    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_millis(200), Duration::from_millis(300)]
    );
}

/// Step 1 of 3 fails: step 0 ran, step 2 never ran.
#[test]
fn failing_middle_step_aborts_attempt() {
    let log = CallLog::default();
    let sleeper = RecordingSleeper::default();
    let research = RecordingTool::new("research", json!({"hits": 1}));
    let writer = RecordingTool::new("artifact_write", json!({"success": true}));
    let research_inputs = research.inputs();
    let writer_inputs = writer.inputs();
    let pipeline = quiet_builder(&sleeper)
        .backend("planner", planner(THREE_STEP_PLAN, &log))
        .tool(Box::new(research))
        .tool(Box::new(FailingTool::new("notebook_query", "cache offline")))
        .tool(Box::new(writer))
        .build()
        .expect("build");

    let err = pipeline
        .control_plane
        .handle_with_trace(&execute("three steps"))
        .unwrap_err();

    let PipelineError::Execution(exec) = &err else {
        panic!("expected execution error, got {err:?}");
    };
    assert_eq!(exec.index, 1);
    assert_eq!(exec.action, "notebook_query");
    assert_eq!(exec.steps_executed, 1);
    assert_eq!(
        exec.message,
        "step 1 (notebook_query) failed: cache offline"
    );
    assert_eq!(research_inputs.borrow().len(), 1);
    assert!(writer_inputs.borrow().is_empty());
    assert!(sleeper.delays().is_empty());
}

#[test]
fn execution_failure_is_retried_from_planning() {
    let log = CallLog::default();
    let sleeper = RecordingSleeper::default();
    let pipeline = quiet_builder(&sleeper)
        .backend("planner", planner(RESEARCH_PLAN, &log))
        .tool(Box::new(FailingTool::new("research", "search quota exceeded")))
        .build()
        .expect("build");

    let err = pipeline
        .control_plane
        .handle(&execute("research rust"))
        .unwrap_err();

    assert_eq!(err.kind(), "RecoveryError");
    assert_eq!(err.root_cause().kind(), "ExecutionError");
    assert_eq!(log.len(), 3);
}

#[test]
fn disabled_capability_blocks_step_before_tool_runs() {
    let log = CallLog::default();
    let sleeper = RecordingSleeper::default();
    let mut cfg = PipelineConfig::default();
    cfg.capabilities.insert("research".to_string(), false);
    let research = RecordingTool::new("research", json!({}));
    let inputs = research.inputs();
    let pipeline = PipelineBuilder::new(cfg)
        .sleeper(Box::new(sleeper.clone()))
        .backend("planner", planner(RESEARCH_PLAN, &log))
        .tool(Box::new(research))
        .build()
        .expect("build");

    let err = pipeline
        .control_plane
        .handle_with_trace(&execute("research rust"))
        .unwrap_err();

    assert_eq!(err.kind(), "ExecutionError");
    assert_eq!(
        err.to_string(),
        "step 0 (research): capability check failed - capability not available: research"
    );
    assert!(inputs.borrow().is_empty());
}

#[test]
fn unknown_action_fails_capability_check() {
    let mut tools = ToolRegistry::new();
    tools.register(Box::new(RecordingTool::new("research", json!({}))));
    let capabilities = Rc::new(CapabilityRegistry::with_defaults());
    let executor = StepExecutor::new(capabilities, Rc::new(tools));

    let err = executor
        .execute("c", &[Step::new("sabotage", object(json!({})))])
        .unwrap_err();

    assert_eq!(err.index, 0);
    assert_eq!(err.steps_executed, 0);
    assert!(err.message.contains("capability not available: sabotage"));
}

#[test]
fn planner_rejects_plans_with_unknown_actions() {
    let log = CallLog::default();
    let sleeper = RecordingSleeper::default();
    let pipeline = quiet_builder(&sleeper)
        .backend(
            "planner",
            Box::new(ScriptedBackend::always(
                "planner",
                r#"{"steps":[{"action":"sabotage"}]}"#,
                &log,
            )),
        )
        .build()
        .expect("build");

    let err = pipeline
        .control_plane
        .handle_with_trace(&execute("break things"))
        .unwrap_err();
    assert_eq!(err.kind(), "PlanningError");
    assert!(err.to_string().contains("schema validation failed"));
}

#[test]
fn traced_execution_returns_plan() {
    let log = CallLog::default();
    let sleeper = RecordingSleeper::default();
    let pipeline = quiet_builder(&sleeper)
        .backend("planner", planner(RESEARCH_PLAN, &log))
        .tool(Box::new(RecordingTool::new("research", json!({"n": 1}))))
        .build()
        .expect("build");

    let trace = pipeline
        .control_plane
        .handle_with_trace(&execute("research rust"))
        .expect("trace");

    assert_eq!(trace.plan.len(), 1);
    assert_eq!(trace.plan[0].action, "research");
    assert_eq!(trace.results.step_record(0).expect("record")["result"], json!({"n": 1}));
}

#[test]
fn commercial_payment_rejects_ai() {
    let sleeper = RecordingSleeper::default();
    let pipeline = quiet_builder(&sleeper).build().expect("build");

    let err = pipeline
        .enforcer
        .validate_in_context(
            OperationType::CommercialPayment,
            &OperationContext {
                uses_ai: true,
                inputs_validated: true,
                ..OperationContext::default()
            },
            None,
        )
        .unwrap_err();
    assert!(err.to_string().contains("cannot use AI"));
    assert_eq!(PipelineError::from(err).kind(), "SegregationViolation");

    pipeline
        .enforcer
        .validate_in_context(
            OperationType::CommercialPayment,
            &OperationContext {
                inputs_validated: true,
                ..OperationContext::default()
            },
            Some("payment_handling"),
        )
        .expect("deterministic payment allowed");
}

#[test]
fn backend_errors_are_reported_per_backend() {
    let log = CallLog::default();
    let sleeper = RecordingSleeper::default();
    let timed_out = ScriptedBackend::new(
        "slow",
        vec![Err(BackendError::TimedOut(Duration::from_secs(5)))],
        &log,
    );
    let pipeline = quiet_builder(&sleeper)
        .backend("slow", Box::new(timed_out))
        .backend(
            "chatty",
            Box::new(ScriptedBackend::always("chatty", "no json here", &log)),
        )
        .build()
        .expect("build");

    let err = pipeline
        .control_plane
        .handle_with_trace(&execute("x"))
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("- slow: backend error: backend timed out after 5s"));
    assert!(message.contains("- chatty: "));
    assert_eq!(log.calls(), vec!["slow", "chatty"]);
}
