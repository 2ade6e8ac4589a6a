//! Plan and execution-context types shared by the planner and step executor.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Free-form structured payload passed to and returned from tools.
pub type Payload = Map<String, Value>;

/// Fixed vocabulary of step actions a plan may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Research,
    NotebookQuery,
    CodeGenerate,
    CodeValidate,
    RunTests,
    CodeExecute,
    ArtifactWrite,
    GithubWriteback,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::Research,
        Action::NotebookQuery,
        Action::CodeGenerate,
        Action::CodeValidate,
        Action::RunTests,
        Action::CodeExecute,
        Action::ArtifactWrite,
        Action::GithubWriteback,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Research => "research",
            Action::NotebookQuery => "notebook_query",
            Action::CodeGenerate => "code_generate",
            Action::CodeValidate => "code_validate",
            Action::RunTests => "run_tests",
            Action::CodeExecute => "code_execute",
            Action::ArtifactWrite => "artifact_write",
            Action::GithubWriteback => "github_writeback",
        }
    }

    /// One-line description rendered into the planning prompt.
    pub fn description(self) -> &'static str {
        match self {
            Action::Research => "Web research for gathering information",
            Action::NotebookQuery => "Query the knowledge cache",
            Action::CodeGenerate => "Generate code files based on specification",
            Action::CodeValidate => "Validate Python code syntax",
            Action::RunTests => "Execute test suite",
            Action::CodeExecute => "Run code in isolated sandbox",
            Action::ArtifactWrite => "Write output files to disk",
            Action::GithubWriteback => "Write files to GitHub repository",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == name)
    }
}

/// One planned unit of work.
///
/// `action` is kept as a string: the plan schema restricts planner output to
/// [`Action`], while the step executor gates arbitrary names through the
/// capability table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub action: String,
    #[serde(default)]
    pub payload: Payload,
}

impl Step {
    pub fn new(action: impl Into<String>, payload: Payload) -> Self {
        Self {
            action: action.into(),
            payload,
        }
    }
}

/// Accumulated results of one execution attempt.
///
/// Serializes as a flat map: `conversation_id`, `steps_total`,
/// `steps_executed`, then `step_{i}` records and last-result-per-action keys.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionContext {
    conversation_id: String,
    steps_total: usize,
    steps_executed: usize,
    entries: Map<String, Value>,
}

impl ExecutionContext {
    pub fn new(conversation_id: impl Into<String>, steps_total: usize) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            steps_total,
            steps_executed: 0,
            entries: Map::new(),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn steps_total(&self) -> usize {
        self.steps_total
    }

    pub fn steps_executed(&self) -> usize {
        self.steps_executed
    }

    pub fn is_complete(&self) -> bool {
        self.steps_executed == self.steps_total
    }

    /// Record a successful step.
    ///
    /// Overwrites the per-action key when the action repeats. The executed
    /// counter never passes `steps_total`.
    pub fn record(&mut self, index: usize, step: &Step, result: Payload) {
        let result = Value::Object(result);
        let mut record = Map::new();
        record.insert("action".to_string(), Value::String(step.action.clone()));
        record.insert("payload".to_string(), Value::Object(step.payload.clone()));
        record.insert("result".to_string(), result.clone());

        self.entries.insert(step.action.clone(), result);
        self.entries
            .insert(format!("step_{index}"), Value::Object(record));
        if self.steps_executed < self.steps_total {
            self.steps_executed += 1;
        }
    }

    /// Last result produced for `action`.
    pub fn result(&self, action: &str) -> Option<&Value> {
        self.entries.get(action)
    }

    /// `{action, payload, result}` record for step `index`.
    pub fn step_record(&self, index: usize) -> Option<&Value> {
        self.entries.get(&format!("step_{index}"))
    }

    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            "conversation_id".to_string(),
            Value::String(self.conversation_id.clone()),
        );
        map.insert("steps_total".to_string(), Value::from(self.steps_total));
        map.insert(
            "steps_executed".to_string(),
            Value::from(self.steps_executed),
        );
        for (key, value) in &self.entries {
            map.insert(key.clone(), value.clone());
        }
        map
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.to_map())
    }
}

impl Serialize for ExecutionContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

/// Plan plus the context it produced, returned by traced execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionTrace {
    pub plan: Vec<Step>,
    pub results: ExecutionContext,
}
