//! Test-only fakes: scripted backends, recording tools, recording sleeper.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde_json::Value;

use crate::bootstrap::PipelineBuilder;
use crate::core::types::Payload;
use crate::error::BackendError;
use crate::io::backend::GenerationBackend;
use crate::io::config::PipelineConfig;
use crate::recovery::Sleeper;
use crate::tools::{Tool, object};

#[derive(Debug, Clone)]
struct Call {
    backend: String,
    prompt: String,
    temperature: f32,
}

/// Shared, ordered log of backend calls across every scripted backend.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Rc<RefCell<Vec<Call>>>,
}

impl CallLog {
    fn record(&self, backend: &str, prompt: &str, temperature: f32) {
        self.calls.borrow_mut().push(Call {
            backend: backend.to_string(),
            prompt: prompt.to_string(),
            temperature,
        });
    }

    /// Backend names in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.backend.clone()).collect()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.prompt.clone()).collect()
    }

    pub fn temperatures(&self) -> Vec<f32> {
        self.calls.borrow().iter().map(|c| c.temperature).collect()
    }

    pub fn len(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.borrow().is_empty()
    }
}

/// Backend replaying scripted replies; the last reply repeats once the script runs out.
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    name: String,
    replies: RefCell<VecDeque<Result<String, BackendError>>>,
    last: RefCell<Result<String, BackendError>>,
    log: CallLog,
    refuse_connect: bool,
}

impl ScriptedBackend {
    pub fn new(name: &str, replies: Vec<Result<String, BackendError>>, log: &CallLog) -> Self {
        let last = replies
            .last()
            .cloned()
            .unwrap_or_else(|| Err(BackendError::Failed(format!("{name}: no scripted reply"))));
        Self {
            name: name.to_string(),
            replies: RefCell::new(replies.into()),
            last: RefCell::new(last),
            log: log.clone(),
            refuse_connect: false,
        }
    }

    pub fn always(name: &str, text: &str, log: &CallLog) -> Self {
        Self::new(name, vec![Ok(text.to_string())], log)
    }

    pub fn failing(name: &str, log: &CallLog) -> Self {
        Self::new(
            name,
            vec![Err(BackendError::Failed(format!("{name} unavailable")))],
            log,
        )
    }

    pub fn refuse_connect(mut self) -> Self {
        self.refuse_connect = true;
        self
    }
}

impl GenerationBackend for ScriptedBackend {
    fn connect(&mut self) -> Result<(), BackendError> {
        if self.refuse_connect {
            return Err(BackendError::Failed(format!("{} refused connection", self.name)));
        }
        Ok(())
    }

    fn generate(&self, prompt: &str, temperature: f32) -> Result<String, BackendError> {
        self.log.record(&self.name, prompt, temperature);
        match self.replies.borrow_mut().pop_front() {
            Some(reply) => {
                *self.last.borrow_mut() = reply.clone();
                reply
            }
            None => self.last.borrow().clone(),
        }
    }
}

/// Tool returning a fixed result and recording every input it receives.
#[derive(Debug)]
pub struct RecordingTool {
    name: String,
    result: Payload,
    inputs: Rc<RefCell<Vec<Payload>>>,
}

impl RecordingTool {
    pub fn new(name: &str, result: Value) -> Self {
        Self {
            name: name.to_string(),
            result: object(result),
            inputs: Rc::default(),
        }
    }

    /// Handle to the recorded inputs, usable after the tool is boxed.
    pub fn inputs(&self) -> Rc<RefCell<Vec<Payload>>> {
        Rc::clone(&self.inputs)
    }
}

impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, payload: &Payload) -> Result<Payload> {
        self.inputs.borrow_mut().push(payload.clone());
        Ok(self.result.clone())
    }
}

/// Tool that always errors.
#[derive(Debug)]
pub struct FailingTool {
    name: String,
    message: String,
}

impl FailingTool {
    pub fn new(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            message: message.to_string(),
        }
    }
}

impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, _payload: &Payload) -> Result<Payload> {
        Err(anyhow!("{}", self.message))
    }
}

/// Sleeper that records requested delays instead of waiting.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Rc<RefCell<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.borrow_mut().push(duration);
    }
}

/// Builder over default config with no real waits between retries.
pub fn quiet_builder(sleeper: &RecordingSleeper) -> PipelineBuilder {
    PipelineBuilder::new(PipelineConfig::default())
        .retry_delay(Duration::from_secs(1))
        .sleeper(Box::new(sleeper.clone()))
}
