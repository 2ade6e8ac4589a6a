//! Multi-backend generation router.
//!
//! Holds named backends in registration order and a set of static preference
//! rankings. Rankings only pick iteration order; a ranked name that is not
//! registered is skipped.
//!
//! | Strategy   | Order              | Calls                                  |
//! |------------|--------------------|----------------------------------------|
//! | Fallback   | registration       | until first success, failures recorded |
//! | Consensus  | quality ranking    | up to 3, failures recorded             |
//! | Fastest    | speed ranking      | until first success, failures skipped  |
//! | Cheapest   | cost ranking       | until first success, failures skipped  |
//! | Smartest   | quality ranking    | until first success, failures skipped  |
//! | Coding     | coding ranking     | until first success, failures skipped  |
//! | Unranked   | registration       | until first success, failures skipped  |

use std::fmt;

use tracing::{debug, info, instrument, warn};

use crate::error::BackendError;
use crate::io::backend::GenerationBackend;

pub const SPEED_RANKING: &[&str] = &["groq", "together", "gemini", "openai", "claude"];
pub const COST_RANKING: &[&str] = &["deepseek", "gemini", "together", "huggingface", "groq"];
pub const QUALITY_RANKING: &[&str] = &["claude", "openai", "gemini", "mistral", "cohere"];
pub const CODING_RANKING: &[&str] = &["claude", "openai", "deepseek", "mistral", "groq"];

/// Backends called per consensus request.
pub const CONSENSUS_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    Fastest,
    Cheapest,
    Smartest,
    Coding,
    Consensus,
    #[default]
    Fallback,
    /// Registration order, first success, failures not recorded.
    Unranked,
}

impl Strategy {
    /// Parse a strategy name case-insensitively; unknown names are [`Strategy::Unranked`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "fastest" => Strategy::Fastest,
            "cheapest" => Strategy::Cheapest,
            "smartest" => Strategy::Smartest,
            "coding" => Strategy::Coding,
            "consensus" => Strategy::Consensus,
            "fallback" => Strategy::Fallback,
            _ => Strategy::Unranked,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Fastest => "fastest",
            Strategy::Cheapest => "cheapest",
            Strategy::Smartest => "smartest",
            Strategy::Coding => "coding",
            Strategy::Consensus => "consensus",
            Strategy::Fallback => "fallback",
            Strategy::Unranked => "unranked",
        }
    }

    fn ranking(self) -> Option<&'static [&'static str]> {
        match self {
            Strategy::Fastest => Some(SPEED_RANKING),
            Strategy::Cheapest => Some(COST_RANKING),
            Strategy::Smartest | Strategy::Consensus => Some(QUALITY_RANKING),
            Strategy::Coding => Some(CODING_RANKING),
            Strategy::Fallback | Strategy::Unranked => None,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text or error marker recorded for one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOutput {
    Text(String),
    Error(String),
}

impl BackendOutput {
    pub fn text(&self) -> Option<&str> {
        match self {
            BackendOutput::Text(text) => Some(text),
            BackendOutput::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, BackendOutput::Error(_))
    }
}

/// Per-backend outputs in call order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterOutputs {
    entries: Vec<(String, BackendOutput)>,
}

impl RouterOutputs {
    fn push(&mut self, name: &str, output: BackendOutput) {
        self.entries.push((name.to_string(), output));
    }

    pub fn get(&self, name: &str) -> Option<&BackendOutput> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, output)| output)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BackendOutput)> {
        self.entries.iter().map(|(name, output)| (name.as_str(), output))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// First successful text and its backend name.
    pub fn first_text(&self) -> Option<(&str, &str)> {
        self.iter()
            .find_map(|(name, output)| output.text().map(|text| (name, text)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct NamedBackend {
    name: String,
    backend: Box<dyn GenerationBackend>,
}

/// Named backend set plus a default strategy.
#[derive(Default)]
pub struct Router {
    backends: Vec<NamedBackend>,
    strategy: Strategy,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("backends", &self.available())
            .field("strategy", &self.strategy)
            .finish()
    }
}

impl Router {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            backends: Vec::new(),
            strategy,
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Add a backend. Re-registering a name replaces it in place.
    pub fn register(&mut self, name: impl Into<String>, backend: Box<dyn GenerationBackend>) {
        let name = name.into();
        match self.backends.iter_mut().find(|b| b.name == name) {
            Some(existing) => existing.backend = backend,
            None => self.backends.push(NamedBackend { name, backend }),
        }
    }

    /// Connect every backend, dropping the ones that fail. Returns the failures.
    #[instrument(skip_all)]
    pub fn initialize(&mut self) -> Vec<(String, BackendError)> {
        let mut failures = Vec::new();
        self.backends
            .retain_mut(|entry| match entry.backend.connect() {
                Ok(()) => true,
                Err(err) => {
                    warn!(backend = %entry.name, err = %err, "backend failed to connect, dropping");
                    failures.push((entry.name.clone(), err));
                    false
                }
            });
        info!(backends = ?self.available(), "router initialized");
        failures
    }

    /// Registered names in registration order.
    pub fn available(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name.as_str()).collect()
    }

    fn find(&self, name: &str) -> Option<&NamedBackend> {
        self.backends.iter().find(|b| b.name == name)
    }

    /// Generate with the router's default strategy.
    pub fn generate_default(&self, prompt: &str, temperature: f32) -> RouterOutputs {
        self.generate(prompt, temperature, self.strategy)
    }

    #[instrument(skip_all, fields(strategy = %strategy, prompt_bytes = prompt.len()))]
    pub fn generate(&self, prompt: &str, temperature: f32, strategy: Strategy) -> RouterOutputs {
        match strategy {
            Strategy::Fallback => self.sweep(prompt, temperature, |_| true),
            Strategy::Consensus => self.consensus(prompt, temperature),
            Strategy::Unranked => self.first_success(self.backends.iter(), prompt, temperature),
            ranked => {
                let order = ranked
                    .ranking()
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|name| self.find(name));
                self.first_success(order, prompt, temperature)
            }
        }
    }

    /// Fallback sweep in registration order.
    ///
    /// Failures are recorded as error markers. The sweep stops after the first
    /// text for which `accept` returns true; rejected texts are recorded as
    /// text and the sweep continues.
    pub fn sweep<F>(&self, prompt: &str, temperature: f32, mut accept: F) -> RouterOutputs
    where
        F: FnMut(&str) -> bool,
    {
        let mut outputs = RouterOutputs::default();
        for entry in &self.backends {
            match entry.backend.generate(prompt, temperature) {
                Ok(text) => {
                    let accepted = accept(&text);
                    debug!(backend = %entry.name, accepted, "backend returned text");
                    outputs.push(&entry.name, BackendOutput::Text(text));
                    if accepted {
                        break;
                    }
                }
                Err(err) => {
                    warn!(backend = %entry.name, err = %err, "backend failed");
                    outputs.push(&entry.name, BackendOutput::Error(err.to_string()));
                }
            }
        }
        outputs
    }

    fn consensus(&self, prompt: &str, temperature: f32) -> RouterOutputs {
        let mut outputs = RouterOutputs::default();
        let selected = QUALITY_RANKING
            .iter()
            .filter_map(|name| self.find(name))
            .take(CONSENSUS_LIMIT);
        for entry in selected {
            let output = match entry.backend.generate(prompt, temperature) {
                Ok(text) => BackendOutput::Text(text),
                Err(err) => {
                    warn!(backend = %entry.name, err = %err, "consensus backend failed");
                    BackendOutput::Error(err.to_string())
                }
            };
            outputs.push(&entry.name, output);
        }
        outputs
    }

    fn first_success<'a, I>(&self, order: I, prompt: &str, temperature: f32) -> RouterOutputs
    where
        I: Iterator<Item = &'a NamedBackend>,
    {
        let mut outputs = RouterOutputs::default();
        for entry in order {
            match entry.backend.generate(prompt, temperature) {
                Ok(text) => {
                    outputs.push(&entry.name, BackendOutput::Text(text));
                    break;
                }
                Err(err) => {
                    debug!(backend = %entry.name, err = %err, "ranked backend failed, trying next");
                }
            }
        }
        outputs
    }

    /// Call only the first registered backend.
    pub fn generate_primary(&self, prompt: &str, temperature: f32) -> Result<String, BackendError> {
        let entry = self.backends.first().ok_or(BackendError::NoBackends)?;
        entry.backend.generate(prompt, temperature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CallLog, ScriptedBackend};

    fn router_with(log: &CallLog, specs: &[(&str, Option<&str>)]) -> Router {
        let mut router = Router::default();
        for (name, reply) in specs {
            let backend = match reply {
                Some(text) => ScriptedBackend::always(name, text, log),
                None => ScriptedBackend::failing(name, log),
            };
            router.register(*name, Box::new(backend));
        }
        router
    }

    #[test]
    fn fallback_stops_at_first_success() {
        let log = CallLog::default();
        let router = router_with(
            &log,
            &[("a", None), ("b", None), ("c", Some("ok")), ("d", Some("late"))],
        );

        let outputs = router.generate("p", 0.0, Strategy::Fallback);
        assert_eq!(outputs.names(), vec!["a", "b", "c"]);
        assert!(outputs.get("a").is_some_and(BackendOutput::is_error));
        assert!(outputs.get("b").is_some_and(BackendOutput::is_error));
        assert_eq!(outputs.get("c"), Some(&BackendOutput::Text("ok".to_string())));
        assert_eq!(log.calls(), vec!["a", "b", "c"]);
    }

    #[test]
    fn fallback_all_failing_records_only_errors() {
        let log = CallLog::default();
        let router = router_with(&log, &[("a", None), ("b", None)]);
        let outputs = router.generate("p", 0.0, Strategy::Fallback);
        assert_eq!(outputs.len(), 2);
        assert!(outputs.iter().all(|(_, o)| o.is_error()));
        assert_eq!(outputs.first_text(), None);
    }

    #[test]
    fn consensus_calls_at_most_three_in_quality_order() {
        let log = CallLog::default();
        let router = router_with(
            &log,
            &[
                ("cohere", Some("5")),
                ("mistral", Some("4")),
                ("groq", Some("x")),
                ("openai", None),
                ("claude", Some("1")),
            ],
        );

        let outputs = router.generate("p", 0.0, Strategy::Consensus);
        assert_eq!(log.calls(), vec!["claude", "openai", "mistral"]);
        assert_eq!(outputs.names(), vec!["claude", "openai", "mistral"]);
        assert!(outputs.get("openai").is_some_and(BackendOutput::is_error));
    }

    #[test]
    fn ranked_strategy_skips_failures_silently() {
        let log = CallLog::default();
        let router = router_with(
            &log,
            &[("claude", Some("slow")), ("groq", None), ("gemini", Some("fast"))],
        );

        let outputs = router.generate("p", 0.0, Strategy::Fastest);
        assert_eq!(log.calls(), vec!["groq", "gemini"]);
        assert_eq!(outputs.names(), vec!["gemini"]);
    }

    #[test]
    fn smartest_follows_quality_ranking() {
        let log = CallLog::default();
        let router = router_with(
            &log,
            &[
                ("cohere", Some("5")),
                ("mistral", Some("4")),
                ("openai", None),
                ("claude", None),
            ],
        );

        let outputs = router.generate("p", 0.0, Strategy::Smartest);
        assert_eq!(log.calls(), vec!["claude", "openai", "mistral"]);
        assert_eq!(outputs.names(), vec!["mistral"]);
    }

    #[test]
    fn coding_follows_coding_ranking() {
        let log = CallLog::default();
        let router = router_with(
            &log,
            &[("groq", Some("g")), ("deepseek", Some("d")), ("claude", None)],
        );

        let outputs = router.generate("p", 0.0, Strategy::Coding);
        assert_eq!(log.calls(), vec!["claude", "deepseek"]);
        assert_eq!(outputs.first_text(), Some(("deepseek", "d")));
    }

    #[test]
    fn default_generation_uses_configured_strategy() {
        let log = CallLog::default();
        let mut router = Router::new(Strategy::from_name("SMARTEST"));
        router.register("gemini", Box::new(ScriptedBackend::always("gemini", "g", &log)));
        router.register("openai", Box::new(ScriptedBackend::always("openai", "o", &log)));

        assert_eq!(router.strategy(), Strategy::Smartest);
        let outputs = router.generate_default("p", 0.0);
        assert_eq!(outputs.names(), vec!["openai"]);
    }

    #[test]
    fn ranked_strategy_without_success_is_empty() {
        let log = CallLog::default();
        let router = router_with(&log, &[("deepseek", None), ("custom", Some("ignored"))]);
        let outputs = router.generate("p", 0.0, Strategy::Cheapest);
        assert!(outputs.is_empty());
        assert_eq!(log.calls(), vec!["deepseek"]);
    }

    #[test]
    fn unranked_uses_registration_order() {
        let log = CallLog::default();
        let router = router_with(&log, &[("z", None), ("y", Some("ok")), ("x", Some("no"))]);
        let outputs = router.generate("p", 0.0, Strategy::from_name("round-robin"));
        assert_eq!(outputs.names(), vec!["y"]);
        assert_eq!(log.calls(), vec!["z", "y"]);
    }

    #[test]
    fn sweep_continues_past_rejected_text() {
        let log = CallLog::default();
        let router = router_with(
            &log,
            &[("a", Some("junk")), ("b", Some("good")), ("c", Some("x"))],
        );
        let outputs = router.sweep("p", 0.0, |text| text == "good");
        assert_eq!(outputs.names(), vec!["a", "b"]);
        assert_eq!(log.calls(), vec!["a", "b"]);
    }

    #[test]
    fn primary_requires_a_backend() {
        let router = Router::default();
        assert_eq!(router.generate_primary("p", 0.0), Err(BackendError::NoBackends));

        let log = CallLog::default();
        let router = router_with(&log, &[("a", Some("first")), ("b", Some("second"))]);
        assert_eq!(router.generate_primary("p", 0.0).as_deref(), Ok("first"));
        assert_eq!(log.calls(), vec!["a"]);
    }

    #[test]
    fn initialize_drops_backends_that_fail_to_connect() {
        let log = CallLog::default();
        let mut router = Router::default();
        router.register("good", Box::new(ScriptedBackend::always("good", "ok", &log)));
        router.register(
            "bad",
            Box::new(ScriptedBackend::always("bad", "ok", &log).refuse_connect()),
        );

        let failures = router.initialize();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "bad");
        assert_eq!(router.available(), vec!["good"]);
    }

    #[test]
    fn register_replaces_existing_name() {
        let log = CallLog::default();
        let mut router = Router::default();
        router.register("a", Box::new(ScriptedBackend::always("a", "old", &log)));
        router.register("b", Box::new(ScriptedBackend::always("b", "b", &log)));
        router.register("a", Box::new(ScriptedBackend::always("a", "new", &log)));
        assert_eq!(router.available(), vec!["a", "b"]);
        assert_eq!(router.generate_primary("p", 0.0).as_deref(), Ok("new"));
    }

    #[test]
    fn strategy_names_parse_case_insensitively() {
        assert_eq!(Strategy::from_name("CONSENSUS"), Strategy::Consensus);
        assert_eq!(Strategy::from_name(" Coding "), Strategy::Coding);
        assert_eq!(Strategy::from_name("whatever"), Strategy::Unranked);
    }
}
