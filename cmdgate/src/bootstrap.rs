//! Startup wiring: build every registry and the control plane from config.

use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::control_plane::ControlPlane;
use crate::core::capabilities::CapabilityRegistry;
use crate::core::plan_schema::PlanValidator;
use crate::core::segregation::{ContextBoundary, SegregationEnforcer};
use crate::error::BackendError;
use crate::io::backend::{CommandBackend, GenerationBackend};
use crate::io::config::PipelineConfig;
use crate::io::knowledge_cache::KnowledgeCache;
use crate::orchestrator::Orchestrator;
use crate::planner::Planner;
use crate::recovery::{DEFAULT_RETRY_DELAY, FailureRecovery, Sleeper, ThreadSleeper};
use crate::router::{Router, Strategy};
use crate::step_executor::StepExecutor;
use crate::tools::artifact_write::ArtifactWrite;
use crate::tools::code_execute::CodeExecute;
use crate::tools::code_generate::CodeGenerate;
use crate::tools::code_validate::CodeValidate;
use crate::tools::external::ExternalTool;
use crate::tools::notebook_query::NotebookQuery;
use crate::tools::run_tests::RunTests;
use crate::tools::sandbox::PythonSettings;
use crate::tools::{Tool, ToolRegistry};

/// Fully wired pipeline plus handles for listing and segregation checks.
#[derive(Debug)]
pub struct Pipeline {
    pub router: Rc<Router>,
    pub capabilities: Rc<CapabilityRegistry>,
    pub tools: Rc<ToolRegistry>,
    pub enforcer: SegregationEnforcer,
    pub cache: KnowledgeCache,
    pub control_plane: ControlPlane,
    /// Backends dropped because `connect` failed.
    pub connect_failures: Vec<(String, BackendError)>,
}

/// Builds a [`Pipeline`] from config plus injected backends and tools.
pub struct PipelineBuilder {
    config: PipelineConfig,
    backends: Vec<(String, Box<dyn GenerationBackend>)>,
    tools: Vec<Box<dyn Tool>>,
    sleeper: Box<dyn Sleeper>,
    retry_delay: Duration,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            backends: Vec::new(),
            tools: Vec::new(),
            sleeper: Box::new(ThreadSleeper),
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Register a backend after the configured ones.
    pub fn backend(mut self, name: impl Into<String>, backend: Box<dyn GenerationBackend>) -> Self {
        self.backends.push((name.into(), backend));
        self
    }

    /// Register a tool after the built-in and configured ones, replacing same-named tools.
    pub fn tool(mut self, tool: Box<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let cfg = self.config;
        cfg.validate()?;
        let exec = &cfg.execution;
        let strategy = Strategy::from_name(&cfg.router.strategy);

        let mut router = Router::new(strategy);
        for backend in cfg.backends.iter().filter(|b| b.enabled) {
            router.register(
                backend.name.clone(),
                Box::new(CommandBackend::new(
                    backend.name.clone(),
                    backend.command.clone(),
                    Duration::from_secs(backend.timeout_secs),
                    exec.output_limit_bytes,
                )),
            );
        }
        for (name, backend) in self.backends {
            router.register(name, backend);
        }
        let connect_failures = router.initialize();
        if router.available().is_empty() {
            warn!("no generation backends available; planning will fail");
        }
        let router = Rc::new(router);

        let capabilities = CapabilityRegistry::with_defaults();
        for (name, enabled) in &cfg.capabilities {
            capabilities.register(name, *enabled);
        }
        let capabilities = Rc::new(capabilities);

        let cache = KnowledgeCache::new(&exec.cache_dir);
        let python = |timeout_secs: u64| PythonSettings {
            python: exec.python.clone(),
            timeout: Duration::from_secs(timeout_secs),
            output_limit_bytes: exec.output_limit_bytes,
        };
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(ArtifactWrite::new(&exec.artifact_dir)));
        tools.register(Box::new(CodeExecute::new(python(exec.sandbox_timeout_secs))));
        tools.register(Box::new(RunTests::new(python(exec.test_timeout_secs))));
        tools.register(Box::new(CodeValidate::new(python(exec.sandbox_timeout_secs))));
        tools.register(Box::new(NotebookQuery::new(cache.clone())));
        tools.register(Box::new(CodeGenerate::new(Rc::clone(&router))?));
        for tool in &cfg.tools {
            tools.register(Box::new(ExternalTool::new(
                tool.name.clone(),
                tool.command.clone(),
                Duration::from_secs(tool.timeout_secs),
                exec.output_limit_bytes,
            )));
        }
        for tool in self.tools {
            tools.register(tool);
        }
        let tools = Rc::new(tools);

        let planner = Planner::new(Rc::clone(&router), PlanValidator::new(exec.max_steps)?)?;
        let executor = StepExecutor::new(Rc::clone(&capabilities), Rc::clone(&tools));
        let recovery = FailureRecovery::with_sleeper(self.retry_delay, self.sleeper);
        let control_plane = ControlPlane::new(Orchestrator::new(planner, executor, recovery));

        let enforcer = SegregationEnforcer::new(ContextBoundary::new(
            cfg.segregation.ai_allowed.iter().cloned(),
            cfg.segregation.ai_prohibited.iter().cloned(),
        ));

        info!(
            strategy = %strategy,
            backends = router.available().len(),
            tools = tools.list().len(),
            "pipeline ready"
        );
        Ok(Pipeline {
            router,
            capabilities,
            tools,
            enforcer,
            cache,
            control_plane,
            connect_failures,
        })
    }
}
