//! `cmdgate` command-line entry point.
//!
//! Loads `.cmdgate/config.toml` (or `--config` / `CMDGATE_CONFIG`), wires the
//! pipeline and runs one subcommand. JSON results go to stdout; errors go to
//! stderr as `{"error": ..., "type": ...}`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::{Value, json};

use cmdgate::bootstrap::{Pipeline, PipelineBuilder};
use cmdgate::core::segregation::{OperationContext, OperationType, SegregationEnforcer};
use cmdgate::error::PipelineError;
use cmdgate::exit_codes;
use cmdgate::io::config::{PipelineConfig, load_config, resolve_config_path, write_config};
use cmdgate::io::knowledge_cache::KnowledgeCache;
use cmdgate::logging;

#[derive(Parser)]
#[command(
    name = "cmdgate",
    version,
    about = "Command-gated plan-and-execute pipeline"
)]
struct Cli {
    /// Config file (defaults to $CMDGATE_CONFIG or .cmdgate/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan and execute one instruction, printing the execution context.
    Run {
        instruction: String,
        #[arg(long, default_value = "default")]
        conversation_id: String,
        /// Single attempt without retry; print the plan alongside the results.
        #[arg(long)]
        trace: bool,
    },
    /// List enabled capabilities.
    Capabilities,
    /// List registered tools.
    Tools,
    /// List connected generation backends.
    Backends,
    #[command(subcommand)]
    Segregation(SegregationCommand),
    #[command(subcommand)]
    Config(ConfigCommand),
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Subcommand)]
enum SegregationCommand {
    /// Print the operation classification and context boundaries.
    Report,
    /// Check one operation against the segregation rules.
    Check(CheckArgs),
}

#[derive(Args)]
struct CheckArgs {
    /// Operation name, e.g. `commercial_payment`.
    operation: String,
    #[arg(long)]
    uses_ai: bool,
    #[arg(long)]
    inputs_validated: bool,
    #[arg(long)]
    follows_laws: bool,
    #[arg(long)]
    critical_path: bool,
    #[arg(long)]
    boundaries_defined: bool,
    /// Named context checked against the AI allow/deny lists.
    #[arg(long)]
    context: Option<String>,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration as TOML.
    Show,
    /// Write the default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    /// List cached topics.
    List,
    /// Store a JSON value under a topic.
    Store { topic: String, data: String },
    /// Print cache statistics.
    Stats,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::ERROR
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let config_path = resolve_config_path(cli.config.as_deref());
    match cli.command {
        Command::Run {
            instruction,
            conversation_id,
            trace,
        } => cmd_run(&config_path, &instruction, &conversation_id, trace),
        Command::Capabilities => {
            let pipeline = build_pipeline(&config_path)?;
            print_lines(pipeline.capabilities.list_capabilities());
            Ok(exit_codes::OK)
        }
        Command::Tools => {
            let pipeline = build_pipeline(&config_path)?;
            print_lines(pipeline.tools.list());
            Ok(exit_codes::OK)
        }
        Command::Backends => {
            let pipeline = build_pipeline(&config_path)?;
            for (name, err) in &pipeline.connect_failures {
                eprintln!("{name}: unavailable: {err}");
            }
            print_lines(pipeline.router.available());
            Ok(exit_codes::OK)
        }
        Command::Segregation(SegregationCommand::Report) => {
            let pipeline = build_pipeline(&config_path)?;
            print_json(&json!({
                "operations": SegregationEnforcer::report(),
                "boundaries": pipeline.enforcer.boundary().boundaries(),
            }))?;
            Ok(exit_codes::OK)
        }
        Command::Segregation(SegregationCommand::Check(args)) => cmd_check(&config_path, &args),
        Command::Config(ConfigCommand::Show) => {
            let cfg = effective_config(&config_path)?;
            print!("{}", toml::to_string_pretty(&cfg).context("serialize config toml")?);
            Ok(exit_codes::OK)
        }
        Command::Config(ConfigCommand::Init { force }) => {
            if config_path.exists() && !force {
                bail!(
                    "config already exists at {} (use --force to overwrite)",
                    config_path.display()
                );
            }
            write_config(&config_path, &PipelineConfig::default())?;
            println!("{}", config_path.display());
            Ok(exit_codes::OK)
        }
        Command::Cache(command) => cmd_cache(&config_path, command),
    }
}

fn effective_config(path: &Path) -> Result<PipelineConfig> {
    let mut cfg = load_config(path)?;
    cfg.apply_env_overrides();
    cfg.validate()?;
    Ok(cfg)
}

fn build_pipeline(path: &Path) -> Result<Pipeline> {
    PipelineBuilder::new(effective_config(path)?).build()
}

fn cmd_run(path: &Path, instruction: &str, conversation_id: &str, trace: bool) -> Result<i32> {
    let pipeline = build_pipeline(path)?;
    let payload = json!({
        "command": "EXECUTE",
        "conversation_id": conversation_id,
        "instructions": instruction,
    });
    let result = if trace {
        pipeline.control_plane.handle_with_trace(&payload).map(|trace| {
            json!({
                "plan": trace.plan,
                "results": trace.results.to_value(),
            })
        })
    } else {
        pipeline
            .control_plane
            .handle(&payload)
            .map(|ctx| ctx.to_value())
    };
    match result {
        Ok(value) => {
            print_json(&value)?;
            Ok(exit_codes::OK)
        }
        Err(err) => {
            report_error(&err.to_string(), err.kind());
            Ok(exit_codes::for_error(&err))
        }
    }
}

fn cmd_check(path: &Path, args: &CheckArgs) -> Result<i32> {
    let Some(operation) = OperationType::from_name(&args.operation) else {
        let known: Vec<&str> = OperationType::ALL.iter().map(|op| op.as_str()).collect();
        bail!(
            "unknown operation: {} (expected one of: {})",
            args.operation,
            known.join(", ")
        );
    };
    let context = OperationContext {
        uses_ai: args.uses_ai,
        inputs_validated: args.inputs_validated,
        follows_10_laws: args.follows_laws,
        is_critical_path: args.critical_path,
        ai_boundaries_defined: args.boundaries_defined,
    };

    let pipeline = build_pipeline(path)?;
    match pipeline
        .enforcer
        .validate_in_context(operation, &context, args.context.as_deref())
    {
        Ok(()) => {
            let boundary = pipeline.enforcer.boundary();
            let mut verdict = json!({
                "allowed": true,
                "operation": operation.as_str(),
                "category": operation.category(),
            });
            if let Some(name) = &args.context {
                verdict["context"] = json!(name);
                verdict["context_ai_allowed"] = json!(boundary.is_ai_allowed(name));
            }
            print_json(&verdict)?;
            Ok(exit_codes::OK)
        }
        Err(violation) => {
            let err = PipelineError::from(violation);
            report_error(&err.to_string(), err.kind());
            Ok(exit_codes::for_error(&err))
        }
    }
}

fn cmd_cache(path: &Path, command: CacheCommand) -> Result<i32> {
    let cfg = effective_config(path)?;
    let cache = KnowledgeCache::new(&cfg.execution.cache_dir);
    match command {
        CacheCommand::List => print_lines(cache.list_topics()?),
        CacheCommand::Store { topic, data } => {
            let value: Value = serde_json::from_str(&data).context("parse cache data as JSON")?;
            println!("{}", cache.store(&topic, value)?);
        }
        CacheCommand::Stats => print_json(&cache.stats()?)?,
    }
    Ok(exit_codes::OK)
}

fn report_error(message: &str, kind: &str) {
    eprintln!("{}", json!({"error": message, "type": kind}));
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("serialize json")?
    );
    Ok(())
}

fn print_lines<S: AsRef<str>>(lines: Vec<S>) {
    for line in lines {
        println!("{}", line.as_ref());
    }
}
