//! Command-gated plan-and-execute pipeline.
//!
//! One instruction enters through the [`control_plane`], is turned into a
//! schema-validated plan by the [`planner`] (querying backends through the
//! [`router`]), and runs step by step in the [`step_executor`] against the
//! capability table and the [`tools`] registry. The [`orchestrator`] wraps
//! plan-then-execute in bounded [`recovery`].
//!
//! - **[`core`]**: Pure logic (types, capabilities, plan schema, segregation).
//! - **[`io`]**: Side effects (backends, child processes, config, cache, prompts).
//!
//! [`bootstrap`] wires everything from a [`io::config::PipelineConfig`].

pub mod bootstrap;
pub mod control_plane;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod orchestrator;
pub mod planner;
pub mod recovery;
pub mod router;
pub mod step_executor;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
