//! I/O helpers: generation backends, child processes, config, cache, prompts.

pub mod backend;
pub mod config;
pub mod knowledge_cache;
pub mod process;
pub mod prompt;
