//! End-to-end operations behind the CLI subcommands.

pub mod bubble;
pub mod orchestrator;

pub use orchestrator::{Pipeline, PipelineSettings};
