//! Executive summary composition and Markdown rendering.

pub mod generator;
pub mod summary;

pub use generator::{generate_analysis_markdown, generate_json, generate_summary_markdown};
pub use summary::{SummaryComposer, GLOBAL_ACTIONS};
