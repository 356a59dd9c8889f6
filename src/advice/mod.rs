//! Remediation advice: local rule hints plus generated, KB-grounded steps.

pub mod composer;
pub mod rules;

pub use composer::{degraded, normalize_actions, AdviceComposer};
pub use rules::rule_hints;
