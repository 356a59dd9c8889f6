//! Risk analysis modules.
//!
//! `risk` holds the scorer and the ranking rule, `aggregator` the
//! due-date counters reported alongside scored tickets.

pub mod aggregator;
pub mod risk;

pub use aggregator::kpi_summary;
pub use risk::{rank, score, score_all, top_n};
