//! Cross-ticket recommendations attached to every summary.

use crate::models::BubbleUp;

const TITLES: [&str; 3] = [
    "Escalate overdues",
    "Staff high-priority items",
    "Order parts & confirm windows",
];

const WHY: &str = "Aggregated from ticket advice";

const STEPS: [&str; 3] = [
    "Confirm owner coverage and backups",
    "Notify DC manager",
    "Set checkpoint in 48h",
];

/// The three fixed bubble-up recommendations.
pub fn bubble_up() -> Vec<BubbleUp> {
    TITLES
        .iter()
        .map(|title| BubbleUp {
            title: title.to_string(),
            why: WHY.to_string(),
            steps: STEPS.iter().map(|s| s.to_string()).collect(),
        })
        .collect()
}
