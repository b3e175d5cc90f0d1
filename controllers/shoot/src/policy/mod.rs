//! Generation policy and shoot lifecycle predicates.
//!
//! - `generation`: decides whether an update starts a new reconciliation generation
//! - `strategy`: scheduling predicates over status and annotations

pub mod generation;
#[cfg(test)]
mod generation_test;
pub mod strategy;

pub use generation::{decide_initial, decide_observed};
pub use strategy::{
    is_deletion_scheduled, is_observed_at_latest_generation_and_succeeded, is_shoot_failed,
    should_ignore_shoot, sync_period_of_shoot,
};
