//! Planning error taxonomy.
//!
//! Only genuine faults are errors. An empty problem (no eligible drivers or
//! stops) and individually infeasible stops are ordinary results — they come
//! back as zero-route responses and unassigned lists, never as `Err`.

use chrono::NaiveDate;
use uuid::Uuid;

/// Errors that abort a planning run before the optimizer is invoked.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Missing cost settings, malformed weight template, invalid weights.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Another run for the same (date, owner) is in flight. The builder and
    /// mapper cannot merge concurrent partial plans, so the run is rejected.
    #[error("planning run for {date} / owner {owner_id} is already in progress")]
    AlreadyRunning { date: NaiveDate, owner_id: Uuid },

    /// Unexpected infrastructure failure (database, task join, ...).
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}
