//! Per-project delivery dispatch.
//!
//! One dispatch drives the ordered send list of a single project: one
//! batch directory query up front, then one delivery attempt per resolved
//! recipient at the configured pace. Individual send failures are recorded
//! and iteration continues; only a failed directory query aborts the
//! dispatch.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::adapters::{Delivery, Directory, ProjectHandle};
use crate::domain::{Campaign, Progress};

use super::ledger::QuotaLedger;

/// Errors that abort a whole project dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Directory resolution failed for project '{project_id}': {reason}")]
    Resolution { project_id: String, reason: String },
}

/// Fixed-pace throttle for one dispatch.
#[derive(Debug, Clone, Copy)]
pub struct Pace {
    /// Delay after every delivery attempt
    pub item_delay: Duration,

    /// Additional delay after each full batch
    pub batch_delay: Duration,

    /// Items per batch
    pub batch_size: usize,
}

/// Run the send list of one project to completion.
///
/// Every attempt updates the shared campaign record (aggregate and
/// per-project counters together) and, on success, the quota ledger.
/// Returns the dispatch's own outcome tally.
#[instrument(skip_all, fields(project = %project.id))]
pub async fn run_project(
    project: ProjectHandle,
    directory: Arc<dyn Directory>,
    delivery: Arc<dyn Delivery>,
    ledger: Arc<QuotaLedger>,
    campaign: Arc<RwLock<Campaign>>,
    user_ids: Vec<String>,
    pace: Pace,
) -> Result<Progress, DispatchError> {
    let mut outcome = Progress::default();

    if user_ids.is_empty() {
        return Ok(outcome);
    }

    // One batch query per project; a failure here aborts this dispatch only
    let emails = directory
        .resolve_emails(&project, &user_ids)
        .await
        .map_err(|e| DispatchError::Resolution {
            project_id: project.id.clone(),
            reason: e.to_string(),
        })?;

    // Unresolvable identifiers are skipped: neither success nor failure
    let recipients: Vec<(&String, &String)> = user_ids
        .iter()
        .filter_map(|id| emails.get(id).map(|email| (id, email)))
        .collect();

    debug!(
        resolved = recipients.len(),
        requested = user_ids.len(),
        "Resolved recipients"
    );

    let batch_size = pace.batch_size.max(1);
    let batch_count = recipients.len().div_ceil(batch_size);

    for (batch_idx, batch) in recipients.chunks(batch_size).enumerate() {
        for &(user_id, email) in batch {
            match delivery.send_reset(&project, email).await {
                Ok(()) => {
                    outcome.processed += 1;
                    outcome.successful += 1;

                    campaign.write().await.record_success(&project.id);
                    ledger.record_sent(&project.id).await;

                    debug!(user = %user_id, %email, "Reset notification sent");
                }
                Err(e) => {
                    outcome.processed += 1;
                    outcome.failed += 1;

                    let error = format!("Failed to send to {}: {}", email, e);
                    warn!(user = %user_id, %email, error = %e, "Delivery failed");
                    campaign.write().await.record_failure(&project.id, error);
                }
            }

            tokio::time::sleep(pace.item_delay).await;
        }

        if batch_idx + 1 < batch_count {
            tokio::time::sleep(pace.batch_delay).await;
        }
    }

    Ok(outcome)
}
