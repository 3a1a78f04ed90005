//! Campaign fan-out and the unsupervised lightning path.
//!
//! A started campaign gets one supervisor task which launches one dispatch
//! per project, concurrently, and awaits them all. A failed dispatch is
//! recorded and the rest keep going; the campaign only fails on an error
//! that escapes the per-project boundary. Lightning sends skip all of this:
//! resolve, fire every send detached, return the attempt count.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{Delivery, Directory, ProjectHandle};
use crate::domain::Campaign;

use super::dispatch::{self, Pace};
use super::ledger::QuotaLedger;

/// Shared collaborators handed to every dispatch.
#[derive(Clone)]
pub(crate) struct DispatchContext {
    pub directory: Arc<dyn Directory>,
    pub delivery: Arc<dyn Delivery>,
    pub ledger: Arc<QuotaLedger>,
    pub pace: Pace,
}

/// Supervise one campaign run to a terminal status.
///
/// `assignments` pairs each project handle with its ordered send list,
/// in the campaign's project order.
#[instrument(skip_all, fields(campaign = %campaign_id))]
pub(crate) async fn run_campaign(
    campaign_id: Uuid,
    campaign: Arc<RwLock<Campaign>>,
    assignments: Vec<(ProjectHandle, Vec<String>)>,
    ctx: DispatchContext,
) {
    let result = drive_projects(campaign.clone(), assignments, ctx).await;

    let mut record = campaign.write().await;
    match result {
        Ok(()) => {
            record.complete();
            info!(
                processed = record.progress.processed,
                successful = record.progress.successful,
                failed = record.progress.failed,
                "Campaign completed"
            );
        }
        Err(e) => {
            error!(error = %e, "Campaign run failed");
            record.fail(format!("Campaign run failed: {}", e));
        }
    }
}

/// Launch every project dispatch concurrently and await them all.
///
/// Only an error outside the per-project boundary (a panicked dispatch
/// task) propagates; dispatch-level failures are recorded on the campaign
/// and the remaining projects are unaffected.
async fn drive_projects(
    campaign: Arc<RwLock<Campaign>>,
    assignments: Vec<(ProjectHandle, Vec<String>)>,
    ctx: DispatchContext,
) -> Result<()> {
    let mut handles = Vec::with_capacity(assignments.len());

    for (project, user_ids) in assignments {
        let project_id = project.id.clone();
        let handle = tokio::spawn(dispatch::run_project(
            project,
            ctx.directory.clone(),
            ctx.delivery.clone(),
            ctx.ledger.clone(),
            campaign.clone(),
            user_ids,
            ctx.pace,
        ));
        handles.push((project_id, handle));
    }

    for (project_id, handle) in handles {
        match handle.await {
            Ok(Ok(outcome)) => {
                info!(
                    project = %project_id,
                    processed = outcome.processed,
                    successful = outcome.successful,
                    failed = outcome.failed,
                    "Project dispatch finished"
                );
            }
            Ok(Err(e)) => {
                warn!(project = %project_id, error = %e, "Project dispatch aborted");
                campaign.write().await.record_project_error(e.to_string());
            }
            Err(e) => {
                anyhow::bail!("dispatch task for project '{}' died: {}", project_id, e);
            }
        }
    }

    Ok(())
}

/// Fire-and-forget fan-out for one project, bypassing campaign accounting.
///
/// Resolves the identifiers, then launches every send as a detached task
/// without awaiting any outcome. The returned count is sends *fired*, a
/// lower bound on attempts rather than a delivery guarantee. Failures are
/// logged and otherwise dropped.
#[instrument(skip_all, fields(project = %project.id))]
pub(crate) async fn lightning_send(
    project: ProjectHandle,
    directory: Arc<dyn Directory>,
    delivery: Arc<dyn Delivery>,
    user_ids: Vec<String>,
) -> Result<u64> {
    let emails = directory
        .resolve_emails(&project, &user_ids)
        .await
        .with_context(|| format!("Directory resolution failed for project '{}'", project.id))?;

    let mut fired = 0u64;

    for user_id in &user_ids {
        let Some(email) = emails.get(user_id) else {
            continue;
        };

        let delivery = delivery.clone();
        let project = project.clone();
        let email = email.clone();

        tokio::spawn(async move {
            if let Err(e) = delivery.send_reset(&project, &email).await {
                warn!(project = %project.id, %email, error = %e, "Lightning send failed");
            }
        });

        fired += 1;
    }

    info!(fired, requested = user_ids.len(), "Lightning sends fired");
    Ok(fired)
}
