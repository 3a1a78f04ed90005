//! The campaign orchestration service.
//!
//! One `CampaignService` instance owns all campaign and project state for
//! its lifetime; nothing lives in process-wide statics. Control operations
//! are synchronous and immediate; started campaigns run under a detached
//! supervisor task and report through their live record, polled via
//! [`CampaignService::get`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::adapters::{Delivery, Directory, ProjectHandle};
use crate::domain::{
    Campaign, CampaignError, CreateCampaignRequest, QuotaRecord, UpdateCampaignRequest,
};

use super::dispatch::Pace;
use super::ledger::QuotaLedger;
use super::scheduler::{self, DispatchContext};

/// Fixed inter-item / inter-batch delays applied to every throttled run.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub item_delay: Duration,
    pub batch_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            item_delay: Duration::from_millis(100),
            batch_delay: Duration::from_millis(200),
        }
    }
}

/// Campaign orchestration engine.
pub struct CampaignService {
    /// Campaign registry; each record is shared with its supervisor task
    campaigns: RwLock<HashMap<Uuid, Arc<RwLock<Campaign>>>>,

    /// Registered project handles
    projects: RwLock<HashMap<String, ProjectHandle>>,

    directory: Arc<dyn Directory>,
    delivery: Arc<dyn Delivery>,
    ledger: Arc<QuotaLedger>,
    pacing: Pacing,
}

impl CampaignService {
    /// Create a service instance with injected collaborators.
    pub fn new(
        directory: Arc<dyn Directory>,
        delivery: Arc<dyn Delivery>,
        ledger: Arc<QuotaLedger>,
        pacing: Pacing,
    ) -> Self {
        Self {
            campaigns: RwLock::new(HashMap::new()),
            projects: RwLock::new(HashMap::new()),
            directory,
            delivery,
            ledger,
            pacing,
        }
    }

    // ------------------------------------------------------------------
    // Project registry
    // ------------------------------------------------------------------

    /// Register a project handle, replacing any previous handle with the
    /// same id.
    pub async fn register_project(&self, handle: ProjectHandle) {
        info!(project = %handle.id, "Project registered");
        self.projects.write().await.insert(handle.id.clone(), handle);
    }

    /// Remove a project handle. Existing quota history stays queryable.
    pub async fn remove_project(&self, project_id: &str) -> Option<ProjectHandle> {
        let removed = self.projects.write().await.remove(project_id);
        if removed.is_some() {
            info!(project = %project_id, "Project removed");
        }
        removed
    }

    /// All registered project handles.
    pub async fn list_projects(&self) -> Vec<ProjectHandle> {
        self.projects.read().await.values().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Campaign control
    // ------------------------------------------------------------------

    /// Create a pending campaign from a validated request.
    pub async fn create(&self, request: CreateCampaignRequest) -> Result<Uuid, CampaignError> {
        request.validate()?;

        // Every targeted project must be registered
        {
            let projects = self.projects.read().await;
            for project_id in &request.project_ids {
                if !projects.contains_key(project_id) {
                    return Err(CampaignError::UnknownProject(project_id.clone()));
                }
            }
        }

        let campaign = Campaign::new(request);
        let id = campaign.id;
        info!(campaign = %id, name = %campaign.name, "Campaign created");

        self.campaigns
            .write()
            .await
            .insert(id, Arc::new(RwLock::new(campaign)));

        Ok(id)
    }

    /// All campaign records, most recently created first.
    pub async fn list(&self) -> Vec<Campaign> {
        let campaigns = self.campaigns.read().await;

        let mut records = Vec::with_capacity(campaigns.len());
        for entry in campaigns.values() {
            records.push(entry.read().await.clone());
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        records
    }

    /// Snapshot of one campaign record, live counters included.
    pub async fn get(&self, id: Uuid) -> Result<Campaign, CampaignError> {
        let entry = self.entry(id).await?;
        let record = entry.read().await.clone();
        Ok(record)
    }

    /// Update mutable fields of a stopped campaign.
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateCampaignRequest,
    ) -> Result<Campaign, CampaignError> {
        request.validate()?;

        let entry = self.entry(id).await?;
        let mut record = entry.write().await;
        record.ensure_stopped("update")?;

        request.apply(&mut record);
        Ok(record.clone())
    }

    /// Delete a stopped campaign.
    pub async fn delete(&self, id: Uuid) -> Result<(), CampaignError> {
        let mut campaigns = self.campaigns.write().await;

        let entry = campaigns
            .get(&id)
            .ok_or(CampaignError::NotFound(id))?;
        entry.read().await.ensure_stopped("delete")?;

        campaigns.remove(&id);
        info!(campaign = %id, "Campaign deleted");
        Ok(())
    }

    /// Start a pending campaign and return immediately; the run proceeds
    /// under a detached supervisor.
    #[instrument(skip(self), fields(campaign = %id))]
    pub async fn start(&self, id: Uuid) -> Result<(), CampaignError> {
        let entry = self.entry(id).await?;

        let (campaign_id, assignments, pace) = {
            let mut record = entry.write().await;
            record.begin()?;

            // Bind each project to its handle now; a handle that vanished
            // since creation is a per-project error, not a campaign abort
            let projects = self.projects.read().await;
            let mut assignments = Vec::with_capacity(record.project_ids.len());
            let project_ids = record.project_ids.clone();

            for project_id in project_ids {
                match projects.get(&project_id) {
                    Some(handle) => {
                        let user_ids = record
                            .selected_users
                            .get(&project_id)
                            .cloned()
                            .unwrap_or_default();
                        assignments.push((handle.clone(), user_ids));
                    }
                    None => {
                        record.record_project_error(format!(
                            "Project '{}' is not registered",
                            project_id
                        ));
                    }
                }
            }

            let pace = Pace {
                item_delay: self.pacing.item_delay,
                batch_delay: self.pacing.batch_delay,
                batch_size: record.batch_size,
            };

            (record.id, assignments, pace)
        };

        info!(projects = assignments.len(), "Campaign starting");

        let ctx = DispatchContext {
            directory: self.directory.clone(),
            delivery: self.delivery.clone(),
            ledger: self.ledger.clone(),
            pace,
        };

        tokio::spawn(scheduler::run_campaign(campaign_id, entry, assignments, ctx));

        Ok(())
    }

    /// Flag a running campaign as paused. Launched dispatches keep running;
    /// this only blocks a fresh start and updates the display status.
    pub async fn pause(&self, id: Uuid) -> Result<(), CampaignError> {
        let entry = self.entry(id).await?;
        entry.write().await.pause()?;
        info!(campaign = %id, "Campaign paused");
        Ok(())
    }

    /// Restore a paused campaign's running status. No work is relaunched,
    /// since pause halted none.
    pub async fn resume(&self, id: Uuid) -> Result<(), CampaignError> {
        let entry = self.entry(id).await?;
        entry.write().await.resume()?;
        info!(campaign = %id, "Campaign resumed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Quota
    // ------------------------------------------------------------------

    /// Today's successful-send count for a project.
    pub async fn quota_today(&self, project_id: &str) -> u64 {
        self.ledger.sent_today(project_id).await
    }

    /// Every stored quota record, for external reporting.
    pub async fn quota_all(&self) -> HashMap<String, QuotaRecord> {
        self.ledger.all_records().await
    }

    // ------------------------------------------------------------------
    // Unsupervised paths
    // ------------------------------------------------------------------

    /// Fire-and-forget reset sends for one project; returns the number of
    /// sends fired, before any outcome is known.
    pub async fn lightning_send(&self, project_id: &str, user_ids: Vec<String>) -> Result<u64> {
        let handle = self
            .project_handle(project_id)
            .await
            .ok_or_else(|| CampaignError::UnknownProject(project_id.to_string()))?;

        scheduler::lightning_send(
            handle,
            self.directory.clone(),
            self.delivery.clone(),
            user_ids,
        )
        .await
    }

    /// One synchronous delivery attempt, for verifying a project's channel.
    /// No campaign record, no quota increment.
    pub async fn test_send(&self, project_id: &str, email: &str) -> Result<()> {
        let handle = self
            .project_handle(project_id)
            .await
            .ok_or_else(|| CampaignError::UnknownProject(project_id.to_string()))?;

        self.delivery
            .send_reset(&handle, email)
            .await
            .with_context(|| format!("Test send to {} failed", email))
    }

    async fn entry(&self, id: Uuid) -> Result<Arc<RwLock<Campaign>>, CampaignError> {
        self.campaigns
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(CampaignError::NotFound(id))
    }

    async fn project_handle(&self, project_id: &str) -> Option<ProjectHandle> {
        self.projects.read().await.get(project_id).cloned()
    }
}
