//! Campaign record and status lifecycle.
//!
//! A Campaign is one orchestrated run of notification sends across one or
//! more projects. Control operations move it along the status edges below;
//! the fan-out supervisor applies the terminal statuses.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::request::CreateCampaignRequest;

/// Errors surfaced by campaign control operations.
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("Campaign not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid status transition: {from:?} → {to:?}")]
    InvalidTransition {
        from: CampaignStatus,
        to: CampaignStatus,
    },

    #[error("Campaign {id} is running; {action} requires a stopped campaign")]
    Running { id: Uuid, action: &'static str },

    #[error("Unknown project: {0}")]
    UnknownProject(String),

    #[error("Invalid campaign request: {0}")]
    InvalidRequest(String),
}

/// Status of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    /// Created, not yet started
    Pending,

    /// Fan-out in progress
    Running,

    /// Status flag only; launched work is not halted
    Paused,

    /// All project dispatches finished
    Completed,

    /// The supervised run itself errored
    Failed,
}

impl CampaignStatus {
    /// Terminal statuses accept no further start.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Processed / successful / failed counters.
///
/// `processed` always equals `successful + failed`; unresolved recipients
/// are skipped entirely and never counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub processed: u64,
    pub successful: u64,
    pub failed: u64,
}

impl Progress {
    fn record_success(&mut self) {
        self.processed += 1;
        self.successful += 1;
    }

    fn record_failure(&mut self) {
        self.processed += 1;
        self.failed += 1;
    }
}

/// One orchestrated run of notification sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    /// Unique identifier, assigned at creation
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Target projects, in declaration order
    pub project_ids: Vec<String>,

    /// Per-project target user identifiers; order within a project is the
    /// send order
    pub selected_users: HashMap<String, Vec<String>>,

    /// Advisory chunking hint (items per batch)
    pub batch_size: usize,

    /// Advisory parallelism hint
    pub workers: usize,

    /// Optional message template reference
    pub template: Option<String>,

    /// Current lifecycle status
    pub status: CampaignStatus,

    /// Aggregate counters across all projects
    pub progress: Progress,

    /// Per-project counters; keys mirror `project_ids`
    pub per_project: HashMap<String, Progress>,

    /// Append-only human-readable error strings
    pub errors: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Campaign {
    /// Create a pending campaign from a validated request.
    pub fn new(request: CreateCampaignRequest) -> Self {
        let per_project = request
            .project_ids
            .iter()
            .map(|p| (p.clone(), Progress::default()))
            .collect();

        Self {
            id: Uuid::new_v4(),
            name: request.name,
            project_ids: request.project_ids,
            selected_users: request.selected_users,
            batch_size: request.batch_size,
            workers: request.workers,
            template: request.template,
            status: CampaignStatus::Pending,
            progress: Progress::default(),
            per_project,
            errors: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Move `pending → running`. Any other current status is rejected
    /// without mutating the record.
    pub fn begin(&mut self) -> Result<(), CampaignError> {
        if self.status != CampaignStatus::Pending {
            return Err(CampaignError::InvalidTransition {
                from: self.status,
                to: CampaignStatus::Running,
            });
        }
        self.status = CampaignStatus::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Move `running → paused`. A status flag only: dispatches already
    /// launched keep running.
    pub fn pause(&mut self) -> Result<(), CampaignError> {
        if self.status != CampaignStatus::Running {
            return Err(CampaignError::InvalidTransition {
                from: self.status,
                to: CampaignStatus::Paused,
            });
        }
        self.status = CampaignStatus::Paused;
        Ok(())
    }

    /// Move `paused → running`. Restores the display status; no work was
    /// halted by pause, so none is relaunched.
    pub fn resume(&mut self) -> Result<(), CampaignError> {
        if self.status != CampaignStatus::Paused {
            return Err(CampaignError::InvalidTransition {
                from: self.status,
                to: CampaignStatus::Running,
            });
        }
        self.status = CampaignStatus::Running;
        Ok(())
    }

    /// Terminal transition applied by the supervisor when every project
    /// dispatch has finished.
    pub(crate) fn complete(&mut self) {
        self.status = CampaignStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Terminal transition applied by the supervisor on an error that
    /// escaped per-project isolation.
    pub(crate) fn fail(&mut self, error: String) {
        self.status = CampaignStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.errors.push(error);
    }

    /// Reject mutation/deletion while the campaign is running.
    pub fn ensure_stopped(&self, action: &'static str) -> Result<(), CampaignError> {
        if self.status == CampaignStatus::Running {
            return Err(CampaignError::Running {
                id: self.id,
                action,
            });
        }
        Ok(())
    }

    /// Record one successful send for `project_id`, updating the project
    /// sub-record and the aggregate together.
    pub fn record_success(&mut self, project_id: &str) {
        self.progress.record_success();
        self.per_project
            .entry(project_id.to_string())
            .or_default()
            .record_success();
    }

    /// Record one failed send for `project_id` along with its error string.
    pub fn record_failure(&mut self, project_id: &str, error: String) {
        self.progress.record_failure();
        self.per_project
            .entry(project_id.to_string())
            .or_default()
            .record_failure();
        self.errors.push(error);
    }

    /// Record an error that aborted a whole project dispatch.
    pub fn record_project_error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub fn is_running(&self) -> bool {
        self.status == CampaignStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request::CreateCampaignRequest;

    fn request() -> CreateCampaignRequest {
        CreateCampaignRequest {
            name: "welcome-wave".to_string(),
            project_ids: vec!["acme".to_string(), "globex".to_string()],
            selected_users: [
                ("acme".to_string(), vec!["u1".to_string()]),
                ("globex".to_string(), vec!["u2".to_string()]),
            ]
            .into_iter()
            .collect(),
            batch_size: 10,
            workers: 2,
            template: None,
        }
    }

    #[test]
    fn test_new_campaign_is_pending() {
        let campaign = Campaign::new(request());

        assert_eq!(campaign.status, CampaignStatus::Pending);
        assert_eq!(campaign.progress, Progress::default());
        assert_eq!(campaign.per_project.len(), 2);
        assert!(campaign.started_at.is_none());
    }

    #[test]
    fn test_begin_only_from_pending() {
        let mut campaign = Campaign::new(request());

        campaign.begin().unwrap();
        assert_eq!(campaign.status, CampaignStatus::Running);
        assert!(campaign.started_at.is_some());

        // Starting again is rejected and leaves the record untouched
        let started_at = campaign.started_at;
        assert!(matches!(
            campaign.begin(),
            Err(CampaignError::InvalidTransition { .. })
        ));
        assert_eq!(campaign.status, CampaignStatus::Running);
        assert_eq!(campaign.started_at, started_at);
    }

    #[test]
    fn test_pause_resume_edges() {
        let mut campaign = Campaign::new(request());

        // Cannot pause before start
        assert!(campaign.pause().is_err());

        campaign.begin().unwrap();
        campaign.pause().unwrap();
        assert_eq!(campaign.status, CampaignStatus::Paused);

        // Start does not apply to paused; resume does
        assert!(campaign.begin().is_err());
        campaign.resume().unwrap();
        assert_eq!(campaign.status, CampaignStatus::Running);
    }

    #[test]
    fn test_terminal_statuses_reject_start() {
        let mut campaign = Campaign::new(request());
        campaign.begin().unwrap();
        campaign.complete();

        assert!(campaign.status.is_terminal());
        assert!(campaign.begin().is_err());

        let mut failed = Campaign::new(request());
        failed.begin().unwrap();
        failed.fail("boom".to_string());
        assert!(failed.status.is_terminal());
        assert!(failed.begin().is_err());
        assert_eq!(failed.errors.len(), 1);
    }

    #[test]
    fn test_counters_stay_consistent() {
        let mut campaign = Campaign::new(request());

        campaign.record_success("acme");
        campaign.record_success("acme");
        campaign.record_failure("globex", "send failed for x@example.com".to_string());

        assert_eq!(campaign.progress.processed, 3);
        assert_eq!(campaign.progress.successful, 2);
        assert_eq!(campaign.progress.failed, 1);
        assert_eq!(
            campaign.progress.processed,
            campaign.progress.successful + campaign.progress.failed
        );

        // Aggregate equals the sum over projects
        let sum: u64 = campaign.per_project.values().map(|p| p.processed).sum();
        assert_eq!(campaign.progress.processed, sum);
        assert_eq!(campaign.per_project["acme"].successful, 2);
        assert_eq!(campaign.per_project["globex"].failed, 1);
        assert_eq!(campaign.errors.len(), 1);
    }

    #[test]
    fn test_ensure_stopped() {
        let mut campaign = Campaign::new(request());
        assert!(campaign.ensure_stopped("update").is_ok());

        campaign.begin().unwrap();
        assert!(matches!(
            campaign.ensure_stopped("update"),
            Err(CampaignError::Running { .. })
        ));

        campaign.pause().unwrap();
        assert!(campaign.ensure_stopped("delete").is_ok());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&CampaignStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");

        let parsed: CampaignStatus = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(parsed, CampaignStatus::Paused);
    }
}
