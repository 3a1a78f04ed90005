//! Typed control-plane requests.
//!
//! Requests are validated at the boundary; malformed input is rejected
//! before it reaches the orchestration core.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::campaign::{Campaign, CampaignError};

/// Request to create a new campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaignRequest {
    /// Display name
    pub name: String,

    /// Target projects, in order
    pub project_ids: Vec<String>,

    /// Project id → ordered target user identifiers
    pub selected_users: HashMap<String, Vec<String>>,

    /// Items per batch (chunking hint)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Parallelism hint
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Optional message template reference
    #[serde(default)]
    pub template: Option<String>,
}

fn default_batch_size() -> usize {
    50
}
fn default_workers() -> usize {
    1
}

impl CreateCampaignRequest {
    /// Load a campaign request from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read campaign file: {}", path.display()))?;

        serde_yaml::from_str(&content).context("Failed to parse campaign YAML")
    }

    /// Validate required fields and cross-references.
    pub fn validate(&self) -> Result<(), CampaignError> {
        if self.name.trim().is_empty() {
            return Err(CampaignError::InvalidRequest(
                "campaign name cannot be empty".to_string(),
            ));
        }

        if self.project_ids.is_empty() {
            return Err(CampaignError::InvalidRequest(
                "campaign must target at least one project".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(CampaignError::InvalidRequest(
                "batch size must be at least 1".to_string(),
            ));
        }

        if self.workers == 0 {
            return Err(CampaignError::InvalidRequest(
                "worker count must be at least 1".to_string(),
            ));
        }

        // Every user list must belong to a declared project
        for project_id in self.selected_users.keys() {
            if !self.project_ids.iter().any(|p| p == project_id) {
                return Err(CampaignError::InvalidRequest(format!(
                    "selected users reference undeclared project '{}'",
                    project_id
                )));
            }
        }

        Ok(())
    }
}

/// Partial update of a stopped campaign's mutable fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub batch_size: Option<usize>,
    pub workers: Option<usize>,
    pub template: Option<String>,
}

impl UpdateCampaignRequest {
    /// Validate the fields that are present.
    pub fn validate(&self) -> Result<(), CampaignError> {
        if let Some(ref name) = self.name {
            if name.trim().is_empty() {
                return Err(CampaignError::InvalidRequest(
                    "campaign name cannot be empty".to_string(),
                ));
            }
        }
        if self.batch_size == Some(0) {
            return Err(CampaignError::InvalidRequest(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.workers == Some(0) {
            return Err(CampaignError::InvalidRequest(
                "worker count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply the present fields to a campaign record.
    pub fn apply(&self, campaign: &mut Campaign) {
        if let Some(ref name) = self.name {
            campaign.name = name.clone();
        }
        if let Some(batch_size) = self.batch_size {
            campaign.batch_size = batch_size;
        }
        if let Some(workers) = self.workers {
            campaign.workers = workers;
        }
        if let Some(ref template) = self.template {
            campaign.template = Some(template.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateCampaignRequest {
        CreateCampaignRequest {
            name: "reset-wave-1".to_string(),
            project_ids: vec!["acme".to_string()],
            selected_users: [("acme".to_string(), vec!["u1".to_string()])]
                .into_iter()
                .collect(),
            batch_size: 25,
            workers: 2,
            template: None,
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut request = valid_request();
        request.name = "  ".to_string();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_no_projects_rejected() {
        let mut request = valid_request();
        request.project_ids.clear();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut request = valid_request();
        request.batch_size = 0;
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_undeclared_project_users_rejected() {
        let mut request = valid_request();
        request
            .selected_users
            .insert("globex".to_string(), vec!["u9".to_string()]);

        let err = request.validate().unwrap_err();
        assert!(err.to_string().contains("globex"));
    }

    #[test]
    fn test_request_from_yaml() {
        let yaml = r#"
name: reset-wave-1
project_ids:
  - acme
selected_users:
  acme:
    - u1
    - u2
batch_size: 10
"#;
        let request: CreateCampaignRequest = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(request.name, "reset-wave-1");
        assert_eq!(request.selected_users["acme"].len(), 2);
        assert_eq!(request.batch_size, 10);
        // workers falls back to its default
        assert_eq!(request.workers, 1);
    }

    #[test]
    fn test_request_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("campaign.yaml");
        std::fs::write(
            &path,
            "name: from-disk\nproject_ids: [acme]\nselected_users:\n  acme: [u1]\n",
        )
        .unwrap();

        let request = CreateCampaignRequest::from_file(&path).unwrap();
        assert_eq!(request.name, "from-disk");
        assert!(request.validate().is_ok());

        assert!(CreateCampaignRequest::from_file(&temp.path().join("missing.yaml")).is_err());
    }

    #[test]
    fn test_update_apply() {
        let mut campaign = Campaign::new(valid_request());

        let update = UpdateCampaignRequest {
            name: Some("reset-wave-2".to_string()),
            batch_size: Some(100),
            workers: None,
            template: Some("friendly".to_string()),
        };
        update.validate().unwrap();
        update.apply(&mut campaign);

        assert_eq!(campaign.name, "reset-wave-2");
        assert_eq!(campaign.batch_size, 100);
        assert_eq!(campaign.workers, 2);
        assert_eq!(campaign.template.as_deref(), Some("friendly"));
    }
}
