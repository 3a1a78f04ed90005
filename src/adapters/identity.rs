//! REST client for the identity service.
//!
//! One remote service fronts both collaborator roles: directory lookups
//! and reset-notification delivery, addressed per project.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::{Delivery, Directory, ProjectHandle};

/// HTTP client for the identity service.
pub struct IdentityClient {
    /// Service base URL, without trailing slash
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

/// Response from the batch resolve endpoint
#[derive(Debug, Deserialize)]
struct ResolveResponse {
    emails: HashMap<String, String>,
}

/// Response from the send endpoint
#[derive(Debug, Deserialize)]
struct SendResponse {
    success: bool,
    error: Option<String>,
}

impl IdentityClient {
    /// Create a new client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Build a per-project endpoint URL.
    fn project_url(&self, project: &ProjectHandle, endpoint: &str) -> String {
        format!("{}/projects/{}/{}", self.base_url, project.id, endpoint)
    }

    /// Attach the project credential, when present.
    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        project: &ProjectHandle,
    ) -> reqwest::RequestBuilder {
        match project.api_key {
            Some(ref key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl Directory for IdentityClient {
    async fn resolve_emails(
        &self,
        project: &ProjectHandle,
        user_ids: &[String],
    ) -> Result<HashMap<String, String>> {
        let url = self.project_url(project, "resolve-emails");

        let response = self
            .authorize(self.client.post(&url), project)
            .json(&serde_json::json!({ "user_ids": user_ids }))
            .send()
            .await
            .with_context(|| format!("Failed to query directory for project '{}'", project.id))?
            .error_for_status()
            .with_context(|| format!("Directory query rejected for project '{}'", project.id))?;

        let resolved: ResolveResponse = response
            .json()
            .await
            .context("Failed to parse directory response")?;

        Ok(resolved.emails)
    }
}

#[async_trait]
impl Delivery for IdentityClient {
    async fn send_reset(&self, project: &ProjectHandle, email: &str) -> Result<()> {
        let url = self.project_url(project, "password-reset");

        let response = self
            .authorize(self.client.post(&url), project)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await
            .with_context(|| format!("Failed to reach delivery for project '{}'", project.id))?;

        let result: SendResponse = response
            .json()
            .await
            .context("Failed to parse delivery response")?;

        if !result.success {
            anyhow::bail!(
                "Delivery rejected: {}",
                result.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_url_building() {
        let client = IdentityClient::new("http://localhost:8000/");
        let project = ProjectHandle::new("acme");

        assert_eq!(
            client.project_url(&project, "resolve-emails"),
            "http://localhost:8000/projects/acme/resolve-emails"
        );
    }
}
