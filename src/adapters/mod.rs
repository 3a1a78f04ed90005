//! Collaborator interfaces for external systems.
//!
//! The engine talks to two remote collaborators per project: a directory
//! that resolves user identifiers to email addresses, and a delivery
//! channel that triggers the actual notification. Both are fallible
//! remote calls with no further structure.

pub mod identity;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// Re-export the REST identity-service client
pub use identity::IdentityClient;

/// Opaque handle for one backend project.
///
/// Carries whatever the collaborators need to address the project's
/// directory and delivery channel; the engine itself only reads `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectHandle {
    /// Project identifier, unique across the service
    pub id: String,

    /// Credential forwarded to the remote service, if any
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ProjectHandle {
    /// Create a handle with no credential.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            api_key: None,
        }
    }

    /// Attach a credential.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// Directory collaborator: user identifier → email address lookup.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Resolve `user_ids` to email addresses in one batch query.
    ///
    /// Identifiers with no resolvable address are omitted from the
    /// mapping. An `Err` means the whole query failed.
    async fn resolve_emails(
        &self,
        project: &ProjectHandle,
        user_ids: &[String],
    ) -> Result<HashMap<String, String>>;
}

/// Delivery collaborator: trigger one password-reset notification.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Send a reset notification to `email`. An `Err` carries the
    /// underlying failure reason.
    async fn send_reset(&self, project: &ProjectHandle, email: &str) -> Result<()>;
}
