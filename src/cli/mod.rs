//! Command-line interface for herald.
//!
//! Provides commands for running campaigns from declarative YAML files,
//! firing unthrottled blasts, inspecting quota counters, and verifying
//! delivery channels.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use crate::adapters::{IdentityClient, ProjectHandle};
use crate::config;
use crate::core::{CampaignService, JsonQuotaStore, QuotaLedger};
use crate::domain::{CampaignStatus, CreateCampaignRequest};

/// herald - campaign orchestration engine for bulk reset notifications
#[derive(Parser, Debug)]
#[command(name = "herald")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a campaign from a YAML file and poll until it finishes
    Run {
        /// Campaign file (projects + campaign request)
        campaign_file: PathBuf,

        /// Progress poll interval in milliseconds
        #[arg(long, default_value = "500")]
        poll_ms: u64,
    },

    /// Fire-and-forget reset sends for one project (no campaign record)
    Blast {
        /// Project identifier
        project_id: String,

        /// Comma-separated user identifiers
        #[arg(short, long)]
        users: String,

        /// Credential for the identity service
        #[arg(long, env = "HERALD_API_KEY")]
        api_key: Option<String>,
    },

    /// Show today's quota count for a project, or the whole ledger
    Quota {
        /// Project identifier (all records when omitted)
        project_id: Option<String>,
    },

    /// Send a single test reset notification
    TestSend {
        /// Project identifier
        project_id: String,

        /// Recipient address
        email: String,

        /// Credential for the identity service
        #[arg(long, env = "HERALD_API_KEY")]
        api_key: Option<String>,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Campaign file schema: the project handles plus the campaign request.
#[derive(Debug, Deserialize)]
struct CampaignFile {
    projects: Vec<ProjectHandle>,
    campaign: CreateCampaignRequest,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                campaign_file,
                poll_ms,
            } => run_campaign(&campaign_file, poll_ms).await,
            Commands::Blast {
                project_id,
                users,
                api_key,
            } => blast(&project_id, &users, api_key).await,
            Commands::Quota { project_id } => show_quota(project_id.as_deref()).await,
            Commands::TestSend {
                project_id,
                email,
                api_key,
            } => test_send(&project_id, &email, api_key).await,
            Commands::Config => show_config(),
        }
    }
}

/// Build a service instance from the resolved configuration.
async fn build_service() -> Result<CampaignService> {
    let cfg = config::config()?;

    let identity = Arc::new(IdentityClient::new(cfg.directory_url.clone()));
    let store = JsonQuotaStore::new(cfg.quota_path());
    let ledger = Arc::new(
        QuotaLedger::open(Box::new(store))
            .await
            .context("Failed to open quota ledger")?,
    );

    Ok(CampaignService::new(
        identity.clone(),
        identity,
        ledger,
        cfg.pacing,
    ))
}

/// Run a campaign to a terminal status, printing progress along the way
async fn run_campaign(campaign_file: &Path, poll_ms: u64) -> Result<()> {
    let content = std::fs::read_to_string(campaign_file)
        .with_context(|| format!("Failed to read campaign file: {}", campaign_file.display()))?;
    let file: CampaignFile =
        serde_yaml::from_str(&content).context("Failed to parse campaign YAML")?;

    let service = build_service().await?;
    for handle in file.projects {
        service.register_project(handle).await;
    }

    let id = service.create(file.campaign).await?;
    service.start(id).await?;
    eprintln!("[Campaign {} started]", id);

    let poll = Duration::from_millis(poll_ms.max(50));
    let mut last_processed = 0;

    let final_record = loop {
        tokio::time::sleep(poll).await;
        let record = service.get(id).await?;

        if record.progress.processed != last_processed {
            last_processed = record.progress.processed;
            eprintln!(
                "  processed {} (ok {}, failed {})",
                record.progress.processed, record.progress.successful, record.progress.failed
            );
        }

        if record.status.is_terminal() {
            break record;
        }
    };

    println!("Campaign: {} ({})", final_record.name, final_record.id);
    println!("Status: {:?}", final_record.status);
    println!(
        "Processed: {}  Successful: {}  Failed: {}",
        final_record.progress.processed,
        final_record.progress.successful,
        final_record.progress.failed
    );

    println!("\nPer project:");
    for project_id in &final_record.project_ids {
        if let Some(progress) = final_record.per_project.get(project_id) {
            println!(
                "  {}: processed {} (ok {}, failed {})",
                project_id, progress.processed, progress.successful, progress.failed
            );
        }
    }

    if !final_record.errors.is_empty() {
        println!("\nErrors:");
        for error in &final_record.errors {
            println!("  - {}", error);
        }
    }

    if final_record.status == CampaignStatus::Failed {
        std::process::exit(1);
    }

    Ok(())
}

/// Fire an unthrottled blast for one project
async fn blast(project_id: &str, users: &str, api_key: Option<String>) -> Result<()> {
    let user_ids: Vec<String> = users
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if user_ids.is_empty() {
        anyhow::bail!("No user identifiers given");
    }

    let service = build_service().await?;

    let mut handle = ProjectHandle::new(project_id);
    if let Some(key) = api_key {
        handle = handle.with_api_key(key);
    }
    service.register_project(handle).await;

    let fired = service
        .lightning_send(project_id, user_ids)
        .await?;

    println!("Fired {} sends (outcomes not awaited)", fired);
    Ok(())
}

/// Print quota counters
async fn show_quota(project_id: Option<&str>) -> Result<()> {
    let service = build_service().await?;

    match project_id {
        Some(project) => {
            let count = service.quota_today(project).await;
            println!("{}: {} sent today", project, count);
        }
        None => {
            let records = service.quota_all().await;
            if records.is_empty() {
                println!("No quota records");
                return Ok(());
            }

            let mut keys: Vec<_> = records.keys().cloned().collect();
            keys.sort();

            println!("{:<30} {:<12} {:>10}", "PROJECT", "DATE", "SENT");
            println!("{}", "-".repeat(54));
            for key in keys {
                let record = &records[&key];
                println!(
                    "{:<30} {:<12} {:>10}",
                    record.project_id, record.date, record.sent_count
                );
            }
        }
    }

    Ok(())
}

/// Send one test notification and report the outcome
async fn test_send(project_id: &str, email: &str, api_key: Option<String>) -> Result<()> {
    let service = build_service().await?;

    let mut handle = ProjectHandle::new(project_id);
    if let Some(key) = api_key {
        handle = handle.with_api_key(key);
    }
    service.register_project(handle).await;

    service.test_send(project_id, email).await?;
    println!("Test send to {} succeeded", email);
    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("Home: {}", cfg.home.display());
    println!("Quota ledger: {}", cfg.quota_path().display());
    println!("Directory URL: {}", cfg.directory_url);
    println!(
        "Pacing: {}ms per item, {}ms per batch",
        cfg.pacing.item_delay.as_millis(),
        cfg.pacing.batch_delay.as_millis()
    );
    match cfg.config_file {
        Some(ref path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none found)"),
    }

    Ok(())
}
