//! Runs one pipeline per environment and joins them.

use crate::error::{SyncError, SyncResult};
use crate::gateway::RemoteGateway;
use crate::manifest::Manifest;
use crate::pipeline::{Pipeline, PipelineStats, Reporter, SyncMessage};
use crate::plan::{plan_download, plan_replace, plan_upload, Plan};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// What to run against every environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Make the remote store mirror the local directory.
    Replace,
    /// Push local assets.
    Upload {
        /// Overwrite remote changes.
        force: bool,
    },
    /// Fetch remote assets.
    Download {
        /// Fetch even when up to date.
        force: bool,
    },
}

impl Command {
    /// Returns true if the command changes remote stores.
    #[must_use]
    pub fn mutates_remote(&self) -> bool {
        !matches!(self, Command::Download { .. })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Replace => f.write_str("replace"),
            Command::Upload { .. } => f.write_str("upload"),
            Command::Download { .. } => f.write_str("download"),
        }
    }
}

/// Result for one environment.
#[derive(Debug)]
pub struct EnvironmentOutcome {
    /// Environment name.
    pub environment: String,
    /// Counters, or the error that stopped this environment.
    pub result: SyncResult<PipelineStats>,
}

impl EnvironmentOutcome {
    /// Returns true if the environment ran and no event failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(&self.result, Ok(stats) if stats.is_clean())
    }
}

/// Everything a run produced.
#[derive(Debug, Default)]
pub struct RunReport {
    /// One entry per environment, sorted by name.
    pub outcomes: Vec<EnvironmentOutcome>,
    /// Every message reported, in arrival order.
    pub messages: Vec<SyncMessage>,
}

impl RunReport {
    /// Returns true if every environment succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(EnvironmentOutcome::is_success)
    }

    /// Environments that stopped with an error.
    pub fn errors(&self) -> impl Iterator<Item = (&str, &SyncError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.environment.as_str(), e)))
    }

    /// Sum of all environments' counters.
    #[must_use]
    pub fn totals(&self) -> PipelineStats {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .fold(PipelineStats::default(), |acc, s| PipelineStats {
                applied: acc.applied + s.applied,
                failed: acc.failed + s.failed,
                skipped: acc.skipped + s.skipped,
            })
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(stats) => writeln!(
                    f,
                    "[{}] {} applied, {} failed, {} skipped",
                    outcome.environment, stats.applied, stats.failed, stats.skipped
                )?,
                Err(e) => writeln!(f, "[{}] error: {e}", outcome.environment)?,
            }
        }
        Ok(())
    }
}

/// Drives commands across every configured environment.
pub struct Orchestrator {
    gateways: Vec<Arc<dyn RemoteGateway>>,
    manifest: Arc<Manifest>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.gateways.iter().map(|g| g.name()).collect();
        f.debug_struct("Orchestrator")
            .field("environments", &names)
            .field("ledger", &self.manifest.path())
            .finish()
    }
}

impl Orchestrator {
    /// Creates an orchestrator over `gateways` sharing `manifest`.
    pub fn new(gateways: Vec<Arc<dyn RemoteGateway>>, manifest: Arc<Manifest>) -> Self {
        Self { gateways, manifest }
    }

    /// The shared manifest.
    #[must_use]
    pub fn manifest(&self) -> &Arc<Manifest> {
        &self.manifest
    }

    /// Replaces every environment's remote store with the local directory.
    pub async fn replace(&self, filenames: &[String]) -> RunReport {
        self.run(Command::Replace, filenames).await
    }

    /// Uploads local assets to every environment.
    pub async fn upload(&self, filenames: &[String], force: bool) -> RunReport {
        self.run(Command::Upload { force }, filenames).await
    }

    /// Downloads remote assets from every environment.
    pub async fn download(&self, filenames: &[String], force: bool) -> RunReport {
        self.run(Command::Download { force }, filenames).await
    }

    /// Runs `command` for every environment concurrently and waits for all
    /// of them. One environment failing never stops another.
    pub async fn run(&self, command: Command, filenames: &[String]) -> RunReport {
        let (reporter, messages) = mpsc::unbounded_channel();
        let listener = tokio::spawn(listen(messages));

        let mut runs = Vec::with_capacity(self.gateways.len());
        for gateway in &self.gateways {
            let environment = gateway.name().to_string();
            let handle = tokio::spawn(run_environment(
                command,
                Arc::clone(gateway),
                Arc::clone(&self.manifest),
                reporter.clone(),
                filenames.to_vec(),
            ));
            runs.push((environment, handle));
        }
        drop(reporter);

        let mut outcomes = Vec::with_capacity(runs.len());
        for (environment, handle) in runs {
            let result = handle.await.unwrap_or_else(|e| {
                Err(SyncError::Worker {
                    environment: environment.clone(),
                    message: e.to_string(),
                })
            });
            if let Err(e) = &result {
                warn!(%environment, error = %e, "{command} failed");
            }
            outcomes.push(EnvironmentOutcome {
                environment,
                result,
            });
        }
        outcomes.sort_by(|a, b| a.environment.cmp(&b.environment));

        let messages = listener.await.unwrap_or_default();
        RunReport { outcomes, messages }
    }
}

async fn run_environment(
    command: Command,
    gateway: Arc<dyn RemoteGateway>,
    manifest: Arc<Manifest>,
    reporter: Reporter,
    filenames: Vec<String>,
) -> SyncResult<PipelineStats> {
    if command.mutates_remote() && gateway.environment().read_only {
        return Err(SyncError::ReadOnly {
            environment: gateway.name().to_string(),
        });
    }

    let plan: Plan = match command {
        Command::Replace => plan_replace(gateway.as_ref(), &filenames).await?,
        Command::Upload { force } => {
            plan_upload(gateway.as_ref(), &manifest, &filenames, force).await?
        }
        Command::Download { force } => {
            plan_download(gateway.as_ref(), &manifest, &filenames, force).await?
        }
    };

    let skipped = plan.skipped.len();
    for (key, reason) in plan.skipped {
        let _ = reporter.send(SyncMessage::Skipped {
            environment: gateway.name().to_string(),
            key,
            reason,
        });
    }

    let pipeline = Pipeline::spawn(Arc::clone(&gateway), Some(manifest), reporter);
    for event in plan.events {
        if pipeline.send(event).await.is_err() {
            break;
        }
    }
    let mut stats = pipeline.close().await?;
    stats.skipped = skipped;
    Ok(stats)
}

async fn listen(mut messages: mpsc::UnboundedReceiver<SyncMessage>) -> Vec<SyncMessage> {
    let mut seen = Vec::new();
    while let Some(message) = messages.recv().await {
        match &message {
            SyncMessage::Applied { .. } => info!("{message}"),
            SyncMessage::Failed { .. } | SyncMessage::Skipped { .. } => warn!("{message}"),
        }
        seen.push(message);
    }
    seen
}
