//! Per-environment sync pipeline.
//!
//! A pipeline is a bounded queue of [`AssetEvent`]s drained by one worker
//! task. The worker applies each event through the gateway, records the
//! outcome in the manifest, and reports a [`SyncMessage`]. One failed event
//! never stops the worker.
//!
//! Ledger writes fsync while holding the manifest lock, so the worker runs
//! them on the blocking pool.

use crate::asset::{Acknowledgement, AssetEvent, EventType};
use crate::error::{SyncError, SyncResult};
use crate::gateway::RemoteGateway;
use crate::manifest::Manifest;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Capacity of the event queue. Senders wait until the worker is ready.
const QUEUE_CAPACITY: usize = 1;

/// Outcome of one event, or of one name that never became an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMessage {
    /// The remote store accepted the event.
    Applied {
        /// Environment name.
        environment: String,
        /// Event kind.
        kind: EventType,
        /// Asset key.
        key: String,
        /// Host that served the request.
        host: String,
    },
    /// The event failed.
    Failed {
        /// Environment name.
        environment: String,
        /// Event kind.
        kind: EventType,
        /// Asset key.
        key: String,
        /// Rendered cause.
        cause: String,
    },
    /// The asset was left alone.
    Skipped {
        /// Environment name.
        environment: String,
        /// Asset key or requested name.
        key: String,
        /// Why.
        reason: String,
    },
}

impl SyncMessage {
    /// Environment the message is about.
    #[must_use]
    pub fn environment(&self) -> &str {
        match self {
            SyncMessage::Applied { environment, .. }
            | SyncMessage::Failed { environment, .. }
            | SyncMessage::Skipped { environment, .. } => environment,
        }
    }

    /// Returns true for [`SyncMessage::Failed`].
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, SyncMessage::Failed { .. })
    }
}

impl fmt::Display for SyncMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMessage::Applied {
                environment,
                kind,
                key,
                host,
            } => write!(f, "[{environment}] {kind} {key} on {host}"),
            SyncMessage::Failed {
                environment,
                kind,
                key,
                cause,
            } => write!(f, "[{environment}] {kind} {key} failed: {cause}"),
            SyncMessage::Skipped {
                environment,
                key,
                reason,
            } => write!(f, "[{environment}] skipped {key}: {reason}"),
        }
    }
}

/// Sending half of the shared result stream.
pub type Reporter = mpsc::UnboundedSender<SyncMessage>;

/// Counters for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Events the remote accepted.
    pub applied: usize,
    /// Events that failed.
    pub failed: usize,
    /// Names dropped while planning.
    pub skipped: usize,
}

impl PipelineStats {
    /// Returns true if nothing failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Queue plus worker for one environment.
#[derive(Debug)]
pub struct Pipeline {
    environment: String,
    queue: mpsc::Sender<AssetEvent>,
    worker: JoinHandle<PipelineStats>,
}

impl Pipeline {
    /// Starts the worker.
    ///
    /// Outcomes are recorded in `manifest` when one is given and reported on
    /// `reporter`. A dropped reporter receiver is not an error.
    pub fn spawn(
        gateway: Arc<dyn RemoteGateway>,
        manifest: Option<Arc<Manifest>>,
        reporter: Reporter,
    ) -> Self {
        let environment = gateway.name().to_string();
        let (queue, events) = mpsc::channel(QUEUE_CAPACITY);
        let worker = tokio::spawn(drain(gateway, manifest, reporter, events));
        Self {
            environment,
            queue,
            worker,
        }
    }

    /// Environment served by this pipeline.
    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// A clonable handle on the queue.
    ///
    /// [`Pipeline::close`] only completes once every handle is dropped.
    #[must_use]
    pub fn queue(&self) -> mpsc::Sender<AssetEvent> {
        self.queue.clone()
    }

    /// Enqueues one event, waiting while the queue is full.
    pub async fn send(&self, event: AssetEvent) -> SyncResult<()> {
        self.queue
            .send(event)
            .await
            .map_err(|_| SyncError::QueueClosed {
                environment: self.environment.clone(),
            })
    }

    /// Closes the queue and waits for the worker to drain it.
    pub async fn close(self) -> SyncResult<PipelineStats> {
        let Pipeline {
            environment,
            queue,
            worker,
        } = self;
        drop(queue);
        worker.await.map_err(|e| SyncError::Worker {
            environment,
            message: e.to_string(),
        })
    }
}

async fn drain(
    gateway: Arc<dyn RemoteGateway>,
    manifest: Option<Arc<Manifest>>,
    reporter: Reporter,
    mut events: mpsc::Receiver<AssetEvent>,
) -> PipelineStats {
    let environment = gateway.name().to_string();
    let mut stats = PipelineStats::default();

    while let Some(event) = events.recv().await {
        let message = match perform(gateway.as_ref(), manifest.as_ref(), &event).await {
            Ok(ack) => {
                stats.applied += 1;
                SyncMessage::Applied {
                    environment: environment.clone(),
                    kind: event.kind,
                    key: event.asset.key,
                    host: ack.host,
                }
            }
            Err(e) => {
                stats.failed += 1;
                SyncMessage::Failed {
                    environment: environment.clone(),
                    kind: event.kind,
                    key: event.asset.key,
                    cause: e.to_string(),
                }
            }
        };
        // Nobody listening is fine.
        let _ = reporter.send(message);
    }

    debug!(%environment, applied = stats.applied, failed = stats.failed, "pipeline drained");
    stats
}

async fn perform(
    gateway: &dyn RemoteGateway,
    manifest: Option<&Arc<Manifest>>,
    event: &AssetEvent,
) -> SyncResult<Acknowledgement> {
    let ack = gateway.apply(event).await?;
    if let Some(manifest) = manifest {
        record(Arc::clone(manifest), gateway.name(), event, &ack.version)
            .await
            .map_err(|e| SyncError::LedgerUpdate {
                environment: gateway.name().to_string(),
                key: event.key().to_string(),
                source: Box::new(e),
            })?;
    }
    Ok(ack)
}

async fn record(
    manifest: Arc<Manifest>,
    environment: &str,
    event: &AssetEvent,
    version: &str,
) -> SyncResult<()> {
    let kind = event.kind;
    let key = event.key().to_string();
    let env = environment.to_string();
    let version = version.to_string();

    tokio::task::spawn_blocking(move || match kind {
        EventType::Remove => manifest.delete(&key, &env),
        EventType::Create | EventType::Update | EventType::Retrieve => {
            manifest.set(&key, &env, &version)
        }
    })
    .await
    .map_err(|e| SyncError::Worker {
        environment: environment.to_string(),
        message: e.to_string(),
    })?
}
