//! Remote replica gateway abstraction.

use crate::asset::{Acknowledgement, Asset, AssetEvent, EventType};
use crate::config::Environment;
use crate::error::{SyncError, SyncResult};
use crate::version::token_now;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

/// Access to one environment: its remote store and its local directory.
///
/// Exactly one gateway exists per configured environment. Timeouts and
/// transport retries are the gateway's business; the engine never cancels a
/// call.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// The environment this gateway serves.
    fn environment(&self) -> &Environment;

    /// Lists every asset of the remote store with its version token.
    async fn list_remote_assets(&self) -> SyncResult<Vec<Asset>>;

    /// Lists every synchronisable asset of the local directory.
    async fn list_local_assets(&self) -> SyncResult<Vec<Asset>>;

    /// Reads one local asset.
    ///
    /// Fails if the file is missing, is not a regular file, or is excluded
    /// by the environment's ignore rules.
    async fn read_local_asset(&self, name: &str) -> SyncResult<Asset>;

    /// Performs one event against the remote store.
    async fn apply(&self, event: &AssetEvent) -> SyncResult<Acknowledgement>;

    /// Shorthand for the environment name.
    fn name(&self) -> &str {
        &self.environment().name
    }
}

/// A scriptable in-memory gateway for tests.
#[derive(Debug)]
pub struct MockGateway {
    environment: Environment,
    remote: Mutex<BTreeMap<String, Asset>>,
    local: Mutex<BTreeMap<String, Asset>>,
    applied: Mutex<Vec<AssetEvent>>,
    fail_listing: AtomicBool,
    failing_keys: Mutex<HashSet<String>>,
}

impl MockGateway {
    /// Creates an empty gateway for `environment`.
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            remote: Mutex::new(BTreeMap::new()),
            local: Mutex::new(BTreeMap::new()),
            applied: Mutex::new(Vec::new()),
            fail_listing: AtomicBool::new(false),
            failing_keys: Mutex::new(HashSet::new()),
        }
    }

    /// Adds an asset to the remote store.
    pub fn add_remote(&self, key: &str, version: &str) {
        self.remote
            .lock()
            .insert(key.to_string(), Asset::listed(key, version));
    }

    /// Adds an asset to the local directory.
    pub fn add_local(&self, key: &str, content: &[u8]) {
        self.local
            .lock()
            .insert(key.to_string(), Asset::new(key, content));
    }

    /// Makes remote listings fail.
    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Makes every event for `key` fail.
    pub fn fail_key(&self, key: &str) {
        self.failing_keys.lock().insert(key.to_string());
    }

    /// Events applied so far, in order.
    pub fn applied(&self) -> Vec<AssetEvent> {
        self.applied.lock().clone()
    }

    /// Current remote keys.
    pub fn remote_keys(&self) -> Vec<String> {
        self.remote.lock().keys().cloned().collect()
    }
}

#[async_trait]
impl RemoteGateway for MockGateway {
    fn environment(&self) -> &Environment {
        &self.environment
    }

    async fn list_remote_assets(&self) -> SyncResult<Vec<Asset>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(SyncError::remote(&self.environment.name, "listing failed"));
        }
        Ok(self.remote.lock().values().cloned().collect())
    }

    async fn list_local_assets(&self) -> SyncResult<Vec<Asset>> {
        Ok(self
            .local
            .lock()
            .values()
            .filter(|a| !self.environment.is_ignored(&a.key))
            .cloned()
            .collect())
    }

    async fn read_local_asset(&self, name: &str) -> SyncResult<Asset> {
        if self.environment.is_ignored(name) {
            return Err(SyncError::Ignored {
                environment: self.environment.name.clone(),
                key: name.to_string(),
            });
        }
        self.local
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| SyncError::AssetNotFound {
                environment: self.environment.name.clone(),
                key: name.to_string(),
            })
    }

    async fn apply(&self, event: &AssetEvent) -> SyncResult<Acknowledgement> {
        if self.environment.read_only && event.kind.is_mutation() {
            return Err(SyncError::ReadOnly {
                environment: self.environment.name.clone(),
            });
        }
        if self.failing_keys.lock().contains(event.key()) {
            return Err(SyncError::remote(
                &self.environment.name,
                format!("rejected {}", event.key()),
            ));
        }

        self.applied.lock().push(event.clone());

        let mut remote = self.remote.lock();
        let version = match event.kind {
            EventType::Create | EventType::Update => {
                let version = token_now();
                remote.insert(
                    event.key().to_string(),
                    Asset::listed(event.key(), version.clone()),
                );
                version
            }
            EventType::Remove => {
                remote.remove(event.key());
                String::new()
            }
            EventType::Retrieve => remote
                .get(event.key())
                .map(|a| a.version.clone())
                .ok_or_else(|| SyncError::AssetNotFound {
                    environment: self.environment.name.clone(),
                    key: event.key().to_string(),
                })?,
        };

        Ok(Acknowledgement {
            host: format!("mock://{}", self.environment.store),
            version,
        })
    }
}
