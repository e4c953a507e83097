//! The manifest: version ledger plus reconciliation decisions.
//!
//! Two views are kept side by side:
//!
//! - `local`: a mirror of the on-disk ledger, the versions each environment
//!   had the last time this project synced with it
//! - `remote`: what every environment reports right now, rebuilt on open
//!
//! Decisions compare the two by version token, newest wins.

use crate::asset::{AssetEvent, EventType};
use crate::diff::ThemeDiff;
use crate::error::{SyncError, SyncResult};
use crate::gateway::RemoteGateway;
use crate::version::Version;
use glob::{MatchOptions, Pattern};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use themesync_store::{Snapshot, VersionStore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// File name of the ledger inside the working directory.
pub const LEDGER_FILE: &str = "themesync.lock";

/// Banner written as the ledger's header comment.
pub const MANIFEST_COMMENT: &str = "THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.";

const WILDCARDS: [char; 3] = ['*', '?', '['];

#[derive(Debug, Default)]
struct ManifestState {
    local: Snapshot,
    remote: Snapshot,
}

/// Ledger of believed versions per file per environment.
///
/// All reads and writes of the two views go through one mutex. Ledger
/// commits happen while it is held, so concurrent `set`/`delete` calls from
/// several pipelines serialise on it.
#[derive(Debug)]
pub struct Manifest {
    store: VersionStore,
    state: Mutex<ManifestState>,
}

impl Manifest {
    /// Opens the ledger in `directory` and reconciles it with `gateways`.
    ///
    /// Steps: load the ledger, list every environment's remote assets in
    /// parallel, backfill remote-only entries, prune entries for vanished
    /// files and unconfigured environments.
    ///
    /// # Errors
    ///
    /// Ledger open/corruption errors, and the first remote listing error.
    /// All listings run to completion before that error is returned.
    pub async fn open(directory: &Path, gateways: &[Arc<dyn RemoteGateway>]) -> SyncResult<Self> {
        let store = VersionStore::open(&directory.join(LEDGER_FILE))?;
        store.set_comment(MANIFEST_COMMENT)?;

        let manifest = Self {
            state: Mutex::new(ManifestState {
                local: store.dump()?,
                remote: Snapshot::new(),
            }),
            store,
        };

        manifest.generate_remote(gateways).await?;
        manifest.backfill_local()?;
        manifest.prune(gateways)?;

        debug!(
            ledger = %manifest.store.path().display(),
            files = manifest.state.lock().local.len(),
            "manifest ready"
        );
        Ok(manifest)
    }

    /// Path of the ledger file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Copy of the ledger view.
    #[must_use]
    pub fn local(&self) -> Snapshot {
        self.state.lock().local.clone()
    }

    /// Copy of the remote view.
    #[must_use]
    pub fn remote(&self) -> Snapshot {
        self.state.lock().remote.clone()
    }

    async fn generate_remote(&self, gateways: &[Arc<dyn RemoteGateway>]) -> SyncResult<()> {
        self.state.lock().remote = Snapshot::new();

        let mut queries = JoinSet::new();
        for gateway in gateways {
            let gateway = Arc::clone(gateway);
            queries.spawn(async move {
                let environment = gateway.name().to_string();
                let listing = gateway.list_remote_assets().await;
                (environment, listing)
            });
        }

        let mut first_error = None;
        while let Some(joined) = queries.join_next().await {
            match joined {
                Ok((environment, Ok(assets))) => {
                    debug!(%environment, count = assets.len(), "merging remote listing");
                    let mut state = self.state.lock();
                    for asset in assets {
                        state
                            .remote
                            .entry(asset.key)
                            .or_default()
                            .insert(environment.clone(), asset.version);
                    }
                }
                Ok((environment, Err(e))) => {
                    warn!(%environment, error = %e, "remote listing failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "remote listing task failed");
                    if first_error.is_none() {
                        first_error = Some(SyncError::Worker {
                            environment: "remote listing".to_string(),
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn backfill_local(&self) -> SyncResult<()> {
        let mut state = self.state.lock();
        let mut batch = self.store.batch();

        for (filename, remote_envs) in &state.remote {
            let local_envs = state.local.get(filename);
            for (environment, version) in remote_envs {
                if !local_envs.is_some_and(|envs| envs.contains_key(environment)) {
                    batch.write(filename, environment, version)?;
                }
            }
        }

        if !batch.is_empty() {
            debug!(entries = batch.len(), "backfilling ledger from remote");
        }
        batch.commit()?;
        state.local = self.store.dump()?;
        Ok(())
    }

    fn prune(&self, gateways: &[Arc<dyn RemoteGateway>]) -> SyncResult<()> {
        let mut state = self.state.lock();

        let vanished: Vec<String> = state
            .local
            .keys()
            .filter(|filename| !state.remote.contains_key(*filename))
            .filter(|filename| {
                !gateways
                    .iter()
                    .any(|g| is_regular_file(&g.environment().local_path(filename)))
            })
            .cloned()
            .collect();
        for filename in &vanished {
            debug!(%filename, "pruning vanished file from ledger");
            self.store.delete_collection(filename)?;
        }
        state.local = self.store.dump()?;

        for (filename, envs) in &state.local {
            for environment in envs.keys() {
                if !gateways.iter().any(|g| g.name() == environment) {
                    debug!(%filename, %environment, "pruning unconfigured environment");
                    self.store.delete(filename, environment)?;
                }
            }
        }
        state.local = self.store.dump()?;
        Ok(())
    }

    /// Ledger version of `filename` for `src_env` and remote version for
    /// `dst_env`. Missing or unparsable tokens are zero.
    pub fn diff_dates(&self, filename: &str, dst_env: &str, src_env: &str) -> (Version, Version) {
        let state = self.state.lock();
        let local = Version::parse_opt(state.local.get(filename).and_then(|e| e.get(src_env)));
        let remote = Version::parse_opt(state.remote.get(filename).and_then(|e| e.get(dst_env)));
        (local, remote)
    }

    /// True if the remote copy is newer than the ledger, or the ledger has
    /// never recorded the file.
    pub fn needs_downloading(&self, filename: &str, environment: &str) -> bool {
        let (local, remote) = self.diff_dates(filename, environment, environment);
        local.is_before(&remote) || local.is_zero()
    }

    /// True if the remote copy is older than the ledger, or either side is
    /// unknown.
    pub fn should_upload(&self, filename: &str, environment: &str) -> bool {
        let (local, remote) = self.diff_dates(filename, environment, environment);
        remote.is_before(&local) || remote.is_zero() || local.is_zero()
    }

    /// True if the remote copy is older than the ledger, or the ledger has
    /// never recorded the file.
    pub fn should_remove(&self, filename: &str, environment: &str) -> bool {
        let (local, remote) = self.diff_dates(filename, environment, environment);
        remote.is_before(&local) || local.is_zero()
    }

    /// Dispatches to the check matching `kind`.
    pub fn should(&self, kind: EventType, filename: &str, environment: &str) -> bool {
        match kind {
            EventType::Create | EventType::Update => self.should_upload(filename, environment),
            EventType::Remove => self.should_remove(filename, environment),
            EventType::Retrieve => self.needs_downloading(filename, environment),
        }
    }

    /// Resolves requested names against the remote view.
    ///
    /// No names means every remote file. Literal names pass through as
    /// given; names containing `*`, `?` or `[` are glob patterns matched
    /// against remote files. The result has no duplicates.
    pub fn fetchable_files(&self, filenames: &[String], _environment: &str) -> Vec<String> {
        let state = self.state.lock();
        if filenames.is_empty() {
            return state.remote.keys().cloned().collect();
        }

        let mut seen = HashSet::new();
        let mut fetchable = Vec::new();
        let mut patterns = Vec::new();
        for filename in filenames {
            if filename.contains(WILDCARDS) {
                match Pattern::new(filename) {
                    Ok(pattern) => patterns.push(pattern),
                    Err(e) => warn!(pattern = %filename, error = %e, "ignoring invalid pattern"),
                }
            } else if seen.insert(filename.clone()) {
                fetchable.push(filename.clone());
            }
        }

        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        for asset_name in state.remote.keys() {
            if patterns.iter().any(|p| p.matches_with(asset_name, options))
                && seen.insert(asset_name.clone())
            {
                fetchable.push(asset_name.clone());
            }
        }

        fetchable
    }

    /// Describes what applying `actions` to `dst_env` would change, using
    /// the ledger entries of `src_env`.
    pub fn diff(
        &self,
        actions: &BTreeMap<String, AssetEvent>,
        dst_env: &str,
        src_env: &str,
    ) -> ThemeDiff {
        let mut diff = ThemeDiff::new();
        for (filename, action) in actions {
            let (local, remote) = self.diff_dates(filename, dst_env, src_env);
            if !local.is_zero() && remote.is_zero() {
                diff.removed
                    .push(format!("{filename} {}", local.display_time()));
            }
            if local.is_zero() && !remote.is_zero() && action.kind == EventType::Remove {
                diff.created
                    .push(format!("{filename} {}", remote.display_time()));
            }
            if !local.is_zero() && local.is_before(&remote) {
                diff.updated.push(format!(
                    "{filename} local:{} remote:{}",
                    local.display_time(),
                    remote.display_time()
                ));
            }
        }
        diff
    }

    /// Records that `environment` now holds `value` for `filename`.
    ///
    /// Every environment known remotely for the file is written when the
    /// ledger has no value for the target `environment` yet; otherwise only
    /// the target itself is written.
    pub fn set(&self, filename: &str, environment: &str, value: &str) -> SyncResult<()> {
        let mut state = self.state.lock();
        state
            .remote
            .entry(filename.to_string())
            .or_default()
            .insert(environment.to_string(), value.to_string());

        let mut batch = self.store.batch();
        if let Some(versions) = state.remote.get(filename) {
            for (env, version) in versions {
                // Deliberately reads the target environment, not `env`.
                let current = self.store.read(filename, environment).unwrap_or_default();
                if current.is_empty() || env == environment {
                    batch.write(filename, env, version)?;
                }
            }
        }

        batch.commit()?;
        state.local = self.store.dump()?;
        Ok(())
    }

    /// Forgets `filename` on `environment`, in the ledger and the remote
    /// view.
    pub fn delete(&self, filename: &str, environment: &str) -> SyncResult<()> {
        let mut state = self.state.lock();
        self.store.delete(filename, environment)?;
        if let Some(envs) = state.remote.get_mut(filename) {
            envs.remove(environment);
            if envs.is_empty() {
                state.remote.remove(filename);
            }
        }
        state.local = self.store.dump()?;
        Ok(())
    }

    /// Ledger value for `filename` on `environment`; empty if none.
    pub fn get(&self, filename: &str, environment: &str) -> SyncResult<String> {
        match self.store.read(filename, environment) {
            Ok(version) => Ok(version),
            Err(e) if e.is_not_found() => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_regular_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}
