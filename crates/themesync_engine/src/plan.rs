//! Turning a command into events for one environment.

use crate::asset::{Asset, AssetEvent, EventType};
use crate::error::SyncResult;
use crate::gateway::RemoteGateway;
use crate::manifest::Manifest;
use std::collections::BTreeMap;
use tracing::debug;

/// Theme settings depend on every other asset, so an upload sends this key
/// last.
pub const SETTINGS_DATA_KEY: &str = "config/settings_data.json";

/// Events to enqueue plus the names that were dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Events in the order they must be sent.
    pub events: Vec<AssetEvent>,
    /// `(name, reason)` for every name that did not become an event.
    pub skipped: Vec<(String, String)>,
}

impl Plan {
    /// The planned events keyed by asset. A later event for the same key
    /// wins.
    #[must_use]
    pub fn actions(&self) -> BTreeMap<String, AssetEvent> {
        self.events
            .iter()
            .map(|event| (event.key().to_string(), event.clone()))
            .collect()
    }

    /// Returns true if there is nothing to send.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn skip(&mut self, name: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push((name.into(), reason.into()));
    }
}

/// Plans a replace: make the remote store mirror the local directory.
///
/// Without names, every remote asset is removed unless a local asset with
/// the same key exists, in which case it is uploaded instead. With names,
/// only those local assets are uploaded. Removals come first.
pub async fn plan_replace(gateway: &dyn RemoteGateway, filenames: &[String]) -> SyncResult<Plan> {
    let environment = gateway.name();
    let mut plan = Plan::default();
    let mut actions = BTreeMap::new();

    if filenames.is_empty() {
        for asset in gateway.list_remote_assets().await? {
            actions.insert(asset.key.clone(), AssetEvent::removal(asset, environment));
        }
        for asset in gateway.list_local_assets().await? {
            actions.insert(asset.key.clone(), AssetEvent::upload(asset, environment));
        }
    } else {
        for name in filenames {
            match read_valid(gateway, name).await {
                Ok(asset) => {
                    actions.insert(asset.key.clone(), AssetEvent::upload(asset, environment));
                }
                Err(reason) => plan.skip(name, reason),
            }
        }
    }

    let (removals, uploads): (Vec<_>, Vec<_>) = actions
        .into_values()
        .partition(|event| event.kind == EventType::Remove);
    plan.events = removals.into_iter().chain(uploads).collect();

    debug!(%environment, events = plan.events.len(), skipped = plan.skipped.len(), "planned replace");
    Ok(plan)
}

/// Plans an upload of local assets, all or the named ones.
///
/// Unless `force` is set, an asset whose remote copy changed since the
/// ledger last recorded it is skipped. [`SETTINGS_DATA_KEY`] is always
/// planned after every other asset.
pub async fn plan_upload(
    gateway: &dyn RemoteGateway,
    manifest: &Manifest,
    filenames: &[String],
    force: bool,
) -> SyncResult<Plan> {
    let environment = gateway.name();
    let mut plan = Plan::default();

    let assets = if filenames.is_empty() {
        gateway.list_local_assets().await?
    } else {
        let mut assets = Vec::with_capacity(filenames.len());
        for name in filenames {
            match read_valid(gateway, name).await {
                Ok(asset) => assets.push(asset),
                Err(reason) => plan.skip(name, reason),
            }
        }
        assets
    };

    for asset in assets {
        let (recorded, current) = manifest.diff_dates(&asset.key, environment, environment);
        if !force && !recorded.is_zero() && recorded.is_before(&current) {
            plan.skip(
                asset.key,
                format!("changed remotely at {}, use --force to overwrite", current.display_time()),
            );
            continue;
        }
        plan.events.push(AssetEvent::upload(asset, environment));
    }

    let (settings, others): (Vec<_>, Vec<_>) = std::mem::take(&mut plan.events)
        .into_iter()
        .partition(|event| event.key() == SETTINGS_DATA_KEY);
    plan.events = others.into_iter().chain(settings).collect();

    debug!(%environment, events = plan.events.len(), skipped = plan.skipped.len(), "planned upload");
    Ok(plan)
}

/// Plans a download of remote assets, all or the named ones.
///
/// Names may be glob patterns. Unless `force` is set, only files the ledger
/// says are stale, or that are missing locally, are fetched.
pub async fn plan_download(
    gateway: &dyn RemoteGateway,
    manifest: &Manifest,
    filenames: &[String],
    force: bool,
) -> SyncResult<Plan> {
    let environment = gateway.name();
    let mut plan = Plan::default();

    for filename in manifest.fetchable_files(filenames, environment) {
        let missing = !gateway.environment().local_path(&filename).is_file();
        if force || missing || manifest.should(EventType::Retrieve, &filename, environment) {
            plan.events
                .push(AssetEvent::retrieve(Asset::listed(filename, ""), environment));
        } else {
            plan.skip(filename, "up to date");
        }
    }

    debug!(%environment, events = plan.events.len(), skipped = plan.skipped.len(), "planned download");
    Ok(plan)
}

async fn read_valid(gateway: &dyn RemoteGateway, name: &str) -> Result<Asset, String> {
    match gateway.read_local_asset(name).await {
        Ok(asset) if asset.is_valid() => Ok(asset),
        Ok(_) => Err("not a valid asset key".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::gateway::MockGateway;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn kinds(plan: &Plan) -> Vec<(EventType, &str)> {
        plan.events.iter().map(|e| (e.kind, e.key())).collect()
    }

    #[tokio::test]
    async fn full_replace_removes_first() {
        let gw = MockGateway::new(Environment::new("dev", "memory", "."));
        gw.add_remote("a", "2021-01-01T00:00:00Z");
        gw.add_remote("b", "2021-01-01T00:00:00Z");
        gw.add_local("b", b"b");
        gw.add_local("c", b"c");

        let plan = plan_replace(&gw, &[]).await.unwrap();
        assert_eq!(
            kinds(&plan),
            vec![
                (EventType::Remove, "a"),
                (EventType::Update, "b"),
                (EventType::Update, "c"),
            ]
        );
        assert!(plan.skipped.is_empty());
    }

    #[tokio::test]
    async fn selective_replace_skips_unknown_names() {
        let gw = MockGateway::new(Environment::new("dev", "memory", "."));
        gw.add_remote("a", "2021-01-01T00:00:00Z");
        gw.add_local("b", b"b");

        let names = vec!["b".to_string(), "missing.js".to_string()];
        let plan = plan_replace(&gw, &names).await.unwrap();
        assert_eq!(kinds(&plan), vec![(EventType::Update, "b")]);
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].0, "missing.js");
    }

    #[tokio::test]
    async fn full_replace_propagates_listing_failure() {
        let gw = MockGateway::new(Environment::new("dev", "memory", "."));
        gw.set_fail_listing(true);
        assert!(plan_replace(&gw, &[]).await.is_err());
    }

    #[tokio::test]
    async fn upload_skips_remote_changes_unless_forced() {
        let dir = tempdir().unwrap();
        let gw = Arc::new(MockGateway::new(Environment::new("dev", "memory", dir.path())));
        gw.add_remote("a.js", "2021-01-01T00:00:00Z");
        gw.add_local("a.js", b"a");
        gw.add_local("b.js", b"b");
        let gateways: Vec<Arc<dyn RemoteGateway>> = vec![gw.clone()];
        let manifest = Manifest::open(dir.path(), &gateways).await.unwrap();

        // Ledger and remote agree: nothing changed remotely.
        let plan = plan_upload(gw.as_ref(), &manifest, &[], false).await.unwrap();
        assert_eq!(plan.events.len(), 2);

        // Someone else uploads a.js; the ledger still holds the old token.
        gw.add_remote("a.js", "2022-01-01T00:00:00Z");
        let manifest = Manifest::open(dir.path(), &gateways).await.unwrap();
        let plan = plan_upload(gw.as_ref(), &manifest, &[], false).await.unwrap();
        assert_eq!(kinds(&plan), vec![(EventType::Update, "b.js")]);
        assert_eq!(plan.skipped[0].0, "a.js");

        let plan = plan_upload(gw.as_ref(), &manifest, &[], true).await.unwrap();
        assert_eq!(plan.events.len(), 2);
    }

    #[tokio::test]
    async fn upload_sends_settings_data_last() {
        let dir = tempdir().unwrap();
        let gw = Arc::new(MockGateway::new(Environment::new("dev", "memory", dir.path())));
        gw.add_local(SETTINGS_DATA_KEY, b"{}");
        gw.add_local("assets/app.js", b"a");
        gw.add_local("layout/theme.liquid", b"<html>");
        let gateways: Vec<Arc<dyn RemoteGateway>> = vec![gw.clone()];
        let manifest = Manifest::open(dir.path(), &gateways).await.unwrap();

        let plan = plan_upload(gw.as_ref(), &manifest, &[], false).await.unwrap();
        assert_eq!(
            kinds(&plan),
            vec![
                (EventType::Update, "assets/app.js"),
                (EventType::Update, "layout/theme.liquid"),
                (EventType::Update, SETTINGS_DATA_KEY),
            ]
        );

        let names = vec![SETTINGS_DATA_KEY.to_string(), "assets/app.js".to_string()];
        let plan = plan_upload(gw.as_ref(), &manifest, &names, false).await.unwrap();
        assert_eq!(plan.events.last().map(AssetEvent::key), Some(SETTINGS_DATA_KEY));
    }

    #[tokio::test]
    async fn download_fetches_missing_and_stale_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("present.js"), b"p").unwrap();
        let gw = Arc::new(MockGateway::new(Environment::new("dev", "memory", dir.path())));
        gw.add_remote("present.js", "2021-01-01T00:00:00Z");
        gw.add_remote("absent.js", "2021-01-01T00:00:00Z");
        let gateways: Vec<Arc<dyn RemoteGateway>> = vec![gw.clone()];
        let manifest = Manifest::open(dir.path(), &gateways).await.unwrap();

        let plan = plan_download(gw.as_ref(), &manifest, &[], false).await.unwrap();
        assert_eq!(kinds(&plan), vec![(EventType::Retrieve, "absent.js")]);
        assert_eq!(plan.skipped, vec![("present.js".to_string(), "up to date".to_string())]);

        let plan = plan_download(gw.as_ref(), &manifest, &[], true).await.unwrap();
        assert_eq!(plan.events.len(), 2);
    }

    #[test]
    fn actions_keep_last_event_per_key() {
        let plan = Plan {
            events: vec![
                AssetEvent::removal(Asset::listed("a", ""), "dev"),
                AssetEvent::upload(Asset::new("a", "x"), "dev"),
            ],
            skipped: Vec::new(),
        };
        assert_eq!(plan.actions()["a"].kind, EventType::Update);
    }
}
