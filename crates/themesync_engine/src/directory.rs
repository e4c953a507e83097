//! Filesystem-backed gateway.
//!
//! The "remote store" is a directory, typically a mounted share or a
//! checkout served by something else. Version tokens are file modification
//! times. Useful on its own and as a loopback replica in tests.

use crate::asset::{Acknowledgement, Asset, AssetEvent, EventType};
use crate::config::{Environment, CONFIG_FILE};
use crate::error::{SyncError, SyncResult};
use crate::gateway::RemoteGateway;
use crate::manifest::LEDGER_FILE;
use crate::version::token_from_time;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use themesync_store::TEMP_SUFFIX;
use tokio::fs;
use tracing::debug;

/// Gateway whose remote store is a local directory.
#[derive(Debug, Clone)]
pub struct DirectoryGateway {
    environment: Environment,
    root: PathBuf,
}

impl DirectoryGateway {
    /// Creates a gateway for `environment`.
    ///
    /// A relative `store` resolves against the environment's directory.
    pub fn new(environment: Environment) -> Self {
        let store = Path::new(&environment.store);
        let root = if store.is_absolute() {
            store.to_path_buf()
        } else {
            environment.directory.join(store)
        };
        Self { environment, root }
    }

    /// Directory acting as the remote store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn remote_error(&self, key: &str, err: io::Error) -> SyncError {
        SyncError::remote(&self.environment.name, format!("{key}: {err}"))
    }

    fn check_key(&self, key: &str) -> SyncResult<()> {
        if Asset::new(key, Vec::new()).is_valid() {
            Ok(())
        } else {
            Err(SyncError::Ignored {
                environment: self.environment.name.clone(),
                key: key.to_string(),
            })
        }
    }

    fn is_workspace_file(key: &str) -> bool {
        key == LEDGER_FILE
            || key == CONFIG_FILE
            || key.strip_prefix(LEDGER_FILE) == Some(TEMP_SUFFIX)
    }

    /// Walks `base`, returning `(key, path)` for every regular file.
    ///
    /// Hidden entries, the ledger and its temporary sibling, the config
    /// file, and the remote root (when it lives inside `base`) are skipped.
    async fn walk(&self, base: &Path) -> io::Result<Vec<(String, PathBuf)>> {
        let mut files = Vec::new();
        let mut pending = vec![(base.to_path_buf(), String::new())];

        while let Some((dir, prefix)) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') {
                    continue;
                }
                let path = entry.path();
                if path == self.root {
                    continue;
                }
                let key = if prefix.is_empty() {
                    name
                } else {
                    format!("{prefix}/{name}")
                };

                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push((path, key));
                } else if file_type.is_file() {
                    if prefix.is_empty() && Self::is_workspace_file(&key) {
                        continue;
                    }
                    files.push((key, path));
                }
            }
        }

        files.sort();
        Ok(files)
    }

    async fn version_of(path: &Path) -> io::Result<String> {
        let modified = fs::metadata(path).await?.modified()?;
        Ok(token_from_time(modified))
    }

    async fn write_file(path: &Path, content: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, content).await
    }
}

#[async_trait]
impl RemoteGateway for DirectoryGateway {
    fn environment(&self) -> &Environment {
        &self.environment
    }

    async fn list_remote_assets(&self) -> SyncResult<Vec<Asset>> {
        let files = self
            .walk(&self.root)
            .await
            .map_err(|e| self.remote_error(&self.root.display().to_string(), e))?;

        let mut assets = Vec::with_capacity(files.len());
        for (key, path) in files {
            let version = Self::version_of(&path)
                .await
                .map_err(|e| self.remote_error(&key, e))?;
            assets.push(Asset::listed(key, version));
        }
        debug!(environment = %self.environment.name, count = assets.len(), "listed remote assets");
        Ok(assets)
    }

    async fn list_local_assets(&self) -> SyncResult<Vec<Asset>> {
        let files = self.walk(&self.environment.directory).await?;

        let mut assets = Vec::with_capacity(files.len());
        for (key, path) in files {
            if self.environment.is_ignored(&key) {
                continue;
            }
            // Gone since the walk; not an asset any more.
            let content = match fs::read(&path).await {
                Ok(content) => content,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let version = Self::version_of(&path).await?;
            assets.push(Asset::new(key, content).with_version(version));
        }
        debug!(environment = %self.environment.name, count = assets.len(), "listed local assets");
        Ok(assets)
    }

    async fn read_local_asset(&self, name: &str) -> SyncResult<Asset> {
        self.check_key(name)?;
        if self.environment.is_ignored(name) {
            return Err(SyncError::Ignored {
                environment: self.environment.name.clone(),
                key: name.to_string(),
            });
        }

        let path = self.environment.local_path(name);
        let not_found = || SyncError::AssetNotFound {
            environment: self.environment.name.clone(),
            key: name.to_string(),
        };
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(not_found()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        }

        let content = fs::read(&path).await?;
        let version = Self::version_of(&path).await?;
        Ok(Asset::new(name, content).with_version(version))
    }

    async fn apply(&self, event: &AssetEvent) -> SyncResult<Acknowledgement> {
        if self.environment.read_only && event.kind.is_mutation() {
            return Err(SyncError::ReadOnly {
                environment: self.environment.name.clone(),
            });
        }
        let key = event.key();
        self.check_key(key)?;
        let remote_path = self.root.join(key);

        let version = match event.kind {
            EventType::Create | EventType::Update => {
                Self::write_file(&remote_path, &event.asset.content)
                    .await
                    .map_err(|e| self.remote_error(key, e))?;
                Self::version_of(&remote_path)
                    .await
                    .map_err(|e| self.remote_error(key, e))?
            }
            EventType::Remove => {
                match fs::remove_file(&remote_path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(self.remote_error(key, e)),
                }
                String::new()
            }
            EventType::Retrieve => {
                let content = match fs::read(&remote_path).await {
                    Ok(content) => content,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        return Err(SyncError::AssetNotFound {
                            environment: self.environment.name.clone(),
                            key: key.to_string(),
                        })
                    }
                    Err(e) => return Err(self.remote_error(key, e)),
                };
                Self::write_file(&self.environment.local_path(key), &content).await?;
                Self::version_of(&remote_path)
                    .await
                    .map_err(|e| self.remote_error(key, e))?
            }
        };

        Ok(Acknowledgement {
            host: self.root.display().to_string(),
            version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct Fixture {
        _dir: tempfile::TempDir,
        project: PathBuf,
        remote: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let project = dir.path().join("project");
        let remote = dir.path().join("remote");
        std::fs::create_dir_all(project.join("assets")).unwrap();
        std::fs::create_dir_all(&remote).unwrap();
        Fixture {
            _dir: dir,
            project,
            remote,
        }
    }

    fn gateway(fx: &Fixture) -> DirectoryGateway {
        let env = Environment::new("dev", fx.remote.display().to_string(), &fx.project)
            .with_ignore_files(vec!["*.log".into()]);
        DirectoryGateway::new(env)
    }

    #[tokio::test]
    async fn local_listing_skips_ledger_hidden_and_ignored() {
        let fx = fixture();
        std::fs::write(fx.project.join("assets/app.js"), b"js").unwrap();
        std::fs::write(fx.project.join("debug.log"), b"log").unwrap();
        std::fs::write(fx.project.join(LEDGER_FILE), b"# ledger").unwrap();
        std::fs::write(fx.project.join(".DS_Store"), b"").unwrap();

        let assets = gateway(&fx).list_local_assets().await.unwrap();
        let keys: Vec<_> = assets.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["assets/app.js"]);
        assert_eq!(assets[0].content, b"js");
        assert!(!assets[0].version.is_empty());
    }

    #[tokio::test]
    async fn local_listing_skips_ledger_temp_file() {
        let fx = fixture();
        std::fs::write(fx.project.join("a.js"), b"a").unwrap();
        std::fs::write(
            fx.project.join(format!("{LEDGER_FILE}{TEMP_SUFFIX}")),
            b"# half written",
        )
        .unwrap();
        std::fs::write(fx.project.join("assets/themesync.lock.tmp"), b"nested").unwrap();

        let gw = gateway(&fx);
        let keys: Vec<_> = gw
            .list_local_assets()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.key)
            .collect();
        assert_eq!(keys, vec!["a.js", "assets/themesync.lock.tmp"]);

        let plan = crate::plan::plan_replace(&gw, &[]).await.unwrap();
        let planned: Vec<_> = plan.events.iter().map(|e| e.key().to_string()).collect();
        assert!(!planned.iter().any(|k| k == "themesync.lock.tmp"));
        assert!(planned.iter().any(|k| k == "a.js"));
    }

    #[tokio::test]
    async fn upload_then_list_remote() {
        let fx = fixture();
        let gw = gateway(&fx);

        let ack = gw
            .apply(&AssetEvent::upload(Asset::new("snippets/a.liquid", "hi"), "dev"))
            .await
            .unwrap();
        assert!(!ack.version.is_empty());
        assert_eq!(
            std::fs::read(fx.remote.join("snippets/a.liquid")).unwrap(),
            b"hi"
        );

        let listed = gw.list_remote_assets().await.unwrap();
        assert_eq!(listed, vec![Asset::listed("snippets/a.liquid", ack.version)]);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let fx = fixture();
        std::fs::write(fx.remote.join("gone.css"), b"x").unwrap();
        let gw = gateway(&fx);

        let event = AssetEvent::removal(Asset::listed("gone.css", ""), "dev");
        gw.apply(&event).await.unwrap();
        gw.apply(&event).await.unwrap();
        assert!(!fx.remote.join("gone.css").exists());
    }

    #[tokio::test]
    async fn retrieve_copies_into_project() {
        let fx = fixture();
        std::fs::create_dir_all(fx.remote.join("layout")).unwrap();
        std::fs::write(fx.remote.join("layout/theme.liquid"), b"<html>").unwrap();
        let gw = gateway(&fx);

        gw.apply(&AssetEvent::retrieve(Asset::listed("layout/theme.liquid", ""), "dev"))
            .await
            .unwrap();
        assert_eq!(
            std::fs::read(fx.project.join("layout/theme.liquid")).unwrap(),
            b"<html>"
        );

        let missing = gw
            .apply(&AssetEvent::retrieve(Asset::listed("nope.js", ""), "dev"))
            .await
            .unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn read_local_asset_errors() {
        let fx = fixture();
        std::fs::write(fx.project.join("debug.log"), b"log").unwrap();
        let gw = gateway(&fx);

        assert!(matches!(
            gw.read_local_asset("debug.log").await,
            Err(SyncError::Ignored { .. })
        ));
        assert!(matches!(
            gw.read_local_asset("../escape.js").await,
            Err(SyncError::Ignored { .. })
        ));
        assert!(gw.read_local_asset("assets").await.unwrap_err().is_not_found());
        assert!(gw.read_local_asset("missing.js").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn remote_root_inside_project_is_not_local() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("remote")).unwrap();
        std::fs::write(dir.path().join("remote/x.js"), b"x").unwrap();
        std::fs::write(dir.path().join("y.js"), b"y").unwrap();

        let gw = DirectoryGateway::new(Environment::new("dev", "remote", dir.path()));
        let keys: Vec<_> = gw
            .list_local_assets()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.key)
            .collect();
        assert_eq!(keys, vec!["y.js".to_string()]);
    }

    #[tokio::test]
    async fn read_only_refuses_upload() {
        let fx = fixture();
        let env = Environment::new("prod", fx.remote.display().to_string(), &fx.project)
            .with_read_only(true);
        let gw = DirectoryGateway::new(env);

        let err = gw
            .apply(&AssetEvent::upload(Asset::new("a.js", "x"), "prod"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ReadOnly { .. }));
        assert!(!fx.remote.join("a.js").exists());
    }
}
