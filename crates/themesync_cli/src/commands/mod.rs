//! CLI command implementations.

pub mod diff;
pub mod download;
pub mod replace;
pub mod upload;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use themesync_engine::{
    ConfigFile, DirectoryGateway, Environment, Manifest, Orchestrator, RemoteGateway, RunReport,
    Settings,
};
use tracing::{debug, warn};

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct Options {
    /// Project directory.
    pub dir: PathBuf,
    /// Configuration file, if not the default one.
    pub config: Option<PathBuf>,
    /// Environments to act on.
    pub environments: Vec<String>,
}

impl Options {
    fn settings(&self) -> Settings {
        Settings::new(&self.dir)
    }

    fn config_file(&self, settings: &Settings) -> Result<ConfigFile, Box<dyn std::error::Error>> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(|| settings.config_path());
        debug!(config = %path.display(), "loading configuration");
        Ok(ConfigFile::load(&path)?)
    }

    /// Loads the named environments, and every other configured environment
    /// that validates.
    ///
    /// The ledger keeps entries only for environments it is opened with, so
    /// it must see all of them, not only the ones acted on.
    pub fn load_workspace(
        &self,
        names: &[String],
    ) -> Result<Workspace, Box<dyn std::error::Error>> {
        let settings = self.settings();
        let config = self.config_file(&settings)?;
        let selected = config.environments(names, &settings)?;

        let mut all = selected.clone();
        for (name, spec) in &config.environments {
            if names.contains(name) {
                continue;
            }
            match Environment::from_spec(name, spec, &settings) {
                Ok(env) => all.push(env),
                Err(e) => warn!(environment = %name, error = %e, "skipping invalid environment"),
            }
        }

        Ok(Workspace {
            selected: gateways(selected),
            all: gateways(all),
        })
    }
}

/// Gateways for one invocation.
pub struct Workspace {
    /// Environments acted on.
    pub selected: Vec<Arc<dyn RemoteGateway>>,
    /// Every usable configured environment.
    pub all: Vec<Arc<dyn RemoteGateway>>,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("selected", &self.selected.len())
            .field("all", &self.all.len())
            .finish()
    }
}

impl Workspace {
    /// Opens the ledger against every configured environment.
    pub async fn manifest(&self, dir: &Path) -> Result<Manifest, Box<dyn std::error::Error>> {
        Ok(Manifest::open(dir, &self.all).await?)
    }
}

/// One gateway per environment.
pub fn gateways(environments: Vec<Environment>) -> Vec<Arc<dyn RemoteGateway>> {
    environments
        .into_iter()
        .map(|env| Arc::new(DirectoryGateway::new(env)) as Arc<dyn RemoteGateway>)
        .collect()
}

/// Builds the manifest and an orchestrator over the selected environments.
pub async fn orchestrator(options: &Options) -> Result<Orchestrator, Box<dyn std::error::Error>> {
    let workspace = options.load_workspace(&options.environments)?;
    let manifest = workspace.manifest(&options.dir).await?;
    Ok(Orchestrator::new(workspace.selected, Arc::new(manifest)))
}

/// Prints the summary and turns a failed run into an error.
pub fn finish(command: &str, report: &RunReport) -> Result<(), Box<dyn std::error::Error>> {
    print!("{report}");
    if report.is_success() {
        Ok(())
    } else {
        let totals = report.totals();
        let broken = report.errors().count();
        Err(format!(
            "{command} failed: {} event(s) failed, {broken} environment(s) stopped",
            totals.failed
        )
        .into())
    }
}
