//! Environment configuration.
//!
//! Configuration is an explicit value: the caller builds [`Settings`] once
//! (usually from the working directory) and threads it into
//! [`ConfigFile::environments`], which fills in defaults and validates every
//! requested environment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "themesync.json";

/// Environment used when none is requested.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Default per-request timeout handed to gateways.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config {path}: {source}")]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid JSON of the expected shape.
    #[error("cannot parse config {path}: {source}")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A requested environment has no configuration entry.
    #[error("unknown environment {name:?}")]
    UnknownEnvironment {
        /// The requested name.
        name: String,
    },

    /// An environment failed validation. Every cause found is listed.
    #[error("invalid environment [{environment}]: ({})", .causes.join(", "))]
    Invalid {
        /// Environment name.
        environment: String,
        /// Individual validation failures.
        causes: Vec<String>,
    },
}

/// Process-wide defaults, built once and passed explicitly.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Working directory: default project directory, home of the config
    /// file and of the ledger.
    pub directory: PathBuf,
    /// Default timeout for environments that do not set one.
    pub timeout: Duration,
}

impl Settings {
    /// Creates settings rooted at `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the default timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Path of the configuration file inside the working directory.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.directory.join(CONFIG_FILE)
    }
}

/// One environment entry as written in the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentSpec {
    /// Location of the remote store.
    #[serde(default)]
    pub store: String,
    /// Project directory; relative paths resolve against the working
    /// directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    /// Refuse uploads and removals.
    #[serde(default)]
    pub read_only: bool,
    /// Glob patterns of files that are never synchronised.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_files: Vec<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// A fully resolved environment (replica identity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    /// Environment name.
    pub name: String,
    /// Local project directory.
    pub directory: PathBuf,
    /// Location of the remote store.
    pub store: String,
    /// Whether mutations are refused.
    pub read_only: bool,
    /// Glob patterns of files that are never synchronised.
    pub ignore_files: Vec<String>,
    /// Request timeout.
    pub timeout: Duration,
}

impl Environment {
    /// Creates an environment with default options.
    pub fn new(
        name: impl Into<String>,
        store: impl Into<String>,
        directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            store: store.into(),
            read_only: false,
            ignore_files: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Marks the environment read-only.
    #[must_use]
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Sets the ignore patterns.
    #[must_use]
    pub fn with_ignore_files(mut self, patterns: Vec<String>) -> Self {
        self.ignore_files = patterns;
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolves a configuration entry against `settings` and validates it.
    pub fn from_spec(
        name: &str,
        spec: &EnvironmentSpec,
        settings: &Settings,
    ) -> Result<Self, ConfigError> {
        let directory = match &spec.directory {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => settings.directory.join(dir),
            None => settings.directory.clone(),
        };
        let timeout = spec
            .timeout_secs
            .map_or(settings.timeout, Duration::from_secs);

        let mut env = Self::new(name, spec.store.trim(), directory)
            .with_read_only(spec.read_only)
            .with_ignore_files(spec.ignore_files.clone())
            .with_timeout(timeout);
        env.validate()?;
        Ok(env)
    }

    /// Checks the environment, collecting every problem found.
    ///
    /// A symlinked project directory is replaced by its target.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let mut causes = Vec::new();

        if self.store.is_empty() {
            causes.push("missing store".to_string());
        }

        if self.timeout.is_zero() {
            causes.push("timeout must be greater than zero".to_string());
        }

        for pattern in &self.ignore_files {
            if let Err(e) = glob::Pattern::new(pattern) {
                causes.push(format!("invalid ignore pattern {pattern:?}: {e}"));
            }
        }

        match fs::symlink_metadata(&self.directory) {
            Err(e) => causes.push(format!(
                "invalid project directory {}: {e}",
                self.directory.display()
            )),
            Ok(meta) if meta.file_type().is_symlink() => match fs::canonicalize(&self.directory) {
                Ok(target) if target.is_dir() => self.directory = target,
                Ok(target) => causes.push(format!("{} is not a directory", target.display())),
                Err(e) => causes.push(format!("invalid project directory: {e}")),
            },
            Ok(meta) if !meta.is_dir() => {
                causes.push(format!("{} is not a directory", self.directory.display()));
            }
            Ok(_) => {}
        }

        if causes.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid {
                environment: self.name.clone(),
                causes,
            })
        }
    }

    /// Returns true if `key` matches one of the ignore patterns.
    ///
    /// Invalid patterns never match; [`Environment::validate`] reports them.
    #[must_use]
    pub fn is_ignored(&self, key: &str) -> bool {
        self.ignore_files.iter().any(|pattern| {
            glob::Pattern::new(pattern)
                .map(|p| p.matches(key))
                .unwrap_or(false)
        })
    }

    /// Path of `key` inside the project directory.
    #[must_use]
    pub fn local_path(&self, key: &str) -> PathBuf {
        self.directory.join(key)
    }
}

/// Contents of the configuration file: environment name to entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigFile {
    /// Configured environments.
    pub environments: BTreeMap<String, EnvironmentSpec>,
}

impl ConfigFile {
    /// Loads the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolves and validates the named environments, in the order given.
    ///
    /// Stops at the first environment that is unknown or invalid.
    pub fn environments(
        &self,
        names: &[String],
        settings: &Settings,
    ) -> Result<Vec<Environment>, ConfigError> {
        names
            .iter()
            .map(|name| {
                let spec = self
                    .environments
                    .get(name)
                    .ok_or_else(|| ConfigError::UnknownEnvironment { name: name.clone() })?;
                Environment::from_spec(name, spec, settings)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn spec_defaults_come_from_settings() {
        let dir = tempdir().unwrap();
        let settings = Settings::new(dir.path()).with_timeout(Duration::from_secs(5));
        let spec = EnvironmentSpec {
            store: "remote".into(),
            ..EnvironmentSpec::default()
        };

        let env = Environment::from_spec("development", &spec, &settings).unwrap();
        assert_eq!(env.directory, dir.path());
        assert_eq!(env.timeout, Duration::from_secs(5));
        assert!(!env.read_only);
    }

    #[test]
    fn relative_directory_resolves_against_working_directory() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("theme")).unwrap();
        let settings = Settings::new(dir.path());
        let spec = EnvironmentSpec {
            store: "remote".into(),
            directory: Some(PathBuf::from("theme")),
            timeout_secs: Some(60),
            ..EnvironmentSpec::default()
        };

        let env = Environment::from_spec("staging", &spec, &settings).unwrap();
        assert_eq!(env.directory, dir.path().join("theme"));
        assert_eq!(env.timeout, Duration::from_secs(60));
    }

    #[test]
    fn validation_collects_every_cause() {
        let dir = tempdir().unwrap();
        let mut env = Environment::new("production", "", dir.path().join("missing"))
            .with_timeout(Duration::ZERO)
            .with_ignore_files(vec!["[".into()]);

        match env.validate() {
            Err(ConfigError::Invalid {
                environment,
                causes,
            }) => {
                assert_eq!(environment, "production");
                assert_eq!(causes.len(), 4);
                assert!(causes.iter().any(|c| c == "missing store"));
            }
            other => panic!("expected invalid environment, got {other:?}"),
        }
    }

    #[test]
    fn invalid_message_joins_causes() {
        let err = ConfigError::Invalid {
            environment: "dev".into(),
            causes: vec!["missing store".into(), "timeout must be greater than zero".into()],
        };
        assert_eq!(
            err.to_string(),
            "invalid environment [dev]: (missing store, timeout must be greater than zero)"
        );
    }

    #[test]
    fn file_as_directory_rejected() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        fs::write(&file, b"x").unwrap();

        let mut env = Environment::new("dev", "remote", &file);
        assert!(matches!(env.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_is_resolved() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("real");
        fs::create_dir(&target).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let mut env = Environment::new("dev", "remote", &link);
        env.validate().unwrap();
        assert_eq!(env.directory, fs::canonicalize(&target).unwrap());
    }

    #[test]
    fn ignore_patterns() {
        let env = Environment::new("dev", "remote", ".")
            .with_ignore_files(vec!["*.log".into(), "config/secrets.json".into()]);

        assert!(env.is_ignored("debug.log"));
        assert!(env.is_ignored("assets/debug.log"));
        assert!(env.is_ignored("config/secrets.json"));
        assert!(!env.is_ignored("config/settings.json"));
    }

    #[test]
    fn config_file_lookup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"{
                "development": { "store": "../remote-dev" },
                "production": { "store": "../remote-prod", "read_only": true }
            }"#,
        )
        .unwrap();

        let settings = Settings::new(dir.path());
        let config = ConfigFile::load(&path).unwrap();
        let envs = config
            .environments(&["production".into(), "development".into()], &settings)
            .unwrap();

        assert_eq!(envs.len(), 2);
        assert_eq!(envs[0].name, "production");
        assert!(envs[0].read_only);
        assert_eq!(envs[1].store, "../remote-dev");

        let err = config
            .environments(&["qa".into()], &settings)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownEnvironment { .. }));
    }

    #[test]
    fn unknown_fields_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{ "development": { "stor": "typo" } }"#).unwrap();

        assert!(matches!(
            ConfigFile::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            ConfigFile::load(&dir.path().join(CONFIG_FILE)),
            Err(ConfigError::Read { .. })
        ));
    }
}
