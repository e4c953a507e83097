//! # themesync engine
//!
//! Keeps a local project directory and any number of remote asset stores
//! ("environments") in step.
//!
//! This crate provides:
//! - The [`Manifest`]: a durable ledger of the version each environment held
//!   at the last sync, reconciled against live remote listings
//! - Reconciliation decisions (download / upload / remove) by version token
//! - A [`RemoteGateway`] trait with a filesystem and an in-memory
//!   implementation
//! - A per-environment [`Pipeline`] that applies events one at a time
//! - An [`Orchestrator`] running every environment concurrently
//!
//! ## Flow
//!
//! 1. Load configuration and resolve environments
//! 2. Open the manifest: list every remote, backfill, prune
//! 3. Plan events per environment
//! 4. Drain each plan through its pipeline, recording outcomes in the
//!    manifest
//!
//! ## Key Invariants
//!
//! - The in-memory ledger view always mirrors the file after a mutation
//! - Unparsable or absent version tokens are older than any real one
//! - For one asset, a removal is always sent before an upload
//! - One environment failing never stops another

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod asset;
mod config;
mod diff;
mod directory;
mod error;
mod gateway;
mod manifest;
mod orchestrator;
mod pipeline;
mod plan;
mod version;

pub use asset::{Acknowledgement, Asset, AssetEvent, EventType};
pub use config::{
    ConfigError, ConfigFile, Environment, EnvironmentSpec, Settings, CONFIG_FILE,
    DEFAULT_ENVIRONMENT, DEFAULT_TIMEOUT,
};
pub use diff::ThemeDiff;
pub use directory::DirectoryGateway;
pub use error::{SyncError, SyncResult};
pub use gateway::{MockGateway, RemoteGateway};
pub use manifest::{Manifest, LEDGER_FILE, MANIFEST_COMMENT};
pub use orchestrator::{Command, EnvironmentOutcome, Orchestrator, RunReport};
pub use pipeline::{Pipeline, PipelineStats, Reporter, SyncMessage};
pub use plan::{plan_download, plan_replace, plan_upload, Plan, SETTINGS_DATA_KEY};
pub use version::{token_from_time, token_now, Version};
