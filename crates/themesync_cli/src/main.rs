//! themesync CLI
//!
//! Keeps a local theme directory in step with one or more remote asset
//! stores.
//!
//! # Commands
//!
//! - `replace` - Make remote stores mirror the local directory
//! - `upload` - Push local files
//! - `download` - Fetch remote files
//! - `diff` - Show what a replace would change between two environments

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use themesync_engine::DEFAULT_ENVIRONMENT;
use tracing_subscriber::EnvFilter;

/// Theme asset synchronisation.
#[derive(Parser, Debug)]
#[command(name = "themesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (default: <dir>/themesync.json)
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Environment to act on; repeat for several
    #[arg(global = true, short, long = "env", default_value = DEFAULT_ENVIRONMENT)]
    environments: Vec<String>,

    /// Project directory (default: current directory)
    #[arg(global = true, short, long)]
    dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Make the remote stores mirror the local directory
    Replace {
        /// Only these files (default: everything, removing remote extras)
        files: Vec<String>,
    },

    /// Upload local files
    Upload {
        /// Only these files (default: every local file)
        files: Vec<String>,

        /// Overwrite files that changed remotely since the last sync
        #[arg(short, long)]
        force: bool,
    },

    /// Download remote files
    Download {
        /// Only these files; glob patterns allowed (default: everything)
        files: Vec<String>,

        /// Download even files that are up to date
        #[arg(short, long)]
        force: bool,
    },

    /// Show what replacing one environment with another would change
    Diff {
        /// Environment whose ledger entries are the baseline
        #[arg(long)]
        from: String,

        /// Environment that would be replaced
        #[arg(long)]
        to: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let dir = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let options = commands::Options {
        dir,
        config: cli.config,
        environments: cli.environments,
    };

    match cli.command {
        Commands::Replace { files } => commands::replace::run(&options, &files).await?,
        Commands::Upload { files, force } => {
            commands::upload::run(&options, &files, force).await?;
        }
        Commands::Download { files, force } => {
            commands::download::run(&options, &files, force).await?;
        }
        Commands::Diff { from, to } => commands::diff::run(&options, &from, &to).await?,
        Commands::Version => {
            println!("themesync v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_environment() {
        let cli = Cli::try_parse_from(["themesync", "upload"]).unwrap();
        assert_eq!(cli.environments, vec![DEFAULT_ENVIRONMENT]);
        assert!(matches!(
            cli.command,
            Commands::Upload { ref files, force: false } if files.is_empty()
        ));
    }

    #[test]
    fn repeated_environments_and_files() {
        let cli = Cli::try_parse_from([
            "themesync", "download", "-e", "staging", "--env", "production", "--force",
            "assets/*.css", "layout/theme.liquid",
        ])
        .unwrap();
        assert_eq!(cli.environments, vec!["staging", "production"]);
        match cli.command {
            Commands::Download { files, force } => {
                assert!(force);
                assert_eq!(files, vec!["assets/*.css", "layout/theme.liquid"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn diff_requires_both_environments() {
        assert!(Cli::try_parse_from(["themesync", "diff", "--from", "a"]).is_err());
        let cli = Cli::try_parse_from(["themesync", "diff", "--from", "a", "--to", "b"]).unwrap();
        assert!(matches!(cli.command, Commands::Diff { .. }));
    }
}
