//! Replace command implementation.

use super::{finish, orchestrator, Options};
use tracing::info;

/// Runs the replace command.
///
/// Without files, remote assets that no longer exist locally are removed.
pub async fn run(options: &Options, files: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = orchestrator(options).await?;
    if files.is_empty() {
        info!("replacing every remote asset with the local directory");
    }
    let report = orchestrator.replace(files).await;
    finish("replace", &report)
}
