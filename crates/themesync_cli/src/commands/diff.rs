//! Diff command implementation.

use super::Options;
use themesync_engine::plan_replace;

/// Runs the diff command.
///
/// Plans a full replace of `to` and describes it against the ledger entries
/// recorded for `from`. Nothing is sent.
pub async fn run(options: &Options, from: &str, to: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut names = vec![from.to_string()];
    if to != from {
        names.push(to.to_string());
    }
    let workspace = options.load_workspace(&names)?;
    let manifest = workspace.manifest(&options.dir).await?;

    let target = workspace
        .selected
        .iter()
        .find(|g| g.name() == to)
        .ok_or_else(|| format!("environment {to:?} is not loaded"))?;
    let plan = plan_replace(target.as_ref(), &[]).await?;
    let diff = manifest.diff(&plan.actions(), to, from);

    println!("Replacing [{to}] from [{from}]:");
    print!("{diff}");
    Ok(())
}
