mod config;

use std::process::ExitCode;

use anyhow::Context;
use onchain_deployments::{artifacts::ArtifactStore, plan::DeploymentPlan, run_deployment};

use crate::config::ScriptConfig;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    match deploy().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

/// Deploy `Main` to the selected network and wait for it to be confirmed.
async fn deploy() -> anyhow::Result<()> {
    let config = ScriptConfig::load()?;
    let artifacts = ArtifactStore::new(&config.artifacts_dir);

    run_deployment(
        &config.framework,
        &config.network,
        &artifacts,
        &DeploymentPlan::default_plan(),
    )
    .await
    .context("Deployment failed")?;

    Ok(())
}
