use log::info;

use crate::{
    artifacts::ArtifactStore,
    client::connect,
    config::FrameworkConfig,
    deployer::EthersDeployer,
    error::Result,
    plan::{DeploymentPlan, DeploymentReport},
};

/// resolve -> connect -> deploy and confirm each enabled step.
///
/// Artifacts are resolved before the node is contacted, so a missing contract
/// is reported as such even when the network is down.
pub async fn run_deployment(
    config: &FrameworkConfig,
    network: &str,
    artifacts: &ArtifactStore,
    plan: &DeploymentPlan,
) -> Result<DeploymentReport> {
    let profile = config.network(network)?;
    let resolved = plan.resolve(artifacts)?;

    info!(
        "deploying to `{network}` at {} (solidity {})",
        profile.url, config.solidity
    );
    let client = connect(profile).await?;
    let deployer = EthersDeployer::for_profile(client, profile);

    resolved.execute(&deployer).await
}
