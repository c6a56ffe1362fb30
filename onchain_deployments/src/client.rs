use std::sync::Arc;

use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
};
use log::debug;

use crate::{
    config::NetworkProfile,
    error::{DeployError, Result},
};

pub type EtherSigner = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Build a signing client for `profile`, signing with its first account.
///
/// The node is asked for its chain id before anything else happens, so an
/// unreachable endpoint fails here and no transaction is ever broadcast.
pub async fn connect(profile: &NetworkProfile) -> Result<Arc<EtherSigner>> {
    let wallet = profile.deployer_wallet()?;

    let provider = Provider::<Http>::try_from(profile.url.as_str()).map_err(|e| {
        DeployError::Config(format!("invalid url for network `{}`: {e}", profile.name))
    })?;

    let node_chain_id = provider
        .get_chainid()
        .await
        .map_err(|e| {
            DeployError::Transaction(format!(
                "network `{}` at {} is unreachable: {e}",
                profile.name, profile.url
            ))
        })?
        .as_u64();

    if let Some(configured) = profile.chain_id {
        if configured != node_chain_id {
            return Err(DeployError::Config(format!(
                "network `{}` is configured with chain id {configured} but the node reports {node_chain_id}",
                profile.name
            )));
        }
    }

    debug!(
        "connected to `{}` (chain {node_chain_id}) as {:?}",
        profile.name,
        wallet.address()
    );
    Ok(Arc::new(SignerMiddleware::new(
        provider,
        wallet.with_chain_id(node_chain_id),
    )))
}
