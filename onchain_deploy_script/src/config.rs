use std::{env, path::PathBuf};

use anyhow::Context;
use log::info;
use onchain_deployments::config::FrameworkConfig;

const NETWORK_ENV_VAR: &str = "NETWORK";
const DEPLOY_CONFIG_ENV_VAR: &str = "DEPLOY_CONFIG";
const ARTIFACTS_DIR_ENV_VAR: &str = "ARTIFACTS_DIR";
const RPC_URL_ENV_VAR: &str = "RPC_URL";
const PRIVATE_KEY_ENV_VAR: &str = "PRIVATE_KEY";

const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

pub struct ScriptConfig {
    pub framework: FrameworkConfig,
    pub network: String,
    pub artifacts_dir: PathBuf,
}

impl ScriptConfig {
    /// load `.env`, then the process env on top of the framework declaration
    pub fn load() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut framework = match lookup(DEPLOY_CONFIG_ENV_VAR) {
            Some(path) => {
                info!("Loading framework config from {path}");
                FrameworkConfig::from_json_file(&path)
                    .with_context(|| format!("Failed to load framework config {path}"))?
            }
            None => {
                info!("Using the built-in local framework config");
                FrameworkConfig::local(Vec::new())
            }
        };

        let network = lookup(NETWORK_ENV_VAR).unwrap_or_else(|| framework.default_network.clone());
        let profile = framework.network_mut(&network)?;

        // comma separated, first key deploys
        if let Some(keys) = lookup(PRIVATE_KEY_ENV_VAR) {
            profile.accounts = keys
                .split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(url) = lookup(RPC_URL_ENV_VAR) {
            profile.url = url
                .parse()
                .with_context(|| format!("{RPC_URL_ENV_VAR} is not a valid url: {url}"))?;
        }

        let artifacts_dir = lookup(ARTIFACTS_DIR_ENV_VAR)
            .unwrap_or_else(|| DEFAULT_ARTIFACTS_DIR.to_owned())
            .into();

        Ok(Self {
            framework,
            network,
            artifacts_dir,
        })
    }
}
