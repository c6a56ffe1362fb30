use std::{collections::BTreeMap, path::Path, time::Duration};

use ethers::signers::{LocalWallet, Signer};
use serde::Deserialize;
use url::Url;

use crate::error::{DeployError, Result};

pub const DEFAULT_SOLIDITY_VERSION: &str = "0.8.17";
pub const DEFAULT_NETWORK_NAME: &str = "local";
pub const DEFAULT_NETWORK_URL: &str = "http://localhost:10002/";
pub const DEFAULT_CONFIRMATIONS: usize = 1;

/// Static framework declaration: compiler version plus the named networks a
/// deployment can target. Passed by value into the deployment routine.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkConfig {
    pub solidity: String,
    #[serde(default = "default_network_name")]
    pub default_network: String,
    pub networks: BTreeMap<String, NetworkProfile>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    /// filled from the key of the `networks` table
    #[serde(skip)]
    pub name: String,
    pub url: Url,
    #[serde(default)]
    pub accounts: Vec<String>,
    /// read from the node when not set
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default = "default_confirmations")]
    pub confirmations: usize,
    /// `None` waits for confirmation indefinitely
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_network_name() -> String {
    DEFAULT_NETWORK_NAME.to_owned()
}

fn default_confirmations() -> usize {
    DEFAULT_CONFIRMATIONS
}

impl FrameworkConfig {
    /// The built-in declaration: one local node, signing with `accounts`.
    pub fn local(accounts: Vec<String>) -> Self {
        let profile = NetworkProfile {
            name: DEFAULT_NETWORK_NAME.to_owned(),
            // constant, known to parse
            url: Url::parse(DEFAULT_NETWORK_URL).expect("default network url"),
            accounts,
            chain_id: None,
            confirmations: DEFAULT_CONFIRMATIONS,
            timeout_secs: None,
        };

        Self {
            solidity: DEFAULT_SOLIDITY_VERSION.to_owned(),
            default_network: DEFAULT_NETWORK_NAME.to_owned(),
            networks: BTreeMap::from([(DEFAULT_NETWORK_NAME.to_owned(), profile)]),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut config: FrameworkConfig = serde_json::from_str(json)?;
        for (name, profile) in config.networks.iter_mut() {
            profile.name = name.clone();
        }
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    pub fn network(&self, name: &str) -> Result<&NetworkProfile> {
        self.networks
            .get(name)
            .ok_or_else(|| self.unknown_network(name))
    }

    pub fn network_mut(&mut self, name: &str) -> Result<&mut NetworkProfile> {
        let unknown = self.unknown_network(name);
        self.networks.get_mut(name).ok_or(unknown)
    }

    pub fn default_profile(&self) -> Result<&NetworkProfile> {
        self.network(&self.default_network)
    }

    fn unknown_network(&self, name: &str) -> DeployError {
        let known: Vec<&str> = self.networks.keys().map(String::as_str).collect();
        DeployError::Config(format!(
            "unknown network `{name}`, configured networks: [{}]",
            known.join(", ")
        ))
    }
}

impl NetworkProfile {
    pub fn confirmation_timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Parse every configured account, in order. Keys are hex, `0x` optional.
    pub fn wallets(&self) -> Result<Vec<LocalWallet>> {
        if self.accounts.is_empty() {
            return Err(DeployError::Config(format!(
                "network `{}` has no accounts configured",
                self.name
            )));
        }

        self.accounts
            .iter()
            .enumerate()
            .map(|(index, key)| self.parse_wallet(index, key))
            .collect()
    }

    /// The account deployments are signed with.
    pub fn deployer_wallet(&self) -> Result<LocalWallet> {
        let mut wallets = self.wallets()?;
        Ok(wallets.remove(0))
    }

    fn parse_wallet(&self, index: usize, key: &str) -> Result<LocalWallet> {
        // never echo the key itself
        let invalid = |detail: &str| {
            DeployError::Config(format!(
                "account #{index} of network `{}` is not a valid private key: {detail}",
                self.name
            ))
        };

        let trimmed = key.trim();
        let hex_key = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(hex_key).map_err(|e| invalid(&e.to_string()))?;
        if bytes.len() != 32 {
            return Err(invalid(&format!("expected 32 bytes, got {}", bytes.len())));
        }

        let wallet = LocalWallet::from_bytes(&bytes).map_err(|e| invalid(&e.to_string()))?;
        Ok(match self.chain_id {
            Some(chain_id) => wallet.with_chain_id(chain_id),
            None => wallet,
        })
    }
}
