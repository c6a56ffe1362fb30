use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use ethers::{
    providers::Middleware,
    types::{Address, Bytes, TransactionReceipt, TransactionRequest, H256, U64},
};
use log::{debug, info};

use crate::{
    config::{NetworkProfile, DEFAULT_CONFIRMATIONS},
    error::{DeployError, Result},
};

/// Handle to a contract whose creation transaction has been confirmed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployedContract {
    pub name: String,
    pub address: Address,
    pub transaction_hash: H256,
    pub block_number: Option<U64>,
}

impl DeployedContract {
    pub fn from_receipt(name: &str, receipt: TransactionReceipt) -> Result<Self> {
        if receipt.status == Some(U64::zero()) {
            return Err(DeployError::Transaction(format!(
                "`{name}` deployment reverted in transaction {:?}",
                receipt.transaction_hash
            )));
        }

        let address = receipt
            .contract_address
            .filter(|address| !address.is_zero())
            .ok_or_else(|| {
                DeployError::Transaction(format!(
                    "receipt of transaction {:?} carries no contract address",
                    receipt.transaction_hash
                ))
            })?;

        Ok(Self {
            name: name.to_owned(),
            address,
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
        })
    }
}

/// Submits a contract-creation transaction and waits for it to be confirmed.
#[async_trait]
pub trait ContractDeployer {
    async fn deploy(&self, name: &str, deployment_data: Bytes) -> Result<DeployedContract>;
}

pub struct EthersDeployer<M> {
    client: Arc<M>,
    confirmations: usize,
    timeout: Option<Duration>,
}

impl<M> EthersDeployer<M>
where
    M: Middleware,
{
    pub fn new(client: Arc<M>) -> Self {
        Self {
            client,
            confirmations: DEFAULT_CONFIRMATIONS,
            timeout: None,
        }
    }

    pub fn for_profile(client: Arc<M>, profile: &NetworkProfile) -> Self {
        Self::new(client)
            .confirmations(profile.confirmations)
            .timeout(profile.confirmation_timeout())
    }

    /// Blocks to wait for, counting the one that includes the transaction.
    /// `0` is treated as `1`: a deployment is only done once its receipt exists.
    pub fn confirmations(mut self, confirmations: usize) -> Self {
        self.confirmations = confirmations.max(1);
        self
    }

    /// `None` waits for as long as the node keeps the transaction around.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl<M> ContractDeployer for EthersDeployer<M>
where
    M: Middleware,
{
    async fn deploy(&self, name: &str, deployment_data: Bytes) -> Result<DeployedContract> {
        // no `to`: contract creation
        let tx = TransactionRequest::new().data(deployment_data);

        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .map_err(|e| DeployError::Transaction(format!("`{name}` deployment rejected: {e}")))?;
        let tx_hash = pending.tx_hash();
        debug!("`{name}` deployment submitted in transaction {tx_hash:?}");

        let pending = pending.confirmations(self.confirmations);
        let confirmed = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, pending).await.map_err(|_| {
                DeployError::ConfirmationTimeout {
                    tx_hash,
                    reason: format!("no confirmation within {limit:?}"),
                }
            })?,
            None => pending.await,
        };

        let receipt = confirmed
            .map_err(|e| {
                DeployError::Transaction(format!(
                    "lost track of `{name}` deployment {tx_hash:?}: {e}"
                ))
            })?
            .ok_or_else(|| DeployError::ConfirmationTimeout {
                tx_hash,
                reason: String::from("the node dropped the transaction"),
            })?;

        let deployed = DeployedContract::from_receipt(name, receipt)?;
        info!(
            "{name} deployed to {:?} (block {})",
            deployed.address,
            deployed
                .block_number
                .map(|n| n.to_string())
                .unwrap_or_else(|| String::from("pending"))
        );
        Ok(deployed)
    }
}

#[cfg(test)]
mod tests {
    use ethers::{
        providers::{MockProvider, Provider},
        types::{Transaction, U256},
    };

    use super::*;
    use crate::{
        artifacts::tests::fixture_store,
        client::{connect, test_utils::TestConfig},
    };

    fn receipt(status: u64, contract_address: Option<Address>) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: H256::repeat_byte(0xab),
            block_number: Some(U64::from(7)),
            contract_address,
            status: Some(U64::from(status)),
            ..Default::default()
        }
    }

    #[test]
    fn successful_receipt_becomes_a_handle() {
        let address = Address::repeat_byte(0x42);

        let deployed = DeployedContract::from_receipt("Main", receipt(1, Some(address))).unwrap();

        assert_eq!(deployed.name, "Main");
        assert_eq!(deployed.address, address);
        assert_eq!(deployed.transaction_hash, H256::repeat_byte(0xab));
        assert_eq!(deployed.block_number, Some(U64::from(7)));
    }

    #[test]
    fn reverted_receipt_is_a_transaction_error() {
        let err = DeployedContract::from_receipt("Main", receipt(0, Some(Address::repeat_byte(1))))
            .unwrap_err();

        assert!(matches!(err, DeployError::Transaction(_)));
        assert!(err.to_string().contains("reverted"));
    }

    #[test]
    fn receipt_without_contract_address_is_rejected() {
        assert!(matches!(
            DeployedContract::from_receipt("Main", receipt(1, None)),
            Err(DeployError::Transaction(_))
        ));
        assert!(matches!(
            DeployedContract::from_receipt("Main", receipt(1, Some(Address::zero()))),
            Err(DeployError::Transaction(_))
        ));
    }

    const POLL_INTERVAL: Duration = Duration::from_millis(10);

    fn mocked_deployer() -> (EthersDeployer<Provider<MockProvider>>, MockProvider) {
        let (provider, mock) = Provider::mocked();
        let deployer = EthersDeployer::new(Arc::new(provider.interval(POLL_INTERVAL)));
        (deployer, mock)
    }

    // mocked responses are served last in, first out: queue the polls
    // before the submission
    fn queue_submission(mock: &MockProvider, tx_hash: H256) {
        mock.push(tx_hash).unwrap();
        // eth_estimateGas
        mock.push(U256::from(53_000u64)).unwrap();
        // eth_gasPrice
        mock.push(U256::from(1_000_000_000u64)).unwrap();
    }

    fn pending_tx(tx_hash: H256, block_number: Option<u64>) -> Transaction {
        Transaction {
            hash: tx_hash,
            block_number: block_number.map(U64::from),
            ..Default::default()
        }
    }

    #[test]
    fn zero_confirmations_wait_for_the_receipt() {
        let (deployer, _mock) = mocked_deployer();

        assert_eq!(deployer.confirmations(0).confirmations, 1);
    }

    #[tokio::test]
    async fn confirmed_receipt_becomes_a_handle() {
        let (deployer, mock) = mocked_deployer();
        let tx_hash = H256::repeat_byte(0x11);
        let address = Address::repeat_byte(0x42);
        mock.push(TransactionReceipt {
            transaction_hash: tx_hash,
            block_number: Some(U64::from(1)),
            contract_address: Some(address),
            status: Some(U64::from(1)),
            ..Default::default()
        })
        .unwrap();
        mock.push(pending_tx(tx_hash, Some(1))).unwrap();
        queue_submission(&mock, tx_hash);

        let deployed = deployer
            .deploy("Main", Bytes::from(vec![0x60, 0x00]))
            .await
            .unwrap();

        assert_eq!(deployed.name, "Main");
        assert_eq!(deployed.address, address);
        assert_eq!(deployed.transaction_hash, tx_hash);
        assert_eq!(deployed.block_number, Some(U64::from(1)));
    }

    #[tokio::test]
    async fn unanswered_submission_is_a_transaction_error() {
        let (deployer, mock) = mocked_deployer();
        // gas price and estimate succeed, eth_sendTransaction gets no answer
        mock.push(U256::from(53_000u64)).unwrap();
        mock.push(U256::from(1_000_000_000u64)).unwrap();

        let err = deployer
            .deploy("Main", Bytes::from(vec![0x60, 0x00]))
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::Transaction(_)));
        assert!(err.to_string().contains("`Main` deployment rejected"), "{err}");
    }

    #[tokio::test]
    async fn configured_timeout_elapses_while_unmined() {
        let (deployer, mock) = mocked_deployer();
        let tx_hash = H256::repeat_byte(0x11);
        for _ in 0..100 {
            mock.push(pending_tx(tx_hash, None)).unwrap();
        }
        queue_submission(&mock, tx_hash);
        let deployer = deployer.timeout(Some(Duration::from_millis(200)));

        let err = deployer
            .deploy("Main", Bytes::from(vec![0x60, 0x00]))
            .await
            .unwrap_err();

        match err {
            DeployError::ConfirmationTimeout { tx_hash: hash, reason } => {
                assert_eq!(hash, tx_hash);
                assert_eq!(reason, "no confirmation within 200ms");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropped_transaction_is_a_confirmation_timeout() {
        let (deployer, mock) = mocked_deployer();
        let tx_hash = H256::repeat_byte(0x22);
        for _ in 0..10 {
            mock.push::<Option<Transaction>, Option<Transaction>>(None).unwrap();
        }
        queue_submission(&mock, tx_hash);

        let err = deployer
            .deploy("Main", Bytes::from(vec![0x60, 0x00]))
            .await
            .unwrap_err();

        match err {
            DeployError::ConfirmationTimeout { tx_hash: hash, reason } => {
                assert_eq!(hash, tx_hash);
                assert!(reason.contains("dropped"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    #[ignore = "requires a running node, see .env.example"]
    async fn deploys_main_to_a_distinct_address_each_time() {
        let conf = TestConfig::load();
        let profile = conf.funded_profile();
        let client = connect(&profile).await.unwrap();
        let deployer = EthersDeployer::for_profile(client, &profile);

        let data = fixture_store()
            .resolve("Main")
            .unwrap()
            .deployment_data(&[])
            .unwrap();

        let first = deployer.deploy("Main", data.clone()).await.unwrap();
        let second = deployer.deploy("Main", data).await.unwrap();
        dbg!(&first, &second);

        assert!(!first.address.is_zero());
        assert_eq!(first.address.as_bytes().len(), 20);
        assert_ne!(first.address, second.address);
        assert_ne!(first.transaction_hash, second.transaction_hash);
    }

    #[tokio::test]
    #[ignore = "requires a running node, see .env.example"]
    async fn unfunded_account_is_a_transaction_error() {
        let conf = TestConfig::load();
        let profile = conf.unfunded_profile();
        let client = connect(&profile).await.unwrap();
        let deployer = EthersDeployer::for_profile(client, &profile);

        let data = fixture_store()
            .resolve("Main")
            .unwrap()
            .deployment_data(&[])
            .unwrap();

        let err = deployer.deploy("Main", data).await.unwrap_err();
        dbg!(&err);

        assert!(matches!(err, DeployError::Transaction(_)));
    }
}
