use std::collections::HashSet;

use ethers::{
    abi::Token,
    types::{Address, Bytes},
};
use log::{debug, info};

use crate::{
    artifacts::{ArtifactStore, ContractArtifact},
    deployer::{ContractDeployer, DeployedContract},
    error::{DeployError, Result},
};

pub const MAIN_CONTRACT: &str = "Main";
pub const BASE_TOKEN_CONTRACT: &str = "BaseToken";

/// A constructor argument: either a fixed value or the address of a contract
/// deployed by an earlier step.
#[derive(Clone, Debug, PartialEq)]
pub enum StepArg {
    Token(Token),
    DeployedAddress(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeploymentStep {
    pub id: String,
    pub contract: String,
    pub args: Vec<StepArg>,
    pub enabled: bool,
}

impl DeploymentStep {
    pub fn new(id: &str, contract: &str) -> Self {
        Self {
            id: id.to_owned(),
            contract: contract.to_owned(),
            args: Vec::new(),
            enabled: true,
        }
    }

    pub fn arg(mut self, token: Token) -> Self {
        self.args.push(StepArg::Token(token));
        self
    }

    pub fn address_of(mut self, step_id: &str) -> Self {
        self.args.push(StepArg::DeployedAddress(step_id.to_owned()));
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Ordered deployment steps. References only ever point backwards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeploymentPlan {
    steps: Vec<DeploymentStep>,
}

impl DeploymentPlan {
    pub fn new(steps: Vec<DeploymentStep>) -> Self {
        Self { steps }
    }

    /// `Main`, then two `BaseToken`s bound to it. The token steps stay
    /// disabled until they are switched on explicitly.
    pub fn default_plan() -> Self {
        Self::new(vec![
            DeploymentStep::new("main", MAIN_CONTRACT),
            DeploymentStep::new("token1", BASE_TOKEN_CONTRACT)
                .address_of("main")
                .disabled(),
            DeploymentStep::new("token2", BASE_TOKEN_CONTRACT)
                .address_of("main")
                .disabled(),
        ])
    }

    pub fn steps(&self) -> &[DeploymentStep] {
        &self.steps
    }

    pub fn enable(&mut self, step_id: &str) -> Result<()> {
        let step = self
            .steps
            .iter_mut()
            .find(|step| step.id == step_id)
            .ok_or_else(|| DeployError::Config(format!("no deployment step `{step_id}`")))?;
        step.enabled = true;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let mut deployed_before = HashSet::new();

        for step in &self.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(DeployError::Config(format!(
                    "deployment step `{}` is declared twice",
                    step.id
                )));
            }
            if !step.enabled {
                continue;
            }

            for arg in &step.args {
                if let StepArg::DeployedAddress(reference) = arg {
                    if !deployed_before.contains(reference.as_str()) {
                        return Err(DeployError::Config(format!(
                            "step `{}` needs the address of `{reference}`, which is not an enabled earlier step",
                            step.id
                        )));
                    }
                }
            }
            deployed_before.insert(step.id.as_str());
        }

        Ok(())
    }

    /// Validate the plan and resolve every enabled step's artifact, before
    /// anything touches the network.
    pub fn resolve(&self, artifacts: &ArtifactStore) -> Result<ResolvedPlan> {
        self.validate()?;

        let mut steps = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let artifact = if step.enabled {
                Some(artifacts.resolve(&step.contract)?)
            } else {
                None
            };
            steps.push((step.clone(), artifact));
        }

        Ok(ResolvedPlan { steps })
    }
}

pub struct ResolvedPlan {
    steps: Vec<(DeploymentStep, Option<ContractArtifact>)>,
}

impl ResolvedPlan {
    /// Deploy enabled steps in order, one confirmed transaction at a time.
    /// The first failure aborts the run.
    pub async fn execute<D>(&self, deployer: &D) -> Result<DeploymentReport>
    where
        D: ContractDeployer + ?Sized,
    {
        let mut report = DeploymentReport::default();

        for (step, artifact) in &self.steps {
            let Some(artifact) = artifact else {
                debug!("skipping disabled step `{}`", step.id);
                report.skipped.push(step.id.clone());
                continue;
            };

            let args = step
                .args
                .iter()
                .map(|arg| report.token_for(arg))
                .collect::<Result<Vec<_>>>()?;
            let data: Bytes = artifact.deployment_data(&args)?;

            info!("step `{}`: deploying {}", step.id, step.contract);
            let contract = deployer.deploy(&step.contract, data).await?;
            report.deployed.push(StepOutcome {
                step: step.id.clone(),
                contract,
            });
        }

        Ok(report)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: String,
    pub contract: DeployedContract,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeploymentReport {
    pub deployed: Vec<StepOutcome>,
    pub skipped: Vec<String>,
}

impl DeploymentReport {
    pub fn get(&self, step_id: &str) -> Option<&DeployedContract> {
        self.deployed
            .iter()
            .find(|outcome| outcome.step == step_id)
            .map(|outcome| &outcome.contract)
    }

    pub fn address_of(&self, step_id: &str) -> Option<Address> {
        self.get(step_id).map(|contract| contract.address)
    }

    fn token_for(&self, arg: &StepArg) -> Result<Token> {
        match arg {
            StepArg::Token(token) => Ok(token.clone()),
            // validate() guarantees the reference was deployed earlier
            StepArg::DeployedAddress(step_id) => self
                .address_of(step_id)
                .map(Token::Address)
                .ok_or_else(|| {
                    DeployError::Config(format!("step `{step_id}` has not been deployed"))
                }),
        }
    }
}
