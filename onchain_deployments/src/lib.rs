pub mod artifacts;
pub mod client;
pub mod config;
pub mod deployer;
pub mod error;
pub mod plan;
pub mod runner;

pub use error::{DeployError, Result};
pub use runner::run_deployment;
