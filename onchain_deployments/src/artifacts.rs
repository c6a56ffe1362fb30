use std::{
    fs,
    path::{Path, PathBuf},
};

use ethers::{
    abi::{Abi, Token},
    types::Bytes,
};
use log::debug;
use serde::Deserialize;

use crate::error::{DeployError, Result};

const ARTIFACT_EXTENSION: &str = "json";
const DEBUG_ARTIFACT_SUFFIX: &str = ".dbg.json";
const BUILD_INFO_DIR: &str = "build-info";

/// A compiled contract as written by the framework's compile step, e.g.
/// `artifacts/contracts/Main.sol/Main.json`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub contract_name: String,
    pub source_name: String,
    pub abi: Abi,
    pub bytecode: Bytes,
}

impl ContractArtifact {
    /// Creation code followed by the ABI-encoded constructor arguments.
    pub fn deployment_data(&self, args: &[Token]) -> Result<Bytes> {
        if self.bytecode.is_empty() {
            return Err(DeployError::resolution(
                &self.contract_name,
                "contract has no bytecode, it is abstract or an interface and can't be deployed",
            ));
        }

        match self.abi.constructor() {
            Some(constructor) => constructor
                .encode_input(self.bytecode.to_vec(), args)
                .map(Bytes::from)
                .map_err(|e| {
                    DeployError::resolution(
                        &self.contract_name,
                        format!(
                            "constructor expects {} argument(s) of types ({}), got {} ({e})",
                            constructor.inputs.len(),
                            constructor
                                .inputs
                                .iter()
                                .map(|p| p.kind.to_string())
                                .collect::<Vec<_>>()
                                .join(", "),
                            args.len()
                        ),
                    )
                }),
            None if args.is_empty() => Ok(self.bytecode.clone()),
            None => Err(DeployError::resolution(
                &self.contract_name,
                format!("contract has no constructor but {} argument(s) were given", args.len()),
            )),
        }
    }
}

/// Looks contracts up in an artifacts directory, by bare name (`Main`) or
/// fully qualified name (`contracts/Main.sol:Main`).
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, name: &str) -> Result<ContractArtifact> {
        if !self.root.is_dir() {
            return Err(DeployError::resolution(
                name,
                format!(
                    "artifacts directory {} does not exist, compile the contracts first",
                    self.root.display()
                ),
            ));
        }

        let path = match name.rsplit_once(':') {
            Some((source_name, contract_name)) => {
                let path = self
                    .root
                    .join(source_name)
                    .join(format!("{contract_name}.{ARTIFACT_EXTENSION}"));
                if !path.is_file() {
                    return Err(DeployError::resolution(
                        name,
                        format!("no artifact at {}", path.display()),
                    ));
                }
                path
            }
            None => self.find_unique(name)?,
        };

        debug!("resolved `{name}` to {}", path.display());
        self.read_artifact(name, &path)
    }

    fn find_unique(&self, contract_name: &str) -> Result<PathBuf> {
        let file_name = format!("{contract_name}.{ARTIFACT_EXTENSION}");
        let mut matches = Vec::new();
        collect_artifacts(&self.root, &file_name, &mut matches)?;
        matches.sort();

        let mut candidates = matches.into_iter();
        match (candidates.next(), candidates.next()) {
            (Some(path), None) => Ok(path),
            (None, _) => Err(DeployError::resolution(
                contract_name,
                format!("no compiled artifact found under {}", self.root.display()),
            )),
            (Some(first), Some(second)) => {
                let names: Vec<String> = [first, second]
                    .into_iter()
                    .chain(candidates)
                    .map(|path| self.qualified_name(&path, contract_name))
                    .collect();
                Err(DeployError::resolution(
                    contract_name,
                    format!(
                        "multiple artifacts match, use a fully qualified name: {}",
                        names.join(", ")
                    ),
                ))
            }
        }
    }

    fn qualified_name(&self, artifact_path: &Path, contract_name: &str) -> String {
        let source = artifact_path
            .parent()
            .and_then(|dir| dir.strip_prefix(&self.root).ok())
            .map(|dir| dir.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        format!("{source}:{contract_name}")
    }

    fn read_artifact(&self, name: &str, path: &Path) -> Result<ContractArtifact> {
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| {
            DeployError::resolution(name, format!("malformed artifact {}: {e}", path.display()))
        })
    }
}

fn collect_artifacts(dir: &Path, file_name: &str, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if path.file_name().is_some_and(|n| n == BUILD_INFO_DIR) {
                continue;
            }
            collect_artifacts(&path, file_name, out)?;
        } else if path.file_name().is_some_and(|n| n == file_name)
            && !path.to_string_lossy().ends_with(DEBUG_ARTIFACT_SUFFIX)
        {
            out.push(path);
        }
    }
    Ok(())
}
