//! Compiled contract artifact resolution.
//!
//! Artifacts are read from the build output of either Hardhat (`artifacts/`) or Foundry
//! (`out/`). Both lay out one JSON file per contract under a directory named after the
//! source file, e.g. `artifacts/contracts/Lottery.sol/lottery.json`.

use std::path::{Path, PathBuf};

use alloy_core::{json_abi::JsonAbi, primitives::Bytes};
use anyhow::Context;
use serde::Deserialize;

use crate::DeployError;

/// Directory holding compiler metadata rather than contract artifacts.
const BUILD_INFO_DIR: &str = "build-info";

/// Compiled contract code plus its interface description.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractArtifact {
    /// The name the artifact was resolved by.
    pub name: String,
    /// The contract interface.
    pub abi: JsonAbi,
    /// Creation bytecode.
    pub bytecode: Bytes,
    /// The file the artifact was read from, if any.
    pub path: Option<PathBuf>,
}

/// Resolves a contract name to its compiled artifact.
pub trait ArtifactResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<ContractArtifact, DeployError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    abi: JsonAbi,
    bytecode: RawBytecode,
}

/// Hardhat stores the bytecode as a hex string, Foundry as `{ "object": "0x.." }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(String),
    Object { object: String },
}

impl RawBytecode {
    fn as_hex(&self) -> &str {
        match self {
            RawBytecode::Hex(hex) => hex,
            RawBytecode::Object { object } => object,
        }
    }
}

/// Artifacts read from a build output directory on disk.
#[derive(Debug, Clone)]
pub struct FsArtifacts {
    root: PathBuf,
}

impl FsArtifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Locate the artifact file for a bare or fully qualified name.
    fn locate(&self, name: &str) -> Result<PathBuf, DeployError> {
        let not_found = || DeployError::ArtifactNotFound {
            name: name.to_string(),
            searched: self.root.clone(),
        };

        // Fully qualified: `contracts/Lottery.sol:lottery`.
        if let Some((source, contract)) = name.rsplit_once(':') {
            let path = self.root.join(source).join(format!("{contract}.json"));
            return if path.is_file() { Ok(path) } else { Err(not_found()) };
        }

        let file_name = format!("{name}.json");
        let mut matches = Vec::new();
        find_files(&self.root, &file_name, &mut matches).map_err(|e| {
            DeployError::InvalidArtifact {
                name: name.to_string(),
                reason: format!("{e:#}"),
            }
        })?;

        match matches.len() {
            0 => Err(not_found()),
            1 => Ok(matches.remove(0)),
            _ => {
                let candidates = matches
                    .iter()
                    .map(|p| p.strip_prefix(&self.root).unwrap_or(p).display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                Err(DeployError::InvalidArtifact {
                    name: name.to_string(),
                    reason: format!(
                        "ambiguous name, found {candidates}; use a fully qualified name (<source>:<contract>)"
                    ),
                })
            }
        }
    }
}

impl ArtifactResolver for FsArtifacts {
    fn resolve(&self, name: &str) -> Result<ContractArtifact, DeployError> {
        let path = self.locate(name)?;
        let invalid = |reason: String| DeployError::InvalidArtifact {
            name: name.to_string(),
            reason,
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))
            .map_err(|e| invalid(format!("{e:#}")))?;
        let raw: RawArtifact = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
            .map_err(|e| invalid(format!("{e:#}")))?;

        let bytecode = decode_bytecode(raw.bytecode.as_hex()).map_err(invalid)?;

        if let Some(constructor) = &raw.abi.constructor {
            if !constructor.inputs.is_empty() {
                return Err(invalid(format!(
                    "constructor expects {} argument(s), deployment passes none",
                    constructor.inputs.len()
                )));
            }
        }

        tracing::debug!(
            name,
            path = %path.display(),
            bytecode_len = bytecode.len(),
            "Artifact resolved"
        );

        Ok(ContractArtifact {
            name: name.to_string(),
            abi: raw.abi,
            bytecode,
            path: Some(path),
        })
    }
}

/// Decode creation bytecode, rejecting what cannot be deployed directly.
fn decode_bytecode(code: &str) -> Result<Bytes, String> {
    let code = code.trim();
    let code = code.strip_prefix("0x").unwrap_or(code);

    if code.is_empty() {
        return Err("empty bytecode (abstract contract or interface?)".to_string());
    }
    if code.contains("__$") {
        return Err("bytecode has unlinked library placeholders".to_string());
    }

    hex::decode(code)
        .map(Bytes::from)
        .map_err(|e| format!("bytecode is not valid hex: {e}"))
}

/// Recursively collect files named `file_name`, skipping compiler metadata.
fn find_files(dir: &Path, file_name: &str, out: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read entry in {}", dir.display()))?;
        let path = entry.path();

        if path.is_dir() {
            if entry.file_name() != BUILD_INFO_DIR {
                find_files(&path, file_name, out)?;
            }
        } else if entry.file_name().to_str() == Some(file_name) {
            out.push(path);
        }
    }

    Ok(())
}
