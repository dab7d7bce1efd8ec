//! Layered deployment configuration.
//!
//! Values are merged with [`figment`] in increasing priority: built-in defaults, the TOML
//! config file, the legacy `pk` / `scanApi` variables of the Hardhat project, and finally
//! `LOTTERY_`-prefixed environment variables (nested keys separated by `__`).

use std::{fmt, path::Path, path::PathBuf, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::DeployError;

/// The default name of the configuration file.
pub const CONFIG_FILENAME: &str = "Lottery.toml";

/// Prefix of the environment variables overriding the configuration.
pub const ENV_PREFIX: &str = "LOTTERY_";

/// Legacy variable holding the deployer private key.
pub const LEGACY_PRIVATE_KEY_VAR: &str = "pk";

/// Legacy variable holding the block explorer API key.
pub const LEGACY_EXPLORER_KEY_VAR: &str = "scanApi";

/// The default RPC endpoint (Polygon Mumbai public node).
pub const DEFAULT_ENDPOINT: &str = "https://polygon-mumbai-bor.publicnode.com";

/// The default contract artifact name.
pub const DEFAULT_CONTRACT_NAME: &str = "lottery";

/// An opaque signer credential (hex-encoded private key).
///
/// The value never appears in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Exposes the raw secret. Only the signer module should call this.
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Network the contract is deployed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// A human-readable label for logs.
    pub name: String,
    /// RPC URL used for all submissions and reads.
    pub endpoint: Url,
    /// Ordered signer credentials. Only the first one is used.
    #[serde(default)]
    pub accounts: Vec<Credential>,
    /// Expected chain ID. When set, the node's `eth_chainId` must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: "mumbai".to_string(),
            endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL"),
            accounts: Vec::new(),
            chain_id: None,
        }
    }
}

/// Block explorer settings, passed through for external verification tooling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Where compiled artifacts live and which one to deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Root of the Hardhat (`artifacts/`) or Foundry (`out/`) build output.
    pub dir: PathBuf,
    /// Bare (`lottery`) or fully qualified (`contracts/Lottery.sol:lottery`) name.
    pub contract: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts"),
            contract: DEFAULT_CONTRACT_NAME.to_string(),
        }
    }
}

/// Bounds on the confirmation wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    /// Maximum time to wait for the transaction to reach a final state.
    pub timeout_secs: u64,
    /// Interval between receipt polls.
    pub poll_interval_ms: u64,
    /// Number of blocks (including the inclusion block) before the deployment counts as confirmed.
    pub confirmations: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            poll_interval_ms: 2_000,
            confirmations: 1,
        }
    }
}

impl ConfirmationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// The complete configuration of a deployment run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub explorer: ExplorerConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
}

impl DeployConfig {
    /// Build the layered figment for the given config file.
    ///
    /// A missing config file is not an error: defaults and the environment still apply.
    pub fn figment(path: &Path) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(DeployConfig::default()))
            .merge(Toml::file(path));

        if let Ok(pk) = std::env::var(LEGACY_PRIVATE_KEY_VAR) {
            figment = figment.merge(Serialized::default(
                "network.accounts",
                vec![Credential::new(pk)],
            ));
        }
        if let Ok(api_key) = std::env::var(LEGACY_EXPLORER_KEY_VAR) {
            figment = figment.merge(Serialized::default("explorer.api_key", api_key));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate the configuration.
    pub fn load(path: &Path) -> Result<Self, DeployError> {
        let config: Self = Self::figment(path).extract()?;
        config.validate()?;

        tracing::debug!(
            path = %path.display(),
            network = %config.network.name,
            endpoint = %config.network.endpoint,
            accounts = config.network.accounts.len(),
            explorer_api_key = config.explorer.api_key.is_some(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), DeployError> {
        match self.network.endpoint.scheme() {
            "http" | "https" => {}
            other => {
                return Err(DeployError::Configuration(format!(
                    "unsupported endpoint scheme `{other}` in {}, expected http or https",
                    self.network.endpoint
                )));
            }
        }

        if self.artifacts.contract.trim().is_empty() {
            return Err(DeployError::Configuration(
                "artifacts.contract must not be empty".to_string(),
            ));
        }

        if self.confirmation.timeout_secs == 0 {
            return Err(DeployError::Configuration(
                "confirmation.timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.confirmation.confirmations == 0 {
            return Err(DeployError::Configuration(
                "confirmation.confirmations must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
