use std::{path::Path, time::Duration};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use treefarm_model::{
    tree::{CacheDb, RemoteState},
    MirroredTree,
};
use treefarm_utils::{Address, U256};

/// Prefix of the environment variables read by [`FarmConfig::load`].
pub const ENV_PREFIX: &str = "TREEFARM_";

/// We use `__` in the name of environment variable as an alias of `.`.
///
/// See [`Env`] for more information.
const DOT_ALIAS: &str = "__";

const ETHER: u128 = 1_000_000_000_000_000_000;

const DEFAULT_MAKE_RELATION_VALUE_ETHER: u64 = 4;

const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 5_000;

/// Address tree mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TreeMode {
    /// The tree contract lives in the local ledger.
    #[default]
    Authoritative,
    /// The tree is mirrored from a remote chain.
    Mirrored {
        /// Version of the remote tree to mirror.
        tree_version: u64,
    },
}

impl TreeMode {
    /// Returns whether the tree is mirrored.
    pub fn is_mirrored(&self) -> bool {
        matches!(self, Self::Mirrored { .. })
    }

    /// Mirrored tree version, if any.
    pub fn tree_version(&self) -> Option<u64> {
        match self {
            Self::Authoritative => None,
            Self::Mirrored { tree_version } => Some(*tree_version),
        }
    }
}

/// Farm configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmConfig {
    /// Farm contract.
    pub farm_contract: Address,
    /// Address tree contract.
    pub address_tree_contract: Address,
    /// Minimum native value, in whole ether, of a transfer creating a relation.
    pub make_relation_value_ether: u64,
    /// Activation height of the 0815 fork, never active if unset.
    pub fork_0815_block: Option<u64>,
    /// Tree mode.
    pub tree: TreeMode,
    /// Deadline of a single remote read, in milliseconds.
    pub remote_timeout_ms: u64,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            farm_contract: Address::ZERO,
            address_tree_contract: Address::ZERO,
            make_relation_value_ether: DEFAULT_MAKE_RELATION_VALUE_ETHER,
            fork_0815_block: None,
            tree: TreeMode::default(),
            remote_timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
        }
    }
}

impl FarmConfig {
    /// Providers of the configuration: defaults, then the TOML file at
    /// `path`, then `TREEFARM_`-prefixed environment variables.
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split(DOT_ALIAS))
    }

    /// Load and validate the configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment(path))
    }

    /// Extract and validate the configuration from `figment`.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.farm_contract.is_zero() {
            return Err(ConfigError::MissingContract("farm"));
        }
        if self.address_tree_contract.is_zero() {
            return Err(ConfigError::MissingContract("address tree"));
        }
        if self.tree.tree_version() == Some(0) {
            return Err(ConfigError::InvalidTreeVersion);
        }
        if self.remote_timeout_ms == 0 {
            return Err(ConfigError::InvalidRemoteTimeout);
        }
        Ok(())
    }

    /// Minimum native value, in wei, of a transfer creating a relation.
    pub fn make_relation_value(&self) -> U256 {
        U256::from(self.make_relation_value_ether).saturating_mul(U256::from(ETHER))
    }

    /// Returns whether the 0815 fork is active at block `number`.
    pub fn is_fork_0815(&self, number: u64) -> bool {
        self.fork_0815_block.is_some_and(|block| number >= block)
    }

    /// Deadline of a single remote read.
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    /// Create the mirrored tree of the configured tree contract, reading
    /// `remote` with the configured deadline.
    ///
    /// Returns `None` in authoritative mode.
    pub fn mirrored_tree<R, D>(
        &self,
        remote: R,
        cache: D,
    ) -> crate::Result<Option<MirroredTree<R, D>>>
    where
        R: RemoteState,
        D: CacheDb,
    {
        let Some(tree_version) = self.tree.tree_version() else {
            return Ok(None);
        };
        let tree = MirroredTree::new(self.address_tree_contract, remote, cache, tree_version)?
            .with_remote_timeout(self.remote_timeout());
        Ok(Some(tree))
    }
}

/// Config Errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Figment Error.
    #[error("figment: {0}")]
    Figment(#[from] Box<figment::Error>),
    /// A contract address is not set.
    #[error("{0} contract is not set")]
    MissingContract(&'static str),
    /// Mirrored tree version zero.
    #[error("mirrored tree version must be positive")]
    InvalidTreeVersion,
    /// Zero remote timeout.
    #[error("remote timeout must be positive")]
    InvalidRemoteTimeout,
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    const FARM: &str = "0x00000000000000000000000000000000000000f1";
    const TREE: &str = "0x00000000000000000000000000000000000000f2";

    #[test]
    fn defaults() {
        let config = FarmConfig::default();
        assert_eq!(config.make_relation_value_ether, 4);
        assert_eq!(
            config.make_relation_value(),
            U256::from(4u64) * U256::from(ETHER)
        );
        assert!(!config.tree.is_mirrored());
        assert!(!config.is_fork_0815(u64::MAX));
        assert_eq!(config.remote_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn mirrored_tree_follows_the_tree_mode() -> crate::Result<()> {
        use treefarm_model::test::{MemoryCache, MockRemote};

        let mut config = FarmConfig {
            address_tree_contract: Address([2; 20]),
            remote_timeout_ms: 250,
            ..Default::default()
        };
        assert!(config
            .mirrored_tree(MockRemote::default(), MemoryCache::default())?
            .is_none());

        config.tree = TreeMode::Mirrored { tree_version: 3 };
        let tree = config
            .mirrored_tree(MockRemote::default(), MemoryCache::default())?
            .unwrap();
        assert_eq!(tree.tree_version(), 3);
        assert_eq!(tree.remote_timeout(), Duration::from_millis(250));
        Ok(())
    }

    #[test]
    fn fork_activation_is_inclusive() {
        let config = FarmConfig {
            fork_0815_block: Some(100),
            ..Default::default()
        };
        assert!(!config.is_fork_0815(99));
        assert!(config.is_fork_0815(100));
        assert!(config.is_fork_0815(101));
    }

    #[test]
    fn load_from_file_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "farm.toml",
                &format!(
                    r#"
                    farm_contract = "{FARM}"
                    address_tree_contract = "{TREE}"
                    fork_0815_block = 815

                    [tree]
                    mode = "mirrored"
                    tree_version = 3
                    "#
                ),
            )?;
            jail.set_env("TREEFARM_MAKE_RELATION_VALUE_ETHER", 10);
            jail.set_env("TREEFARM_TREE__TREE_VERSION", 4);

            let config = FarmConfig::load("farm.toml").map_err(|err| err.to_string())?;
            assert_eq!(config.farm_contract, FARM.parse::<Address>().map_err(|_| "farm")?);
            assert_eq!(config.address_tree_contract, TREE.parse::<Address>().map_err(|_| "tree")?);
            assert_eq!(config.make_relation_value_ether, 10);
            assert_eq!(config.fork_0815_block, Some(815));
            assert_eq!(config.tree, TreeMode::Mirrored { tree_version: 4 });
            assert_eq!(config.remote_timeout_ms, DEFAULT_REMOTE_TIMEOUT_MS);
            Ok(())
        });
    }

    #[test]
    fn missing_contracts_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("farm.toml", &format!("farm_contract = \"{FARM}\""))?;
            let err = FarmConfig::load("farm.toml").expect_err("tree contract is not set");
            assert!(matches!(err, ConfigError::MissingContract("address tree")));
            Ok(())
        });
    }

    #[test]
    fn mirrored_version_zero_is_rejected() {
        let config = FarmConfig {
            farm_contract: Address([1; 20]),
            address_tree_contract: Address([2; 20]),
            tree: TreeMode::Mirrored { tree_version: 0 },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTreeVersion)
        ));
    }

    #[test]
    fn serializes_tagged_tree_mode() -> Result<(), serde_json::Error> {
        let mode = TreeMode::Mirrored { tree_version: 2 };
        let json = serde_json::to_value(mode)?;
        assert_eq!(json["mode"], "mirrored");
        assert_eq!(json["tree_version"], 2);
        assert_eq!(serde_json::from_value::<TreeMode>(json)?, mode);
        Ok(())
    }
}
