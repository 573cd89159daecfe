use serde::Deserialize;
use thiserror::Error;

use crate::contract::{Contract, ContractInfo, OperationKind, Registry};
use crate::pacer::DEFAULT_SCALE_FACTOR;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub contract: ContractConfig,
    #[serde(default = "default_gas")]
    pub gas: i64,
    #[serde(default = "default_scale_factor")]
    pub scale_factor: u64,
    /// Inner loop bound of the watchdog.
    #[serde(default = "default_yardstick")]
    pub yardstick: i64,
    #[serde(default = "default_true")]
    pub stop_losing_pacer: bool,
    pub operations: Vec<OperationConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContractConfig {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OperationConfig {
    pub kind: OperationKind,
    pub loops: i64,
    pub gas_limit: i64,
}

fn default_gas() -> i64 {
    5_000
}

fn default_scale_factor() -> u64 {
    DEFAULT_SCALE_FACTOR
}

fn default_yardstick() -> i64 {
    1_000_000_000
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// The stock demo session: three complex and three short loops with
    /// limits chosen so that some of them overrun.
    pub fn demo() -> Self {
        let op = |kind, loops, gas_limit| OperationConfig {
            kind,
            loops,
            gas_limit,
        };
        Self {
            contract: ContractConfig {
                name: Some("TestContract".to_string()),
            },
            gas: default_gas(),
            scale_factor: default_scale_factor(),
            yardstick: default_yardstick(),
            stop_losing_pacer: true,
            operations: vec![
                op(OperationKind::ComplexLoop, 100, 10_000_000_000),
                op(OperationKind::ShortLoop, 10, 20_000_000_000),
                op(OperationKind::ComplexLoop, 100, 100_000_000),
                op(OperationKind::ShortLoop, 10, 20_000_000),
                op(OperationKind::ShortLoop, 10, 20_000_000),
                op(OperationKind::ComplexLoop, 100, 100_000_000),
            ],
        }
    }

    pub fn build_contract(&self) -> Contract {
        let mut registry = Registry::new();
        for op in &self.operations {
            registry.register(&op.kind.to_string(), op.kind.body(), op.loops, op.gas_limit);
        }
        Contract::new(ContractInfo::new(self.contract.name.clone()), registry)
    }
}
