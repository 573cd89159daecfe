pub mod ops;
pub mod registry;

use chrono::Utc;
use serde::Serialize;

pub use ops::OperationKind;
pub use registry::{OperationDescriptor, OperationFault, Operations, Registry};

/// Placeholder address: the base-58 alphabet.
pub const DEFAULT_ADDRESS: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

#[derive(Debug, Clone, Serialize)]
pub struct ContractInfo {
    pub id: String,
    pub name: String,
    pub address: String,
}

impl ContractInfo {
    pub fn new(name: Option<String>) -> Self {
        let name = name.unwrap_or_else(|| {
            format!("NewContract{}", Utc::now().format("%Y-%m-%d:%H:%M"))
        });
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            address: DEFAULT_ADDRESS.to_string(),
        }
    }
}

/// A named operation table ready for execution.
#[derive(Debug, Clone)]
pub struct Contract {
    pub info: ContractInfo,
    pub operations: Operations,
}

impl Contract {
    pub fn new(info: ContractInfo, registry: Registry) -> Self {
        Self {
            info,
            operations: registry.seal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_identity() {
        let a = ContractInfo::new(None);
        let b = ContractInfo::new(None);
        assert_ne!(a.id, b.id);
        assert!(a.name.starts_with("NewContract"));
        assert_eq!(a.address, DEFAULT_ADDRESS);
    }
}
