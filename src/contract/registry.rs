use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Failure raised by an operation body. Halts the rest of the sequence.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{0}")]
pub struct OperationFault(pub String);

pub type OperationFn = Arc<dyn Fn(i64) -> Result<bool, OperationFault> + Send + Sync>;

#[derive(Clone)]
pub struct OperationDescriptor {
    pub name: String,
    pub operation: OperationFn,
    pub iterations: i64,
    pub gas_limit: i64,
}

impl OperationDescriptor {
    pub fn invoke(&self) -> Result<bool, OperationFault> {
        (self.operation)(self.iterations)
    }
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("name", &self.name)
            .field("iterations", &self.iterations)
            .field("gas_limit", &self.gas_limit)
            .finish_non_exhaustive()
    }
}

/// Open registration phase. Call [`Registry::seal`] once everything is
/// registered; the sealed [`Operations`] cannot grow.
#[derive(Debug, Default)]
pub struct Registry {
    descriptors: Vec<OperationDescriptor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, operation: F, iterations: i64, gas_limit: i64) -> &mut Self
    where
        F: Fn(i64) -> Result<bool, OperationFault> + Send + Sync + 'static,
    {
        self.descriptors.push(OperationDescriptor {
            name: name.to_string(),
            operation: Arc::new(operation),
            iterations,
            gas_limit,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn seal(self) -> Operations {
        Operations {
            descriptors: self.descriptors.into(),
        }
    }
}

/// Immutable, insertion-ordered operation table. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Operations {
    descriptors: Arc<[OperationDescriptor]>,
}

impl Operations {
    pub fn iter(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
