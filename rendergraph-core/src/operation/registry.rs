//! Operation registry.
//!
//! Maps string identifiers (the `subtype` metadata of pass nodes) to
//! factories. Shared between compilers behind an `Arc`; registration and
//! lookup take a read/write lock, never held across a factory call.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::{Operation, Pass, PassOperation};
use crate::error::{Error, Result};

/// Creates a fresh operation per pass node.
pub type OperationFactory = Arc<dyn Fn() -> Box<dyn Operation> + Send + Sync>;

#[derive(Default)]
pub struct OperationRegistry {
    factories: RwLock<IndexMap<String, OperationFactory>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `identifier`. Duplicate identifiers are rejected.
    pub fn register<F>(&self, identifier: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn() -> Box<dyn Operation> + Send + Sync + 'static,
    {
        let identifier = identifier.into();
        let mut factories = self.factories.write();

        if factories.contains_key(&identifier) {
            tracing::warn!(%identifier, "operation already registered");
            return Err(Error::DuplicateOperation(identifier));
        }

        tracing::debug!(%identifier, "operation registered");
        factories.insert(identifier, Arc::new(factory));
        Ok(())
    }

    /// Register a [`Pass`] factory; each created pass is wrapped in a [`PassOperation`].
    pub fn register_pass<P, F>(&self, identifier: impl Into<String>, factory: F) -> Result<()>
    where
        P: Pass + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        self.register(identifier, move || {
            Box::new(PassOperation::new(factory())) as Box<dyn Operation>
        })
    }

    /// Instantiate the operation registered under `identifier`.
    pub fn create(&self, identifier: &str) -> Result<Box<dyn Operation>> {
        let factory = self
            .factories
            .read()
            .get(identifier)
            .cloned()
            .ok_or_else(|| Error::UnknownOperationType(identifier.to_string()))?;
        Ok(factory())
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.factories.read().contains_key(identifier)
    }

    /// Registered identifiers, in registration order.
    pub fn identifiers(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("identifiers", &self.identifiers())
            .finish()
    }
}
