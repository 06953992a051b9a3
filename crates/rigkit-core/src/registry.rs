//! Backend model registry.
//!
//! An explicit registry object maps numeric model identifiers to their
//! capability tables and backend factories. It is constructed once at
//! process start and passed by reference wherever model lookup is needed --
//! there is no global mutable state.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::backend::Backend;
use crate::caps::RigCaps;
use crate::error::{Error, Result};
use crate::rig::Rig;
use crate::types::PortConfig;

/// Constructs a backend for one model from port configuration.
pub type BackendFactory =
    Box<dyn Fn(&PortConfig) -> Result<Box<dyn Backend>> + Send + Sync>;

/// One registered model: its capability table plus a backend factory.
pub struct ModelEntry {
    /// The model's immutable capability table.
    pub caps: Arc<RigCaps>,
    factory: BackendFactory,
}

/// Registry of known rig models.
#[derive(Default)]
pub struct Registry {
    entries: BTreeMap<u32, ModelEntry>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Registry::default()
    }

    /// Register a model. Fails on a duplicate model id.
    pub fn register(&mut self, caps: Arc<RigCaps>, factory: BackendFactory) -> Result<()> {
        let id = caps.model_id;
        if self.entries.contains_key(&id) {
            return Err(Error::InvalidArgument(format!(
                "model id {id} already registered"
            )));
        }
        self.entries.insert(id, ModelEntry { caps, factory });
        Ok(())
    }

    /// Look up a model's capability table.
    pub fn caps(&self, model_id: u32) -> Option<Arc<RigCaps>> {
        self.entries.get(&model_id).map(|e| e.caps.clone())
    }

    /// All registered models, ordered by id.
    pub fn models(&self) -> impl Iterator<Item = &Arc<RigCaps>> {
        self.entries.values().map(|e| &e.caps)
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build an (uninitialized) device handle for a model.
    pub fn build(&self, model_id: u32, port: &PortConfig) -> Result<Rig> {
        let entry = self
            .entries
            .get(&model_id)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown model id {model_id}")))?;
        let backend = (entry.factory)(port)?;
        Ok(Rig::new(entry.caps.clone(), backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use async_trait::async_trait;

    struct NullBackend;

    #[async_trait]
    impl Backend for NullBackend {}

    fn caps_with_id(id: u32) -> Arc<RigCaps> {
        Arc::new(RigCaps {
            model_id: id,
            ..RigCaps::default()
        })
    }

    fn null_factory() -> BackendFactory {
        Box::new(|_port| Ok(Box::new(NullBackend) as Box<dyn Backend>))
    }

    #[test]
    fn register_and_lookup() {
        let mut reg = Registry::new();
        reg.register(caps_with_id(1), null_factory()).unwrap();
        reg.register(caps_with_id(2), null_factory()).unwrap();

        assert_eq!(reg.len(), 2);
        assert_eq!(reg.caps(1).unwrap().model_id, 1);
        assert!(reg.caps(3).is_none());
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut reg = Registry::new();
        reg.register(caps_with_id(1), null_factory()).unwrap();
        let r = reg.register(caps_with_id(1), null_factory());
        assert!(matches!(r, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn models_ordered_by_id() {
        let mut reg = Registry::new();
        reg.register(caps_with_id(7), null_factory()).unwrap();
        reg.register(caps_with_id(2), null_factory()).unwrap();
        let ids: Vec<u32> = reg.models().map(|c| c.model_id).collect();
        assert_eq!(ids, vec![2, 7]);
    }

    #[test]
    fn build_unknown_model_fails() {
        let reg = Registry::new();
        let r = reg.build(42, &PortConfig::default());
        assert!(matches!(r, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn build_creates_uninitialized_handle() {
        let mut reg = Registry::new();
        reg.register(caps_with_id(1), null_factory()).unwrap();
        let rig = reg.build(1, &PortConfig::default()).unwrap();
        assert_eq!(rig.phase(), crate::rig::Phase::Uninitialized);
        assert_eq!(rig.caps().model_id, 1);
    }
}
