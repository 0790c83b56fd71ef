//! Model registry for front-end discovery.
//!
//! Each model variant self-registers via [`inventory::submit!`] with a
//! [`ModelEntry`] containing its CLI name, a description and the model
//! tag. The front-end discovers the available machines at runtime
//! without a central list.

use crate::bbc::model::Model;
use crate::bbc::{Machine, MachineConfig};

/// Describes one front-end-selectable machine variant.
pub struct ModelEntry {
    /// CLI name used to select this model (e.g. "master").
    pub name: &'static str,
    pub description: &'static str,
    pub model: Model,
}

impl ModelEntry {
    pub const fn new(name: &'static str, description: &'static str, model: Model) -> Self {
        Self { name, description, model }
    }

    pub fn create(&self, config: MachineConfig) -> Machine {
        Machine::new(self.model, config)
    }
}

inventory::collect!(ModelEntry);

inventory::submit! {
    ModelEntry::new("b", "BBC Model B (32K)", Model::B)
}

inventory::submit! {
    ModelEntry::new("bplus", "BBC Model B+ (64K)", Model::BPlus)
}

inventory::submit! {
    ModelEntry::new("master", "BBC Master 128", Model::Master)
}

/// Return all registered model variants, sorted by name.
pub fn all() -> Vec<&'static ModelEntry> {
    let mut entries: Vec<_> = inventory::iter::<ModelEntry>.into_iter().collect();
    entries.sort_by_key(|e| e.name);
    entries
}

/// Look up a model variant by its CLI name.
pub fn find(name: &str) -> Option<&'static ModelEntry> {
    inventory::iter::<ModelEntry>.into_iter().find(|e| e.name == name)
}
