//! Additive composition of module declarations across board variants.
//!
//! A board family is described as a chain of layers: a base SoC, a variant
//! that adds networking, a further variant that adds video, and so on. Each
//! layer resolves to its parent's footprint plus its own declarations, and
//! the union must stay collision-free across the whole chain.

use std::sync::Arc;

use log::debug;

use crate::error::{RegistryError, Result};
use crate::module::{Module, ModuleId};
use crate::registry::{AddressMap, AddressSpaceRegistry};

/// One level of a board/SoC variant hierarchy.
#[derive(Debug, Clone)]
pub struct CompositionLayer {
    name: String,
    parent: Option<Arc<CompositionLayer>>,
    /// Modules introduced by this layer, with slots pinned.
    modules: Vec<Module>,
    /// Resolved footprint of the whole chain up to and including this layer.
    registry: AddressSpaceRegistry,
}

impl CompositionLayer {
    /// Create a layer with no parent.
    pub fn root(
        name: impl Into<String>,
        modules: impl IntoIterator<Item = Module>,
    ) -> Result<Arc<Self>> {
        Self::build(name.into(), None, modules).map(Arc::new)
    }

    /// Create a child layer that adds `modules` on top of this one.
    ///
    /// Fails with [`RegistryError::Conflict`] if any new module collides with
    /// anything in the chain, or [`RegistryError::Relocation`] if an inherited
    /// module is re-declared with a different footprint.
    pub fn extend(
        self: &Arc<Self>,
        name: impl Into<String>,
        modules: impl IntoIterator<Item = Module>,
    ) -> Result<Arc<Self>> {
        Self::build(name.into(), Some(Arc::clone(self)), modules).map(Arc::new)
    }

    fn build(
        name: String,
        parent: Option<Arc<CompositionLayer>>,
        modules: impl IntoIterator<Item = Module>,
    ) -> Result<Self> {
        let mut layer = Self {
            registry: parent
                .as_ref()
                .map(|p| p.registry.clone())
                .unwrap_or_default(),
            name,
            parent,
            modules: Vec::new(),
        };

        for module in modules {
            if let Some((existing, declared_in)) = layer.find_with_layer(&module.id) {
                if existing.matches_declaration(&module) {
                    debug!(
                        "layer '{}': '{}' re-declared unchanged (from '{declared_in}')",
                        layer.name, module.id
                    );
                    continue;
                }
                return Err(RegistryError::Relocation {
                    module: module.id.clone(),
                    declared_in: declared_in.to_string(),
                    layer: layer.name.clone(),
                });
            }
            let pinned = layer.registry.register_module(&module)?;
            layer.modules.push(pinned);
        }

        debug!(
            "layer '{}' composed: {} own modules, depth {}",
            layer.name,
            layer.modules.len(),
            layer.depth()
        );
        Ok(layer)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<CompositionLayer>> {
        self.parent.as_ref()
    }

    /// Modules introduced by this layer only.
    pub fn own_modules(&self) -> &[Module] {
        &self.modules
    }

    /// Number of ancestors.
    pub fn depth(&self) -> usize {
        self.ancestors().count() - 1
    }

    /// This layer followed by its parent, grandparent, and so on.
    pub fn ancestors(&self) -> impl Iterator<Item = &CompositionLayer> {
        std::iter::successors(Some(self), |layer| layer.parent.as_deref())
    }

    /// Every module in the chain, deepest ancestor first, paired with the layer that declared it.
    pub fn modules_with_layer(&self) -> Vec<(&str, &Module)> {
        let mut chain: Vec<&CompositionLayer> = self.ancestors().collect();
        chain.reverse();
        chain
            .into_iter()
            .flat_map(|layer| layer.modules.iter().map(move |m| (layer.name(), m)))
            .collect()
    }

    /// Every module in the chain, deepest ancestor first.
    pub fn modules(&self) -> Vec<&Module> {
        self.modules_with_layer().into_iter().map(|(_, m)| m).collect()
    }

    /// Look up a module anywhere in the chain.
    pub fn find(&self, id: &ModuleId) -> Option<&Module> {
        self.find_with_layer(id).map(|(m, _)| m)
    }

    fn find_with_layer(&self, id: &ModuleId) -> Option<(&Module, &str)> {
        self.ancestors().find_map(|layer| {
            layer
                .modules
                .iter()
                .find(|m| &m.id == id)
                .map(|m| (m, layer.name()))
        })
    }

    /// The chain's resolved footprint, in registration order.
    pub fn address_map(&self) -> &AddressMap {
        self.registry.map()
    }

    /// The chain's footprint in an order-independent form.
    pub fn footprint(&self) -> AddressMap {
        self.registry.footprint()
    }
}
