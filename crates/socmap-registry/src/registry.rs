//! Append-only ownership maps for control slots, interrupt lines and memory regions.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};
use crate::module::{MemoryRegion, Module, ModuleId, ResourceKey, SlotRequest};

/// A memory region together with the module that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryAssignment {
    pub region: MemoryRegion,
    pub module: ModuleId,
}

/// The resolved contents of a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressMap {
    /// Control-register slot -> owner.
    pub control_slots: BTreeMap<u32, ModuleId>,
    /// Interrupt line -> owner.
    pub interrupts: BTreeMap<u32, ModuleId>,
    /// Memory regions in registration order.
    pub memory: Vec<MemoryAssignment>,
}

impl AddressMap {
    /// Owner of the memory region containing `addr`.
    pub fn memory_owner(&self, addr: u64) -> Option<&ModuleId> {
        self.memory
            .iter()
            .find(|m| m.region.contains(addr))
            .map(|m| &m.module)
    }

    /// Every key owned by `module`.
    pub fn keys_of(&self, module: &ModuleId) -> Vec<ResourceKey> {
        let slots = self
            .control_slots
            .iter()
            .filter(|(_, owner)| *owner == module)
            .map(|(slot, _)| ResourceKey::ControlSlot(*slot));
        let lines = self
            .interrupts
            .iter()
            .filter(|(_, owner)| *owner == module)
            .map(|(line, _)| ResourceKey::InterruptLine(*line));
        let regions = self
            .memory
            .iter()
            .filter(|m| &m.module == module)
            .map(|m| ResourceKey::MemoryRegion(m.region));
        slots.chain(lines).chain(regions).collect()
    }
}

/// Registry of address-space ownership for one assembly run.
///
/// Registration is append-only. Re-registering the same module at the same
/// key is a no-op; any other collision is a [`RegistryError::Conflict`].
/// After [`resolve`](Self::resolve) the registry is frozen.
#[derive(Debug, Clone, Default)]
pub struct AddressSpaceRegistry {
    map: AddressMap,
    frozen: bool,
}

impl AddressSpaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key` for `module`.
    pub fn register(&mut self, key: ResourceKey, module: &ModuleId) -> Result<()> {
        self.ensure_writable(key, module)?;
        if self.check(key, module)? {
            debug!("{key} already held by '{module}', keeping existing entry");
            return Ok(());
        }
        self.insert(key, module);
        Ok(())
    }

    /// Register every key of `module` atomically.
    ///
    /// A `Next` slot request is pinned to [`next_control_slot`](Self::next_control_slot).
    /// Returns the module with its slot pinned. Nothing is inserted unless all keys fit.
    pub fn register_module(&mut self, module: &Module) -> Result<Module> {
        let mut pinned = module.clone();
        if pinned.control_slot == Some(SlotRequest::Next) {
            pinned.control_slot = Some(SlotRequest::Fixed(self.next_control_slot()));
        }

        let keys = pinned.keys();
        for key in &keys {
            self.ensure_writable(*key, &pinned.id)?;
            self.check(*key, &pinned.id)?;
        }
        for key in keys {
            if !self.check(key, &pinned.id)? {
                self.insert(key, &pinned.id);
            }
        }
        Ok(pinned)
    }

    /// Freeze the registry and return its contents.
    ///
    /// Calling again returns the same map; registration afterwards fails.
    pub fn resolve(&mut self) -> AddressMap {
        if !self.frozen {
            debug!(
                "resolving registry: {} control slots, {} interrupts, {} memory regions",
                self.map.control_slots.len(),
                self.map.interrupts.len(),
                self.map.memory.len()
            );
            self.frozen = true;
        }
        self.map.clone()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// One past the highest control slot in use, or 0 when none are.
    pub fn next_control_slot(&self) -> u32 {
        self.map
            .control_slots
            .keys()
            .next_back()
            .map_or(0, |slot| slot.saturating_add(1))
    }

    /// The module that owns `key`, if any. Memory keys match on overlap.
    pub fn owner(&self, key: ResourceKey) -> Option<&ModuleId> {
        match key {
            ResourceKey::ControlSlot(slot) => self.map.control_slots.get(&slot),
            ResourceKey::InterruptLine(line) => self.map.interrupts.get(&line),
            ResourceKey::MemoryRegion(region) => self
                .map
                .memory
                .iter()
                .find(|m| m.region.overlaps(&region))
                .map(|m| &m.module),
        }
    }

    /// Current contents, without freezing.
    pub fn map(&self) -> &AddressMap {
        &self.map
    }

    /// An order-independent view, used to compare footprints of different compositions.
    pub fn footprint(&self) -> AddressMap {
        let mut map = self.map.clone();
        map.memory.sort_by_key(|m| (m.region.base, m.region.size));
        map
    }

    /// Number of registered keys across all three maps.
    pub fn len(&self) -> usize {
        self.map.control_slots.len() + self.map.interrupts.len() + self.map.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_writable(&self, key: ResourceKey, module: &ModuleId) -> Result<()> {
        if self.frozen {
            return Err(RegistryError::Frozen {
                key,
                module: module.clone(),
            });
        }
        Ok(())
    }

    /// Validate `key` for `module`. `Ok(true)` means the module already holds it.
    fn check(&self, key: ResourceKey, module: &ModuleId) -> Result<bool> {
        let conflict = |held: ResourceKey, owner: &ModuleId| RegistryError::Conflict {
            requested: key,
            module: module.clone(),
            held,
            owner: owner.clone(),
        };

        match key {
            ResourceKey::ControlSlot(_) | ResourceKey::InterruptLine(_) => match self.owner(key) {
                Some(owner) if owner == module => Ok(true),
                Some(owner) => Err(conflict(key, owner)),
                None => Ok(false),
            },
            ResourceKey::MemoryRegion(region) => {
                if region.size == 0 {
                    return Err(RegistryError::InvalidRegion {
                        module: module.clone(),
                        detail: format!("region at 0x{:08X} has zero size", region.base),
                    });
                }
                if region.end().is_none() {
                    return Err(RegistryError::InvalidRegion {
                        module: module.clone(),
                        detail: format!(
                            "region at 0x{:X} with size 0x{:X} runs past the end of the address space",
                            region.base, region.size
                        ),
                    });
                }
                for existing in &self.map.memory {
                    if existing.region == region && &existing.module == module {
                        return Ok(true);
                    }
                    if existing.region.overlaps(&region) {
                        return Err(conflict(
                            ResourceKey::MemoryRegion(existing.region),
                            &existing.module,
                        ));
                    }
                }
                Ok(false)
            }
        }
    }

    fn insert(&mut self, key: ResourceKey, module: &ModuleId) {
        debug!("registering {key} for '{module}'");
        match key {
            ResourceKey::ControlSlot(slot) => {
                self.map.control_slots.insert(slot, module.clone());
            }
            ResourceKey::InterruptLine(line) => {
                self.map.interrupts.insert(line, module.clone());
            }
            ResourceKey::MemoryRegion(region) => self.map.memory.push(MemoryAssignment {
                region,
                module: module.clone(),
            }),
        }
    }
}
