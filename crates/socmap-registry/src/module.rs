//! Module declarations and the keys they claim.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier of a hardware module (e.g. "ddrphy", "ethmac").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ModuleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The three kinds of address-space resource a module can own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    ControlSlot,
    InterruptLine,
    MemoryRegion,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::ControlSlot => write!(f, "control slot"),
            ResourceKind::InterruptLine => write!(f, "interrupt line"),
            ResourceKind::MemoryRegion => write!(f, "memory region"),
        }
    }
}

/// A base-relative memory window, `[base, base + size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryRegion {
    /// Offset of the first byte.
    pub base: u64,
    /// Length in bytes.
    pub size: u64,
}

impl MemoryRegion {
    pub fn new(base: u64, size: u64) -> Self {
        Self { base, size }
    }

    /// One past the last byte, or `None` if the region wraps the address space.
    pub fn end(&self) -> Option<u64> {
        self.base.checked_add(self.size)
    }

    /// Half-open overlap test. Empty or wrapping regions never overlap anything.
    pub fn overlaps(&self, other: &MemoryRegion) -> bool {
        match (self.end(), other.end()) {
            (Some(a_end), Some(b_end)) => {
                self.size > 0 && other.size > 0 && self.base < b_end && other.base < a_end
            }
            _ => false,
        }
    }

    /// Whether `addr` falls inside the region.
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base && self.end().is_some_and(|end| addr < end)
    }
}

impl fmt::Display for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[0x{:08X}, 0x{:08X})",
            self.base,
            self.base.saturating_add(self.size)
        )
    }
}

/// A concrete key in one of the registry's three maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKey {
    ControlSlot(u32),
    InterruptLine(u32),
    MemoryRegion(MemoryRegion),
}

impl ResourceKey {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceKey::ControlSlot(_) => ResourceKind::ControlSlot,
            ResourceKey::InterruptLine(_) => ResourceKind::InterruptLine,
            ResourceKey::MemoryRegion(_) => ResourceKind::MemoryRegion,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::ControlSlot(n) | ResourceKey::InterruptLine(n) => {
                write!(f, "{} {n}", self.kind())
            }
            ResourceKey::MemoryRegion(region) => write!(f, "{} {region}", self.kind()),
        }
    }
}

/// How a module asks for its control-register slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlotRequest {
    /// A specific slot number.
    Fixed(u32),
    /// One past the highest slot allocated so far.
    Next,
}

/// A physical resource the platform must grant for a module (pin group, clock input, bus).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRequest {
    /// Platform resource name (e.g. "ddram", "eth_clocks").
    pub name: String,
    /// Instance index for resources that exist more than once.
    #[serde(default)]
    pub index: u32,
}

impl ResourceRequest {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

/// A named hardware functional unit and the resources it claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    /// `None` means the module has no CPU-visible registers.
    pub control_slot: Option<SlotRequest>,
    pub interrupt: Option<u32>,
    pub memory: Option<MemoryRegion>,
    /// Physical resources requested from the platform, in declaration order.
    pub resources: Vec<ResourceRequest>,
    /// Static configuration (timing tables, geometry). Passed through, never read.
    pub config: Option<serde_json::Value>,
}

impl Module {
    /// Create a module with no claims.
    pub fn new(id: impl Into<ModuleId>) -> Self {
        Self {
            id: id.into(),
            control_slot: None,
            interrupt: None,
            memory: None,
            resources: Vec::new(),
            config: None,
        }
    }

    pub fn with_control_slot(mut self, slot: u32) -> Self {
        self.control_slot = Some(SlotRequest::Fixed(slot));
        self
    }

    /// Take the next free control slot when the module is composed.
    pub fn with_next_control_slot(mut self) -> Self {
        self.control_slot = Some(SlotRequest::Next);
        self
    }

    pub fn with_interrupt(mut self, line: u32) -> Self {
        self.interrupt = Some(line);
        self
    }

    pub fn with_memory(mut self, base: u64, size: u64) -> Self {
        self.memory = Some(MemoryRegion::new(base, size));
        self
    }

    pub fn with_resource(mut self, name: impl Into<String>, index: u32) -> Self {
        self.resources.push(ResourceRequest::new(name, index));
        self
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = Some(config);
        self
    }

    /// The fixed control slot, if one has been pinned.
    pub fn fixed_control_slot(&self) -> Option<u32> {
        match self.control_slot {
            Some(SlotRequest::Fixed(slot)) => Some(slot),
            _ => None,
        }
    }

    /// Keys this module claims. A `Next` slot request contributes nothing until pinned.
    pub fn keys(&self) -> Vec<ResourceKey> {
        let mut keys = Vec::with_capacity(3);
        if let Some(slot) = self.fixed_control_slot() {
            keys.push(ResourceKey::ControlSlot(slot));
        }
        if let Some(line) = self.interrupt {
            keys.push(ResourceKey::InterruptLine(line));
        }
        if let Some(region) = self.memory {
            keys.push(ResourceKey::MemoryRegion(region));
        }
        keys
    }

    /// Whether `declaration` describes this (already pinned) module unchanged.
    ///
    /// A `Next` slot request matches whatever slot the module was pinned to.
    pub fn matches_declaration(&self, declaration: &Module) -> bool {
        let slot_matches = match (self.control_slot, declaration.control_slot) {
            (Some(SlotRequest::Fixed(_)), Some(SlotRequest::Next)) => true,
            (ours, theirs) => ours == theirs,
        };
        slot_matches
            && self.id == declaration.id
            && self.interrupt == declaration.interrupt
            && self.memory == declaration.memory
            && self.resources == declaration.resources
            && self.config == declaration.config
    }
}
