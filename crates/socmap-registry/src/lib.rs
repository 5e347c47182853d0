//! Address-space registry and module composition for socmap.
//!
//! A System-on-Chip is assembled from hardware modules, each of which may
//! claim a control-register slot, an interrupt line and a memory region.
//! This crate owns two pieces:
//!
//! - **[`AddressSpaceRegistry`]:** append-only ownership maps that reject
//!   collisions and freeze once resolved.
//! - **[`CompositionLayer`]:** the "variant extends base" hierarchy. Each
//!   layer inherits its parent's resolved footprint and may only add to it.

pub mod error;
pub mod layer;
pub mod module;
pub mod registry;

pub use error::{RegistryError, Result};
pub use layer::CompositionLayer;
pub use module::{
    MemoryRegion, Module, ModuleId, ResourceKey, ResourceKind, ResourceRequest, SlotRequest,
};
pub use registry::{AddressMap, AddressSpaceRegistry, MemoryAssignment};
