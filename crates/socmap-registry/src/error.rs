//! Error types for address-space registration and composition.

use crate::module::{ModuleId, ResourceKey};

/// Errors raised while registering or composing modules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Two modules claim the same slot, line, or overlapping region.
    #[error("{requested} for module '{module}' conflicts with {held} owned by '{owner}'")]
    Conflict {
        /// Key the new module asked for.
        requested: ResourceKey,
        /// Module asking for the key.
        module: ModuleId,
        /// Key already held (differs from `requested` for partial region overlaps).
        held: ResourceKey,
        /// Module that already owns `held`.
        owner: ModuleId,
    },

    /// Registration attempted after the registry was resolved.
    #[error("registry is frozen; cannot register {key} for module '{module}'")]
    Frozen {
        /// Key the late registration asked for.
        key: ResourceKey,
        /// Module that tried to register.
        module: ModuleId,
    },

    /// A memory region that is empty or runs past the end of the address space.
    #[error("invalid memory region for module '{module}': {detail}")]
    InvalidRegion {
        /// Module that declared the region.
        module: ModuleId,
        /// What is wrong with it.
        detail: String,
    },

    /// An inherited module was re-declared with a different footprint.
    #[error("module '{module}' is already declared in layer '{declared_in}'; layer '{layer}' cannot relocate it")]
    Relocation {
        /// Module being re-declared.
        module: ModuleId,
        /// Ancestor layer holding the original declaration.
        declared_in: String,
        /// Layer carrying the changed declaration.
        layer: String,
    },
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
