//! Error types for SoC assembly and board configuration.

use std::path::PathBuf;

use socmap_clock::ClockError;
use socmap_registry::{ModuleId, RegistryError};

use crate::assembler::AssemblyState;

/// Errors that can occur while assembling a system image.
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    /// An operation was called in the wrong assembly state.
    #[error("cannot {operation} while assembler is {actual} (expected {expected})")]
    Sequence {
        operation: &'static str,
        expected: AssemblyState,
        actual: AssemblyState,
    },

    /// The platform refused a resource a module asked for.
    #[error("platform cannot grant {resource}[{index}] to module '{module}': {reason}")]
    ResourceUnavailable {
        module: ModuleId,
        resource: String,
        index: u32,
        reason: String,
    },

    /// Address-space registration or composition failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Clock planning or reset sequencing failed.
    #[error(transparent)]
    Clock(#[from] ClockError),

    /// The system image could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization error in a board file.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error reading a board file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Board file not found.
    #[error("board file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The board description is structurally invalid.
    #[error("validation error: {detail}")]
    Validation { detail: String },
}

/// Result type for assembly operations.
pub type Result<T> = std::result::Result<T, AssemblyError>;
