//! SoC assembly for socmap.
//!
//! Ties the address-space registry and the clock planner together into a
//! one-way pipeline: bind a [`Platform`], plan clocks, register a composed
//! module layer, and freeze the result into a [`SystemImage`] that the
//! hardware generator consumes. Board descriptions can be loaded from TOML
//! via the [`config`] module.

pub mod assembler;
pub mod config;
pub mod error;
pub mod image;
pub mod platform;

pub use assembler::{AssemblyState, SocAssembler};
pub use config::{assemble_board, load_board, parse_board, validate_board, BoardConfig, ValidationIssue};
pub use error::{AssemblyError, Result};
pub use image::{ImageDigest, ResolvedModule, SystemImage};
pub use platform::{BoardPlatform, Platform, ResourceDenied, ResourceHandle};
