//! CLI command implementations.

pub mod assemble;
pub mod check;
pub mod ratio;
