//! Clock-synthesis planning for socmap.
//!
//! Everything here is exact integer/rational arithmetic; there is no floating
//! point anywhere in the derivation. A PLL configuration that is off by one
//! part in a million may never lock, so near misses are rejected rather
//! than rounded.
//!
//! - [`derive_ratio`]: reduce `target / reference` to a `(multiply, divide)` pair.
//! - [`plan_outputs`]: pick a VCO oversampling factor, per-output dividers,
//!   phases and tap sharing.
//! - [`sequence_resets`]: order domain reset release over a dependency DAG.
//! - [`ClockPlanner`]: runs all three for a list of [`ClockDomain`]s.

pub mod domain;
pub mod error;
pub mod outputs;
pub mod planner;
pub mod ratio;
pub mod rational;
pub mod reset;

pub use domain::{ClockDomain, ResetGate, ResetPolicy, ResetStyle};
pub use error::{ClockError, Result};
pub use outputs::{plan_outputs, ClockPlan, OutputSpec, Phase, PlannedOutput};
pub use planner::{ClockPlanner, ClockTree};
pub use ratio::{closest_representable, derive_ratio, Approximation, ClockRatio, SynthesizerLimits};
pub use rational::{ParseRatioError, Ratio};
pub use reset::sequence_resets;
