//! Error types for clock planning.

use crate::ratio::Approximation;
use crate::rational::Ratio;

/// Errors that can occur while planning a clock tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    /// A frequency or rate of zero was supplied.
    #[error("invalid frequency for {what}: {detail}")]
    InvalidFrequency {
        /// Quantity that was zero.
        what: String,
        /// The offending inputs.
        detail: String,
    },

    /// The requested frequency cannot be produced exactly within the synthesizer limits.
    #[error(
        "{what}: {requested_hz} Hz is not exactly reachable from {reference_hz} Hz within synthesizer limits{}",
        describe_closest(.closest)
    )]
    UnrepresentableFrequency {
        /// Which quantity failed (system clock, VCO, a named output).
        what: String,
        /// Frequency that was asked for.
        requested_hz: Ratio,
        /// Synthesizer input frequency.
        reference_hz: u64,
        /// Best in-limit alternative, when one could be computed.
        closest: Option<Approximation>,
    },

    /// No oversampling factor puts the VCO inside its operating range.
    #[error("no VCO frequency for a {synth_hz} Hz clock lies within {min_hz}..={max_hz} Hz")]
    VcoOutOfRange {
        /// Synthesized system clock.
        synth_hz: Ratio,
        /// Lowest allowed VCO frequency.
        min_hz: u64,
        /// Highest allowed VCO frequency.
        max_hz: u64,
    },

    /// More distinct outputs than the synthesizer has taps.
    #[error("output '{output}' needs a new tap but all {available} synthesizer taps are in use")]
    TapsExhausted {
        /// Output that could not be placed.
        output: String,
        /// Taps the synthesizer provides.
        available: usize,
    },

    /// An output asked to share a tap whose divide or phase differs.
    #[error("output '{output}' (divide {divide}, phase {phase}) cannot share the tap of '{shared_with}' (divide {other_divide}, phase {other_phase})")]
    TapMismatch {
        /// Output asking to share.
        output: String,
        /// Divide the output needs.
        divide: u64,
        /// Phase the output needs.
        phase: Ratio,
        /// Output that owns the tap.
        shared_with: String,
        /// Divide already programmed on the tap.
        other_divide: u64,
        /// Phase already programmed on the tap.
        other_phase: Ratio,
    },

    /// An output asked to share the tap of an output that was not declared before it.
    #[error("output '{output}' shares the tap of unknown output '{shared_with}'")]
    UnknownOutput {
        /// Output asking to share.
        output: String,
        /// Name that matched no earlier output.
        shared_with: String,
    },

    /// Two outputs or domains use the same name.
    #[error("duplicate name '{name}'")]
    DuplicateName {
        /// The repeated name.
        name: String,
    },

    /// A domain depends on a domain that does not exist.
    #[error("domain '{domain}' depends on unknown domain '{dependency}'")]
    UnknownDomain {
        /// Domain declaring the dependency.
        domain: String,
        /// Name that matched no domain.
        dependency: String,
    },

    /// The domain dependency graph contains a cycle.
    #[error("cyclic reset dependency: {}", .cycle.join(" -> "))]
    CyclicDependency {
        /// Domains along the cycle, first element repeated at the end.
        cycle: Vec<String>,
    },

    /// A plan was requested with no clock domains.
    #[error("no clock domains to plan")]
    NoDomains,

    /// An intermediate value does not fit in 64 bits.
    #[error("arithmetic overflow while computing {context}")]
    Overflow {
        /// Computation that overflowed.
        context: String,
    },
}

fn describe_closest(closest: &Option<Approximation>) -> String {
    match closest {
        Some(a) => format!(
            " (closest representable: {} Hz with multiply {} / divide {})",
            a.frequency_hz, a.ratio.multiply, a.ratio.divide
        ),
        None => String::new(),
    }
}

/// Result type for clock planning.
pub type Result<T> = std::result::Result<T, ClockError>;
