//! Clock domains and their reset policies.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::outputs::Phase;

/// How a domain's reset is applied relative to its clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResetStyle {
    #[default]
    Synchronous,
    /// Asserted asynchronously, released through a synchronizer.
    Asynchronous,
}

/// What holds a domain in reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResetGate {
    /// Fixed-length counter after power-on, independent of PLL lock.
    PowerOnSettle { cycles: u32 },
    /// Held until the synthesizer reports lock.
    PllLock,
    /// The main system domain. Released after every settle and lock gate.
    Primary,
    /// Released once the domains it depends on are released.
    #[default]
    Source,
}

impl fmt::Display for ResetGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetGate::PowerOnSettle { cycles } => write!(f, "power-on settle ({cycles} cycles)"),
            ResetGate::PllLock => write!(f, "PLL lock"),
            ResetGate::Primary => write!(f, "primary"),
            ResetGate::Source => write!(f, "source"),
        }
    }
}

/// Reset policy of a clock domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResetPolicy {
    pub style: ResetStyle,
    pub gate: ResetGate,
}

/// A named clock signal with its frequency and reset policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockDomain {
    pub name: String,
    pub frequency_hz: u64,
    pub phase: Phase,
    pub reset: ResetPolicy,
    /// Domains that must leave reset before this one.
    pub depends_on: Vec<String>,
    /// Domain whose synthesizer tap this one must reuse.
    pub shares_tap_with: Option<String>,
}

impl ClockDomain {
    pub fn new(name: impl Into<String>, frequency_hz: u64) -> Self {
        Self {
            name: name.into(),
            frequency_hz,
            phase: Phase::DEG_0,
            reset: ResetPolicy::default(),
            depends_on: Vec::new(),
            shares_tap_with: None,
        }
    }

    pub fn primary(mut self) -> Self {
        self.reset.gate = ResetGate::Primary;
        self
    }

    pub fn pll_lock_gated(mut self) -> Self {
        self.reset.gate = ResetGate::PllLock;
        self
    }

    pub fn power_on_settle(mut self, cycles: u32) -> Self {
        self.reset.gate = ResetGate::PowerOnSettle { cycles };
        self
    }

    pub fn asynchronous(mut self) -> Self {
        self.reset.style = ResetStyle::Asynchronous;
        self
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn depends_on(mut self, domain: impl Into<String>) -> Self {
        self.depends_on.push(domain.into());
        self
    }

    pub fn sharing_tap_with(mut self, domain: impl Into<String>) -> Self {
        self.shares_tap_with = Some(domain.into());
        self
    }

    pub fn is_primary(&self) -> bool {
        self.reset.gate == ResetGate::Primary
    }
}
