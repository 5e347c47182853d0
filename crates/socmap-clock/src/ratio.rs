//! Exact multiply/divide derivation for a frequency synthesizer.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{ClockError, Result};
use crate::rational::{gcd, Ratio};

/// Hardware limits of a multi-output frequency synthesizer (PLL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SynthesizerLimits {
    /// Largest feedback multiplier.
    pub max_multiply: u64,
    /// Largest input divider.
    pub max_divide: u64,
    /// Largest per-output divider.
    pub max_output_divide: u64,
    /// Number of physical output taps.
    pub taps: usize,
    /// Lowest allowed VCO frequency in Hz.
    pub vco_min_hz: Option<u64>,
    /// Highest allowed VCO frequency in Hz.
    pub vco_max_hz: Option<u64>,
}

impl Default for SynthesizerLimits {
    fn default() -> Self {
        Self {
            max_multiply: 64,
            max_divide: 64,
            max_output_divide: 128,
            taps: 6,
            vco_min_hz: None,
            vco_max_hz: None,
        }
    }
}

impl SynthesizerLimits {
    /// Limits of a Spartan-6 PLL_ADV block.
    pub fn spartan6_pll() -> Self {
        Self {
            max_multiply: 64,
            max_divide: 52,
            max_output_divide: 128,
            taps: 6,
            vco_min_hz: Some(400_000_000),
            vco_max_hz: Some(1_080_000_000),
        }
    }

    /// Limits with only the multiply/divide bounds set.
    pub fn with_bounds(max_multiply: u64, max_divide: u64) -> Self {
        Self {
            max_multiply,
            max_divide,
            ..Self::default()
        }
    }

    fn admits(&self, ratio: &ClockRatio) -> bool {
        (1..=self.max_multiply).contains(&ratio.multiply)
            && (1..=self.max_divide).contains(&ratio.divide)
    }
}

/// A reduced `(multiply, divide)` pair: `output = reference * multiply / divide`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClockRatio {
    pub multiply: u64,
    pub divide: u64,
}

impl ClockRatio {
    /// Build from a ratio already in lowest terms.
    pub fn from_ratio(r: Ratio) -> Self {
        Self {
            multiply: r.numer(),
            divide: r.denom(),
        }
    }

    pub fn as_ratio(&self) -> Option<Ratio> {
        Ratio::new(self.multiply, self.divide)
    }

    /// The exact output frequency for `reference_hz`.
    pub fn apply(&self, reference_hz: u64) -> Option<Ratio> {
        Ratio::integer(reference_hz).checked_mul(self.as_ratio()?)
    }
}

impl fmt::Display for ClockRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}/{}", self.multiply, self.divide)
    }
}

/// The nearest in-limit alternative to an unreachable frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approximation {
    pub ratio: ClockRatio,
    pub frequency_hz: Ratio,
}

/// Reduce `target_hz / reference_hz` to lowest terms.
///
/// Fails with [`ClockError::UnrepresentableFrequency`] when the reduced pair
/// exceeds `limits`. Any exact pair is a multiple of the reduced one, so no
/// other pair within limits could work either.
pub fn derive_ratio(
    reference_hz: u64,
    target_hz: u64,
    limits: &SynthesizerLimits,
) -> Result<ClockRatio> {
    if reference_hz == 0 || target_hz == 0 {
        return Err(ClockError::InvalidFrequency {
            what: "clock ratio".into(),
            detail: format!("reference {reference_hz} Hz, target {target_hz} Hz; both must be non-zero"),
        });
    }

    let g = gcd(target_hz, reference_hz);
    let ratio = ClockRatio {
        multiply: target_hz / g,
        divide: reference_hz / g,
    };

    if reference_hz as u128 * ratio.multiply as u128 != target_hz as u128 * ratio.divide as u128 {
        return Err(ClockError::Overflow {
            context: format!("ratio {target_hz}/{reference_hz}"),
        });
    }

    if !limits.admits(&ratio) {
        return Err(ClockError::UnrepresentableFrequency {
            what: "system clock".into(),
            requested_hz: Ratio::integer(target_hz),
            reference_hz,
            closest: closest_representable(reference_hz, Ratio::integer(target_hz), limits),
        });
    }

    debug!("derived {ratio} for {target_hz} Hz from {reference_hz} Hz");
    Ok(ratio)
}

/// The in-limit `(multiply, divide)` whose output is nearest to `target_hz`.
///
/// Ties go to the smaller divider. Returns `None` for a zero reference or
/// empty limits.
pub fn closest_representable(
    reference_hz: u64,
    target_hz: Ratio,
    limits: &SynthesizerLimits,
) -> Option<Approximation> {
    if reference_hz == 0 || limits.max_multiply == 0 {
        return None;
    }
    let reference = Ratio::integer(reference_hz);
    let mut best: Option<(Ratio, Approximation)> = None;

    for divide in 1..=limits.max_divide {
        // target * divide / reference, bracketed by its floor and ceiling.
        let Some(ideal) = target_hz
            .checked_mul(Ratio::integer(divide))
            .and_then(|t| t.checked_div(reference))
        else {
            // Grows with divide; nothing further fits.
            break;
        };
        for multiply in [ideal.floor(), ideal.ceil()] {
            let multiply = multiply.clamp(1, limits.max_multiply);
            let ratio = ClockRatio { multiply, divide };
            let Some(frequency_hz) = ratio.apply(reference_hz) else {
                continue;
            };
            let Some(error) = frequency_hz.abs_diff(target_hz) else {
                continue;
            };
            let Some(reduced) = Ratio::new(multiply, divide) else {
                continue;
            };
            if best.as_ref().map_or(true, |(e, _)| error < *e) {
                best = Some((
                    error,
                    Approximation {
                        ratio: ClockRatio::from_ratio(reduced),
                        frequency_hz,
                    },
                ));
            }
        }

        // Exact hit: larger dividers can only tie.
        if best.as_ref().is_some_and(|(e, _)| e.is_zero()) {
            break;
        }
        // From here on multiply is pinned at its bound and the output only falls.
        if ideal.floor() >= limits.max_multiply {
            break;
        }
    }

    best.map(|(_, a)| a)
}
