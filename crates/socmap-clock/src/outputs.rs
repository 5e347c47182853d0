//! Per-output divide/phase planning on top of a derived system ratio.
//!
//! The synthesizer's oscillator (VCO) runs at `p` times the system clock;
//! every output is an integer division of it. `p` is the smallest multiple of
//! the lcm of the requested rate numerators that keeps the VCO in range.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{ClockError, Result};
use crate::ratio::{closest_representable, ClockRatio, SynthesizerLimits};
use crate::rational::{lcm, Ratio};

/// A phase offset in degrees, normalised into `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Phase(Ratio);

impl Phase {
    pub const DEG_0: Phase = Phase(Ratio::integer(0));
    pub const DEG_90: Phase = Phase(Ratio::integer(90));
    pub const DEG_180: Phase = Phase(Ratio::integer(180));
    pub const DEG_270: Phase = Phase(Ratio::integer(270));

    pub fn degrees(deg: u64) -> Self {
        Self::from_ratio(Ratio::integer(deg))
    }

    /// An arbitrary rational number of degrees.
    pub fn from_ratio(deg: Ratio) -> Self {
        Phase(deg.rem_integer(360))
    }

    pub fn as_degrees(&self) -> Ratio {
        self.0
    }

    /// This phase as a fraction of a full cycle.
    pub fn fraction_of_cycle(&self) -> Ratio {
        self.0
            .checked_div(Ratio::integer(360))
            .unwrap_or(Ratio::ZERO)
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::DEG_0
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}deg", self.0)
    }
}

/// A requested synthesizer output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub name: String,
    /// Frequency relative to the synthesized system clock (1 = same, 1/2 = half rate, 4 = 4x).
    pub rate: Ratio,
    pub phase: Phase,
    /// Name of an earlier output whose tap this one must reuse.
    pub share_with: Option<String>,
}

impl OutputSpec {
    pub fn new(name: impl Into<String>, rate: Ratio) -> Self {
        Self {
            name: name.into(),
            rate,
            phase: Phase::DEG_0,
            share_with: None,
        }
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn sharing(mut self, other: impl Into<String>) -> Self {
        self.share_with = Some(other.into());
        self
    }
}

/// One planned output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedOutput {
    pub name: String,
    /// Physical tap index.
    pub tap: usize,
    /// VCO divider for this output.
    pub divide: u64,
    pub phase: Phase,
    pub frequency_hz: Ratio,
    /// Output frequency relative to the reference, in lowest terms.
    pub ratio: ClockRatio,
}

/// The resolved synthesizer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockPlan {
    pub reference_hz: u64,
    /// System clock relative to the reference.
    pub ratio: ClockRatio,
    pub system_hz: Ratio,
    /// VCO oversampling factor over the system clock.
    pub vco_factor: u64,
    pub vco_hz: Ratio,
    /// Feedback multiplier programmed into the synthesizer.
    pub feedback_multiply: u64,
    /// Input divider programmed into the synthesizer.
    pub input_divide: u64,
    pub outputs: Vec<PlannedOutput>,
}

impl ClockPlan {
    pub fn output(&self, name: &str) -> Option<&PlannedOutput> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Number of distinct physical taps in use.
    pub fn taps_used(&self) -> usize {
        self.outputs
            .iter()
            .map(|o| o.tap + 1)
            .max()
            .unwrap_or(0)
    }
}

impl fmt::Display for ClockPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "reference {} Hz -> system {} Hz ({})",
            self.reference_hz, self.system_hz, self.ratio
        )?;
        writeln!(
            f,
            "VCO {} Hz (feedback x{}, input /{}, oversampling {})",
            self.vco_hz, self.feedback_multiply, self.input_divide, self.vco_factor
        )?;
        for o in &self.outputs {
            writeln!(
                f,
                "  tap {}: {:<20} /{:<3} {:>8}  {} Hz",
                o.tap, o.name, o.divide, o.phase, o.frequency_hz
            )?;
        }
        Ok(())
    }
}

fn overflow(context: &str) -> ClockError {
    ClockError::Overflow {
        context: context.to_string(),
    }
}

/// Plan every output of the synthesizer for the system `ratio`.
pub fn plan_outputs(
    reference_hz: u64,
    ratio: ClockRatio,
    outputs: &[OutputSpec],
    limits: &SynthesizerLimits,
) -> Result<ClockPlan> {
    let system_hz = ratio
        .apply(reference_hz)
        .ok_or_else(|| overflow("system frequency"))?;

    for (i, spec) in outputs.iter().enumerate() {
        if spec.rate.is_zero() {
            return Err(ClockError::InvalidFrequency {
                what: format!("output '{}'", spec.name),
                detail: "rate must be non-zero".into(),
            });
        }
        if outputs[..i].iter().any(|o| o.name == spec.name) {
            return Err(ClockError::DuplicateName {
                name: spec.name.clone(),
            });
        }
    }

    let base_factor = outputs
        .iter()
        .try_fold(1u64, |acc, o| lcm(acc, o.rate.numer()))
        .ok_or_else(|| overflow("VCO oversampling factor"))?;
    let vco_factor = scale_into_vco_range(system_hz, base_factor, limits)?;
    let vco_hz = system_hz
        .checked_mul(Ratio::integer(vco_factor))
        .ok_or_else(|| overflow("VCO frequency"))?;

    let feedback = ratio
        .as_ratio()
        .and_then(|r| r.checked_mul(Ratio::integer(vco_factor)))
        .ok_or_else(|| overflow("feedback ratio"))?;
    if feedback.numer() > limits.max_multiply || feedback.denom() > limits.max_divide {
        return Err(ClockError::UnrepresentableFrequency {
            what: "VCO".into(),
            requested_hz: vco_hz,
            reference_hz,
            closest: closest_representable(reference_hz, vco_hz, limits),
        });
    }

    let mut planned: Vec<PlannedOutput> = Vec::with_capacity(outputs.len());
    let mut taps: Vec<(u64, Phase)> = Vec::new();

    for spec in outputs {
        // vco / (system * rate) = factor * denom / numer, integral by choice of factor.
        let divide = Ratio::integer(vco_factor)
            .checked_div(spec.rate)
            .and_then(|d| d.to_integer())
            .ok_or_else(|| overflow(&format!("divide for output '{}'", spec.name)))?;
        let frequency_hz = system_hz
            .checked_mul(spec.rate)
            .ok_or_else(|| overflow(&format!("frequency of output '{}'", spec.name)))?;

        if divide > limits.max_output_divide {
            return Err(ClockError::UnrepresentableFrequency {
                what: format!("output '{}'", spec.name),
                requested_hz: frequency_hz,
                reference_hz,
                closest: None,
            });
        }

        let tap = match &spec.share_with {
            Some(other) => {
                let target = planned.iter().find(|o| &o.name == other).ok_or_else(|| {
                    ClockError::UnknownOutput {
                        output: spec.name.clone(),
                        shared_with: other.clone(),
                    }
                })?;
                if target.divide != divide || target.phase != spec.phase {
                    return Err(ClockError::TapMismatch {
                        output: spec.name.clone(),
                        divide,
                        phase: spec.phase.as_degrees(),
                        shared_with: other.clone(),
                        other_divide: target.divide,
                        other_phase: target.phase.as_degrees(),
                    });
                }
                target.tap
            }
            None => match taps.iter().position(|t| *t == (divide, spec.phase)) {
                Some(tap) => tap,
                None => {
                    if taps.len() >= limits.taps {
                        return Err(ClockError::TapsExhausted {
                            output: spec.name.clone(),
                            available: limits.taps,
                        });
                    }
                    taps.push((divide, spec.phase));
                    taps.len() - 1
                }
            },
        };

        let output_ratio = ratio
            .as_ratio()
            .and_then(|r| r.checked_mul(spec.rate))
            .map(ClockRatio::from_ratio)
            .ok_or_else(|| overflow(&format!("ratio of output '{}'", spec.name)))?;

        debug!(
            "output '{}': tap {tap}, divide {divide}, phase {}, {frequency_hz} Hz",
            spec.name, spec.phase
        );
        planned.push(PlannedOutput {
            name: spec.name.clone(),
            tap,
            divide,
            phase: spec.phase,
            frequency_hz,
            ratio: output_ratio,
        });
    }

    Ok(ClockPlan {
        reference_hz,
        ratio,
        system_hz,
        vco_factor,
        vco_hz,
        feedback_multiply: feedback.numer(),
        input_divide: feedback.denom(),
        outputs: planned,
    })
}

/// Smallest multiple of `base` whose VCO frequency lies inside the limits' range.
fn scale_into_vco_range(system_hz: Ratio, base: u64, limits: &SynthesizerLimits) -> Result<u64> {
    let base_hz = system_hz
        .checked_mul(Ratio::integer(base))
        .ok_or_else(|| overflow("VCO frequency"))?;

    let k = match limits.vco_min_hz {
        Some(min) if Ratio::integer(min) > base_hz => Ratio::integer(min)
            .checked_div(base_hz)
            .ok_or_else(|| overflow("VCO scale"))?
            .ceil(),
        _ => 1,
    };
    let factor = base
        .checked_mul(k)
        .ok_or_else(|| overflow("VCO oversampling factor"))?;

    if let Some(max) = limits.vco_max_hz {
        let vco = system_hz
            .checked_mul(Ratio::integer(factor))
            .ok_or_else(|| overflow("VCO frequency"))?;
        if vco > Ratio::integer(max) {
            return Err(ClockError::VcoOutOfRange {
                synth_hz: system_hz,
                min_hz: limits.vco_min_hz.unwrap_or(0),
                max_hz: max,
            });
        }
    }
    Ok(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn half() -> Ratio {
        Ratio::new(1, 2).unwrap()
    }

    fn ratio_4_5() -> ClockRatio {
        ClockRatio {
            multiply: 4,
            divide: 5,
        }
    }

    #[test]
    fn system_and_half_rate() {
        let plan = plan_outputs(
            100_000_000,
            ratio_4_5(),
            &[
                OutputSpec::new("sys", Ratio::ONE),
                OutputSpec::new("sys_half", half()),
            ],
            &SynthesizerLimits::default(),
        )
        .unwrap();

        assert_eq!(plan.vco_factor, 1);
        let sys = plan.output("sys").unwrap();
        let half = plan.output("sys_half").unwrap();
        assert_eq!(sys.divide, 1);
        assert_eq!(half.divide, 2);
        assert_eq!(half.frequency_hz, Ratio::integer(40_000_000));
        assert_eq!(half.ratio, ClockRatio { multiply: 2, divide: 5 });
        assert_ne!(sys.tap, half.tap);
    }

    #[test]
    fn vco_range_scales_oversampling() {
        // Atlys SDRAM clocking: 1x, 2x (two phases) and 4x of an 80 MHz system clock.
        let plan = plan_outputs(
            100_000_000,
            ratio_4_5(),
            &[
                OutputSpec::new("sdram_full_wr", Ratio::integer(4)),
                OutputSpec::new("sdram_full_rd", Ratio::integer(4)).sharing("sdram_full_wr"),
                OutputSpec::new("sdram_half", Ratio::integer(2)).with_phase(Phase::DEG_270),
                OutputSpec::new("sdram_half_shifted", Ratio::integer(2))
                    .with_phase(Phase::degrees(250)),
                OutputSpec::new("sys", Ratio::ONE),
            ],
            &SynthesizerLimits::spartan6_pll(),
        )
        .unwrap();

        assert_eq!(plan.vco_factor, 8);
        assert_eq!(plan.vco_hz, Ratio::integer(640_000_000));
        assert_eq!((plan.feedback_multiply, plan.input_divide), (32, 5));
        assert_eq!(plan.output("sdram_full_wr").unwrap().divide, 2);
        assert_eq!(plan.output("sdram_half").unwrap().divide, 4);
        assert_eq!(plan.output("sys").unwrap().divide, 8);
        assert_eq!(
            plan.output("sdram_full_rd").unwrap().tap,
            plan.output("sdram_full_wr").unwrap().tap
        );
        assert_eq!(plan.taps_used(), 4);
    }

    #[test]
    fn identical_outputs_alias_one_tap() {
        let plan = plan_outputs(
            100_000_000,
            ratio_4_5(),
            &[
                OutputSpec::new("sys", Ratio::ONE),
                OutputSpec::new("por", Ratio::ONE),
            ],
            &SynthesizerLimits::default(),
        )
        .unwrap();
        assert_eq!(plan.taps_used(), 1);
    }

    #[test]
    fn same_divide_different_phase_needs_new_tap() {
        let plan = plan_outputs(
            100_000_000,
            ratio_4_5(),
            &[
                OutputSpec::new("a", Ratio::ONE),
                OutputSpec::new("b", Ratio::ONE).with_phase(Phase::DEG_90),
            ],
            &SynthesizerLimits::default(),
        )
        .unwrap();
        assert_eq!(plan.taps_used(), 2);
    }

    #[test]
    fn explicit_sharing_must_match() {
        let err = plan_outputs(
            100_000_000,
            ratio_4_5(),
            &[
                OutputSpec::new("a", Ratio::ONE),
                OutputSpec::new("b", Ratio::ONE)
                    .with_phase(Phase::DEG_180)
                    .sharing("a"),
            ],
            &SynthesizerLimits::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ClockError::TapMismatch { .. }));

        let err = plan_outputs(
            100_000_000,
            ratio_4_5(),
            &[OutputSpec::new("b", Ratio::ONE).sharing("missing")],
            &SynthesizerLimits::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ClockError::UnknownOutput { .. }));
    }

    #[test]
    fn taps_exhausted() {
        let limits = SynthesizerLimits {
            taps: 2,
            ..SynthesizerLimits::default()
        };
        let err = plan_outputs(
            100_000_000,
            ratio_4_5(),
            &[
                OutputSpec::new("a", Ratio::ONE),
                OutputSpec::new("b", Ratio::ONE).with_phase(Phase::DEG_90),
                OutputSpec::new("c", Ratio::ONE).with_phase(Phase::DEG_180),
            ],
            &limits,
        )
        .unwrap_err();
        assert!(matches!(err, ClockError::TapsExhausted { available: 2, .. }));
    }

    #[test]
    fn phase_normalisation() {
        assert_eq!(Phase::degrees(450), Phase::DEG_90);
        assert_eq!(Phase::degrees(360), Phase::DEG_0);
        let p = Phase::from_ratio(Ratio::new(45, 2).unwrap());
        assert_eq!(p.fraction_of_cycle(), Ratio::new(1, 16).unwrap());
    }

    #[test]
    fn output_divide_limit() {
        let limits = SynthesizerLimits {
            max_output_divide: 4,
            ..SynthesizerLimits::default()
        };
        let err = plan_outputs(
            100_000_000,
            ratio_4_5(),
            &[OutputSpec::new("slow", Ratio::new(1, 8).unwrap())],
            &limits,
        )
        .unwrap_err();
        assert!(matches!(err, ClockError::UnrepresentableFrequency { .. }));
    }

    #[test]
    fn vco_ceiling_rejected() {
        let limits = SynthesizerLimits {
            vco_min_hz: Some(400_000_000),
            vco_max_hz: Some(500_000_000),
            ..SynthesizerLimits::default()
        };
        // A 4x output needs a factor that is a multiple of 4: 320 MHz is below the
        // minimum and 640 MHz is above the maximum.
        let err = plan_outputs(
            100_000_000,
            ratio_4_5(),
            &[OutputSpec::new("fast", Ratio::integer(4))],
            &limits,
        )
        .unwrap_err();
        assert!(matches!(err, ClockError::VcoOutOfRange { .. }));
    }

    #[test]
    fn duplicate_output_names() {
        let err = plan_outputs(
            100_000_000,
            ratio_4_5(),
            &[
                OutputSpec::new("a", Ratio::ONE),
                OutputSpec::new("a", Ratio::integer(2)),
            ],
            &SynthesizerLimits::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ClockError::DuplicateName { .. }));
    }
}
