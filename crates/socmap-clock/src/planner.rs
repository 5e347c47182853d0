//! One-shot planning of a whole clock tree from a list of domains.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::domain::ClockDomain;
use crate::error::{ClockError, Result};
use crate::outputs::{plan_outputs, ClockPlan, OutputSpec};
use crate::ratio::{derive_ratio, ClockRatio, SynthesizerLimits};
use crate::rational::Ratio;
use crate::reset::sequence_resets;

/// A complete clock tree: synthesizer settings plus reset release order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockTree {
    pub plan: ClockPlan,
    /// Name of the domain that defines the system ratio.
    pub system_domain: String,
    pub domains: Vec<ClockDomain>,
    pub reset_order: Vec<String>,
}

impl ClockTree {
    /// Ratio of a domain's frequency to the reference.
    pub fn domain_ratio(&self, name: &str) -> Option<ClockRatio> {
        self.plan.output(name).map(|o| o.ratio)
    }
}

/// Clock planner bound to one synthesizer's limits.
#[derive(Debug, Clone, Default)]
pub struct ClockPlanner {
    limits: SynthesizerLimits,
}

impl ClockPlanner {
    pub fn new(limits: SynthesizerLimits) -> Self {
        Self { limits }
    }

    /// Plan every domain from `reference_hz`.
    ///
    /// The first primary domain (or the first domain, if none is primary)
    /// sets the system ratio; every domain becomes one synthesizer output.
    pub fn plan(&self, reference_hz: u64, domains: &[ClockDomain]) -> Result<ClockTree> {
        let system = domains
            .iter()
            .find(|d| d.is_primary())
            .or_else(|| domains.first())
            .ok_or(ClockError::NoDomains)?;

        let ratio = derive_ratio(reference_hz, system.frequency_hz, &self.limits).map_err(
            |e| match e {
                ClockError::UnrepresentableFrequency {
                    requested_hz,
                    reference_hz,
                    closest,
                    ..
                } => ClockError::UnrepresentableFrequency {
                    what: format!("system domain '{}'", system.name),
                    requested_hz,
                    reference_hz,
                    closest,
                },
                other => other,
            },
        )?;
        debug!(
            "system domain '{}' at {} Hz: {ratio}",
            system.name, system.frequency_hz
        );

        let outputs = domains
            .iter()
            .map(|d| {
                if d.frequency_hz == 0 {
                    return Err(ClockError::InvalidFrequency {
                        what: format!("domain '{}'", d.name),
                        detail: "frequency must be non-zero".into(),
                    });
                }
                let rate = Ratio::new(d.frequency_hz, system.frequency_hz).ok_or_else(|| {
                    ClockError::InvalidFrequency {
                        what: format!("system domain '{}'", system.name),
                        detail: "frequency must be non-zero".into(),
                    }
                })?;
                let mut spec = OutputSpec::new(d.name.clone(), rate).with_phase(d.phase);
                spec.share_with = d.shares_tap_with.clone();
                Ok(spec)
            })
            .collect::<Result<Vec<_>>>()?;

        let plan = plan_outputs(reference_hz, ratio, &outputs, &self.limits)?;
        let reset_order = sequence_resets(domains)?;

        info!(
            "clock tree planned: {} domains on {} taps, VCO {} Hz",
            domains.len(),
            plan.taps_used(),
            plan.vco_hz
        );
        Ok(ClockTree {
            plan,
            system_domain: system.name.clone(),
            domains: domains.to_vec(),
            reset_order,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_system_and_half_rate() {
        let planner = ClockPlanner::default();
        let tree = planner
            .plan(
                100_000_000,
                &[
                    ClockDomain::new("sys", 80_000_000).primary(),
                    ClockDomain::new("sys_half", 40_000_000).pll_lock_gated(),
                    ClockDomain::new("por", 80_000_000).power_on_settle(2047),
                ],
            )
            .unwrap();

        assert_eq!(tree.system_domain, "sys");
        assert_eq!(tree.plan.ratio, ClockRatio { multiply: 4, divide: 5 });
        assert_eq!(
            tree.domain_ratio("sys_half"),
            Some(ClockRatio { multiply: 2, divide: 5 })
        );
        assert_eq!(tree.reset_order, ["por", "sys_half", "sys"]);
        // por runs off the system clock.
        assert_eq!(
            tree.plan.output("por").unwrap().tap,
            tree.plan.output("sys").unwrap().tap
        );
    }

    #[test]
    fn unrepresentable_system_names_domain() {
        let planner = ClockPlanner::new(SynthesizerLimits::with_bounds(16, 16));
        let err = planner
            .plan(100_000_000, &[ClockDomain::new("sys", 74_250_000).primary()])
            .unwrap_err();
        match err {
            ClockError::UnrepresentableFrequency { what, .. } => {
                assert!(what.contains("sys"));
            }
            other => panic!("expected unrepresentable, got {other:?}"),
        }
    }

    #[test]
    fn empty_domain_list() {
        assert!(matches!(
            ClockPlanner::default().plan(100_000_000, &[]),
            Err(ClockError::NoDomains)
        ));
    }

    #[test]
    fn first_domain_is_system_without_primary() {
        let tree = ClockPlanner::default()
            .plan(
                50_000_000,
                &[
                    ClockDomain::new("periph", 50_000_000),
                    ClockDomain::new("fast", 100_000_000),
                ],
            )
            .unwrap();
        assert_eq!(tree.system_domain, "periph");
        assert_eq!(tree.plan.ratio, ClockRatio { multiply: 1, divide: 1 });
        assert_eq!(tree.plan.vco_factor, 2);
    }
}
