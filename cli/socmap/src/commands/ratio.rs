//! `socmap ratio`: exact multiply/divide for one frequency pair.

use anyhow::Result;

use socmap_clock::{derive_ratio, SynthesizerLimits};

pub fn run(reference_hz: u64, target_hz: u64, max_multiply: u64, max_divide: u64) -> Result<()> {
    println!("{}", describe(reference_hz, target_hz, max_multiply, max_divide)?);
    Ok(())
}

/// One-line description of the derived ratio.
pub fn describe(
    reference_hz: u64,
    target_hz: u64,
    max_multiply: u64,
    max_divide: u64,
) -> Result<String> {
    let limits = SynthesizerLimits::with_bounds(max_multiply, max_divide);
    let ratio = derive_ratio(reference_hz, target_hz, &limits)?;
    Ok(format!(
        "{reference_hz} Hz -> {target_hz} Hz: multiply {} / divide {}",
        ratio.multiply, ratio.divide
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_ratio() {
        assert_eq!(
            describe(100_000_000, 80_000_000, 64, 64).unwrap(),
            "100000000 Hz -> 80000000 Hz: multiply 4 / divide 5"
        );
    }

    #[test]
    fn unrepresentable_ratio_mentions_closest() {
        let err = describe(100_000_000, 74_250_000, 16, 16).unwrap_err();
        assert!(err.to_string().contains("closest representable"));
    }
}
