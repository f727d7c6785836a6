//! Cumulative volume
//!
//! The total only ever grows. Resets are an administrative action on the
//! durable record, not something the running node does.

/// Lifetime volume total in litres
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VolumeAccumulator {
    total: f64,
}

impl VolumeAccumulator {
    /// Start from zero (first boot)
    pub const fn new() -> Self {
        Self { total: 0.0 }
    }

    /// Continue from a persisted total
    ///
    /// A non-finite or negative seed is treated as zero.
    pub fn seeded(total: f64) -> Self {
        if total.is_finite() && total >= 0.0 {
            Self { total }
        } else {
            Self::new()
        }
    }

    /// Add `increment` litres and return the new total
    ///
    /// Negative or non-finite increments are ignored.
    pub fn accumulate(&mut self, increment: f64) -> f64 {
        if increment.is_finite() && increment > 0.0 {
            self.total += increment;
        }
        self.total
    }

    /// Current total
    pub fn total(&self) -> f64 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates() {
        let mut volume = VolumeAccumulator::new();
        assert_eq!(volume.accumulate(0.5), 0.5);
        assert_eq!(volume.accumulate(0.25), 0.75);
        assert_eq!(volume.accumulate(0.0), 0.75);
    }

    #[test]
    fn never_decreases() {
        let mut volume = VolumeAccumulator::seeded(10.0);
        assert_eq!(volume.accumulate(-3.0), 10.0);
        assert_eq!(volume.accumulate(f64::NAN), 10.0);
        assert_eq!(volume.accumulate(f64::NEG_INFINITY), 10.0);
    }

    #[test]
    fn bad_seed_starts_at_zero() {
        assert_eq!(VolumeAccumulator::seeded(f64::NAN).total(), 0.0);
        assert_eq!(VolumeAccumulator::seeded(-1.0).total(), 0.0);
        assert_eq!(VolumeAccumulator::seeded(12.5).total(), 12.5);
    }
}
