//! Inter-step period law of the gauge needle.
//!
//! The needle carries a ramp level `r` in `0..=inertia`. The period between two steps is
//! `period_min * (inertia + 1) / (r + 1)`: slowest at `r = 0`, exactly `period_min` at
//! `r = inertia`. After every step the level climbs by one while the remaining distance
//! is larger than the inertia allowance, and is capped by the remaining distance once
//! inside it, so the needle eases into its target.

/// Ramp state of one needle. Periods are in ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ramp {
    period_min: u32,
    inertia: u32,
    level: u32,
}

impl Ramp {
    pub const fn new(period_min: u32, inertia: u32) -> Self {
        Self {
            period_min: if period_min == 0 { 1 } else { period_min },
            inertia,
            level: 0,
        }
    }

    /// Fastest allowed period.
    pub fn period_min(&self) -> u32 {
        self.period_min
    }

    /// Period of the first step out of rest.
    pub fn period_start(&self) -> u32 {
        self.period_min.saturating_mul(self.inertia.saturating_add(1))
    }

    /// Period for the next step at the current level.
    pub fn period(&self) -> u32 {
        (self.period_start() / self.level.saturating_add(1)).max(self.period_min)
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Back to rest.
    pub fn reset(&mut self) {
        self.level = 0;
    }

    /// Account for a step just taken, `remaining` steps away from the target.
    pub fn update(&mut self, remaining: u32) {
        self.level = if remaining > self.inertia {
            self.level.saturating_add(1).min(self.inertia)
        } else {
            self.level.min(remaining)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds() {
        let mut ramp = Ramp::new(5, 9);
        assert_eq!(ramp.period(), 50);
        assert_eq!(ramp.period_start(), 50);
        for _ in 0..100 {
            ramp.update(1_000);
        }
        assert_eq!(ramp.level(), 9);
        assert_eq!(ramp.period(), 5);
    }

    #[test]
    fn zero_inertia_runs_flat_out() {
        let mut ramp = Ramp::new(7, 0);
        assert_eq!(ramp.period(), 7);
        ramp.update(500);
        assert_eq!(ramp.period(), 7);
        ramp.update(0);
        assert_eq!(ramp.period(), 7);
    }

    #[test]
    fn accelerate_then_ease_in() {
        let mut ramp = Ramp::new(3, 20);
        let mut periods = vec![ramp.period()];
        let mut remaining = 100u32;
        while remaining > 0 {
            remaining -= 1;
            ramp.update(remaining);
            periods.push(ramp.period());
        }

        // Remaining distance after step k is 99 - k; the first 80 steps leave more than 20
        let (accel, decel) = periods.split_at(80);
        assert!(accel.windows(2).all(|w| w[0] >= w[1]));
        assert!(decel.windows(2).all(|w| w[0] <= w[1]));
        assert!(periods.iter().all(|&p| (3..=63).contains(&p)));
        assert_eq!(*accel.last().unwrap(), 3);
    }

    #[test]
    fn no_overflow_on_huge_inertia() {
        let ramp = Ramp::new(u32::MAX / 2, u32::MAX);
        assert_eq!(ramp.period_start(), u32::MAX);
        assert!(ramp.period() >= ramp.period_min());
    }
}
