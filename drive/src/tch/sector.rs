//! Six-sector commutation states of the tachometer motor

/// Levels of the six tachometer outputs for one sector.
///
/// `inh` are the phase inhibit lines, `pwm` the phase drive lines, both in A, B, C order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhasePattern {
    pub inh: [bool; 3],
    pub pwm: [bool; 3],
}

impl PhasePattern {
    /// Everything released.
    pub const OFF: Self = Self {
        inh: [false; 3],
        pwm: [false; 3],
    };

    const fn new(inh: [u8; 3], pwm: [u8; 3]) -> Self {
        Self {
            inh: [inh[0] != 0, inh[1] != 0, inh[2] != 0],
            pwm: [pwm[0] != 0, pwm[1] != 0, pwm[2] != 0],
        }
    }
}

/// Commutation state
///
/// Each step releases the inhibit of two phases and drives one of them. Comments give
/// the (INH, PWM) levels in A B C order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommutationState {
    #[default]
    Off = 0,
    Step1 = 1, // INH 110, PWM 100
    Step2 = 2, // INH 101, PWM 100
    Step3 = 3, // INH 011, PWM 010
    Step4 = 4, // INH 110, PWM 010
    Step5 = 5, // INH 101, PWM 001
    Step6 = 6, // INH 011, PWM 001
}

impl CommutationState {
    /// Sector following this one. `Off` has no successor and stays `Off`.
    pub fn next(self) -> Self {
        match self {
            Self::Off => Self::Off,
            Self::Step1 => Self::Step2,
            Self::Step2 => Self::Step3,
            Self::Step3 => Self::Step4,
            Self::Step4 => Self::Step5,
            Self::Step5 => Self::Step6,
            Self::Step6 => Self::Step1,
        }
    }

    /// Sector number, 1-6, or 0 when off
    pub fn sector(self) -> u8 {
        self as u8
    }

    /// Decode a raw state published by [`CommutationState::sector`].
    ///
    /// Unknown values yield `None`; callers treat them as "do nothing".
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Off),
            1 => Some(Self::Step1),
            2 => Some(Self::Step2),
            3 => Some(Self::Step3),
            4 => Some(Self::Step4),
            5 => Some(Self::Step5),
            6 => Some(Self::Step6),
            _ => None,
        }
    }

    pub fn is_off(self) -> bool {
        self == Self::Off
    }

    /// Output levels for this state
    pub fn pattern(self) -> PhasePattern {
        match self {
            Self::Off => PhasePattern::OFF,
            Self::Step1 => PhasePattern::new([1, 1, 0], [1, 0, 0]),
            Self::Step2 => PhasePattern::new([1, 0, 1], [1, 0, 0]),
            Self::Step3 => PhasePattern::new([0, 1, 1], [0, 1, 0]),
            Self::Step4 => PhasePattern::new([1, 1, 0], [0, 1, 0]),
            Self::Step5 => PhasePattern::new([1, 0, 1], [0, 0, 1]),
            Self::Step6 => PhasePattern::new([0, 1, 1], [0, 0, 1]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_sequence() {
        let mut step = CommutationState::Step1;
        for i in 1..=12u8 {
            assert_eq!(step.sector(), (i - 1) % 6 + 1);
            step = step.next();
        }
        assert_eq!(CommutationState::Off.next(), CommutationState::Off);
    }

    #[test]
    fn patterns_are_distinct_and_adjacent() {
        let mut seen: Vec<PhasePattern> = Vec::new();
        let mut step = CommutationState::Step1;
        for _ in 0..6 {
            let p = step.pattern();
            assert!(!seen.contains(&p));
            assert_ne!(p, PhasePattern::OFF);
            seen.push(p);

            let q = step.next().pattern();
            let changes = p.inh.iter().zip(q.inh.iter()).filter(|(a, b)| a != b).count()
                + p.pwm.iter().zip(q.pwm.iter()).filter(|(a, b)| a != b).count();
            assert!(changes == 2 || changes == 4, "step {:?} -> {:?}", step, step.next());
            step = step.next();
        }
    }

    #[test]
    fn raw_round_trip_and_unknown() {
        for raw in 0..=6u8 {
            assert_eq!(CommutationState::from_raw(raw).map(|s| s.sector()), Some(raw));
        }
        assert_eq!(CommutationState::from_raw(7), None);
        assert_eq!(CommutationState::from_raw(0xFF), None);
    }
}
