//! Power rail shared by all gauge stepper drivers.
//!
//! The rail is on as soon as one registered needle is enabled and off once none is.
//! The registry only borrows each needle's shared state; positions are never looked at.

use embedded_hal::digital::OutputPin;
use heapless::Vec;

use super::NeedleShared;
use crate::fmt::info;

/// Returned by [`NeedlePower::register`] when every slot is taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegistryFull;

/// Registry of up to `N` needles driving one power enable line.
pub struct NeedlePower<'a, P, const N: usize> {
    needles: Vec<&'a NeedleShared, N>,
    enable: P,
    powered: bool,
}

impl<'a, P: OutputPin, const N: usize> NeedlePower<'a, P, N> {
    pub fn new(enable: P) -> Self {
        Self {
            needles: Vec::new(),
            enable,
            powered: false,
        }
    }

    /// Forget every needle and cut the rail.
    pub fn init(&mut self) -> Result<(), P::Error> {
        self.needles.clear();
        self.powered = false;
        self.enable.set_low()
    }

    pub fn register(&mut self, needle: &'a NeedleShared) -> Result<(), RegistryFull> {
        self.needles.push(needle).map_err(|_| RegistryFull)
    }

    /// Switch the rail to match the needles' enable flags. Returns the rail state.
    pub fn manage(&mut self) -> Result<bool, P::Error> {
        let wanted = self.needles.iter().any(|n| n.is_enabled());
        if wanted != self.powered {
            if wanted {
                self.enable.set_high()?;
            } else {
                self.enable.set_low()?;
            }
            self.powered = wanted;
            info!("Stepper power {}", if wanted { "on" } else { "off" });
        }
        Ok(self.powered)
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn len(&self) -> usize {
        self.needles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.needles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPin;

    #[test]
    fn rail_follows_any_enabled() {
        let a = NeedleShared::new();
        let b = NeedleShared::new();
        let pin = MockPin::new();
        let mut power: NeedlePower<'_, _, 2> = NeedlePower::new(pin.clone());
        power.init().unwrap();
        power.register(&a).unwrap();
        power.register(&b).unwrap();

        assert!(!power.manage().unwrap());
        assert!(!pin.is_high());

        a.set_enabled(true);
        assert!(power.manage().unwrap());
        assert!(pin.is_high());

        b.set_enabled(true);
        a.set_enabled(false);
        assert!(power.manage().unwrap());

        b.set_enabled(false);
        assert!(!power.manage().unwrap());
        assert!(!pin.is_high());
        assert_eq!(pin.rises(), 1);
    }

    #[test]
    fn registry_is_bounded() {
        let a = NeedleShared::new();
        let b = NeedleShared::new();
        let mut power: NeedlePower<'_, _, 1> = NeedlePower::new(MockPin::new());
        assert!(power.is_empty());
        assert_eq!(power.register(&a), Ok(()));
        assert_eq!(power.register(&b), Err(RegistryFull));
        assert_eq!(power.len(), 1);

        // Unregistered needles have no say
        b.set_enabled(true);
        assert!(!power.manage().unwrap());
    }
}
