//! Recording output pin for unit tests.

use core::convert::Infallible;
use std::cell::Cell;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, OutputPin};

#[derive(Clone, Default)]
pub struct MockPin {
    level: Rc<Cell<bool>>,
    rises: Rc<Cell<u32>>,
}

impl MockPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.level.get()
    }

    /// Number of low to high transitions seen so far.
    pub fn rises(&self) -> u32 {
        self.rises.get()
    }
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if !self.level.get() {
            self.rises.set(self.rises.get() + 1);
        }
        self.level.set(true);
        Ok(())
    }
}
