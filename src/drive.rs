//! Drive module to handle the physical outputs of the relays

use rppal::gpio::OutputPin;

/// Trait to handle the output of one relay
///
/// The bank only talks to the hardware through this trait: `configure` is
/// called once when the relay is registered and has to leave the output OFF,
/// `set` drives the requested state afterwards.
pub trait RelayDrive {
    /// Method to prepare the output and leave it OFF
    fn configure(&mut self);
    /// Method to drive the output to the requested state
    fn set(&mut self, on: bool);
}

impl RelayDrive for OutputPin {
    fn configure(&mut self) {
        self.set_low();
    }

    fn set(&mut self, on: bool) {
        if on {
            self.set_high();
        } else {
            self.set_low();
        }
    }
}

/// Structure to handle the relay boards energized by a low level
///
/// ```
/// use rs_minuterie::drive::{ActiveLow, RelayDrive, SoftDrive};
///
/// let mut drive = ActiveLow(SoftDrive::default());
/// drive.set(true);
/// assert!(!drive.0.on);
/// ```
pub struct ActiveLow<D>(pub D);

impl<D: RelayDrive> RelayDrive for ActiveLow<D> {
    fn configure(&mut self) {
        // OFF is the high level on such a board
        self.0.set(true);
    }

    fn set(&mut self, on: bool) {
        self.0.set(!on);
    }
}

/// Structure to simulate a drive, to run a schedule without the hardware
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct SoftDrive {
    /// Last driven state
    pub on: bool,
}

impl RelayDrive for SoftDrive {
    fn configure(&mut self) {
        self.on = false;
    }

    fn set(&mut self, on: bool) {
        self.on = on;
    }
}
