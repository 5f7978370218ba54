//! GPIO register I/O abstractions
//!
//! Pins are addressed the way the port hardware addresses them: a port
//! base plus a bit mask inside that port. Every operation is synchronous
//! and takes effect before it returns.

/// Peripheral clock-gate token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeripheralId(pub u32);

/// Base address of a GPIO port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortBase(pub u32);

/// One physical pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhysicalPin {
    /// Clock gate that must be open before the port is touched
    pub peripheral: PeripheralId,
    /// Port the pin lives in
    pub port: PortBase,
    /// Single-bit mask of the pin inside its port
    pub mask: u8,
}

impl PhysicalPin {
    /// Create a pin from its port and pin number (0-7)
    pub const fn new(peripheral: u32, port: u32, pin: u8) -> Self {
        Self {
            peripheral: PeripheralId(peripheral),
            port: PortBase(port),
            mask: 1 << (pin & 0x07),
        }
    }

    /// Pin number inside the port
    pub const fn number(&self) -> u8 {
        self.mask.trailing_zeros() as u8
    }
}

/// Pin direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Input,
    Output,
}

/// Output drive strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveStrength {
    #[default]
    Ma2,
    Ma4,
    Ma8,
    Ma12,
}

/// Internal pull resistor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    #[default]
    None,
    Up,
    Down,
}

/// Electrical pad policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Electrical {
    pub strength: DriveStrength,
    pub pull: Pull,
    pub open_drain: bool,
}

impl Electrical {
    /// Push-pull, 2 mA, no pull
    pub const STANDARD: Self = Self {
        strength: DriveStrength::Ma2,
        pull: Pull::None,
        open_drain: false,
    };

    /// Push-pull, 2 mA, weak pull-down
    pub const WEAK_PULL_DOWN: Self = Self {
        strength: DriveStrength::Ma2,
        pull: Pull::Down,
        open_drain: false,
    };

    /// Open-drain with weak pull-up (I2C lines)
    pub const OPEN_DRAIN: Self = Self {
        strength: DriveStrength::Ma2,
        pull: Pull::Up,
        open_drain: true,
    };
}

/// Edge interrupt trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EdgeTrigger {
    #[default]
    None,
    Rising,
    Falling,
    Both,
}

/// Logical polarity of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Logical 1 = pin high
    #[default]
    ActiveHigh,
    /// Logical 1 = pin low
    ActiveLow,
}

impl Polarity {
    /// Translate between logical and electrical level.
    ///
    /// The transform is its own inverse, so the same call serves both
    /// directions.
    pub const fn apply(self, level: bool) -> bool {
        match self {
            Polarity::ActiveHigh => level,
            Polarity::ActiveLow => !level,
        }
    }
}

/// Register-level GPIO access
///
/// Masks select pins inside one port. Reads return the masked levels in
/// place (bit N of the result is pin N of the port).
pub trait HardwareIo {
    /// Open the clock gate of a peripheral
    fn enable_peripheral(&mut self, id: PeripheralId);

    /// Close the clock gate of a peripheral
    fn disable_peripheral(&mut self, id: PeripheralId);

    /// Hold a peripheral in reset and release it again
    fn reset_peripheral(&mut self, id: PeripheralId);

    /// Check whether a peripheral is clocked and out of reset
    fn peripheral_ready(&self, id: PeripheralId) -> bool;

    /// Configure pins as plain GPIO
    fn configure_pins(
        &mut self,
        port: PortBase,
        mask: u8,
        direction: Direction,
        electrical: Electrical,
    );

    /// Hand pins over to a peripheral function (pin-mux token)
    fn configure_alternate(&mut self, port: PortBase, mask: u8, function: u32, electrical: Electrical);

    /// Drive the masked pins to `levels`
    fn write_pins(&mut self, port: PortBase, mask: u8, levels: u8);

    /// Read the pad level of the masked pins
    fn read_pins(&self, port: PortBase, mask: u8) -> u8;

    /// Select the edge that latches an interrupt
    fn set_interrupt_type(&mut self, port: PortBase, mask: u8, trigger: EdgeTrigger);

    /// Unmask edge interrupts
    fn enable_interrupt(&mut self, port: PortBase, mask: u8);

    /// Mask edge interrupts
    fn disable_interrupt(&mut self, port: PortBase, mask: u8);

    /// Masked interrupt status of the whole port
    fn interrupt_status(&self, port: PortBase) -> u8;

    /// Acknowledge latched interrupts
    fn clear_interrupt(&mut self, port: PortBase, mask: u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_mask() {
        let pin = PhysicalPin::new(0xf000_080c, 0x4006_4000, 3);
        assert_eq!(pin.mask, 0x08);
        assert_eq!(pin.number(), 3);
    }

    #[test]
    fn test_polarity_is_involution() {
        for level in [false, true] {
            assert_eq!(Polarity::ActiveHigh.apply(level), level);
            assert_eq!(Polarity::ActiveLow.apply(level), !level);
            assert_eq!(
                Polarity::ActiveLow.apply(Polarity::ActiveLow.apply(level)),
                level
            );
        }
    }
}
