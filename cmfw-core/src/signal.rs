//! Signal groups
//!
//! A signal group bundles physical pins into one logical value. Bit N of
//! the value belongs to the Nth declared pin. Polarity is applied in one
//! place, so callers only ever see logical values.

use cmfw_hal::gpio::{Direction, EdgeTrigger, Electrical, HardwareIo, PhysicalPin, Polarity};

/// Static description of a signal group
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SignalGroupConfig {
    pub name: &'static str,
    /// Pins in bit order
    pub pins: &'static [PhysicalPin],
    pub direction: Direction,
    pub electrical: Electrical,
    pub trigger: EdgeTrigger,
    pub polarity: Polarity,
    /// Logical value latched before an output starts driving
    pub initial: u32,
}

impl SignalGroupConfig {
    /// Active-high push-pull output, initially 0
    pub const fn output(name: &'static str, pins: &'static [PhysicalPin]) -> Self {
        Self {
            name,
            pins,
            direction: Direction::Output,
            electrical: Electrical::STANDARD,
            trigger: EdgeTrigger::None,
            polarity: Polarity::ActiveHigh,
            initial: 0,
        }
    }

    /// Active-high input without interrupt
    pub const fn input(name: &'static str, pins: &'static [PhysicalPin]) -> Self {
        Self {
            name,
            pins,
            direction: Direction::Input,
            electrical: Electrical::STANDARD,
            trigger: EdgeTrigger::None,
            polarity: Polarity::ActiveHigh,
            initial: 0,
        }
    }

    pub const fn with_electrical(mut self, electrical: Electrical) -> Self {
        self.electrical = electrical;
        self
    }

    pub const fn with_trigger(mut self, trigger: EdgeTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub const fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    pub const fn with_initial(mut self, initial: u32) -> Self {
        self.initial = initial;
        self
    }

    /// Mask covering every bit of the logical value
    pub const fn value_mask(&self) -> u32 {
        if self.pins.len() >= 32 {
            u32::MAX
        } else {
            (1u32 << self.pins.len()) - 1
        }
    }
}

/// Error from signal group operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SignalError {
    /// Write attempted on an input group
    ReadOnly,
    /// Output read-back requested from an input group
    NotAnOutput,
    /// Group has no edge trigger configured
    NoInterrupt,
    /// Read-back did not match the value written
    Mismatch { written: u32, read: u32 },
}

/// A named bundle of pins
#[derive(Debug)]
pub struct SignalGroup {
    config: &'static SignalGroupConfig,
    initialized: bool,
}

impl SignalGroup {
    pub const fn new(config: &'static SignalGroupConfig) -> Self {
        Self {
            config,
            initialized: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.config.name
    }

    pub fn config(&self) -> &'static SignalGroupConfig {
        self.config
    }

    pub fn mask(&self) -> u32 {
        self.config.value_mask()
    }

    pub fn is_output(&self) -> bool {
        self.config.direction == Direction::Output
    }

    /// Open the port clocks and configure every pin.
    ///
    /// Outputs have their initial value latched before the pad starts
    /// driving. Calling this again has no further effect.
    pub fn init<IO: HardwareIo>(&mut self, io: &mut IO) {
        if self.initialized {
            return;
        }
        let config = self.config;

        for pin in config.pins {
            io.enable_peripheral(pin.peripheral);
        }

        if config.direction == Direction::Output {
            self.write_levels(io, config.initial);
        }

        for pin in config.pins {
            io.configure_pins(pin.port, pin.mask, config.direction, config.electrical);
            if config.trigger != EdgeTrigger::None {
                io.disable_interrupt(pin.port, pin.mask);
                io.set_interrupt_type(pin.port, pin.mask, config.trigger);
                io.clear_interrupt(pin.port, pin.mask);
            }
        }

        self.initialized = true;
    }

    /// Drive a logical value; bits beyond the group width are ignored
    pub fn set_output<IO: HardwareIo>(&self, io: &mut IO, value: u32) -> Result<(), SignalError> {
        if !self.is_output() {
            return Err(SignalError::ReadOnly);
        }
        self.write_levels(io, value);
        Ok(())
    }

    /// Read back the levels an output group is actually driving
    pub fn get_output<IO: HardwareIo>(&self, io: &IO) -> Result<u32, SignalError> {
        if !self.is_output() {
            return Err(SignalError::NotAnOutput);
        }
        Ok(self.read_levels(io))
    }

    /// Sample the pad levels
    pub fn get_input<IO: HardwareIo>(&self, io: &IO) -> u32 {
        self.read_levels(io)
    }

    /// Write, then read back and compare
    pub fn set_verified<IO: HardwareIo>(&self, io: &mut IO, value: u32) -> Result<(), SignalError> {
        self.set_output(io, value)?;
        let written = value & self.mask();
        let read = self.get_output(io)?;
        if read != written {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "signal {=str}: wrote {=u32:#x}, read back {=u32:#x}",
                self.config.name,
                written,
                read
            );
            return Err(SignalError::Mismatch { written, read });
        }
        Ok(())
    }

    /// Clear stale latches and unmask the configured edge interrupt
    pub fn arm_interrupt<IO: HardwareIo>(&self, io: &mut IO) -> Result<(), SignalError> {
        if self.config.trigger == EdgeTrigger::None {
            return Err(SignalError::NoInterrupt);
        }
        for pin in self.config.pins {
            io.clear_interrupt(pin.port, pin.mask);
            io.enable_interrupt(pin.port, pin.mask);
        }
        Ok(())
    }

    /// Acknowledge this group's latched edges.
    ///
    /// Only the group's own bits are cleared; other pins sharing the port
    /// keep their pending status. Returns whether any of them was pending.
    pub fn take_interrupt<IO: HardwareIo>(&self, io: &mut IO) -> bool {
        let mut pending = false;
        for pin in self.config.pins {
            if io.interrupt_status(pin.port) & pin.mask != 0 {
                pending = true;
            }
            io.clear_interrupt(pin.port, pin.mask);
        }
        pending
    }

    /// Logical value to pad levels, one write per port
    fn write_levels<IO: HardwareIo>(&self, io: &mut IO, value: u32) {
        let pins = self.config.pins;
        for (i, pin) in pins.iter().enumerate() {
            if pins[..i].iter().any(|p| p.port == pin.port) {
                continue;
            }
            let mut mask = 0u8;
            let mut levels = 0u8;
            for (bit, other) in pins.iter().enumerate().skip(i) {
                if other.port != pin.port {
                    continue;
                }
                mask |= other.mask;
                if self.config.polarity.apply(value >> bit & 1 != 0) {
                    levels |= other.mask;
                }
            }
            io.write_pins(pin.port, mask, levels);
        }
    }

    /// Pad levels to logical value
    fn read_levels<IO: HardwareIo>(&self, io: &IO) -> u32 {
        self.config
            .pins
            .iter()
            .enumerate()
            .filter(|(_, pin)| self.config.polarity.apply(io.read_pins(pin.port, pin.mask) != 0))
            .fold(0, |value, (bit, _)| value | 1u32 << bit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmfw_hal::gpio::PortBase;
    use cmfw_hal::mock::MockIo;
    use proptest::prelude::*;

    const PORT_A: u32 = 0x4006_1000;
    const PORT_B: u32 = 0x4006_6000;

    static SPLIT_PINS: [PhysicalPin; 4] = [
        PhysicalPin::new(1, PORT_A, 0),
        PhysicalPin::new(1, PORT_A, 1),
        PhysicalPin::new(2, PORT_B, 2),
        PhysicalPin::new(1, PORT_A, 3),
    ];

    static SPLIT: SignalGroupConfig = SignalGroupConfig::output("split", &SPLIT_PINS);
    static SPLIT_LOW: SignalGroupConfig =
        SignalGroupConfig::output("split-low", &SPLIT_PINS).with_polarity(Polarity::ActiveLow);

    static REQ_PINS: [PhysicalPin; 1] = [PhysicalPin::new(3, PORT_B, 3)];
    static REQ: SignalGroupConfig = SignalGroupConfig::input("req", &REQ_PINS)
        .with_electrical(Electrical::WEAK_PULL_DOWN)
        .with_trigger(EdgeTrigger::Both);

    fn ready(config: &'static SignalGroupConfig) -> (SignalGroup, MockIo) {
        let mut io = MockIo::new();
        let mut group = SignalGroup::new(config);
        group.init(&mut io);
        (group, io)
    }

    #[test]
    fn test_bit_order_follows_declaration() {
        let (group, mut io) = ready(&SPLIT);
        group.set_output(&mut io, 0b0100).unwrap();
        assert_eq!(io.read_pins(PortBase(PORT_B), 0x04), 0x04);
        assert_eq!(io.read_pins(PortBase(PORT_A), 0x0B), 0x00);
        assert_eq!(group.get_output(&io).unwrap(), 0b0100);
    }

    #[test]
    fn test_one_write_per_port() {
        let (group, mut io) = ready(&SPLIT);
        io.clear_log();
        group.set_output(&mut io, 0b1011).unwrap();
        assert_eq!(io.writes().len(), 2);
        assert_eq!(io.writes()[0].mask, 0x0B);
        assert_eq!(io.writes()[0].levels, 0x0B);
    }

    #[test]
    fn test_active_low_inverts_pads() {
        let (group, mut io) = ready(&SPLIT_LOW);
        // Initial logical 0 drives every pad high
        assert_eq!(io.read_pins(PortBase(PORT_A), 0x0B), 0x0B);
        group.set_output(&mut io, 0b0001).unwrap();
        assert_eq!(io.read_pins(PortBase(PORT_A), 0x01), 0x00);
        assert_eq!(group.get_output(&io).unwrap(), 0b0001);
    }

    #[test]
    fn test_excess_bits_ignored() {
        let (group, mut io) = ready(&SPLIT);
        group.set_output(&mut io, 0xFFF0 | 0b0011).unwrap();
        assert_eq!(group.get_output(&io).unwrap(), 0b0011);
    }

    #[test]
    fn test_init_is_idempotent() {
        let (mut group, mut io) = ready(&SPLIT);
        group.set_output(&mut io, 0b1111).unwrap();
        io.clear_log();
        group.init(&mut io);
        assert!(io.writes().is_empty());
        assert_eq!(group.get_output(&io).unwrap(), 0b1111);
    }

    #[test]
    fn test_input_rejects_writes() {
        let (group, mut io) = ready(&REQ);
        assert_eq!(group.set_output(&mut io, 1), Err(SignalError::ReadOnly));
        assert_eq!(group.get_output(&io), Err(SignalError::NotAnOutput));
        assert!(io.writes().is_empty());
    }

    #[test]
    fn test_set_verified_reports_mismatch() {
        let (group, mut io) = ready(&SPLIT);
        io.stick_low(PortBase(PORT_B), 0x04);
        assert_eq!(
            group.set_verified(&mut io, 0b0111),
            Err(SignalError::Mismatch {
                written: 0b0111,
                read: 0b0011
            })
        );
    }

    #[test]
    fn test_take_interrupt_clears_only_own_bits() {
        let (group, mut io) = ready(&REQ);
        group.arm_interrupt(&mut io).unwrap();
        io.enable_interrupt(PortBase(PORT_B), 0x01);
        io.raise_interrupt(PortBase(PORT_B), 0x01);
        io.drive_input(PortBase(PORT_B), 0x08, 0x08);

        assert!(group.take_interrupt(&mut io));
        assert_eq!(io.interrupt_status(PortBase(PORT_B)), 0x01);
        assert!(!group.take_interrupt(&mut io));
    }

    #[test]
    fn test_output_group_has_no_interrupt() {
        let (group, mut io) = ready(&SPLIT);
        assert_eq!(group.arm_interrupt(&mut io), Err(SignalError::NoInterrupt));
    }

    proptest! {
        #[test]
        fn prop_set_then_get_round_trips(value in 0u32..16, low in any::<bool>()) {
            let config = if low { &SPLIT_LOW } else { &SPLIT };
            let (group, mut io) = ready(config);
            group.set_output(&mut io, value).unwrap();
            prop_assert_eq!(group.get_output(&io).unwrap(), value);
        }
    }
}
