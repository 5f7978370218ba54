//! RP2040 binding of the GPIO register interface
//!
//! The RP2040 has one flat bank of 30 GPIOs. They are presented as four
//! 8-pin ports: `PortBase(n)` holds GPIO `8n..8n+7`. Clock gates do not
//! apply, so peripheral calls are no-ops.
//!
//! Edge interrupts are latched in software. [`RpIo::wait_for_edge`] awaits
//! the configured edge on a pin and sets its pending bit; the signal-group
//! code then sees the same status/clear behaviour as on the CM MCU.

use cmfw_hal::gpio::{
    Direction, DriveStrength, EdgeTrigger, Electrical, HardwareIo, PeripheralId, PortBase, Pull,
};
use defmt::*;
use embassy_rp::gpio::{self, Drive, Flex, Level};

/// GPIOs on the RP2040
pub const GPIO_COUNT: usize = 30;
/// 8-pin ports covering all GPIOs
pub const PORT_COUNT: usize = 4;

/// Software interrupt latch of one port
#[derive(Debug, Default, Clone, Copy)]
struct PortIrq {
    enabled: u8,
    pending: u8,
    open_drain: u8,
}

/// GPIO register interface over embassy-rp pins
pub struct RpIo {
    pins: [Option<Flex<'static>>; GPIO_COUNT],
    triggers: [EdgeTrigger; GPIO_COUNT],
    ports: [PortIrq; PORT_COUNT],
}

impl RpIo {
    pub fn new() -> Self {
        Self {
            pins: [const { None }; GPIO_COUNT],
            triggers: [EdgeTrigger::None; GPIO_COUNT],
            ports: [PortIrq::default(); PORT_COUNT],
        }
    }

    /// Hand a GPIO over to the interface
    pub fn attach(&mut self, gpio: usize, pin: Flex<'static>) {
        match self.pins.get_mut(gpio) {
            Some(slot) => *slot = Some(pin),
            None => warn!("GPIO {} does not exist", gpio),
        }
    }

    /// Wait for the configured edge on the first pin of `mask` and latch it
    pub async fn wait_for_edge(&mut self, port: PortBase, mask: u8) {
        let Some(gpio) = gpios(port, mask).next() else {
            return core::future::pending().await;
        };
        let trigger = self.triggers[gpio];
        let Some(pin) = self.pins[gpio].as_mut() else {
            return core::future::pending().await;
        };
        match trigger {
            EdgeTrigger::Rising => pin.wait_for_rising_edge().await,
            EdgeTrigger::Falling => pin.wait_for_falling_edge().await,
            EdgeTrigger::Both => pin.wait_for_any_edge().await,
            EdgeTrigger::None => core::future::pending().await,
        }
        if let Some(irq) = self.ports.get_mut(port.0 as usize) {
            irq.pending |= (1 << (gpio % 8)) & irq.enabled;
        }
    }

    fn pins_mut(&mut self, port: PortBase, mask: u8) -> impl Iterator<Item = (usize, &mut Flex<'static>)> {
        let first = port.0 as usize * 8;
        self.pins
            .iter_mut()
            .enumerate()
            .skip(first)
            .take(8)
            .filter(move |(gpio, _)| mask & (1 << (gpio - first)) != 0)
            .filter_map(|(gpio, pin)| pin.as_mut().map(|pin| (gpio, pin)))
    }
}

/// GPIO numbers selected by a port mask
fn gpios(port: PortBase, mask: u8) -> impl Iterator<Item = usize> {
    let first = port.0 as usize * 8;
    (0..8)
        .filter(move |bit| mask & (1 << bit) != 0)
        .map(move |bit| first + bit)
        .filter(|&gpio| gpio < GPIO_COUNT)
}

fn drive(strength: DriveStrength) -> Drive {
    match strength {
        DriveStrength::Ma2 => Drive::_2mA,
        DriveStrength::Ma4 => Drive::_4mA,
        DriveStrength::Ma8 => Drive::_8mA,
        DriveStrength::Ma12 => Drive::_12mA,
    }
}

fn pull(pull: Pull) -> gpio::Pull {
    match pull {
        Pull::None => gpio::Pull::None,
        Pull::Up => gpio::Pull::Up,
        Pull::Down => gpio::Pull::Down,
    }
}

impl HardwareIo for RpIo {
    fn enable_peripheral(&mut self, _id: PeripheralId) {}

    fn disable_peripheral(&mut self, _id: PeripheralId) {}

    fn reset_peripheral(&mut self, _id: PeripheralId) {}

    fn peripheral_ready(&self, _id: PeripheralId) -> bool {
        true
    }

    fn configure_pins(&mut self, port: PortBase, mask: u8, direction: Direction, electrical: Electrical) {
        if let Some(irq) = self.ports.get_mut(port.0 as usize) {
            if electrical.open_drain {
                irq.open_drain |= mask;
            } else {
                irq.open_drain &= !mask;
            }
        }
        for (_, pin) in self.pins_mut(port, mask) {
            pin.set_pull(pull(electrical.pull));
            pin.set_drive_strength(drive(electrical.strength));
            match direction {
                Direction::Input => pin.set_as_input(),
                // Open-drain outputs idle released until written low
                Direction::Output if electrical.open_drain => {}
                Direction::Output => pin.set_as_output(),
            }
        }
    }

    fn configure_alternate(&mut self, port: PortBase, mask: u8, function: u32, _electrical: Electrical) {
        warn!(
            "No bus function {=u32:#x} on port {=u32} mask {=u8:#x}",
            function, port.0, mask
        );
    }

    fn write_pins(&mut self, port: PortBase, mask: u8, levels: u8) {
        let open_drain = self
            .ports
            .get(port.0 as usize)
            .map_or(0, |irq| irq.open_drain);
        let first = port.0 as usize * 8;
        for (gpio, pin) in self.pins_mut(port, mask) {
            let bit = 1 << (gpio - first);
            let high = levels & bit != 0;
            if open_drain & bit != 0 {
                if high {
                    pin.set_as_input();
                } else {
                    pin.set_low();
                    pin.set_as_output();
                }
            } else {
                pin.set_level(Level::from(high));
            }
        }
    }

    fn read_pins(&self, port: PortBase, mask: u8) -> u8 {
        gpios(port, mask)
            .filter(|&gpio| self.pins[gpio].as_ref().is_some_and(|pin| pin.is_high()))
            .fold(0, |levels, gpio| levels | 1 << (gpio % 8))
    }

    fn set_interrupt_type(&mut self, port: PortBase, mask: u8, trigger: EdgeTrigger) {
        for gpio in gpios(port, mask) {
            self.triggers[gpio] = trigger;
        }
    }

    fn enable_interrupt(&mut self, port: PortBase, mask: u8) {
        if let Some(irq) = self.ports.get_mut(port.0 as usize) {
            irq.enabled |= mask;
        }
    }

    fn disable_interrupt(&mut self, port: PortBase, mask: u8) {
        if let Some(irq) = self.ports.get_mut(port.0 as usize) {
            irq.enabled &= !mask;
        }
    }

    fn interrupt_status(&self, port: PortBase) -> u8 {
        self.ports
            .get(port.0 as usize)
            .map_or(0, |irq| irq.pending & irq.enabled)
    }

    fn clear_interrupt(&mut self, port: PortBase, mask: u8) {
        if let Some(irq) = self.ports.get_mut(port.0 as usize) {
            irq.pending &= !mask;
        }
    }
}
