use heapless::{LinearMap, Vec};

use crate::gpio::{
    Direction, EdgeTrigger, Electrical, HardwareIo, PeripheralId, PortBase,
};

const MAX_PORTS: usize = 16;
const MAX_PERIPHERALS: usize = 32;
const LOG_CAPACITY: usize = 512;

/// One `write_pins` call as seen by the fake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinWrite {
    pub port: PortBase,
    pub mask: u8,
    pub levels: u8,
}

#[derive(Debug, Default, Clone, Copy)]
struct PortState {
    outputs: u8,
    latch: u8,
    inputs: u8,
    alternate: u8,
    stuck_high: u8,
    stuck_low: u8,
    rising: u8,
    falling: u8,
    int_enabled: u8,
    int_raw: u8,
}

impl PortState {
    fn pad(&self) -> u8 {
        let level = (self.latch & self.outputs) | (self.inputs & !self.outputs);
        (level | self.stuck_high) & !self.stuck_low
    }
}

/// Fake GPIO register file
#[derive(Debug, Default)]
pub struct MockIo {
    ports: LinearMap<u32, PortState, MAX_PORTS>,
    enabled: Vec<u32, MAX_PERIPHERALS>,
    never_ready: Vec<u32, MAX_PERIPHERALS>,
    writes: Vec<PinWrite, LOG_CAPACITY>,
}

impl MockIo {
    pub fn new() -> Self {
        Self::default()
    }

    fn port(&mut self, port: PortBase) -> &mut PortState {
        if !self.ports.contains_key(&port.0) {
            if self.ports.insert(port.0, PortState::default()).is_err() {
                panic!("mock port table full");
            }
        }
        match self.ports.get_mut(&port.0) {
            Some(state) => state,
            None => panic!("mock port table full"),
        }
    }

    fn peek(&self, port: PortBase) -> PortState {
        self.ports.get(&port.0).copied().unwrap_or_default()
    }

    /// Drive external levels onto input pins, latching edge interrupts
    pub fn drive_input(&mut self, port: PortBase, mask: u8, levels: u8) {
        let state = self.port(port);
        let before = state.pad();
        state.inputs = (state.inputs & !mask) | (levels & mask);
        let after = state.pad();
        let rose = !before & after & state.rising;
        let fell = before & !after & state.falling;
        state.int_raw |= rose | fell;
    }

    /// Latch an interrupt without changing any level
    pub fn raise_interrupt(&mut self, port: PortBase, mask: u8) {
        self.port(port).int_raw |= mask;
    }

    /// Force pins to read high regardless of what is driven
    pub fn stick_high(&mut self, port: PortBase, mask: u8) {
        self.port(port).stuck_high |= mask;
    }

    /// Force pins to read low regardless of what is driven
    pub fn stick_low(&mut self, port: PortBase, mask: u8) {
        self.port(port).stuck_low |= mask;
    }

    /// Remove all stuck-pin faults on a port
    pub fn release(&mut self, port: PortBase) {
        let state = self.port(port);
        state.stuck_high = 0;
        state.stuck_low = 0;
    }

    /// Keep `peripheral_ready` false for a peripheral
    pub fn hold_in_reset(&mut self, id: PeripheralId) {
        if self.never_ready.push(id.0).is_err() {
            panic!("mock peripheral table full");
        }
    }

    pub fn is_enabled(&self, id: PeripheralId) -> bool {
        self.enabled.contains(&id.0)
    }

    pub fn is_output(&self, port: PortBase, mask: u8) -> bool {
        self.peek(port).outputs & mask == mask
    }

    pub fn is_alternate(&self, port: PortBase, mask: u8) -> bool {
        self.peek(port).alternate & mask == mask
    }

    pub fn interrupt_enabled(&self, port: PortBase, mask: u8) -> bool {
        self.peek(port).int_enabled & mask == mask
    }

    /// Every `write_pins` call so far (oldest first)
    pub fn writes(&self) -> &[PinWrite] {
        &self.writes
    }

    pub fn clear_log(&mut self) {
        self.writes.clear();
    }
}

impl HardwareIo for MockIo {
    fn enable_peripheral(&mut self, id: PeripheralId) {
        if !self.enabled.contains(&id.0) && self.enabled.push(id.0).is_err() {
            panic!("mock peripheral table full");
        }
    }

    fn disable_peripheral(&mut self, id: PeripheralId) {
        self.enabled.retain(|p| *p != id.0);
    }

    fn reset_peripheral(&mut self, _id: PeripheralId) {}

    fn peripheral_ready(&self, id: PeripheralId) -> bool {
        self.enabled.contains(&id.0) && !self.never_ready.contains(&id.0)
    }

    fn configure_pins(
        &mut self,
        port: PortBase,
        mask: u8,
        direction: Direction,
        _electrical: Electrical,
    ) {
        let state = self.port(port);
        state.alternate &= !mask;
        match direction {
            Direction::Output => state.outputs |= mask,
            Direction::Input => state.outputs &= !mask,
        }
    }

    fn configure_alternate(&mut self, port: PortBase, mask: u8, _function: u32, _electrical: Electrical) {
        self.port(port).alternate |= mask;
    }

    fn write_pins(&mut self, port: PortBase, mask: u8, levels: u8) {
        let state = self.port(port);
        state.latch = (state.latch & !mask) | (levels & mask);
        if self.writes.push(PinWrite { port, mask, levels: levels & mask }).is_err() {
            panic!("mock write log full");
        }
    }

    fn read_pins(&self, port: PortBase, mask: u8) -> u8 {
        self.peek(port).pad() & mask
    }

    fn set_interrupt_type(&mut self, port: PortBase, mask: u8, trigger: EdgeTrigger) {
        let state = self.port(port);
        let (rising, falling) = match trigger {
            EdgeTrigger::None => (false, false),
            EdgeTrigger::Rising => (true, false),
            EdgeTrigger::Falling => (false, true),
            EdgeTrigger::Both => (true, true),
        };
        state.rising = if rising { state.rising | mask } else { state.rising & !mask };
        state.falling = if falling { state.falling | mask } else { state.falling & !mask };
    }

    fn enable_interrupt(&mut self, port: PortBase, mask: u8) {
        self.port(port).int_enabled |= mask;
    }

    fn disable_interrupt(&mut self, port: PortBase, mask: u8) {
        self.port(port).int_enabled &= !mask;
    }

    fn interrupt_status(&self, port: PortBase) -> u8 {
        let state = self.peek(port);
        state.int_raw & state.int_enabled
    }

    fn clear_interrupt(&mut self, port: PortBase, mask: u8) {
        self.port(port).int_raw &= !mask;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PORT: PortBase = PortBase(0x4006_4000);

    #[test]
    fn test_output_latch_reads_back() {
        let mut io = MockIo::new();
        io.configure_pins(PORT, 0x0F, Direction::Output, Electrical::STANDARD);
        io.write_pins(PORT, 0x0F, 0x05);
        assert_eq!(io.read_pins(PORT, 0x0F), 0x05);
        assert_eq!(io.writes().len(), 1);
    }

    #[test]
    fn test_stuck_pin_overrides_latch() {
        let mut io = MockIo::new();
        io.configure_pins(PORT, 0x01, Direction::Output, Electrical::STANDARD);
        io.stick_low(PORT, 0x01);
        io.write_pins(PORT, 0x01, 0x01);
        assert_eq!(io.read_pins(PORT, 0x01), 0x00);
    }

    #[test]
    fn test_edge_latches_only_when_enabled() {
        let mut io = MockIo::new();
        io.configure_pins(PORT, 0x08, Direction::Input, Electrical::WEAK_PULL_DOWN);
        io.set_interrupt_type(PORT, 0x08, EdgeTrigger::Rising);
        io.drive_input(PORT, 0x08, 0x08);
        assert_eq!(io.interrupt_status(PORT), 0);

        io.enable_interrupt(PORT, 0x08);
        assert_eq!(io.interrupt_status(PORT), 0x08);

        io.clear_interrupt(PORT, 0x08);
        io.drive_input(PORT, 0x08, 0x00);
        assert_eq!(io.interrupt_status(PORT), 0, "falling edge not armed");
    }
}
