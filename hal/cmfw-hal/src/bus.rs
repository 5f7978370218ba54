//! Static description of a bus port
//!
//! A port is one instance of a bus peripheral together with the pins it
//! is muxed onto and its default protocol parameters. Board crates declare
//! these as `const` tables.

use crate::gpio::{Electrical, HardwareIo, PeripheralId, PhysicalPin};

/// A pin handed over to a bus peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusPin {
    pub pin: PhysicalPin,
    /// Pin-mux token selecting the peripheral function
    pub function: u32,
    pub electrical: Electrical,
}

impl BusPin {
    pub const fn new(pin: PhysicalPin, function: u32, electrical: Electrical) -> Self {
        Self {
            pin,
            function,
            electrical,
        }
    }
}

/// One physical bus instance
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusPort<C: 'static> {
    /// User-facing port number
    pub number: u8,
    /// Clock gate of the bus peripheral
    pub peripheral: PeripheralId,
    /// Pins in mux order
    pub pins: &'static [BusPin],
    /// Protocol parameters applied at init
    pub config: C,
}

impl<C> BusPort<C> {
    /// Open the GPIO clock gates and mux every pin to the bus function
    pub fn route_pins<IO: HardwareIo>(&self, io: &mut IO) {
        for bus_pin in self.pins {
            io.enable_peripheral(bus_pin.pin.peripheral);
            io.configure_alternate(
                bus_pin.pin.port,
                bus_pin.pin.mask,
                bus_pin.function,
                bus_pin.electrical,
            );
        }
    }
}
