//! Bus transaction drivers for the Command Module
//!
//! Each driver owns one bus engine and turns byte-level engine access into
//! blocking transactions. Nothing here waits on a hardware timer: every
//! wait is a bounded poll loop (see [`poll`]) and ends in a timeout fault
//! instead of hanging.
//!
//! - [`i2c::I2cMaster`] - write, read, quick command, bus scan
//! - [`qssi::QssiMaster`] - single and quad lane transfers with frame hold
//! - [`uart::UartPort`] - byte write, exact and drain-style reads

#![no_std]
#![deny(unsafe_code)]

pub mod i2c;
pub mod poll;
pub mod qssi;
pub mod uart;

use cmfw_hal::gpio::{HardwareIo, PeripheralId};
use embedded_hal::delay::DelayNs;

use crate::poll::Poller;

/// Error bringing a bus peripheral up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    /// Peripheral never reported ready after reset
    NotReady(PeripheralId),
}

/// Cycle a peripheral through reset and wait until it reports ready
pub(crate) fn bring_up<IO: HardwareIo, D: DelayNs>(
    io: &mut IO,
    delay: &mut D,
    peripheral: PeripheralId,
    timeout: u32,
) -> Result<(), InitError> {
    io.disable_peripheral(peripheral);
    io.reset_peripheral(peripheral);
    io.enable_peripheral(peripheral);

    let mut poller = Poller::new(timeout);
    if !poller.wait(delay, || io.peripheral_ready(peripheral)) {
        #[cfg(feature = "defmt")]
        defmt::error!("peripheral {=u32:#x} not ready", peripheral.0);
        return Err(InitError::NotReady(peripheral));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_util {
    use embedded_hal::delay::DelayNs;

    /// Delay that counts calls instead of sleeping
    #[derive(Debug, Default)]
    pub struct CountingDelay {
        pub calls: u32,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, _ns: u32) {
            self.calls += 1;
        }
    }
}
