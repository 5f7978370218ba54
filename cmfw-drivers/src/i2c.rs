//! I2C master transactions
//!
//! Framing rules:
//! - START is sent on the first byte unless the bus is still held by an
//!   earlier call that suppressed its STOP. `repeated_start` forces a
//!   (repeated) START anyway, e.g. to turn a held write into a read.
//! - STOP is sent after the last byte unless `no_stop` is set, in which
//!   case the bus stays held for the next call.
//! - Reads ACK every byte except the last one of a stopping transfer.
//!
//! On any fault other than lost arbitration the driver sends STOP so the
//! bus is released for the next transaction.

use cmfw_hal::bus::BusPort;
use cmfw_hal::gpio::HardwareIo;
use cmfw_hal::i2c::{I2cConfig, I2cControl, I2cEngine, I2cStatus};
use embedded_hal::delay::DelayNs;
use heapless::Vec;

use crate::poll::Poller;
use crate::{bring_up, InitError};

/// Highest 7-bit address
pub const MAX_ADDRESS: u8 = 0x7F;

/// Lowest accepted SCL frequency
pub const I2C_FREQ_MIN: u32 = 10_000;
/// Highest accepted SCL frequency (fast-mode plus)
pub const I2C_FREQ_MAX: u32 = 1_000_000;

/// Per-call framing flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cFlags {
    /// Send START even though the bus is held
    pub repeated_start: bool,
    /// Keep the bus after the last byte
    pub no_stop: bool,
}

/// Access mode nibble as used by the hardware test shell
///
/// bit 0 read, bit 1 repeated start, bit 2 no stop, bit 3 quick command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cAccess {
    pub read: bool,
    pub quick: bool,
    pub flags: I2cFlags,
}

impl I2cAccess {
    pub const READ: u8 = 0x01;
    pub const REPEATED_START: u8 = 0x02;
    pub const NO_STOP: u8 = 0x04;
    pub const QUICK: u8 = 0x08;

    pub fn from_bits(bits: u8) -> Self {
        Self {
            read: bits & Self::READ != 0,
            quick: bits & Self::QUICK != 0,
            flags: I2cFlags {
                repeated_start: bits & Self::REPEATED_START != 0,
                no_stop: bits & Self::NO_STOP != 0,
            },
        }
    }
}

/// How a bus scan probes each address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanMode {
    /// One-byte read for 0x30-0x37 and 0x50-0x5F, quick write elsewhere
    Auto,
    /// Quick write everywhere
    Quick,
    /// One-byte read everywhere
    Read,
}

impl ScanMode {
    fn probe_by_read(self, address: u8) -> bool {
        match self {
            ScanMode::Auto => matches!(address, 0x30..=0x37 | 0x50..=0x5F),
            ScanMode::Quick => false,
            ScanMode::Read => true,
        }
    }
}

/// Error from I2C transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cError {
    /// Controller fault or poll timeout after `transferred` bytes
    Bus { status: I2cStatus, transferred: usize },
    /// Address does not fit in 7 bits
    InvalidAddress(u8),
    /// Zero-length data transfer (use a quick command)
    Empty,
    /// SCL frequency outside the supported range
    InvalidFrequency(u32),
}

impl I2cError {
    /// Fault bitmask, empty for argument errors
    pub fn status(&self) -> I2cStatus {
        match self {
            I2cError::Bus { status, .. } => *status,
            _ => I2cStatus::OK,
        }
    }
}

/// Blocking I2C master on one bus port
pub struct I2cMaster<E, D> {
    port: &'static BusPort<I2cConfig>,
    engine: E,
    delay: D,
    config: I2cConfig,
    bus_held: bool,
}

impl<E: I2cEngine, D: DelayNs> I2cMaster<E, D> {
    pub fn new(port: &'static BusPort<I2cConfig>, engine: E, delay: D) -> Self {
        Self {
            port,
            engine,
            delay,
            config: port.config,
            bus_held: false,
        }
    }

    pub fn port(&self) -> &'static BusPort<I2cConfig> {
        self.port
    }

    pub fn config(&self) -> I2cConfig {
        self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Bus still owned after a call with `no_stop`
    pub fn bus_held(&self) -> bool {
        self.bus_held
    }

    /// Route pins, cycle the controller and apply the port defaults
    pub fn init<IO: HardwareIo>(&mut self, io: &mut IO) -> Result<(), InitError> {
        self.port.route_pins(io);
        bring_up(io, &mut self.delay, self.port.peripheral, self.config.timeout)?;
        self.engine.configure(&self.config);
        self.bus_held = false;
        Ok(())
    }

    /// Change bus parameters; used from the next transaction on
    pub fn reconfigure(&mut self, config: I2cConfig) -> Result<(), I2cError> {
        if !(I2C_FREQ_MIN..=I2C_FREQ_MAX).contains(&config.frequency) {
            return Err(I2cError::InvalidFrequency(config.frequency));
        }
        self.config = config;
        self.engine.configure(&config);
        Ok(())
    }

    /// Write `data` to a target; returns the number of bytes sent
    pub fn write(&mut self, address: u8, data: &[u8], flags: I2cFlags) -> Result<usize, I2cError> {
        check_address(address)?;
        if data.is_empty() {
            return Err(I2cError::Empty);
        }
        let start = self.needs_start(flags);
        self.engine.set_target(address, false);

        for (i, &byte) in data.iter().enumerate() {
            let last = i + 1 == data.len();
            self.engine.put_data(byte);
            let control = I2cControl {
                run: true,
                start: start && i == 0,
                stop: last && !flags.no_stop,
                ack: false,
                quick: false,
            };
            self.run(control).map_err(|status| self.abort(address, status, i))?;
        }

        self.bus_held = flags.no_stop;
        Ok(data.len())
    }

    /// Fill `buf` from a target; returns the number of bytes received
    pub fn read(&mut self, address: u8, buf: &mut [u8], flags: I2cFlags) -> Result<usize, I2cError> {
        check_address(address)?;
        if buf.is_empty() {
            return Err(I2cError::Empty);
        }
        let start = self.needs_start(flags);
        let len = buf.len();
        self.engine.set_target(address, true);

        for (i, slot) in buf.iter_mut().enumerate() {
            let last = i + 1 == len;
            let stop = last && !flags.no_stop;
            let control = I2cControl {
                run: true,
                start: start && i == 0,
                stop,
                ack: !stop,
                quick: false,
            };
            self.run(control).map_err(|status| self.abort(address, status, i))?;
            *slot = self.engine.get_data();
        }

        self.bus_held = flags.no_stop;
        Ok(len)
    }

    /// Address-only transfer; succeeds when the target acknowledges
    pub fn quick_command(&mut self, address: u8, read: bool, flags: I2cFlags) -> Result<usize, I2cError> {
        check_address(address)?;
        self.engine.set_target(address, read);
        let control = I2cControl {
            run: true,
            start: true,
            stop: !flags.no_stop,
            ack: false,
            quick: true,
        };
        self.run(control).map_err(|status| self.abort(address, status, 0))?;
        self.bus_held = flags.no_stop;
        Ok(0)
    }

    /// Dispatch on a shell access-mode nibble
    pub fn transfer(&mut self, address: u8, access: I2cAccess, buf: &mut [u8]) -> Result<usize, I2cError> {
        if access.quick {
            self.quick_command(address, access.read, access.flags)
        } else if access.read {
            self.read(address, buf, access.flags)
        } else {
            self.write(address, buf, access.flags)
        }
    }

    /// Probe every 7-bit address and collect the ones that answer
    pub fn scan(&mut self, mode: ScanMode) -> Vec<u8, 128> {
        let mut found = Vec::new();
        for address in 1..=MAX_ADDRESS {
            let answered = if mode.probe_by_read(address) {
                let mut byte = [0u8; 1];
                self.read(address, &mut byte, I2cFlags::default()).is_ok()
            } else {
                self.quick_command(address, false, I2cFlags::default()).is_ok()
            };
            if answered {
                // At most 127 addresses
                let _ = found.push(address);
            }
        }
        found
    }

    fn needs_start(&self, flags: I2cFlags) -> bool {
        !self.bus_held || flags.repeated_start
    }

    /// Issue one command and wait for the controller
    fn run(&mut self, control: I2cControl) -> Result<(), I2cStatus> {
        self.engine.control(control);
        let mut poller = Poller::new(self.config.timeout);
        if !poller.wait(&mut self.delay, || !self.engine.is_busy()) {
            return Err(I2cStatus(I2cStatus::TIMEOUT));
        }
        let status = self.engine.error_flags();
        if status.is_ok() {
            Ok(())
        } else {
            Err(status)
        }
    }

    /// Release the bus after a fault and build the error
    fn abort(&mut self, _address: u8, status: I2cStatus, transferred: usize) -> I2cError {
        #[cfg(feature = "defmt")]
        for fault in status.faults() {
            defmt::warn!(
                "i2c{=u8}: {:#x} after {=usize} bytes: {}",
                self.port.number,
                _address,
                transferred,
                fault
            );
        }

        if !status.contains(I2cStatus::ARBITRATION_LOST) {
            self.engine.control(I2cControl::STOP_ONLY);
            let mut poller = Poller::new(self.config.timeout);
            // A controller that stays busy has already been reported
            let _ = poller.wait(&mut self.delay, || !self.engine.is_busy());
        }
        self.bus_held = false;
        I2cError::Bus {
            status,
            transferred,
        }
    }
}

fn check_address(address: u8) -> Result<(), I2cError> {
    if address > MAX_ADDRESS {
        return Err(I2cError::InvalidAddress(address));
    }
    Ok(())
}
