//! I2C master controller abstractions
//!
//! The engine is the bare controller: it latches one target address,
//! moves one data byte per command and reports a fault bitmask. Framing
//! (when to START, when to STOP, which bytes to ACK) is decided by the
//! transaction driver on top.

/// I2C configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cConfig {
    /// SCL frequency in Hz
    pub frequency: u32,
    /// Poll budget per byte before a transfer is abandoned
    pub timeout: u32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl I2cConfig {
    /// Standard mode (100 kHz)
    pub const STANDARD: Self = Self {
        frequency: 100_000,
        timeout: 100,
    };

    /// Fast mode (400 kHz)
    pub const FAST: Self = Self {
        frequency: 400_000,
        timeout: 100,
    };

    /// Fast mode plus (1 MHz)
    pub const FAST_PLUS: Self = Self {
        frequency: 1_000_000,
        timeout: 100,
    };
}

/// One controller command
///
/// With `run` set the controller moves one byte (or, with `quick`, only
/// the address phase). A command with `run` clear only generates the
/// requested conditions, which is how a held or faulted bus is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cControl {
    /// Clock a transfer
    pub run: bool,
    /// Generate (repeated) START and send the latched address first
    pub start: bool,
    /// Generate STOP after this byte
    pub stop: bool,
    /// ACK the received byte (reads only)
    pub ack: bool,
    /// Address-only transfer, no data phase
    pub quick: bool,
}

impl I2cControl {
    /// Release the bus without moving data
    pub const STOP_ONLY: Self = Self {
        run: false,
        start: false,
        stop: true,
        ack: false,
        quick: false,
    };
}

/// Fault bitmask reported by the controller
///
/// Any nonzero value is a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cStatus(pub u8);

impl I2cStatus {
    /// Fault the controller could not classify
    pub const UNKNOWN: u8 = 0x01;
    /// Clock-low timeout, or the driver's poll budget ran out
    pub const TIMEOUT: u8 = 0x02;
    /// Address or data byte not acknowledged
    pub const NACK: u8 = 0x04;
    /// Another master won the bus
    pub const ARBITRATION_LOST: u8 = 0x08;

    pub const OK: Self = Self(0);

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, bits: u8) -> bool {
        self.0 & bits == bits
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Split the mask into individual faults, lowest bit first.
    ///
    /// Bits outside the known set are reported as [`I2cFault::Unknown`].
    pub fn faults(self) -> impl Iterator<Item = I2cFault> {
        let bits = self.0;
        let known = [
            (Self::TIMEOUT, I2cFault::Timeout),
            (Self::NACK, I2cFault::Nack),
            (Self::ARBITRATION_LOST, I2cFault::ArbitrationLost),
        ];
        let unknown = bits & !(Self::TIMEOUT | Self::NACK | Self::ARBITRATION_LOST) != 0;
        known
            .into_iter()
            .filter(move |(bit, _)| bits & bit != 0)
            .map(|(_, fault)| fault)
            .chain(unknown.then_some(I2cFault::Unknown))
    }
}

/// Single decoded I2C fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cFault {
    Timeout,
    Nack,
    ArbitrationLost,
    Unknown,
}

/// I2C master controller
pub trait I2cEngine {
    /// Apply bus parameters; effective for the next transfer
    fn configure(&mut self, config: &I2cConfig);

    /// Latch the 7-bit target address and direction
    fn set_target(&mut self, address: u8, read: bool);

    /// Load the next byte to transmit
    fn put_data(&mut self, byte: u8);

    /// Fetch the last received byte
    fn get_data(&mut self) -> u8;

    /// Issue a command
    fn control(&mut self, control: I2cControl);

    /// Controller still working on the last command
    fn is_busy(&self) -> bool;

    /// Faults latched by the last command
    fn error_flags(&self) -> I2cStatus;
}
