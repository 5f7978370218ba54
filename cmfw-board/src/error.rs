//! Board-level errors

use cmfw_core::handshake::HandshakeError;
use cmfw_core::power::PowerError;
use cmfw_core::signal::SignalError;
use cmfw_drivers::i2c::I2cError;
use cmfw_drivers::qssi::QssiError;
use cmfw_drivers::uart::UartError;
use cmfw_drivers::InitError;

/// Bus family, for port lookup errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusKind {
    I2c,
    Qssi,
    Uart,
}

/// Error from a board command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BoardError {
    /// No port with this number on the bus
    InvalidPort { bus: BusKind, port: u8 },
    /// Port table already holds as many ports as it can
    RegistryFull(BusKind),
    /// Domain name not recognized
    UnknownDomain,
    /// Signal group name not recognized
    UnknownGroup,
    /// Value has bits beyond the group width
    ValueOutOfRange { value: u32, mask: u32 },
    /// Power-control group may only change through power sequencing
    OwnedByPower,
    Signal(SignalError),
    Power(PowerError),
    Handshake(HandshakeError),
    I2c(I2cError),
    Qssi(QssiError),
    Uart(UartError),
    Init(InitError),
}

impl From<SignalError> for BoardError {
    fn from(e: SignalError) -> Self {
        BoardError::Signal(e)
    }
}

impl From<PowerError> for BoardError {
    fn from(e: PowerError) -> Self {
        BoardError::Power(e)
    }
}

impl From<HandshakeError> for BoardError {
    fn from(e: HandshakeError) -> Self {
        BoardError::Handshake(e)
    }
}

impl From<I2cError> for BoardError {
    fn from(e: I2cError) -> Self {
        BoardError::I2c(e)
    }
}

impl From<QssiError> for BoardError {
    fn from(e: QssiError) -> Self {
        BoardError::Qssi(e)
    }
}

impl From<UartError> for BoardError {
    fn from(e: UartError) -> Self {
        BoardError::Uart(e)
    }
}

impl From<InitError> for BoardError {
    fn from(e: InitError) -> Self {
        BoardError::Init(e)
    }
}
