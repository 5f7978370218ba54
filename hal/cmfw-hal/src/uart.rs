//! UART abstractions
//!
//! The engine exposes the hardware FIFOs one byte at a time. Blocking
//! behaviour and timeouts belong to the transaction driver.

/// Lowest accepted baud rate
pub const UART_BAUD_MIN: u32 = 150;
/// Highest accepted baud rate
pub const UART_BAUD_MAX: u32 = 15_000_000;

/// UART configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
    /// Internal TX to RX loopback
    pub loopback: bool,
    /// Poll budget per byte
    pub timeout: u32,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            baudrate: 115200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            loopback: false,
            timeout: 100,
        }
    }
}

impl UartConfig {
    /// Baud rate inside the range the clock divider can produce
    pub fn baudrate_valid(&self) -> bool {
        (UART_BAUD_MIN..=UART_BAUD_MAX).contains(&self.baudrate)
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Even,
    Odd,
    /// Parity bit always 1
    Mark,
    /// Parity bit always 0
    Space,
}

impl Parity {
    /// Parse the shell spelling: `none`, `even`, `odd`, `one`, `zero`
    pub fn from_name(name: &str) -> Option<Self> {
        [
            ("none", Parity::None),
            ("even", Parity::Even),
            ("odd", Parity::Odd),
            ("one", Parity::Mark),
            ("zero", Parity::Space),
        ]
        .into_iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, p)| p)
    }
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    Two,
}

/// UART FIFO access
pub trait UartEngine {
    /// Apply line parameters; effective for the next transfer
    fn configure(&mut self, config: &UartConfig);

    /// Queue one byte; `false` if the transmit FIFO is full
    fn try_write(&mut self, byte: u8) -> bool;

    /// Pop one received byte, if any
    fn try_read(&mut self) -> Option<u8>;

    /// Transmitter still shifting
    fn is_busy(&self) -> bool;
}
