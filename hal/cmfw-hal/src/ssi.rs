//! Synchronous serial (QSSI) controller abstractions
//!
//! The controller runs in advanced mode with frame hold: the frame signal
//! stays asserted until a word is pushed with the frame-end marker, so one
//! logical frame may span several driver calls.

/// QSSI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SsiConfig {
    /// Bit rate in Hz
    pub frequency: u32,
    /// Clock polarity and phase
    pub mode: Mode,
    /// Poll budget per word before a transfer is abandoned
    pub timeout: u32,
}

impl Default for SsiConfig {
    fn default() -> Self {
        Self {
            frequency: 1_000_000, // 1 MHz
            mode: Mode::Mode0,
            timeout: 100,
        }
    }
}

/// SPI clock polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Clock idles low (CPOL=0)
    IdleLow,
    /// Clock idles high (CPOL=1)
    IdleHigh,
}

/// SPI clock phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Data captured on first clock transition (CPHA=0)
    CaptureOnFirstTransition,
    /// Data captured on second clock transition (CPHA=1)
    CaptureOnSecondTransition,
}

/// SPI mode (combined polarity and phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Mode 0: CPOL=0, CPHA=0
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

impl From<Mode> for (Polarity, Phase) {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Mode0 => (Polarity::IdleLow, Phase::CaptureOnFirstTransition),
            Mode::Mode1 => (Polarity::IdleLow, Phase::CaptureOnSecondTransition),
            Mode::Mode2 => (Polarity::IdleHigh, Phase::CaptureOnFirstTransition),
            Mode::Mode3 => (Polarity::IdleHigh, Phase::CaptureOnSecondTransition),
        }
    }
}

/// Data lane usage for the next words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LaneMode {
    /// Single data line in each direction, full duplex
    ReadWrite,
    /// Four lines, transmit only
    QuadWrite,
    /// Four lines, receive only
    QuadRead,
}

/// QSSI controller
pub trait SsiEngine {
    /// Apply bus parameters; effective for the next transfer
    fn configure(&mut self, config: &SsiConfig);

    /// Select lane usage for subsequent words
    fn set_lane_mode(&mut self, mode: LaneMode);

    /// Queue one word; `frame_end` closes the frame after it.
    ///
    /// Returns `false` without queueing when the transmit FIFO is full.
    fn try_put(&mut self, word: u8, frame_end: bool) -> bool;

    /// Pop one received word, if any
    fn try_get(&mut self) -> Option<u8>;

    /// Controller is still shifting
    fn is_busy(&self) -> bool;
}
