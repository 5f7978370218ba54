//! Command Module Hardware Abstraction Layer
//!
//! This crate defines the register-level capabilities the firmware needs
//! from the microcontroller. Chip support implements these traits; the
//! sequencing logic and bus drivers only ever talk to the traits, which
//! lets the same logic run against the [`mock`] backends on the host.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  cmfw-board (registry, dispatcher API)  │
//! └─────────────────────────────────────────┘
//!            │                     │
//!            ▼                     ▼
//! ┌───────────────────┐  ┌───────────────────┐
//! │ cmfw-core         │  │ cmfw-drivers      │
//! │ signals, power,   │  │ I2C, QSSI, UART   │
//! │ handshake         │  │ transactions      │
//! └───────────────────┘  └───────────────────┘
//!            │                     │
//!            ▼                     ▼
//! ┌─────────────────────────────────────────┐
//! │  cmfw-hal (this crate - traits)         │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::HardwareIo`] - Peripheral clocks, pin configuration, levels
//!   and edge interrupts
//! - [`i2c::I2cEngine`] - I2C master controller
//! - [`ssi::SsiEngine`] - Quad-capable synchronous serial controller
//! - [`uart::UartEngine`] - UART FIFO access

#![no_std]
#![deny(unsafe_code)]

pub mod bus;
pub mod gpio;
pub mod i2c;
pub mod ssi;
pub mod uart;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export key traits at crate root for convenience
pub use bus::{BusPin, BusPort};
pub use gpio::{HardwareIo, PhysicalPin};
pub use i2c::{I2cEngine, I2cStatus};
pub use ssi::SsiEngine;
pub use uart::UartEngine;
