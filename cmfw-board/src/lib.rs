//! Command Module board layer
//!
//! Binds the board-agnostic pieces to the CM prototype:
//!
//! ```text
//!   command dispatcher / power task
//!          │                 │
//!      ┌───▼────┐       ┌────▼────┐
//!      │ Board  │       │  Buses  │
//!      └───┬────┘       └────┬────┘
//!   signal groups,      I2C / QSSI / UART
//!   power, handshake    drivers
//!          │                 │
//!      HardwareIo      bus engines
//! ```
//!
//! [`cm`] holds the pin and port tables. [`Board`] owns the signal groups
//! and is the only writer of the power-control group. [`Buses`] looks bus
//! masters up by port number and validates reconfiguration.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod board;
pub mod buses;
pub mod cm;
pub mod error;

pub use board::{parse_domain, Board, BoardLayout};
pub use buses::Buses;
pub use error::{BoardError, BusKind};
