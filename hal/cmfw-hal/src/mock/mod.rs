//! Host-side fakes for the register I/O and the bus engines
//!
//! Enabled with the `mock` feature. The fakes keep just enough state to
//! exercise the drivers: port latches and pad levels, edge latching,
//! injectable stuck pins, and bus engines whose busy flag can be made to
//! never clear.

mod bus;
mod io;

pub use bus::{MockI2c, MockSsi, MockUart};
pub use io::{MockIo, PinWrite};
