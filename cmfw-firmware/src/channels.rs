//! Inter-task signals

use cmfw_core::handshake::RequestMailbox;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

/// Newest SM power request, consumed by the power task.
/// A request posted before the previous one was serviced replaces it.
pub static POWER_REQUEST: RequestMailbox<CriticalSectionRawMutex> = Signal::new();

/// Power-control value after each change (updated by power task)
pub static POWER_STATE: Signal<CriticalSectionRawMutex, u32> = Signal::new();
