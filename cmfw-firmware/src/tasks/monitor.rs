//! Power state monitor task
//!
//! Logs every change of the power-control value, broken down per domain.

use cmfw_core::power::{DomainState, PowerDomain};
use defmt::*;

use crate::channels::POWER_STATE;

#[embassy_executor::task]
pub async fn monitor_task() {
    info!("Monitor task started");

    loop {
        let raw = POWER_STATE.wait().await;
        info!("Power control now {=u32:#x}", raw);
        for domain in PowerDomain::ALL_DOMAINS {
            let state = DomainState::from_bits(raw, domain.mask());
            debug!("  {=str}: {:?}", domain.name(), state);
        }
    }
}
