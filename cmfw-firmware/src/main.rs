//! Command Module firmware
//!
//! Sequences the CM power domains on request from the Service Module and
//! answers with the ready line. This build runs on an RP2040 bring-up
//! board; the signal groups and power logic are the same as on the CM.

#![no_std]
#![no_main]

use cmfw_board::Board;
use defmt::*;
use embassy_executor::Spawner;
use {defmt_rtt as _, panic_probe as _};

mod boards;
mod channels;
mod hw;
mod tasks;

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("CM firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let board = Board::new(&boards::LAYOUT, boards::io(p));
    info!("Board layout bound");

    spawner.spawn(tasks::monitor_task()).unwrap();
    spawner.spawn(tasks::power_task(board)).unwrap();

    info!("All tasks spawned, firmware running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}
