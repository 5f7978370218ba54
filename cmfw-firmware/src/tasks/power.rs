//! Power owner task
//!
//! Owns the board and is therefore the only writer of the power-control
//! group. Each loop iteration waits for either
//! - an edge on the SM power request line, which is acknowledged and
//!   posted into the request mailbox, or
//! - the status tick, which blinks the heartbeat LED, re-checks the
//!   power state and re-posts the request level if an edge was missed.
//!
//! The edge waiter is only armed while the task sits in `select`, so an
//! edge during servicing is lost. The tick resync covers that gap.
//!
//! Pending requests are serviced at the top of every iteration.

use cmfw_board::Board;
use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Ticker};

use crate::boards::{REQUEST_MASK, REQUEST_PORT};
use crate::channels::{POWER_REQUEST, POWER_STATE};
use crate::hw::RpIo;

/// Status tick interval in milliseconds
pub const STATUS_INTERVAL_MS: u64 = 500;

/// Heartbeat on user LED blue 0
const HEARTBEAT_LED: u32 = 1 << 3;

#[embassy_executor::task]
pub async fn power_task(mut board: Board<RpIo>) {
    info!("Power task started");

    match board.init() {
        // Service a request that was raised before boot
        Ok(request) => POWER_REQUEST.signal(request),
        Err(e) => error!("Board init failed: {:?}", e),
    }

    let mut ticker = Ticker::every(Duration::from_millis(STATUS_INTERVAL_MS));
    let mut last_raw = None;

    loop {
        service(&mut board);
        publish(&board, &mut last_raw);

        let edge = board.io_mut().wait_for_edge(REQUEST_PORT, REQUEST_MASK);
        let woke = select(edge, ticker.next()).await;
        match woke {
            Either::First(()) => {
                if let Some(request) = board.on_request_edge(&POWER_REQUEST) {
                    debug!("SM power request: {:?}", request);
                }
            }
            Either::Second(()) => tick(&mut board),
        }
    }
}

fn service(board: &mut Board<RpIo>) {
    match board.service_requests(&POWER_REQUEST) {
        Some(Ok(report)) => match report.fault {
            None => info!("{:?} done, ready={}", report.request, report.ready),
            Some(e) => warn!("{:?} incomplete: {:?}, ready={}", report.request, e, report.ready),
        },
        Some(Err(e)) => error!("Power request failed: {:?}", e),
        None => {}
    }
}

fn publish(board: &Board<RpIo>, last_raw: &mut Option<u32>) {
    match board.power().raw(board.io()) {
        Ok(raw) if *last_raw != Some(raw) => {
            *last_raw = Some(raw);
            POWER_STATE.signal(raw);
        }
        Ok(_) => {}
        Err(e) => warn!("Power-control read failed: {:?}", e),
    }
}

fn tick(board: &mut Board<RpIo>) {
    if let Some(request) = board.resync_request(&POWER_REQUEST) {
        debug!("SM power request resynced: {:?}", request);
    }

    let blink = board
        .signal_get("led-user")
        .and_then(|leds| board.signal_set("led-user", leds ^ HEARTBEAT_LED));
    if let Err(e) = blink {
        trace!("Heartbeat LED: {:?}", e);
    }

    match board.refresh_status() {
        Ok(status) if status.is_inconsistent() => {
            warn!("Power inconsistent at rest: {=u32:#x}", status.raw)
        }
        Ok(_) => {}
        Err(e) => warn!("Status refresh failed: {:?}", e),
    }
}
