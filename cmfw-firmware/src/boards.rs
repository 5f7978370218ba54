//! RP2040 bring-up board
//!
//! Same signal groups as the CM prototype, mapped onto a Pico-style
//! board. Port numbers follow [`crate::hw`]: port n is GPIO 8n..8n+7.
//!
//! | group        | GPIO          |
//! |--------------|---------------|
//! | power-ctrl   | 0-7           |
//! | sm-pwr-en    | 10            |
//! | cm-ready     | 11            |
//! | led-status   | 12-14         |
//! | led-user     | 16-23, 25     |

use cmfw_board::BoardLayout;
use cmfw_core::signal::SignalGroupConfig;
use cmfw_hal::gpio::{EdgeTrigger, Electrical, PhysicalPin, PortBase};
use embassy_rp::gpio::Flex;
use embassy_rp::Peripherals;

use crate::hw::RpIo;

/// GPIOs have no clock gate on the RP2040
const NO_GATE: u32 = 0;

const fn gpio(number: u8) -> PhysicalPin {
    PhysicalPin::new(NO_GATE, (number / 8) as u32, number % 8)
}

/// Port and mask of the power request line
pub const REQUEST_PORT: PortBase = PortBase(1);
pub const REQUEST_MASK: u8 = 1 << 2;

static SM_PWR_EN_PINS: [PhysicalPin; 1] = [gpio(10)];
static SM_PWR_EN: SignalGroupConfig = SignalGroupConfig::input("sm-pwr-en", &SM_PWR_EN_PINS)
    .with_electrical(Electrical::WEAK_PULL_DOWN)
    .with_trigger(EdgeTrigger::Both);

static CM_READY_PINS: [PhysicalPin; 1] = [gpio(11)];
static CM_READY: SignalGroupConfig = SignalGroupConfig::output("cm-ready", &CM_READY_PINS);

static LED_STATUS_PINS: [PhysicalPin; 3] = [gpio(12), gpio(13), gpio(14)];
static LED_STATUS: SignalGroupConfig = SignalGroupConfig::output("led-status", &LED_STATUS_PINS);

static LED_USER_PINS: [PhysicalPin; 9] = [
    gpio(16),
    gpio(17),
    gpio(18),
    gpio(19),
    gpio(20),
    gpio(21),
    gpio(22),
    gpio(23),
    gpio(25), // on-board LED
];
static LED_USER: SignalGroupConfig = SignalGroupConfig::output("led-user", &LED_USER_PINS);

static POWER_CTRL_PINS: [PhysicalPin; 8] = [
    gpio(0),
    gpio(1),
    gpio(2),
    gpio(3),
    gpio(4),
    gpio(5),
    gpio(6),
    gpio(7),
];
static POWER_CTRL: SignalGroupConfig = SignalGroupConfig::output("power-ctrl", &POWER_CTRL_PINS);

pub static LAYOUT: BoardLayout = BoardLayout {
    request: &SM_PWR_EN,
    ready: &CM_READY,
    status: Some(&LED_STATUS),
    led_user: &LED_USER,
    power: &POWER_CTRL,
};

/// Claim every GPIO the layout uses
pub fn io(p: Peripherals) -> RpIo {
    let mut io = RpIo::new();
    io.attach(0, Flex::new(p.PIN_0));
    io.attach(1, Flex::new(p.PIN_1));
    io.attach(2, Flex::new(p.PIN_2));
    io.attach(3, Flex::new(p.PIN_3));
    io.attach(4, Flex::new(p.PIN_4));
    io.attach(5, Flex::new(p.PIN_5));
    io.attach(6, Flex::new(p.PIN_6));
    io.attach(7, Flex::new(p.PIN_7));
    io.attach(10, Flex::new(p.PIN_10));
    io.attach(11, Flex::new(p.PIN_11));
    io.attach(12, Flex::new(p.PIN_12));
    io.attach(13, Flex::new(p.PIN_13));
    io.attach(14, Flex::new(p.PIN_14));
    io.attach(16, Flex::new(p.PIN_16));
    io.attach(17, Flex::new(p.PIN_17));
    io.attach(18, Flex::new(p.PIN_18));
    io.attach(19, Flex::new(p.PIN_19));
    io.attach(20, Flex::new(p.PIN_20));
    io.attach(21, Flex::new(p.PIN_21));
    io.attach(22, Flex::new(p.PIN_22));
    io.attach(23, Flex::new(p.PIN_23));
    io.attach(25, Flex::new(p.PIN_25));
    io
}
