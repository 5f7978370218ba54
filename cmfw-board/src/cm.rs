//! Command Module prototype hardware tables
//!
//! Pin assignments of the TM4C1290 on the CM prototype. Every signal group
//! and bus port is a `static` so drivers can hold `&'static` references.

use cmfw_core::signal::SignalGroupConfig;
use cmfw_hal::bus::{BusPin, BusPort};
use cmfw_hal::gpio::{EdgeTrigger, Electrical, PeripheralId, PhysicalPin, PortBase};
use cmfw_hal::i2c::I2cConfig;
use cmfw_hal::ssi::{Mode, SsiConfig};
use cmfw_hal::uart::{DataBits, Parity, StopBits, UartConfig};

use crate::board::BoardLayout;

/// Number of I2C master ports
pub const I2C_PORT_COUNT: usize = 8;
/// Number of QSSI master ports
pub const QSSI_PORT_COUNT: usize = 1;
/// Number of UART ports
pub const UART_PORT_COUNT: usize = 3;

/// Bus controller timeout in poll units
const BUS_TIMEOUT: u32 = 100;

/// A GPIO port: its clock gate and register base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioPort {
    index: u32,
    pub gate: PeripheralId,
    pub base: PortBase,
}

impl GpioPort {
    const fn new(index: u32, base: u32) -> Self {
        Self {
            index,
            gate: PeripheralId(0xf000_0800 + index),
            base: PortBase(base),
        }
    }

    pub const fn pin(self, number: u8) -> PhysicalPin {
        PhysicalPin::new(self.gate.0, self.base.0, number)
    }

    /// Pin-mux token for `function` on `number`
    pub const fn mux(self, number: u8, function: u32) -> u32 {
        (self.index << 16) | ((number as u32 * 4) << 8) | function
    }
}

pub const PA: GpioPort = GpioPort::new(0, 0x4005_8000);
pub const PB: GpioPort = GpioPort::new(1, 0x4005_9000);
pub const PC: GpioPort = GpioPort::new(2, 0x4005_A000);
pub const PD: GpioPort = GpioPort::new(3, 0x4005_B000);
pub const PE: GpioPort = GpioPort::new(4, 0x4005_C000);
pub const PG: GpioPort = GpioPort::new(6, 0x4005_E000);
pub const PJ: GpioPort = GpioPort::new(8, 0x4006_0000);
pub const PK: GpioPort = GpioPort::new(9, 0x4006_1000);
pub const PM: GpioPort = GpioPort::new(11, 0x4006_3000);
pub const PN: GpioPort = GpioPort::new(12, 0x4006_4000);
pub const PQ: GpioPort = GpioPort::new(14, 0x4006_6000);

const fn i2c_gate(n: u32) -> PeripheralId {
    PeripheralId(0xf000_2000 + n)
}

const fn ssi_gate(n: u32) -> PeripheralId {
    PeripheralId(0xf000_1C00 + n)
}

const fn uart_gate(n: u32) -> PeripheralId {
    PeripheralId(0xf000_1800 + n)
}

// ---------------------------------------------------------------------------
// Signal groups
// ---------------------------------------------------------------------------

static SM_PWR_EN_PINS: [PhysicalPin; 1] = [PN.pin(3)];

/// Power request from the Service Module
pub static SM_PWR_EN: SignalGroupConfig = SignalGroupConfig::input("sm-pwr-en", &SM_PWR_EN_PINS)
    .with_electrical(Electrical::WEAK_PULL_DOWN)
    .with_trigger(EdgeTrigger::Both);

static CM_READY_PINS: [PhysicalPin; 1] = [PN.pin(2)];

/// Acknowledgement back to the Service Module
pub static CM_READY: SignalGroupConfig = SignalGroupConfig::output("cm-ready", &CM_READY_PINS);

static LED_USER_PINS: [PhysicalPin; 9] = [
    PM.pin(0), // green 0
    PM.pin(1), // green 1
    PM.pin(2), // green 2
    PM.pin(3), // blue 0
    PM.pin(4), // blue 1
    PM.pin(5), // yellow 0
    PM.pin(6), // yellow 1
    PM.pin(7), // red 0
    PN.pin(0), // red 1
];

pub static LED_USER: SignalGroupConfig = SignalGroupConfig::output("led-user", &LED_USER_PINS);

static LED_STATUS_PINS: [PhysicalPin; 3] = [
    PN.pin(4), // temperature alert
    PN.pin(5), // all domains on
    PN.pin(6), // power inconsistent
];

pub static LED_STATUS: SignalGroupConfig = SignalGroupConfig::output("led-status", &LED_STATUS_PINS);

/// Bit order matches `cmfw_core::power::mask`
static POWER_CTRL_PINS: [PhysicalPin; 8] = [
    PK.pin(0), // FPGA core
    PK.pin(1), // FPGA I/O
    PK.pin(2), // misc
    PK.pin(3), // FireFly
    PQ.pin(0), // PM1 control 0
    PQ.pin(2), // PM1 control 1
    PQ.pin(3), // PM2 control 0
    PQ.pin(6), // PM2 control 1
];

pub static POWER_CTRL: SignalGroupConfig = SignalGroupConfig::output("power-ctrl", &POWER_CTRL_PINS);

/// The CM prototype signal layout
pub static LAYOUT: BoardLayout = BoardLayout {
    request: &SM_PWR_EN,
    ready: &CM_READY,
    status: Some(&LED_STATUS),
    led_user: &LED_USER,
    power: &POWER_CTRL,
};

// ---------------------------------------------------------------------------
// I2C masters
// ---------------------------------------------------------------------------

const fn i2c_pins(port: GpioPort, scl: u8, sda: u8, function: u32) -> [BusPin; 2] {
    [
        BusPin::new(port.pin(scl), port.mux(scl, function), Electrical::STANDARD),
        BusPin::new(port.pin(sda), port.mux(sda, function), Electrical::OPEN_DRAIN),
    ]
}

const I2C_DEFAULT: I2cConfig = I2cConfig {
    frequency: 100_000,
    timeout: BUS_TIMEOUT,
};

static I2C1_PINS: [BusPin; 2] = i2c_pins(PG, 0, 1, 2);
static I2C2_PINS: [BusPin; 2] = i2c_pins(PG, 2, 3, 2);
static I2C3_PINS: [BusPin; 2] = i2c_pins(PG, 4, 5, 2);
static I2C4_PINS: [BusPin; 2] = i2c_pins(PG, 6, 7, 2);
static I2C5_PINS: [BusPin; 2] = i2c_pins(PB, 0, 1, 2);
static I2C6_PINS: [BusPin; 2] = i2c_pins(PA, 6, 7, 2);
static I2C7_PINS: [BusPin; 2] = i2c_pins(PD, 0, 1, 2);
static I2C8_PINS: [BusPin; 2] = i2c_pins(PD, 2, 3, 2);

/// Ports 1-8: power modules, FireFly, clocks, sensors, FireFly control,
/// FPGA system monitor, SM IPMC, FPGA user logic
pub static I2C_PORTS: [BusPort<I2cConfig>; I2C_PORT_COUNT] = [
    BusPort { number: 1, peripheral: i2c_gate(1), pins: &I2C1_PINS, config: I2C_DEFAULT },
    BusPort { number: 2, peripheral: i2c_gate(2), pins: &I2C2_PINS, config: I2C_DEFAULT },
    BusPort { number: 3, peripheral: i2c_gate(3), pins: &I2C3_PINS, config: I2C_DEFAULT },
    BusPort { number: 4, peripheral: i2c_gate(4), pins: &I2C4_PINS, config: I2C_DEFAULT },
    BusPort { number: 5, peripheral: i2c_gate(5), pins: &I2C5_PINS, config: I2C_DEFAULT },
    BusPort { number: 6, peripheral: i2c_gate(6), pins: &I2C6_PINS, config: I2C_DEFAULT },
    BusPort { number: 7, peripheral: i2c_gate(7), pins: &I2C7_PINS, config: I2C_DEFAULT },
    BusPort { number: 8, peripheral: i2c_gate(8), pins: &I2C8_PINS, config: I2C_DEFAULT },
];

// ---------------------------------------------------------------------------
// QSSI master
// ---------------------------------------------------------------------------

static QSSI1_PINS: [BusPin; 6] = [
    BusPin::new(PB.pin(4), PB.mux(4, 2), Electrical::STANDARD), // FSS
    BusPin::new(PB.pin(5), PB.mux(5, 2), Electrical::STANDARD), // CLK
    BusPin::new(PE.pin(4), PE.mux(4, 2), Electrical::STANDARD), // DAT0
    BusPin::new(PE.pin(5), PE.mux(5, 2), Electrical::STANDARD), // DAT1
    BusPin::new(PD.pin(4), PD.mux(4, 2), Electrical::STANDARD), // DAT2
    BusPin::new(PD.pin(5), PD.mux(5, 2), Electrical::STANDARD), // DAT3
];

pub static QSSI_PORTS: [BusPort<SsiConfig>; QSSI_PORT_COUNT] = [BusPort {
    number: 1,
    peripheral: ssi_gate(1),
    pins: &QSSI1_PINS,
    config: SsiConfig {
        frequency: 1_000_000,
        mode: Mode::Mode0,
        timeout: BUS_TIMEOUT,
    },
}];

// ---------------------------------------------------------------------------
// UARTs
// ---------------------------------------------------------------------------

const UART_DEFAULT: UartConfig = UartConfig {
    baudrate: 115_200,
    data_bits: DataBits::Eight,
    parity: Parity::None,
    stop_bits: StopBits::One,
    loopback: false,
    timeout: BUS_TIMEOUT,
};

const fn uart_pins(port: GpioPort, rx: u8, tx: u8) -> [BusPin; 2] {
    [
        BusPin::new(port.pin(rx), port.mux(rx, 1), Electrical::STANDARD),
        BusPin::new(port.pin(tx), port.mux(tx, 1), Electrical::STANDARD),
    ]
}

static UART1_PINS: [BusPin; 2] = uart_pins(PQ, 4, 5);
static UART3_PINS: [BusPin; 2] = uart_pins(PJ, 0, 1);
static UART5_PINS: [BusPin; 2] = uart_pins(PC, 6, 7);

/// SM IPMC (1), front panel USB (3), SM Zynq SoM (5)
pub static UART_PORTS: [BusPort<UartConfig>; UART_PORT_COUNT] = [
    BusPort { number: 1, peripheral: uart_gate(1), pins: &UART1_PINS, config: UART_DEFAULT },
    BusPort { number: 3, peripheral: uart_gate(3), pins: &UART3_PINS, config: UART_DEFAULT },
    BusPort { number: 5, peripheral: uart_gate(5), pins: &UART5_PINS, config: UART_DEFAULT },
];
