use core::cell::Cell;

use heapless::{Deque, Vec};

use crate::i2c::{I2cConfig, I2cControl, I2cEngine, I2cStatus};
use crate::ssi::{LaneMode, SsiConfig, SsiEngine};
use crate::uart::{UartConfig, UartEngine};

const FIFO: usize = 128;
/// Command log capacity; a full auto-mode bus scan issues about 250
const CONTROL_LOG: usize = 512;

/// Fake I2C controller with a set of responding addresses
#[derive(Debug, Default)]
pub struct MockI2c {
    pub config: Option<I2cConfig>,
    /// Addresses that acknowledge
    pub devices: Vec<u8, 16>,
    /// Bytes returned by reads, in order (0xFF once exhausted)
    pub rx: Deque<u8, FIFO>,
    /// Bytes written to any device
    pub tx: Vec<u8, FIFO>,
    /// Every command issued
    pub controls: Vec<I2cControl, CONTROL_LOG>,
    /// NACK the data byte with this index
    pub nack_data_at: Option<usize>,
    /// Report arbitration lost on the next command carrying START
    pub lose_arbitration: bool,
    /// Busy flag never clears
    pub stuck: bool,
    /// Bus owned between START and STOP
    pub held: bool,
    target: (u8, bool),
    data_out: u8,
    data_in: u8,
    data_count: usize,
    status: I2cStatus,
}

impl MockI2c {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(addresses: &[u8]) -> Self {
        let mut mock = Self::new();
        for &address in addresses {
            if mock.devices.push(address).is_err() {
                panic!("mock i2c device table full");
            }
        }
        mock
    }

    pub fn queue_rx(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if self.rx.push_back(byte).is_err() {
                panic!("mock i2c receive queue full");
            }
        }
    }

    pub fn stuck() -> Self {
        Self {
            stuck: true,
            ..Self::default()
        }
    }
}

impl I2cEngine for MockI2c {
    fn configure(&mut self, config: &I2cConfig) {
        self.config = Some(*config);
    }

    fn set_target(&mut self, address: u8, read: bool) {
        self.target = (address, read);
    }

    fn put_data(&mut self, byte: u8) {
        self.data_out = byte;
    }

    fn get_data(&mut self) -> u8 {
        self.data_in
    }

    fn control(&mut self, control: I2cControl) {
        if self.controls.push(control).is_err() {
            panic!("mock i2c command log full");
        }
        if self.stuck {
            return;
        }
        self.status = I2cStatus::OK;

        if control.start {
            if self.lose_arbitration {
                self.lose_arbitration = false;
                self.held = false;
                self.status = I2cStatus(I2cStatus::ARBITRATION_LOST);
                return;
            }
            self.held = true;
            self.data_count = 0;
            if !self.devices.contains(&self.target.0) {
                self.status = I2cStatus(I2cStatus::NACK);
                if control.stop {
                    self.held = false;
                }
                return;
            }
        }

        if control.run && !control.quick {
            if self.target.1 {
                self.data_in = self.rx.pop_front().unwrap_or(0xFF);
            } else if self.nack_data_at == Some(self.data_count) {
                self.status = I2cStatus(I2cStatus::NACK);
            } else if self.tx.push(self.data_out).is_err() {
                panic!("mock i2c transmit log full");
            }
            self.data_count += 1;
        }

        if control.stop {
            self.held = false;
        }
    }

    fn is_busy(&self) -> bool {
        self.stuck
    }

    fn error_flags(&self) -> I2cStatus {
        self.status
    }
}

/// Fake QSSI controller attached to a device that answers every clocked
/// word from a queue
#[derive(Debug, Default)]
pub struct MockSsi {
    pub config: Option<SsiConfig>,
    pub lane_mode: Option<LaneMode>,
    /// Words pushed, with their frame-end marker
    pub tx: Vec<(u8, bool), FIFO>,
    /// Answers clocked back by the device (0x00 once exhausted)
    pub miso: Deque<u8, FIFO>,
    /// Stop producing receive words after this many have been clocked
    pub rx_limit: Option<usize>,
    /// Transmit FIFO never drains and busy never clears
    pub stuck: bool,
    /// Frame currently held open
    pub frame_open: bool,
    /// Receive words lost to a full FIFO
    pub rx_overruns: usize,
    rx_fifo: Deque<u8, FIFO>,
    clocked: usize,
    busy_polls: Cell<u32>,
}

impl MockSsi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stuck() -> Self {
        Self {
            stuck: true,
            ..Self::default()
        }
    }

    pub fn queue_miso(&mut self, words: &[u8]) {
        for &word in words {
            if self.miso.push_back(word).is_err() {
                panic!("mock ssi answer queue full");
            }
        }
    }

    /// Leave stale words in the receive FIFO
    pub fn preload_rx(&mut self, words: &[u8]) {
        for &word in words {
            if self.rx_fifo.push_back(word).is_err() {
                panic!("mock ssi receive FIFO full");
            }
        }
    }

    /// Report busy for the next `polls` calls to `is_busy`
    pub fn busy_for(&mut self, polls: u32) {
        self.busy_polls.set(polls);
    }

    pub fn rx_pending(&self) -> usize {
        self.rx_fifo.len()
    }
}

impl SsiEngine for MockSsi {
    fn configure(&mut self, config: &SsiConfig) {
        self.config = Some(*config);
    }

    fn set_lane_mode(&mut self, mode: LaneMode) {
        self.lane_mode = Some(mode);
    }

    fn try_put(&mut self, word: u8, frame_end: bool) -> bool {
        if self.stuck || self.tx.push((word, frame_end)).is_err() {
            return false;
        }
        self.frame_open = !frame_end;

        let receives = !matches!(self.lane_mode, Some(LaneMode::QuadWrite));
        let limited = self.rx_limit.is_some_and(|limit| self.clocked >= limit);
        if receives && !limited {
            let answer = self.miso.pop_front().unwrap_or(0x00);
            if self.rx_fifo.push_back(answer).is_err() {
                self.rx_overruns += 1;
            }
        }
        self.clocked += 1;
        true
    }

    fn try_get(&mut self) -> Option<u8> {
        if self.stuck {
            return None;
        }
        self.rx_fifo.pop_front()
    }

    fn is_busy(&self) -> bool {
        if self.stuck {
            return true;
        }
        let remaining = self.busy_polls.get();
        if remaining > 0 {
            self.busy_polls.set(remaining - 1);
            return true;
        }
        false
    }
}

/// Fake UART with optional loopback
#[derive(Debug, Default)]
pub struct MockUart {
    pub config: Option<UartConfig>,
    /// Bytes transmitted
    pub tx: Vec<u8, FIFO>,
    /// Bytes waiting in the receive FIFO
    pub rx: Deque<u8, FIFO>,
    /// FIFOs frozen and busy never clears
    pub stuck: bool,
    /// Looped-back bytes lost to a full receive FIFO
    pub rx_overruns: usize,
}

impl MockUart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stuck() -> Self {
        Self {
            stuck: true,
            ..Self::default()
        }
    }

    pub fn queue_rx(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if self.rx.push_back(byte).is_err() {
                panic!("mock uart receive FIFO full");
            }
        }
    }
}

impl UartEngine for MockUart {
    fn configure(&mut self, config: &UartConfig) {
        self.config = Some(*config);
    }

    fn try_write(&mut self, byte: u8) -> bool {
        if self.stuck || self.tx.push(byte).is_err() {
            return false;
        }
        if self.config.is_some_and(|c| c.loopback) && self.rx.push_back(byte).is_err() {
            self.rx_overruns += 1;
        }
        true
    }

    fn try_read(&mut self) -> Option<u8> {
        if self.stuck {
            return None;
        }
        self.rx.pop_front()
    }

    fn is_busy(&self) -> bool {
        self.stuck
    }
}
