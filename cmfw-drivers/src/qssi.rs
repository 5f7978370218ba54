//! QSSI master transactions
//!
//! The controller runs with frame hold enabled. A transfer with
//! `frame_end` set closes the frame after its last word and waits for the
//! controller to go idle; without it the frame stays open so the next
//! call continues the same frame (command, address, then data).
//!
//! Writes in single-lane mode are full duplex, so the words clocked back
//! are discarded. Reads clock out `0x00` fillers and capture whatever the
//! device sends, one word per filler.

use cmfw_hal::bus::BusPort;
use cmfw_hal::gpio::HardwareIo;
use cmfw_hal::ssi::{LaneMode, SsiConfig, SsiEngine};
use embedded_hal::delay::DelayNs;

use crate::poll::Poller;
use crate::{bring_up, InitError};

/// Lowest accepted bit rate
pub const QSSI_FREQ_MIN: u32 = 1_000;
/// Highest accepted bit rate
pub const QSSI_FREQ_MAX: u32 = 60_000_000;

/// Word clocked out while reading
const FILLER: u8 = 0x00;

/// Number of data lanes for a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Width {
    Single,
    Quad,
}

impl Width {
    /// Mode word bit 0 selects quad lanes
    pub fn from_mode(mode: u8) -> Self {
        if mode & 0x01 != 0 {
            Width::Quad
        } else {
            Width::Single
        }
    }
}

/// Error from QSSI transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QssiError {
    /// Zero-length transfer
    Empty,
    /// Transmit FIFO stayed full or the controller stayed busy
    Timeout { transferred: usize },
    /// Bit rate outside the supported range
    InvalidFrequency(u32),
}

/// Blocking QSSI master on one port
pub struct QssiMaster<E, D> {
    port: &'static BusPort<SsiConfig>,
    engine: E,
    delay: D,
    config: SsiConfig,
}

impl<E: SsiEngine, D: DelayNs> QssiMaster<E, D> {
    pub fn new(port: &'static BusPort<SsiConfig>, engine: E, delay: D) -> Self {
        Self {
            port,
            engine,
            delay,
            config: port.config,
        }
    }

    pub fn port(&self) -> &'static BusPort<SsiConfig> {
        self.port
    }

    pub fn config(&self) -> SsiConfig {
        self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Route pins, cycle the controller and apply the port defaults
    pub fn init<IO: HardwareIo>(&mut self, io: &mut IO) -> Result<(), InitError> {
        self.port.route_pins(io);
        bring_up(io, &mut self.delay, self.port.peripheral, self.config.timeout)?;
        self.engine.configure(&self.config);
        self.engine.set_lane_mode(LaneMode::ReadWrite);
        Ok(())
    }

    /// Change bus parameters; used from the next transaction on
    pub fn reconfigure(&mut self, config: SsiConfig) -> Result<(), QssiError> {
        if !(QSSI_FREQ_MIN..=QSSI_FREQ_MAX).contains(&config.frequency) {
            return Err(QssiError::InvalidFrequency(config.frequency));
        }
        self.config = config;
        self.engine.configure(&config);
        Ok(())
    }

    /// Clock out `data`; returns the number of words sent
    pub fn write(&mut self, data: &[u8], width: Width, frame_end: bool) -> Result<usize, QssiError> {
        if data.is_empty() {
            return Err(QssiError::Empty);
        }
        let duplex = width == Width::Single;
        self.engine.set_lane_mode(match width {
            Width::Single => LaneMode::ReadWrite,
            Width::Quad => LaneMode::QuadWrite,
        });

        let mut poller = Poller::new(self.config.timeout);
        for (i, &word) in data.iter().enumerate() {
            let end = frame_end && i + 1 == data.len();
            if !poller.wait(&mut self.delay, || self.engine.try_put(word, end)) {
                return Err(self.timeout("write", i));
            }
            if duplex {
                self.discard_rx();
            }
        }

        if frame_end && !poller.wait(&mut self.delay, || !self.engine.is_busy()) {
            return Err(self.timeout("write", data.len()));
        }
        if duplex {
            self.discard_rx();
        }
        Ok(data.len())
    }

    /// Clock fillers and capture the answer into `buf`.
    ///
    /// Returns how many words were captured, which is short when the
    /// device stops answering. Only a full transmit FIFO or a controller
    /// stuck busy is an error.
    pub fn read(&mut self, buf: &mut [u8], width: Width, frame_end: bool) -> Result<usize, QssiError> {
        if buf.is_empty() {
            return Err(QssiError::Empty);
        }
        self.engine.set_lane_mode(match width {
            Width::Single => LaneMode::ReadWrite,
            Width::Quad => LaneMode::QuadRead,
        });
        // Words left over from an earlier duplex transfer
        self.discard_rx();

        let len = buf.len();
        let mut poller = Poller::new(self.config.timeout);
        let mut count = 0;
        let mut stalled = false;
        for i in 0..len {
            let end = frame_end && i + 1 == len;
            if !poller.wait(&mut self.delay, || self.engine.try_put(FILLER, end)) {
                return Err(self.timeout("read", count));
            }
            let word = if stalled {
                self.engine.try_get()
            } else {
                poller.until(&mut self.delay, || self.engine.try_get())
            };
            match word {
                Some(word) => {
                    buf[count] = word;
                    count += 1;
                }
                // Keep clocking so the frame still ends where requested
                None => stalled = true,
            }
        }

        if frame_end && !poller.wait(&mut self.delay, || !self.engine.is_busy()) {
            return Err(self.timeout("read", count));
        }
        while count < len {
            match self.engine.try_get() {
                Some(word) => {
                    buf[count] = word;
                    count += 1;
                }
                None => break,
            }
        }

        #[cfg(feature = "defmt")]
        if count < len {
            defmt::warn!("qssi{=u8}: read {=usize} of {=usize} words", self.port.number, count, len);
        }
        Ok(count)
    }

    fn discard_rx(&mut self) {
        while self.engine.try_get().is_some() {}
    }

    fn timeout(&self, _op: &'static str, transferred: usize) -> QssiError {
        #[cfg(feature = "defmt")]
        defmt::warn!(
            "qssi{=u8}: {=str} timeout after {=usize} words",
            self.port.number,
            _op,
            transferred
        );
        QssiError::Timeout { transferred }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::MIN_POLLS;
    use crate::test_util::CountingDelay;
    use cmfw_hal::bus::BusPin;
    use cmfw_hal::gpio::{Electrical, PeripheralId, PhysicalPin};
    use cmfw_hal::mock::{MockIo, MockSsi};

    static PINS: [BusPin; 1] = [BusPin::new(
        PhysicalPin::new(0xf000_0805, 0x4005_D000, 2),
        0x0005_080F,
        Electrical::STANDARD,
    )];
    static PORT: BusPort<SsiConfig> = BusPort {
        number: 1,
        peripheral: PeripheralId(0xf000_1C01),
        pins: &PINS,
        config: SsiConfig {
            frequency: 1_000_000,
            mode: cmfw_hal::ssi::Mode::Mode0,
            timeout: 100,
        },
    };

    fn master(engine: MockSsi) -> QssiMaster<MockSsi, CountingDelay> {
        QssiMaster::new(&PORT, engine, CountingDelay::default())
    }

    #[test]
    fn test_init() {
        let mut io = MockIo::new();
        let mut qssi = master(MockSsi::new());
        qssi.init(&mut io).unwrap();
        assert_eq!(qssi.engine().lane_mode, Some(LaneMode::ReadWrite));
        assert!(qssi.engine().config.is_some());
    }

    #[test]
    fn test_write_marks_frame_end_on_last_word() {
        let mut qssi = master(MockSsi::new());
        assert_eq!(qssi.write(&[0x9F, 0x00, 0x01], Width::Single, true), Ok(3));
        assert_eq!(
            qssi.engine().tx.as_slice(),
            &[(0x9F, false), (0x00, false), (0x01, true)]
        );
        assert!(!qssi.engine().frame_open);
        // Duplex answers discarded
        assert_eq!(qssi.engine().rx_pending(), 0);
    }

    #[test]
    fn test_held_frame_spans_calls() {
        let mut engine = MockSsi::new();
        engine.queue_miso(&[0xFF, 0xEF, 0x40, 0x18]);
        let mut qssi = master(engine);

        qssi.write(&[0x9F], Width::Single, false).unwrap();
        assert!(qssi.engine().frame_open);

        let mut id = [0u8; 3];
        assert_eq!(qssi.read(&mut id, Width::Single, true), Ok(3));
        assert_eq!(id, [0xEF, 0x40, 0x18]);
        assert!(!qssi.engine().frame_open);
    }

    #[test]
    fn test_quad_write_sets_lanes() {
        let mut qssi = master(MockSsi::new());
        qssi.write(&[1, 2, 3, 4], Width::from_mode(0x01), true).unwrap();
        assert_eq!(qssi.engine().lane_mode, Some(LaneMode::QuadWrite));
    }

    #[test]
    fn test_read_flushes_stale_words() {
        let mut engine = MockSsi::new();
        engine.preload_rx(&[0xDE, 0xAD]);
        engine.queue_miso(&[0x11, 0x22]);
        let mut qssi = master(engine);

        let mut buf = [0u8; 2];
        assert_eq!(qssi.read(&mut buf, Width::Quad, true), Ok(2));
        assert_eq!(buf, [0x11, 0x22]);
        assert_eq!(qssi.engine().lane_mode, Some(LaneMode::QuadRead));
    }

    #[test]
    fn test_short_read_returns_count_and_closes_frame() {
        let mut engine = MockSsi::new();
        engine.queue_miso(&[0x01, 0x02]);
        engine.rx_limit = Some(2);
        let mut qssi = master(engine);

        let mut buf = [0u8; 5];
        assert_eq!(qssi.read(&mut buf, Width::Single, true), Ok(2));
        assert_eq!(&buf[..2], &[0x01, 0x02]);
        // Every filler still clocked, last one ends the frame
        assert_eq!(qssi.engine().tx.len(), 5);
        assert!(!qssi.engine().frame_open);
        // Only one budget spent waiting on the silent device
        let budget = PORT.config.timeout + MIN_POLLS;
        assert_eq!(qssi.delay.calls, budget);
    }

    #[test]
    fn test_busy_within_budget_is_not_a_timeout() {
        let mut engine = MockSsi::new();
        engine.busy_for(50);
        let mut qssi = master(engine);
        assert_eq!(qssi.write(&[0xAB], Width::Single, true), Ok(1));
    }

    #[test]
    fn test_stuck_controller_times_out() {
        let mut qssi = master(MockSsi::stuck());
        let mut buf = [0u8; 8];
        assert_eq!(
            qssi.read(&mut buf, Width::Single, true),
            Err(QssiError::Timeout { transferred: 0 })
        );
        assert_eq!(
            qssi.write(&[1, 2], Width::Quad, true),
            Err(QssiError::Timeout { transferred: 0 })
        );
    }

    #[test]
    fn test_frequency_range() {
        let mut qssi = master(MockSsi::new());
        let mut config = PORT.config;
        config.frequency = QSSI_FREQ_MAX + 1;
        assert_eq!(
            qssi.reconfigure(config),
            Err(QssiError::InvalidFrequency(QSSI_FREQ_MAX + 1))
        );
        config.frequency = 25_000_000;
        assert_eq!(qssi.reconfigure(config), Ok(()));
        assert_eq!(qssi.config().frequency, 25_000_000);
    }

    #[test]
    fn test_empty_transfers_rejected() {
        let mut qssi = master(MockSsi::new());
        assert_eq!(qssi.write(&[], Width::Single, true), Err(QssiError::Empty));
        assert_eq!(qssi.read(&mut [], Width::Single, true), Err(QssiError::Empty));
    }
}
