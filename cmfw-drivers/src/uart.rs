//! UART transactions

use cmfw_hal::bus::BusPort;
use cmfw_hal::gpio::HardwareIo;
use cmfw_hal::uart::{UartConfig, UartEngine};
use embedded_hal::delay::DelayNs;

use crate::poll::Poller;
use crate::{bring_up, InitError};

/// How many bytes a read must produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadMode {
    /// Fill the whole buffer, waiting for each byte; fewer is an error
    Exact,
    /// Take whatever is already buffered; zero bytes is fine
    Available,
}

/// Error from UART transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartError {
    /// FIFO made no progress within the poll budget
    Timeout { transferred: usize },
    /// Baud rate outside the divider range
    InvalidBaud(u32),
}

/// Blocking UART on one port
pub struct UartPort<E, D> {
    port: &'static BusPort<UartConfig>,
    engine: E,
    delay: D,
    config: UartConfig,
}

impl<E: UartEngine, D: DelayNs> UartPort<E, D> {
    pub fn new(port: &'static BusPort<UartConfig>, engine: E, delay: D) -> Self {
        Self {
            port,
            engine,
            delay,
            config: port.config,
        }
    }

    pub fn port(&self) -> &'static BusPort<UartConfig> {
        self.port
    }

    pub fn config(&self) -> UartConfig {
        self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn init<IO: HardwareIo>(&mut self, io: &mut IO) -> Result<(), InitError> {
        self.port.route_pins(io);
        bring_up(io, &mut self.delay, self.port.peripheral, self.config.timeout)?;
        self.engine.configure(&self.config);
        Ok(())
    }

    /// Change line parameters; used from the next transfer on
    pub fn reconfigure(&mut self, config: UartConfig) -> Result<(), UartError> {
        if !config.baudrate_valid() {
            return Err(UartError::InvalidBaud(config.baudrate));
        }
        self.config = config;
        self.engine.configure(&config);
        Ok(())
    }

    /// Queue every byte of `data`
    pub fn write(&mut self, data: &[u8]) -> Result<usize, UartError> {
        let mut poller = Poller::new(self.config.timeout);
        for (i, &byte) in data.iter().enumerate() {
            if !poller.wait(&mut self.delay, || self.engine.try_write(byte)) {
                #[cfg(feature = "defmt")]
                defmt::warn!("uart{=u8}: write stalled after {=usize} bytes", self.port.number, i);
                return Err(UartError::Timeout { transferred: i });
            }
        }
        Ok(data.len())
    }

    /// Read into `buf` according to `mode`; returns the byte count
    pub fn read(&mut self, buf: &mut [u8], mode: ReadMode) -> Result<usize, UartError> {
        match mode {
            ReadMode::Exact => {
                let len = buf.len();
                let mut poller = Poller::new(self.config.timeout);
                for (i, slot) in buf.iter_mut().enumerate() {
                    match poller.until(&mut self.delay, || self.engine.try_read()) {
                        Some(byte) => *slot = byte,
                        None => {
                            #[cfg(feature = "defmt")]
                            defmt::warn!(
                                "uart{=u8}: only {=usize} of {=usize} bytes received",
                                self.port.number,
                                i,
                                len
                            );
                            return Err(UartError::Timeout { transferred: i });
                        }
                    }
                }
                Ok(len)
            }
            ReadMode::Available => {
                let mut count = 0;
                while count < buf.len() {
                    match self.engine.try_read() {
                        Some(byte) => {
                            buf[count] = byte;
                            count += 1;
                        }
                        None => break,
                    }
                }
                Ok(count)
            }
        }
    }

    /// Wait until the transmitter has shifted out everything queued
    pub fn flush(&mut self) -> Result<(), UartError> {
        let mut poller = Poller::new(self.config.timeout);
        if !poller.wait(&mut self.delay, || !self.engine.is_busy()) {
            return Err(UartError::Timeout { transferred: 0 });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::CountingDelay;
    use cmfw_hal::bus::BusPin;
    use cmfw_hal::gpio::{Electrical, PeripheralId, PhysicalPin};
    use cmfw_hal::mock::{MockIo, MockUart};
    use cmfw_hal::uart::{Parity, UART_BAUD_MAX};

    static PINS: [BusPin; 2] = [
        BusPin::new(PhysicalPin::new(0xf000_080e, 0x4006_6000, 4), 0x0006_1001, Electrical::STANDARD),
        BusPin::new(PhysicalPin::new(0xf000_080e, 0x4006_6000, 5), 0x0006_1401, Electrical::STANDARD),
    ];
    static PORT: BusPort<UartConfig> = BusPort {
        number: 1,
        peripheral: PeripheralId(0xf000_1801),
        pins: &PINS,
        config: UartConfig {
            baudrate: 115_200,
            data_bits: cmfw_hal::uart::DataBits::Eight,
            parity: Parity::None,
            stop_bits: cmfw_hal::uart::StopBits::One,
            loopback: false,
            timeout: 100,
        },
    };

    fn uart(engine: MockUart) -> UartPort<MockUart, CountingDelay> {
        UartPort::new(&PORT, engine, CountingDelay::default())
    }

    #[test]
    fn test_init_applies_defaults() {
        let mut io = MockIo::new();
        let mut port = uart(MockUart::new());
        port.init(&mut io).unwrap();
        assert_eq!(port.engine().config.map(|c| c.baudrate), Some(115_200));
    }

    #[test]
    fn test_write_and_loopback_read() {
        let mut port = uart(MockUart::new());
        let mut config = port.config();
        config.loopback = true;
        port.reconfigure(config).unwrap();

        assert_eq!(port.write(b"ping"), Ok(4));
        let mut buf = [0u8; 4];
        assert_eq!(port.read(&mut buf, ReadMode::Exact), Ok(4));
        assert_eq!(&buf, b"ping");
        assert_eq!(port.flush(), Ok(()));
    }

    #[test]
    fn test_exact_read_short_is_error() {
        let mut engine = MockUart::new();
        engine.queue_rx(&[1, 2]);
        let mut port = uart(engine);
        let mut buf = [0u8; 3];
        assert_eq!(
            port.read(&mut buf, ReadMode::Exact),
            Err(UartError::Timeout { transferred: 2 })
        );
    }

    #[test]
    fn test_available_read_drains() {
        let mut engine = MockUart::new();
        engine.queue_rx(&[7, 8, 9]);
        let mut port = uart(engine);
        let mut buf = [0u8; 8];
        assert_eq!(port.read(&mut buf, ReadMode::Available), Ok(3));
        assert_eq!(&buf[..3], &[7, 8, 9]);
        assert_eq!(port.read(&mut buf, ReadMode::Available), Ok(0));
        assert_eq!(port.delay.calls, 0);
    }

    #[test]
    fn test_stuck_uart_times_out() {
        let mut port = uart(MockUart::stuck());
        let mut buf = [0u8; 2];
        assert_eq!(
            port.read(&mut buf, ReadMode::Exact),
            Err(UartError::Timeout { transferred: 0 })
        );
        assert_eq!(port.write(&[1]), Err(UartError::Timeout { transferred: 0 }));
        assert_eq!(port.flush(), Err(UartError::Timeout { transferred: 0 }));
        assert_eq!(port.read(&mut buf, ReadMode::Available), Ok(0));
    }

    #[test]
    fn test_baud_validation() {
        let mut port = uart(MockUart::new());
        let mut config = port.config();
        config.baudrate = UART_BAUD_MAX + 1;
        assert_eq!(port.reconfigure(config), Err(UartError::InvalidBaud(UART_BAUD_MAX + 1)));
        assert_eq!(port.config().baudrate, 115_200);
    }
}
