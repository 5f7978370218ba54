//! Bus port registry
//!
//! Ports are addressed by the number printed on the schematic, not by
//! position, so UART 3 is `uart_write(3, ..)` even though it is the second
//! UART in the table.

use cmfw_drivers::i2c::{I2cAccess, I2cFlags, I2cMaster, ScanMode};
use cmfw_drivers::qssi::{QssiMaster, Width};
use cmfw_drivers::uart::{ReadMode, UartPort};
use cmfw_hal::gpio::HardwareIo;
use cmfw_hal::i2c::{I2cConfig, I2cEngine};
use cmfw_hal::ssi::{SsiConfig, SsiEngine};
use cmfw_hal::uart::{UartConfig, UartEngine};
use embedded_hal::delay::DelayNs;
use heapless::Vec;

use crate::cm::{I2C_PORT_COUNT, QSSI_PORT_COUNT, UART_PORT_COUNT};
use crate::error::{BoardError, BusKind};

/// Every bus master of the board, one engine type per bus family
pub struct Buses<I, S, U, D> {
    i2c: Vec<I2cMaster<I, D>, I2C_PORT_COUNT>,
    qssi: Vec<QssiMaster<S, D>, QSSI_PORT_COUNT>,
    uart: Vec<UartPort<U, D>, UART_PORT_COUNT>,
}

impl<I, S, U, D> Default for Buses<I, S, U, D>
where
    I: I2cEngine,
    S: SsiEngine,
    U: UartEngine,
    D: DelayNs,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I, S, U, D> Buses<I, S, U, D>
where
    I: I2cEngine,
    S: SsiEngine,
    U: UartEngine,
    D: DelayNs,
{
    pub fn new() -> Self {
        Self {
            i2c: Vec::new(),
            qssi: Vec::new(),
            uart: Vec::new(),
        }
    }

    /// Register an I2C master, replacing one on the same port
    pub fn attach_i2c(&mut self, master: I2cMaster<I, D>) -> Result<(), BoardError> {
        let number = master.port().number;
        match self.i2c.iter_mut().find(|m| m.port().number == number) {
            Some(slot) => *slot = master,
            None => self
                .i2c
                .push(master)
                .map_err(|_| BoardError::RegistryFull(BusKind::I2c))?,
        }
        Ok(())
    }

    pub fn attach_qssi(&mut self, master: QssiMaster<S, D>) -> Result<(), BoardError> {
        let number = master.port().number;
        match self.qssi.iter_mut().find(|m| m.port().number == number) {
            Some(slot) => *slot = master,
            None => self
                .qssi
                .push(master)
                .map_err(|_| BoardError::RegistryFull(BusKind::Qssi))?,
        }
        Ok(())
    }

    pub fn attach_uart(&mut self, port: UartPort<U, D>) -> Result<(), BoardError> {
        let number = port.port().number;
        match self.uart.iter_mut().find(|p| p.port().number == number) {
            Some(slot) => *slot = port,
            None => self
                .uart
                .push(port)
                .map_err(|_| BoardError::RegistryFull(BusKind::Uart))?,
        }
        Ok(())
    }

    /// Bring up every attached port.
    ///
    /// A port that fails does not stop the others; the first failure is
    /// returned.
    pub fn init<IO: HardwareIo>(&mut self, io: &mut IO) -> Result<(), BoardError> {
        let mut first = None;
        for master in self.i2c.iter_mut() {
            if let Err(e) = master.init(io) {
                first.get_or_insert(e);
            }
        }
        for master in self.qssi.iter_mut() {
            if let Err(e) = master.init(io) {
                first.get_or_insert(e);
            }
        }
        for port in self.uart.iter_mut() {
            if let Err(e) = port.init(io) {
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Port numbers of the attached I2C masters
    pub fn i2c_ports(&self) -> impl Iterator<Item = u8> + '_ {
        self.i2c.iter().map(|m| m.port().number)
    }

    pub fn i2c(&mut self, port: u8) -> Result<&mut I2cMaster<I, D>, BoardError> {
        self.i2c
            .iter_mut()
            .find(|m| m.port().number == port)
            .ok_or(BoardError::InvalidPort {
                bus: BusKind::I2c,
                port,
            })
    }

    pub fn qssi(&mut self, port: u8) -> Result<&mut QssiMaster<S, D>, BoardError> {
        self.qssi
            .iter_mut()
            .find(|m| m.port().number == port)
            .ok_or(BoardError::InvalidPort {
                bus: BusKind::Qssi,
                port,
            })
    }

    pub fn uart(&mut self, port: u8) -> Result<&mut UartPort<U, D>, BoardError> {
        self.uart
            .iter_mut()
            .find(|p| p.port().number == port)
            .ok_or(BoardError::InvalidPort {
                bus: BusKind::Uart,
                port,
            })
    }

    pub fn i2c_write(
        &mut self,
        port: u8,
        address: u8,
        data: &[u8],
        flags: I2cFlags,
    ) -> Result<usize, BoardError> {
        Ok(self.i2c(port)?.write(address, data, flags)?)
    }

    pub fn i2c_read(
        &mut self,
        port: u8,
        address: u8,
        buf: &mut [u8],
        flags: I2cFlags,
    ) -> Result<usize, BoardError> {
        Ok(self.i2c(port)?.read(address, buf, flags)?)
    }

    pub fn i2c_quick(&mut self, port: u8, address: u8, read: bool, flags: I2cFlags) -> Result<(), BoardError> {
        self.i2c(port)?.quick_command(address, read, flags)?;
        Ok(())
    }

    /// Transfer driven by an access-mode nibble; `buf` is the write data
    /// or the read destination
    pub fn i2c_transfer(
        &mut self,
        port: u8,
        address: u8,
        access: I2cAccess,
        buf: &mut [u8],
    ) -> Result<usize, BoardError> {
        Ok(self.i2c(port)?.transfer(address, access, buf)?)
    }

    /// Addresses that answered a probe
    pub fn i2c_detect(&mut self, port: u8, mode: ScanMode) -> Result<Vec<u8, 128>, BoardError> {
        let found = self.i2c(port)?.scan(mode);
        #[cfg(feature = "defmt")]
        defmt::info!("i2c{=u8}: {=usize} devices found", port, found.len());
        Ok(found)
    }

    pub fn configure_i2c(&mut self, port: u8, config: I2cConfig) -> Result<(), BoardError> {
        Ok(self.i2c(port)?.reconfigure(config)?)
    }

    pub fn qssi_write(
        &mut self,
        port: u8,
        data: &[u8],
        width: Width,
        frame_end: bool,
    ) -> Result<usize, BoardError> {
        Ok(self.qssi(port)?.write(data, width, frame_end)?)
    }

    /// Returns the number of words captured, which may be short
    pub fn qssi_read(
        &mut self,
        port: u8,
        buf: &mut [u8],
        width: Width,
        frame_end: bool,
    ) -> Result<usize, BoardError> {
        Ok(self.qssi(port)?.read(buf, width, frame_end)?)
    }

    pub fn configure_qssi(&mut self, port: u8, config: SsiConfig) -> Result<(), BoardError> {
        Ok(self.qssi(port)?.reconfigure(config)?)
    }

    pub fn uart_write(&mut self, port: u8, data: &[u8]) -> Result<usize, BoardError> {
        Ok(self.uart(port)?.write(data)?)
    }

    pub fn uart_read(&mut self, port: u8, buf: &mut [u8], mode: ReadMode) -> Result<usize, BoardError> {
        Ok(self.uart(port)?.read(buf, mode)?)
    }

    pub fn configure_uart(&mut self, port: u8, config: UartConfig) -> Result<(), BoardError> {
        Ok(self.uart(port)?.reconfigure(config)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cm::{I2C_PORTS, QSSI_PORTS, UART_PORTS};
    use cmfw_drivers::i2c::I2cError;
    use cmfw_drivers::qssi::{QssiError, QSSI_FREQ_MAX};
    use cmfw_drivers::uart::UartError;
    use cmfw_hal::i2c::I2cStatus;
    use cmfw_hal::mock::{MockI2c, MockIo, MockSsi, MockUart};
    use cmfw_hal::uart::{Parity, UART_BAUD_MIN};

    #[derive(Debug, Clone, Copy, Default)]
    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    type TestBuses = Buses<MockI2c, MockSsi, MockUart, NoDelay>;

    fn buses() -> TestBuses {
        let mut buses = TestBuses::new();
        for port in I2C_PORTS.iter() {
            let engine = match port.number {
                // Power module bus: two LTC2977 and two LTM4700
                1 => MockI2c::with_devices(&[0x40, 0x41, 0x5C, 0x5D]),
                _ => MockI2c::new(),
            };
            buses.attach_i2c(I2cMaster::new(port, engine, NoDelay)).unwrap();
        }
        for port in QSSI_PORTS.iter() {
            buses.attach_qssi(QssiMaster::new(port, MockSsi::new(), NoDelay)).unwrap();
        }
        for port in UART_PORTS.iter() {
            buses.attach_uart(UartPort::new(port, MockUart::new(), NoDelay)).unwrap();
        }
        buses
    }

    #[test]
    fn test_init_enables_every_controller() {
        let mut io = MockIo::new();
        let mut buses = buses();
        buses.init(&mut io).unwrap();
        for port in I2C_PORTS.iter() {
            assert!(io.is_enabled(port.peripheral));
            for pin in port.pins {
                assert!(io.is_alternate(pin.pin.port, pin.pin.mask));
            }
        }
        assert!(io.is_enabled(QSSI_PORTS[0].peripheral));
        assert!(io.is_enabled(UART_PORTS[2].peripheral));
    }

    #[test]
    fn test_init_continues_past_failed_port() {
        let mut io = MockIo::new();
        io.hold_in_reset(I2C_PORTS[1].peripheral);
        let mut buses = buses();
        assert_eq!(
            buses.init(&mut io),
            Err(BoardError::Init(cmfw_drivers::InitError::NotReady(
                I2C_PORTS[1].peripheral
            )))
        );
        assert!(io.is_enabled(UART_PORTS[2].peripheral));
    }

    #[test]
    fn test_ports_addressed_by_number() {
        let mut buses = buses();
        assert_eq!(buses.i2c_ports().collect::<std::vec::Vec<_>>(), [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(
            buses.i2c_write(9, 0x40, &[0], I2cFlags::default()),
            Err(BoardError::InvalidPort { bus: BusKind::I2c, port: 9 })
        );
        assert_eq!(
            buses.uart_write(2, b"x"),
            Err(BoardError::InvalidPort { bus: BusKind::Uart, port: 2 })
        );
        assert_eq!(buses.uart_write(3, b"x"), Ok(1));
        assert_eq!(buses.uart(3).unwrap().engine().tx.as_slice(), b"x");
    }

    #[test]
    fn test_detect_power_module_bus() {
        let mut buses = buses();
        let found = buses.i2c_detect(1, ScanMode::Auto).unwrap();
        assert_eq!(found.as_slice(), &[0x40, 0x41, 0x5C, 0x5D]);
        assert!(buses.i2c_detect(2, ScanMode::Quick).unwrap().is_empty());
    }

    #[test]
    fn test_i2c_access_nibble() {
        let mut buses = buses();
        buses.i2c(1).unwrap().engine_mut().queue_rx(&[0x12, 0x34]);

        // Register pointer write, bus kept, then repeated-start read
        let mut pointer = [0x8B];
        let write = I2cAccess::from_bits(I2cAccess::NO_STOP);
        assert_eq!(buses.i2c_transfer(1, 0x40, write, &mut pointer), Ok(1));
        let mut data = [0u8; 2];
        let read = I2cAccess::from_bits(I2cAccess::READ | I2cAccess::REPEATED_START);
        assert_eq!(buses.i2c_transfer(1, 0x40, read, &mut data), Ok(2));
        assert_eq!(data, [0x12, 0x34]);

        assert_eq!(buses.i2c_quick(1, 0x41, false, I2cFlags::default()), Ok(()));
        let err = buses.i2c_quick(1, 0x42, false, I2cFlags::default()).unwrap_err();
        assert_eq!(
            err,
            BoardError::I2c(I2cError::Bus {
                status: I2cStatus(I2cStatus::NACK),
                transferred: 0
            })
        );
    }

    #[test]
    fn test_configure_validates_ranges() {
        let mut buses = buses();

        let mut i2c = I2cConfig::FAST;
        assert_eq!(buses.configure_i2c(4, i2c), Ok(()));
        i2c.frequency = 0;
        assert!(matches!(
            buses.configure_i2c(4, i2c),
            Err(BoardError::I2c(I2cError::InvalidFrequency(0)))
        ));

        let mut ssi = QSSI_PORTS[0].config;
        ssi.frequency = QSSI_FREQ_MAX + 1;
        assert_eq!(
            buses.configure_qssi(1, ssi),
            Err(BoardError::Qssi(QssiError::InvalidFrequency(QSSI_FREQ_MAX + 1)))
        );

        let mut uart = UART_PORTS[0].config;
        uart.baudrate = UART_BAUD_MIN - 1;
        assert_eq!(
            buses.configure_uart(1, uart),
            Err(BoardError::Uart(UartError::InvalidBaud(UART_BAUD_MIN - 1)))
        );
        uart.baudrate = 9_600;
        uart.parity = Parity::from_name("zero").unwrap();
        uart.loopback = true;
        assert_eq!(buses.configure_uart(1, uart), Ok(()));
        assert_eq!(buses.uart_write(1, b"hi"), Ok(2));
        let mut echo = [0u8; 2];
        assert_eq!(buses.uart_read(1, &mut echo, ReadMode::Exact), Ok(2));
        assert_eq!(&echo, b"hi");
    }

    #[test]
    fn test_qssi_flash_id() {
        let mut buses = buses();
        buses.qssi(1).unwrap().engine_mut().queue_miso(&[0xFF, 0xEF, 0x40, 0x18]);

        assert_eq!(buses.qssi_write(1, &[0x9F], Width::Single, false), Ok(1));
        let mut id = [0u8; 3];
        assert_eq!(buses.qssi_read(1, &mut id, Width::Single, true), Ok(3));
        assert_eq!(id, [0xEF, 0x40, 0x18]);
    }

    #[test]
    fn test_stuck_bus_times_out() {
        let mut buses = buses();
        buses
            .attach_uart(UartPort::new(&UART_PORTS[0], MockUart::stuck(), NoDelay))
            .unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(
            buses.uart_read(1, &mut buf, ReadMode::Exact),
            Err(BoardError::Uart(UartError::Timeout { transferred: 0 }))
        );
    }
}
