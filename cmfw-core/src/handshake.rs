//! SM-CM power handshake
//!
//! The Service Module requests power through a level on the request line
//! and waits for the ready line. The work is split in two halves:
//!
//! - [`RequestLine::on_edge`] runs in interrupt context. It acknowledges
//!   the edge, samples the level and posts a [`PowerRequest`] into a
//!   single-slot mailbox. It never touches the power-control group.
//! - [`Handshake::service`] runs in the power owner. It sequences the
//!   domains, drives the ready line and refreshes the status LEDs.
//!
//! The mailbox keeps only the newest request: if the line toggles twice
//! before the owner runs, the owner acts on the latest level.

use cmfw_hal::gpio::HardwareIo;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;

use crate::power::{DomainState, PowerController, PowerDomain, PowerError, PowerStatus};
use crate::signal::{SignalError, SignalGroup};

/// Status LED bits
pub mod status {
    /// Temperature alert (no sensor is wired, always clear)
    pub const TEMP_ALERT: u32 = 0x01;
    /// Every domain reads fully on
    pub const POWER_ON: u32 = 0x02;
    /// Power-control group partially on at rest
    pub const INCONSISTENT: u32 = 0x04;
}

/// Domains re-confirmed one by one after a full power-up
const RECONFIRM: [PowerDomain; 3] = [
    PowerDomain::ClockMisc,
    PowerDomain::Fpga,
    PowerDomain::FireFly,
];

/// Requested power state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerRequest {
    Up,
    Down,
}

impl PowerRequest {
    pub fn from_level(asserted: bool) -> Self {
        if asserted {
            PowerRequest::Up
        } else {
            PowerRequest::Down
        }
    }
}

/// Single-slot request mailbox shared between interrupt and owner
pub type RequestMailbox<M> = Signal<M, PowerRequest>;

/// Interrupt-side half: the power request input
#[derive(Debug)]
pub struct RequestLine {
    group: SignalGroup,
}

impl RequestLine {
    pub fn new(group: SignalGroup) -> Self {
        Self { group }
    }

    pub fn group(&self) -> &SignalGroup {
        &self.group
    }

    /// Configure the input and arm its edge interrupt
    pub fn init<IO: HardwareIo>(&mut self, io: &mut IO) -> Result<(), SignalError> {
        self.group.init(io);
        self.group.arm_interrupt(io)
    }

    /// Current request level, for syncing at boot
    pub fn sample<IO: HardwareIo>(&self, io: &IO) -> PowerRequest {
        PowerRequest::from_level(self.group.get_input(io) != 0)
    }

    /// Acknowledge this line's edge and sample the level.
    ///
    /// Returns `None` when the interrupt belonged to another pin.
    pub fn on_edge<IO: HardwareIo>(&self, io: &mut IO) -> Option<PowerRequest> {
        if !self.group.take_interrupt(io) {
            return None;
        }
        Some(self.sample(io))
    }

    /// [`Self::on_edge`] posting straight into the mailbox
    pub fn on_edge_into<IO: HardwareIo, M: RawMutex>(
        &self,
        io: &mut IO,
        mailbox: &RequestMailbox<M>,
    ) -> Option<PowerRequest> {
        let request = self.on_edge(io)?;
        mailbox.signal(request);
        Some(request)
    }
}

/// Error from servicing a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandshakeError {
    /// Ready line did not read back as driven
    Ready(SignalError),
    /// Status LEDs did not read back as driven
    Status(SignalError),
    /// Power-control group could not be queried
    Power(PowerError),
}

/// What servicing a request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HandshakeReport {
    pub request: PowerRequest,
    /// State of all domains after sequencing
    pub power: PowerStatus,
    /// Level driven on the ready line
    pub ready: bool,
    /// First sequencing failure, if any
    pub fault: Option<PowerError>,
}

/// Owner-side half: ready line and status LEDs
#[derive(Debug)]
pub struct Handshake {
    ready: SignalGroup,
    status: Option<SignalGroup>,
}

impl Handshake {
    pub fn new(ready: SignalGroup, status: Option<SignalGroup>) -> Self {
        Self { ready, status }
    }

    pub fn ready_line(&self) -> &SignalGroup {
        &self.ready
    }

    pub fn status_leds(&self) -> Option<&SignalGroup> {
        self.status.as_ref()
    }

    pub fn init<IO: HardwareIo>(&mut self, io: &mut IO) {
        self.ready.init(io);
        if let Some(status) = self.status.as_mut() {
            status.init(io);
        }
    }

    /// Level currently on the ready line
    pub fn ready<IO: HardwareIo>(&self, io: &IO) -> Result<bool, SignalError> {
        Ok(self.ready.get_output(io)? != 0)
    }

    /// Take the pending request, if any, and service it
    pub fn service_pending<IO: HardwareIo, M: RawMutex>(
        &self,
        io: &mut IO,
        power: &mut PowerController,
        mailbox: &RequestMailbox<M>,
    ) -> Option<Result<HandshakeReport, HandshakeError>> {
        mailbox
            .try_take()
            .map(|request| self.service(io, power, request))
    }

    /// Sequence the domains for a request and drive the ready line.
    ///
    /// Power-up runs the full sequence and then re-confirms each domain so
    /// one failed step inside the full sequence does not leave later
    /// domains untried. Ready follows the request: raised after power-up,
    /// dropped after power-down, even when a step failed. Failures show in
    /// the report and on the INCONSISTENT LED.
    pub fn service<IO: HardwareIo>(
        &self,
        io: &mut IO,
        power: &mut PowerController,
        request: PowerRequest,
    ) -> Result<HandshakeReport, HandshakeError> {
        let on = request == PowerRequest::Up;
        let mut fault = power.set(io, PowerDomain::All, on).err();

        if on {
            for domain in RECONFIRM {
                if let Err(e) = power.set(io, domain, true) {
                    fault.get_or_insert(e);
                }
            }
        }

        let status = power
            .get(io, PowerDomain::All)
            .map_err(HandshakeError::Power)?;
        let ready = on;

        #[cfg(feature = "defmt")]
        match fault {
            Some(e) => defmt::warn!("handshake: {} finished with {}, ready={}", request, e, ready),
            None => defmt::info!("handshake: {} done, power {=u32:#x}", request, status.raw),
        }

        self.ready
            .set_verified(io, ready as u32)
            .map_err(HandshakeError::Ready)?;
        self.refresh_status(io, &status)?;

        Ok(HandshakeReport {
            request,
            power: status,
            ready,
            fault,
        })
    }

    /// Show the power state on the status LEDs
    pub fn refresh_status<IO: HardwareIo>(
        &self,
        io: &mut IO,
        power: &PowerStatus,
    ) -> Result<(), HandshakeError> {
        let Some(leds) = self.status.as_ref() else {
            return Ok(());
        };
        let mut value = 0;
        if power.state == DomainState::On {
            value |= status::POWER_ON;
        }
        if power.is_inconsistent() {
            value |= status::INCONSISTENT;
        }
        value &= !status::TEMP_ALERT;
        leds.set_verified(io, value).map_err(HandshakeError::Status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power::{mask, Rail};
    use crate::signal::SignalGroupConfig;
    use cmfw_hal::gpio::{EdgeTrigger, Electrical, PhysicalPin, PortBase};
    use cmfw_hal::mock::MockIo;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    const PORT_K: u32 = 0x4006_1000;
    const PORT_N: u32 = 0x4006_4000;
    const PORT_Q: u32 = 0x4006_6000;

    static POWER_PINS: [PhysicalPin; 8] = [
        PhysicalPin::new(9, PORT_K, 0),
        PhysicalPin::new(9, PORT_K, 1),
        PhysicalPin::new(9, PORT_K, 2),
        PhysicalPin::new(9, PORT_K, 3),
        PhysicalPin::new(14, PORT_Q, 0),
        PhysicalPin::new(14, PORT_Q, 2),
        PhysicalPin::new(14, PORT_Q, 3),
        PhysicalPin::new(14, PORT_Q, 6),
    ];
    static POWER_CTRL: SignalGroupConfig = SignalGroupConfig::output("power-ctrl", &POWER_PINS);

    static REQUEST_PINS: [PhysicalPin; 1] = [PhysicalPin::new(12, PORT_N, 3)];
    static REQUEST: SignalGroupConfig = SignalGroupConfig::input("sm-pwr-en", &REQUEST_PINS)
        .with_electrical(Electrical::WEAK_PULL_DOWN)
        .with_trigger(EdgeTrigger::Both);

    static READY_PINS: [PhysicalPin; 1] = [PhysicalPin::new(12, PORT_N, 2)];
    static READY: SignalGroupConfig = SignalGroupConfig::output("cm-ready", &READY_PINS);

    static STATUS_PINS: [PhysicalPin; 3] = [
        PhysicalPin::new(12, PORT_N, 4),
        PhysicalPin::new(12, PORT_N, 5),
        PhysicalPin::new(12, PORT_N, 6),
    ];
    static STATUS: SignalGroupConfig = SignalGroupConfig::output("led-status", &STATUS_PINS);

    struct Rig {
        io: MockIo,
        power: PowerController,
        line: RequestLine,
        handshake: Handshake,
        mailbox: RequestMailbox<NoopRawMutex>,
    }

    fn rig() -> Rig {
        let mut io = MockIo::new();
        let mut power = PowerController::new(SignalGroup::new(&POWER_CTRL));
        let mut line = RequestLine::new(SignalGroup::new(&REQUEST));
        let mut handshake = Handshake::new(
            SignalGroup::new(&READY),
            Some(SignalGroup::new(&STATUS)),
        );
        power.init(&mut io);
        line.init(&mut io).unwrap();
        handshake.init(&mut io);
        Rig {
            io,
            power,
            line,
            handshake,
            mailbox: Signal::new(),
        }
    }

    fn drive_request(rig: &mut Rig, high: bool) {
        rig.io.drive_input(PortBase(PORT_N), 0x08, if high { 0x08 } else { 0 });
    }

    fn leds(rig: &Rig) -> u32 {
        SignalGroup::new(&STATUS).get_output(&rig.io).unwrap()
    }

    #[test]
    fn test_rising_edge_powers_up_and_raises_ready() {
        let mut rig = rig();
        drive_request(&mut rig, true);
        assert_eq!(
            rig.line.on_edge_into(&mut rig.io, &rig.mailbox),
            Some(PowerRequest::Up)
        );
        // Interrupt half never touches power control
        assert_eq!(rig.power.raw(&rig.io).unwrap(), 0);

        let report = rig
            .handshake
            .service_pending(&mut rig.io, &mut rig.power, &rig.mailbox)
            .unwrap()
            .unwrap();
        assert_eq!(report.request, PowerRequest::Up);
        assert!(report.ready);
        assert_eq!(report.fault, None);
        assert_eq!(report.power.raw, mask::ALL);
        assert!(rig.handshake.ready(&rig.io).unwrap());
        assert_eq!(leds(&rig), status::POWER_ON);
    }

    #[test]
    fn test_falling_edge_powers_down_and_drops_ready() {
        let mut rig = rig();
        drive_request(&mut rig, true);
        rig.line.on_edge_into(&mut rig.io, &rig.mailbox);
        rig.handshake
            .service_pending(&mut rig.io, &mut rig.power, &rig.mailbox)
            .unwrap()
            .unwrap();

        drive_request(&mut rig, false);
        assert_eq!(
            rig.line.on_edge_into(&mut rig.io, &rig.mailbox),
            Some(PowerRequest::Down)
        );
        let report = rig
            .handshake
            .service_pending(&mut rig.io, &mut rig.power, &rig.mailbox)
            .unwrap()
            .unwrap();
        assert!(!report.ready);
        assert_eq!(report.power.state, DomainState::Off);

        let down: std::vec::Vec<Rail> = rig
            .power
            .last_transition()
            .unwrap()
            .steps
            .iter()
            .map(|s| s.rail)
            .collect();
        assert_eq!(
            down,
            [Rail::FireFly, Rail::FpgaIo, Rail::FpgaCore, Rail::ClockMisc]
        );
        assert!(!rig.handshake.ready(&rig.io).unwrap());
        assert_eq!(leds(&rig), 0);
    }

    #[test]
    fn test_latest_request_wins() {
        let mut rig = rig();
        drive_request(&mut rig, true);
        rig.line.on_edge_into(&mut rig.io, &rig.mailbox);
        drive_request(&mut rig, false);
        rig.line.on_edge_into(&mut rig.io, &rig.mailbox);

        let report = rig
            .handshake
            .service_pending(&mut rig.io, &mut rig.power, &rig.mailbox)
            .unwrap()
            .unwrap();
        assert_eq!(report.request, PowerRequest::Down);
        assert!(rig
            .handshake
            .service_pending(&mut rig.io, &mut rig.power, &rig.mailbox)
            .is_none());
    }

    #[test]
    fn test_foreign_interrupt_ignored() {
        let mut rig = rig();
        rig.io.enable_interrupt(PortBase(PORT_N), 0x01);
        rig.io.raise_interrupt(PortBase(PORT_N), 0x01);
        assert_eq!(rig.line.on_edge_into(&mut rig.io, &rig.mailbox), None);
        assert_eq!(rig.io.interrupt_status(PortBase(PORT_N)), 0x01);
        assert!(rig
            .handshake
            .service_pending(&mut rig.io, &mut rig.power, &rig.mailbox)
            .is_none());
    }

    #[test]
    fn test_stuck_rail_still_raises_ready() {
        let mut rig = rig();
        // FireFly enable stuck low
        rig.io.stick_low(PortBase(PORT_K), 0x08);

        let report = rig
            .handshake
            .service(&mut rig.io, &mut rig.power, PowerRequest::Up)
            .unwrap();
        assert!(report.ready);
        assert!(matches!(
            report.fault,
            Some(PowerError::Verify {
                rail: Rail::FireFly,
                ..
            })
        ));
        assert_eq!(report.power.state, DomainState::Partial);
        assert!(rig.handshake.ready(&rig.io).unwrap());
        assert_eq!(leds(&rig), status::INCONSISTENT);
    }

    #[test]
    fn test_reconfirm_reaches_domains_after_failure() {
        let mut rig = rig();
        // FPGA I/O enable stuck low: the full sequence stops before FireFly
        rig.io.stick_low(PortBase(PORT_K), 0x02);

        let report = rig
            .handshake
            .service(&mut rig.io, &mut rig.power, PowerRequest::Up)
            .unwrap();
        assert!(matches!(
            report.fault,
            Some(PowerError::Verify {
                rail: Rail::FpgaIo,
                ..
            })
        ));
        // FireFly still came up through the per-domain pass
        assert_eq!(
            report.power.raw,
            mask::CLOCK_MISC | mask::FPGA_CORE | mask::FIREFLY
        );
        assert!(report.ready);
    }

    #[test]
    fn test_boot_sample() {
        let mut rig = rig();
        assert_eq!(rig.line.sample(&rig.io), PowerRequest::Down);
        drive_request(&mut rig, true);
        assert_eq!(rig.line.sample(&rig.io), PowerRequest::Up);
    }
}
