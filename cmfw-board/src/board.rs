//! Signal and power registry
//!
//! [`Board`] owns the hardware I/O handle and every signal group of the
//! board. It is the power owner: the only path that writes the
//! power-control group is [`Board::power_set`] or a serviced SM request.

use cmfw_core::handshake::{Handshake, HandshakeReport, PowerRequest, RequestLine, RequestMailbox};
use cmfw_core::power::{PowerController, PowerDomain, PowerStatus, Transition};
use cmfw_core::signal::{SignalGroup, SignalGroupConfig};
use cmfw_hal::gpio::HardwareIo;
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::error::BoardError;

/// Which signal group plays which role
#[derive(Debug, Clone, Copy)]
pub struct BoardLayout {
    /// Power request input from the Service Module, edge triggered
    pub request: &'static SignalGroupConfig,
    /// Acknowledgement output to the Service Module
    pub ready: &'static SignalGroupConfig,
    /// Status LEDs, if fitted
    pub status: Option<&'static SignalGroupConfig>,
    pub led_user: &'static SignalGroupConfig,
    /// Power-control outputs, bit layout of `cmfw_core::power::mask`
    pub power: &'static SignalGroupConfig,
}

/// Look up a power domain by its command name
pub fn parse_domain(name: &str) -> Result<PowerDomain, BoardError> {
    PowerDomain::from_name(name).ok_or(BoardError::UnknownDomain)
}

/// Owned registry of the board's signal groups
pub struct Board<IO> {
    io: IO,
    request: RequestLine,
    handshake: Handshake,
    led_user: SignalGroup,
    power: PowerController,
    /// Request the last successful handshake acted on
    serviced: Option<PowerRequest>,
}

impl<IO: HardwareIo> Board<IO> {
    pub fn new(layout: &BoardLayout, io: IO) -> Self {
        Self {
            io,
            request: RequestLine::new(SignalGroup::new(layout.request)),
            handshake: Handshake::new(
                SignalGroup::new(layout.ready),
                layout.status.map(SignalGroup::new),
            ),
            led_user: SignalGroup::new(layout.led_user),
            power: PowerController::new(SignalGroup::new(layout.power)),
            serviced: None,
        }
    }

    pub fn io(&self) -> &IO {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut IO {
        &mut self.io
    }

    pub fn power(&self) -> &PowerController {
        &self.power
    }

    /// Configure every group with its boot default and arm the request line.
    ///
    /// Power control comes up first so every rail is latched off before
    /// anything else drives. Returns the request level seen at boot; the
    /// caller posts it so a request raised before boot is not missed.
    pub fn init(&mut self) -> Result<PowerRequest, BoardError> {
        self.power.init(&mut self.io);
        self.handshake.init(&mut self.io);
        self.led_user.init(&mut self.io);
        self.request.init(&mut self.io)?;
        self.refresh_status()?;

        let request = self.request.sample(&self.io);
        #[cfg(feature = "defmt")]
        defmt::info!("board: signal groups ready, SM requests {}", request);
        Ok(request)
    }

    /// Switch a domain, then refresh the status LEDs.
    ///
    /// The LEDs are refreshed even when sequencing fails so they show
    /// where the sequence stopped.
    pub fn power_set(&mut self, domain: PowerDomain, on: bool) -> Result<Transition, BoardError> {
        let result = self.power.set(&mut self.io, domain, on);
        let refreshed = self.refresh_status();
        let transition = result?;
        refreshed?;
        Ok(transition)
    }

    pub fn power_get(&self, domain: PowerDomain) -> Result<PowerStatus, BoardError> {
        Ok(self.power.get(&self.io, domain)?)
    }

    /// Show the current power state on the status LEDs
    pub fn refresh_status(&mut self) -> Result<PowerStatus, BoardError> {
        let status = self.power.get(&self.io, PowerDomain::All)?;
        self.handshake.refresh_status(&mut self.io, &status)?;
        Ok(status)
    }

    /// Names of every signal group, in table order
    pub fn group_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        groups(&self.request, &self.handshake, &self.led_user, &self.power).map(SignalGroup::name)
    }

    /// Write a group by name and verify the read-back
    pub fn signal_set(&mut self, name: &str, value: u32) -> Result<(), BoardError> {
        let Self {
            io,
            request,
            handshake,
            led_user,
            power,
            ..
        } = self;
        let group = groups(request, handshake, led_user, power)
            .find(|group| group.name().eq_ignore_ascii_case(name))
            .ok_or(BoardError::UnknownGroup)?;

        if core::ptr::eq(group.config(), power.group().config()) {
            return Err(BoardError::OwnedByPower);
        }
        if value & !group.mask() != 0 {
            return Err(BoardError::ValueOutOfRange {
                value,
                mask: group.mask(),
            });
        }
        group.set_verified(io, value)?;
        Ok(())
    }

    /// Read a group by name: driven value for outputs, pad level for inputs
    pub fn signal_get(&self, name: &str) -> Result<u32, BoardError> {
        let group = groups(&self.request, &self.handshake, &self.led_user, &self.power)
            .find(|group| group.name().eq_ignore_ascii_case(name))
            .ok_or(BoardError::UnknownGroup)?;
        if group.is_output() {
            Ok(group.get_output(&self.io)?)
        } else {
            Ok(group.get_input(&self.io))
        }
    }

    /// Level on the acknowledgement line
    pub fn ready(&self) -> Result<bool, BoardError> {
        Ok(self.handshake.ready(&self.io)?)
    }

    /// Request-line interrupt half: acknowledge the edge and post the level
    pub fn on_request_edge<M: RawMutex>(&mut self, mailbox: &RequestMailbox<M>) -> Option<PowerRequest> {
        self.request.on_edge_into(&mut self.io, mailbox)
    }

    /// Owner half: service the newest posted request, if any
    pub fn service_requests<M: RawMutex>(
        &mut self,
        mailbox: &RequestMailbox<M>,
    ) -> Option<Result<HandshakeReport, BoardError>> {
        let result = self
            .handshake
            .service_pending(&mut self.io, &mut self.power, mailbox)?
            .map_err(BoardError::from);
        if let Ok(report) = &result {
            self.serviced = Some(report.request);
        }
        Some(result)
    }

    /// Post the request level again if it differs from what was last
    /// serviced.
    ///
    /// Catches an edge that came while no waiter was armed. Called
    /// periodically by the owner; returns the posted request.
    pub fn resync_request<M: RawMutex>(&mut self, mailbox: &RequestMailbox<M>) -> Option<PowerRequest> {
        let level = self.request.sample(&self.io);
        if self.serviced == Some(level) {
            return None;
        }
        #[cfg(feature = "defmt")]
        defmt::warn!("board: request line reads {} without a serviced edge", level);
        mailbox.signal(level);
        Some(level)
    }
}

fn groups<'a>(
    request: &'a RequestLine,
    handshake: &'a Handshake,
    led_user: &'a SignalGroup,
    power: &'a PowerController,
) -> impl Iterator<Item = &'a SignalGroup> {
    [
        Some(request.group()),
        Some(handshake.ready_line()),
        Some(led_user),
        handshake.status_leds(),
        Some(power.group()),
    ]
    .into_iter()
    .flatten()
}
