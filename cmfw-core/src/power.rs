//! Power domain controller
//!
//! The power-control signal group carries one enable bit per regulator
//! output. Domains are sequenced rail by rail: each step rewrites only the
//! rail's own bits, then reads the group back and compares. The first
//! mismatch aborts the sequence; steps already taken are not rolled back.
//!
//! ```text
//!   up:    clock/misc ─► FPGA core ─► FPGA I/O ─► FireFly
//!   down:  FireFly ─► FPGA I/O ─► FPGA core ─► clock/misc
//! ```

use cmfw_hal::gpio::HardwareIo;
use heapless::Vec;

use crate::signal::{SignalError, SignalGroup};

/// Power-control bit assignments
pub mod mask {
    pub const FPGA_CORE: u32 = 0x01;
    pub const FPGA_IO: u32 = 0x02;
    pub const FPGA: u32 = FPGA_CORE | FPGA_IO;
    pub const MISC: u32 = 0x04;
    pub const FIREFLY: u32 = 0x08;
    pub const PM1_CONTROL0: u32 = 0x10;
    pub const PM1_CONTROL1: u32 = 0x20;
    pub const PM2_CONTROL0: u32 = 0x40;
    pub const PM2_CONTROL1: u32 = 0x80;
    /// Power-module control lines (clock generators and misc supplies)
    pub const PM: u32 = PM1_CONTROL0 | PM1_CONTROL1 | PM2_CONTROL0 | PM2_CONTROL1;
    pub const CLOCK_MISC: u32 = MISC | PM;
    pub const ALL: u32 = 0xFF;
}

/// Most steps a single sequence can take
pub const MAX_STEPS: usize = 8;

/// One independently switched rail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rail {
    ClockMisc,
    FpgaCore,
    FpgaIo,
    FireFly,
}

impl Rail {
    pub const fn mask(self) -> u32 {
        match self {
            Rail::ClockMisc => mask::CLOCK_MISC,
            Rail::FpgaCore => mask::FPGA_CORE,
            Rail::FpgaIo => mask::FPGA_IO,
            Rail::FireFly => mask::FIREFLY,
        }
    }

    /// This rail preceded by everything it depends on, in power-up order
    pub const fn with_prerequisites(self) -> &'static [Rail] {
        match self {
            Rail::ClockMisc => &[Rail::ClockMisc],
            Rail::FpgaCore => &[Rail::ClockMisc, Rail::FpgaCore],
            Rail::FpgaIo => &[Rail::ClockMisc, Rail::FpgaCore, Rail::FpgaIo],
            Rail::FireFly => &[Rail::FireFly],
        }
    }

    /// Bits of every rail that directly or transitively depends on this one
    pub const fn dependents(self) -> u32 {
        match self {
            Rail::ClockMisc => mask::FPGA,
            Rail::FpgaCore => mask::FPGA_IO,
            Rail::FpgaIo | Rail::FireFly => 0,
        }
    }
}

/// Externally addressable power domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerDomain {
    All,
    ClockMisc,
    Fpga,
    FireFly,
}

impl PowerDomain {
    pub const ALL_DOMAINS: [PowerDomain; 4] = [
        PowerDomain::All,
        PowerDomain::ClockMisc,
        PowerDomain::Fpga,
        PowerDomain::FireFly,
    ];

    pub const fn mask(self) -> u32 {
        match self {
            PowerDomain::All => mask::ALL,
            PowerDomain::ClockMisc => mask::CLOCK_MISC,
            PowerDomain::Fpga => mask::FPGA,
            PowerDomain::FireFly => mask::FIREFLY,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            PowerDomain::All => "all",
            PowerDomain::ClockMisc => "clock",
            PowerDomain::Fpga => "fpga",
            PowerDomain::FireFly => "firefly",
        }
    }

    /// Parse a domain name, ignoring case
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL_DOMAINS
            .into_iter()
            .find(|domain| domain.name().eq_ignore_ascii_case(name))
    }

    /// Rails in power-up order; power-down walks this backwards
    pub const fn rails(self) -> &'static [Rail] {
        match self {
            PowerDomain::All => &[Rail::ClockMisc, Rail::FpgaCore, Rail::FpgaIo, Rail::FireFly],
            PowerDomain::ClockMisc => &[Rail::ClockMisc],
            PowerDomain::Fpga => &[Rail::FpgaCore, Rail::FpgaIo],
            PowerDomain::FireFly => &[Rail::FireFly],
        }
    }

    /// Bits outside this domain that must read off before it may power down
    pub fn interlock(self) -> u32 {
        self.rails()
            .iter()
            .fold(0, |bits, rail| bits | rail.dependents())
            & !self.mask()
    }
}

/// Observed state of a domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DomainState {
    Off,
    On,
    /// Some but not all bits set
    Partial,
}

impl DomainState {
    pub const fn from_bits(value: u32, mask: u32) -> Self {
        let set = value & mask;
        if set == mask {
            DomainState::On
        } else if set == 0 {
            DomainState::Off
        } else {
            DomainState::Partial
        }
    }
}

/// Result of a query outside any sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerStatus {
    pub domain: PowerDomain,
    pub state: DomainState,
    /// Full power-control value at the time of the query
    pub raw: u32,
}

impl PowerStatus {
    /// A partially-on domain at rest means a rail dropped or never came up
    pub fn is_inconsistent(&self) -> bool {
        self.state == DomainState::Partial
    }
}

/// One verified step of a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Step {
    pub rail: Rail,
    pub on: bool,
    /// Power-control value read back after the write
    pub readback: u32,
}

/// Record of a sequence, including any failed final step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub domain: PowerDomain,
    pub on: bool,
    pub steps: Vec<Step, MAX_STEPS>,
}

impl Transition {
    fn new(domain: PowerDomain, on: bool) -> Self {
        Self {
            domain,
            on,
            steps: Vec::new(),
        }
    }

    /// Power-control value after the last step, if any step ran
    pub fn final_value(&self) -> Option<u32> {
        self.steps.last().map(|step| step.readback)
    }
}

/// Error from power sequencing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerError {
    /// Power-down refused while dependent rails read on; nothing was written
    Interlock { domain: PowerDomain, blocking: u32 },
    /// Read-back after a step did not match what was written
    Verify { rail: Rail, expected: u32, read: u32 },
    /// Underlying signal group failure
    Signal(SignalError),
}

impl From<SignalError> for PowerError {
    fn from(e: SignalError) -> Self {
        PowerError::Signal(e)
    }
}

/// Sole owner of the power-control signal group
#[derive(Debug)]
pub struct PowerController {
    group: SignalGroup,
    last: Option<Transition>,
}

impl PowerController {
    pub fn new(group: SignalGroup) -> Self {
        Self { group, last: None }
    }

    pub fn group(&self) -> &SignalGroup {
        &self.group
    }

    pub fn init<IO: HardwareIo>(&mut self, io: &mut IO) {
        self.group.init(io);
    }

    /// Current power-control value
    pub fn raw<IO: HardwareIo>(&self, io: &IO) -> Result<u32, PowerError> {
        Ok(self.group.get_output(io)?)
    }

    /// Query a domain without changing anything
    pub fn get<IO: HardwareIo>(&self, io: &IO, domain: PowerDomain) -> Result<PowerStatus, PowerError> {
        let raw = self.raw(io)?;
        Ok(PowerStatus {
            domain,
            state: DomainState::from_bits(raw, domain.mask()),
            raw,
        })
    }

    /// The most recent sequence, including a failed one
    pub fn last_transition(&self) -> Option<&Transition> {
        self.last.as_ref()
    }

    /// Switch a domain on or off.
    ///
    /// Powering up first brings up any prerequisite rail that is not fully
    /// on. Powering down is refused before any write while a dependent
    /// rail outside the domain reads on.
    pub fn set<IO: HardwareIo>(
        &mut self,
        io: &mut IO,
        domain: PowerDomain,
        on: bool,
    ) -> Result<Transition, PowerError> {
        let mut transition = Transition::new(domain, on);
        let result = if on {
            self.sequence_up(io, domain, &mut transition)
        } else {
            self.sequence_down(io, domain, &mut transition)
        };
        self.last = Some(transition.clone());
        result.map(|()| transition)
    }

    fn sequence_up<IO: HardwareIo>(
        &self,
        io: &mut IO,
        domain: PowerDomain,
        transition: &mut Transition,
    ) -> Result<(), PowerError> {
        for &rail in domain.rails() {
            for &needed in rail.with_prerequisites() {
                let requested = needed == rail;
                if !requested && DomainState::from_bits(self.raw(io)?, needed.mask()) == DomainState::On {
                    continue;
                }
                if !requested && domain.rails().contains(&needed) {
                    // Handled in its own turn of the outer loop
                    continue;
                }
                self.step(io, needed, true, transition)?;
            }
        }
        Ok(())
    }

    fn sequence_down<IO: HardwareIo>(
        &self,
        io: &mut IO,
        domain: PowerDomain,
        transition: &mut Transition,
    ) -> Result<(), PowerError> {
        let blocking = self.raw(io)? & domain.interlock();
        if blocking != 0 {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "power: {} down refused, dependents on {=u32:#x}",
                domain,
                blocking
            );
            return Err(PowerError::Interlock { domain, blocking });
        }
        for &rail in domain.rails().iter().rev() {
            self.step(io, rail, false, transition)?;
        }
        Ok(())
    }

    /// Read-modify-write one rail, then verify the whole group
    fn step<IO: HardwareIo>(
        &self,
        io: &mut IO,
        rail: Rail,
        on: bool,
        transition: &mut Transition,
    ) -> Result<(), PowerError> {
        let before = self.raw(io)?;
        let expected = if on {
            before | rail.mask()
        } else {
            before & !rail.mask()
        };
        self.group.set_output(io, expected)?;
        let read = self.raw(io)?;

        // Capacity covers the longest sequence
        let _ = transition.steps.push(Step {
            rail,
            on,
            readback: read,
        });

        if read != expected {
            #[cfg(feature = "defmt")]
            defmt::error!(
                "power: {} {} failed, expected {=u32:#x} read {=u32:#x}",
                rail,
                if on { "up" } else { "down" },
                expected,
                read
            );
            return Err(PowerError::Verify {
                rail,
                expected,
                read,
            });
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("power: {} {} -> {=u32:#x}", rail, if on { "up" } else { "down" }, read);
        Ok(())
    }
}
