//! Shift-register based SPI master.
//!
//! Typical use from an initiator:
//!
//! 1. `interface.write_mosi(data, bits)` stages the payload and raises
//!    `start`; hold it for exactly one step, then `release_start()`.
//! 2. Step until `interface.done` pulses.
//! 3. `interface.read_miso(bits)` returns what the slave sent back.

use log::{debug, trace};

use crate::bus::{Bus, BusLevels, MasterLines, Mode};
use crate::clock_engine::ClockEngine;
use crate::decoder::{BusDecoder, BusEvent, EventMask};
use crate::error::{ConfigError, SimError, SimResult};
use crate::mux::{Direction, Layout, Multiplexer};
use crate::shift_register::{ShiftDirection, ShiftRegister};

/// Multiplexable interface to a [`ShiftMaster`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterInterface {
    width: u32,
    direction: ShiftDirection,
    pub mosi_data: u64,
    pub miso_data: u64,
    pub transfer_size: u32,
    pub start: bool,
    pub done: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterField {
    MosiData,
    MisoData,
    TransferSize,
    Start,
    Done,
}

impl MasterInterface {
    pub fn new(width: u32, direction: ShiftDirection) -> Self {
        Self {
            width,
            direction,
            mosi_data: 0,
            miso_data: 0,
            transfer_size: 0,
            start: false,
            done: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Stages the low `size` bits of `data` and raises `start`.
    pub fn write_mosi(&mut self, data: u64, size: u32) -> SimResult<()> {
        check_transfer_size(size, self.width)?;
        self.mosi_data = self.direction.align(data, size, self.width);
        self.transfer_size = size;
        self.start = true;
        Ok(())
    }

    pub fn release_start(&mut self) {
        self.start = false;
    }

    /// The last `size` bits received.
    pub fn read_miso(&self, size: u32) -> u64 {
        self.direction.extract(self.miso_data, size.min(self.width), self.width)
    }
}

impl Layout for MasterInterface {
    type Field = MasterField;

    const FIELDS: &'static [(MasterField, Direction)] = &[
        (MasterField::MosiData, Direction::FanIn),
        (MasterField::MisoData, Direction::FanOut),
        (MasterField::TransferSize, Direction::FanIn),
        (MasterField::Start, Direction::FanIn),
        (MasterField::Done, Direction::FanOut),
    ];

    fn get(&self, field: MasterField) -> u64 {
        match field {
            MasterField::MosiData => self.mosi_data,
            MasterField::MisoData => self.miso_data,
            MasterField::TransferSize => self.transfer_size as u64,
            MasterField::Start => self.start as u64,
            MasterField::Done => self.done as u64,
        }
    }

    fn set(&mut self, field: MasterField, value: u64) {
        match field {
            MasterField::MosiData => self.mosi_data = value,
            MasterField::MisoData => self.miso_data = value,
            MasterField::TransferSize => self.transfer_size = value as u32,
            MasterField::Start => self.start = value != 0,
            MasterField::Done => self.done = value != 0,
        }
    }
}

pub(crate) fn check_transfer_size(size: u32, width: u32) -> SimResult<()> {
    if size == 0 || size > width {
        return Err(SimError::InvalidTransferSize { size, width });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterState {
    Idle,
    EventLoop,
}

#[derive(Debug, Clone)]
pub struct ShiftMaster {
    pub interface: MasterInterface,
    register: ShiftRegister,
    clock: ClockEngine,
    decoder: BusDecoder,
    state: MasterState,
    remaining: u32,
    busy: bool,
    enable: bool,
    mosi: bool,
}

impl ShiftMaster {
    pub fn new(bus: Bus, system_clock_hz: u64, register: ShiftRegister) -> Result<Self, ConfigError> {
        let half_period = bus.freq.half_period_ticks(system_clock_hz)?;
        Ok(Self {
            interface: MasterInterface::new(register.width(), register.direction()),
            clock: ClockEngine::new(bus.mode.polarity, half_period),
            decoder: BusDecoder::new(bus.mode),
            register,
            state: MasterState::Idle,
            remaining: 0,
            busy: false,
            enable: false,
            mosi: false,
        })
    }

    /// A multiplexer whose leaves match this master's interface.
    pub fn multiplexer(&self, initiators: usize) -> Multiplexer<MasterInterface> {
        let leaves = (0..initiators)
            .map(|_| MasterInterface::new(self.register.width(), self.register.direction()))
            .collect();
        Multiplexer::new(leaves)
    }

    pub fn mode(&self) -> Mode {
        self.decoder.mode()
    }

    pub fn state(&self) -> MasterState {
        self.state
    }

    pub fn busy(&self) -> bool {
        self.busy
    }

    pub fn register(&self) -> &ShiftRegister {
        &self.register
    }

    pub fn clock(&self) -> &ClockEngine {
        &self.clock
    }

    pub fn drive(&self) -> MasterLines {
        MasterLines {
            cs_n: self.clock.cs_n(),
            clk: self.clock.clk(),
            mosi: self.mosi,
        }
    }

    /// Fails if the interface's `start` cannot be accepted this tick.
    pub fn check_start(&self) -> SimResult<()> {
        if !self.interface.start {
            return Ok(());
        }
        if self.busy {
            return Err(SimError::StartWhileBusy);
        }
        check_transfer_size(self.interface.transfer_size, self.register.width())
    }

    /// Advances one tick against this cycle's bus levels. On error nothing
    /// has changed.
    pub fn step(&mut self, levels: &BusLevels) -> SimResult<EventMask> {
        self.check_start()?;
        self.clock.check(self.enable)?;
        let events = self.decoder.step(levels);
        self.clock.step(self.enable)?;
        self.interface.done = false;

        let start = self.interface.start;
        if start {
            self.register.latch(self.interface.mosi_data);
        }

        match self.state {
            MasterState::Idle => {
                if start {
                    debug!("master: start {} bit transfer", self.interface.transfer_size);
                    self.remaining = self.interface.transfer_size;
                    self.busy = true;
                    self.enable = true;
                    self.state = MasterState::EventLoop;
                }
            }
            MasterState::EventLoop => {
                if events.contains(BusEvent::Setup) {
                    self.mosi = self.register.bit_out();
                }
                if events.contains(BusEvent::Sample) {
                    trace!("master: sample miso={} remaining={}", levels.miso, self.remaining);
                    self.register.shift(levels.miso);
                    if self.remaining == 1 {
                        self.enable = false;
                    }
                    self.remaining = self.remaining.saturating_sub(1);
                }
                if events.contains(BusEvent::Stop) {
                    debug!("master: done");
                    self.interface.done = self.busy;
                    self.busy = false;
                    self.state = MasterState::Idle;
                }
            }
        }

        self.interface.miso_data = self.register.word();
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn master(width: u32) -> ShiftMaster {
        let bus = Bus::new(1_000_000, Mode::MODE0).unwrap();
        ShiftMaster::new(bus, 8_000_000, ShiftRegister::up(width).unwrap()).unwrap()
    }

    /// Runs the master against a loopback bus where miso mirrors mosi.
    fn loopback(master: &mut ShiftMaster, max_cycles: usize) -> Option<usize> {
        for cycle in 0..max_cycles {
            let lines = master.drive();
            let levels = BusLevels::resolve(lines, Some(lines.mosi));
            master.step(&levels).unwrap();
            master.interface.release_start();
            if master.interface.done {
                return Some(cycle);
            }
        }
        None
    }

    #[test]
    fn write_mosi_aligns_payload() {
        let mut iface = MasterInterface::new(16, ShiftDirection::Up);
        iface.write_mosi(0xC4, 8).unwrap();
        assert_eq!(iface.mosi_data, 0xC400);
        assert_eq!(iface.transfer_size, 8);
        assert!(iface.start);
    }

    #[test]
    fn zero_and_oversized_transfers_rejected() {
        let mut iface = MasterInterface::new(8, ShiftDirection::Up);
        assert_eq!(
            iface.write_mosi(1, 0),
            Err(SimError::InvalidTransferSize { size: 0, width: 8 })
        );
        assert!(iface.write_mosi(1, 9).is_err());
        assert!(!iface.start);
    }

    #[test]
    fn loopback_transfer_completes() {
        let mut m = master(8);
        m.interface.write_mosi(0xA5, 8).unwrap();
        assert!(loopback(&mut m, 200).is_some());
        assert_eq!(m.state(), MasterState::Idle);
        assert!(!m.busy());
        assert!(m.drive().cs_n);
        assert_eq!(m.interface.read_miso(8), 0xA5);
    }

    #[test]
    fn start_while_busy_is_an_error() {
        let mut m = master(8);
        m.interface.write_mosi(0x01, 8).unwrap();
        let levels = BusLevels::resolve(m.drive(), None);
        m.step(&levels).unwrap();
        assert!(m.busy());
        let before = (m.state(), m.clock().state(), m.register().word());
        let levels = BusLevels::resolve(m.drive(), None);
        assert_eq!(m.step(&levels), Err(SimError::StartWhileBusy));
        assert_eq!((m.state(), m.clock().state(), m.register().word()), before);
        assert!(m.busy());
    }

    #[test]
    fn raw_interface_size_is_checked() {
        let mut m = master(8);
        m.interface.transfer_size = 0;
        m.interface.start = true;
        let levels = BusLevels::resolve(m.drive(), None);
        assert!(matches!(m.step(&levels), Err(SimError::InvalidTransferSize { .. })));
    }
}
