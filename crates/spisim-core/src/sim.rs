//! Lockstep simulation of one master and any number of slaves on a bus.
//!
//! Each [`Simulation::step`] is one system clock edge. Bus levels are first
//! resolved from the registered outputs of every component, then every
//! component computes its next state from those same levels.

use log::debug;
use serde::Serialize;

use crate::bus::{BusLevels, SlaveSelect};
use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::master::{check_transfer_size, ShiftMaster};
use crate::shift_register::{ShiftDirection, ShiftRegister};
use crate::slave::ShiftSlave;

pub type SlaveId = usize;

#[derive(Debug, Clone)]
struct Attached {
    slave: ShiftSlave,
    select: SlaveSelect,
}

impl Attached {
    fn view(&self, levels: BusLevels) -> BusLevels {
        match self.select {
            SlaveSelect::Bus => levels,
            SlaveSelect::Deasserted => levels.deselected(),
        }
    }
}

/// What a slave saw during one master transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlaveReport {
    pub id: SlaveId,
    pub data: u64,
    pub transfer_size: u32,
    pub overrun: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Completion {
    /// Bits sent by the master.
    pub mosi: u64,
    /// Bits the master received.
    pub miso: u64,
    pub size: u32,
    /// System clock cycles from start to done.
    pub cycles: u64,
    pub slaves: Vec<SlaveReport>,
}

#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimConfig,
    half_period: u64,
    master: ShiftMaster,
    slaves: Vec<Attached>,
    cycle: u64,
    waveform: Vec<BusLevels>,
}

impl Simulation {
    pub fn new(config: SimConfig) -> SimResult<Self> {
        let half_period = config.validate()?;
        let register = ShiftRegister::new(config.width, config.direction)?;
        let master = ShiftMaster::new(config.bus()?, config.system_clock_hz, register)?;
        let mut sim = Self {
            half_period,
            master,
            slaves: Vec::new(),
            cycle: 0,
            waveform: Vec::new(),
            config,
        };
        for slave in sim.config.slaves.clone() {
            sim.attach_slave(slave.width, slave.direction, slave.select)?;
        }
        debug!(
            "simulation: mode {} half period {} ticks, {} slave(s)",
            sim.config.mode.number(),
            half_period,
            sim.slaves.len()
        );
        Ok(sim)
    }

    pub fn attach_slave(&mut self, width: u32, direction: ShiftDirection, select: SlaveSelect) -> SimResult<SlaveId> {
        let register = ShiftRegister::new(width, direction)?;
        self.slaves.push(Attached {
            slave: ShiftSlave::new(self.config.mode, register),
            select,
        });
        Ok(self.slaves.len() - 1)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn half_period_ticks(&self) -> u64 {
        self.half_period
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn master(&self) -> &ShiftMaster {
        &self.master
    }

    pub fn master_mut(&mut self) -> &mut ShiftMaster {
        &mut self.master
    }

    pub fn slave_count(&self) -> usize {
        self.slaves.len()
    }

    pub fn slave(&self, id: SlaveId) -> SimResult<&ShiftSlave> {
        self.slaves
            .get(id)
            .map(|a| &a.slave)
            .ok_or(SimError::UnknownSlave(id))
    }

    fn attached_mut(&mut self, id: SlaveId) -> SimResult<&mut Attached> {
        self.slaves.get_mut(id).ok_or(SimError::UnknownSlave(id))
    }

    pub fn set_select(&mut self, id: SlaveId, select: SlaveSelect) -> SimResult<()> {
        self.attached_mut(id)?.select = select;
        Ok(())
    }

    /// Stages the response a slave sends during the next transfer.
    pub fn preload(&mut self, id: SlaveId, data: u64, size: u32) -> SimResult<()> {
        self.attached_mut(id)?.slave.preload_response(data, size)
    }

    pub fn waveform(&self) -> &[BusLevels] {
        &self.waveform
    }

    pub fn take_waveform(&mut self) -> Vec<BusLevels> {
        std::mem::take(&mut self.waveform)
    }

    /// Resolves this cycle's bus levels from every driver.
    pub fn levels(&self) -> SimResult<BusLevels> {
        let mut drivers = 0;
        let mut miso = None;
        for attached in &self.slaves {
            if let Some(level) = attached.slave.drive().miso {
                drivers += 1;
                miso = Some(level);
            }
        }
        if drivers > 1 {
            return Err(SimError::BusContention {
                cycle: self.cycle,
                drivers,
            });
        }
        Ok(BusLevels::resolve(self.master.drive(), miso))
    }

    /// One system clock edge. `start` on the master interface is treated as
    /// a one-cycle strobe and released afterwards. A failed step leaves the
    /// simulation as it was.
    pub fn step(&mut self) -> SimResult<BusLevels> {
        let levels = self.levels()?;
        self.master.check_start()?;
        if self.config.capture_waveform {
            self.waveform.push(levels);
        }
        self.master.step(&levels)?;
        for attached in &mut self.slaves {
            let seen = attached.view(levels);
            attached.slave.step(&seen);
        }
        self.master.interface.release_start();
        self.cycle += 1;
        Ok(levels)
    }

    pub fn run(&mut self, cycles: u64) -> SimResult<()> {
        for _ in 0..cycles {
            self.step()?;
        }
        Ok(())
    }

    /// Stages a master transfer; it starts on the next step.
    pub fn begin(&mut self, data: u64, size: u32) -> SimResult<()> {
        if self.master.busy() {
            return Err(SimError::StartWhileBusy);
        }
        self.master.interface.write_mosi(data, size)
    }

    /// Upper bound on the cycles a `size`-bit transfer may take.
    pub fn cycle_budget(&self, size: u32) -> u64 {
        (2 * size as u64 + 4).saturating_mul(self.half_period).saturating_add(16)
    }

    /// Runs one complete master transfer of the low `size` bits of `data`.
    pub fn transfer(&mut self, data: u64, size: u32) -> SimResult<Completion> {
        check_transfer_size(size, self.master.register().width())?;
        self.begin(data, size)?;
        let budget = self.cycle_budget(size);
        let first = self.cycle;
        let mut reports = Vec::new();
        loop {
            if self.cycle - first >= budget {
                return Err(SimError::Timeout { cycles: budget });
            }
            self.step()?;
            for (id, attached) in self.slaves.iter().enumerate() {
                let slave = &attached.slave;
                if slave.done() {
                    reports.push(SlaveReport {
                        id,
                        data: slave.received(slave.transfer_size()),
                        transfer_size: slave.transfer_size(),
                        overrun: slave.overrun(),
                    });
                }
            }
            if self.master.interface.done {
                break;
            }
        }
        let completion = Completion {
            mosi: data & crate::shift_register::mask(size),
            miso: self.master.interface.read_miso(size),
            size,
            cycles: self.cycle - first,
            slaves: reports,
        };
        debug!(
            "transfer: {} bits in {} cycles, mosi={:#x} miso={:#x}",
            size, completion.cycles, completion.mosi, completion.miso
        );
        Ok(completion)
    }

    /// Steps until the master is idle and no slave is mid-transfer.
    pub fn run_until_idle(&mut self, max_cycles: u64) -> SimResult<()> {
        for _ in 0..max_cycles {
            let slaves_idle = self.slaves.iter().all(|a| !a.slave.busy());
            if !self.master.busy() && slaves_idle && self.master.drive().cs_n {
                return Ok(());
            }
            self.step()?;
        }
        Err(SimError::Timeout { cycles: max_cycles })
    }
}
