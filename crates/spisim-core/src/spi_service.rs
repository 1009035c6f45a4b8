use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, warn};
use parking_lot::{Mutex, MutexGuard};

use crate::bus::{BusLevels, SlaveSelect};
use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::sim::{Completion, Simulation, SlaveId};
use crate::transfer_log::{Lane, TransferLog};

#[derive(Debug, Clone)]
pub enum SpiEvent {
    Opened { half_period_ticks: u64 },
    Done(Completion),
    Waveform(Vec<BusLevels>),
    Error(SimError),
    Closed,
}

enum Command {
    Transfer { data: u64, size: u32 },
    Preload { slave: SlaveId, data: u64, size: u32 },
    SetSelect { slave: SlaveId, select: SlaveSelect },
    TakeWaveform,
    Close,
}

/// Runs a [`Simulation`] on its own thread and talks to it over channels.
pub struct SpiService {
    cfg: SimConfig,
    tx_cmd: Sender<Command>,
    rx_evt: Receiver<SpiEvent>,
    log: Arc<Mutex<TransferLog>>,
}

impl SpiService {
    pub fn open(cfg: SimConfig) -> SimResult<Self> {
        let mut sim = Simulation::new(cfg.clone())?;
        let (tx_cmd, rx_cmd) = unbounded::<Command>();
        let (tx_evt, rx_evt) = unbounded::<SpiEvent>();
        let log = Arc::new(Mutex::new(TransferLog::new(cfg.log_capacity)));
        let thread_log = log.clone();

        std::thread::spawn(move || {
            let _ = tx_evt.send(SpiEvent::Opened {
                half_period_ticks: sim.half_period_ticks(),
            });
            for cmd in rx_cmd.iter() {
                match cmd {
                    Command::Transfer { data, size } => match sim.transfer(data, size) {
                        Ok(done) => {
                            {
                                let mut log = thread_log.lock();
                                log.push(sim.cycle(), Lane::Mosi, size, done.mosi);
                                log.push(sim.cycle(), Lane::Miso, size, done.miso);
                            }
                            for report in done.slaves.iter().filter(|r| r.overrun) {
                                warn!("slave {} overrun", report.id);
                            }
                            let _ = tx_evt.send(SpiEvent::Done(done));
                        }
                        Err(e) => {
                            let _ = tx_evt.send(SpiEvent::Error(e));
                        }
                    },
                    Command::Preload { slave, data, size } => {
                        if let Err(e) = sim.preload(slave, data, size) {
                            let _ = tx_evt.send(SpiEvent::Error(e));
                        }
                    }
                    Command::SetSelect { slave, select } => {
                        if let Err(e) = sim.set_select(slave, select) {
                            let _ = tx_evt.send(SpiEvent::Error(e));
                        }
                    }
                    Command::TakeWaveform => {
                        let _ = tx_evt.send(SpiEvent::Waveform(sim.take_waveform()));
                    }
                    Command::Close => break,
                }
            }
            debug!("spi service: closing after {} cycles", sim.cycle());
            let _ = tx_evt.send(SpiEvent::Closed);
        });

        Ok(Self { cfg, tx_cmd, rx_evt, log })
    }

    fn send(&self, cmd: Command) -> SimResult<()> {
        self.tx_cmd.send(cmd).map_err(|_| SimError::Disconnected)
    }

    pub fn transfer(&self, data: u64, size: u32) -> SimResult<()> {
        self.send(Command::Transfer { data, size })
    }

    pub fn preload(&self, slave: SlaveId, data: u64, size: u32) -> SimResult<()> {
        self.send(Command::Preload { slave, data, size })
    }

    pub fn set_select(&self, slave: SlaveId, select: SlaveSelect) -> SimResult<()> {
        self.send(Command::SetSelect { slave, select })
    }

    pub fn request_waveform(&self) -> SimResult<()> {
        self.send(Command::TakeWaveform)
    }

    pub fn close(&self) {
        let _ = self.tx_cmd.send(Command::Close);
    }

    pub fn events(&self) -> &Receiver<SpiEvent> {
        &self.rx_evt
    }

    /// Blocks until the next event that answers a command, skipping `Opened`.
    pub fn next_reply(&self) -> SimResult<SpiEvent> {
        loop {
            match self.rx_evt.recv().map_err(|_| SimError::Disconnected)? {
                SpiEvent::Opened { .. } => continue,
                event => return Ok(event),
            }
        }
    }

    pub fn transfer_log(&self) -> MutexGuard<'_, TransferLog> {
        self.log.lock()
    }

    pub fn config(&self) -> &SimConfig {
        &self.cfg
    }
}

impl Drop for SpiService {
    fn drop(&mut self) {
        self.close();
    }
}
