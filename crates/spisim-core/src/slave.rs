//! Shift-register based SPI slave.
//!
//! The slave is always listening. Preload the register with the response
//! before the master starts clocking; after `done` pulses the register holds
//! what the master sent and `transfer_size` says how many bits arrived.

use log::{debug, trace, warn};

use crate::bus::{BusLevels, Mode, SlaveLines};
use crate::decoder::{BusDecoder, BusEvent, EventMask};
use crate::error::SimResult;
use crate::master::check_transfer_size;
use crate::shift_register::ShiftRegister;

#[derive(Debug, Clone)]
pub struct ShiftSlave {
    register: ShiftRegister,
    decoder: BusDecoder,
    miso: bool,
    transfer_size: u32,
    overrun: bool,
    start: bool,
    busy: bool,
    done: bool,
}

impl ShiftSlave {
    pub fn new(mode: Mode, register: ShiftRegister) -> Self {
        Self {
            register,
            decoder: BusDecoder::new(mode),
            miso: false,
            transfer_size: 0,
            overrun: false,
            start: false,
            busy: false,
            done: false,
        }
    }

    pub fn mode(&self) -> Mode {
        self.decoder.mode()
    }

    pub fn register(&self) -> &ShiftRegister {
        &self.register
    }

    /// Parallel-loads the register with the word to send back.
    pub fn preload(&mut self, word: u64) {
        self.register.latch(word);
    }

    /// Preloads `data` so its low `size` bits go out first.
    pub fn preload_response(&mut self, data: u64, size: u32) -> SimResult<()> {
        let width = self.register.width();
        check_transfer_size(size, width)?;
        let word = self.register.direction().align(data, size, width);
        self.register.latch(word);
        Ok(())
    }

    /// The last `size` bits received.
    pub fn received(&self, size: u32) -> u64 {
        let width = self.register.width();
        self.register
            .direction()
            .extract(self.register.word(), size.min(width), width)
    }

    pub fn transfer_size(&self) -> u32 {
        self.transfer_size
    }

    pub fn overrun(&self) -> bool {
        self.overrun
    }

    pub fn start(&self) -> bool {
        self.start
    }

    pub fn busy(&self) -> bool {
        self.busy
    }

    pub fn done(&self) -> bool {
        self.done
    }

    /// miso is only driven while a transfer addressed to this slave is in
    /// progress.
    pub fn drive(&self) -> SlaveLines {
        SlaveLines {
            miso: self.busy.then_some(self.miso),
        }
    }

    /// Advances one tick. `levels` must already reflect this slave's chip
    /// select wiring.
    pub fn step(&mut self, levels: &BusLevels) -> EventMask {
        let events = self.decoder.step(levels);
        self.start = false;
        self.done = false;

        if events.contains(BusEvent::Start) {
            trace!("slave: start");
            self.transfer_size = 0;
            self.overrun = false;
            self.start = true;
            self.busy = true;
        }
        if events.contains(BusEvent::Setup) {
            self.miso = self.register.bit_out();
        }
        if events.contains(BusEvent::Sample) {
            self.register.shift(levels.mosi);
            if self.transfer_size == self.register.width() {
                self.overrun = true;
            }
            self.transfer_size = sat_add(self.transfer_size, 1, self.register.width());
        }
        if events.contains(BusEvent::Stop) {
            if self.busy {
                debug!(
                    "slave: done, {} bits{}",
                    self.transfer_size,
                    if self.overrun { " (overrun)" } else { "" }
                );
            } else {
                warn!("slave: stop without a transfer in progress");
            }
            self.done = self.busy;
            self.busy = false;
        }
        events
    }
}

/// `a + b`, clamped to `limit`.
fn sat_add(a: u32, b: u32, limit: u32) -> u32 {
    a.saturating_add(b).min(limit)
}
