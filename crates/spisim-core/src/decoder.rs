//! Protocol event decoding shared by masters, slaves and monitors.
//!
//! START and STOP follow chip select. On SETUP an endpoint presents its
//! output bit and holds it until the next SETUP or STOP; on SAMPLE it reads
//! its input. SETUP and SAMPLE are only reported while chip select is
//! asserted, so one decoder per slave is enough on a multi-drop bus.

use std::fmt;

use crate::bus::{BusLevels, Mode, Phase, Polarity};
use crate::edge::EdgeDetector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BusEvent {
    Start = 0,
    Setup = 1,
    Sample = 2,
    Stop = 3,
}

impl BusEvent {
    pub const ALL: [BusEvent; 4] = [BusEvent::Start, BusEvent::Setup, BusEvent::Sample, BusEvent::Stop];

    pub fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Events that occurred in one cycle; bit `i` is [`BusEvent`] `i`.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct EventMask(u8);

impl EventMask {
    pub const NONE: EventMask = EventMask(0);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, event: BusEvent) -> bool {
        self.0 & event.bit() != 0
    }

    pub fn set(&mut self, event: BusEvent, on: bool) {
        if on {
            self.0 |= event.bit();
        } else {
            self.0 &= !event.bit();
        }
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = BusEvent> {
        BusEvent::ALL.into_iter().filter(move |e| self.contains(*e))
    }
}

impl fmt::Debug for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[derive(Debug, Clone)]
pub struct BusDecoder {
    mode: Mode,
    cs_edge: EdgeDetector,
    clk_edge: EdgeDetector,
}

impl BusDecoder {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            cs_edge: EdgeDetector::new(true),
            clk_edge: EdgeDetector::new(mode.polarity.idle_level()),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Decodes this cycle's levels against the previous cycle's.
    pub fn step(&mut self, levels: &BusLevels) -> EventMask {
        let cs = self.cs_edge.step(levels.cs_n);
        let clk = self.clk_edge.step(levels.clk);

        let (leading, trailing) = match self.mode.polarity {
            Polarity::IdleLow => (clk.rose, clk.fell),
            Polarity::IdleHigh => (clk.fell, clk.rose),
        };
        let (setup, sample) = match self.mode.phase {
            Phase::SampleLeading => (cs.fell || trailing, leading),
            Phase::SampleTrailing => (leading, trailing),
        };

        let mut events = EventMask::NONE;
        events.set(BusEvent::Start, cs.fell);
        events.set(BusEvent::Stop, cs.rose);
        if !levels.cs_n {
            events.set(BusEvent::Setup, setup);
            events.set(BusEvent::Sample, sample);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(cs_n: bool, clk: bool) -> BusLevels {
        BusLevels { cs_n, clk, mosi: false, miso: false }
    }

    fn decode(mode: Mode, wave: &[(bool, bool)]) -> Vec<EventMask> {
        let mut dec = BusDecoder::new(mode);
        wave.iter().map(|&(cs_n, clk)| dec.step(&levels(cs_n, clk))).collect()
    }

    fn mask(events: &[BusEvent]) -> EventMask {
        let mut m = EventMask::NONE;
        for e in events {
            m.set(*e, true);
        }
        m
    }

    #[test]
    fn mode0_start_coincides_with_setup() {
        let ev = decode(Mode::MODE0, &[(true, false), (false, false), (false, true), (false, false), (true, false)]);
        assert_eq!(ev[0], EventMask::NONE);
        assert_eq!(ev[1], mask(&[BusEvent::Start, BusEvent::Setup]));
        assert_eq!(ev[2], mask(&[BusEvent::Sample]));
        assert_eq!(ev[3], mask(&[BusEvent::Setup]));
        assert_eq!(ev[4], mask(&[BusEvent::Stop]));
    }

    #[test]
    fn mode3_setup_on_falling_sample_on_rising() {
        let ev = decode(Mode::MODE3, &[(true, true), (false, true), (false, false), (false, true), (true, true)]);
        assert_eq!(ev[1], mask(&[BusEvent::Start]));
        assert_eq!(ev[2], mask(&[BusEvent::Setup]));
        assert_eq!(ev[3], mask(&[BusEvent::Sample]));
        assert_eq!(ev[4], mask(&[BusEvent::Stop]));
    }

    #[test]
    fn mode1_and_mode2() {
        let ev = decode(Mode::MODE1, &[(true, false), (false, false), (false, true), (false, false)]);
        assert_eq!(ev[1], mask(&[BusEvent::Start]));
        assert_eq!(ev[2], mask(&[BusEvent::Setup]));
        assert_eq!(ev[3], mask(&[BusEvent::Sample]));

        let ev = decode(Mode::MODE2, &[(true, true), (false, true), (false, false), (false, true)]);
        assert_eq!(ev[1], mask(&[BusEvent::Start, BusEvent::Setup]));
        assert_eq!(ev[2], mask(&[BusEvent::Sample]));
        assert_eq!(ev[3], mask(&[BusEvent::Setup]));
    }

    #[test]
    fn clock_activity_ignored_when_deselected() {
        let ev = decode(Mode::MODE0, &[(true, false), (true, true), (true, false), (true, true)]);
        assert!(ev.iter().all(|m| m.is_empty()));
    }

    #[test]
    fn mask_debug_lists_events() {
        let m = mask(&[BusEvent::Start, BusEvent::Stop]);
        assert_eq!(m.bits(), 0b1001);
        assert_eq!(format!("{m:?}"), "{Start, Stop}");
    }
}
