//! Bus clock and chip-select frame generator.
//!
//! Raising `enable` pulls chip select low and starts the clock. Lowering it
//! lets the current clock cycle finish, then releases chip select. `enable`
//! must stay low until the engine is back in [`ClockState::Idle`].
//!
//! With polarity 0 the clock idles low and a cycle is a rising edge followed
//! by a falling edge; with polarity 1 it idles high and the edges swap.

use log::trace;

use crate::bus::Polarity;
use crate::edge::EdgeDetector;
use crate::error::{SimError, SimResult};
use crate::timer::OneShot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Idle,
    LeadingEdge,
    TrailingEdge,
}

#[derive(Debug, Clone)]
pub struct ClockEngine {
    polarity: Polarity,
    state: ClockState,
    assert_cs: bool,
    assert_clk: bool,
    enable_edge: EdgeDetector,
    half_clock: OneShot,
}

impl ClockEngine {
    pub fn new(polarity: Polarity, half_period_ticks: u64) -> Self {
        Self {
            polarity,
            state: ClockState::Idle,
            assert_cs: false,
            assert_clk: false,
            enable_edge: EdgeDetector::new(false),
            half_clock: OneShot::new(half_period_ticks),
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn cs_n(&self) -> bool {
        !self.assert_cs
    }

    pub fn clk(&self) -> bool {
        self.assert_clk ^ self.polarity.idle_level()
    }

    /// Fails if `enable` rises while a frame is still in progress.
    pub fn check(&self, enable: bool) -> SimResult<()> {
        if self.enable_edge.peek(enable).rose && self.state != ClockState::Idle {
            return Err(SimError::EnableWhileActive);
        }
        Ok(())
    }

    /// Advances one system clock tick with the current `enable` level.
    pub fn step(&mut self, enable: bool) -> SimResult<()> {
        self.check(enable)?;
        let rose = self.enable_edge.step(enable).rose;
        let triggered = self.half_clock.triggered();

        self.half_clock.step(rose || (self.assert_cs && triggered));

        match self.state {
            ClockState::Idle => {
                if rose {
                    trace!("clock engine: frame start");
                    self.assert_cs = true;
                    self.state = ClockState::LeadingEdge;
                }
            }
            ClockState::LeadingEdge => {
                if triggered {
                    if enable {
                        self.assert_clk = true;
                        self.state = ClockState::TrailingEdge;
                    } else {
                        trace!("clock engine: frame end");
                        self.assert_cs = false;
                        self.state = ClockState::Idle;
                    }
                }
            }
            ClockState::TrailingEdge => {
                if triggered {
                    self.assert_clk = false;
                    self.state = ClockState::LeadingEdge;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(engine: &mut ClockEngine, enable: bool, cycles: usize) -> Vec<(bool, bool)> {
        (0..cycles)
            .map(|_| {
                let sample = (engine.cs_n(), engine.clk());
                engine.step(enable).unwrap();
                sample
            })
            .collect()
    }

    #[test]
    fn idles_at_polarity_level() {
        let low = ClockEngine::new(Polarity::IdleLow, 2);
        assert!(low.cs_n());
        assert!(!low.clk());
        let high = ClockEngine::new(Polarity::IdleHigh, 2);
        assert!(high.clk());
    }

    #[test]
    fn constant_clock_period() {
        let mut engine = ClockEngine::new(Polarity::IdleLow, 3);
        let wave = run(&mut engine, true, 60);
        let rises: Vec<usize> = wave
            .windows(2)
            .enumerate()
            .filter(|(_, w)| !w[0].1 && w[1].1)
            .map(|(i, _)| i + 1)
            .collect();
        assert!(rises.len() >= 5);
        for pair in rises.windows(2) {
            assert_eq!(pair[1] - pair[0], 6);
        }
        assert!(wave[2..].iter().all(|(cs_n, _)| !cs_n));
    }

    #[test]
    fn finishes_cycle_before_release() {
        let mut engine = ClockEngine::new(Polarity::IdleHigh, 2);
        run(&mut engine, true, 4);
        assert_eq!(engine.state(), ClockState::TrailingEdge);
        assert!(!engine.clk());
        let tail = run(&mut engine, false, 8);
        assert_eq!(engine.state(), ClockState::Idle);
        // clock returns to idle before chip select goes high
        let release = tail.iter().position(|(cs_n, _)| *cs_n).unwrap();
        assert!(tail[release - 1].1);
        assert!(engine.cs_n());
    }

    #[test]
    fn early_reenable_is_rejected() {
        let mut engine = ClockEngine::new(Polarity::IdleLow, 4);
        engine.step(true).unwrap();
        engine.step(false).unwrap();
        assert_ne!(engine.state(), ClockState::Idle);
        let state = engine.state();
        assert_eq!(engine.step(true), Err(SimError::EnableWhileActive));
        assert_eq!(engine.state(), state);
        // the rejected rise was not remembered, so it is rejected again
        assert_eq!(engine.step(true), Err(SimError::EnableWhileActive));
    }
}
