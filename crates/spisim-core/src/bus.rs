//! Bus wiring and SPI mode configuration.
//!
//! Every wire has exactly one driver role. The master produces [`MasterLines`]
//! (chip select, clock, mosi), each slave produces [`SlaveLines`] (miso). The
//! simulation combines them into a [`BusLevels`] snapshot that every component
//! observes for the current cycle.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Clock idle level (CPOL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Polarity {
    /// Clock idles low; a cycle begins with the rising edge.
    #[default]
    IdleLow,
    /// Clock idles high; a cycle begins with the falling edge.
    IdleHigh,
}

impl Polarity {
    pub fn idle_level(self) -> bool {
        self == Polarity::IdleHigh
    }
}

impl TryFrom<u8> for Polarity {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::IdleLow),
            1 => Ok(Self::IdleHigh),
            _ => Err(ConfigError::InvalidModeBit { what: "polarity", value }),
        }
    }
}

impl From<Polarity> for u8 {
    fn from(p: Polarity) -> u8 {
        p as u8
    }
}

/// Which clock edge samples data (CPHA).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Phase {
    /// Data is set up before the first edge and sampled on the leading edge.
    #[default]
    SampleLeading,
    /// Data is set up on the leading edge and sampled on the trailing edge.
    SampleTrailing,
}

impl TryFrom<u8> for Phase {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::SampleLeading),
            1 => Ok(Self::SampleTrailing),
            _ => Err(ConfigError::InvalidModeBit { what: "phase", value }),
        }
    }
}

impl From<Phase> for u8 {
    fn from(p: Phase) -> u8 {
        p as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Mode {
    pub polarity: Polarity,
    pub phase: Phase,
}

impl Mode {
    pub const MODE0: Mode = Mode { polarity: Polarity::IdleLow, phase: Phase::SampleLeading };
    pub const MODE1: Mode = Mode { polarity: Polarity::IdleLow, phase: Phase::SampleTrailing };
    pub const MODE2: Mode = Mode { polarity: Polarity::IdleHigh, phase: Phase::SampleLeading };
    pub const MODE3: Mode = Mode { polarity: Polarity::IdleHigh, phase: Phase::SampleTrailing };

    pub const ALL: [Mode; 4] = [Self::MODE0, Self::MODE1, Self::MODE2, Self::MODE3];

    pub fn number(self) -> u8 {
        (u8::from(self.polarity) << 1) | u8::from(self.phase)
    }
}

impl TryFrom<u8> for Mode {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(ConfigError::InvalidMode(value))
    }
}

/// Nominal bus clock frequency. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusFrequency(u64);

impl BusFrequency {
    pub fn new(hz: u64) -> Result<Self, ConfigError> {
        if hz == 0 {
            return Err(ConfigError::ZeroBusFrequency);
        }
        Ok(Self(hz))
    }

    pub fn hz(self) -> u64 {
        self.0
    }

    /// System clock ticks per bus half period.
    pub fn half_period_ticks(self, system_clock_hz: u64) -> Result<u64, ConfigError> {
        let half_period = self.0.checked_mul(2).map_or(0, |period| system_clock_hz / period);
        if half_period < 2 {
            return Err(ConfigError::ClockTooSlow {
                system_clock_hz,
                bus_hz: self.0,
                half_period,
            });
        }
        Ok(half_period)
    }
}

/// Lines driven by the bus master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterLines {
    pub cs_n: bool,
    pub clk: bool,
    pub mosi: bool,
}

impl MasterLines {
    pub fn idle(polarity: Polarity) -> Self {
        Self {
            cs_n: true,
            clk: polarity.idle_level(),
            mosi: false,
        }
    }
}

/// Lines driven by a slave. `None` leaves miso undriven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlaveLines {
    pub miso: Option<bool>,
}

/// Resolved level of every wire for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusLevels {
    pub cs_n: bool,
    pub clk: bool,
    pub mosi: bool,
    pub miso: bool,
}

impl BusLevels {
    /// Combines the master's lines with whatever drives miso. An undriven miso
    /// reads low.
    pub fn resolve(master: MasterLines, miso: Option<bool>) -> Self {
        Self {
            cs_n: master.cs_n,
            clk: master.clk,
            mosi: master.mosi,
            miso: miso.unwrap_or(false),
        }
    }

    /// The same levels as seen by a slave whose chip select is tied high.
    pub fn deselected(self) -> Self {
        Self { cs_n: true, ..self }
    }
}

/// How a slave's chip-select input is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaveSelect {
    /// Connected to the master's chip select.
    #[default]
    Bus,
    /// Tied high; the slave is never addressed.
    Deasserted,
}

/// A physical connection: the wire bundle's nominal frequency and mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bus {
    pub freq: BusFrequency,
    pub mode: Mode,
}

impl Bus {
    pub fn new(freq_hz: u64, mode: Mode) -> Result<Self, ConfigError> {
        Ok(Self {
            freq: BusFrequency::new(freq_hz)?,
            mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_numbers() {
        for (n, mode) in Mode::ALL.iter().enumerate() {
            assert_eq!(mode.number() as usize, n);
            assert_eq!(Mode::try_from(n as u8).unwrap(), *mode);
        }
        assert_eq!(Mode::try_from(4), Err(ConfigError::InvalidMode(4)));
    }

    #[test]
    fn zero_frequency_rejected() {
        assert_eq!(BusFrequency::new(0), Err(ConfigError::ZeroBusFrequency));
    }

    #[test]
    fn half_period() {
        let f = BusFrequency::new(1_000_000).unwrap();
        assert_eq!(f.half_period_ticks(100_000_000), Ok(50));
        assert!(matches!(
            f.half_period_ticks(3_000_000),
            Err(ConfigError::ClockTooSlow { half_period: 1, .. })
        ));
    }

    #[test]
    fn bus_faster_than_any_clock_is_too_slow() {
        let f = BusFrequency::new(u64::MAX / 2 + 1).unwrap();
        assert!(matches!(
            f.half_period_ticks(u64::MAX),
            Err(ConfigError::ClockTooSlow { half_period: 0, .. })
        ));
    }

    #[test]
    fn undriven_miso_reads_low() {
        let lines = MasterLines::idle(Polarity::IdleHigh);
        let levels = BusLevels::resolve(lines, None);
        assert!(levels.cs_n);
        assert!(levels.clk);
        assert!(!levels.miso);
        assert!(BusLevels::resolve(lines, Some(true)).miso);
    }
}
