use serde::{Deserialize, Serialize};

use crate::bus::{Bus, Mode, SlaveSelect};
use crate::error::ConfigError;
use crate::shift_register::{ShiftDirection, MAX_WIDTH};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaveConfig {
    pub width: u32,
    pub direction: ShiftDirection,
    pub select: SlaveSelect,
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            width: 16,
            direction: ShiftDirection::Up,
            select: SlaveSelect::Bus,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Frequency of the clock that steps every state machine.
    pub system_clock_hz: u64,
    /// Nominal SPI clock frequency.
    pub bus_hz: u64,
    pub mode: Mode,
    /// Master shift register width in bits.
    pub width: u32,
    pub direction: ShiftDirection,
    pub slaves: Vec<SlaveConfig>,
    /// Record bus levels for every cycle.
    pub capture_waveform: bool,
    pub log_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            system_clock_hz: 100_000_000,
            bus_hz: 1_000_000,
            mode: Mode::MODE0,
            width: 16,
            direction: ShiftDirection::Up,
            slaves: vec![SlaveConfig::default()],
            capture_waveform: false,
            log_capacity: 10_000,
        }
    }
}

impl SimConfig {
    pub fn bus(&self) -> Result<Bus, ConfigError> {
        Bus::new(self.bus_hz, self.mode)
    }

    /// Checks every parameter and returns the bus half period in system
    /// clock ticks.
    pub fn validate(&self) -> Result<u64, ConfigError> {
        let half_period = self.bus()?.freq.half_period_ticks(self.system_clock_hz)?;
        for width in std::iter::once(self.width).chain(self.slaves.iter().map(|s| s.width)) {
            if width == 0 || width > MAX_WIDTH {
                return Err(ConfigError::InvalidWidth(width));
            }
        }
        Ok(half_period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert_eq!(SimConfig::default().validate(), Ok(50));
    }

    #[test]
    fn rejects_bad_slave_width() {
        let cfg = SimConfig {
            slaves: vec![SlaveConfig { width: 0, ..Default::default() }],
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidWidth(0)));
    }

    #[test]
    fn rejects_zero_bus_frequency() {
        let cfg = SimConfig { bus_hz: 0, ..Default::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroBusFrequency));
    }

    #[test]
    fn huge_bus_frequency_is_an_error() {
        let cfg = SimConfig { bus_hz: u64::MAX / 2 + 1, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::ClockTooSlow { .. })));
    }
}
