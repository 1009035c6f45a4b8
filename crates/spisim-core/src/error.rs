use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("bus frequency must be non-zero")]
    ZeroBusFrequency,
    #[error("system clock {system_clock_hz} Hz cannot time a {bus_hz} Hz bus (half period of {half_period} ticks, need at least 2)")]
    ClockTooSlow {
        system_clock_hz: u64,
        bus_hz: u64,
        half_period: u64,
    },
    #[error("register width {0} is outside 1..=64")]
    InvalidWidth(u32),
    #[error("invalid {what} value {value}, expected 0 or 1")]
    InvalidModeBit { what: &'static str, value: u8 },
    #[error("invalid SPI mode {0}, expected 0..=3")]
    InvalidMode(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("transfer size {size} is outside 1..={width}")]
    InvalidTransferSize { size: u32, width: u32 },
    #[error("start asserted while a transfer is in flight")]
    StartWhileBusy,
    #[error("clock enable raised again before chip select was released")]
    EnableWhileActive,
    #[error("{drivers} slaves drove miso in cycle {cycle}")]
    BusContention { cycle: u64, drivers: usize },
    #[error("transfer did not complete within {cycles} cycles")]
    Timeout { cycles: u64 },
    #[error("no slave with id {0}")]
    UnknownSlave(usize),
    #[error("multiplexer select {select} out of range for {leaves} leaves")]
    SelectOutOfRange { select: usize, leaves: usize },
    #[error("simulation thread is gone")]
    Disconnected,
}

pub type SimResult<T> = Result<T, SimError>;
