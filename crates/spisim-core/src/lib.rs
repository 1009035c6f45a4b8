//! Core functionalities: bus model, clock engine, decoder, shift-register
//! endpoints, lockstep simulation and the threaded service front end.

pub mod bus;
pub mod clock_engine;
pub mod config;
pub mod decoder;
pub mod edge;
pub mod error;
pub mod master;
pub mod mux;
pub mod shift_register;
pub mod sim;
pub mod slave;
pub mod spi_service;
pub mod timer;
pub mod transfer_log;

pub use bus::{Bus, BusFrequency, BusLevels, MasterLines, Mode, Phase, Polarity, SlaveLines, SlaveSelect};
pub use clock_engine::{ClockEngine, ClockState};
pub use config::{SimConfig, SlaveConfig};
pub use decoder::{BusDecoder, BusEvent, EventMask};
pub use error::{ConfigError, SimError, SimResult};
pub use master::{MasterInterface, MasterState, ShiftMaster};
pub use mux::{Direction, Layout, Multiplexer};
pub use shift_register::{ShiftDirection, ShiftRegister};
pub use sim::{Completion, Simulation, SlaveId, SlaveReport};
pub use slave::ShiftSlave;
pub use spi_service::{SpiEvent, SpiService};
pub use transfer_log::{Lane, LogEntry, TransferLog};
