//! Fixed-width shift registers used as the data path of both endpoints.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const MAX_WIDTH: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftDirection {
    /// Shifts towards the MSB: the MSB goes out first, new bits enter at bit 0.
    #[default]
    Up,
    /// Shifts towards the LSB: the LSB goes out first, new bits enter at the top.
    Down,
}

impl ShiftDirection {
    /// Places the low `size` bits of `data` so they are the first `size` bits
    /// shifted out of a `width`-bit register.
    pub fn align(self, data: u64, size: u32, width: u32) -> u64 {
        let data = data & mask(size);
        match self {
            ShiftDirection::Up => data << (width - size),
            ShiftDirection::Down => data,
        }
    }

    /// Recovers the `size` bits most recently shifted into a register.
    pub fn extract(self, word: u64, size: u32, width: u32) -> u64 {
        if size == 0 {
            return 0;
        }
        match self {
            ShiftDirection::Up => word & mask(size),
            ShiftDirection::Down => (word >> (width - size)) & mask(size),
        }
    }
}

/// Mask of the low `bits` bits.
pub fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

#[derive(Debug, Clone)]
pub struct ShiftRegister {
    width: u32,
    direction: ShiftDirection,
    word: u64,
}

impl ShiftRegister {
    pub fn new(width: u32, direction: ShiftDirection) -> Result<Self, ConfigError> {
        if width == 0 || width > MAX_WIDTH {
            return Err(ConfigError::InvalidWidth(width));
        }
        Ok(Self {
            width,
            direction,
            word: 0,
        })
    }

    pub fn up(width: u32) -> Result<Self, ConfigError> {
        Self::new(width, ShiftDirection::Up)
    }

    pub fn down(width: u32) -> Result<Self, ConfigError> {
        Self::new(width, ShiftDirection::Down)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn direction(&self) -> ShiftDirection {
        self.direction
    }

    /// Parallel load. Bits above the register width are dropped.
    pub fn latch(&mut self, word: u64) {
        self.word = word & mask(self.width);
    }

    pub fn shift(&mut self, bit_in: bool) {
        let bit = bit_in as u64;
        self.word = match self.direction {
            ShiftDirection::Up => ((self.word << 1) | bit) & mask(self.width),
            ShiftDirection::Down => (self.word >> 1) | (bit << (self.width - 1)),
        };
    }

    pub fn word(&self) -> u64 {
        self.word
    }

    /// The bit that the next shift pushes out.
    pub fn bit_out(&self) -> bool {
        match self.direction {
            ShiftDirection::Up => (self.word >> (self.width - 1)) & 1 != 0,
            ShiftDirection::Down => self.word & 1 != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_width() {
        assert!(ShiftRegister::up(0).is_err());
        assert!(ShiftRegister::up(65).is_err());
        assert!(ShiftRegister::up(64).is_ok());
    }

    #[test]
    fn up_shifts_msb_first() {
        let mut reg = ShiftRegister::up(4).unwrap();
        reg.latch(0b1010);
        let mut out = Vec::new();
        for bit_in in [true, true, false, true] {
            out.push(reg.bit_out());
            reg.shift(bit_in);
        }
        assert_eq!(out, [true, false, true, false]);
        assert_eq!(reg.word(), 0b1101);
    }

    #[test]
    fn down_shifts_lsb_first() {
        let mut reg = ShiftRegister::down(4).unwrap();
        reg.latch(0b1010);
        let mut out = Vec::new();
        for bit_in in [true, true, false, true] {
            out.push(reg.bit_out());
            reg.shift(bit_in);
        }
        assert_eq!(out, [false, true, false, true]);
        assert_eq!(reg.word(), 0b1011);
    }

    #[test]
    fn latch_truncates_to_width() {
        let mut reg = ShiftRegister::up(8).unwrap();
        reg.latch(0x1234);
        assert_eq!(reg.word(), 0x34);
    }

    #[test]
    fn full_width_register() {
        let mut reg = ShiftRegister::up(64).unwrap();
        reg.latch(u64::MAX);
        assert!(reg.bit_out());
        reg.shift(false);
        assert_eq!(reg.word(), u64::MAX - 1);
    }

    #[test]
    fn align_and_extract() {
        assert_eq!(ShiftDirection::Up.align(0xC4, 8, 16), 0xC400);
        assert_eq!(ShiftDirection::Up.extract(0xAB42, 8, 16), 0x42);
        assert_eq!(ShiftDirection::Down.align(0x1C4, 8, 16), 0xC4);
        assert_eq!(ShiftDirection::Down.extract(0x4200, 8, 16), 0x42);
        assert_eq!(ShiftDirection::Down.extract(u64::MAX, 0, 64), 0);
    }
}
