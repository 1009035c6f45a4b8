//! SPI frame decoder for captured waveforms.
//!
//! Uses the same [`BusDecoder`] as the endpoints, so a capture decodes
//! exactly the way the slave on that bus would have seen it. Bits are taken
//! on SAMPLE events and grouped into words of `bits_per_word`; a frame runs
//! from START to STOP.

use serde::Serialize;
use spisim_core::{BusDecoder, BusEvent, BusLevels, Mode, Phase, Polarity};

use crate::{SampleRate, TimeSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpiWord {
    pub mosi: u64,
    pub miso: u64,
    pub bits: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpiFrame {
    pub cpol: bool,
    pub cpha: bool,
    pub words: Vec<SpiWord>,
    /// Trailing bits that did not fill a whole word.
    pub partial: Option<SpiWord>,
    /// False when the capture ended before chip select was released.
    pub complete: bool,
    pub span: TimeSpan,
}

impl SpiFrame {
    pub fn bit_count(&self) -> u32 {
        self.words.iter().map(|w| w.bits).sum::<u32>() + self.partial.map_or(0, |p| p.bits)
    }

    /// MOSI words as bytes, when the word size is 8.
    pub fn mosi_bytes(&self) -> Vec<u8> {
        self.words.iter().map(|w| w.mosi as u8).collect()
    }

    pub fn miso_bytes(&self) -> Vec<u8> {
        self.words.iter().map(|w| w.miso as u8).collect()
    }
}

#[derive(Debug, Clone, Default)]
struct Accumulator {
    mosi: u64,
    miso: u64,
    bits: u32,
}

impl Accumulator {
    fn push(&mut self, mosi: bool, miso: bool, msb_first: bool) {
        if msb_first {
            self.mosi = (self.mosi << 1) | mosi as u64;
            self.miso = (self.miso << 1) | miso as u64;
        } else {
            self.mosi |= (mosi as u64) << self.bits;
            self.miso |= (miso as u64) << self.bits;
        }
        self.bits += 1;
    }

    fn take(&mut self) -> Option<SpiWord> {
        if self.bits == 0 {
            return None;
        }
        let word = SpiWord {
            mosi: self.mosi,
            miso: self.miso,
            bits: self.bits,
        };
        *self = Self::default();
        Some(word)
    }
}

#[derive(Debug, Clone)]
struct OpenFrame {
    start: usize,
    words: Vec<SpiWord>,
    acc: Accumulator,
}

pub struct SpiDecoder {
    mode: Mode,
    bits_per_word: u32,
    msb_first: bool,
    sample_rate: SampleRate,
    decoder: BusDecoder,
    index: usize,
    frame: Option<OpenFrame>,
}

impl SpiDecoder {
    pub fn new(mode: Mode, bits_per_word: u32, sample_rate: SampleRate) -> Self {
        Self {
            mode,
            bits_per_word: bits_per_word.clamp(1, 64),
            msb_first: true,
            sample_rate,
            decoder: BusDecoder::new(mode),
            index: 0,
            frame: None,
        }
    }

    pub fn lsb_first(mut self) -> Self {
        self.msb_first = false;
        self
    }

    /// Feeds one sample; returns a frame when chip select is released.
    pub fn feed(&mut self, levels: &BusLevels) -> Option<SpiFrame> {
        let events = self.decoder.step(levels);
        let index = self.index;
        self.index += 1;

        if events.contains(BusEvent::Start) {
            self.frame = Some(OpenFrame {
                start: index,
                words: Vec::new(),
                acc: Accumulator::default(),
            });
        }
        if events.contains(BusEvent::Sample) {
            if let Some(frame) = self.frame.as_mut() {
                frame.acc.push(levels.mosi, levels.miso, self.msb_first);
                if frame.acc.bits == self.bits_per_word {
                    if let Some(word) = frame.acc.take() {
                        frame.words.push(word);
                    }
                }
            }
        }
        if events.contains(BusEvent::Stop) {
            return self.frame.take().map(|f| self.close(f, index, true));
        }
        None
    }

    /// Closes a frame left open at the end of a capture.
    pub fn finish(&mut self) -> Option<SpiFrame> {
        let end = self.index;
        self.frame.take().map(|f| self.close(f, end, false))
    }

    fn close(&self, mut frame: OpenFrame, end: usize, complete: bool) -> SpiFrame {
        SpiFrame {
            cpol: self.mode.polarity == Polarity::IdleHigh,
            cpha: self.mode.phase == Phase::SampleTrailing,
            partial: frame.acc.take(),
            words: frame.words,
            complete,
            span: TimeSpan {
                start_s: self.sample_rate.seconds(frame.start),
                end_s: self.sample_rate.seconds(end),
            },
        }
    }

    /// Decodes a whole capture, including a trailing unterminated frame.
    pub fn decode(mut self, samples: &[BusLevels]) -> Vec<SpiFrame> {
        let mut frames: Vec<SpiFrame> = samples.iter().filter_map(|s| self.feed(s)).collect();
        frames.extend(self.finish());
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spisim_core::{SimConfig, Simulation, SlaveConfig};

    const CLOCK_HZ: u64 = 8_000_000;

    fn capture(mode: Mode, transfers: &[(u64, u64, u32)]) -> Vec<BusLevels> {
        let cfg = SimConfig {
            system_clock_hz: CLOCK_HZ,
            bus_hz: 1_000_000,
            mode,
            width: 16,
            slaves: vec![SlaveConfig::default()],
            capture_waveform: true,
            ..Default::default()
        };
        let mut sim = Simulation::new(cfg).unwrap();
        for &(mosi, miso, size) in transfers {
            sim.preload(0, miso, size).unwrap();
            sim.transfer(mosi, size).unwrap();
        }
        sim.take_waveform()
    }

    fn decoder(mode: Mode) -> SpiDecoder {
        SpiDecoder::new(mode, 8, SampleRate(CLOCK_HZ as f64))
    }

    #[test]
    fn decodes_bytes_in_every_mode() {
        for mode in Mode::ALL {
            let wave = capture(mode, &[(0xC4, 0x42, 8), (0xBEEF, 0x1234, 16)]);
            let frames = decoder(mode).decode(&wave);
            assert_eq!(frames.len(), 2, "mode {}", mode.number());
            assert_eq!(frames[0].mosi_bytes(), [0xC4]);
            assert_eq!(frames[0].miso_bytes(), [0x42]);
            assert_eq!(frames[1].mosi_bytes(), [0xBE, 0xEF]);
            assert_eq!(frames[1].miso_bytes(), [0x12, 0x34]);
            assert!(frames.iter().all(|f| f.complete && f.partial.is_none()));
            assert_eq!(frames[0].cpol, mode.polarity == Polarity::IdleHigh);
            assert_eq!(frames[0].cpha, mode.phase == Phase::SampleTrailing);
        }
    }

    #[test]
    fn trailing_bits_are_partial() {
        let wave = capture(Mode::MODE0, &[(0x090, 0x5A5, 12)]);
        let frames = decoder(Mode::MODE0).decode(&wave);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].words, [SpiWord { mosi: 0x09, miso: 0x5A, bits: 8 }]);
        assert_eq!(frames[0].partial, Some(SpiWord { mosi: 0x0, miso: 0x5, bits: 4 }));
        assert_eq!(frames[0].bit_count(), 12);
    }

    #[test]
    fn frame_span_covers_the_transfer() {
        let wave = capture(Mode::MODE0, &[(0xC4, 0x42, 8)]);
        let frames = decoder(Mode::MODE0).decode(&wave);
        let span = frames[0].span;
        // eight bus cycles plus the half period before the first edge
        assert!(span.duration_s() >= 8.0e-6);
        assert!(span.duration_s() < 10.0e-6);
        assert!(span.start_s > 0.0);
    }

    #[test]
    fn truncated_capture_yields_incomplete_frame() {
        let wave = capture(Mode::MODE0, &[(0xBEEF, 0x1234, 16)]);
        let cut = &wave[..wave.len() / 2];
        let frames = decoder(Mode::MODE0).decode(cut);
        assert_eq!(frames.len(), 1);
        assert!(!frames[0].complete);
        assert!(frames[0].bit_count() < 16);
    }

    #[test]
    fn lsb_first_words() {
        let wave = capture(Mode::MODE0, &[(0x01, 0x80, 8)]);
        let frames = decoder(Mode::MODE0).lsb_first().decode(&wave);
        assert_eq!(frames[0].words, [SpiWord { mosi: 0x80, miso: 0x01, bits: 8 }]);
    }
}
