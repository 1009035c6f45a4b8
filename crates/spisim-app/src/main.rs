use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{info, LevelFilter, Log, Metadata, Record};
use serde::Deserialize;
use spisim_core::{SimConfig, SlaveSelect, SpiEvent, SpiService};
use spisim_decode::{SampleRate, SpiDecoder};

#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default)]
    sim: SimConfig,
    #[serde(default = "default_word_bits")]
    word_bits: u32,
    transfers: Vec<Exchange>,
}

#[derive(Debug, Deserialize)]
struct Exchange {
    /// Hex payload sent by the master.
    mosi: String,
    /// Hex response preloaded into the slave.
    #[serde(default)]
    miso: Option<String>,
    /// Defaults to the payload's byte length times eight.
    #[serde(default)]
    bits: Option<u32>,
    #[serde(default)]
    slave: usize,
}

fn default_word_bits() -> u32 {
    8
}

impl Scenario {
    fn builtin() -> Self {
        let transfer = |mosi: &str, miso: &str, bits| Exchange {
            mosi: mosi.into(),
            miso: Some(miso.into()),
            bits: Some(bits),
            slave: 0,
        };
        Self {
            sim: SimConfig::default(),
            word_bits: default_word_bits(),
            transfers: vec![
                transfer("c4", "42", 8),
                transfer("beef", "1234", 16),
                transfer("0090", "05a5", 12),
            ],
        }
    }
}

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging() {
    let level = std::env::var("SPISIM_LOG")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(LevelFilter::Info);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn default_scenario_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("spisim").join("scenario.json"))
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Parses a big-endian hex string into a word and its natural bit length.
fn parse_hex(text: &str) -> Result<(u64, u32)> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    let bytes = hex::decode(digits).with_context(|| format!("bad hex payload {text:?}"))?;
    if bytes.is_empty() || bytes.len() > 8 {
        bail!("payload {text:?} must be 1 to 8 bytes");
    }
    let word = bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
    Ok((word, 8 * bytes.len() as u32))
}

fn main() -> Result<()> {
    init_logging();

    let scenario = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => load_scenario(&path)?,
        None => match default_scenario_path().filter(|p| p.exists()) {
            Some(path) => load_scenario(&path)?,
            None => {
                info!("no scenario file, running the built-in one");
                Scenario::builtin()
            }
        },
    };

    let mut config = scenario.sim.clone();
    config.capture_waveform = true;
    let sample_rate = SampleRate(config.system_clock_hz as f64);
    let mode = config.mode;
    let service = SpiService::open(config).context("opening simulation")?;

    for ex in &scenario.transfers {
        let (mosi, natural_bits) = parse_hex(&ex.mosi)?;
        let bits = ex.bits.unwrap_or(natural_bits);
        for slave in 0..service.config().slaves.len() {
            let select = if slave == ex.slave { SlaveSelect::Bus } else { SlaveSelect::Deasserted };
            service.set_select(slave, select)?;
        }
        if let Some(miso) = &ex.miso {
            let (miso, _) = parse_hex(miso)?;
            service.preload(ex.slave, miso, bits)?;
        }
        service.transfer(mosi, bits)?;
        match service.next_reply()? {
            SpiEvent::Done(done) => {
                let digits = bits.div_ceil(4) as usize;
                println!(
                    "{bits:>2} bits  mosi {:0digits$x}  miso {:0digits$x}  ({} cycles)",
                    done.mosi, done.miso, done.cycles
                );
                for report in &done.slaves {
                    println!(
                        "         slave {} got {:0digits$x} ({} bits{})",
                        report.id,
                        report.data,
                        report.transfer_size,
                        if report.overrun { ", overrun" } else { "" }
                    );
                }
            }
            SpiEvent::Error(e) => bail!("transfer {}: {e}", ex.mosi),
            other => bail!("unexpected event {other:?}"),
        }
    }

    service.request_waveform()?;
    let frames = match service.next_reply()? {
        SpiEvent::Waveform(levels) => SpiDecoder::new(mode, scenario.word_bits, sample_rate).decode(&levels),
        other => bail!("unexpected event {other:?}"),
    };

    println!();
    print!("{}", service.transfer_log().to_text(true));
    println!();
    println!("{}", serde_json::to_string_pretty(&frames)?);

    service.close();
    Ok(())
}
