use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub cycle: u64,
    pub lane: Lane,
    pub bits: u32,
    pub data: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// Master to slave.
    Mosi,
    /// Slave to master.
    Miso,
}

pub struct TransferLog {
    entries: VecDeque<LogEntry>,
    max_entries: usize,
    show_mosi: bool,
    show_miso: bool,
}

impl TransferLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries,
            show_mosi: true,
            show_miso: true,
        }
    }

    pub fn set_filter(&mut self, show_mosi: bool, show_miso: bool) {
        self.show_mosi = show_mosi;
        self.show_miso = show_miso;
    }

    pub fn push(&mut self, cycle: u64, lane: Lane, bits: u32, data: u64) {
        self.entries.push_back(LogEntry {
            cycle,
            lane,
            bits,
            data,
        });

        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_text(&self, show_cycle: bool) -> String {
        let mut result = String::new();
        for entry in &self.entries {
            if (entry.lane == Lane::Mosi && !self.show_mosi) || (entry.lane == Lane::Miso && !self.show_miso) {
                continue;
            }

            if show_cycle {
                result.push_str(&format!("[{:>10}] ", entry.cycle));
            }
            let prefix = match entry.lane {
                Lane::Mosi => "MOSI: ",
                Lane::Miso => "MISO: ",
            };
            result.push_str(prefix);
            let digits = entry.bits.div_ceil(4).max(1) as usize;
            result.push_str(&format!("{:0digits$X} ({} bits)\n", entry.data, entry.bits));
        }
        result
    }
}
