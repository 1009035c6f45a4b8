/// Compares a level with the one seen on the previous cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub rose: bool,
    pub fell: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeDetector {
    last: bool,
}

impl EdgeDetector {
    /// Starts from a known previous level so the first cycle does not report
    /// a spurious edge.
    pub fn new(initial: bool) -> Self {
        Self { last: initial }
    }

    /// Edge for this cycle's `level`; remembers it for the next cycle.
    pub fn step(&mut self, level: bool) -> Edge {
        let edge = self.peek(level);
        self.last = level;
        edge
    }

    /// Edge for `level` without remembering it.
    pub fn peek(&self, level: bool) -> Edge {
        Edge {
            rose: level && !self.last,
            fell: !level && self.last,
        }
    }
}
