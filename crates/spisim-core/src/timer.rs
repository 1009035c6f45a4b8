//! Deadline-based one-shot timer.
//!
//! The timer counts its own ticks. Arming it with `go` sets a deadline
//! `period` ticks ahead; [`OneShot::triggered`] is true on exactly the tick the
//! deadline is reached. Arming again on the triggering tick makes it periodic.

#[derive(Debug, Clone)]
pub struct OneShot {
    period: u64,
    now: u64,
    deadline: Option<u64>,
}

impl OneShot {
    pub fn new(period: u64) -> Self {
        Self {
            period: period.max(1),
            now: 0,
            deadline: None,
        }
    }

    pub fn triggered(&self) -> bool {
        self.deadline == Some(self.now)
    }

    /// Advances one tick. `go` re-arms the timer, taking precedence over the
    /// disarm that follows a trigger.
    pub fn step(&mut self, go: bool) {
        if go {
            self.deadline = Some(self.now.saturating_add(self.period));
        } else if self.triggered() {
            self.deadline = None;
        }
        self.now += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_after_period() {
        let mut t = OneShot::new(3);
        t.step(true);
        let mut fired = Vec::new();
        for _ in 0..8 {
            fired.push(t.triggered());
            t.step(false);
        }
        assert_eq!(fired, [false, false, true, false, false, false, false, false]);
        assert_eq!(t.deadline, None);
    }

    #[test]
    fn rearming_on_trigger_is_periodic() {
        let mut t = OneShot::new(2);
        t.step(true);
        let mut hits = Vec::new();
        for cycle in 1..=8 {
            let fired = t.triggered();
            if fired {
                hits.push(cycle);
            }
            t.step(fired);
        }
        assert_eq!(hits, [2, 4, 6, 8]);
    }

    #[test]
    fn idle_timer_never_fires() {
        let mut t = OneShot::new(1);
        for _ in 0..4 {
            assert!(!t.triggered());
            t.step(false);
        }
    }
}
