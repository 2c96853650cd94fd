/*
Cycle bookkeeping shared by the scheduling core, the bank timing tracker and the
utilization tracer.

Everything in the channel advances in lockstep with a single clock.  Components keep their own
copy of the current cycle (see `ModuleBase::cycle`) and express "not before" constraints as
absolute cycles.  Fixed-duration windows (refresh recovery, an activate still in flight as seen by
the tracer) are modelled with a `Countdown` that is decremented once per tick.
*/

pub type Cycle = u64;

// Whether a "not before" constraint is satisfied at `now`.
pub fn is_legal_at(earliest: Cycle, now: Cycle) -> bool {
    now >= earliest
}

/// A down-counter that reaches zero after a fixed number of ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Countdown {
    remaining: Cycle,
}

impl Countdown {
    pub fn start(&mut self, cycles: Cycle) {
        self.remaining = cycles;
    }

    pub fn clear(&mut self) {
        self.remaining = 0;
    }

    pub fn remaining(&self) -> Cycle {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.remaining > 0
    }

    /// Decrement by one cycle.  Returns true on the tick that brings the counter to zero.
    pub fn tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.remaining == 0
    }
}

#[cfg(test)]
mod tests {
    use super::Countdown;

    #[test]
    fn countdown_fires_once() {
        let mut c = Countdown::default();
        c.start(2);
        assert!(c.is_running());
        assert!(!c.tick());
        assert!(c.tick());
        assert!(!c.is_running());
        assert!(!c.tick());
    }

    #[test]
    fn idle_countdown_never_fires() {
        let mut c = Countdown::default();
        assert!(!c.tick());
        assert_eq!(0, c.remaining());
    }
}
