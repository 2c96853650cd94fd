use crate::dram::config::QueueStructure;
use crate::dram::geometry::Geometry;

/// Round-robin pointer over `len` slots.
///
/// `cursor` names the slot to favour next and `next` is where the rotation resumes after the last
/// serviced slot.  They differ only while a slot that was passed over keeps its priority; the
/// other slots still rotate behind it.  Both move only through `advance`, which the scheduler
/// calls exactly when a slot was serviced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRobin {
    cursor: usize,
    next: usize,
    len: usize,
}

impl RoundRobin {
    pub fn new(len: usize) -> Self {
        assert!(len > 0, "round robin over zero slots");
        Self { cursor: 0, next: 0, len }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Slots in priority order: the cursor, then every other slot starting at `next`.
    pub fn order(&self) -> impl Iterator<Item = usize> {
        let (cursor, next, len) = (self.cursor, self.next, self.len);
        std::iter::once(cursor).chain(
            (0..len)
                .map(move |offset| (next + offset) % len)
                .filter(move |&slot| slot != cursor),
        )
    }

    /// `serviced` was just issued from.  `passed_over` is the first slot ahead of it in scan
    /// order that had work but nothing eligible; the cursor stays there so it is not skipped.
    pub fn advance(&mut self, serviced: usize, passed_over: Option<usize>) {
        debug_assert!(serviced < self.len);
        self.next = (serviced + 1) % self.len;
        self.cursor = passed_over.unwrap_or(self.next);
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
        self.next = 0;
    }
}

/// Nested rank → bank group → bank cursors for multi-level round robin.
#[derive(Debug, Clone)]
pub struct MlrrCursors {
    pub rank: RoundRobin,
    // per rank
    pub bankgroup: Vec<RoundRobin>,
    // per rank, per bank group
    pub bank: Vec<Vec<RoundRobin>>,
}

impl MlrrCursors {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            rank: RoundRobin::new(geometry.ranks),
            bankgroup: vec![RoundRobin::new(geometry.bankgroups); geometry.ranks],
            bank: vec![vec![RoundRobin::new(geometry.banks_per_group); geometry.bankgroups]; geometry.ranks],
        }
    }

    /// Every level steps past the element that was serviced.
    pub fn advance(&mut self, rank: usize, bankgroup: usize, bank: usize) {
        self.bank[rank][bankgroup].advance(bank, None);
        self.bankgroup[rank].advance(bankgroup, None);
        self.rank.advance(rank, None);
    }

    fn reset(&mut self) {
        self.rank.reset();
        self.bankgroup.iter_mut().for_each(RoundRobin::reset);
        self.bank.iter_mut().flatten().for_each(RoundRobin::reset);
    }
}

/// Selection order for the configured queue structure, chosen once at construction.
#[derive(Debug, Clone)]
pub enum Arbiter {
    /// One cursor over per-bank partitions.
    PerBank(RoundRobin),
    /// One cursor over per-rank partitions.
    PerRank(RoundRobin),
    Mlrr(MlrrCursors),
}

impl Arbiter {
    pub fn new(structure: QueueStructure, geometry: Geometry) -> Self {
        match structure {
            QueueStructure::PerBank => Arbiter::PerBank(RoundRobin::new(geometry.num_banks())),
            QueueStructure::PerRank => Arbiter::PerRank(RoundRobin::new(geometry.ranks)),
            QueueStructure::PerBankMlrr => Arbiter::Mlrr(MlrrCursors::new(geometry)),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Arbiter::PerBank(rr) | Arbiter::PerRank(rr) => rr.reset(),
            Arbiter::Mlrr(cursors) => cursors.reset(),
        }
    }
}
