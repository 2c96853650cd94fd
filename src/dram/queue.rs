use crate::dram::command::{BankAddr, Command};
use crate::dram::config::QueueStructure;
use crate::dram::geometry::Geometry;

pub type CmdQueue = Vec<Command>;

/// Per-resource FIFOs of commands that have not issued yet.
///
/// Partitions are allocated once at construction: one per bank for `PerBank`/`PerBankMlrr`,
/// one per rank for `PerRank`.  Each holds at most `capacity` commands.
#[derive(Debug, Clone)]
pub struct QueueSet {
    structure: QueueStructure,
    geometry: Geometry,
    capacity: usize,
    queues: Vec<CmdQueue>,
}

impl QueueSet {
    pub fn new(structure: QueueStructure, geometry: Geometry, capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be > 0");
        let num_queues = match structure {
            QueueStructure::PerRank => geometry.ranks,
            QueueStructure::PerBank | QueueStructure::PerBankMlrr => geometry.num_banks(),
        };
        let queues = (0..num_queues).map(|_| Vec::with_capacity(capacity)).collect();
        Self {
            structure,
            geometry,
            capacity,
            queues,
        }
    }

    pub fn num_queues(&self) -> usize {
        self.queues.len()
    }

    fn check_target(&self, rank: usize, bankgroup: usize, bank: usize) {
        let target = BankAddr::new(rank, bankgroup, bank);
        assert!(
            self.geometry.contains(target),
            "rank {} bankgroup {} bank {} outside configured channel ({} ranks, {} bank groups, {} banks per group)",
            rank,
            bankgroup,
            bank,
            self.geometry.ranks,
            self.geometry.bankgroups,
            self.geometry.banks_per_group
        );
    }

    pub fn queue_index(&self, rank: usize, bankgroup: usize, bank: usize) -> usize {
        match self.structure {
            QueueStructure::PerRank => rank,
            QueueStructure::PerBank | QueueStructure::PerBankMlrr => {
                self.geometry.resource_index(BankAddr::new(rank, bankgroup, bank))
            }
        }
    }

    /// Inverse of `queue_index`, as `(bank, bankgroup, rank)`.  A per-rank partition maps back
    /// to bank group 0, bank 0 of its rank.
    pub fn bank_bankgroup_rank(&self, queue_index: usize) -> (usize, usize, usize) {
        assert!(queue_index < self.queues.len(), "queue index {} out of range", queue_index);
        match self.structure {
            QueueStructure::PerRank => (0, 0, queue_index),
            QueueStructure::PerBank | QueueStructure::PerBankMlrr => {
                let b = self.geometry.locate(queue_index);
                (b.bank, b.bankgroup, b.rank)
            }
        }
    }

    pub fn will_accept_command(&self, rank: usize, bankgroup: usize, bank: usize) -> bool {
        self.check_target(rank, bankgroup, bank);
        self.queues[self.queue_index(rank, bankgroup, bank)].len() < self.capacity
    }

    /// Append `cmd` to its partition.  Returns false, leaving the set untouched, when full.
    ///
    /// Refreshes never enter a partition: they reach the scheduler through the tracker's
    /// pending refresh so the rank or bank can be held and precharged first.
    pub fn add_command(&mut self, cmd: Command) -> bool {
        assert!(!cmd.is_refresh(), "{} cannot be queued, refreshes come from the tracker", cmd);
        self.check_target(cmd.rank(), cmd.bankgroup(), cmd.bank());
        let capacity = self.capacity;
        let queue = self.queue_mut(cmd.rank(), cmd.bankgroup(), cmd.bank());
        if queue.len() < capacity {
            queue.push(cmd);
            true
        } else {
            false
        }
    }

    pub fn queue_empty(&self) -> bool {
        self.queues.iter().all(|q| q.is_empty())
    }

    pub fn queue_empty_at(&self, queue_index: usize) -> bool {
        self.queues[queue_index].is_empty()
    }

    /// No partition holds a command for `rank`.
    pub fn rank_queue_empty(&self, rank: usize) -> bool {
        match self.structure {
            QueueStructure::PerRank => self.queues[rank].is_empty(),
            QueueStructure::PerBank | QueueStructure::PerBankMlrr => {
                self.geometry.rank_indices(rank).all(|idx| self.queues[idx].is_empty())
            }
        }
    }

    pub fn queue(&self, rank: usize, bankgroup: usize, bank: usize) -> &CmdQueue {
        &self.queues[self.queue_index(rank, bankgroup, bank)]
    }

    pub fn queue_mut(&mut self, rank: usize, bankgroup: usize, bank: usize) -> &mut CmdQueue {
        let idx = self.queue_index(rank, bankgroup, bank);
        &mut self.queues[idx]
    }

    pub fn queue_at(&self, queue_index: usize) -> &CmdQueue {
        &self.queues[queue_index]
    }

    /// Commands queued for `bank`.  Per-rank partitions also hold other banks' commands.
    pub fn commands_for_bank(&self, bank: BankAddr) -> impl Iterator<Item = &Command> + '_ {
        self.queue(bank.rank, bank.bankgroup, bank.bank)
            .iter()
            .filter(move |cmd| cmd.bank_addr() == bank)
    }

    pub fn queue_usage(&self) -> usize {
        self.queues.iter().map(Vec::len).sum()
    }

    /// Remove the command at `pos` of partition `queue_index`, preserving the order of the rest.
    pub(crate) fn remove(&mut self, queue_index: usize, pos: usize) -> Command {
        self.queues[queue_index].remove(pos)
    }

    pub fn clear(&mut self) {
        self.queues.iter_mut().for_each(Vec::clear);
    }
}
