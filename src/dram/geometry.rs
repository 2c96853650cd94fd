use crate::dram::command::BankAddr;

/// Shape of one channel: ranks × bank groups × banks per group.
///
/// The flattened resource index `rank * banks_per_rank + bankgroup * banks_per_group + bank`
/// identifies a bank for the lifetime of the channel and indexes every per-bank array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub ranks: usize,
    pub bankgroups: usize,
    pub banks_per_group: usize,
}

impl Geometry {
    pub fn new(ranks: usize, bankgroups: usize, banks_per_group: usize) -> Self {
        assert!(ranks > 0, "channel must have at least one rank");
        assert!(bankgroups > 0, "rank must have at least one bank group");
        assert!(banks_per_group > 0, "bank group must have at least one bank");
        Self { ranks, bankgroups, banks_per_group }
    }

    pub fn banks_per_rank(&self) -> usize {
        self.bankgroups * self.banks_per_group
    }

    pub fn num_banks(&self) -> usize {
        self.ranks * self.banks_per_rank()
    }

    pub fn contains(&self, bank: BankAddr) -> bool {
        bank.rank < self.ranks && bank.bankgroup < self.bankgroups && bank.bank < self.banks_per_group
    }

    pub fn resource_index(&self, bank: BankAddr) -> usize {
        debug_assert!(self.contains(bank), "{:?} outside {:?}", bank, self);
        bank.rank * self.banks_per_rank() + bank.bankgroup * self.banks_per_group + bank.bank
    }

    pub fn locate(&self, index: usize) -> BankAddr {
        debug_assert!(index < self.num_banks(), "resource index {} out of range", index);
        let within_rank = index % self.banks_per_rank();
        BankAddr {
            rank: index / self.banks_per_rank(),
            bankgroup: within_rank / self.banks_per_group,
            bank: within_rank % self.banks_per_group,
        }
    }

    /// Resource indices of every bank in `rank`, in index order.
    pub fn rank_indices(&self, rank: usize) -> std::ops::Range<usize> {
        let start = rank * self.banks_per_rank();
        start..start + self.banks_per_rank()
    }

    pub fn banks_in_rank(&self, rank: usize) -> impl Iterator<Item = BankAddr> + '_ {
        self.rank_indices(rank).map(move |idx| self.locate(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::Geometry;
    use crate::dram::command::BankAddr;

    #[test]
    fn resource_index_round_trips() {
        let geo = Geometry::new(2, 4, 4);
        for idx in 0..geo.num_banks() {
            assert_eq!(idx, geo.resource_index(geo.locate(idx)));
        }
        assert_eq!(BankAddr::new(1, 2, 3), geo.locate(16 + 8 + 3));
    }

    #[test]
    fn rank_indices_cover_rank() {
        let geo = Geometry::new(2, 2, 2);
        assert_eq!(4..8, geo.rank_indices(1));
        assert!(geo.banks_in_rank(1).all(|b| b.rank == 1));
        assert!(!geo.contains(BankAddr::new(2, 0, 0)));
    }
}
