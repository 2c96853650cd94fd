use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dram::geometry::Geometry;
use crate::sim::config::Config;
use crate::timeq::Cycle;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStructure {
    PerRank,
    #[default]
    PerBank,
    /// Per-bank queues arbitrated rank → bank group → bank.
    PerBankMlrr,
}

impl FromStr for QueueStructure {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "PER_RANK" | "per_rank" => Ok(Self::PerRank),
            "PER_BANK" | "per_bank" => Ok(Self::PerBank),
            "PER_BANK_MLRR" | "per_bank_mlrr" => Ok(Self::PerBankMlrr),
            _ => Err(format!(
                "unsupported queue structure '{}', expected one of: PER_RANK, PER_BANK, PER_BANK_MLRR",
                value
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowBufPolicy {
    #[default]
    OpenPage,
    ClosePage,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefreshPolicy {
    RankLevelSimultaneous,
    #[default]
    RankLevelStaggered,
    BankLevelStaggered,
    Disabled,
}

/// Device timing parameters, all in controller clock cycles.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct TimingConfig {
    pub burst_cycles: Cycle,
    pub t_rcd: Cycle,
    pub t_rp: Cycle,
    pub t_ras: Cycle,
    pub t_rtp: Cycle,
    // write to precharge, including write latency and burst
    pub t_wr: Cycle,
    pub t_ccd_s: Cycle,
    pub t_ccd_l: Cycle,
    pub t_rrd_s: Cycle,
    pub t_rrd_l: Cycle,
    // write to read, including write latency and burst
    pub t_wtr: Cycle,
    pub t_rtw: Cycle,
    // rank to rank switch
    pub t_rtrs: Cycle,
    pub t_rfc: Cycle,
    pub t_rfcb: Cycle,
    pub t_refi: Cycle,
}

impl Default for TimingConfig {
    fn default() -> Self {
        // DDR4-2400 x8, rounded
        Self {
            burst_cycles: 4,
            t_rcd: 16,
            t_rp: 16,
            t_ras: 39,
            t_rtp: 9,
            t_wr: 34,
            t_ccd_s: 4,
            t_ccd_l: 6,
            t_rrd_s: 4,
            t_rrd_l: 6,
            t_wtr: 25,
            t_rtw: 8,
            t_rtrs: 2,
            t_rfc: 420,
            t_rfcb: 120,
            t_refi: 9360,
        }
    }
}

impl TimingConfig {
    /// Activate to activate on the same bank.
    pub fn t_rc(&self) -> Cycle {
        self.t_ras + self.t_rp
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DramConfig {
    pub ranks: usize,
    pub bankgroups: usize,
    pub banks_per_group: usize,
    pub rows: u32,
    pub columns: u32,
    /// Bytes moved by one read/write burst; the low address bits below this are dropped.
    pub burst_bytes: u64,
    pub cmd_queue_size: usize,
    pub queue_structure: QueueStructure,
    pub row_buf_policy: RowBufPolicy,
    pub refresh_policy: RefreshPolicy,
    /// Row hits after which a pending row miss may close the row anyway.
    pub row_hit_limit: u32,
    /// Cycles a requested refresh lets ready row hits in its scope drain before holding.
    pub refresh_drain_cycles: Cycle,
    pub timing: TimingConfig,
}

impl Config for DramConfig {}

impl Config for TimingConfig {}

impl Default for DramConfig {
    fn default() -> Self {
        let s = Self {
            ranks: 2,
            bankgroups: 4,
            banks_per_group: 4,
            rows: 1 << 16,
            columns: 1 << 10,
            burst_bytes: 64,
            cmd_queue_size: 8,
            queue_structure: QueueStructure::PerBank,
            row_buf_policy: RowBufPolicy::OpenPage,
            refresh_policy: RefreshPolicy::RankLevelStaggered,
            row_hit_limit: 4,
            refresh_drain_cycles: 0,
            timing: TimingConfig::default(),
        };
        s.ensure_valid();
        s
    }
}

impl DramConfig {
    /// Fail fast on configurations the scheduling core cannot index safely.
    pub fn ensure_valid(&self) {
        assert!(self.ranks > 0, "ranks must be > 0");
        assert!(self.bankgroups > 0, "bankgroups must be > 0");
        assert!(self.banks_per_group > 0, "banks_per_group must be > 0");
        assert!(self.rows.is_power_of_two(), "rows must be a power of two");
        assert!(self.columns.is_power_of_two(), "columns must be a power of two");
        assert!(self.burst_bytes.is_power_of_two(), "burst_bytes must be a power of two");
        assert!(self.cmd_queue_size > 0, "cmd_queue_size must be > 0");
        assert!(self.row_hit_limit > 0, "row_hit_limit must be > 0");
        assert!(self.timing.burst_cycles > 0, "burst_cycles must be > 0");
        if self.refresh_policy != RefreshPolicy::Disabled {
            assert!(self.timing.t_refi > 0, "t_refi must be > 0 when refresh is enabled");
        }
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.ranks, self.bankgroups, self.banks_per_group)
    }

    pub fn banks_per_rank(&self) -> usize {
        self.bankgroups * self.banks_per_group
    }

    pub fn num_queues(&self) -> usize {
        match self.queue_structure {
            QueueStructure::PerRank => self.ranks,
            QueueStructure::PerBank | QueueStructure::PerBankMlrr => self.ranks * self.banks_per_rank(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DramConfig, QueueStructure};

    #[test]
    fn parses_queue_structure_names() {
        assert_eq!(Ok(QueueStructure::PerRank), "PER_RANK".parse());
        assert_eq!(Ok(QueueStructure::PerBankMlrr), "per_bank_mlrr".parse());
        assert!("PER_CHANNEL".parse::<QueueStructure>().is_err());
    }

    #[test]
    fn deserializes_partial_section() {
        let cfg: DramConfig = toml::from_str(
            "ranks = 1\nqueue_structure = \"PER_RANK\"\n[timing]\nt_rcd = 3\n",
        )
        .expect("valid dram section");
        assert_eq!(1, cfg.ranks);
        assert_eq!(QueueStructure::PerRank, cfg.queue_structure);
        assert_eq!(3, cfg.timing.t_rcd);
        assert_eq!(16, cfg.timing.t_rp);
        assert_eq!(1, cfg.num_queues());
    }

    #[test]
    #[should_panic(expected = "cmd_queue_size")]
    fn rejects_zero_queue_size() {
        let mut cfg = DramConfig::default();
        cfg.cmd_queue_size = 0;
        cfg.ensure_valid();
    }
}
