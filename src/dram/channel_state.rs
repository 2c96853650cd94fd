use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, info};

use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::dram::command::{Address, BankAddr, Command, CommandKind};
use crate::dram::config::{DramConfig, RefreshPolicy};
use crate::dram::geometry::Geometry;
use crate::dram::tracker::BankTimingTracker;
use crate::timeq::Cycle;

#[derive(Debug, Clone, Default)]
struct BankState {
    open_row: Option<u32>,
    row_hits: u32,
    earliest: [Cycle; CommandKind::COUNT],
}

impl BankState {
    fn bump(&mut self, kind: CommandKind, at: Cycle) {
        let slot = &mut self.earliest[kind.index()];
        *slot = (*slot).max(at);
    }

    fn bump_reads(&mut self, at: Cycle) {
        self.bump(CommandKind::Read, at);
        self.bump(CommandKind::ReadPrecharge, at);
    }

    fn bump_writes(&mut self, at: Cycle) {
        self.bump(CommandKind::Write, at);
        self.bump(CommandKind::WritePrecharge, at);
    }

    fn bump_row_open(&mut self, at: Cycle) {
        self.bump(CommandKind::Activate, at);
        self.bump(CommandKind::Refresh, at);
        self.bump(CommandKind::RefreshBank, at);
    }
}

#[derive(Debug, Default)]
pub struct ChannelStateState {
    banks: Vec<BankState>,
    refresh_q: VecDeque<Command>,
    // next rank or bank (resource index) owed a staggered refresh
    next_refresh_target: usize,
}

/// Bank timing tracker for one channel: open rows, row-hit counts, per-command earliest-legal
/// cycles and the refresh obligations generated every tREFI.
pub struct ChannelState {
    base: ModuleBase<ChannelStateState, DramConfig>,
    geometry: Geometry,
}

impl ChannelState {
    pub fn new(config: Arc<DramConfig>) -> Self {
        config.ensure_valid();
        let geometry = config.geometry();
        info!(
            "channel state: {} ranks x {} bank groups x {} banks, refresh {:?}",
            geometry.ranks, geometry.bankgroups, geometry.banks_per_group, config.refresh_policy
        );
        let mut me = ChannelState {
            base: ModuleBase::<ChannelStateState, DramConfig> {
                state: ChannelStateState {
                    banks: vec![BankState::default(); geometry.num_banks()],
                    refresh_q: VecDeque::new(),
                    next_refresh_target: 0,
                },
                ..ModuleBase::default()
            },
            geometry,
        };
        me.init_conf(config);
        me
    }

    pub fn is_refresh_waiting(&self) -> bool {
        !self.base.state.refresh_q.is_empty()
    }

    pub fn pending_refresh_count(&self) -> usize {
        self.base.state.refresh_q.len()
    }

    /// Queue a refresh obligation directly, bypassing the tREFI generator.
    pub fn request_refresh(&mut self, refresh: Command) {
        assert!(refresh.is_refresh(), "{} is not a refresh", refresh);
        assert!(
            self.geometry.contains(refresh.bank_addr()),
            "refresh targets {:?} outside the channel",
            refresh.bank_addr()
        );
        self.base.state.refresh_q.push_back(refresh);
    }

    fn bank(&self, bank: BankAddr) -> &BankState {
        &self.base.state.banks[self.geometry.resource_index(bank)]
    }

    // A refresh needs every bank it covers closed and past its refresh constraint.
    fn is_issuable(&self, cmd: &Command, clk: Cycle) -> bool {
        match cmd.kind {
            CommandKind::Refresh => self
                .geometry
                .banks_in_rank(cmd.rank())
                .all(|bank| !self.is_row_open(bank) && self.is_legal(cmd.kind, bank, clk)),
            CommandKind::RefreshBank => {
                !self.is_row_open(cmd.bank_addr()) && self.is_legal(cmd.kind, cmd.bank_addr(), clk)
            }
            kind => self.is_legal(kind, cmd.bank_addr(), clk),
        }
    }

    /// Apply an issued command to row state and timing tables.
    pub fn update(&mut self, cmd: &Command, clk: Cycle) {
        debug_assert!(
            self.is_issuable(cmd, clk),
            "{} issued at {} before its legal cycle {} or onto an open row",
            cmd,
            clk,
            self.earliest_cycle(cmd.kind, cmd.bank_addr())
        );
        debug!("clk {}: {}", clk, cmd);

        let idx = self.geometry.resource_index(cmd.bank_addr());
        let rank_range = self.geometry.rank_indices(cmd.rank());
        let banks = &mut self.base.state.banks;
        match cmd.kind {
            CommandKind::Activate => {
                banks[idx].open_row = Some(cmd.row());
                banks[idx].row_hits = 0;
            }
            CommandKind::Read | CommandKind::Write => {
                banks[idx].row_hits = banks[idx].row_hits.saturating_add(1);
            }
            CommandKind::ReadPrecharge
            | CommandKind::WritePrecharge
            | CommandKind::Precharge
            | CommandKind::RefreshBank => {
                banks[idx].open_row = None;
                banks[idx].row_hits = 0;
            }
            CommandKind::Refresh => {
                for bank in &mut banks[rank_range] {
                    bank.open_row = None;
                    bank.row_hits = 0;
                }
            }
        }

        if cmd.is_refresh() {
            self.retire_refresh(cmd);
        }
        self.apply_timing(cmd, clk);
    }

    fn retire_refresh(&mut self, cmd: &Command) {
        let q = &mut self.base.state.refresh_q;
        let pos = q.iter().position(|pending| {
            pending.kind == cmd.kind
                && match cmd.kind {
                    CommandKind::Refresh => pending.rank() == cmd.rank(),
                    _ => pending.bank_addr() == cmd.bank_addr(),
                }
        });
        if let Some(pos) = pos {
            q.remove(pos);
        }
    }

    fn apply_timing(&mut self, cmd: &Command, clk: Cycle) {
        let t = self.conf().timing;
        let geometry = self.geometry;
        let target = cmd.bank_addr();
        let banks = &mut self.base.state.banks;

        for (idx, bank) in banks.iter_mut().enumerate() {
            let other = geometry.locate(idx);
            let same_rank = other.rank == target.rank;
            let same_group = same_rank && other.bankgroup == target.bankgroup;
            let same_bank = other == target;

            match cmd.kind {
                CommandKind::Activate => {
                    if same_bank {
                        bank.bump_reads(clk + t.t_rcd);
                        bank.bump_writes(clk + t.t_rcd);
                        bank.bump(CommandKind::Precharge, clk + t.t_ras);
                        bank.bump_row_open(clk + t.t_rc());
                    } else if same_group {
                        bank.bump(CommandKind::Activate, clk + t.t_rrd_l);
                    } else if same_rank {
                        bank.bump(CommandKind::Activate, clk + t.t_rrd_s);
                    }
                }
                CommandKind::Read | CommandKind::ReadPrecharge => {
                    if same_group {
                        bank.bump_reads(clk + t.t_ccd_l);
                        bank.bump_writes(clk + t.t_rtw);
                    } else if same_rank {
                        bank.bump_reads(clk + t.t_ccd_s);
                        bank.bump_writes(clk + t.t_rtw);
                    } else {
                        bank.bump_reads(clk + t.burst_cycles + t.t_rtrs);
                        bank.bump_writes(clk + t.burst_cycles + t.t_rtrs);
                    }
                    if same_bank {
                        bank.bump(CommandKind::Precharge, clk + t.t_rtp);
                        if cmd.kind == CommandKind::ReadPrecharge {
                            bank.bump_row_open(clk + t.t_rtp + t.t_rp);
                        }
                    }
                }
                CommandKind::Write | CommandKind::WritePrecharge => {
                    if same_group {
                        bank.bump_reads(clk + t.t_wtr);
                        bank.bump_writes(clk + t.t_ccd_l);
                    } else if same_rank {
                        bank.bump_reads(clk + t.t_wtr);
                        bank.bump_writes(clk + t.t_ccd_s);
                    } else {
                        bank.bump_reads(clk + t.burst_cycles + t.t_rtrs);
                        bank.bump_writes(clk + t.burst_cycles + t.t_rtrs);
                    }
                    if same_bank {
                        bank.bump(CommandKind::Precharge, clk + t.t_wr);
                        if cmd.kind == CommandKind::WritePrecharge {
                            bank.bump_row_open(clk + t.t_wr + t.t_rp);
                        }
                    }
                }
                CommandKind::Precharge => {
                    if same_bank {
                        bank.bump_row_open(clk + t.t_rp);
                    }
                }
                CommandKind::Refresh => {
                    if same_rank {
                        bank.bump_row_open(clk + t.t_rfc);
                    }
                }
                CommandKind::RefreshBank => {
                    if same_bank {
                        bank.bump_row_open(clk + t.t_rfcb);
                    } else if same_rank {
                        bank.bump(CommandKind::Refresh, clk + t.t_rfcb);
                    }
                }
            }
        }
    }

    fn generate_refresh(&mut self, clk: Cycle) {
        let policy = self.conf().refresh_policy;
        let t_refi = self.conf().timing.t_refi;
        let geometry = self.geometry;
        let refresh_for = |kind: CommandKind, bank: BankAddr| {
            Command::new(kind, Address::new(bank.rank, bank.bankgroup, bank.bank, 0, 0), 0, clk)
        };

        match policy {
            RefreshPolicy::Disabled => {}
            RefreshPolicy::RankLevelSimultaneous => {
                if clk % t_refi == 0 {
                    for rank in 0..geometry.ranks {
                        let cmd = refresh_for(CommandKind::Refresh, BankAddr::new(rank, 0, 0));
                        self.base.state.refresh_q.push_back(cmd);
                    }
                }
            }
            RefreshPolicy::RankLevelStaggered => {
                let interval = (t_refi / geometry.ranks as Cycle).max(1);
                if clk % interval == 0 {
                    let rank = self.base.state.next_refresh_target % geometry.ranks;
                    let cmd = refresh_for(CommandKind::Refresh, BankAddr::new(rank, 0, 0));
                    self.base.state.refresh_q.push_back(cmd);
                    self.base.state.next_refresh_target = (rank + 1) % geometry.ranks;
                }
            }
            RefreshPolicy::BankLevelStaggered => {
                let interval = (t_refi / geometry.num_banks() as Cycle).max(1);
                if clk % interval == 0 {
                    let idx = self.base.state.next_refresh_target % geometry.num_banks();
                    let cmd = refresh_for(CommandKind::RefreshBank, geometry.locate(idx));
                    self.base.state.refresh_q.push_back(cmd);
                    self.base.state.next_refresh_target = (idx + 1) % geometry.num_banks();
                }
            }
        }
    }
}

module!(ChannelState, ChannelStateState, DramConfig,);

impl ModuleBehaviors for ChannelState {
    fn tick_one(&mut self) {
        self.base.cycle += 1;
        let clk = self.base.cycle;
        self.generate_refresh(clk);
    }

    fn reset(&mut self) {
        let num_banks = self.geometry.num_banks();
        self.base.cycle = 0;
        self.base.state = ChannelStateState {
            banks: vec![BankState::default(); num_banks],
            ..ChannelStateState::default()
        };
    }
}

impl BankTimingTracker for ChannelState {
    fn open_row(&self, bank: BankAddr) -> Option<u32> {
        self.bank(bank).open_row
    }

    fn row_hit_count(&self, bank: BankAddr) -> u32 {
        self.bank(bank).row_hits
    }

    fn earliest_cycle(&self, kind: CommandKind, bank: BankAddr) -> Cycle {
        self.bank(bank).earliest[kind.index()]
    }

    fn pending_refresh(&self) -> Option<Command> {
        self.base.state.refresh_q.front().copied()
    }
}
