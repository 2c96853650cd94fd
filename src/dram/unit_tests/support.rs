use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use crate::dram::command::{Address, BankAddr, Command, CommandKind, Issue};
use crate::dram::command_queue::CommandQueue;
use crate::dram::config::{DramConfig, QueueStructure, RefreshPolicy, TimingConfig};
use crate::dram::tracker::BankTimingTracker;
use crate::timeq::Cycle;

/// Scriptable tracker: everything is legal unless a test says otherwise.
#[derive(Debug, Default)]
pub struct FakeTracker {
    pub open_rows: HashMap<BankAddr, u32>,
    pub row_hits: HashMap<BankAddr, u32>,
    pub earliest: HashMap<(CommandKind, BankAddr), Cycle>,
    pub refresh: Option<Command>,
}

impl FakeTracker {
    pub fn open(&mut self, bank: BankAddr, row: u32) {
        self.open_rows.insert(bank, row);
    }

    pub fn block(&mut self, kind: CommandKind, bank: BankAddr, until: Cycle) {
        self.earliest.insert((kind, bank), until);
    }

    pub fn unblock(&mut self, kind: CommandKind, bank: BankAddr) {
        self.earliest.remove(&(kind, bank));
    }

    /// Minimal row bookkeeping for an issued command, no timing.
    pub fn apply(&mut self, cmd: &Command) {
        let bank = cmd.bank_addr();
        match cmd.kind {
            CommandKind::Activate => {
                self.open_rows.insert(bank, cmd.row());
                self.row_hits.insert(bank, 0);
            }
            CommandKind::Read | CommandKind::Write => {
                *self.row_hits.entry(bank).or_default() += 1;
            }
            CommandKind::Precharge
            | CommandKind::ReadPrecharge
            | CommandKind::WritePrecharge
            | CommandKind::RefreshBank => {
                self.open_rows.remove(&bank);
                self.row_hits.remove(&bank);
            }
            CommandKind::Refresh => {
                self.open_rows.retain(|b, _| b.rank != cmd.rank());
                self.row_hits.retain(|b, _| b.rank != cmd.rank());
            }
        }
        if cmd.is_refresh() {
            self.refresh = None;
        }
    }
}

impl BankTimingTracker for FakeTracker {
    fn open_row(&self, bank: BankAddr) -> Option<u32> {
        self.open_rows.get(&bank).copied()
    }

    fn row_hit_count(&self, bank: BankAddr) -> u32 {
        self.row_hits.get(&bank).copied().unwrap_or(0)
    }

    fn earliest_cycle(&self, kind: CommandKind, bank: BankAddr) -> Cycle {
        self.earliest.get(&(kind, bank)).copied().unwrap_or(0)
    }

    fn pending_refresh(&self) -> Option<Command> {
        self.refresh
    }
}

pub fn small_timing() -> TimingConfig {
    TimingConfig {
        burst_cycles: 1,
        t_rcd: 2,
        t_rp: 2,
        t_ras: 5,
        t_rtp: 1,
        t_wr: 3,
        t_ccd_s: 1,
        t_ccd_l: 1,
        t_rrd_s: 1,
        t_rrd_l: 1,
        t_wtr: 2,
        t_rtw: 2,
        t_rtrs: 1,
        t_rfc: 3,
        t_rfcb: 2,
        t_refi: 1000,
    }
}

pub fn config(structure: QueueStructure, ranks: usize, bankgroups: usize, banks_per_group: usize) -> DramConfig {
    DramConfig {
        ranks,
        bankgroups,
        banks_per_group,
        cmd_queue_size: 8,
        queue_structure: structure,
        refresh_policy: RefreshPolicy::Disabled,
        timing: small_timing(),
        ..DramConfig::default()
    }
}

pub fn cmd(kind: CommandKind, rank: usize, bankgroup: usize, bank: usize, row: u32, column: u32) -> Command {
    Command::new(kind, Address::new(rank, bankgroup, bank, row, column), 0, 0)
}

pub fn read(rank: usize, bankgroup: usize, bank: usize, row: u32) -> Command {
    cmd(CommandKind::Read, rank, bankgroup, bank, row, 0)
}

pub fn refresh_rank(rank: usize) -> Command {
    cmd(CommandKind::Refresh, rank, 0, 0, 0, 0)
}

/// One scheduling cycle: arbitrate, apply to the tracker, advance the clock.
pub fn step(cq: &mut CommandQueue, tracker: &mut FakeTracker) -> Option<Issue> {
    let issue = cq.get_command_to_issue(&*tracker);
    if let Some(issue) = &issue {
        tracker.apply(&issue.command);
    }
    cq.clock_tick();
    issue
}

pub fn new_queue(cfg: DramConfig) -> CommandQueue {
    CommandQueue::new(Arc::new(cfg))
}

/// `Write` sink whose bytes stay readable after being boxed into a trace.
#[derive(Clone, Default)]
pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
