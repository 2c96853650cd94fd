/*
  Per-bank utilization trace ("blood graph").

  Every cycle every bank gets exactly one label:
    nop       no request for this bank
    closed    a request is queued but the row is closed
    act       activate in progress
    rd / wr   a read / write issued to this bank this cycle
    pre       precharge in progress
    row_miss  requests queued, none for the open row
    arb       a row hit is queued but another bank used the data bus for the same direction
    ref       refresh in preparation or in progress
    conf      a row hit is queued but timing (tCCD, tWTR, ...) keeps it back

  Labels are derived from the scheduler's and the tracker's state after arbitration and never feed
  back into it.
*/

use std::io::Write;
use std::ops::AddAssign;

use serde::Serialize;

use crate::dram::command::{Command, CommandKind};
use crate::dram::command_queue::CommandQueue;
use crate::dram::config::TimingConfig;
use crate::dram::geometry::Geometry;
use crate::dram::tracker::BankTimingTracker;
use crate::timeq::{Countdown, Cycle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BankActivity {
    Nop,
    Closed,
    Act,
    Rd,
    Wr,
    Pre,
    RowMiss,
    Arb,
    Ref,
    Conf,
}

impl BankActivity {
    pub fn label(self) -> &'static str {
        match self {
            BankActivity::Nop => "nop",
            BankActivity::Closed => "closed",
            BankActivity::Act => "act",
            BankActivity::Rd => "rd",
            BankActivity::Wr => "wr",
            BankActivity::Pre => "pre",
            BankActivity::RowMiss => "row_miss",
            BankActivity::Arb => "arb",
            BankActivity::Ref => "ref",
            BankActivity::Conf => "conf",
        }
    }

    /// Whether the bank is doing work this cycle.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            BankActivity::Act | BankActivity::Rd | BankActivity::Wr | BankActivity::Pre | BankActivity::Ref
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UtilizationCounters {
    pub cycles: u64,
    /// Cycles in which at least one bank was busy.
    pub busy: u64,
    pub read: u64,
    pub write: u64,
    pub refresh: u64,
    pub nop: u64,
    pub closed: u64,
    pub act: u64,
    pub rd: u64,
    pub wr: u64,
    pub pre: u64,
    pub row_miss: u64,
    pub arb: u64,
    pub r#ref: u64,
    pub conf: u64,
}

impl UtilizationCounters {
    fn count_label(&mut self, activity: BankActivity) {
        let slot = match activity {
            BankActivity::Nop => &mut self.nop,
            BankActivity::Closed => &mut self.closed,
            BankActivity::Act => &mut self.act,
            BankActivity::Rd => &mut self.rd,
            BankActivity::Wr => &mut self.wr,
            BankActivity::Pre => &mut self.pre,
            BankActivity::RowMiss => &mut self.row_miss,
            BankActivity::Arb => &mut self.arb,
            BankActivity::Ref => &mut self.r#ref,
            BankActivity::Conf => &mut self.conf,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn busy_ratio(&self) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            self.busy as f64 / self.cycles as f64
        }
    }
}

impl AddAssign<&UtilizationCounters> for UtilizationCounters {
    fn add_assign(&mut self, other: &UtilizationCounters) {
        self.cycles = self.cycles.saturating_add(other.cycles);
        self.busy = self.busy.saturating_add(other.busy);
        self.read = self.read.saturating_add(other.read);
        self.write = self.write.saturating_add(other.write);
        self.refresh = self.refresh.saturating_add(other.refresh);
        self.nop = self.nop.saturating_add(other.nop);
        self.closed = self.closed.saturating_add(other.closed);
        self.act = self.act.saturating_add(other.act);
        self.rd = self.rd.saturating_add(other.rd);
        self.wr = self.wr.saturating_add(other.wr);
        self.pre = self.pre.saturating_add(other.pre);
        self.row_miss = self.row_miss.saturating_add(other.row_miss);
        self.arb = self.arb.saturating_add(other.arb);
        self.r#ref = self.r#ref.saturating_add(other.r#ref);
        self.conf = self.conf.saturating_add(other.conf);
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BankTrack {
    read_issued: bool,
    write_issued: bool,
    act: Countdown,
    pre: Countdown,
    refresh: Countdown,
}

pub struct BloodGraph {
    geometry: Geometry,
    timing: TimingConfig,
    clk: Cycle,
    banks: Vec<BankTrack>,
    labels: Vec<BankActivity>,
    total: UtilizationCounters,
    window: UtilizationCounters,
    trace: Option<Box<dyn Write + Send>>,
}

impl BloodGraph {
    pub fn new(geometry: Geometry, timing: TimingConfig) -> Self {
        Self {
            geometry,
            timing,
            clk: 0,
            banks: vec![BankTrack::default(); geometry.num_banks()],
            labels: vec![BankActivity::Nop; geometry.num_banks()],
            total: UtilizationCounters::default(),
            window: UtilizationCounters::default(),
            trace: None,
        }
    }

    /// Write a `time,bank,state` CSV line per bank per cycle to `sink`.
    pub fn with_trace(mut self, mut sink: Box<dyn Write + Send>) -> Self {
        let _ = writeln!(sink, "time,bank,state");
        self.trace = Some(sink);
        self
    }

    /// Labels assigned by the latest `tick`, indexed by resource index.
    pub fn labels(&self) -> &[BankActivity] {
        &self.labels
    }

    pub fn totals(&self) -> &UtilizationCounters {
        &self.total
    }

    /// Counters accumulated since the previous call.
    pub fn take_window(&mut self) -> UtilizationCounters {
        std::mem::take(&mut self.window)
    }

    pub fn issue_command(&mut self, cmd: &Command) {
        let t = self.timing;
        match cmd.kind {
            CommandKind::Refresh => {
                for idx in self.geometry.rank_indices(cmd.rank()) {
                    self.banks[idx].refresh.start(t.t_rfc);
                    self.banks[idx].act.clear();
                    self.banks[idx].pre.clear();
                }
            }
            kind => {
                let bank = &mut self.banks[self.geometry.resource_index(cmd.bank_addr())];
                match kind {
                    CommandKind::RefreshBank => {
                        bank.refresh.start(t.t_rfcb);
                        bank.act.clear();
                        bank.pre.clear();
                    }
                    CommandKind::Activate => bank.act.start(t.t_rcd),
                    CommandKind::Precharge => bank.pre.start(t.t_rp),
                    k if k.is_read() => bank.read_issued = true,
                    k if k.is_write() => bank.write_issued = true,
                    _ => {}
                }
            }
        }
    }

    pub fn tick<T: BankTimingTracker>(&mut self, cmd_queue: &CommandQueue, tracker: &T) {
        let read_issued_found = self.banks.iter().any(|b| b.read_issued);
        let write_issued_found = self.banks.iter().any(|b| b.write_issued);
        let queues = cmd_queue.queues();

        for idx in 0..self.banks.len() {
            let addr = self.geometry.locate(idx);
            let held = cmd_queue
                .refresh()
                .is_held(queues.queue_index(addr.rank, addr.bankgroup, addr.bank));
            let bank = &mut self.banks[idx];

            let activity = if held && !bank.refresh.is_running() {
                bank.act.clear();
                bank.pre.clear();
                BankActivity::Ref
            } else if bank.refresh.is_running() {
                bank.refresh.tick();
                BankActivity::Ref
            } else if bank.act.is_running() {
                bank.act.tick();
                BankActivity::Act
            } else if bank.pre.is_running() {
                bank.pre.tick();
                BankActivity::Pre
            } else if bank.read_issued {
                BankActivity::Rd
            } else if bank.write_issued {
                BankActivity::Wr
            } else {
                let mut pending = queues.commands_for_bank(addr).peekable();
                if pending.peek().is_none() {
                    BankActivity::Nop
                } else {
                    match tracker.open_row(addr) {
                        None => BankActivity::Closed,
                        Some(open_row) => {
                            let mut read_hit = false;
                            let mut write_hit = false;
                            for cmd in pending.filter(|cmd| cmd.row() == open_row) {
                                read_hit |= cmd.is_read();
                                write_hit |= cmd.is_write();
                            }
                            if read_hit {
                                if read_issued_found { BankActivity::Arb } else { BankActivity::Conf }
                            } else if write_hit {
                                if write_issued_found { BankActivity::Arb } else { BankActivity::Conf }
                            } else {
                                BankActivity::RowMiss
                            }
                        }
                    }
                }
            };
            self.labels[idx] = activity;
        }

        self.record_cycle();
        for bank in &mut self.banks {
            bank.read_issued = false;
            bank.write_issued = false;
        }
        self.clk += 1;
    }

    fn record_cycle(&mut self) {
        let mut cycle = UtilizationCounters {
            cycles: 1,
            ..UtilizationCounters::default()
        };
        for activity in &self.labels {
            cycle.count_label(*activity);
        }
        cycle.busy = self.labels.iter().any(|a| a.is_busy()) as u64;
        cycle.read = (cycle.rd > 0) as u64;
        cycle.write = (cycle.wr > 0) as u64;
        cycle.refresh = (cycle.r#ref > 0) as u64;
        self.total += &cycle;
        self.window += &cycle;

        if let Some(trace) = self.trace.as_mut() {
            for (bank, activity) in self.labels.iter().enumerate() {
                let _ = writeln!(trace, "{},{},{}", self.clk, bank, activity.label());
            }
        }
    }

    pub fn flush(&mut self) {
        if let Some(trace) = self.trace.as_mut() {
            let _ = trace.flush();
        }
    }
}
