use std::io::Write;
use std::sync::{Arc, OnceLock};

use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::dram::channel_state::ChannelState;
use crate::dram::command::{Address, Command, CommandKind, Issue};
use crate::dram::command_queue::CommandQueue;
use crate::dram::config::{DramConfig, RowBufPolicy};
use crate::dram::stats::SchedulerStats;
use crate::dram::utilization::{BloodGraph, UtilizationCounters};

/// Splits a physical address into channel coordinates, low bits first:
/// burst offset, column, bank group, bank, rank, row.
#[derive(Debug, Clone, Copy)]
pub struct AddressMapping {
    burst_bytes: u64,
    columns: u64,
    bankgroups: u64,
    banks_per_group: u64,
    ranks: u64,
    rows: u64,
}

impl AddressMapping {
    pub fn new(config: &DramConfig) -> Self {
        Self {
            burst_bytes: config.burst_bytes,
            columns: config.columns as u64,
            bankgroups: config.bankgroups as u64,
            banks_per_group: config.banks_per_group as u64,
            ranks: config.ranks as u64,
            rows: config.rows as u64,
        }
    }

    pub fn decode(&self, hex_addr: u64) -> Address {
        let mut rest = hex_addr / self.burst_bytes;
        let mut take = |n: u64| {
            let field = rest % n;
            rest /= n;
            field
        };
        let column = take(self.columns) as u32;
        let bankgroup = take(self.bankgroups) as usize;
        let bank = take(self.banks_per_group) as usize;
        let rank = take(self.ranks) as usize;
        let row = take(self.rows) as u32;
        Address::new(rank, bankgroup, bank, row, column)
    }
}

pub struct ControllerState {
    cmd_queue: CommandQueue,
    channel_state: ChannelState,
    blood_graph: BloodGraph,
    stats: SchedulerStats,
    last_issue: Option<Issue>,
}

/// Issuing stage for one channel: admits transactions, runs the scheduling core each cycle and
/// applies its decision to the bank timing tracker.
pub struct Controller {
    base: ModuleBase<ControllerState, DramConfig>,
    mapping: AddressMapping,
}

impl Controller {
    pub fn new(config: Arc<DramConfig>) -> Self {
        config.ensure_valid();
        let state = ControllerState {
            cmd_queue: CommandQueue::new(Arc::clone(&config)),
            channel_state: ChannelState::new(Arc::clone(&config)),
            blood_graph: BloodGraph::new(config.geometry(), config.timing),
            stats: SchedulerStats::default(),
            last_issue: None,
        };
        let mut me = Controller {
            base: ModuleBase {
                cycle: 0,
                state,
                config: OnceLock::new(),
            },
            mapping: AddressMapping::new(&config),
        };
        me.init_conf(config);
        me
    }

    /// Emit the per-bank utilization trace to `sink`.
    pub fn with_bank_trace(mut self, sink: Box<dyn Write + Send>) -> Self {
        let (geometry, timing) = (self.conf().geometry(), self.conf().timing);
        self.base.state.blood_graph = BloodGraph::new(geometry, timing).with_trace(sink);
        self
    }

    pub fn mapping(&self) -> &AddressMapping {
        &self.mapping
    }

    pub fn will_accept_transaction(&self, hex_addr: u64) -> bool {
        let addr = self.mapping.decode(hex_addr);
        self.base.state.cmd_queue.will_accept_command(addr.rank, addr.bankgroup, addr.bank)
    }

    /// Translate a read or write into a column command and admit it.
    pub fn add_transaction(&mut self, hex_addr: u64, is_write: bool) -> bool {
        let addr = self.mapping.decode(hex_addr);
        let kind = match (self.conf().row_buf_policy, is_write) {
            (RowBufPolicy::OpenPage, false) => CommandKind::Read,
            (RowBufPolicy::OpenPage, true) => CommandKind::Write,
            (RowBufPolicy::ClosePage, false) => CommandKind::ReadPrecharge,
            (RowBufPolicy::ClosePage, true) => CommandKind::WritePrecharge,
        };
        let cmd = Command::new(kind, addr, hex_addr, self.base.cycle);
        self.add_command(cmd)
    }

    pub fn add_command(&mut self, cmd: Command) -> bool {
        let state = &mut self.base.state;
        let accepted = state.cmd_queue.add_command(cmd);
        if accepted {
            state.stats.record_accept();
            state.stats.update_queue_usage(state.cmd_queue.queue_usage());
        } else {
            state.stats.record_queue_full_reject();
        }
        accepted
    }

    /// Run one cycle and report what issued.
    pub fn tick(&mut self) -> Option<Issue> {
        self.tick_one();
        self.base.state.last_issue
    }

    pub fn cmd_queue(&self) -> &CommandQueue {
        &self.base.state.cmd_queue
    }

    pub fn channel_state(&self) -> &ChannelState {
        &self.base.state.channel_state
    }

    /// Inject a refresh obligation, as the tREFI generator would.
    pub fn request_refresh(&mut self, refresh: Command) {
        self.base.state.channel_state.request_refresh(refresh);
    }

    pub fn blood_graph(&self) -> &BloodGraph {
        &self.base.state.blood_graph
    }

    pub fn take_utilization_window(&mut self) -> UtilizationCounters {
        self.base.state.blood_graph.take_window()
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.base.state.stats
    }

    /// No queued work and no refresh in flight.
    pub fn is_drained(&self) -> bool {
        let state = &self.base.state;
        state.cmd_queue.queue_empty() && !state.cmd_queue.is_in_refresh()
    }

    pub fn flush(&mut self) {
        self.base.state.blood_graph.flush();
    }
}

module!(Controller, ControllerState, DramConfig,
    fn get_children(&mut self) -> Vec<&mut dyn ModuleBehaviors> {
        let state = &mut self.base.state;
        vec![
            &mut state.cmd_queue as &mut dyn ModuleBehaviors,
            &mut state.channel_state as &mut dyn ModuleBehaviors,
        ]
    }
);

impl ModuleBehaviors for Controller {
    fn tick_one(&mut self) {
        let now = self.base.cycle;
        let state = &mut self.base.state;

        let issue = state.cmd_queue.get_command_to_issue(&state.channel_state);
        match &issue {
            Some(issue) => {
                state.channel_state.update(&issue.command, now);
                state.stats.record_issue(issue, now);
                state.blood_graph.issue_command(&issue.command);
            }
            None => state.stats.record_idle(),
        }
        if state.cmd_queue.is_in_refresh() {
            state.stats.record_hold();
        }
        state.blood_graph.tick(&state.cmd_queue, &state.channel_state);
        state.last_issue = issue;

        self.base.cycle += 1;
        for child in self.get_children() {
            child.tick_one();
        }
    }

    fn reset(&mut self) {
        self.base.cycle = 0;
        for child in self.get_children() {
            child.reset();
        }
        let (geometry, timing) = (self.conf().geometry(), self.conf().timing);
        let state = &mut self.base.state;
        state.blood_graph = BloodGraph::new(geometry, timing);
        state.stats = SchedulerStats::default();
        state.last_issue = None;
    }
}
