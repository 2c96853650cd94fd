use std::sync::{Arc, OnceLock};

use log::{debug, info};

use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::dram::arbiter::{Arbiter, MlrrCursors, RoundRobin};
use crate::dram::command::{Command, CommandKind, Issue, IssueOrigin};
use crate::dram::config::DramConfig;
use crate::dram::queue::{CmdQueue, QueueSet};
use crate::dram::refresh::RefreshCoordinator;
use crate::dram::tracker::BankTimingTracker;
use crate::timeq::Cycle;

#[derive(Debug)]
pub struct CommandQueueState {
    queues: QueueSet,
    arbiter: Arbiter,
    refresh: RefreshCoordinator,
}

/// A command picked by arbitration, not yet removed from its partition.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    queue_index: usize,
    pos: usize,
    command: Command,
    origin: IssueOrigin,
}

/// Per-cycle eligibility checks over a read-only snapshot of the queues.
struct Arbitration<'a, T> {
    queues: &'a QueueSet,
    refresh: &'a RefreshCoordinator,
    tracker: &'a T,
    now: Cycle,
    row_hit_limit: u32,
}

impl<'a, T: BankTimingTracker> Arbitration<'a, T> {
    fn is_skipped(&self, queue_index: usize) -> bool {
        self.queues.queue_empty_at(queue_index) || self.refresh.is_held(queue_index)
    }

    /// Best eligible command of one partition: the oldest ready row hit, otherwise the oldest
    /// command with a ready command of any kind.
    fn first_ready_in_queue(&self, queue_index: usize) -> Option<Candidate> {
        if self.refresh.is_held(queue_index) {
            return None;
        }
        let queue = self.queues.queue_at(queue_index);
        let in_refresh_scope = self.refresh.in_scope(queue_index);

        for (pos, cmd) in queue.iter().enumerate() {
            if !self.tracker.is_row_hit(cmd) {
                continue;
            }
            let Some(ready) = self.tracker.ready_command(cmd, self.now) else {
                continue;
            };
            if self.has_rw_dependency(queue, pos) {
                continue;
            }
            if in_refresh_scope && !self.refresh.prep_ref_cmd(cmd, &ready) {
                continue;
            }
            return Some(Candidate {
                queue_index,
                pos,
                command: ready,
                origin: IssueOrigin::Queued,
            });
        }

        for (pos, cmd) in queue.iter().enumerate() {
            let Some(ready) = self.tracker.ready_command(cmd, self.now) else {
                continue;
            };
            let eligible = match ready.kind {
                CommandKind::Precharge => self.arbitrate_precharge(queue, pos),
                kind if kind.is_read_write() => !self.has_rw_dependency(queue, pos),
                _ => true,
            };
            if !eligible {
                continue;
            }
            if in_refresh_scope && !self.refresh.prep_ref_cmd(cmd, &ready) {
                continue;
            }
            let origin = if ready.kind == cmd.kind {
                IssueOrigin::Queued
            } else {
                IssueOrigin::OnDemand
            };
            return Some(Candidate {
                queue_index,
                pos,
                command: ready,
                origin,
            });
        }
        None
    }

    /// Whether closing the row for `queue[pos]` should wait.  Older work for the same bank goes
    /// first, and pending row hits keep the row open until the hit limit is reached.
    fn arbitrate_precharge(&self, queue: &CmdQueue, pos: usize) -> bool {
        let cmd = &queue[pos];
        if queue[..pos].iter().any(|prev| prev.addr.same_bank(&cmd.addr)) {
            return false;
        }

        let bank = cmd.bank_addr();
        let pending_row_hits = match self.tracker.open_row(bank) {
            Some(open_row) => queue[pos + 1..].iter().any(|pending| {
                pending.is_read_write() && pending.bank_addr() == bank && pending.row() == open_row
            }),
            None => false,
        };
        let rowhit_limit_reached = self.tracker.row_hit_count(bank) >= self.row_hit_limit;
        !pending_row_hits || rowhit_limit_reached
    }

    /// A read or write must not pass an older access of the other direction to the same
    /// location.
    fn has_rw_dependency(&self, queue: &CmdQueue, pos: usize) -> bool {
        let cmd = &queue[pos];
        if !cmd.is_read_write() {
            return false;
        }
        queue[..pos].iter().any(|prev| {
            prev.is_read_write()
                && prev.is_read() != cmd.is_read()
                && prev.addr.same_bank(&cmd.addr)
                && prev.row() == cmd.row()
                && prev.column() == cmd.column()
        })
    }

    fn pick_round_robin(&self, rr: &mut RoundRobin) -> Option<Candidate> {
        let mut passed_over = None;
        for queue_index in rr.order() {
            if self.is_skipped(queue_index) {
                continue;
            }
            if let Some(candidate) = self.first_ready_in_queue(queue_index) {
                rr.advance(queue_index, passed_over);
                return Some(candidate);
            }
            passed_over.get_or_insert(queue_index);
        }
        None
    }

    fn pick_multi_level(&self, cursors: &mut MlrrCursors) -> Option<Candidate> {
        for rank in cursors.rank.order() {
            for bankgroup in cursors.bankgroup[rank].order() {
                for bank in cursors.bank[rank][bankgroup].order() {
                    let queue_index = self.queues.queue_index(rank, bankgroup, bank);
                    if self.is_skipped(queue_index) {
                        continue;
                    }
                    if let Some(candidate) = self.first_ready_in_queue(queue_index) {
                        cursors.advance(rank, bankgroup, bank);
                        return Some(candidate);
                    }
                }
            }
        }
        None
    }
}

/// Command-scheduling core of one channel: queue admission, per-cycle arbitration and refresh.
pub struct CommandQueue {
    base: ModuleBase<CommandQueueState, DramConfig>,
}

impl CommandQueue {
    pub fn new(config: Arc<DramConfig>) -> Self {
        config.ensure_valid();
        let geometry = config.geometry();
        info!(
            "command queue: {:?}, {} queues x {} entries",
            config.queue_structure,
            config.num_queues(),
            config.cmd_queue_size
        );
        let state = CommandQueueState {
            queues: QueueSet::new(config.queue_structure, geometry, config.cmd_queue_size),
            arbiter: Arbiter::new(config.queue_structure, geometry),
            refresh: RefreshCoordinator::new(geometry, &config.timing, config.refresh_drain_cycles),
        };
        let mut me = CommandQueue {
            base: ModuleBase {
                cycle: 0,
                state,
                config: OnceLock::new(),
            },
        };
        me.init_conf(config);
        me
    }

    /// The one command to hand to the issuing stage this cycle, if any.
    pub fn get_command_to_issue<T: BankTimingTracker>(&mut self, tracker: &T) -> Option<Issue> {
        let now = self.base.cycle;
        let row_hit_limit = self.conf().row_hit_limit;
        let CommandQueueState {
            queues,
            arbiter,
            refresh,
        } = &mut self.base.state;

        refresh.update_phase(now, queues, tracker);
        if let Some(cmd) = refresh.refresh_command(tracker, now) {
            refresh.on_issue(&cmd, now);
            debug!("clk {}: refresh path issues {}", now, cmd);
            return Some(Issue::new(cmd, IssueOrigin::Refresh));
        }

        let arbitration = Arbitration {
            queues: &*queues,
            refresh: &*refresh,
            tracker,
            now,
            row_hit_limit,
        };
        let candidate = match arbiter {
            Arbiter::PerBank(rr) | Arbiter::PerRank(rr) => arbitration.pick_round_robin(rr),
            Arbiter::Mlrr(cursors) => arbitration.pick_multi_level(cursors),
        }?;

        let issue = Issue::new(candidate.command, candidate.origin);
        if issue.consumed() {
            let removed = queues.remove(candidate.queue_index, candidate.pos);
            debug_assert_eq!(removed.kind, candidate.command.kind);
        }
        debug!("clk {}: issue {} ({:?})", now, candidate.command, candidate.origin);
        Some(issue)
    }

    /// Release the current refresh hold immediately.
    pub fn finish_refresh(&mut self) -> Option<Command> {
        self.base.state.refresh.finish_refresh()
    }

    pub fn clock_tick(&mut self) {
        self.tick_one();
    }

    pub fn will_accept_command(&self, rank: usize, bankgroup: usize, bank: usize) -> bool {
        self.base.state.queues.will_accept_command(rank, bankgroup, bank)
    }

    pub fn add_command(&mut self, cmd: Command) -> bool {
        self.base.state.queues.add_command(cmd)
    }

    pub fn queue_empty(&self) -> bool {
        self.base.state.queues.queue_empty()
    }

    pub fn queue_empty_at(&self, queue_index: usize) -> bool {
        self.base.state.queues.queue_empty_at(queue_index)
    }

    pub fn rank_queue_empty(&self, rank: usize) -> bool {
        self.base.state.queues.rank_queue_empty(rank)
    }

    pub fn queue_index(&self, rank: usize, bankgroup: usize, bank: usize) -> usize {
        self.base.state.queues.queue_index(rank, bankgroup, bank)
    }

    pub fn bank_bankgroup_rank(&self, queue_index: usize) -> (usize, usize, usize) {
        self.base.state.queues.bank_bankgroup_rank(queue_index)
    }

    pub fn queue_usage(&self) -> usize {
        self.base.state.queues.queue_usage()
    }

    pub fn queue(&self, rank: usize, bankgroup: usize, bank: usize) -> &CmdQueue {
        self.base.state.queues.queue(rank, bankgroup, bank)
    }

    pub fn queues(&self) -> &QueueSet {
        &self.base.state.queues
    }

    pub fn is_in_refresh(&self) -> bool {
        self.base.state.refresh.is_in_refresh()
    }

    pub fn refresh(&self) -> &RefreshCoordinator {
        &self.base.state.refresh
    }

    pub fn arbiter(&self) -> &Arbiter {
        &self.base.state.arbiter
    }
}

module!(CommandQueue, CommandQueueState, DramConfig,);

impl ModuleBehaviors for CommandQueue {
    fn tick_one(&mut self) {
        self.base.cycle += 1;
        self.base.state.refresh.tick();
    }

    fn reset(&mut self) {
        self.base.cycle = 0;
        self.base.state.queues.clear();
        self.base.state.arbiter.reset();
        self.base.state.refresh.finish_refresh();
    }
}
