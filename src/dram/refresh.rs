use log::{debug, info};
use smallvec::SmallVec;

use crate::dram::command::{BankAddr, Command, CommandKind};
use crate::dram::config::TimingConfig;
use crate::dram::geometry::Geometry;
use crate::dram::queue::QueueSet;
use crate::dram::tracker::BankTimingTracker;
use crate::timeq::{Countdown, Cycle};

pub type RefQIndices = SmallVec<[usize; 16]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    /// Scope known, ready row hits in it may still drain.
    Requested { refresh: Command, since: Cycle },
    /// Scope held; precharging it and waiting for the refresh to become legal.
    Held { refresh: Command },
    /// Refresh issued; scope stays held until the recovery timer expires.
    Recovering { refresh: Command },
}

/// Serializes refresh against normal traffic for one channel.
///
/// One refresh is handled at a time, so a queue partition is in at most one hold.
#[derive(Debug, Clone)]
pub struct RefreshCoordinator {
    phase: RefreshPhase,
    ref_q_indices: RefQIndices,
    recovery: Countdown,
    drain_cycles: Cycle,
    t_rfc: Cycle,
    t_rfcb: Cycle,
    geometry: Geometry,
}

impl RefreshCoordinator {
    pub fn new(geometry: Geometry, timing: &TimingConfig, drain_cycles: Cycle) -> Self {
        Self {
            phase: RefreshPhase::Idle,
            ref_q_indices: RefQIndices::new(),
            recovery: Countdown::default(),
            drain_cycles,
            t_rfc: timing.t_rfc,
            t_rfcb: timing.t_rfcb,
            geometry,
        }
    }

    pub fn phase(&self) -> RefreshPhase {
        self.phase
    }

    /// True while a hold is installed.
    pub fn is_in_refresh(&self) -> bool {
        matches!(self.phase, RefreshPhase::Held { .. } | RefreshPhase::Recovering { .. })
    }

    /// Partitions in the scope of the current refresh, held or about to be.
    pub fn ref_q_indices(&self) -> &[usize] {
        &self.ref_q_indices
    }

    pub fn in_scope(&self, queue_index: usize) -> bool {
        self.phase != RefreshPhase::Idle && self.ref_q_indices.contains(&queue_index)
    }

    pub fn is_held(&self, queue_index: usize) -> bool {
        self.is_in_refresh() && self.ref_q_indices.contains(&queue_index)
    }

    pub fn recovery_remaining(&self) -> Cycle {
        self.recovery.remaining()
    }

    /// Queue partitions a refresh must hold: every partition of the rank for a rank refresh,
    /// the bank's partition for a bank refresh.
    pub fn get_ref_q_indices(&self, refresh: &Command, queues: &QueueSet) -> RefQIndices {
        let mut indices = RefQIndices::new();
        match refresh.kind {
            CommandKind::Refresh => {
                for bank in self.geometry.banks_in_rank(refresh.rank()) {
                    let idx = queues.queue_index(bank.rank, bank.bankgroup, bank.bank);
                    if !indices.contains(&idx) {
                        indices.push(idx);
                    }
                }
            }
            CommandKind::RefreshBank => {
                indices.push(queues.queue_index(refresh.rank(), refresh.bankgroup(), refresh.bank()));
            }
            kind => panic!("{} is not a refresh", kind),
        }
        indices
    }

    /// Advance the state machine at the start of a cycle's arbitration.
    pub fn update_phase<T: BankTimingTracker>(&mut self, now: Cycle, queues: &QueueSet, tracker: &T) {
        if self.phase == RefreshPhase::Idle {
            if let Some(refresh) = tracker.pending_refresh() {
                self.ref_q_indices = self.get_ref_q_indices(&refresh, queues);
                self.phase = RefreshPhase::Requested { refresh, since: now };
                debug!("clk {}: {} requested, scope {:?}", now, refresh, self.ref_q_indices);
            }
        }
        if let RefreshPhase::Requested { refresh, since } = self.phase {
            if now.saturating_sub(since) >= self.drain_cycles {
                self.phase = RefreshPhase::Held { refresh };
                info!("clk {}: holding {:?} for {}", now, self.ref_q_indices, refresh);
            }
        }
    }

    /// Decide whether an eligible command in the refresh scope may go ahead of the refresh.
    ///
    /// Only row hits that are ready right now drain, and only during the request window;
    /// anything else stays queued for reissue after the refresh.
    pub fn prep_ref_cmd(&self, queued: &Command, ready: &Command) -> bool {
        match self.phase {
            RefreshPhase::Requested { .. } => ready.kind == queued.kind && ready.is_read_write(),
            RefreshPhase::Held { .. } | RefreshPhase::Recovering { .. } => false,
            RefreshPhase::Idle => true,
        }
    }

    fn scope_banks(&self, refresh: &Command) -> SmallVec<[BankAddr; 16]> {
        match refresh.kind {
            CommandKind::Refresh => self.geometry.banks_in_rank(refresh.rank()).collect(),
            _ => std::iter::once(refresh.bank_addr()).collect(),
        }
    }

    /// Next command that moves the held refresh forward: a precharge for an open bank in
    /// scope, then the refresh itself.
    pub fn refresh_command<T: BankTimingTracker>(&self, tracker: &T, now: Cycle) -> Option<Command> {
        let refresh = match self.phase {
            RefreshPhase::Held { refresh } => refresh,
            _ => return None,
        };

        let banks = self.scope_banks(&refresh);
        let mut any_open = false;
        for bank in &banks {
            if let Some(row) = tracker.open_row(*bank) {
                any_open = true;
                if tracker.is_legal(CommandKind::Precharge, *bank, now) {
                    let mut pre = refresh.with_kind(CommandKind::Precharge);
                    pre.addr.bankgroup = bank.bankgroup;
                    pre.addr.bank = bank.bank;
                    pre.addr.row = row;
                    return Some(pre);
                }
            }
        }
        if any_open {
            return None;
        }

        let earliest = banks
            .iter()
            .map(|bank| tracker.earliest_cycle(refresh.kind, *bank))
            .max()
            .unwrap_or(0);
        if now >= earliest {
            Some(refresh)
        } else {
            None
        }
    }

    /// Record that the issuing stage accepted `cmd` from this coordinator.
    pub fn on_issue(&mut self, cmd: &Command, now: Cycle) {
        if !cmd.is_refresh() {
            return;
        }
        if let RefreshPhase::Held { refresh } = self.phase {
            let duration = match refresh.kind {
                CommandKind::Refresh => self.t_rfc,
                _ => self.t_rfcb,
            };
            debug!("clk {}: {} issued, recovering for {} cycles", now, refresh, duration);
            self.phase = RefreshPhase::Recovering { refresh };
            self.recovery.start(duration);
            if duration == 0 {
                self.finish_refresh();
            }
        }
    }

    /// Run the recovery timer for one cycle, finishing the refresh when it expires.
    pub fn tick(&mut self) -> Option<Command> {
        if let RefreshPhase::Recovering { .. } = self.phase {
            if self.recovery.tick() {
                return self.finish_refresh();
            }
        }
        None
    }

    /// Release the hold of the current refresh; normal arbitration resumes on its scope.
    pub fn finish_refresh(&mut self) -> Option<Command> {
        let finished = match self.phase {
            RefreshPhase::Idle => None,
            RefreshPhase::Requested { refresh, .. }
            | RefreshPhase::Held { refresh }
            | RefreshPhase::Recovering { refresh } => Some(refresh),
        };
        if let Some(refresh) = finished {
            info!("{} finished, releasing {:?}", refresh, self.ref_q_indices);
        }
        self.ref_q_indices.clear();
        self.recovery.clear();
        self.phase = RefreshPhase::Idle;
        finished
    }
}
