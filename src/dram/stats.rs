use serde::Serialize;

use crate::dram::command::{CommandKind, Issue, IssueOrigin};
use crate::timeq::Cycle;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SchedulerStats {
    activates: u64,
    precharges: u64,
    reads: u64,
    writes: u64,
    refreshes: u64,
    bank_refreshes: u64,
    ondemand_activates: u64,
    ondemand_precharges: u64,
    refresh_precharges: u64,
    idle_cycles: u64,
    hold_cycles: u64,
    accepted: u64,
    queue_full_rejects: u64,
    max_queue_usage: u64,
    // arrival to issue, queued reads/writes only
    total_queue_latency: u64,
    max_queue_latency: u64,
}

impl SchedulerStats {
    pub fn activates(&self) -> u64 {
        self.activates
    }

    pub fn precharges(&self) -> u64 {
        self.precharges
    }

    pub fn reads(&self) -> u64 {
        self.reads
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }

    pub fn refreshes(&self) -> u64 {
        self.refreshes + self.bank_refreshes
    }

    pub fn ondemand_precharges(&self) -> u64 {
        self.ondemand_precharges
    }

    pub fn idle_cycles(&self) -> u64 {
        self.idle_cycles
    }

    pub fn hold_cycles(&self) -> u64 {
        self.hold_cycles
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn queue_full_rejects(&self) -> u64 {
        self.queue_full_rejects
    }

    pub fn max_queue_usage(&self) -> u64 {
        self.max_queue_usage
    }

    pub fn avg_queue_latency(&self) -> f64 {
        let served = self.reads + self.writes;
        if served == 0 {
            0.0
        } else {
            self.total_queue_latency as f64 / served as f64
        }
    }

    pub fn record_issue(&mut self, issue: &Issue, now: Cycle) {
        let cmd = &issue.command;
        match cmd.kind {
            CommandKind::Activate => self.activates += 1,
            CommandKind::Precharge => self.precharges += 1,
            CommandKind::Read | CommandKind::ReadPrecharge => self.reads += 1,
            CommandKind::Write | CommandKind::WritePrecharge => self.writes += 1,
            CommandKind::Refresh => self.refreshes += 1,
            CommandKind::RefreshBank => self.bank_refreshes += 1,
        }
        match (issue.origin, cmd.kind) {
            (IssueOrigin::OnDemand, CommandKind::Activate) => self.ondemand_activates += 1,
            (IssueOrigin::OnDemand, CommandKind::Precharge) => self.ondemand_precharges += 1,
            (IssueOrigin::Refresh, CommandKind::Precharge) => self.refresh_precharges += 1,
            (IssueOrigin::Queued, kind) if kind.is_read_write() => {
                let latency = now.saturating_sub(cmd.arrival);
                self.total_queue_latency = self.total_queue_latency.saturating_add(latency);
                self.max_queue_latency = self.max_queue_latency.max(latency);
            }
            _ => {}
        }
    }

    pub fn record_idle(&mut self) {
        self.idle_cycles += 1;
    }

    pub fn record_hold(&mut self) {
        self.hold_cycles += 1;
    }

    pub fn record_accept(&mut self) {
        self.accepted += 1;
    }

    pub fn record_queue_full_reject(&mut self) {
        self.queue_full_rejects += 1;
    }

    pub fn update_queue_usage(&mut self, usage: usize) {
        self.max_queue_usage = self.max_queue_usage.max(usage as u64);
    }
}
