pub mod arbiter;
pub mod channel_state;
pub mod command;
pub mod command_queue;
pub mod config;
pub mod controller;
pub mod geometry;
pub mod queue;
pub mod refresh;
pub mod stats;
pub mod tracker;
pub mod utilization;

#[cfg(test)]
mod unit_tests;

pub use arbiter::{Arbiter, MlrrCursors, RoundRobin};
pub use channel_state::ChannelState;
pub use command::{Address, BankAddr, Command, CommandKind, Issue, IssueOrigin};
pub use command_queue::CommandQueue;
pub use config::{DramConfig, QueueStructure, RefreshPolicy, RowBufPolicy, TimingConfig};
pub use controller::{AddressMapping, Controller};
pub use geometry::Geometry;
pub use queue::{CmdQueue, QueueSet};
pub use refresh::{RefreshCoordinator, RefreshPhase};
pub use stats::SchedulerStats;
pub use tracker::BankTimingTracker;
pub use utilization::{BankActivity, BloodGraph, UtilizationCounters};
