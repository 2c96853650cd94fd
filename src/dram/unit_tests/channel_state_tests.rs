use std::sync::Arc;

use super::support::{cmd, config, read, refresh_rank};
use crate::base::behavior::ModuleBehaviors;
use crate::dram::channel_state::ChannelState;
use crate::dram::command::{BankAddr, CommandKind};
use crate::dram::config::{QueueStructure, RefreshPolicy};
use crate::dram::tracker::BankTimingTracker;

fn channel(ranks: usize, bankgroups: usize, banks_per_group: usize) -> ChannelState {
    ChannelState::new(Arc::new(config(QueueStructure::PerBank, ranks, bankgroups, banks_per_group)))
}

#[test]
fn activate_read_write_precharge_timing() {
    let mut cs = channel(1, 2, 2);
    let bank = BankAddr::new(0, 0, 0);

    cs.update(&cmd(CommandKind::Activate, 0, 0, 0, 3, 0), 0);
    assert_eq!(Some(3), cs.open_row(bank));
    assert!(!cs.is_legal(CommandKind::Read, bank, 1));
    assert!(cs.is_legal(CommandKind::Read, bank, 2));
    // t_rrd_l to the other bank of the group
    assert_eq!(1, cs.earliest_cycle(CommandKind::Activate, BankAddr::new(0, 0, 1)));

    cs.update(&cmd(CommandKind::Read, 0, 0, 0, 3, 0), 2);
    assert_eq!(1, cs.row_hit_count(bank));
    assert_eq!(4, cs.earliest_cycle(CommandKind::Write, bank));
    assert_eq!(5, cs.earliest_cycle(CommandKind::Precharge, bank));

    cs.update(&cmd(CommandKind::Write, 0, 0, 0, 3, 1), 4);
    assert_eq!(2, cs.row_hit_count(bank));
    assert_eq!(6, cs.earliest_cycle(CommandKind::Read, bank));
    assert_eq!(7, cs.earliest_cycle(CommandKind::Precharge, bank));

    cs.update(&cmd(CommandKind::Precharge, 0, 0, 0, 3, 0), 7);
    assert_eq!(None, cs.open_row(bank));
    assert_eq!(0, cs.row_hit_count(bank));
    // max(tRC from the activate, tRP from the precharge)
    assert_eq!(9, cs.earliest_cycle(CommandKind::Activate, bank));
}

#[test]
fn required_kind_follows_row_state() {
    let mut cs = channel(1, 1, 1);
    let hit = read(0, 0, 0, 3);
    let miss = read(0, 0, 0, 4);
    assert_eq!(CommandKind::Activate, cs.required_kind(&hit));

    cs.update(&cmd(CommandKind::Activate, 0, 0, 0, 3, 0), 0);
    assert!(cs.is_row_hit(&hit));
    assert_eq!(CommandKind::Read, cs.required_kind(&hit));
    assert_eq!(CommandKind::Precharge, cs.required_kind(&miss));
    assert_eq!(None, cs.ready_command(&hit, 1));
    assert_eq!(Some(CommandKind::Read), cs.ready_command(&hit, 2).map(|c| c.kind));
}

#[test]
fn auto_precharge_closes_row() {
    let mut cs = channel(1, 1, 1);
    let bank = BankAddr::new(0, 0, 0);
    cs.update(&cmd(CommandKind::Activate, 0, 0, 0, 3, 0), 0);
    cs.update(&cmd(CommandKind::ReadPrecharge, 0, 0, 0, 3, 0), 2);
    assert_eq!(None, cs.open_row(bank));
    // tRC still dominates tRTP + tRP
    assert_eq!(7, cs.earliest_cycle(CommandKind::Activate, bank));
}

#[test]
fn rank_refresh_closes_rank_and_retires_obligation() {
    let mut cs = channel(2, 1, 2);
    cs.update(&cmd(CommandKind::Activate, 0, 0, 1, 2, 0), 0);
    cs.update(&cmd(CommandKind::Activate, 1, 0, 0, 2, 0), 0);
    cs.request_refresh(refresh_rank(0));
    assert!(cs.is_refresh_waiting());

    cs.update(&cmd(CommandKind::Precharge, 0, 0, 1, 2, 0), 5);
    cs.update(&refresh_rank(0), 7);
    assert!(!cs.is_refresh_waiting());
    assert_eq!(None, cs.open_row(BankAddr::new(0, 0, 1)));
    assert_eq!(Some(2), cs.open_row(BankAddr::new(1, 0, 0)));
    // t_rfc = 3
    assert_eq!(10, cs.earliest_cycle(CommandKind::Activate, BankAddr::new(0, 0, 0)));
}

#[test]
fn staggered_refresh_rotates_ranks() {
    let mut cfg = config(QueueStructure::PerBank, 2, 1, 1);
    cfg.refresh_policy = RefreshPolicy::RankLevelStaggered;
    cfg.timing.t_refi = 8;
    let mut cs = ChannelState::new(Arc::new(cfg));

    for _ in 0..3 {
        cs.tick_one();
    }
    assert!(!cs.is_refresh_waiting());
    cs.tick_one();
    assert_eq!(Some(0), cs.pending_refresh().map(|r| r.rank()));
    for _ in 0..4 {
        cs.tick_one();
    }
    assert_eq!(2, cs.pending_refresh_count());

    cs.reset();
    assert!(!cs.is_refresh_waiting());
}

#[test]
fn bank_level_refresh_targets_single_banks() {
    let mut cfg = config(QueueStructure::PerBank, 1, 1, 2);
    cfg.refresh_policy = RefreshPolicy::BankLevelStaggered;
    cfg.timing.t_refi = 4;
    let mut cs = ChannelState::new(Arc::new(cfg));

    for _ in 0..4 {
        cs.tick_one();
    }
    assert_eq!(2, cs.pending_refresh_count());
    let first = cs.pending_refresh().unwrap();
    assert_eq!(CommandKind::RefreshBank, first.kind);
    assert_eq!(0, first.bank());
}

#[test]
#[should_panic(expected = "is not a refresh")]
fn request_refresh_rejects_other_kinds() {
    let mut cs = channel(1, 1, 1);
    cs.request_refresh(read(0, 0, 0, 0));
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "onto an open row")]
fn rank_refresh_onto_open_row_is_rejected() {
    let mut cs = channel(1, 1, 2);
    cs.update(&cmd(CommandKind::Activate, 0, 0, 1, 2, 0), 0);
    cs.update(&refresh_rank(0), 100);
}
