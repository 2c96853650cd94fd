use std::sync::Arc;

use super::support::{config, refresh_rank, SharedBuf};
use crate::base::behavior::ModuleBehaviors;
use crate::base::module::IsModule;
use crate::dram::command::{Address, BankAddr, CommandKind, Issue};
use crate::dram::config::{DramConfig, QueueStructure, RowBufPolicy};
use crate::dram::controller::{AddressMapping, Controller};
use crate::dram::tracker::BankTimingTracker;
use crate::timeq::Cycle;

fn small_controller() -> DramConfig {
    config(QueueStructure::PerBank, 1, 1, 2)
}

/// Address of `row`/`bank`/`column` under a 1 rank, 1 bank group, 2 bank layout.
fn addr(row: u64, bank: u64, column: u64) -> u64 {
    ((row * 2 + bank) * 1024 + column) * 64
}

fn run_until_drained(ctrl: &mut Controller, limit: Cycle) -> Vec<(Cycle, Issue)> {
    let mut issued = vec![];
    for _ in 0..limit {
        let now = ctrl.now();
        if let Some(issue) = ctrl.tick() {
            issued.push((now, issue));
        }
        if ctrl.is_drained() {
            break;
        }
    }
    assert!(ctrl.is_drained(), "controller did not drain in {} cycles", limit);
    issued
}

#[test]
fn mapping_decodes_fields_low_to_high() {
    let mapping = AddressMapping::new(&DramConfig::default());
    let (row, rank, bank, bankgroup, column) = (5u64, 1u64, 2u64, 3u64, 17u64);
    let hex = ((((row * 2 + rank) * 4 + bank) * 4 + bankgroup) * 1024 + column) * 64 + 13;
    assert_eq!(Address::new(1, 3, 2, 5, 17), mapping.decode(hex));
}

#[test]
fn open_page_reads_share_one_activate() {
    let mut ctrl = Controller::new(Arc::new(small_controller()));
    for column in 0..3 {
        assert!(ctrl.add_transaction(addr(3, 0, column), false));
    }
    let issued = run_until_drained(&mut ctrl, 100);

    let kinds: Vec<CommandKind> = issued.iter().map(|(_, i)| i.command.kind).collect();
    assert_eq!(
        vec![CommandKind::Activate, CommandKind::Read, CommandKind::Read, CommandKind::Read],
        kinds
    );
    let stats = ctrl.stats();
    assert_eq!(1, stats.activates());
    assert_eq!(3, stats.reads());
    assert_eq!(0, stats.precharges());
    assert_eq!(3, stats.accepted());
    assert_eq!(Some(3), ctrl.channel_state().open_row(BankAddr::new(0, 0, 0)));
}

#[test]
fn close_page_uses_auto_precharge() {
    let mut cfg = small_controller();
    cfg.row_buf_policy = RowBufPolicy::ClosePage;
    let mut ctrl = Controller::new(Arc::new(cfg));
    ctrl.add_transaction(addr(3, 1, 0), false);
    ctrl.add_transaction(addr(3, 1, 1), false);
    let issued = run_until_drained(&mut ctrl, 100);

    let kinds: Vec<CommandKind> = issued.iter().map(|(_, i)| i.command.kind).collect();
    assert_eq!(
        vec![
            CommandKind::Activate,
            CommandKind::ReadPrecharge,
            CommandKind::Activate,
            CommandKind::ReadPrecharge
        ],
        kinds
    );
    // second activate waits out tRC
    assert_eq!(7, issued[2].0);
}

#[test]
fn read_after_write_to_same_column_keeps_order() {
    let mut ctrl = Controller::new(Arc::new(small_controller()));
    ctrl.add_transaction(addr(2, 0, 9), true);
    ctrl.add_transaction(addr(2, 0, 9), false);
    let issued = run_until_drained(&mut ctrl, 100);

    let column_cmds: Vec<CommandKind> = issued
        .iter()
        .map(|(_, i)| i.command.kind)
        .filter(|k| k.is_read_write())
        .collect();
    assert_eq!(vec![CommandKind::Write, CommandKind::Read], column_cmds);
}

#[test]
fn full_queue_rejects_transaction() {
    let mut cfg = small_controller();
    cfg.cmd_queue_size = 2;
    let mut ctrl = Controller::new(Arc::new(cfg));
    assert!(ctrl.add_transaction(addr(1, 0, 0), false));
    assert!(ctrl.add_transaction(addr(1, 0, 1), false));
    assert!(!ctrl.will_accept_transaction(addr(1, 0, 2)));
    assert!(!ctrl.add_transaction(addr(1, 0, 2), false));
    assert!(ctrl.will_accept_transaction(addr(1, 1, 2)));

    assert_eq!(1, ctrl.stats().queue_full_rejects());
    assert_eq!(2, ctrl.stats().max_queue_usage());
}

#[test]
fn refresh_holds_rank_for_t_rfc() {
    let mut ctrl = Controller::new(Arc::new(small_controller()));
    ctrl.add_transaction(addr(1, 0, 0), false);
    ctrl.add_transaction(addr(1, 1, 0), false);
    ctrl.request_refresh(refresh_rank(0));
    let issued = run_until_drained(&mut ctrl, 100);

    let (ref_at, first) = issued[0];
    assert_eq!(CommandKind::Refresh, first.command.kind);
    assert!(issued[1..].iter().all(|(at, _)| *at >= ref_at + 3));

    assert_eq!(1, ctrl.stats().refreshes());
    assert_eq!(3, ctrl.stats().hold_cycles());
    assert!(!ctrl.channel_state().is_refresh_waiting());
    assert_eq!(2, ctrl.stats().reads());
}

#[test]
fn utilization_covers_every_cycle() {
    let mut ctrl = Controller::new(Arc::new(small_controller()));
    ctrl.add_transaction(addr(1, 0, 0), false);
    for _ in 0..10 {
        ctrl.tick();
    }
    let totals = *ctrl.blood_graph().totals();
    assert_eq!(10, totals.cycles);
    assert_eq!(20, totals.nop + totals.closed + totals.act + totals.rd + totals.wr + totals.pre
        + totals.row_miss + totals.arb + totals.r#ref + totals.conf);
    assert_eq!(1, totals.read);
    assert_eq!(10, ctrl.take_utilization_window().cycles);
}

#[test]
fn bank_trace_streams_labels() {
    let buf = SharedBuf::default();
    let mut ctrl = Controller::new(Arc::new(small_controller())).with_bank_trace(Box::new(buf.clone()));
    ctrl.tick();
    ctrl.tick();
    ctrl.flush();
    let contents = buf.contents();
    assert_eq!(5, contents.lines().count());
    assert!(contents.starts_with("time,bank,state\n0,0,nop\n"));
}

#[test]
fn reset_clears_queues_and_stats() {
    let mut ctrl = Controller::new(Arc::new(small_controller()));
    ctrl.add_transaction(addr(1, 0, 0), false);
    ctrl.tick();
    ctrl.reset();
    assert_eq!(0, ctrl.now());
    assert!(ctrl.is_drained());
    assert_eq!(0, ctrl.stats().accepted());
    assert_eq!(0, ctrl.blood_graph().totals().cycles);
}
