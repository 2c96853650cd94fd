use crate::dram::command::{BankAddr, Command, CommandKind};
use crate::timeq::{is_legal_at, Cycle};

/// Read-only view of per-bank row state and timing legality.
///
/// The scheduling core only ever queries this; the issuing stage owns the implementation and
/// updates it with whatever the core hands out.
pub trait BankTimingTracker {
    fn open_row(&self, bank: BankAddr) -> Option<u32>;

    /// Column accesses served from the open row since it was activated.
    fn row_hit_count(&self, bank: BankAddr) -> u32;

    /// Earliest cycle at which `kind` may issue to `bank`.
    fn earliest_cycle(&self, kind: CommandKind, bank: BankAddr) -> Cycle;

    /// Oldest refresh the channel owes, if any.
    fn pending_refresh(&self) -> Option<Command>;

    fn is_row_open(&self, bank: BankAddr) -> bool {
        self.open_row(bank).is_some()
    }

    fn is_legal(&self, kind: CommandKind, bank: BankAddr, now: Cycle) -> bool {
        is_legal_at(self.earliest_cycle(kind, bank), now)
    }

    /// Kind that has to issue next on the command's bank to make progress on `cmd`.
    fn required_kind(&self, cmd: &Command) -> CommandKind {
        let open_row = self.open_row(cmd.bank_addr());
        match cmd.kind {
            kind if kind.is_read_write() => match open_row {
                None => CommandKind::Activate,
                Some(row) if row == cmd.row() => kind,
                Some(_) => CommandKind::Precharge,
            },
            CommandKind::Activate => match open_row {
                None => CommandKind::Activate,
                Some(_) => CommandKind::Precharge,
            },
            kind => kind,
        }
    }

    /// The command to issue for `cmd` right now, or None if it is not yet legal.
    fn ready_command(&self, cmd: &Command, now: Cycle) -> Option<Command> {
        let kind = self.required_kind(cmd);
        if self.is_legal(kind, cmd.bank_addr(), now) {
            Some(cmd.with_kind(kind))
        } else {
            None
        }
    }

    fn is_row_hit(&self, cmd: &Command) -> bool {
        cmd.is_read_write() && self.open_row(cmd.bank_addr()) == Some(cmd.row())
    }
}
