use std::fmt;

use serde::{Deserialize, Serialize};

use crate::timeq::Cycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    Activate,
    Precharge,
    Read,
    ReadPrecharge,
    Write,
    WritePrecharge,
    /// All banks of a rank.
    Refresh,
    /// A single bank.
    RefreshBank,
}

impl CommandKind {
    pub const COUNT: usize = 8;

    pub const ALL: [CommandKind; CommandKind::COUNT] = [
        CommandKind::Activate,
        CommandKind::Precharge,
        CommandKind::Read,
        CommandKind::ReadPrecharge,
        CommandKind::Write,
        CommandKind::WritePrecharge,
        CommandKind::Refresh,
        CommandKind::RefreshBank,
    ];

    /// Position in per-kind tables.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_read(self) -> bool {
        matches!(self, CommandKind::Read | CommandKind::ReadPrecharge)
    }

    pub fn is_write(self) -> bool {
        matches!(self, CommandKind::Write | CommandKind::WritePrecharge)
    }

    pub fn is_read_write(self) -> bool {
        self.is_read() || self.is_write()
    }

    pub fn is_refresh(self) -> bool {
        matches!(self, CommandKind::Refresh | CommandKind::RefreshBank)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            CommandKind::Activate => "ACT",
            CommandKind::Precharge => "PRE",
            CommandKind::Read => "RD",
            CommandKind::ReadPrecharge => "RDA",
            CommandKind::Write => "WR",
            CommandKind::WritePrecharge => "WRA",
            CommandKind::Refresh => "REF",
            CommandKind::RefreshBank => "REFb",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Coordinates of a single bank inside the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct BankAddr {
    pub rank: usize,
    pub bankgroup: usize,
    pub bank: usize,
}

impl BankAddr {
    pub fn new(rank: usize, bankgroup: usize, bank: usize) -> Self {
        Self { rank, bankgroup, bank }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Address {
    pub rank: usize,
    pub bankgroup: usize,
    pub bank: usize,
    pub row: u32,
    pub column: u32,
}

impl Address {
    pub fn new(rank: usize, bankgroup: usize, bank: usize, row: u32, column: u32) -> Self {
        Self { rank, bankgroup, bank, row, column }
    }

    pub fn bank_addr(&self) -> BankAddr {
        BankAddr::new(self.rank, self.bankgroup, self.bank)
    }

    pub fn same_bank(&self, other: &Address) -> bool {
        self.bank_addr() == other.bank_addr()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub addr: Address,
    pub hex_addr: u64,
    /// Cycle at which the command entered its queue.
    pub arrival: Cycle,
}

impl Command {
    pub fn new(kind: CommandKind, addr: Address, hex_addr: u64, arrival: Cycle) -> Self {
        Self { kind, addr, hex_addr, arrival }
    }

    /// Same target, different kind.  Used for row commands derived from a queued access.
    pub fn with_kind(&self, kind: CommandKind) -> Self {
        Self { kind, ..*self }
    }

    pub fn rank(&self) -> usize {
        self.addr.rank
    }

    pub fn bankgroup(&self) -> usize {
        self.addr.bankgroup
    }

    pub fn bank(&self) -> usize {
        self.addr.bank
    }

    pub fn row(&self) -> u32 {
        self.addr.row
    }

    pub fn column(&self) -> u32 {
        self.addr.column
    }

    pub fn bank_addr(&self) -> BankAddr {
        self.addr.bank_addr()
    }

    pub fn is_read(&self) -> bool {
        self.kind.is_read()
    }

    pub fn is_write(&self) -> bool {
        self.kind.is_write()
    }

    pub fn is_read_write(&self) -> bool {
        self.kind.is_read_write()
    }

    pub fn is_refresh(&self) -> bool {
        self.kind.is_refresh()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ra{} bg{} ba{} row {:#x} col {:#x}",
            self.kind, self.addr.rank, self.addr.bankgroup, self.addr.bank, self.addr.row, self.addr.column
        )
    }
}

/// Where an issued command came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueOrigin {
    /// The queued command itself; it left its queue.
    Queued,
    /// An activate or precharge derived for a queued command that stays queued.
    OnDemand,
    /// Emitted by the refresh coordinator (a refresh or a precharge preparing one).
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Issue {
    pub command: Command,
    pub origin: IssueOrigin,
}

impl Issue {
    pub fn new(command: Command, origin: IssueOrigin) -> Self {
        Self { command, origin }
    }

    /// Whether this issue removed an entry from the queue set.
    pub fn consumed(&self) -> bool {
        self.origin == IssueOrigin::Queued
    }
}
