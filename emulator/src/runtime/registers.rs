use bitflags::bitflags;
use parse_display::Display;
use thiserror::Error;

use crate::constants::{Word, TOS_REGISTER_COUNT};

bitflags! {
    /// Status register
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct Status: Word {
        const PRIVILEGED  = 0o100_000;
        const INTERRUPTS  = 0o040_000;
        const USER_TRAPS  = 0o020_000;
        const RIGHT_STACK = 0o010_000;
        const OVERFLOW    = 0o004_000;
        const CARRY       = 0o002_000;
    }
}

impl std::fmt::Debug for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:06o}", self.bits())
    }
}

bitflags! {
    /// First CPU interrupt register.
    ///
    /// Only the flags raised by the memory subsystem are named here; the others
    /// are kept as-is.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct Cpx1: Word {
        const ILLEGAL_ADDRESS = 0o020_000;
        const ADDRESS_PARITY  = 0o002_000;

        const _ = !0;
    }
}

impl std::fmt::Debug for Cpx1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:06o}", self.bits())
    }
}

/// Bank registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "UPPERCASE")]
pub enum Bank {
    /// `PBANK`, code segments
    #[display("PBANK")]
    Program,

    /// `DBANK`, data segments
    #[display("DBANK")]
    Data,

    /// `SBANK`, the stack
    #[display("SBANK")]
    Stack,
}

/// The part of the processor state the memory subsystem looks at.
///
/// The memory subsystem never changes the bank or bound registers. It reads the
/// TOS registers and may overlay them, and raises interrupt flags in `cpx1`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registers {
    /// Program bank
    pub pbank: Word,

    /// Data bank
    pub dbank: Word,

    /// Stack bank
    pub sbank: Word,

    /// Program base
    pub pb: Word,

    /// Program limit
    pub pl: Word,

    /// Data base
    pub db: Word,

    /// Data limit
    pub dl: Word,

    /// Stack marker: offset of the last stack word held in memory
    pub sm: Word,

    /// Number of valid TOS registers
    pub sr: Word,

    /// TOS registers, `tr[0]` is the top of the stack
    pub tr: [Word; TOS_REGISTER_COUNT],

    /// Status register
    pub sta: Status,

    /// CPU interrupt flags
    pub cpx1: Cpx1,
}

impl Registers {
    #[must_use]
    pub fn is_privileged(&self) -> bool {
        self.sta.contains(Status::PRIVILEGED)
    }

    #[must_use]
    pub fn bank(&self, bank: Bank) -> Word {
        match bank {
            Bank::Program => self.pbank,
            Bank::Data => self.dbank,
            Bank::Stack => self.sbank,
        }
    }

    /// Number of TOS registers in use, never more than the register file holds
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn tos_count(&self) -> Word {
        self.sr.min(TOS_REGISTER_COUNT as Word)
    }

    #[must_use]
    pub fn get(&self, reg: Reg) -> Word {
        match reg {
            Reg::Pbank => self.pbank,
            Reg::Dbank => self.dbank,
            Reg::Sbank => self.sbank,
            Reg::Pb => self.pb,
            Reg::Pl => self.pl,
            Reg::Db => self.db,
            Reg::Dl => self.dl,
            Reg::Sm => self.sm,
            Reg::Sr => self.sr,
            Reg::Tr(n) => self.tr[usize::from(n)],
            Reg::Sta => self.sta.bits(),
            Reg::Cpx1 => self.cpx1.bits(),
        }
    }

    /// Set a register value
    ///
    /// # Errors
    ///
    /// This function will return an error if more TOS registers are declared
    /// valid than the register file holds.
    pub fn set(&mut self, reg: Reg, value: Word) -> Result<(), RegisterError> {
        match reg {
            Reg::Pbank => self.pbank = value,
            Reg::Dbank => self.dbank = value,
            Reg::Sbank => self.sbank = value,
            Reg::Pb => self.pb = value,
            Reg::Pl => self.pl = value,
            Reg::Db => self.db = value,
            Reg::Dl => self.dl = value,
            Reg::Sm => self.sm = value,
            Reg::Sr => {
                if usize::from(value) > TOS_REGISTER_COUNT {
                    return Err(RegisterError::TosCount(value));
                }
                self.sr = value;
            }
            Reg::Tr(n) => self.tr[usize::from(n)] = value,
            Reg::Sta => self.sta = Status::from_bits_retain(value),
            Reg::Cpx1 => self.cpx1 = Cpx1::from_bits_retain(value),
        };
        Ok(())
    }
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PBANK={:o} DBANK={:o} SBANK={:o} | PB={:06o} PL={:06o} | DB={:06o} DL={:06o} SM={:06o} SR={} | STA={:?} CPX1={:?}",
            self.pbank,
            self.dbank,
            self.sbank,
            self.pb,
            self.pl,
            self.db,
            self.dl,
            self.sm,
            self.sr,
            self.sta,
            self.cpx1
        )
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    #[error("only {TOS_REGISTER_COUNT} TOS registers exist, {0} cannot be valid")]
    TosCount(Word),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "UPPERCASE")]
pub enum Reg {
    Pbank,
    Dbank,
    Sbank,
    Pb,
    Pl,
    Db,
    Dl,
    Sm,
    Sr,

    /// One of the TOS registers
    #[display("TR{0}")]
    Tr(u8),

    Sta,
    Cpx1,
}

impl Reg {
    pub const ALL: [Reg; 15] = [
        Reg::Pbank,
        Reg::Dbank,
        Reg::Sbank,
        Reg::Pb,
        Reg::Pl,
        Reg::Db,
        Reg::Dl,
        Reg::Sm,
        Reg::Sr,
        Reg::Tr(0),
        Reg::Tr(1),
        Reg::Tr(2),
        Reg::Tr(3),
        Reg::Sta,
        Reg::Cpx1,
    ];
}

#[derive(Error, Debug)]
#[error("could not parse register")]
pub struct RegisterParseError;

impl std::str::FromStr for Reg {
    type Err = RegisterParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pbank" => Ok(Reg::Pbank),
            "dbank" => Ok(Reg::Dbank),
            "sbank" => Ok(Reg::Sbank),
            "pb" => Ok(Reg::Pb),
            "pl" => Ok(Reg::Pl),
            "db" => Ok(Reg::Db),
            "dl" => Ok(Reg::Dl),
            "sm" => Ok(Reg::Sm),
            "sr" => Ok(Reg::Sr),
            "tr0" => Ok(Reg::Tr(0)),
            "tr1" => Ok(Reg::Tr(1)),
            "tr2" => Ok(Reg::Tr(2)),
            "tr3" => Ok(Reg::Tr(3)),
            "sta" => Ok(Reg::Sta),
            "cpx1" => Ok(Reg::Cpx1),
            _ => Err(RegisterParseError),
        }
    }
}
