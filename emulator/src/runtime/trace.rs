//! Trace records for classified memory accesses.

use parse_display::Display;
use tracing::trace;

use super::class::AccessClass;
use crate::constants::{Address, Word};

/// Which trace stream an access belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "lowercase")]
pub enum Category {
    /// Instruction fetches
    Fetch,

    /// Data transfers
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "lowercase")]
pub enum Direction {
    Read,
    Write,
}

/// One successful classified access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRecord {
    pub bank: Address,
    pub offset: Address,
    pub value: Word,
    pub class: AccessClass,
    pub direction: Direction,
}

impl TraceRecord {
    #[must_use]
    pub fn category(&self) -> Category {
        self.class.category()
    }
}

impl std::fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02o}.{:06o}  {:06o}  {}",
            self.bank,
            self.offset,
            self.value,
            self.class.name()
        )?;

        // Fetches are always reads
        match (self.category(), self.direction) {
            (Category::Fetch, Direction::Read) => Ok(()),
            (_, direction) => write!(f, " {direction}"),
        }
    }
}

/// Receives a record for every successful classified access
pub trait TraceSink {
    fn record(&mut self, record: &TraceRecord);
}

/// Sends trace records to `tracing`, one target per category
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn record(&mut self, record: &TraceRecord) {
        match record.category() {
            Category::Fetch => trace!(
                target: "hp3000_emulator::mem::fetch",
                bank = record.bank,
                offset = record.offset,
                value = record.value,
                class = record.class.name(),
                direction = %record.direction,
                "{record}"
            ),
            Category::Data => trace!(
                target: "hp3000_emulator::mem::data",
                bank = record.bank,
                offset = record.offset,
                value = record.value,
                class = record.class.name(),
                direction = %record.direction,
                "{record}"
            ),
        }
    }
}

impl TraceSink for Vec<TraceRecord> {
    fn record(&mut self, record: &TraceRecord) {
        self.push(*record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_record_test() {
        let fetch = TraceRecord {
            bank: 1,
            offset: 0o1000,
            value: 0o12345,
            class: AccessClass::FetchChecked,
            direction: Direction::Read,
        };
        insta::assert_snapshot!(fetch.to_string(), @"01.001000  012345  instruction fetch");

        let write = TraceRecord {
            class: AccessClass::StackChecked,
            direction: Direction::Write,
            ..fetch
        };
        insta::assert_snapshot!(write.to_string(), @"01.001000  012345  stack write");
    }
}
