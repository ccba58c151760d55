use thiserror::Error;

use super::class::AccessClass;
use crate::constants::Address;

/// A checked access fell outside its segment bounds while the processor was
/// not privileged.
///
/// This is the only hard failure of the memory subsystem: it aborts the
/// current instruction, and any byte sequence in progress is abandoned.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("bounds violation: {class} access to {bank:o}.{offset:06o}")]
pub struct BoundsViolation {
    pub class: AccessClass,
    pub bank: Address,
    pub offset: Address,
}

/// Failure of a classified access
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    /// The physical address is beyond the end of memory. A read yields zero.
    #[error("non-existent memory at {0:#o}")]
    NonExistentMemory(Address),

    /// The class cannot be used for writing. Memory is unchanged.
    #[error("address parity error: {0} accesses cannot write")]
    AddressParity(AccessClass),

    #[error(transparent)]
    BoundsViolation(#[from] BoundsViolation),
}

impl AccessError {
    /// Whether the error aborts the current instruction
    #[must_use]
    pub fn is_trap(&self) -> bool {
        matches!(self, AccessError::BoundsViolation(_))
    }
}
