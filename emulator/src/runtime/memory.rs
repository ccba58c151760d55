use thiserror::Error;
use tracing::{debug, info};

use super::registers::Registers;
use crate::constants::{to_pa, Address, Word, DV_MASK, MEMORY_INCREMENT};

/// Represents errors related to raw memory manipulations
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// The given address is beyond the end of memory
    #[error("non-existent memory at {0:#o}")]
    NonExistent(Address),
}

/// The memory array could not be allocated
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("could not allocate {words} words of memory")]
pub struct AllocationFailure {
    pub words: usize,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SizeError {
    #[error("memory size of {size} words exceeds the allocation of {capacity} words")]
    TooLarge { size: usize, capacity: usize },

    #[error("memory size of {0} words is not a multiple of {MEMORY_INCREMENT} words")]
    Increment(usize),
}

/// Where an examined address is relative to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Origin {
    /// A physical address
    #[default]
    Absolute,

    /// An offset into the current program bank, as used when the simulator
    /// stops
    Program,
}

/// Holds the memory words of the computer.
///
/// The array is allocated once, for the largest configuration that will be
/// used. Only the first [`Memory::size`] words are reachable.
#[derive(Default, Clone)]
pub struct Memory {
    words: Vec<Word>,
    size: usize,
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Memory {{ size: {}, capacity: {}, words: [...] }}",
            self.size,
            self.words.len()
        )
    }
}

impl Memory {
    /// Allocate a memory array with every word reachable
    ///
    /// # Errors
    ///
    /// It fails if the array cannot be allocated.
    pub fn with_size(size: usize) -> Result<Self, AllocationFailure> {
        let mut memory = Self::default();
        memory.initialize(size)?;
        Ok(memory)
    }

    /// Allocate and clear the memory array.
    ///
    /// Nothing happens if the array was already allocated. The whole capacity
    /// is reachable until [`Memory::set_size`] says otherwise.
    ///
    /// # Errors
    ///
    /// It fails if the array cannot be allocated.
    pub fn initialize(&mut self, capacity: usize) -> Result<(), AllocationFailure> {
        if !self.words.is_empty() {
            debug!(capacity, "Memory is already allocated");
            return Ok(());
        }

        let mut words = Vec::new();
        words
            .try_reserve_exact(capacity)
            .map_err(|_| AllocationFailure { words: capacity })?;
        words.resize(capacity, 0);

        info!(capacity, "Allocated memory");
        self.words = words;
        self.size = capacity;
        Ok(())
    }

    /// Number of words allocated
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.words.len()
    }

    /// Number of words reachable
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Change the configured memory size.
    ///
    /// # Errors
    ///
    /// The size must fit the allocation, and be a whole number of memory
    /// arrays.
    pub fn set_size(&mut self, size: usize) -> Result<(), SizeError> {
        if size > self.capacity() {
            return Err(SizeError::TooLarge {
                size,
                capacity: self.capacity(),
            });
        }

        if size == 0 || size % MEMORY_INCREMENT != 0 {
            return Err(SizeError::Increment(size));
        }

        info!(size, "Setting memory size");
        self.size = size;
        Ok(())
    }

    /// Check if the address is inside configured memory
    #[must_use]
    pub fn contains(&self, address: Address) -> bool {
        usize::try_from(address).is_ok_and(|address| address < self.size)
    }

    fn index(&self, address: Address) -> Result<usize, MemoryError> {
        usize::try_from(address)
            .ok()
            .filter(|&index| index < self.size)
            .ok_or(MemoryError::NonExistent(address))
    }

    /// Get the word at an address
    ///
    /// # Errors
    ///
    /// It fails if the address is beyond the end of memory.
    pub fn get(&self, address: Address) -> Result<Word, MemoryError> {
        let index = self.index(address)?;
        Ok(self.words[index])
    }

    /// Get a mutable reference to the word at an address
    ///
    /// # Errors
    ///
    /// It fails if the address is beyond the end of memory.
    pub fn get_mut(&mut self, address: Address) -> Result<&mut Word, MemoryError> {
        let index = self.index(address)?;
        Ok(&mut self.words[index])
    }

    /// Examine a memory location for the debugger.
    ///
    /// No classification, TOS overlay or bounds check applies.
    ///
    /// # Errors
    ///
    /// It fails if the address is beyond the end of memory.
    pub fn examine(&self, address: Address) -> Result<Word, MemoryError> {
        self.get(address)
    }

    /// Examine a memory location, with the address relative to `origin`
    ///
    /// # Errors
    ///
    /// It fails if the resulting address is beyond the end of memory.
    pub fn examine_at(
        &self,
        registers: &Registers,
        origin: Origin,
        address: Address,
    ) -> Result<Word, MemoryError> {
        let address = match origin {
            Origin::Absolute => address,
            Origin::Program => to_pa(registers.pbank, address),
        };
        self.examine(address)
    }

    /// Deposit a value for the debugger, masked to the data width.
    ///
    /// # Errors
    ///
    /// It fails if the address is beyond the end of memory.
    pub fn deposit(&mut self, address: Address, value: u32) -> Result<(), MemoryError> {
        let word = self.get_mut(address)?;
        // Masked to sixteen bits, so this cannot truncate
        #[allow(clippy::cast_possible_truncation)]
        {
            *word = (value & DV_MASK) as Word;
        }
        Ok(())
    }

    /// Fill memory from `start` to the end with a value
    pub fn fill(&mut self, start: Address, value: Word) {
        if let Ok(start) = self.index(start) {
            self.words[start..self.size].fill(value);
        }
    }

    /// Check that memory from `start` to the end only holds zeros
    #[must_use]
    pub fn is_empty_from(&self, start: Address) -> bool {
        match self.index(start) {
            Ok(start) => self.words[start..self.size].iter().all(|&w| w == 0),
            Err(_) => true,
        }
    }
}
