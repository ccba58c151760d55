//! Classified word access.
//!
//! A [`Bus`] borrows the memory array, the processor registers and an optional
//! trace sink for the duration of one or more accesses. Every access names an
//! [`AccessClass`], which decides how the offset becomes a physical address,
//! whether the TOS registers stand in for memory, and which segment bounds
//! apply.
//!
//! Two kinds of failure exist. Accesses beyond the end of memory and writes
//! through a read-only class fail softly: the caller gets an error value and
//! carries on. A checked access outside its bounds is a [`BoundsViolation`],
//! which aborts the current instruction.

use parse_display::Display;
use tracing::debug;

use super::class::AccessClass;
use super::exception::{AccessError, BoundsViolation};
use super::memory::Memory;
use super::registers::{Bank, Cpx1, Registers};
use super::trace::{Category, Direction, TraceRecord, TraceSink, TracingSink};
use crate::constants::{to_bank, to_offset, to_pa, Address, Word, LA_MASK};

/// The device on whose behalf an access is made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Device {
    #[display("CPU")]
    Cpu,

    #[display("multiplexer channel")]
    Multiplexer,

    #[display("selector channel")]
    Selector,
}

/// An access after address resolution
#[derive(Debug, Clone, Copy)]
struct Target {
    bank: Address,
    offset: Address,
    address: Address,
}

pub struct Bus<'a> {
    memory: &'a mut Memory,
    registers: &'a mut Registers,
    sink: Option<&'a mut dyn TraceSink>,
}

impl std::fmt::Debug for Bus<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("memory", &self.memory)
            .field("registers", &self.registers)
            .finish_non_exhaustive()
    }
}

impl<'a> Bus<'a> {
    /// Accesses are traced through `tracing` until a sink is given
    pub fn new(memory: &'a mut Memory, registers: &'a mut Registers) -> Self {
        Self {
            memory,
            registers,
            sink: None,
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: &'a mut dyn TraceSink) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn memory(&self) -> &Memory {
        &*self.memory
    }

    #[must_use]
    pub fn registers(&self) -> &Registers {
        &*self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut *self.registers
    }

    /// Read a word.
    ///
    /// For classes without a bank register, `offset` is a physical address.
    ///
    /// # Errors
    ///
    /// An address beyond the end of memory fails with
    /// [`AccessError::NonExistentMemory`], and raises the illegal address
    /// interrupt if the CPU asked. A checked access outside its bounds fails
    /// with [`AccessError::BoundsViolation`] unless the CPU is privileged.
    pub fn read(
        &mut self,
        device: Device,
        class: AccessClass,
        offset: Address,
    ) -> Result<Word, AccessError> {
        use AccessClass as A;

        let target = self.resolve(class, offset);
        let stored = match self.memory.get(target.address) {
            Ok(word) => word,
            Err(_) => return Err(self.illegal_address(device, class, &target)),
        };

        let value = match class {
            A::Dma | A::Absolute | A::Fetch | A::Program | A::Data => stored,

            A::AbsoluteMapped | A::DataMapped | A::Stack => match self.tos_index(&target) {
                Some(index) => self.registers.tr[index],
                None => stored,
            },

            A::FetchChecked => {
                if self.in_program_segment(target.offset) {
                    stored
                } else {
                    return Err(self.violation(class, &target).into());
                }
            }

            A::ProgramChecked => {
                if self.in_program_segment(target.offset) || self.registers.is_privileged() {
                    stored
                } else {
                    return Err(self.violation(class, &target).into());
                }
            }

            A::DataChecked => {
                if self.in_data_segment(target.offset) || self.registers.is_privileged() {
                    stored
                } else {
                    return Err(self.violation(class, &target).into());
                }
            }

            // The TOS registers are looked at before the bounds
            A::DataMappedChecked | A::StackChecked => {
                if let Some(index) = self.tos_index(&target) {
                    self.registers.tr[index]
                } else if self.in_data_segment(target.offset) || self.registers.is_privileged() {
                    stored
                } else {
                    return Err(self.violation(class, &target).into());
                }
            }
        };

        self.trace(class, Direction::Read, &target, value);
        Ok(value)
    }

    /// Write a word.
    ///
    /// Checked classes that hit a TOS register also write the memory word
    /// beneath it, unchecked ones only write the register.
    ///
    /// # Errors
    ///
    /// Same as [`Bus::read`]. Classes that cannot write fail with
    /// [`AccessError::AddressParity`] and raise the address parity interrupt.
    pub fn write(
        &mut self,
        device: Device,
        class: AccessClass,
        offset: Address,
        value: Word,
    ) -> Result<(), AccessError> {
        use AccessClass as A;

        let target = self.resolve(class, offset);
        if !self.memory.contains(target.address) {
            return Err(self.illegal_address(device, class, &target));
        }

        match class {
            A::Dma | A::Absolute | A::Data => self.store(&target, value)?,

            A::AbsoluteMapped | A::DataMapped | A::Stack => match self.tos_index(&target) {
                Some(index) => self.registers.tr[index] = value,
                None => self.store(&target, value)?,
            },

            A::DataChecked | A::DataMappedChecked | A::StackChecked => {
                if class.is_mapped() {
                    if let Some(index) = self.tos_index(&target) {
                        self.registers.tr[index] = value;
                    }
                }

                if self.in_data_segment(target.offset) || self.registers.is_privileged() {
                    self.store(&target, value)?;
                } else {
                    return Err(self.violation(class, &target).into());
                }
            }

            A::Fetch | A::FetchChecked | A::Program | A::ProgramChecked => {
                debug!(%class, address = target.address, "Write through a read-only class");
                self.registers.cpx1 |= Cpx1::ADDRESS_PARITY;
                return Err(AccessError::AddressParity(class));
            }
        }

        self.trace(class, Direction::Write, &target, value);
        Ok(())
    }

    /// Read a word for the CPU.
    ///
    /// A soft failure yields a zero word, its interrupt having been raised.
    ///
    /// # Errors
    ///
    /// Only a bounds violation is returned.
    pub fn cpu_read(
        &mut self,
        class: AccessClass,
        offset: Address,
    ) -> Result<Word, BoundsViolation> {
        match self.read(Device::Cpu, class, offset) {
            Ok(value) => Ok(value),
            Err(AccessError::BoundsViolation(trap)) => Err(trap),
            Err(_) => Ok(0),
        }
    }

    /// Write a word for the CPU.
    ///
    /// A soft failure drops the write, its interrupt having been raised.
    ///
    /// # Errors
    ///
    /// Only a bounds violation is returned.
    pub fn cpu_write(
        &mut self,
        class: AccessClass,
        offset: Address,
        value: Word,
    ) -> Result<(), BoundsViolation> {
        match self.write(Device::Cpu, class, offset, value) {
            Err(AccessError::BoundsViolation(trap)) => Err(trap),
            _ => Ok(()),
        }
    }

    /// Convert a byte offset into a word address.
    ///
    /// The byte offset is relative to `DB` for data and stack classes, to `PB`
    /// for program classes, and to zero otherwise. For a checked class and an
    /// unprivileged CPU, both the starting word and the word holding the last
    /// byte of the block must be inside the segment bounds.
    ///
    /// # Errors
    ///
    /// Fails with a bounds violation if the block is not inside the segment.
    pub fn byte_ea(
        &self,
        class: AccessClass,
        byte_offset: Word,
        block_length: u32,
    ) -> Result<Word, BoundsViolation> {
        let base = match class.bank() {
            None => 0,
            Some(Bank::Program) => self.registers.pb,
            Some(Bank::Data | Bank::Stack) => self.registers.db,
        };
        let start = base.wrapping_add(byte_offset >> 1);

        // Instruction fetches are bounded even for a privileged CPU
        let bypass = self.registers.is_privileged() && class.category() != Category::Fetch;

        if class.is_checked() && !bypass {
            // A block running past the logical address space has no last word
            let end = if block_length > 1 {
                u32::from(byte_offset)
                    .checked_add(block_length - 1)
                    .filter(|&last| last <= LA_MASK)
                    .map(|last| {
                        // Word offsets wrap within the logical address space
                        #[allow(clippy::cast_possible_truncation)]
                        let last_word = (last >> 1) as Word;
                        base.wrapping_add(last_word)
                    })
            } else {
                Some(start)
            };

            let outside = [Some(start), end].into_iter().find(|&word| {
                !word.is_some_and(|word| self.in_segment(class, Address::from(word)))
            });

            if let Some(word) = outside {
                let bank = class
                    .bank()
                    .map_or(0, |bank| Address::from(self.registers.bank(bank)));
                debug!(%class, byte_offset, block_length, "Byte block outside of segment");
                return Err(BoundsViolation {
                    class,
                    bank,
                    offset: word.map_or(LA_MASK, Address::from),
                });
            }
        }

        Ok(start)
    }

    /// Bank register value for a class, zero if the class has none
    #[must_use]
    pub fn bank_of(&self, class: AccessClass) -> Word {
        class.bank().map_or(0, |bank| self.registers.bank(bank))
    }

    fn resolve(&self, class: AccessClass, offset: Address) -> Target {
        match class.bank() {
            None => Target {
                bank: to_bank(offset),
                offset: to_offset(offset),
                address: offset,
            },
            Some(bank) => {
                let bank = self.registers.bank(bank);
                Target {
                    bank: Address::from(bank),
                    offset,
                    address: to_pa(bank, offset),
                }
            }
        }
    }

    /// Index of the TOS register standing for this access, if any
    fn tos_index(&self, target: &Target) -> Option<usize> {
        let sm = Address::from(self.registers.sm);
        let top = sm + Address::from(self.registers.tos_count());

        if target.bank == Address::from(self.registers.sbank)
            && target.offset > sm
            && target.offset <= top
        {
            usize::try_from(top - target.offset).ok()
        } else {
            None
        }
    }

    fn in_program_segment(&self, offset: Address) -> bool {
        let registers = &self.registers;
        (Address::from(registers.pb)..=Address::from(registers.pl)).contains(&offset)
    }

    fn in_data_segment(&self, offset: Address) -> bool {
        let registers = &self.registers;
        let top = Address::from(registers.sm) + Address::from(registers.tos_count());
        (Address::from(registers.dl)..=top).contains(&offset)
    }

    fn in_segment(&self, class: AccessClass, offset: Address) -> bool {
        match class.bank() {
            None => true,
            Some(Bank::Program) => self.in_program_segment(offset),
            Some(Bank::Data | Bank::Stack) => self.in_data_segment(offset),
        }
    }

    fn store(&mut self, target: &Target, value: Word) -> Result<(), AccessError> {
        let word = self
            .memory
            .get_mut(target.address)
            .map_err(|_| AccessError::NonExistentMemory(target.address))?;
        *word = value;
        Ok(())
    }

    fn illegal_address(
        &mut self,
        device: Device,
        class: AccessClass,
        target: &Target,
    ) -> AccessError {
        debug!(%device, %class, address = target.address, "Access beyond the end of memory");
        if device == Device::Cpu {
            self.registers.cpx1 |= Cpx1::ILLEGAL_ADDRESS;
        }
        AccessError::NonExistentMemory(target.address)
    }

    fn violation(&self, class: AccessClass, target: &Target) -> BoundsViolation {
        debug!(%class, bank = target.bank, offset = target.offset, "Bounds violation");
        BoundsViolation {
            class,
            bank: target.bank,
            offset: target.offset,
        }
    }

    fn trace(&mut self, class: AccessClass, direction: Direction, target: &Target, value: Word) {
        let record = TraceRecord {
            bank: target.bank,
            offset: target.offset,
            value,
            class,
            direction,
        };

        match &mut self.sink {
            Some(sink) => sink.record(&record),
            None => TracingSink.record(&record),
        }
    }
}
