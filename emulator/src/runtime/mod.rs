use std::fmt::Debug;

use tracing::info;

use crate::constants::MAX_MEMORY_SIZE;

mod bus;
mod bytes;
mod class;
mod exception;
mod memory;
mod registers;
mod trace;

pub use self::bus::{Bus, Device};
pub use self::bytes::{ByteAccessor, Extent};
pub use self::class::{AccessClass, Properties};
pub use self::exception::{AccessError, BoundsViolation};
pub use self::memory::{AllocationFailure, Memory, MemoryError, Origin, SizeError};
pub use self::registers::{Bank, Cpx1, Reg, RegisterError, RegisterParseError, Registers, Status};
pub use self::trace::{Category, Direction, TraceRecord, TraceSink, TracingSink};

/// Errors raised while bringing up a computer
#[derive(thiserror::Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Allocation(#[from] AllocationFailure),

    #[error(transparent)]
    Size(#[from] SizeError),
}

/// The memory array and the processor registers it is accessed through
#[derive(Default, Clone)]
pub struct Computer {
    pub registers: Registers,
    pub memory: Memory,
}

impl Debug for Computer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Computer {{ registers: {:?}, memory: {:?} }}",
            self.registers, self.memory
        )
    }
}

impl Computer {
    /// Allocate the largest memory configuration and set `size` words of it
    ///
    /// # Errors
    ///
    /// It fails if memory cannot be allocated, or the size is not a valid
    /// configuration.
    pub fn new(size: usize) -> Result<Self, StartupError> {
        let mut memory = Memory::default();
        memory.initialize(MAX_MEMORY_SIZE)?;
        memory.set_size(size)?;
        info!(size, "Computer ready");
        Ok(Self {
            registers: Registers::default(),
            memory,
        })
    }

    /// Access memory through the registers, tracing with `tracing`
    pub fn bus(&mut self) -> Bus<'_> {
        Bus::new(&mut self.memory, &mut self.registers)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::constants::{to_pa, Address, Word};

    const SIZE: usize = 0o400_000;
    const DL: Word = 0o1000;
    const DB: Word = 0o2000;
    const SM: Word = 0o3000;
    const PB: Word = 0o10_000;
    const PL: Word = 0o11_000;

    /// Two banks of memory, the stack in bank 1 with two TOS registers valid
    fn computer() -> Computer {
        Computer {
            memory: Memory::with_size(SIZE).unwrap(),
            registers: Registers {
                pbank: 0,
                dbank: 1,
                sbank: 1,
                pb: PB,
                pl: PL,
                db: DB,
                dl: DL,
                sm: SM,
                sr: 2,
                tr: [0o11, 0o22, 0o33, 0o44],
                ..Registers::default()
            },
        }
    }

    fn privileged(mut computer: Computer) -> Computer {
        computer.registers.sta |= Status::PRIVILEGED;
        computer
    }

    #[test]
    fn unbanked_address_test() {
        let mut computer = computer();
        computer.registers.pbank = 0o17;
        computer.registers.dbank = 0o17;
        computer.registers.sbank = 0o17;

        for (index, class) in [AccessClass::Absolute, AccessClass::AbsoluteMapped, AccessClass::Dma]
            .into_iter()
            .enumerate()
        {
            let address: Address = 0o200_100 + Address::try_from(index).unwrap();
            let value = Word::try_from(index).unwrap() + 0o700;
            computer.bus().write(Device::Cpu, class, address, value).unwrap();
            assert_eq!(computer.memory.examine(address), Ok(value));
            assert_eq!(computer.bus().read(Device::Cpu, class, address), Ok(value));
        }
    }

    #[test]
    fn banked_address_test() {
        let mut computer = computer();
        computer.memory.deposit(to_pa(1, 0o1500), 0o1234).unwrap();
        computer.memory.deposit(0o1500, 0o4321).unwrap();

        let mut bus = computer.bus();
        assert_eq!(bus.read(Device::Cpu, AccessClass::Data, 0o1500), Ok(0o1234));
        assert_eq!(bus.read(Device::Cpu, AccessClass::Program, 0o1500), Ok(0o4321));
        assert_eq!(bus.read(Device::Cpu, AccessClass::Absolute, 0o1500), Ok(0o4321));
    }

    #[test]
    fn out_of_range_test() {
        let mut computer = computer();

        // A corrupted bank register is not masked to a valid bank
        computer.registers.dbank = 0o177;
        for class in AccessClass::ALL {
            let offset = if class.bank().is_some() { 0o1500 } else { 0o400_000 };
            computer.registers.cpx1 = Cpx1::empty();

            let mut bus = computer.bus();
            let read = bus.read(Device::Cpu, class, offset);
            let write = bus.write(Device::Cpu, class, offset, 1);

            if class.bank() == Some(Bank::Data) || class.bank().is_none() {
                assert!(matches!(read, Err(AccessError::NonExistentMemory(_))), "{class}");
                assert!(matches!(write, Err(AccessError::NonExistentMemory(_))), "{class}");
                assert!(computer.registers.cpx1.contains(Cpx1::ILLEGAL_ADDRESS));
            }
        }

        // Channels do not raise the interrupt, and a CPU read yields zero
        computer.registers.cpx1 = Cpx1::empty();
        let mut bus = computer.bus();
        assert_eq!(
            bus.read(Device::Selector, AccessClass::Dma, 0o400_000),
            Err(AccessError::NonExistentMemory(0o400_000))
        );
        assert_eq!(
            bus.write(Device::Multiplexer, AccessClass::Dma, 0o400_000, 5),
            Err(AccessError::NonExistentMemory(0o400_000))
        );
        assert!(computer.registers.cpx1.is_empty());

        assert_eq!(computer.bus().cpu_read(AccessClass::Data, 0o1500), Ok(0));
        assert!(computer.registers.cpx1.contains(Cpx1::ILLEGAL_ADDRESS));
    }

    /// An offset outside of the bounds for each checked class
    fn outside(class: AccessClass) -> Vec<Address> {
        match class.bank() {
            Some(Bank::Program) => vec![Address::from(PB) - 1, Address::from(PL) + 1],
            _ => vec![Address::from(DL) - 1, Address::from(SM) + 3],
        }
    }

    #[test]
    fn bounds_violation_test() {
        let checked = AccessClass::ALL.into_iter().filter(|c| c.is_checked());
        for class in checked {
            for offset in outside(class) {
                let mut computer = computer();
                let error = computer.bus().read(Device::Cpu, class, offset).unwrap_err();
                assert!(error.is_trap(), "{class} {offset:o}");
                assert_eq!(
                    error,
                    AccessError::BoundsViolation(BoundsViolation {
                        class,
                        bank: Address::from(computer.bus().bank_of(class)),
                        offset
                    })
                );

                if class.is_writable() {
                    let error = computer.bus().write(Device::Cpu, class, offset, 1).unwrap_err();
                    assert!(error.is_trap());
                    assert!(computer.memory.is_empty_from(0));
                }
            }
        }
    }

    #[test]
    fn privileged_bypass_test() {
        let classes = [
            AccessClass::ProgramChecked,
            AccessClass::DataChecked,
            AccessClass::DataMappedChecked,
            AccessClass::StackChecked,
        ];
        for class in classes {
            for offset in outside(class) {
                let mut computer = privileged(computer());
                assert!(computer.bus().read(Device::Cpu, class, offset).is_ok());
                if class.is_writable() {
                    computer.bus().write(Device::Cpu, class, offset, 0o55).unwrap();
                    assert_eq!(computer.memory.examine(to_pa(1, offset)), Ok(0o55));
                }
            }
        }

        // Instruction fetches are checked even when privileged
        let mut computer = privileged(computer());
        let error = computer
            .bus()
            .read(Device::Cpu, AccessClass::FetchChecked, Address::from(PL) + 1)
            .unwrap_err();
        assert!(error.is_trap());
    }

    #[test]
    fn tos_overlay_read_test() {
        let mut computer = computer();
        let top = Address::from(SM) + 2;
        computer.memory.deposit(to_pa(1, top), 0o777).unwrap();

        for class in [
            AccessClass::AbsoluteMapped,
            AccessClass::DataMapped,
            AccessClass::Stack,
            AccessClass::DataMappedChecked,
            AccessClass::StackChecked,
        ] {
            let offset = if class.bank().is_some() { top } else { to_pa(1, top) };
            let mut bus = computer.bus();
            // SM + SR is the top of the stack, in TR0
            assert_eq!(bus.read(Device::Cpu, class, offset), Ok(0o11), "{class}");
            assert_eq!(bus.read(Device::Cpu, class, offset - 1), Ok(0o22), "{class}");
            // SM itself and above SM + SR come from memory
            assert_eq!(bus.read(Device::Cpu, class, offset - 2), Ok(0), "{class}");
        }

        // Unmapped classes always go to memory
        let mut bus = computer.bus();
        assert_eq!(bus.read(Device::Cpu, AccessClass::Data, top), Ok(0o777));
        assert_eq!(bus.read(Device::Cpu, AccessClass::DataChecked, top), Ok(0o777));
    }

    #[test]
    fn tos_overlay_requires_stack_bank_test() {
        let mut computer = computer();
        computer.registers.dbank = 0;
        let top = Address::from(SM) + 2;
        computer.memory.deposit(top, 0o777).unwrap();

        let mut bus = computer.bus();
        assert_eq!(bus.read(Device::Cpu, AccessClass::DataMapped, top), Ok(0o777));
        assert_eq!(bus.read(Device::Cpu, AccessClass::Stack, top), Ok(0o11));
    }

    #[test]
    fn tos_overlay_write_test() {
        let mut computer = computer();
        let top = Address::from(SM) + 2;

        // Unchecked: only the register
        computer.bus().write(Device::Cpu, AccessClass::Stack, top, 0o100).unwrap();
        assert_eq!(computer.registers.tr[0], 0o100);
        assert_eq!(computer.memory.examine(to_pa(1, top)), Ok(0));

        // Checked: the register and the word beneath it
        computer
            .bus()
            .write(Device::Cpu, AccessClass::StackChecked, top - 1, 0o200)
            .unwrap();
        assert_eq!(computer.registers.tr[1], 0o200);
        assert_eq!(computer.memory.examine(to_pa(1, top - 1)), Ok(0o200));

        computer
            .bus()
            .write(Device::Cpu, AccessClass::DataMappedChecked, top, 0o300)
            .unwrap();
        assert_eq!(computer.registers.tr[0], 0o300);
        assert_eq!(computer.memory.examine(to_pa(1, top)), Ok(0o300));

        // Both paths agree on the value afterwards
        let mut bus = computer.bus();
        assert_eq!(bus.read(Device::Cpu, AccessClass::Stack, top), Ok(0o300));
        assert_eq!(bus.read(Device::Cpu, AccessClass::Data, top), Ok(0o300));
    }

    #[test]
    fn read_only_class_test() {
        for class in [
            AccessClass::Fetch,
            AccessClass::FetchChecked,
            AccessClass::Program,
            AccessClass::ProgramChecked,
        ] {
            let mut computer = computer();
            let error = computer
                .bus()
                .write(Device::Cpu, class, Address::from(PB), 0o1234)
                .unwrap_err();
            assert_eq!(error, AccessError::AddressParity(class));
            assert!(!error.is_trap());
            assert!(computer.registers.cpx1.contains(Cpx1::ADDRESS_PARITY));
            assert!(computer.memory.is_empty_from(0));
        }
    }

    #[test]
    fn trace_test() {
        let mut computer = computer();
        let mut records: Vec<TraceRecord> = Vec::new();
        {
            let mut bus = Bus::new(&mut computer.memory, &mut computer.registers)
                .with_sink(&mut records);
            bus.write(Device::Cpu, AccessClass::DataChecked, 0o1500, 0o42).unwrap();
            bus.read(Device::Cpu, AccessClass::Fetch, 0o10_010).unwrap();
            // Failures are not traced
            bus.write(Device::Cpu, AccessClass::Program, 0o10_010, 1).unwrap_err();
            bus.read(Device::Cpu, AccessClass::Dma, 0o400_000).unwrap_err();
        }

        assert_eq!(
            records,
            vec![
                TraceRecord {
                    bank: 1,
                    offset: 0o1500,
                    value: 0o42,
                    class: AccessClass::DataChecked,
                    direction: Direction::Write,
                },
                TraceRecord {
                    bank: 0,
                    offset: 0o10_010,
                    value: 0,
                    class: AccessClass::Fetch,
                    direction: Direction::Read,
                },
            ]
        );
        assert_eq!(records[1].category(), Category::Fetch);
    }

    #[test]
    fn byte_ea_test() {
        let mut computer = computer();
        let bus = computer.bus();

        assert_eq!(bus.byte_ea(AccessClass::Data, 0o11, 0), Ok(DB + 0o4));
        assert_eq!(bus.byte_ea(AccessClass::Program, 0o10, 0), Ok(PB + 0o4));
        assert_eq!(bus.byte_ea(AccessClass::Absolute, 0o11, 0), Ok(0o4));

        // The whole block must be in the segment
        let room = u32::from(SM + 2 - DB + 1) * 2;
        assert_eq!(bus.byte_ea(AccessClass::DataChecked, 0, room), Ok(DB));
        assert!(bus.byte_ea(AccessClass::DataChecked, 0, room + 1).is_err());
        assert!(bus.byte_ea(AccessClass::DataChecked, 0o177_776, 2).is_err());
        // Unchecked classes are never checked
        assert_eq!(bus.byte_ea(AccessClass::Data, 0, room + 1), Ok(DB));
    }

    #[test]
    fn byte_ea_huge_block_test() {
        let mut computer = computer();
        let bus = computer.bus();

        let error = bus
            .byte_ea(AccessClass::DataChecked, 2, u32::MAX)
            .unwrap_err();
        assert_eq!(error.class, AccessClass::DataChecked);
        assert_eq!(error.offset, crate::constants::LA_MASK);
        assert!(bus.byte_ea(AccessClass::DataChecked, 0, 0o200_001).is_err());
        assert_eq!(bus.byte_ea(AccessClass::Data, 2, u32::MAX), Ok(DB + 1));
    }

    #[test]
    fn byte_ea_privileged_test() {
        let mut computer = privileged(computer());
        let bus = computer.bus();

        // One word past the end of the program segment
        let offset = (PL - PB + 1) * 2;
        assert_eq!(
            bus.byte_ea(AccessClass::ProgramChecked, offset, 0),
            Ok(PL + 1)
        );
        let error = bus
            .byte_ea(AccessClass::FetchChecked, offset, 0)
            .unwrap_err();
        assert_eq!(error.offset, Address::from(PL + 1));
    }

    #[test]
    fn startup_test() {
        let computer = Computer::new(crate::constants::MIN_MEMORY_SIZE).unwrap();
        assert_eq!(computer.memory.size(), crate::constants::MIN_MEMORY_SIZE);
        assert_eq!(computer.memory.capacity(), MAX_MEMORY_SIZE);

        assert!(matches!(Computer::new(12), Err(StartupError::Size(_))));
    }
}
