//! This module implements the TTY memory console.
//!
//! It is mainly based on two crates:
//!   - rustyline, to handle the line-editting logic
//!   - clap, to handle the parsing of those interactive commands
//!
//! Using Parser to do this is a bit of a hack, and requires some weird options
//! to have it working but works nonetheless. The same commands are used when
//! running a script.

use clap::{Parser, Subcommand, ValueEnum};
use hp3000_emulator::constants::{Byte, Word};
use hp3000_emulator::format;
use hp3000_emulator::runtime::{
    AccessClass, AccessError, BoundsViolation, Bus, ByteAccessor, Computer, Cpx1, Device, Extent,
    Origin, Reg,
};
use rustyline::history::DefaultHistory;
use rustyline::{Behavior, CompletionType, Config, EditMode, Editor};
use tracing::{debug, info, warn};

mod helper;
pub(crate) mod parse;

use self::helper::ConsoleHelper;
use self::parse::Number;

static HELP: &str = r#"
Run "help [command]" for command-specific help.
An empty line re-runs the last valid command.
Numbers starting with 0x are hexadecimal, with 0 octal, otherwise decimal."#;

#[derive(Parser, Clone, Debug)]
#[command(
    help_template = "{about}\n\nCOMMANDS:\n{subcommands}\n{after-help}",
    after_help = HELP,
    disable_version_flag = true,
    infer_subcommands = true,
    no_binary_name = true,
)]
/// Memory console commands
pub(crate) enum Command {
    /// Show words in memory, without any access check
    #[command(alias = "e")]
    Examine {
        /// Physical address of the first word
        address: Number,

        /// Number of words to show
        #[arg(default_value = "1")]
        count: u32,

        /// The address is an offset in the program bank
        #[arg(short, long)]
        program: bool,
    },

    /// Store a word in memory, without any access check
    #[command(alias = "d")]
    Deposit {
        /// Physical address
        address: Number,

        /// The value to store
        value: Number,
    },

    /// Read a word through an access class
    Read {
        class: AccessClass,

        /// Offset in the bank selected by the class
        offset: Number,

        /// Device doing the access
        #[arg(short, long, value_enum, default_value_t = Requester::Cpu)]
        device: Requester,
    },

    /// Write a word through an access class
    Write {
        class: AccessClass,

        /// Offset in the bank selected by the class
        offset: Number,

        /// The value to write
        value: Number,

        /// Device doing the access
        #[arg(short, long, value_enum, default_value_t = Requester::Cpu)]
        device: Requester,
    },

    /// Show the state of registers
    Registers { register: Option<Reg> },

    /// Set a register
    Set { register: Reg, value: Number },

    /// Fill memory from an address to the end
    Fill { start: Number, value: Number },

    /// Check whether memory is zero from an address to the end
    Empty {
        #[arg(default_value = "0")]
        start: Number,
    },

    /// Access byte strings through a byte accessor
    Bytes {
        #[command(subcommand)]
        sub: BytesCommand,
    },

    /// Render operands in memory
    Format {
        #[command(subcommand)]
        sub: FormatCommand,
    },

    /// Show the interrupt flags raised by memory accesses
    Interrupts {
        /// Clear the flags afterwards
        #[arg(short, long)]
        clear: bool,
    },

    /// Exit the console
    Exit,
}

#[derive(Subcommand, Clone, Debug)]
pub(crate) enum BytesCommand {
    /// Read a checked block of bytes
    Read {
        class: AccessClass,

        /// Byte offset from the base register of the class
        offset: Number,

        /// Number of bytes
        count: u32,
    },

    /// Write a string as a checked block of bytes
    Write {
        class: AccessClass,

        /// Byte offset from the base register of the class
        offset: Number,

        text: String,
    },

    /// Translate bytes through a table
    Lookup {
        class: AccessClass,

        /// Byte offset of the table from the base register of the class
        table: Number,

        /// Table indexes
        #[arg(required = true)]
        indexes: Vec<Number>,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub(crate) enum FormatCommand {
    /// Show a byte string
    Bytes { address: Number, count: u32 },

    /// Show a byte string translated through a table
    Translated {
        address: Number,
        count: u32,

        /// Physical byte address of the table
        table: Number,
    },

    /// Show a packed-decimal number
    Bcd { address: Number, digits: u32 },
}

/// Which device a console access is made for
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Requester {
    Cpu,
    Multiplexer,
    Selector,
}

impl From<Requester> for Device {
    fn from(requester: Requester) -> Self {
        match requester {
            Requester::Cpu => Device::Cpu,
            Requester::Multiplexer => Device::Multiplexer,
            Requester::Selector => Device::Selector,
        }
    }
}

/// What to do after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Exit,
}

fn report(error: &AccessError) {
    if error.is_trap() {
        warn!(error = error as &dyn std::error::Error, "Trap");
    } else {
        warn!(error = error as &dyn std::error::Error, "Access failed");
    }
}

fn read_bytes(
    bus: &mut Bus<'_>,
    class: AccessClass,
    offset: Word,
    count: u32,
) -> Result<(Vec<Byte>, Extent), BoundsViolation> {
    let mut accessor = ByteAccessor::new(bus, class, offset, count)?;
    let bytes = (0..count)
        .map(|_| accessor.read_byte(bus))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((bytes, accessor.extent()))
}

fn write_bytes(
    bus: &mut Bus<'_>,
    class: AccessClass,
    offset: Word,
    bytes: &[Byte],
) -> Result<Extent, BoundsViolation> {
    let length = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
    let mut accessor = ByteAccessor::new(bus, class, offset, length)?;
    for &byte in bytes {
        accessor.write_byte(bus, byte)?;
    }
    accessor.flush(bus)?;
    Ok(accessor.extent())
}

fn lookup_bytes(
    bus: &mut Bus<'_>,
    class: AccessClass,
    table: Word,
    indexes: &[Byte],
) -> Result<Vec<Byte>, BoundsViolation> {
    let mut accessor = ByteAccessor::new(bus, class, table, 0)?;
    indexes
        .iter()
        .map(|&index| accessor.lookup_byte(bus, index))
        .collect()
}

/// Execute a single console command
#[allow(clippy::too_many_lines)]
pub(crate) fn execute(computer: &mut Computer, command: Command) -> anyhow::Result<Flow> {
    debug!("Executing command: {:?}", command);

    match command {
        Command::Exit => return Ok(Flow::Exit),

        Command::Examine {
            address,
            count,
            program,
        } => {
            let origin = if program {
                Origin::Program
            } else {
                Origin::Absolute
            };

            for i in 0..count {
                let Some(address) = address.address().checked_add(i) else {
                    anyhow::bail!("examined block runs past the end of the address space");
                };
                let value = computer
                    .memory
                    .examine_at(&computer.registers, origin, address)?;
                info!("{address:07o}: {value:06o}");
            }
        }

        Command::Deposit { address, value } => {
            computer.memory.deposit(address.address(), value.address())?;
        }

        Command::Read {
            class,
            offset,
            device,
        } => match computer.bus().read(device.into(), class, offset.address()) {
            Ok(value) => info!("{class} {:06o}: {value:06o}", offset.address()),
            Err(e) => report(&e),
        },

        Command::Write {
            class,
            offset,
            value,
            device,
        } => {
            let value = value.word()?;
            if let Err(e) = computer
                .bus()
                .write(device.into(), class, offset.address(), value)
            {
                report(&e);
            }
        }

        Command::Registers { register } => {
            if let Some(reg) = register {
                info!("Register {} = {:06o}", reg, computer.registers.get(reg));
            } else {
                info!("Registers: {}", computer.registers);
            }
        }

        Command::Set { register, value } => {
            let value = value.word()?;
            info!("Setting register {register} to {value:06o}");
            computer.registers.set(register, value)?;
        }

        Command::Fill { start, value } => {
            computer.memory.fill(start.address(), value.word()?);
        }

        Command::Empty { start } => {
            let empty = computer.memory.is_empty_from(start.address());
            info!(empty, "Memory from {:07o}", start.address());
        }

        Command::Bytes { sub } => execute_bytes(computer, sub)?,

        Command::Format { sub } => {
            let memory = &computer.memory;
            let rendered = match sub {
                FormatCommand::Bytes { address, count } => {
                    format::byte_operand(memory, address.address(), count as usize)
                }
                FormatCommand::Translated {
                    address,
                    count,
                    table,
                } => format::translated_byte_operand(
                    memory,
                    address.address(),
                    count as usize,
                    table.address(),
                ),
                FormatCommand::Bcd { address, digits } => {
                    format::bcd_operand(memory, address.address(), digits as usize)
                }
            };
            info!("{rendered:?}");
        }

        Command::Interrupts { clear } => {
            let cpx1 = computer.registers.cpx1;
            let names: Vec<_> = cpx1.iter_names().map(|(name, _)| name).collect();
            info!("CPX1 = {cpx1:?} {names:?}");
            if clear {
                computer.registers.cpx1 = Cpx1::empty();
            }
        }
    }

    Ok(Flow::Continue)
}

fn execute_bytes(computer: &mut Computer, command: BytesCommand) -> anyhow::Result<()> {
    let mut bus = computer.bus();

    match command {
        BytesCommand::Read {
            class,
            offset,
            count,
        } => match read_bytes(&mut bus, class, offset.word()?, count) {
            Ok((bytes, extent)) => {
                let text: String = bytes.iter().copied().map(char::from).collect();
                info!(?extent, "{text:?}");
            }
            Err(trap) => warn!(error = &trap as &dyn std::error::Error, "Trap"),
        },

        BytesCommand::Write {
            class,
            offset,
            text,
        } => match write_bytes(&mut bus, class, offset.word()?, text.as_bytes()) {
            Ok(extent) => {
                let written = format::byte_operand(
                    bus.memory(),
                    extent.byte_address,
                    extent.length as usize,
                );
                info!(?extent, "Wrote {written:?}");
            }
            Err(trap) => warn!(error = &trap as &dyn std::error::Error, "Trap"),
        },

        BytesCommand::Lookup {
            class,
            table,
            indexes,
        } => {
            let indexes = indexes
                .into_iter()
                .map(Number::byte)
                .collect::<Result<Vec<_>, _>>()?;
            match lookup_bytes(&mut bus, class, table.word()?, &indexes) {
                Ok(values) => {
                    for (index, value) in indexes.iter().zip(values) {
                        info!("{index:03o} => {value:03o}");
                    }
                }
                Err(trap) => warn!(error = &trap as &dyn std::error::Error, "Trap"),
            }
        }
    }

    Ok(())
}

pub(crate) fn run_interactive(computer: &mut Computer) -> anyhow::Result<()> {
    info!("Running the memory console. Type \"help\" to list available commands.");
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .behavior(Behavior::PreferTerm)
        .auto_add_history(true)
        .build();

    let mut rl: Editor<ConsoleHelper<Command>, DefaultHistory> = Editor::with_config(config)?;
    rl.set_helper(Some(ConsoleHelper::new()));

    let mut last_command: Option<Command> = None;

    'read: loop {
        // A macro to unwrap an error, log it and continue the loop
        macro_rules! warn_and_continue {
            ($e:expr) => {
                match $e {
                    Ok(o) => o,
                    Err(e) => {
                        tracing::warn!(error = %e);
                        continue 'read;
                    }
                }
            };
        }

        let Ok(readline) = rl.readline(">> ") else {
            info!("EOF, exitting");
            return Ok(());
        };

        let command = if readline.trim().is_empty() {
            if let Some(command) = &last_command {
                command.clone()
            } else {
                info!("Type \"help\" to get the list of available commands");
                continue 'read;
            }
        } else {
            let Ok(words) = shell_words::split(readline.as_str()) else {
                warn!("Invalid input");
                continue 'read;
            };

            let command = warn_and_continue!(Command::try_parse_from(words));
            last_command = Some(command.clone());
            command
        };

        if warn_and_continue!(execute(computer, command)) == Flow::Exit {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use hp3000_emulator::constants::MIN_MEMORY_SIZE;
    use pretty_assertions::assert_eq;

    use super::*;

    fn run(computer: &mut Computer, line: &str) -> anyhow::Result<Flow> {
        let words = shell_words::split(line)?;
        let command = Command::try_parse_from(words)?;
        execute(computer, command)
    }

    fn computer() -> Computer {
        let mut computer = Computer::new(MIN_MEMORY_SIZE).unwrap();
        for line in ["set db 01000", "set dl 0400", "set sm 02000"] {
            run(&mut computer, line).unwrap();
        }
        computer
    }

    #[test]
    fn deposit_examine_test() {
        let mut computer = computer();
        run(&mut computer, "deposit 01234 0x1ffff").unwrap();
        assert_eq!(computer.memory.examine(0o1234).unwrap(), 0xFFFF);
        run(&mut computer, "examine 01234 2").unwrap();

        let address = u32::try_from(MIN_MEMORY_SIZE).unwrap();
        assert!(run(&mut computer, &format!("deposit {address} 1")).is_err());
        assert!(run(&mut computer, "examine 0xffffffff 2").is_err());
        assert!(run(&mut computer, "examine --program 0xffffffff 2").is_err());
    }

    #[test]
    fn access_test() {
        let mut computer = computer();
        run(&mut computer, "write data_checked 01500 0777").unwrap();
        assert_eq!(computer.memory.examine(0o1500).unwrap(), 0o777);

        // Traps are reported, not returned
        assert_eq!(
            run(&mut computer, "write data_checked 020 1").unwrap(),
            Flow::Continue
        );
        assert_eq!(computer.memory.examine(0o20).unwrap(), 0);

        run(&mut computer, "write program 0 1").unwrap();
        assert!(computer.registers.cpx1.contains(Cpx1::ADDRESS_PARITY));
        run(&mut computer, "interrupts --clear").unwrap();
        assert_eq!(computer.registers.cpx1, Cpx1::empty());

        assert!(run(&mut computer, "write data 0 0200000").is_err());
    }

    #[test]
    fn bytes_test() {
        let mut computer = computer();
        run(&mut computer, "deposit 01005 0x1234").unwrap();
        run(&mut computer, "bytes write data 012 A").unwrap();
        assert_eq!(computer.memory.examine(0o1005).unwrap(), 0x4134);

        run(&mut computer, "bytes write data 020 'Hi!'").unwrap();
        assert_eq!(computer.memory.examine(0o1010).unwrap(), 0x4869);
        assert_eq!(computer.memory.examine(0o1011).unwrap(), 0x2100);
        run(&mut computer, "bytes read data 020 3").unwrap();
    }

    #[test]
    fn registers_test() {
        let mut computer = computer();
        assert_eq!(computer.registers.db, 0o1000);
        run(&mut computer, "set tr0 0177777").unwrap();
        assert_eq!(computer.registers.tr[0], 0o177_777);
        assert!(run(&mut computer, "set sr 5").is_err());
        assert!(run(&mut computer, "set pc 0").is_err());
    }

    #[test]
    fn exit_test() {
        let mut computer = computer();
        assert_eq!(run(&mut computer, "e 0").unwrap(), Flow::Continue);
        assert!(run(&mut computer, "ex 0").is_err());
        assert_eq!(run(&mut computer, "exit").unwrap(), Flow::Exit);
    }
}
