use clap::Parser;
use hp3000_emulator::runtime::{Computer, Status};
use tracing::debug;

mod completion;
mod console;
mod script;

#[derive(Parser)]
pub enum Subcommand {
    /// Start an interactive memory console
    Console(self::console::ConsoleOpt),

    /// Run memory console commands from a file
    Script(self::script::ScriptOpt),

    /// Generate shell completions
    Completion(self::completion::CompletionOpt),
}

impl Subcommand {
    /// Run a subcommand
    pub fn exec(self, size: usize) -> anyhow::Result<()> {
        match self {
            Subcommand::Console(opt) => opt.exec(size),
            Subcommand::Script(opt) => opt.exec(size),
            Subcommand::Completion(opt) => opt.exec(),
        }
    }
}

/// Bring up memory and registers
fn computer(size: usize, privileged: bool) -> anyhow::Result<Computer> {
    let mut computer = Computer::new(size)?;
    if privileged {
        debug!("Starting in privileged mode");
        computer.registers.sta |= Status::PRIVILEGED;
    }
    Ok(computer)
}
