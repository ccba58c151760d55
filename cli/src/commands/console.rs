use clap::{ArgAction, Parser};
use tracing::info;

use crate::interactive::run_interactive;

#[derive(Parser, Debug)]
pub struct ConsoleOpt {
    /// Start with the CPU in privileged mode
    #[arg(short, long, action = ArgAction::SetTrue)]
    privileged: bool,
}

impl ConsoleOpt {
    pub fn exec(self, size: usize) -> anyhow::Result<()> {
        let mut computer = super::computer(size, self.privileged)?;
        run_interactive(&mut computer)?;
        info!(registers = %computer.registers, "End of session");
        Ok(())
    }
}
