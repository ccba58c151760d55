use camino::Utf8PathBuf;
use clap::{ArgAction, Parser};
use hp3000_emulator::runtime::Computer;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;
use tracing::{debug, info};

use crate::interactive::{execute, Command, Flow};

#[derive(Parser, Debug)]
pub struct ScriptOpt {
    /// Path to the script, one console command per line
    input: Utf8PathBuf,

    /// Start with the CPU in privileged mode
    #[arg(short, long, action = ArgAction::SetTrue)]
    privileged: bool,
}

/// A script line that could not be run
#[derive(Debug, Error, Diagnostic)]
#[error("line {line}: {message}")]
pub struct ScriptError {
    line: usize,
    message: String,

    #[label("in this command")]
    span: SourceSpan,
}

/// Run console commands, one per line. Blank lines and lines starting with `#`
/// are skipped. Stops at the first failing command, or at `exit`.
pub(crate) fn run_script(computer: &mut Computer, source: &str) -> Result<(), ScriptError> {
    let mut offset = 0;

    for (index, raw) in source.split_inclusive('\n').enumerate() {
        let start = offset;
        offset += raw.len();

        let text = raw.trim_end();
        let trimmed = text.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fail = |message: String| ScriptError {
            line: index + 1,
            message,
            span: (start + (text.len() - trimmed.len()), trimmed.len()).into(),
        };

        let words = shell_words::split(trimmed).map_err(|e| fail(e.to_string()))?;
        let command = Command::try_parse_from(words).map_err(|e| fail(e.to_string()))?;
        debug!(line = index + 1, "{trimmed}");

        if execute(computer, command).map_err(|e| fail(format!("{e:#}")))? == Flow::Exit {
            break;
        }
    }

    Ok(())
}

impl ScriptOpt {
    pub fn exec(self, size: usize) -> anyhow::Result<()> {
        info!(path = %self.input, "Reading script");
        let source = std::fs::read_to_string(&self.input)?;
        let mut computer = super::computer(size, self.privileged)?;

        if let Err(error) = run_script(&mut computer, &source) {
            let report = miette::Report::new(error)
                .with_source_code(NamedSource::new(self.input.as_str(), source));
            eprintln!("{report:?}");
            std::process::exit(1);
        }

        info!(registers = %computer.registers, "End of script");
        Ok(())
    }
}
