use std::borrow::Cow;
use std::collections::HashSet;
use std::marker::PhantomData;

use anstyle::Style;
use clap::{Command, CommandFactory};
use hp3000_emulator::runtime::{AccessClass, Reg};
use rustyline::{
    completion::Completer,
    highlight::Highlighter,
    hint::Hinter,
    validate::{ValidationContext, ValidationResult, Validator},
    Context,
};
use rustyline_derive::Helper;

/// Rustyline helper, that handles interactive completion, highlighting and hinting.
#[derive(Helper, Debug)]
pub(crate) struct ConsoleHelper<T: CommandFactory> {
    app: PhantomData<T>,
}

impl<T: CommandFactory> ConsoleHelper<T> {
    pub fn new() -> Self {
        ConsoleHelper { app: PhantomData }
    }
}

/// Values a positional argument can take, keyed by its name
fn argument_values(id: &str) -> Vec<String> {
    match id {
        "class" => AccessClass::ALL.iter().map(ToString::to_string).collect(),
        "register" => Reg::ALL
            .iter()
            .map(|reg| reg.to_string().to_lowercase())
            .collect(),
        _ => Vec::new(),
    }
}

fn suggest(command: &Command, input: &[String]) -> (usize, HashSet<String>) {
    let mut suggestions: HashSet<_> = command
        .get_subcommands()
        .flat_map(|cmd| {
            std::iter::once(cmd.get_name().to_string())
                .chain(cmd.get_visible_aliases().map(ToString::to_string))
        })
        .collect();

    // If the app has subcommands, it has a `help` command
    if command.has_subcommands() {
        suggestions.insert("help".to_string());
    }

    let index = input.len().saturating_sub(1);
    if let Some(arg) = command.get_positionals().nth(index) {
        suggestions.extend(argument_values(arg.get_id().as_str()));
    }

    match input {
        [last] => (
            last.len(),
            suggestions
                .into_iter()
                .filter(|candidate| candidate.starts_with(last.as_str()))
                .collect(),
        ),

        [head, tail @ ..] => command
            .find_subcommand(head)
            .map(|sub: &Command| suggest(sub, tail))
            .unwrap_or_default(),

        [] => (0, suggestions),
    }
}

/// Split the line before the cursor, with an empty last word if the cursor
/// follows a blank
fn words_before(line: &str) -> Option<Vec<String>> {
    let complete = line.ends_with([' ', '\t']);
    let mut words = shell_words::split(line).ok()?;
    if complete {
        words.push(String::new());
    }
    Some(words)
}

impl<T: CommandFactory> Completer for ConsoleHelper<T> {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        let Some(words) = words_before(&line[..pos]) else {
            return Ok((0, Vec::new()));
        };

        let (offset, candidates) = suggest(&T::command(), words.as_slice());
        let mut candidates: Vec<_> = candidates.into_iter().collect();
        candidates.sort_unstable();
        Ok((pos - offset, candidates))
    }
}

impl<T: CommandFactory> Highlighter for ConsoleHelper<T> {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        let style = Style::new().dimmed();
        Cow::Owned(format!("{}{hint}{}", style.render(), style.render_reset()))
    }

    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        _default: bool,
    ) -> Cow<'b, str> {
        let style = Style::new().bold();
        Cow::Owned(format!("{}{prompt}{}", style.render(), style.render_reset()))
    }
}

impl<T: CommandFactory> Hinter for ConsoleHelper<T> {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let words = words_before(&line[..pos])?;
        let (offset, candidates) = suggest(&T::command(), words.as_slice());

        match candidates.into_iter().collect::<Vec<_>>().as_slice() {
            [only] => only.get(offset..).map(ToString::to_string),
            _ => None,
        }
    }
}

impl<T: CommandFactory> Validator for ConsoleHelper<T> {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        if shell_words::split(ctx.input()).is_err() {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Parser)]
    #[command(no_binary_name = true)]
    enum Sample {
        Read { class: String, offset: u32 },
        Registers { register: Option<String> },
        Reset,
    }

    fn sorted(input: &[&str]) -> (usize, Vec<String>) {
        let input: Vec<String> = input.iter().map(ToString::to_string).collect();
        let (offset, candidates) = suggest(&Sample::command(), &input);
        let mut candidates: Vec<_> = candidates.into_iter().collect();
        candidates.sort_unstable();
        (offset, candidates)
    }

    #[test]
    fn suggest_commands_test() {
        assert_eq!(
            sorted(&["re"]),
            (
                2,
                vec!["read".into(), "registers".into(), "reset".into()]
            )
        );
    }

    #[test]
    fn suggest_classes_test() {
        assert_eq!(
            sorted(&["read", "stack_"]),
            (6, vec!["stack_checked".into()])
        );
    }

    #[test]
    fn suggest_registers_test() {
        assert_eq!(
            sorted(&["registers", "tr"]),
            (
                2,
                vec!["tr0".into(), "tr1".into(), "tr2".into(), "tr3".into()]
            )
        );
    }
}
