use anyhow::{Context, Result};
use console::style;
use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::api::ChatGateway;
use crate::app::{App, QueryOptions};
use crate::output;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand<'a> {
    Quit,
    Help,
    Save(&'a str),
    MissingSaveTarget,
    Empty,
    Query(&'a str),
}

impl<'a> ReplCommand<'a> {
    pub fn parse(line: &'a str) -> Self {
        let input = line.trim();
        if input.is_empty() {
            return Self::Empty;
        }
        if ["quit", "exit", "bye"]
            .iter()
            .any(|word| input.eq_ignore_ascii_case(word))
        {
            return Self::Quit;
        }
        if input.eq_ignore_ascii_case("help") {
            return Self::Help;
        }
        if let Some(target) = save_target(input) {
            return if target.is_empty() {
                Self::MissingSaveTarget
            } else {
                Self::Save(target)
            };
        }
        Self::Query(input)
    }
}

/// `save` followed by nothing or by whitespace and a file name.
fn save_target(input: &str) -> Option<&str> {
    let keyword = input.get(..4)?;
    if !keyword.eq_ignore_ascii_case("save") {
        return None;
    }
    let rest = &input[4..];
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

pub async fn run_repl<G, S, R>(app: &mut App<G, S>, mut input: R) -> Result<()>
where
    G: ChatGateway,
    S: Store,
    R: BufRead,
{
    output::heading("🤖 Qwen3 CLI interactive mode");
    println!("{}", style("Type \"quit\", \"exit\" or \"bye\" to leave.").dim());
    println!("{}", style("Type \"help\" for help.\n").dim());

    loop {
        print!("{}", style("Question: ").cyan());
        io::stdout().flush().context("Failed to flush stdout")?;

        let mut line = String::new();
        let read = input
            .read_line(&mut line)
            .context("Failed to read stdin")?;
        if read == 0 {
            break;
        }

        match ReplCommand::parse(&line) {
            ReplCommand::Quit => {
                output::notice("👋 Goodbye!");
                break;
            }
            ReplCommand::Help => output::print_help(),
            ReplCommand::Save(target) => {
                if let Err(err) = app.save_last_response(Path::new(target)) {
                    output::failure(format!("Failed to save file: {err:#}"));
                }
            }
            ReplCommand::MissingSaveTarget => {
                output::notice("❌ Please give a file name. Example: save output.md");
            }
            ReplCommand::Empty => {}
            ReplCommand::Query(query) => {
                if let Err(err) = app.ask(query, &QueryOptions::default()).await {
                    output::failure(format!("{err:#}"));
                }
            }
        }
    }

    Ok(())
}
