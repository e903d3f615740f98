use anyhow::Result;
use clap::{ArgAction, Parser};
use std::io;
use std::path::PathBuf;

use crate::api::ChatGateway;
use crate::app::{App, QueryOptions};
use crate::output::{self, OutputFormat};
use crate::repl::run_repl;
use crate::store::Store;

#[derive(Parser, Debug)]
#[command(
    name = "qwen",
    version,
    about = "Command-line client for a Qwen3 chat-completion API",
    disable_help_flag = true
)]
pub struct Args {
    /// Question to ask; starts interactive mode when omitted
    pub query: Vec<String>,

    /// Append the result to a file
    #[arg(short, long, value_name = "FILE")]
    pub save: Option<PathBuf>,

    /// Show conversation history
    #[arg(short = 'h', long)]
    pub history: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// System prompt for this call only
    #[arg(short = 'p', long, value_name = "PROMPT")]
    pub system_prompt: Option<String>,

    /// Set the system prompt permanently, then ask
    #[arg(short = 'P', long, value_name = "PROMPT")]
    pub permanent_prompt: Option<String>,

    /// Only change the system prompt permanently
    #[arg(short = 'S', long, value_name = "PROMPT")]
    pub set_prompt: Option<String>,

    /// Temperature for this call only (0.0-1.0)
    #[arg(short, long, value_name = "VALUE")]
    pub temperature: Option<String>,

    /// Only change the temperature permanently (0.0-1.0)
    #[arg(short = 'T', long, value_name = "VALUE")]
    pub set_temperature: Option<String>,

    /// Create or edit the configuration file
    #[arg(short, long)]
    pub config: bool,

    /// Interactive mode
    #[arg(short, long)]
    pub interactive: bool,

    /// Save the last answer to a file
    #[arg(short, long, value_name = "FILE")]
    pub last_save: Option<PathBuf>,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,
}

/// The single action one invocation performs, in flag precedence order.
#[derive(Debug, Clone)]
pub enum Mode {
    Configure,
    ShowHistory,
    SetPrompt(String),
    SetTemperature(String),
    SaveLast(PathBuf),
    Interactive,
    Query(String, QueryOptions),
}

impl Args {
    pub fn mode(&self) -> Mode {
        if self.config {
            Mode::Configure
        } else if self.history {
            Mode::ShowHistory
        } else if let Some(prompt) = &self.set_prompt {
            Mode::SetPrompt(prompt.clone())
        } else if let Some(value) = &self.set_temperature {
            Mode::SetTemperature(value.clone())
        } else if let Some(path) = &self.last_save {
            Mode::SaveLast(path.clone())
        } else if self.interactive || self.query.is_empty() {
            Mode::Interactive
        } else {
            Mode::Query(self.query.join(" "), self.query_options())
        }
    }

    fn query_options(&self) -> QueryOptions {
        QueryOptions {
            format: self.format,
            save: self.save.clone(),
            system_prompt: self.system_prompt.clone(),
            permanent_prompt: self.permanent_prompt.clone(),
            temperature: self.temperature.clone(),
        }
    }
}

pub async fn execute<G, S>(app: &mut App<G, S>, mode: Mode) -> Result<()>
where
    G: ChatGateway,
    S: Store,
{
    match mode {
        Mode::Configure => app.setup_config(&mut io::stdin().lock()),
        Mode::ShowHistory => {
            app.show_history();
            Ok(())
        }
        Mode::SetPrompt(prompt) => {
            app.set_system_prompt(&prompt);
            Ok(())
        }
        Mode::SetTemperature(value) => {
            if let Err(err) = app.set_temperature(&value) {
                output::failure(err);
            }
            Ok(())
        }
        Mode::SaveLast(path) => {
            if let Err(err) = app.save_last_response(&path) {
                output::failure(format!("Failed to save file: {err:#}"));
            }
            Ok(())
        }
        Mode::Interactive => run_repl(app, io::stdin().lock()).await,
        Mode::Query(query, options) => app.ask(&query, &options).await.map(|_| ()),
    }
}
