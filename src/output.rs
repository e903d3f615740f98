use anyhow::{Context, Result};
use clap::ValueEnum;
use console::style;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use termimad::MadSkin;

use crate::history::HistoryLog;

const RESPONSE_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Markdown,
}

/// One appended record in a save file. The markdown variant only moves blank
/// lines around so the block renders with proper breaks.
pub fn conversation_block(
    timestamp: &str,
    query: &str,
    response: &str,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Text => format!(
            "# Qwen3 CLI conversation log\n\n\
             **Time:** {timestamp}\n\
             **Query:** {query}\n\n\
             **Response:**\n\
             {response}\n\n\
             ---\n\n"
        ),
        OutputFormat::Markdown => format!(
            "# Qwen3 CLI conversation log\n\n\
             **Time:** {timestamp}  \n\
             **Query:** {query}\n\n\
             **Response:**\n\n\
             {response}\n\n\
             ---\n\n"
        ),
    }
}

pub fn append_block(path: &Path, block: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open '{}'", path.display()))?;
    file.write_all(block.as_bytes())
        .with_context(|| format!("Failed to write '{}'", path.display()))
}

pub fn response_preview(response: &str) -> String {
    let preview: String = response.chars().take(RESPONSE_PREVIEW_CHARS).collect();
    format!("{preview}...")
}

pub fn success(message: impl std::fmt::Display) {
    println!("{}", style(format!("✅ {message}")).green());
}

pub fn notice(message: impl std::fmt::Display) {
    println!("{}", style(message).yellow());
}

pub fn failure(message: impl std::fmt::Display) {
    eprintln!("{}", style(format!("❌ {message}")).red());
}

pub fn heading(message: impl std::fmt::Display) {
    println!("{}", style(message).blue());
}

pub fn progress() {
    println!("{}", style("🤔 Processing your question...\n").blue());
}

pub fn print_answer(answer: &str, format: OutputFormat) {
    println!("{}", style("📝 Answer:").green());
    match format {
        OutputFormat::Text => println!("{answer}"),
        OutputFormat::Markdown => {
            let skin = MadSkin::default();
            println!("{}", skin.term_text(answer));
        }
    }
}

pub fn print_history(log: &HistoryLog) {
    heading("📚 Conversation history");
    if log.is_empty() {
        notice("No conversation history yet.");
        return;
    }

    for (idx, entry) in log.entries().iter().enumerate() {
        println!("{}", style(format!("\n[{}] {}", idx + 1, entry.timestamp)).cyan());
        println!("{}", style(format!("Query: {}", entry.query)).white());
        println!(
            "{}",
            style(format!("Answer: {}", response_preview(&entry.response))).green()
        );
    }
}

const USAGE: &[(&str, &str)] = &[
    ("qwen <question>", "ask a single question"),
    ("qwen -i", "interactive mode"),
    ("qwen -s <file> <question>", "save the result to a file"),
    ("qwen -l <file>", "save the last answer to a file"),
    ("qwen -h", "show conversation history"),
    ("qwen -f markdown <question>", "render the answer as markdown"),
    ("qwen -p \"<prompt>\" <question>", "use a system prompt for this call only"),
    ("qwen -P \"<prompt>\" <question>", "set the system prompt permanently and ask"),
    ("qwen -S \"<prompt>\"", "only change the system prompt permanently"),
    ("qwen -t <value> <question>", "use a temperature for this call only"),
    ("qwen -T <value>", "only change the temperature permanently"),
    ("qwen -c", "edit the configuration"),
    ("quit/exit/bye", "leave interactive mode"),
    ("help", "show this help"),
    ("save <file>", "save the last answer (interactive mode)"),
];

pub fn help_text() -> String {
    let width = USAGE.iter().map(|(usage, _)| usage.len()).max().unwrap_or(0);
    let mut text = String::from("Usage:\n");
    for (usage, description) in USAGE {
        text.push_str(&format!("  {usage:<width$}  - {description}\n"));
    }
    text
}

pub fn print_help() {
    heading("\n📖 Help");
    println!("{}", style(help_text()).dim());
}
