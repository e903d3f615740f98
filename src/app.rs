use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::api::ChatGateway;
use crate::client::ChatClient;
use crate::config::{
    ConfigDocument, ConfigError, EnvDefaults, FALLBACK_TEMPERATURE, parse_temperature,
};
use crate::history::{HistoryEntry, HistoryLog, LastResponse, iso_timestamp};
use crate::output::{self, OutputFormat};
use crate::store::{self, DocumentKind, Store};

/// Per-query switches from the command line.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub format: OutputFormat,
    pub save: Option<PathBuf>,
    /// Used for this call only.
    pub system_prompt: Option<String>,
    /// Persisted to the config before the call and then used.
    pub permanent_prompt: Option<String>,
    pub temperature: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    NothingToSave,
}

/// Everything one invocation works with: the three persisted documents, the
/// store they came from, and the chat client with its conversation window.
pub struct App<G, S> {
    store: S,
    defaults: EnvDefaults,
    config: ConfigDocument,
    history: HistoryLog,
    last: LastResponse,
    client: ChatClient<G>,
}

impl<G: ChatGateway, S: Store> App<G, S> {
    pub fn load(gateway: G, store: S, defaults: EnvDefaults) -> Self {
        let config: ConfigDocument = store::load(&store, DocumentKind::Config);
        let history: HistoryLog = store::load(&store, DocumentKind::History);
        let last: LastResponse = store::load(&store, DocumentKind::LastResponse);
        let client = ChatClient::new(gateway, config.api_url(&defaults));

        Self {
            store,
            defaults,
            config,
            history,
            last,
            client,
        }
    }

    pub fn config(&self) -> &ConfigDocument {
        &self.config
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn last_response(&self) -> &LastResponse {
        &self.last
    }

    pub fn client(&self) -> &ChatClient<G> {
        &self.client
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn api_url(&self) -> &str {
        self.client.api_url()
    }

    pub fn system_prompt(&self) -> &str {
        self.config.system_prompt(&self.defaults)
    }

    /// Temperature from the config or environment; an unusable stored value
    /// falls back to the built-in default.
    pub fn default_temperature(&self) -> f64 {
        let raw = self.config.temperature(&self.defaults);
        parse_temperature(raw).unwrap_or_else(|err| {
            warn!(error = %err, "ignoring configured temperature");
            FALLBACK_TEMPERATURE
        })
    }

    /// Sends one query and, only once it succeeded, records it everywhere:
    /// conversation window, last-response slot, optional save file and history.
    pub async fn ask(&mut self, query: &str, options: &QueryOptions) -> Result<String> {
        if let Some(prompt) = &options.permanent_prompt {
            self.config.system_prompt = Some(prompt.clone());
            self.persist(DocumentKind::Config, &self.config);
            output::success("System prompt changed permanently!");
        }

        let temperature = match &options.temperature {
            Some(raw) => parse_temperature(raw)?,
            None => self.default_temperature(),
        };
        let system_prompt = options
            .system_prompt
            .clone()
            .unwrap_or_else(|| self.system_prompt().to_string());

        output::progress();
        let answer = self
            .client
            .send(query, &system_prompt, temperature)
            .await
            .context("API call failed")?;

        self.last = LastResponse::now(query, answer.clone());
        self.persist(DocumentKind::LastResponse, &self.last);

        output::print_answer(&answer, options.format);

        if let Some(path) = &options.save {
            let block = output::conversation_block(&iso_timestamp(), query, &answer, options.format);
            match output::append_block(path, &block) {
                Ok(()) => output::success(format!("Result saved to {}.", path.display())),
                Err(err) => {
                    warn!(path = %path.display(), error = %format!("{err:#}"), "failed to save result");
                    output::failure(format!("Failed to save file: {err:#}"));
                }
            }
        }

        self.history.record(HistoryEntry::now(query, answer.clone()));
        self.persist(DocumentKind::History, &self.history);

        Ok(answer)
    }

    pub fn set_system_prompt(&mut self, prompt: &str) {
        self.config.system_prompt = Some(prompt.to_string());
        self.persist(DocumentKind::Config, &self.config);
        info!("system prompt updated");
        output::success("System prompt changed permanently!");
        println!("New prompt: {prompt}");
    }

    /// Validates before touching anything; a rejected value leaves the config
    /// and its file as they were.
    pub fn set_temperature(&mut self, raw: &str) -> Result<f64, ConfigError> {
        let value = parse_temperature(raw)?;
        self.config.temperature = Some(raw.trim().to_string());
        self.persist(DocumentKind::Config, &self.config);
        info!(temperature = value, "temperature updated");
        output::success("Temperature changed permanently!");
        println!("New temperature: {}", raw.trim());
        Ok(value)
    }

    /// Appends the cached last exchange to `path` using the text template.
    pub fn save_last_response(&self, path: &Path) -> Result<SaveOutcome> {
        if !self.last.is_available() {
            output::notice("❌ There is no last answer to save. Ask a question first.");
            return Ok(SaveOutcome::NothingToSave);
        }

        let block = output::conversation_block(
            &iso_timestamp(),
            &self.last.query,
            &self.last.response,
            OutputFormat::Text,
        );
        output::append_block(path, &block)?;
        output::success(format!("Last answer saved to {}.", path.display()));
        Ok(SaveOutcome::Saved)
    }

    pub fn show_history(&self) {
        output::print_history(&self.history);
    }

    /// Walks through the three settings, offering the current value as the
    /// default for each. Temperature is asked again until it validates.
    pub fn setup_config<R: BufRead>(&mut self, input: &mut R) -> Result<()> {
        output::heading("🔧 Qwen3 CLI configuration");

        let api_url = ask_with_default(input, "API URL", self.config.api_url(&self.defaults))?;
        let system_prompt =
            ask_with_default(input, "Default system prompt", self.system_prompt())?;
        let temperature = loop {
            let raw = ask_with_default(
                input,
                "Default temperature (0.0-1.0)",
                self.config.temperature(&self.defaults),
            )?;
            match parse_temperature(&raw) {
                Ok(_) => break raw,
                Err(_) => output::notice("Enter a value between 0.0 and 1.0"),
            }
        };

        self.client.set_api_url(api_url.clone());
        self.config.api_url = Some(api_url);
        self.config.system_prompt = Some(system_prompt);
        self.config.temperature = Some(temperature);
        self.persist(DocumentKind::Config, &self.config);
        output::success("Configuration saved!");
        Ok(())
    }

    fn persist<T: Serialize + ?Sized>(&self, kind: DocumentKind, doc: &T) {
        if let Err(err) = store::save(&self.store, kind, doc) {
            warn!(document = kind.as_str(), error = %format!("{err:#}"), "failed to persist document");
            output::failure(format!("Failed to save {}: {err:#}", kind.as_str()));
        }
    }
}

fn ask_with_default<R: BufRead>(input: &mut R, question: &str, default: &str) -> Result<String> {
    print!("{question} ({default}): ");
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .context("Failed to read configuration input")?;
    if read == 0 {
        bail!("Input closed before configuration finished");
    }

    let answer = line.trim();
    Ok(if answer.is_empty() {
        default.to_string()
    } else {
        answer.to_string()
    })
}
