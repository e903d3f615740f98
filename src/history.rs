use chrono::{Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_HISTORY_ENTRIES: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub query: String,
    pub response: String,
}

impl HistoryEntry {
    pub fn now(query: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            timestamp: local_timestamp(),
            query: query.into(),
            response: response.into(),
        }
    }
}

/// Newest-first log of past exchanges, capped at [`MAX_HISTORY_ENTRIES`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries.insert(0, entry);
        self.entries.truncate(MAX_HISTORY_ENTRIES);
    }
}

/// Single persisted slot holding the most recent successful exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastResponse {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub timestamp: String,
}

impl LastResponse {
    pub fn now(query: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            response: response.into(),
            timestamp: iso_timestamp(),
        }
    }

    /// Both halves must be present before the slot can be saved anywhere.
    pub fn is_available(&self) -> bool {
        !self.query.is_empty() && !self.response.is_empty()
    }
}

pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn local_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
