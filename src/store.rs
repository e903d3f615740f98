use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Config,
    History,
    LastResponse,
}

impl DocumentKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Config => ".qwen3-cli-config.json",
            Self::History => ".qwen3-cli-history.json",
            Self::LastResponse => ".qwen3-cli-last-response.json",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::History => "history",
            Self::LastResponse => "last-response",
        }
    }
}

/// Raw access to the three persisted documents.
///
/// `read` returns `Ok(None)` when the document has never been written.
pub trait Store {
    fn read(&self, kind: DocumentKind) -> Result<Option<String>>;
    fn write(&self, kind: DocumentKind, contents: &str) -> Result<()>;
}

/// Loads a document, substituting the default when it is missing or unusable.
///
/// Read and parse failures are logged and never propagated.
pub fn load<T, S>(store: &S, kind: DocumentKind) -> T
where
    T: DeserializeOwned + Default,
    S: Store + ?Sized,
{
    let raw = match store.read(kind) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(document = kind.as_str(), "document not found, using default");
            return T::default();
        }
        Err(err) => {
            warn!(document = kind.as_str(), error = %format!("{err:#}"), "failed to read document");
            return T::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(doc) => doc,
        Err(err) => {
            warn!(document = kind.as_str(), error = %err, "failed to parse document, using default");
            T::default()
        }
    }
}

/// Overwrites the whole document as pretty-printed JSON.
pub fn save<T, S>(store: &S, kind: DocumentKind, doc: &T) -> Result<()>
where
    T: Serialize + ?Sized,
    S: Store + ?Sized,
{
    let contents = serde_json::to_string_pretty(doc)
        .with_context(|| format!("Failed to serialize {} document", kind.as_str()))?;
    store.write(kind, &contents)
}

/// Documents stored as files directly under `root`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn current_dir() -> Result<Self> {
        let root = std::env::current_dir().context("Failed to resolve working directory")?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, kind: DocumentKind) -> PathBuf {
        self.root.join(kind.file_name())
    }
}

impl Store for FileStore {
    fn read(&self, kind: DocumentKind) -> Result<Option<String>> {
        let path = self.path(kind);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to read '{}'", path.display()))
            }
        }
    }

    fn write(&self, kind: DocumentKind, contents: &str) -> Result<()> {
        let path = self.path(kind);
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write '{}'", path.display()))?;
        debug!(path = %path.display(), bytes = contents.len(), "wrote document");
        Ok(())
    }
}

/// In-process store; counts writes so callers can assert nothing was persisted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RefCell<HashMap<DocumentKind, String>>,
    writes: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, kind: DocumentKind, contents: impl Into<String>) -> Self {
        self.documents.borrow_mut().insert(kind, contents.into());
        self
    }

    pub fn document(&self, kind: DocumentKind) -> Option<String> {
        self.documents.borrow().get(&kind).cloned()
    }

    pub fn write_count(&self) -> usize {
        self.writes.get()
    }
}

impl Store for MemoryStore {
    fn read(&self, kind: DocumentKind) -> Result<Option<String>> {
        Ok(self.document(kind))
    }

    fn write(&self, kind: DocumentKind, contents: &str) -> Result<()> {
        self.documents.borrow_mut().insert(kind, contents.to_string());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}
