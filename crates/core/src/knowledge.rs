//! Knowledge base: the static JSON document every answer is grounded in.
//!
//! The document is opaque: any valid JSON is accepted and it is never
//! inspected, only serialized into prompts. It is loaded once per process
//! through [`KnowledgeCache`] and shared read-only afterwards.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tracing::{debug, info, warn};

use crate::error::KnowledgeError;

/// An immutable, loaded knowledge document.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    path: PathBuf,
    document: serde_json::Value,
    /// Compact serialization, computed once at load time.
    snapshot: String,
}

impl KnowledgeBase {
    /// Read and parse the document at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, KnowledgeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => KnowledgeError::NotFound {
                path: path.to_path_buf(),
            },
            _ => KnowledgeError::Io {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;

        let document: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| KnowledgeError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let kb = Self::from_value(path, document);
        info!(path = %path.display(), bytes = kb.snapshot.len(), "Knowledge base loaded");
        Ok(kb)
    }

    /// Wrap an in-memory document.
    pub fn from_value(path: impl Into<PathBuf>, document: serde_json::Value) -> Self {
        // serde_json keeps non-ASCII characters as-is, so Vietnamese names
        // reach the model unescaped.
        let snapshot = document.to_string();
        Self {
            path: path.into(),
            document,
            snapshot,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &serde_json::Value {
        &self.document
    }

    /// The serialized form embedded in prompts.
    pub fn snapshot(&self) -> &str {
        &self.snapshot
    }
}

/// Init-once holder for the process-wide knowledge base.
///
/// The first successful `get_or_load` wins and is kept for the rest of the
/// process. Failures are not cached, so a later call may retry. There is no
/// invalidation: the file does not change while the service runs.
#[derive(Debug, Default)]
pub struct KnowledgeCache {
    cell: OnceLock<Arc<KnowledgeBase>>,
}

impl KnowledgeCache {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// The cache shared by the whole process.
    pub fn global() -> &'static KnowledgeCache {
        static GLOBAL: KnowledgeCache = KnowledgeCache::new();
        &GLOBAL
    }

    pub fn get_or_load(&self, path: impl AsRef<Path>) -> Result<Arc<KnowledgeBase>, KnowledgeError> {
        let path = path.as_ref();
        if let Some(kb) = self.cell.get() {
            if kb.path() != path {
                warn!(
                    cached = %kb.path().display(),
                    requested = %path.display(),
                    "Knowledge base already loaded from a different path; keeping the cached one"
                );
            } else {
                debug!(path = %path.display(), "Knowledge base served from cache");
            }
            return Ok(kb.clone());
        }

        let loaded = Arc::new(KnowledgeBase::load(path)?);
        // A concurrent loader may have won the race; either value is identical.
        Ok(self.cell.get_or_init(|| loaded).clone())
    }

    pub fn get(&self) -> Option<Arc<KnowledgeBase>> {
        self.cell.get().cloned()
    }
}
