// contrato-universe/src/loader.rs
// ============================================================================
// Module: Universe Loader
// Description: Recursive JSON document discovery and contract construction.
// Purpose: Build a universe contract from a directory of contract documents.
// Dependencies: contrato-core, futures, serde_json, tokio, tracing
// ============================================================================

//! ## Overview
//! [`load_universe`] walks a directory, keeps every `*.json` file accepted by
//! the optional [`PathFilter`], and builds one contract per document (plus
//! one per alias unless `canonical_only` is set). Reads run through a bounded
//! buffered stream so at most `concurrency` documents are in flight. File
//! order is sorted before loading, so the resulting universe is identical
//! across runs regardless of directory iteration order.
//!
//! Files above `max_file_bytes` and non UTF-8 documents are rejected; the
//! loader fails closed on the first bad document.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use contrato_core::Contract;
use contrato_core::ContractError;
use contrato_core::Rehash;
use futures::StreamExt;
use futures::TryStreamExt;
use futures::stream;
use serde_json::Value;
use thiserror::Error;
use tokio::fs;
use tracing::debug;
use tracing::trace;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default number of documents read concurrently.
pub const DEFAULT_CONCURRENCY: usize = 10;
/// Upper bound for `concurrency`.
pub const MAX_CONCURRENCY: usize = 64;
/// Default per-document size limit in bytes.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;
/// Payload field dropped when loading canonical contracts only.
const ALIASES_FIELD: &str = "aliases";
/// Extension of contract documents.
const DOCUMENT_EXTENSION: &str = "json";

// ============================================================================
// SECTION: Options
// ============================================================================

/// Predicate deciding whether a discovered document is loaded.
pub type PathFilter = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Options controlling [`load_universe`].
#[derive(Clone)]
pub struct LoadOptions {
    /// Optional document filter, applied to the full path.
    pub filter: Option<PathFilter>,
    /// Ignore aliases and load canonical contracts only.
    pub canonical_only: bool,
    /// Documents read concurrently.
    pub concurrency: usize,
    /// Per-document size limit in bytes.
    pub max_file_bytes: u64,
}

impl LoadOptions {
    /// Sets the document filter.
    #[must_use]
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Sets whether aliases are ignored.
    #[must_use]
    pub const fn with_canonical_only(mut self, canonical_only: bool) -> Self {
        self.canonical_only = canonical_only;
        self
    }

    /// Sets the read concurrency.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Checks option bounds.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidOptions`] when a bound is violated.
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(LoadError::InvalidOptions(format!(
                "concurrency must be between 1 and {MAX_CONCURRENCY}"
            )));
        }
        if self.max_file_bytes == 0 {
            return Err(LoadError::InvalidOptions("max_file_bytes must be positive".to_string()));
        }
        Ok(())
    }

    /// True when `path` passes the filter.
    fn admits(&self, path: &Path) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(path))
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            filter: None,
            canonical_only: false,
            concurrency: DEFAULT_CONCURRENCY,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("filter", &self.filter.is_some())
            .field("canonical_only", &self.canonical_only)
            .field("concurrency", &self.concurrency)
            .field("max_file_bytes", &self.max_file_bytes)
            .finish()
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading a universe.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Filesystem failure.
    #[error("failed to read {}: {message}", path.display())]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying error message.
        message: String,
    },
    /// Document exceeds the size limit.
    #[error("{} exceeds the {limit} byte limit", path.display())]
    TooLarge {
        /// Offending path.
        path: PathBuf,
        /// Configured limit.
        limit: u64,
    },
    /// Document is not valid UTF-8 JSON.
    #[error("invalid json in {}: {message}", path.display())]
    Parse {
        /// Offending path.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
    /// Document is not a valid contract.
    #[error("invalid contract in {}: {source}", path.display())]
    Contract {
        /// Offending path.
        path: PathBuf,
        /// Contract error.
        source: ContractError,
    },
    /// Universe assembly failed.
    #[error("failed to assemble universe: {0}")]
    Universe(#[from] ContractError),
    /// Options out of bounds.
    #[error("invalid load options: {0}")]
    InvalidOptions(String),
}

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Loads every contract document below `directory` into a universe.
///
/// # Errors
///
/// Returns [`LoadError`] on the first unreadable, oversized, malformed or
/// invalid document.
pub async fn load_universe(directory: &Path, options: &LoadOptions) -> Result<Contract, LoadError> {
    options.validate()?;
    let documents = discover_documents(directory, options).await?;
    debug!(
        directory = %directory.display(),
        documents = documents.len(),
        canonical_only = options.canonical_only,
        "discovered contract documents"
    );
    let loaded: Vec<Vec<Contract>> = stream::iter(
        documents.into_iter().map(|path| load_document(path, options)),
    )
    .buffered(options.concurrency)
    .try_collect()
    .await?;

    let mut universe = Contract::universe()?;
    let added = universe.add_children(loaded.into_iter().flatten().map(Arc::new), Rehash::Now)?;
    debug!(contracts = added, "universe loaded");
    Ok(universe)
}

/// Lists the `*.json` documents below `directory` that pass the filter,
/// sorted by path.
///
/// # Errors
///
/// Returns [`LoadError::Io`] when a directory cannot be listed.
pub async fn discover_documents(
    directory: &Path,
    options: &LoadOptions,
) -> Result<Vec<PathBuf>, LoadError> {
    let mut pending = vec![directory.to_path_buf()];
    let mut documents = Vec::new();
    while let Some(current) = pending.pop() {
        let mut entries = fs::read_dir(&current).await.map_err(|err| io_error(&current, &err))?;
        while let Some(entry) =
            entries.next_entry().await.map_err(|err| io_error(&current, &err))?
        {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|err| io_error(&path, &err))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if is_document(&path) && options.admits(&path) {
                documents.push(path);
            } else {
                trace!(path = %path.display(), "skipping file");
            }
        }
    }
    documents.sort();
    Ok(documents)
}

/// Reads one document and builds its contracts.
async fn load_document(path: PathBuf, options: &LoadOptions) -> Result<Vec<Contract>, LoadError> {
    let metadata = fs::metadata(&path).await.map_err(|err| io_error(&path, &err))?;
    if metadata.len() > options.max_file_bytes {
        return Err(LoadError::TooLarge {
            path,
            limit: options.max_file_bytes,
        });
    }
    let bytes = fs::read(&path).await.map_err(|err| io_error(&path, &err))?;
    let mut source: Value = match serde_json::from_slice(&bytes) {
        Ok(source) => source,
        Err(err) => {
            return Err(LoadError::Parse {
                path,
                message: err.to_string(),
            });
        }
    };
    if options.canonical_only
        && let Some(object) = source.as_object_mut()
    {
        object.remove(ALIASES_FIELD);
    }
    match Contract::build(source) {
        Ok(contracts) => {
            trace!(path = %path.display(), contracts = contracts.len(), "loaded document");
            Ok(contracts)
        }
        Err(source) => Err(LoadError::Contract { path, source }),
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// True for contract document paths.
fn is_document(path: &Path) -> bool {
    path.extension().is_some_and(|extension| extension == DOCUMENT_EXTENSION)
}

/// Wraps an I/O error with its path.
fn io_error(path: &Path, err: &std::io::Error) -> LoadError {
    LoadError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
