//! todosync - keep TODO comments synchronized with a task tracker.
//!
//! Scans source documents for `TODO` markers, assigns each one a
//! content-address that survives line drift, and converges a pluggable
//! remote tracker with the document's current state: new addresses are
//! published, vanished ones archived, and a local store remembers what the
//! tracker has already been told so nothing is ever created twice.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`extract`] - Marker detection and snippet capture
//! - [`hash`] - Content-address derivation for task identity
//! - [`store`] - Persisted record of published tasks
//! - [`reconcile`] - Diff-and-sync engine driving the provider
//! - [`provider`] - Task tracker contract and backend adapters
//! - [`config`] - Configuration loading and validation
//! - [`walker`] - File discovery for directory-level scans
//! - [`error`] - Custom error types and handling
//! - [`testing`] - Testing infrastructure (mock provider)
//!
//! # Example
//!
//! ```rust,ignore
//! use todosync::config::Config;
//! use todosync::extract::{ExtractOptions, Extractor};
//! use todosync::provider::resolve_provider;
//! use todosync::reconcile::Reconciler;
//! use todosync::store::TaskStore;
//!
//! let config = Config::load(project_dir)?;
//! let extractor = Extractor::new(ExtractOptions::default())?;
//! let tasks = extractor.extract(&file, &document_text);
//!
//! let provider = resolve_provider(&config)?;
//! let mut store = TaskStore::open(&config.state_dir(project_dir))?;
//! let reconciler = Reconciler::new(provider, config.provider_settings.clone());
//! let summary = reconciler.reconcile(&file, &tasks, &mut store).await?;
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod hash;
pub mod provider;
pub mod reconcile;
pub mod store;
pub mod testing;
pub mod walker;

// Re-export commonly used types
pub use error::{Result, SyncError};

// Re-export config types
pub use config::{Config, ProviderSettings, ScanSettings};

// Re-export extraction types
pub use extract::{ExtractOptions, Extractor, Task};
pub use hash::task_hash;

// Re-export store types
pub use store::{TaskEntry, TaskStore};

// Re-export reconciliation types
pub use reconcile::{diff, ReconcileSummary, Reconciler, TaskDelta};

// Re-export provider types
pub use provider::{
    resolve_provider, ProjectOption, Provider, PublishOutcome, ScriptProvider, StatusOption,
    KNOWN_PROVIDERS,
};

// Re-export walker
pub use walker::Walker;
