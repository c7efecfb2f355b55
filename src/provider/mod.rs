//! Task tracker abstraction layer for multi-backend support.
//!
//! This module provides a trait-based abstraction for task trackers,
//! enabling the reconciler to drive structurally different backends (a
//! board tracker, a card tracker, a local scripting backend) through one
//! uniform interface.
//!
//! # Architecture
//!
//! The [`Provider`] trait defines the capability surface every backend must
//! implement. It is designed to be:
//!
//! - **Object-safe**: Supports dynamic dispatch via `Arc<dyn Provider>`
//! - **Thread-safe**: `Send + Sync` bounds enable concurrent usage
//! - **Async-first**: Remote operations are async for non-blocking I/O
//!
//! Batch publishing ([`Provider::publish_tasks`]) is a concurrency
//! optimization, not a change in atomicity: it is semantically equivalent to
//! calling [`Provider::publish_task`] independently per task and collecting
//! results keyed by each task's hash. Partial success is the expected shape
//! of its result set.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{Config, ProviderSettings};
use crate::error::{Result, SyncError};
use crate::extract::Task;

pub mod script;

pub use script::ScriptProvider;

/// Provider names accepted in configuration.
pub const KNOWN_PROVIDERS: &[&str] = &["script"];

/// Upper bound on title length by the time it crosses the provider
/// boundary. Backends truncate, callers must not rely on the core doing it.
pub const TITLE_MAX_CHARS: usize = 256;

// ============================================================================
// Option Types
// ============================================================================

/// A project/board/list a backend can create items in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectOption {
    pub id: String,
    pub name: String,
}

/// A status/column items can land in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusOption {
    pub id: String,
    pub name: String,
}

/// Result of one publish within a batch, keyed by the task's hash.
///
/// `item_id` of `None` means that particular creation failed; the task stays
/// pending locally and is retried on the next scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub hash: String,
    pub item_id: Option<String>,
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Abstraction over a task tracker backend.
///
/// # Object Safety
///
/// This trait is object-safe and used as `Arc<dyn Provider>` so the
/// reconciler can run against whichever backend configuration selected.
///
/// # Conformance
///
/// A conforming backend must tolerate being asked to archive an item that
/// no longer exists by failing softly; the reconciler does not treat
/// archive failures as blocking either way.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier of this backend (the name used in configuration).
    fn identity(&self) -> &str;

    /// Whether this backend needs credentials before remote calls.
    fn requires_authentication(&self) -> bool;

    /// Establish or refresh credentials.
    async fn authenticate(&self) -> Result<()>;

    /// Check that the backend's configuration is usable.
    async fn validate_configuration(&self) -> Result<()>;

    /// Enumerate the projects items can be created in.
    async fn get_projects(&self) -> Result<Vec<ProjectOption>>;

    /// Enumerate the statuses items can land in.
    async fn get_statuses(&self) -> Result<Vec<StatusOption>>;

    /// Create one remote item for a task, returning its item id.
    async fn publish_task(&self, task: &Task, settings: &ProviderSettings) -> Result<String>;

    /// Create remote items for a batch of tasks, concurrently.
    ///
    /// The default implementation fans out over [`Provider::publish_task`]
    /// and collects every result, successful or not; a failed creation is
    /// reported as `item_id: None` rather than aborting the batch. There is
    /// no ordering guarantee among the concurrent calls; results are
    /// attributed purely by hash.
    async fn publish_tasks(
        &self,
        tasks: &[Task],
        settings: &ProviderSettings,
    ) -> Vec<PublishOutcome> {
        let futures = tasks.iter().map(|task| async move {
            match self.publish_task(task, settings).await {
                Ok(item_id) => PublishOutcome {
                    hash: task.hash.clone(),
                    item_id: Some(item_id),
                },
                Err(e) => {
                    warn!(
                        "Failed to publish '{}' via {}: {e}",
                        task.title,
                        self.identity()
                    );
                    PublishOutcome {
                        hash: task.hash.clone(),
                        item_id: None,
                    }
                }
            }
        });
        join_all(futures).await
    }

    /// Archive the remote item with the given id.
    async fn archive_task(&self, item_id: &str) -> Result<()>;
}

// ============================================================================
// Provider Resolution
// ============================================================================

/// Resolve the active provider from configuration.
///
/// An empty provider name short-circuits as
/// [`SyncError::ProviderNotConfigured`] - the caller reports "not
/// configured" and makes no remote calls. An unrecognized name is a
/// configuration fault.
pub fn resolve_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    match config.provider.as_str() {
        "" => Err(SyncError::ProviderNotConfigured),
        "script" => Ok(Arc::new(ScriptProvider::new(
            config.provider_settings.clone(),
        ))),
        other => Err(SyncError::UnknownProvider {
            name: other.to_string(),
        }),
    }
}

/// Truncate a title to the provider boundary bound.
///
/// Backends call this before putting a title on the wire.
#[must_use]
pub fn bound_title(title: &str) -> String {
    if title.chars().count() <= TITLE_MAX_CHARS {
        return title.to_string();
    }
    title.chars().take(TITLE_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_unconfigured_short_circuits() {
        let config = Config::default();
        assert!(matches!(
            resolve_provider(&config),
            Err(SyncError::ProviderNotConfigured)
        ));
    }

    #[test]
    fn test_unknown_provider_is_a_fault() {
        let config = Config {
            provider: "fax-machine".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            resolve_provider(&config),
            Err(SyncError::UnknownProvider { .. })
        ));
    }

    #[test]
    fn test_script_provider_resolves() {
        let config = Config {
            provider: "script".to_string(),
            ..Config::default()
        };
        let provider = resolve_provider(&config).unwrap();
        assert_eq!(provider.identity(), "script");
    }

    #[test]
    fn test_bound_title() {
        assert_eq!(bound_title("short"), "short");
        let long = "x".repeat(300);
        assert_eq!(bound_title(&long).chars().count(), TITLE_MAX_CHARS);
    }
}
