//! Mock implementations of the provider contract.
//!
//! These mocks provide controllable test doubles for the tracker boundary,
//! enabling deterministic unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::ProviderSettings;
use crate::error::{Result, SyncError};
use crate::extract::Task;
use crate::provider::{ProjectOption, Provider, StatusOption};

/// Mock task tracker.
///
/// Publishes succeed by default, minting a fresh item id per call; specific
/// hashes can be scripted to fail, and archiving can be made to error. Every
/// call is recorded so tests can assert exact call counts and arguments.
///
/// # Example
///
/// ```rust,ignore
/// let provider = MockProvider::new()
///     .with_item_id("hash-a", "item-1")
///     .with_publish_failure("hash-b");
///
/// // ... run a reconciliation pass ...
///
/// assert_eq!(provider.publish_calls(), vec!["hash-a", "hash-b"]);
/// assert_eq!(provider.archive_calls().len(), 0);
/// ```
#[derive(Debug, Default)]
pub struct MockProvider {
    failing_hashes: HashSet<String>,
    preset_item_ids: HashMap<String, String>,
    archive_error: Option<String>,
    publish_count: AtomicU32,
    archive_count: AtomicU32,
    publish_calls: Mutex<Vec<String>>,
    archive_calls: Mutex<Vec<String>>,
}

impl MockProvider {
    /// Create a mock where every operation succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make publishing the task with this hash fail.
    #[must_use]
    pub fn with_publish_failure(mut self, hash: &str) -> Self {
        self.failing_hashes.insert(hash.to_string());
        self
    }

    /// Pin the item id returned for a given hash.
    #[must_use]
    pub fn with_item_id(mut self, hash: &str, item_id: &str) -> Self {
        self.preset_item_ids
            .insert(hash.to_string(), item_id.to_string());
        self
    }

    /// Make every archive call fail with this error.
    #[must_use]
    pub fn with_archive_error(mut self, error: &str) -> Self {
        self.archive_error = Some(error.to_string());
        self
    }

    /// Number of publish calls made.
    #[must_use]
    pub fn publish_count(&self) -> u32 {
        self.publish_count.load(Ordering::SeqCst)
    }

    /// Number of archive calls made.
    #[must_use]
    pub fn archive_count(&self) -> u32 {
        self.archive_count.load(Ordering::SeqCst)
    }

    /// Hashes passed to publish, in call order.
    #[must_use]
    pub fn publish_calls(&self) -> Vec<String> {
        self.publish_calls.lock().unwrap().clone()
    }

    /// Item ids passed to archive, in call order.
    #[must_use]
    pub fn archive_calls(&self) -> Vec<String> {
        self.archive_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn identity(&self) -> &str {
        "mock"
    }

    fn requires_authentication(&self) -> bool {
        false
    }

    async fn authenticate(&self) -> Result<()> {
        Ok(())
    }

    async fn validate_configuration(&self) -> Result<()> {
        Ok(())
    }

    async fn get_projects(&self) -> Result<Vec<ProjectOption>> {
        Ok(vec![ProjectOption {
            id: "mock-project".to_string(),
            name: "Mock Project".to_string(),
        }])
    }

    async fn get_statuses(&self) -> Result<Vec<StatusOption>> {
        Ok(vec![StatusOption {
            id: "mock-status".to_string(),
            name: "To Do".to_string(),
        }])
    }

    async fn publish_task(&self, task: &Task, _settings: &ProviderSettings) -> Result<String> {
        self.publish_count.fetch_add(1, Ordering::SeqCst);
        self.publish_calls.lock().unwrap().push(task.hash.clone());

        if self.failing_hashes.contains(&task.hash) {
            return Err(SyncError::provider("mock", "scripted publish failure"));
        }

        Ok(self
            .preset_item_ids
            .get(&task.hash)
            .cloned()
            .unwrap_or_else(|| format!("item-{}", Uuid::new_v4())))
    }

    async fn archive_task(&self, item_id: &str) -> Result<()> {
        self.archive_count.fetch_add(1, Ordering::SeqCst);
        self.archive_calls.lock().unwrap().push(item_id.to_string());

        match &self.archive_error {
            Some(error) => Err(SyncError::provider("mock", error.clone())),
            None => Ok(()),
        }
    }
}
