//! Diff-and-sync engine between scanned tasks and the active tracker.
//!
//! One reconciliation pass compares the tasks currently present in a
//! document against the persisted record of what the tracker has already
//! been told, then converges the two: new content-addresses are published,
//! vanished ones are archived, and the store is rewritten only when
//! something actually changed. The pass is idempotent - running it twice
//! with identical input makes zero remote calls the second time.
//!
//! Creations for one pass go out as a single concurrent batch and the pass
//! blocks until every one has resolved; archives are issued one at a time.
//! Results are attributed to tasks purely by hash, so out-of-order
//! completion of the concurrent creations is safe.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ProviderSettings;
use crate::error::Result;
use crate::extract::Task;
use crate::provider::Provider;
use crate::store::{TaskEntry, TaskStore};

// ============================================================================
// Summary
// ============================================================================

/// What one reconciliation pass did, for host-side reporting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileSummary {
    /// File the pass ran for.
    pub file: PathBuf,
    /// Items successfully created.
    pub created: usize,
    /// Creations the provider reported as failed (retried next pass).
    pub failed_creations: usize,
    /// Entries archived and removed from the store.
    pub archived: usize,
    /// Archive calls that errored (entry removed regardless).
    pub failed_archives: usize,
}

impl ReconcileSummary {
    /// Whether the pass changed anything at all.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.created == 0
            && self.failed_creations == 0
            && self.archived == 0
            && self.failed_archives == 0
    }
}

// ============================================================================
// Diff
// ============================================================================

/// The create/archive work one pass would perform.
#[derive(Debug, Clone, Default)]
pub struct TaskDelta {
    /// Tasks with no stored entry, deduplicated by hash (first occurrence
    /// wins; later duplicates collapse into the same remote item).
    pub additions: Vec<Task>,
    /// Stored entries whose hash vanished from the scan.
    pub removals: Vec<TaskEntry>,
}

impl TaskDelta {
    /// Whether there is nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

/// Compare a scan result against the store's partition for `file`.
///
/// Pure set difference keyed by content-address; entries for other files
/// are not considered.
#[must_use]
pub fn diff(file: &Path, current_tasks: &[Task], store: &TaskStore) -> TaskDelta {
    let stored_hashes: HashSet<String> = store
        .entries_for_file(file)
        .iter()
        .map(|e| e.hash.clone())
        .collect();
    let current_hashes: HashSet<&str> = current_tasks.iter().map(|t| t.hash.as_str()).collect();

    let mut batched: HashSet<&str> = HashSet::new();
    let additions: Vec<Task> = current_tasks
        .iter()
        .filter(|t| !stored_hashes.contains(&t.hash) && batched.insert(t.hash.as_str()))
        .cloned()
        .collect();

    let removals: Vec<TaskEntry> = store
        .entries_for_file(file)
        .into_iter()
        .filter(|e| !current_hashes.contains(e.hash.as_str()))
        .cloned()
        .collect();

    TaskDelta {
        additions,
        removals,
    }
}

// ============================================================================
// Reconciler
// ============================================================================

/// Drives create/archive operations against a provider.
///
/// The store is injected per pass so callers control its lifetime and
/// locking scope; opening a [`TaskStore`] takes the per-store lock, which
/// makes load-diff-persist one critical section.
///
/// # Example
///
/// ```rust,ignore
/// use todosync::reconcile::Reconciler;
///
/// let reconciler = Reconciler::new(provider, settings);
/// let summary = reconciler.reconcile(&file, &tasks, &mut store).await?;
/// println!("+{} -{}", summary.created, summary.archived);
/// ```
pub struct Reconciler {
    provider: Arc<dyn Provider>,
    settings: ProviderSettings,
}

impl Reconciler {
    /// Create a reconciler around the active provider.
    #[must_use]
    pub fn new(provider: Arc<dyn Provider>, settings: ProviderSettings) -> Self {
        Self {
            provider,
            settings,
        }
    }

    /// Run one reconciliation pass for a single file.
    ///
    /// `current_tasks` is the full scan result for `file`; entries for
    /// other files in the store are left untouched. Remote failures are
    /// absorbed: a failed creation stays pending for the next pass, a
    /// failed archive is logged and its entry dropped anyway.
    pub async fn reconcile(
        &self,
        file: &Path,
        current_tasks: &[Task],
        store: &mut TaskStore,
    ) -> Result<ReconcileSummary> {
        let mut summary = ReconcileSummary {
            file: file.to_path_buf(),
            ..ReconcileSummary::default()
        };

        let TaskDelta {
            additions,
            removals,
        } = diff(file, current_tasks, store);

        // New content-addresses get published as one concurrent batch.
        if !additions.is_empty() {
            debug!(
                "Publishing {} new task(s) from {}",
                additions.len(),
                file.display()
            );
            let outcomes = self
                .provider
                .publish_tasks(&additions, &self.settings)
                .await;

            for outcome in outcomes {
                match outcome.item_id {
                    Some(item_id) => {
                        store.insert(TaskEntry::new(outcome.hash, item_id, file));
                        summary.created += 1;
                    }
                    None => {
                        // Still absent from the store, so the next scan
                        // retries it automatically.
                        summary.failed_creations += 1;
                    }
                }
            }
        }

        // Vanished content-addresses get archived one at a time, each call
        // awaited before the next. The entry goes away no matter what the
        // provider says; a failed remote archive leaves an orphaned item
        // with no local retry.
        for entry in removals {
            if let Err(e) = self.provider.archive_task(&entry.item_id).await {
                warn!(
                    "Failed to archive item {} via {}: {e}",
                    entry.item_id,
                    self.provider.identity()
                );
                summary.failed_archives += 1;
            } else {
                summary.archived += 1;
            }
            store.remove(file, &entry.hash);
        }

        if store.is_dirty() {
            store.persist()?;
        }

        if summary.is_noop() {
            debug!("No task delta for {}", file.display());
        } else {
            info!(
                "Reconciled {}: +{} created, -{} archived ({} create failures, {} archive failures)",
                file.display(),
                summary.created,
                summary.archived,
                summary.failed_creations,
                summary.failed_archives
            );
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractOptions, Extractor};
    use crate::testing::MockProvider;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn extract(content: &str) -> Vec<Task> {
        let extractor = Extractor::new(ExtractOptions::default()).unwrap();
        extractor.extract(Path::new("demo.rs"), content)
    }

    fn reconciler(provider: &Arc<MockProvider>) -> Reconciler {
        Reconciler::new(
            Arc::clone(provider) as Arc<dyn Provider>,
            ProviderSettings::default(),
        )
    }

    async fn run(
        provider: &Arc<MockProvider>,
        tasks: &[Task],
        store: &mut TaskStore,
    ) -> ReconcileSummary {
        reconciler(provider)
            .reconcile(Path::new("demo.rs"), tasks, store)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_pass_creates_all() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();
        let provider = Arc::new(MockProvider::new());

        let tasks = extract("// TODO: one\n// TODO: two\n");
        let summary = run(&provider, &tasks, &mut store).await;

        assert_eq!(summary.created, 2);
        assert_eq!(provider.publish_count(), 2);
        assert_eq!(store.entries().len(), 2);
        assert!(store.state_path().exists());
    }

    #[tokio::test]
    async fn test_idempotence() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();
        let provider = Arc::new(MockProvider::new());
        let tasks = extract("// TODO: steady\n");

        run(&provider, &tasks, &mut store).await;
        let second = run(&provider, &tasks, &mut store).await;

        assert!(second.is_noop());
        assert_eq!(provider.publish_count(), 1);
        assert_eq!(provider.archive_count(), 0);
        assert!(!store.is_dirty());
    }

    #[tokio::test]
    async fn test_line_shift_is_not_a_delta() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();
        let provider = Arc::new(MockProvider::new());

        // Marker at line 5.
        let scan1 = extract("\n\n\n\n// TODO: fix bug\n");
        run(&provider, &scan1, &mut store).await;

        // Same marker shifted to line 9.
        let scan2 = extract("\n\n\n\n\n\n\n\n// TODO: fix bug\n");
        assert_ne!(scan1[0].line, scan2[0].line);
        let summary = run(&provider, &scan2, &mut store).await;

        assert!(summary.is_noop());
        assert_eq!(provider.publish_count(), 1);

        // Deleting the comment issues exactly one archive and empties the
        // partition.
        let summary = run(&provider, &[], &mut store).await;
        assert_eq!(summary.archived, 1);
        assert_eq!(provider.archive_count(), 1);
        assert!(store.entries_for_file(Path::new("demo.rs")).is_empty());
    }

    #[tokio::test]
    async fn test_title_edit_archives_and_recreates() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();
        let provider = Arc::new(MockProvider::new());

        run(&provider, &extract("// TODO: old title\n"), &mut store).await;
        let summary = run(&provider, &extract("// TODO: new title\n"), &mut store).await;

        assert_eq!(summary.created, 1);
        assert_eq!(summary.archived, 1);
        assert_eq!(store.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_partial_failure_resilience() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();

        let tasks = extract("// TODO: alpha\n// TODO: beta\n// TODO: gamma\n");
        let provider = Arc::new(MockProvider::new().with_publish_failure(&tasks[1].hash));

        let summary = run(&provider, &tasks, &mut store).await;
        assert_eq!(summary.created, 2);
        assert_eq!(summary.failed_creations, 1);
        assert!(store.contains(Path::new("demo.rs"), &tasks[0].hash));
        assert!(!store.contains(Path::new("demo.rs"), &tasks[1].hash));
        assert!(store.contains(Path::new("demo.rs"), &tasks[2].hash));

        // The next scan with the same three tasks re-attempts only beta.
        let provider2 = Arc::new(MockProvider::new());
        let summary = run(&provider2, &tasks, &mut store).await;
        assert_eq!(summary.created, 1);
        assert_eq!(provider2.publish_calls(), vec![tasks[1].hash.clone()]);
    }

    #[tokio::test]
    async fn test_archive_failure_still_removes_entry() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();

        let tasks = extract("// TODO: doomed\n");
        let provider = Arc::new(MockProvider::new().with_item_id(&tasks[0].hash, "item-doomed"));
        run(&provider, &tasks, &mut store).await;

        let failing = Arc::new(MockProvider::new().with_archive_error("tracker offline"));
        let summary = run(&failing, &[], &mut store).await;

        assert_eq!(summary.failed_archives, 1);
        assert_eq!(failing.archive_calls(), vec!["item-doomed"]);
        assert!(store.entries().is_empty());
    }

    #[tokio::test]
    async fn test_other_files_untouched() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();
        store.insert(TaskEntry::new("other-hash", "other-item", "other.rs"));
        store.persist().unwrap();

        let provider = Arc::new(MockProvider::new());
        run(&provider, &[], &mut store).await;

        assert_eq!(provider.archive_count(), 0);
        assert!(store.contains(Path::new("other.rs"), "other-hash"));
    }

    #[tokio::test]
    async fn test_duplicate_hashes_collapse_to_one_item() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();
        let provider = Arc::new(MockProvider::new());

        // Identical file, tag, and title on two lines: same address.
        let tasks = extract("// TODO: same thing\n\n// TODO: same thing\n");
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].hash, tasks[1].hash);

        let summary = run(&provider, &tasks, &mut store).await;
        assert_eq!(summary.created, 1);
        assert_eq!(provider.publish_count(), 1);
        assert_eq!(store.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_diff_is_pure() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();
        store.insert(TaskEntry::new("stale", "item-s", "demo.rs"));

        let tasks = extract("// TODO: fresh\n");
        let delta = diff(Path::new("demo.rs"), &tasks, &store);

        assert_eq!(delta.additions.len(), 1);
        assert_eq!(delta.additions[0].title, "fresh");
        assert_eq!(delta.removals.len(), 1);
        assert_eq!(delta.removals[0].hash, "stale");
    }

    #[tokio::test]
    async fn test_persist_skipped_when_clean() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();
        let provider = Arc::new(MockProvider::new());

        run(&provider, &[], &mut store).await;
        assert!(!store.state_path().exists());
    }
}
