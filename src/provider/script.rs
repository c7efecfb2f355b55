//! Scripting backend: drive a local command-line tool as the task tracker.
//!
//! Publishes and archives by spawning configured external commands with a
//! JSON payload on stdin. The publish command prints the created item's
//! identifier on stdout. Every call runs under the configured timeout and
//! resolves to a failure instead of hanging the pass, so one blocked call
//! never stalls the rest of a batch.
//!
//! Archive scripts are expected to exit 0 when asked to archive an item
//! that no longer exists; a nonzero exit is reported as a provider error
//! and handled (logged, never blocking) by the reconciler.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

use crate::config::ProviderSettings;
use crate::error::{Result, SyncError};
use crate::extract::Task;
use crate::provider::{bound_title, ProjectOption, Provider, StatusOption};

/// Task tracker backed by local scripts.
///
/// # Example
///
/// ```rust,ignore
/// use todosync::config::ProviderSettings;
/// use todosync::provider::ScriptProvider;
///
/// let provider = ScriptProvider::new(ProviderSettings {
///     script_publish: "reminders add".to_string(),
///     script_archive: "reminders complete".to_string(),
///     ..ProviderSettings::default()
/// });
/// ```
#[derive(Debug, Clone)]
pub struct ScriptProvider {
    settings: ProviderSettings,
}

impl ScriptProvider {
    /// Create a provider around the configured scripts.
    #[must_use]
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }

    /// Run a configured command with `payload` on stdin, returning stdout.
    ///
    /// The command string is split on whitespace: first token is the
    /// program, the rest are leading arguments.
    async fn run_script(&self, command: &str, payload: &serde_json::Value) -> Result<String> {
        let mut parts = command.split_whitespace();
        let program = parts.next().ok_or_else(|| SyncError::InvalidConfig {
            field: "provider_settings".to_string(),
            reason: "script command is empty".to_string(),
        })?;

        debug!("Running backend script: {command}");

        let mut child = AsyncCommand::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SyncError::provider("script", format!("failed to spawn '{program}': {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A script that never reads stdin closes the pipe early; that is
            // not a failure of the call itself.
            match stdin.write_all(payload.to_string().as_bytes()).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!("Backend script closed stdin without reading payload");
                }
                Err(e) => {
                    return Err(SyncError::provider(
                        "script",
                        format!("stdin write failed: {e}"),
                    ))
                }
            }
            drop(stdin);
        }

        let timeout = Duration::from_secs(self.settings.timeout_secs);
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => {
                result.map_err(|e| SyncError::provider("script", format!("wait failed: {e}")))?
            }
            Err(_) => {
                return Err(SyncError::ScriptTimeout {
                    command: command.to_string(),
                    timeout_secs: self.settings.timeout_secs,
                })
            }
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(SyncError::provider(
                "script",
                format!(
                    "'{command}' exited with code {}: {}",
                    output.status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ))
        }
    }
}

#[async_trait]
impl Provider for ScriptProvider {
    fn identity(&self) -> &str {
        "script"
    }

    fn requires_authentication(&self) -> bool {
        // Credential handling is the script's own business.
        false
    }

    async fn authenticate(&self) -> Result<()> {
        Ok(())
    }

    async fn validate_configuration(&self) -> Result<()> {
        if self.settings.script_publish.is_empty() {
            return Err(SyncError::InvalidConfig {
                field: "provider_settings.script_publish".to_string(),
                reason: "no publish command configured".to_string(),
            });
        }

        for command in [
            self.settings.script_publish.as_str(),
            self.settings.script_archive.as_str(),
        ] {
            let Some(program) = command.split_whitespace().next() else {
                continue;
            };
            if which::which(program).is_err() {
                return Err(SyncError::MissingScript {
                    command: program.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn get_projects(&self) -> Result<Vec<ProjectOption>> {
        // Scripts publish into whatever list they are pointed at; the
        // configured project id is the only routing there is.
        Ok(vec![ProjectOption {
            id: self.settings.project_id.clone(),
            name: self.settings.project_id.clone(),
        }])
    }

    async fn get_statuses(&self) -> Result<Vec<StatusOption>> {
        Ok(vec![StatusOption {
            id: self.settings.status_id.clone(),
            name: self.settings.status_id.clone(),
        }])
    }

    async fn publish_task(&self, task: &Task, settings: &ProviderSettings) -> Result<String> {
        let payload = json!({
            "action": "publish",
            "file": task.file,
            "line": task.line,
            "tag": task.tag,
            "title": bound_title(&task.title),
            "snippet": task.snippet,
            "hash": task.hash,
            "project_id": settings.project_id,
            "status_id": settings.status_id,
        });

        let item_id = self.run_script(&self.settings.script_publish, &payload).await?;
        if item_id.is_empty() {
            return Err(SyncError::provider(
                "script",
                "publish script returned no item id",
            ));
        }
        Ok(item_id)
    }

    async fn archive_task(&self, item_id: &str) -> Result<()> {
        if self.settings.script_archive.is_empty() {
            return Err(SyncError::InvalidConfig {
                field: "provider_settings.script_archive".to_string(),
                reason: "no archive command configured".to_string(),
            });
        }

        let payload = json!({
            "action": "archive",
            "item_id": item_id,
        });
        self.run_script(&self.settings.script_archive, &payload)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractOptions, Extractor};
    use std::path::Path;

    fn settings(publish: &str, archive: &str) -> ProviderSettings {
        ProviderSettings {
            script_publish: publish.to_string(),
            script_archive: archive.to_string(),
            timeout_secs: 5,
            ..ProviderSettings::default()
        }
    }

    fn sample_task() -> Task {
        let extractor = Extractor::new(ExtractOptions::default()).unwrap();
        extractor
            .extract(Path::new("demo.rs"), "// TODO: sample\n")
            .remove(0)
    }

    #[tokio::test]
    async fn test_validate_rejects_empty_publish_command() {
        let provider = ScriptProvider::new(settings("", ""));
        assert!(matches!(
            provider.validate_configuration().await,
            Err(SyncError::InvalidConfig { .. })
        ));
    }

    #[tokio::test]
    async fn test_validate_rejects_missing_program() {
        let provider = ScriptProvider::new(settings("definitely-not-on-path-xyz", ""));
        assert!(matches!(
            provider.validate_configuration().await,
            Err(SyncError::MissingScript { .. })
        ));
    }

    #[tokio::test]
    async fn test_publish_reads_item_id_from_stdout() {
        let provider = ScriptProvider::new(settings("echo item-42", ""));
        let item_id = provider
            .publish_task(&sample_task(), &ProviderSettings::default())
            .await
            .unwrap();
        assert_eq!(item_id, "item-42");
    }

    #[tokio::test]
    async fn test_publish_fails_on_nonzero_exit() {
        let provider = ScriptProvider::new(settings("false", ""));
        assert!(matches!(
            provider
                .publish_task(&sample_task(), &ProviderSettings::default())
                .await,
            Err(SyncError::Provider { .. })
        ));
    }

    #[tokio::test]
    async fn test_call_times_out() {
        let provider = ScriptProvider::new(ProviderSettings {
            script_publish: "sleep 30".to_string(),
            timeout_secs: 1,
            ..ProviderSettings::default()
        });
        assert!(matches!(
            provider
                .publish_task(&sample_task(), &ProviderSettings::default())
                .await,
            Err(SyncError::ScriptTimeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_archive_without_command_is_an_error() {
        let provider = ScriptProvider::new(settings("echo ok", ""));
        assert!(provider.archive_task("item-1").await.is_err());
    }

    #[tokio::test]
    async fn test_archive_runs_configured_command() {
        let provider = ScriptProvider::new(settings("echo ok", "true"));
        provider.archive_task("item-1").await.unwrap();
    }
}
