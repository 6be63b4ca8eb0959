// ── Wire types ──
//
// JSON shapes served by `/api/stacks`, `/api/refresh-status`,
// `/api/stacks/containers/{path}` and embedded in event-stream payloads.
// Field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Sync status of a single stack.
///
/// Deserialization is strict: a record carrying any other status string
/// is rejected as malformed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StackStatus {
    Missing,
    Syncing,
    Synced,
    Deleting,
    Failed,
}

/// One deployable unit, keyed by its repository `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackRecord {
    /// Unique, stable identifier (e.g. `"apps/api"`).
    pub path: String,
    pub compose_file: String,
    pub compose_hash: String,
    pub status: StackStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub containers_running: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub containers_total: Option<u32>,

    // Metadata of the last successful sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_commit_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_compose_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<String>,

    // Outcome of the most recent sync attempt, successful or not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_error: Option<String>,
}

impl StackRecord {
    /// Minimal record with only the required fields populated.
    pub fn new(
        path: impl Into<String>,
        compose_file: impl Into<String>,
        compose_hash: impl Into<String>,
        status: StackStatus,
    ) -> Self {
        Self {
            path: path.into(),
            compose_file: compose_file.into(),
            compose_hash: compose_hash.into(),
            status,
            containers_running: None,
            containers_total: None,
            synced_revision: None,
            synced_commit_message: None,
            synced_compose_hash: None,
            synced_at: None,
            last_sync_at: None,
            last_sync_status: None,
            last_sync_error: None,
        }
    }
}

/// Lifecycle of the server-side refresh operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RefreshState {
    Refreshing,
    Queued,
    Completed,
    Failed,
}

/// Summary of the most recent refresh. Always replaced wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSnapshot {
    pub revision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub ref_type: String,
    pub refreshed_at: DateTime<Utc>,
    pub refresh_status: RefreshState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_error: Option<String>,
}

/// One container belonging to a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub service: String,
    /// `running`, `exited`, `paused`, `restarting`, `dead`, `created`.
    pub state: String,
    /// `healthy`, `unhealthy`, `starting`, `none`.
    pub health: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn deserialize_full_stack_record() {
        let json = r#"{
            "path": "apps/api",
            "composeFile": "docker-compose.yml",
            "composeHash": "h1",
            "status": "synced",
            "containersRunning": 2,
            "containersTotal": 3,
            "syncedRevision": "abc123",
            "syncedCommitMessage": "bump api",
            "lastSyncAt": "2024-01-01T00:00:00Z",
            "lastSyncStatus": "success"
        }"#;

        let record: StackRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.path, "apps/api");
        assert_eq!(record.status, StackStatus::Synced);
        assert_eq!(record.containers_running, Some(2));
        assert_eq!(record.containers_total, Some(3));
        assert_eq!(record.synced_revision.as_deref(), Some("abc123"));
        assert!(record.last_sync_error.is_none());
    }

    #[test]
    fn unknown_status_is_rejected() {
        let json = r#"{"path":"a","composeFile":"c","composeHash":"h","status":"exploded"}"#;
        assert!(serde_json::from_str::<StackRecord>(json).is_err());
    }

    #[test]
    fn serialize_omits_absent_optionals() {
        let record = StackRecord::new("infra/db", "compose.yaml", "h9", StackStatus::Failed);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["composeFile"], "compose.yaml");
        assert_eq!(value["status"], "failed");
        assert!(value.get("containersRunning").is_none());
    }

    #[test]
    fn refresh_snapshot_ignores_embedded_stacks() {
        let json = r#"{
            "revision": "abc123",
            "ref": "main",
            "refType": "branch",
            "refreshedAt": "2024-01-01T00:00:00Z",
            "refreshStatus": "completed",
            "stacks": [{"path": "x"}]
        }"#;

        let snap: RefreshSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.git_ref, "main");
        assert_eq!(snap.refresh_status, RefreshState::Completed);
        assert!(snap.refresh_error.is_none());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(StackStatus::from_str("FAILED").unwrap(), StackStatus::Failed);
        assert_eq!(StackStatus::Deleting.to_string(), "deleting");
        assert_eq!(StackStatus::iter().count(), 5);
    }
}
