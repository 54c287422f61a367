//! Spawn tasks — lifecycle of background work running on the assistant side.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpawnStatus {
    Spawned,
    Polling,
    Completed,
    Failed,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnTask {
    pub task_id: String,
    pub label: String,
    pub status: SpawnStatus,
    /// Milliseconds since epoch; immutable after the first upsert.
    pub started_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_preview: Option<String>,
}

impl SpawnTask {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            SpawnStatus::Completed | SpawnStatus::Failed | SpawnStatus::Timeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        let mut task = SpawnTask {
            task_id: "t1".into(),
            label: "index".into(),
            status: SpawnStatus::Spawned,
            started_at: 0,
            completed_at: None,
            result_preview: None,
        };
        assert!(!task.is_terminal());
        task.status = SpawnStatus::Polling;
        assert!(!task.is_terminal());
        for status in [SpawnStatus::Completed, SpawnStatus::Failed, SpawnStatus::Timeout] {
            task.status = status;
            assert!(task.is_terminal());
        }
    }
}
