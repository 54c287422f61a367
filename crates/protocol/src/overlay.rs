//! Overlay fan-out socket protocol.
//!
//! The hub pushes `feed`, `status`, `ping`, `spawn_task`, and `profiling`
//! messages; the overlay sends `message`, `command`, `pong`, and
//! `profiling`. The overlay never queries buffers over this socket — it
//! only receives pushes plus the initial status/replay on connect.

use serde::{Deserialize, Serialize};

use sn_domain::feed::{FeedChannel, FeedItem, FeedPriority};
use sn_domain::spawn::SpawnTask;

/// Server → overlay messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OverlayOut {
    Feed {
        text: String,
        priority: FeedPriority,
        ts: i64,
        channel: FeedChannel,
    },
    Status {
        audio: AudioState,
        screen: ScreenState,
        connection: ConnectionState,
    },
    Ping {
        ts: i64,
    },
    SpawnTask(SpawnTask),
    Profiling {
        snapshot: serde_json::Value,
    },
}

impl OverlayOut {
    pub fn feed(item: &FeedItem) -> Self {
        OverlayOut::Feed {
            text: item.text.clone(),
            priority: item.priority,
            ts: item.ts,
            channel: item.channel,
        }
    }
}

/// Overlay → server messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OverlayIn {
    /// Freeform user message routed to the assistant (direct-send path).
    Message { text: String },
    Command { action: OverlayCommand },
    Pong { ts: i64 },
    /// Overlay self-report, merged into the profiler exposure.
    Profiling {
        #[serde(rename = "rssMb")]
        rss_mb: f64,
        #[serde(rename = "uptimeS")]
        uptime_s: f64,
        ts: i64,
    },
}

/// Known overlay commands. Anything else is logged and ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverlayCommand {
    ToggleAudio,
    ToggleScreen,
    SwitchDevice,
    #[serde(untagged)]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioState {
    Active,
    Muted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenState {
    Active,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Connecting,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_message_shape() {
        let msg = OverlayOut::Feed {
            text: "hello".into(),
            priority: FeedPriority::High,
            ts: 42,
            channel: FeedChannel::Agent,
        };
        let json = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(json["type"], "feed");
        assert_eq!(json["priority"], "high");
        assert_eq!(json["channel"], "agent");
    }

    #[test]
    fn command_round_trip() {
        let inbound: OverlayIn =
            serde_json::from_str(r#"{"type":"command","action":"toggle_audio"}"#).expect("parse");
        match inbound {
            OverlayIn::Command { action } => assert_eq!(action, OverlayCommand::ToggleAudio),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_command_is_preserved() {
        let inbound: OverlayIn =
            serde_json::from_str(r#"{"type":"command","action":"do_a_flip"}"#).expect("parse");
        match inbound {
            OverlayIn::Command { action } => {
                assert_eq!(action, OverlayCommand::Other("do_a_flip".into()))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn spawn_task_uses_camel_case_fields() {
        use sn_domain::spawn::{SpawnStatus, SpawnTask};
        let msg = OverlayOut::SpawnTask(SpawnTask {
            task_id: "t-1".into(),
            label: "research".into(),
            status: SpawnStatus::Polling,
            started_at: 1,
            completed_at: None,
            result_preview: None,
        });
        let json = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(json["type"], "spawn_task");
        assert_eq!(json["taskId"], "t-1");
        assert_eq!(json["status"], "polling");
    }
}
