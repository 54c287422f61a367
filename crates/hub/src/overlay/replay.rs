//! Late-joiner buffers: the last-N feed messages and the keyed spawn-task
//! set with TTL pruning of terminal entries.

use std::collections::VecDeque;

use sn_domain::spawn::SpawnTask;
use sn_protocol::overlay::OverlayOut;

/// Feed messages re-sent to each newly connecting overlay.
pub const MAX_REPLAY: usize = 20;

/// Terminal spawn tasks are evicted once `now - completed_at` exceeds this.
pub const SPAWN_TASK_TTL_MS: i64 = 120_000;

/// FIFO of the last [`MAX_REPLAY`] feed messages, in feed-id order.
#[derive(Default)]
pub struct ReplayBuffer {
    messages: VecDeque<OverlayOut>,
}

impl ReplayBuffer {
    pub fn push(&mut self, msg: OverlayOut) {
        self.messages.push_back(msg);
        while self.messages.len() > MAX_REPLAY {
            self.messages.pop_front();
        }
    }

    pub fn snapshot(&self) -> Vec<OverlayOut> {
        self.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Spawn tasks keyed by `task_id`, kept in insertion order for replay.
#[derive(Default)]
pub struct SpawnTaskBuffer {
    tasks: Vec<SpawnTask>,
}

impl SpawnTaskBuffer {
    /// Insert or update a task. `started_at` is immutable after the first
    /// sighting; a terminal transition sets `completed_at` exactly once.
    /// Returns the merged record as it will be broadcast.
    pub fn upsert(&mut self, update: SpawnTask, now_ms: i64) -> SpawnTask {
        match self.tasks.iter_mut().find(|t| t.task_id == update.task_id) {
            Some(existing) => {
                existing.label = update.label;
                existing.status = update.status;
                if update.result_preview.is_some() {
                    existing.result_preview = update.result_preview;
                }
                if existing.is_terminal() && existing.completed_at.is_none() {
                    existing.completed_at = update.completed_at.or(Some(now_ms));
                }
                existing.clone()
            }
            None => {
                let mut task = update;
                if task.is_terminal() && task.completed_at.is_none() {
                    task.completed_at = Some(now_ms);
                }
                self.tasks.push(task.clone());
                task
            }
        }
    }

    /// Evict terminal tasks whose `completed_at` is older than the TTL.
    pub fn prune(&mut self, now_ms: i64) {
        self.tasks.retain(|t| match (t.is_terminal(), t.completed_at) {
            (true, Some(done)) => now_ms - done <= SPAWN_TASK_TTL_MS,
            _ => true,
        });
    }

    /// Remaining tasks in insertion order.
    pub fn snapshot(&self) -> Vec<SpawnTask> {
        self.tasks.clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sn_domain::feed::{FeedChannel, FeedPriority};
    use sn_domain::spawn::SpawnStatus;

    fn feed_msg(text: &str) -> OverlayOut {
        OverlayOut::Feed {
            text: text.into(),
            priority: FeedPriority::Normal,
            ts: 0,
            channel: FeedChannel::Stream,
        }
    }

    fn task(id: &str, status: SpawnStatus) -> SpawnTask {
        SpawnTask {
            task_id: id.into(),
            label: format!("task {id}"),
            status,
            started_at: 100,
            completed_at: None,
            result_preview: None,
        }
    }

    #[test]
    fn replay_keeps_last_twenty_in_order() {
        let mut replay = ReplayBuffer::default();
        for i in 1..=25 {
            replay.push(feed_msg(&format!("item {i}")));
        }
        let snapshot = replay.snapshot();
        assert_eq!(snapshot.len(), MAX_REPLAY);
        match (&snapshot[0], &snapshot[19]) {
            (OverlayOut::Feed { text: first, .. }, OverlayOut::Feed { text: last, .. }) => {
                assert_eq!(first, "item 6");
                assert_eq!(last, "item 25");
            }
            _ => panic!("non-feed message in replay"),
        }
    }

    #[test]
    fn upsert_preserves_started_at() {
        let mut buf = SpawnTaskBuffer::default();
        buf.upsert(task("t1", SpawnStatus::Spawned), 1_000);
        let mut update = task("t1", SpawnStatus::Polling);
        update.started_at = 9_999;
        let merged = buf.upsert(update, 2_000);
        assert_eq!(merged.started_at, 100);
        assert_eq!(merged.status, SpawnStatus::Polling);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn terminal_transition_sets_completed_at_once() {
        let mut buf = SpawnTaskBuffer::default();
        buf.upsert(task("t1", SpawnStatus::Spawned), 1_000);
        let merged = buf.upsert(task("t1", SpawnStatus::Completed), 5_000);
        assert_eq!(merged.completed_at, Some(5_000));
        // A later duplicate terminal update does not move the stamp.
        let merged = buf.upsert(task("t1", SpawnStatus::Completed), 9_000);
        assert_eq!(merged.completed_at, Some(5_000));
    }

    #[test]
    fn prune_evicts_expired_terminal_tasks() {
        let mut buf = SpawnTaskBuffer::default();
        let mut done = task("old", SpawnStatus::Completed);
        done.completed_at = Some(0);
        buf.upsert(done, 0);
        buf.upsert(task("live", SpawnStatus::Polling), 0);

        buf.prune(SPAWN_TASK_TTL_MS + 1);
        let remaining = buf.snapshot();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].task_id, "live");
    }

    #[test]
    fn prune_keeps_fresh_terminal_tasks() {
        let mut buf = SpawnTaskBuffer::default();
        let mut done = task("recent", SpawnStatus::Failed);
        done.completed_at = Some(1_000);
        buf.upsert(done, 1_000);
        buf.prune(1_000 + SPAWN_TASK_TTL_MS);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn replay_order_is_insertion_order() {
        let mut buf = SpawnTaskBuffer::default();
        buf.upsert(task("a", SpawnStatus::Spawned), 0);
        buf.upsert(task("b", SpawnStatus::Spawned), 0);
        buf.upsert(task("a", SpawnStatus::Polling), 0);
        let ids: Vec<String> = buf.snapshot().into_iter().map(|t| t.task_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
