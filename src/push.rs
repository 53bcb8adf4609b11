//! Push-credential queue collaborator.
//!
//! Pushing an account to its asset happens elsewhere. This crate only
//! enqueues the request and never waits for or inspects the outcome.

use std::sync::Mutex;

use serde_json::Value;

/// Fire-and-forget queue of push requests.
pub trait PushQueue {
    /// Enqueue a push of `account_ids`. Failures are the queue's problem and
    /// must not reach the caller.
    fn enqueue_push(&self, account_ids: &[String], params: Option<&Value>);
}

/// In-process queue that only remembers what was enqueued.
#[derive(Debug, Default)]
pub struct RecordingPushQueue {
    pushed: Mutex<Vec<(Vec<String>, Option<Value>)>>,
}

impl RecordingPushQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything enqueued so far, oldest first.
    pub fn pushed(&self) -> Vec<(Vec<String>, Option<Value>)> {
        self.pushed
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

impl PushQueue for RecordingPushQueue {
    fn enqueue_push(&self, account_ids: &[String], params: Option<&Value>) {
        if let Ok(mut pushed) = self.pushed.lock() {
            pushed.push((account_ids.to_vec(), params.cloned()));
        }
    }
}

/// Push `account_ids` when the caller asked for it. Callers pass only the
/// accounts that were created or updated.
pub(crate) fn push_if_needed(
    queue: &dyn PushQueue,
    push_now: bool,
    account_ids: &[String],
    params: Option<&Value>,
) {
    if !push_now || account_ids.is_empty() {
        return;
    }
    tracing::info!(accounts = account_ids.len(), "queueing account push");
    queue.enqueue_push(account_ids, params);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_push_only_when_requested() {
        let queue = RecordingPushQueue::new();
        let ids = vec!["a1".to_string()];

        push_if_needed(&queue, false, &ids, None);
        push_if_needed(&queue, true, &[], None);
        assert!(queue.pushed().is_empty());

        let params = json!({"sudo": true});
        push_if_needed(&queue, true, &ids, Some(&params));
        assert_eq!(queue.pushed(), vec![(ids, Some(params))]);
    }
}
