//! Waiting queue: ordered participant ids awaiting pairing.
//!
//! FIFO on normal entry; `enqueue_front` restores participants who
//! accepted a failed candidate. Every committed mutation signals the
//! change notifier exactly once — that signal is the only thing that
//! triggers a pairing attempt, the queue itself never decides.
//!
//! `contains`, `position` and `len` are read-only introspection: `len`
//! backs the queue-size reply, the others let callers and tests observe
//! membership and ordering without mutating anything.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Notify, RwLock};

#[derive(Clone, Default)]
pub struct WaitQueue {
    inner: Arc<RwLock<VecDeque<String>>>,
    changed: Arc<Notify>,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifier signalled after every committed mutation. `Notify`'s
    /// single-permit semantics coalesce bursts of changes, which is
    /// exactly what the drain coordinator wants.
    pub fn changed(&self) -> Arc<Notify> {
        Arc::clone(&self.changed)
    }

    /// Append unless already present. Returns whether the id was inserted.
    pub async fn enqueue(&self, id: &str) -> bool {
        {
            let mut queue = self.inner.write().await;
            if queue.iter().any(|q| q == id) {
                return false;
            }
            queue.push_back(id.to_string());
        }
        self.changed.notify_one();
        true
    }

    /// Prepend, for priority re-entry after a failed candidate.
    pub async fn enqueue_front(&self, id: &str) -> bool {
        {
            let mut queue = self.inner.write().await;
            if queue.iter().any(|q| q == id) {
                return false;
            }
            queue.push_front(id.to_string());
        }
        self.changed.notify_one();
        true
    }

    /// Atomically remove and return the front two ids, oldest first.
    pub async fn dequeue_front_two(&self) -> Option<[String; 2]> {
        let pair = {
            let mut queue = self.inner.write().await;
            if queue.len() < 2 {
                return None;
            }
            let first = queue.pop_front()?;
            let second = queue.pop_front()?;
            [first, second]
        };
        self.changed.notify_one();
        Some(pair)
    }

    /// Remove `id` wherever it sits. Returns whether it was present.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut queue = self.inner.write().await;
            let before = queue.len();
            queue.retain(|q| q != id);
            queue.len() != before
        };
        if removed {
            self.changed.notify_one();
        }
        removed
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.iter().any(|q| q == id)
    }

    /// Position of `id` from the front, if present.
    pub async fn position(&self, id: &str) -> Option<usize> {
        self.inner.read().await.iter().position(|q| q == id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
