//! Completion aggregation for the changed-key queue

use async_channel::Receiver;
use tokio::task::JoinHandle;

/// Normalized paths of objects uploaded during a run, in completion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedKeySet {
    keys: Vec<String>,
}

impl ChangedKeySet {
    pub fn push(&mut self, key: String) {
        self.keys.push(key);
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.keys
    }

    pub fn into_vec(self) -> Vec<String> {
        self.keys
    }
}

impl FromIterator<String> for ChangedKeySet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

/// Drain `receiver` until every sender is gone
pub async fn collect_changed(receiver: Receiver<String>) -> ChangedKeySet {
    let mut changed = ChangedKeySet::default();
    while let Ok(key) = receiver.recv().await {
        changed.push(key);
    }
    changed
}

/// Run [`collect_changed`] as its own task
pub fn spawn_collector(receiver: Receiver<String>) -> JoinHandle<ChangedKeySet> {
    tokio::spawn(collect_changed(receiver))
}
