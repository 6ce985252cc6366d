// Task collection state with write-through persistence

use crate::codec;
use crate::filter::Filter;
use crate::storage::{DEFAULT_KEY, KeyValueStore};
use crate::task::Task;
use eyre::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Aggregate counts over the full, unfiltered collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

impl Stats {
    fn of(tasks: &[Task]) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|t| t.completed).count();
        Self {
            total,
            active: total - completed,
            completed,
        }
    }

    /// Whether clearing completed tasks would remove anything
    pub fn has_completed(&self) -> bool {
        self.completed > 0
    }
}

/// State handed to subscribers after each change
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot<'a> {
    pub filter: Filter,
    pub visible: Vec<&'a Task>,
    pub stats: Stats,
}

/// Handle returned by [`TaskStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&Snapshot<'_>)>;

/// Authoritative task collection and view filter
///
/// Every mutation replaces the collection, writes it in full to storage,
/// then notifies subscribers. The filter is transient and starts at `All`.
pub struct TaskStore<S: KeyValueStore> {
    storage: S,
    key: String,
    tasks: Vec<Task>,
    filter: Filter,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

impl<S: KeyValueStore> TaskStore<S> {
    /// Load the collection stored under the default key
    pub fn load(storage: S) -> Self {
        Self::load_with_key(storage, DEFAULT_KEY)
    }

    /// Load the collection stored under `key`, rejecting keys the storage cannot use
    ///
    /// Unlike [`TaskStore::load_with_key`], an unusable key is a configuration
    /// error and is returned instead of degrading every later write to a warning.
    pub fn open_with_key(storage: S, key: &str) -> Result<Self> {
        storage.check_key(key)?;
        Ok(Self::load_with_key(storage, key))
    }

    /// Load the collection stored under `key`
    ///
    /// Missing, unreadable or malformed data yields an empty collection; the
    /// failure is logged and never returned.
    pub fn load_with_key(storage: S, key: &str) -> Self {
        let tasks = match storage.get(key) {
            Ok(None) => {
                debug!(key, "No stored tasks, starting empty");
                Vec::new()
            }
            Ok(Some(raw)) => match codec::decode(&raw) {
                Ok(tasks) => {
                    info!(key, count = tasks.len(), "Loaded tasks");
                    tasks
                }
                Err(e) => {
                    warn!(key, error = ?e, "Stored tasks are malformed, starting empty");
                    Vec::new()
                }
            },
            Err(e) => {
                warn!(key, error = ?e, "Failed to read stored tasks, starting empty");
                Vec::new()
            }
        };

        Self {
            storage,
            key: key.to_string(),
            tasks,
            filter: Filter::default(),
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Append a new task built from `raw_text`
    ///
    /// Blank input is ignored: nothing is created, written or notified.
    pub fn add(&mut self, raw_text: &str) -> Option<Task> {
        let task = Task::new(raw_text)?;
        debug!(id = %task.id, "add: appending task");

        let mut tasks = self.tasks.clone();
        tasks.push(task.clone());
        self.commit(tasks);

        Some(task)
    }

    /// Flip `completed` on the task with `id`; returns whether it existed
    ///
    /// An unknown id leaves the collection unchanged but it is still written.
    pub fn toggle(&mut self, id: &str) -> bool {
        let found = self.tasks.iter().any(|t| t.id == id);
        let tasks = self
            .tasks
            .iter()
            .map(|t| if t.id == id { t.toggled() } else { t.clone() })
            .collect();
        self.commit(tasks);
        found
    }

    /// Remove the task with `id`; returns whether it existed
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        let tasks: Vec<Task> = self.tasks.iter().filter(|t| t.id != id).cloned().collect();
        let removed = tasks.len() != before;
        self.commit(tasks);
        removed
    }

    /// Drop every completed task; returns how many were removed
    pub fn clear_completed(&mut self) -> usize {
        let before = self.tasks.len();
        let tasks: Vec<Task> = self.tasks.iter().filter(|t| !t.completed).cloned().collect();
        let removed = before - tasks.len();
        self.commit(tasks);
        removed
    }

    /// Change the view filter; not persisted
    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
        self.notify();
    }

    fn commit(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.persist();
        self.notify();
    }

    fn persist(&mut self) {
        let result = codec::encode(&self.tasks).and_then(|raw| self.storage.set(&self.key, &raw));
        match result {
            Ok(()) => debug!(key = %self.key, count = self.tasks.len(), "Persisted tasks"),
            // In-memory state stays authoritative; the next mutation writes it again
            Err(e) => warn!(key = %self.key, error = ?e, "Failed to persist tasks"),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Full collection in insertion order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    /// Tasks matching the current filter, in insertion order
    pub fn visible_tasks(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| self.filter.matches(t)).collect()
    }

    pub fn stats(&self) -> Stats {
        Stats::of(&self.tasks)
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            filter: self.filter,
            visible: self.visible_tasks(),
            stats: self.stats(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Register a callback invoked synchronously after every change
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Snapshot<'_>) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove a subscription; returns whether it was registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
        self.subscribers.len() != before
    }

    fn notify(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }

        // Built from fields so the callbacks stay in place while the snapshot is borrowed
        let filter = self.filter;
        let snapshot = Snapshot {
            filter,
            visible: self.tasks.iter().filter(|t| filter.matches(t)).collect(),
            stats: Stats::of(&self.tasks),
        };
        for (_, callback) in self.subscribers.iter_mut() {
            callback(&snapshot);
        }
    }
}
