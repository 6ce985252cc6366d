// Todostore - single-user task list with durable key-value persistence

pub mod codec;
pub mod config;
pub mod filter;
pub mod storage;
pub mod store;
pub mod task;

// Re-export main types for convenience
pub use config::Config;
pub use filter::Filter;
pub use storage::{DEFAULT_KEY, FileStorage, KeyValueStore, MemoryStorage};
pub use store::{Snapshot, Stats, SubscriptionId, TaskStore};
pub use task::{Task, now};
