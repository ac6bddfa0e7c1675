//! Per-user usage counters in the hosted document store

mod record;
mod service;
mod store;

pub use record::{word_count, Activity, CountersRecord};
pub use service::CountersService;
pub use store::{apply_increment, CounterStore, HttpCounterStore, MemoryCounterStore};
