//! Client-side job synchronization: one shared, deduplicated job list that blends server
//! pages with optimistic submissions and keeps itself fresh while work is in flight.

pub mod backend;
mod poller;
pub mod state;
pub mod store;

pub use backend::JobsBackend;
pub use state::{ApplyOutcome, JobsState};
pub use store::{JobStore, OptimisticJob, StoreSettings};
