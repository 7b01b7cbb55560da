//! The adaptive concurrency-probe benchmark engine (spec.md §4.A–§4.E).
//!
//! Data flows bottom-up for stats and top-down for control: the Plan
//! Driver walks the plan and invokes the Probe Engine per triple; the
//! Probe Engine drives the Worker Pool across successive worker counts;
//! the Worker Pool fans out to the Process Runner and folds the Stat
//! Parser's output back into `AggregatedStats`.

pub mod driver;
pub mod pool;
pub mod probe;
pub mod process;
pub mod stats;
