//! Observability: gauges/timers, per-tick traces, and the daily journal.

pub mod journal;
pub mod profiler;
pub mod tracer;

pub use journal::TraceJournal;
pub use profiler::Profiler;
pub use tracer::{TickTrace, Tracer};
