//! Runners driving probes over time.
//!
//! - [`PeriodicRunner`] fires one probe per period, each execution bounded
//!   by its own deadline. The final tally becomes a verdict.
//! - [`QueryLoop`] sweeps the named queries sequentially until cancelled.

pub mod periodic;
pub mod query_loop;

pub use periodic::PeriodicRunner;
pub use query_loop::QueryLoop;
