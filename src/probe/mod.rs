//! Probe operations against the monitored endpoints.

pub mod query;
pub mod read;
pub mod write;

pub use query::{NamedQueryProbe, QuerySpec};
pub use read::ReadProbe;
pub use write::WriteProbe;
