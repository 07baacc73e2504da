//! Critical path analysis.
//!
//! Annotates every operation with the length of the longest weighted chain of
//! consumers starting at it, and fails fast with a minimal cycle trace when
//! the graph is not a DAG. The scheduler uses the lengths as dispatch
//! priorities.

mod calculation;
mod diagnostics;
mod types;

pub use calculation::{compute_critical_path_lengths, CriticalPathAnalyzer};
pub use diagnostics::shortest_path;
pub use types::{AnalysisError, CriticalPathLengths, CycleError, NoPathError};
