//! check-conditions kube - cluster scanning for check-conditions
//!
//! This crate provides:
//! - **Cluster access**: the `ClusterAccess` trait, a `kube` implementation and an in-memory mock
//! - **Enumeration**: filtering advertised resource types into scan jobs
//! - **Worker pool**: concurrent listing and evaluation of resource types
//! - **Aggregation**: per-cycle counters, report lines and the summary
//! - **Poll control**: single run, forever, wait-for and while strategies

pub mod access;
pub mod aggregate;
pub mod client;
pub mod enumerator;
pub mod error;
pub mod mock;
pub mod poll;
pub mod scan;
pub mod sink;

pub use access::ClusterAccess;
pub use aggregate::{CycleCounters, CycleReport, format_duration};
pub use client::KubeAccess;
pub use enumerator::{DENY_LIST, ScanJob, enumerate};
pub use error::{KubeError, Result};
pub use mock::{MockClusterAccess, OperationCounts};
pub use poll::{MigrationAssist, Outcome, PollController, PollOptions, PollStrategy, next_step};
pub use scan::{DEFAULT_WORKERS, JobOutput, Scanner};
pub use sink::{MemorySink, ReportSink, TerminalSink};
