//! # Pulse Core
//!
//! Core traits, types, and errors for the Pulse telemetry pipeline.
//!
//! This crate provides the data model shared by every buffered log store
//! and the abstractions over the platform services the pipeline consumes,
//! so that the same controllers run against real devices and against the
//! in-memory fakes in [`mock`].
//!
//! ## Key Traits
//!
//! - [`Clock`]: Wall-clock time abstraction for testability
//! - [`ConnectivityProvider`]: Current network connection status
//! - [`LogUploader`]: Outbound network logger for one kind of log
//! - [`RawMetricsAssessor`]: Raw OS metrics (storage, memory, CPU snapshots)
//! - [`AuthSession`]: Authenticated session gating document uploads
//! - [`ExceptionReporter`]: Out-of-process exception reporting sink
//!
//! ## Key Types
//!
//! - [`EventLog`]: An analytics event with a two-tier [`EventPriority`]
//! - [`MetricLog`]: A performance metric with a three-tier [`MetricPriority`]
//! - [`DocumentLog`]: A durable cloud-sync document (insertion order only)
//! - [`CpuSnapshot`]: CPU/time baseline used to compute relative CPU usage

pub mod document;
pub mod error;
pub mod event;
pub mod metric;
pub mod mock;
pub mod snapshot;
pub mod status;
pub mod traits;

// Re-export main types
pub use document::*;
pub use error::*;
pub use event::*;
pub use metric::*;
pub use snapshot::*;
pub use status::*;
pub use traits::*;
