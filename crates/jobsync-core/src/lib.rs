//! # JobSync Core
//!
//! Keeps a process's cron jobs in sync with a desired-state table without
//! restarting the process.
//!
//! ## Architecture
//!
//! ```text
//! PollLoop ──(snapshot changed)──▶ Reconciler ──▶ TaskSet (cancel / add)
//!                                                    │
//!                                               timer fires
//!                                                    ▼
//!                    DefinitionStore ◀── write-back ── Dispatcher ──▶ JobHandle::execute
//! ```
//!
//! ## Key Components
//!
//! - [`JobHandle`]: wraps one [`Job`] implementation; overlapping executions
//!   are skipped by an atomic `Idle -> Running -> Idle` guard
//! - [`ImplementationRegistry`]: implementation id to handle, built at startup
//! - [`TaskSet`]: live timers keyed by definition id
//! - [`Dispatcher`]: resolves a firing to its current binding and runs it
//! - [`Reconciler`]: applies a desired-state list to the task set
//! - [`PollLoop`]: fetches this node's definitions and reconciles on change
//! - [`JobSync`]: wires everything together
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use jobsync_config::SchedulerConfig;
//! use jobsync_core::{
//!     CancellationToken, ImplementationRegistry, JobSync, MemoryDefinitionStore, StaticNode,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = ImplementationRegistry::new();
//!     let service = JobSync::new(
//!         Arc::new(MemoryDefinitionStore::new()),
//!         registry,
//!         Arc::new(StaticNode::new("10.0.0.1")),
//!         &SchedulerConfig::default(),
//!     );
//!     service.register_defaults().await;
//!     service.run(CancellationToken::new()).await;
//! }
//! ```

pub mod bootstrap;
pub mod definition;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod handle;
pub mod node;
pub mod poll;
pub mod reconciler;
pub mod registry;
pub mod schedule;
pub mod service;
pub mod sqlite;
pub mod store;
pub mod task_set;

// Re-exports
pub use bootstrap::{RegistrationReport, register_defaults};
pub use definition::{JobDefinition, Snapshot, SnapshotKey};
pub use dispatch::{Dispatcher, ExecutionHandle};
pub use error::{ExecutionError, LookupError, ParseError, ReconcileError, StoreError, StoreResult};
pub use gate::ReadinessGate;
pub use handle::{ExecutionOutcome, GuardState, Job, JobHandle, ReentrancyGuard};
pub use node::{NodeIdentity, StaticNode, resolve_node_address};
pub use poll::{PollLoop, TickOutcome};
pub use reconciler::{ReconcileReport, Reconciler};
pub use registry::{ImplementationRegistry, JobLookup};
pub use schedule::{next_fire_after, parse_schedule};
pub use service::JobSync;
pub use sqlite::SqliteDefinitionStore;
pub use store::{DefinitionStore, MemoryDefinitionStore};
pub use task_set::{CancelHandle, Firing, TaskBinding, TaskSet};

// Re-export CancellationToken for convenience
pub use tokio_util::sync::CancellationToken;
