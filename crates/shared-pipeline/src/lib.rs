//! # Shared Pipeline - Backpressured Stage Scheduler
//!
//! Wires the node's processing stages into a supervised graph of concurrent
//! tasks with bounded input queues. All stages run on the shared runtime
//! worker pool; no stage owns a thread.
//!
//! ## Stage Graph
//!
//! ```text
//! ┌──────────────┐  submit()  ┌──────────────┐  submit()  ┌──────────────┐
//! │ intake stage │ ─────────▶ │ durable log  │ ─────────▶ │  dispatch    │
//! │  (bounded)   │            │   stage      │            │   stage      │
//! └──────────────┘            └──────────────┘            └──────────────┘
//!        ▲                           ▲                           ▲
//!        └───────────── health monitor samples every stage ──────┘
//! ```
//!
//! ## Guarantees
//!
//! - **Backpressure:** `submit` waits while a queue is full, so a slow sink
//!   throttles every producer upstream of it. `try_submit` refuses instead,
//!   for boundaries that must answer immediately.
//! - **Ordering:** items from one producer are processed in submission order;
//!   the scheduler never reorders.
//! - **Cooperative shutdown:** stages stop source-first, drain their queues,
//!   then report `Stopped`.
//! - **Stall detection:** a stage with queued input and no completed work for
//!   longer than the stall threshold is reported `Stalled`, never restarted.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod health;
pub mod scheduler;
pub mod stage;

// Re-export main types
pub use health::{HealthConfig, HealthSnapshot, StageHealth};
pub use scheduler::Pipeline;
pub use stage::{worker_fn, StageHandle, StageState, StageStats, StageWorker, SubmitError, WorkerFn};

/// Default bound for a stage input queue when the caller has no better number.
pub const DEFAULT_STAGE_CAPACITY: usize = 1024;
