//! # Braidnet Node Runtime
//!
//! This library exposes the internal modules of the node runtime for testing.
//! The main entry point is the `braidnet-node` binary.
//!
//! ## Startup Sequence
//!
//! ```text
//! LoadConfig ─▶ ResolveMembership ─▶ RecoverDurableLog ─▶
//!     InitializeScratchpad ─▶ BuildScheduler ─▶ Ready
//! ```
//!
//! The [`coordinator::NodeBootstrapCoordinator`] drives the sequence and
//! fails fast on the first error; there is no partial-start mode. Before any
//! data file is touched it takes an exclusive lock on the data directory, and
//! before membership is resolved it compares the persisted version marker
//! against the running build to classify the start as a restart or an
//! upgrade.
//!
//! ## Modular Structure
//!
//! - `config` - per-concern configuration with `BN_*` environment overrides
//! - `lock` - exclusive data-directory lock with stale-holder takeover
//! - `marker` - software-version marker and downgrade refusal
//! - `coordinator` - the bootstrap phase machine
//! - `wiring` - stage graph construction (durable write, dispatch, intake)
//! - `registry` - operation capability registry and startup status report
//! - `ports` - the consensus engine boundary

pub mod config;
pub mod context;
pub mod coordinator;
pub mod errors;
pub mod lock;
pub mod marker;
pub mod ports;
pub mod registry;
pub mod wiring;

pub use config::NodeConfig;
pub use context::NodeContext;
pub use coordinator::{BootPhase, BootstrapReport, NodeBootstrapCoordinator, RunningNode};
pub use errors::{ConfigError, ConfigResult};
pub use ports::{ConsensusSink, LoggingSink};
pub use registry::{CapabilityRegistry, OperationKind};
pub use wiring::FatalReport;
