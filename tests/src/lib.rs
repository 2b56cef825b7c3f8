//! # Braidnet Test Suite
//!
//! Unified test crate for cross-crate behavior. Anything a single crate can
//! verify on its own lives in that crate's `#[cfg(test)]` modules; this
//! member covers the seams.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── admission.rs   # Gate charges, duplicate suppression, backpressure
//!     ├── durability.rs  # Crash recovery, torn tails, pruning, gaps
//!     ├── scheduling.rs  # Stage graph ordering, stall reporting, drains
//!     └── lifecycle.rs   # Full bootstrap: genesis, restart, upgrade, refusal
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # Everything
//! cargo test -p bn-tests
//!
//! # By area
//! cargo test -p bn-tests integration::admission
//! cargo test -p bn-tests integration::durability
//! cargo test -p bn-tests integration::scheduling
//! cargo test -p bn-tests integration::lifecycle
//! ```

pub mod integration;
