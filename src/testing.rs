//! Testing utilities for ispace programs.
//!
//! - **Assertions**: compare collections and check partitioning invariants
//! - **Test data builders**: generate deterministic numeric test data
//! - **Debug utilities**: render partitionings and transitions as text
//! - **Fixtures**: pre-built spaces, groups, and partitionings
//!
//! # Quick Start
//!
//! ```
//! use ispace::testing::*;
//! use ispace::testing::assert_partitioning_covers;
//!
//! let world = blocked_world(4, 100);
//! assert_partitioning_covers(&world.partitioning, &world.space);
//! ```

pub mod assertions;
pub mod builders;
pub mod debug;
pub mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use debug::*;
pub use fixtures::*;
