//! # ispace
//!
//! A **runtime for index-space partitioned distributed containers**,
//! modeled on the repartitioning core of LAIK: describe the iteration
//! space your data lives in, describe how it should be split across a
//! group of processes, and let the runtime figure out the send/recv/reduce
//! plan to move a container from one partitioning to another.
//!
//! ## Key Features
//!
//! - **Index spaces** - 1-, 2-, and 3-dimensional half-open ranges
//! - **Partitioners** - `All`, `Master`, `Single`, `Block` (with optional
//!   cyclic and weighted variants), `Bisection`, `Halo`, `Reassign`
//! - **Transition planning** - diff two partitionings into a typed
//!   sequence of fills, reductions, sends, and receives
//! - **Reductions** - `Sum`, `Min`, `Max`, `Prod`, `And`, `Or` over
//!   `i32`/`i64`/`u32`/`u64`/`f32`/`f64`
//! - **Reservations** - preallocate backing storage across every tag a
//!   container will ever be partitioned with
//! - **Elastic groups** - shrink a process group after a fault and
//!   reassign its survivors' data with [`partitioner::Reassign`]
//! - **Pluggable backend** - an in-process [`backend::local::LocalBackend`]
//!   for tests and small demos, built against the same [`backend::Backend`]
//!   trait a real network transport would implement
//!
//! ## Quick Start
//!
//! ```
//! use ispace::backend::local::LocalBackend;
//! use ispace::container::Container;
//! use ispace::group::ProcessGroup;
//! use ispace::partitioner::Block;
//! use ispace::partitioning::Partitioning;
//! use ispace::range::IndexSpace;
//! use ispace::reduce::{Flow, ReductionOp};
//!
//! # fn main() -> anyhow::Result<()> {
//! let group = ProcessGroup::world(1, 0);
//! let mut transport = LocalBackend::world(1).remove(0);
//!
//! let space = IndexSpace::new("elements", &[1000])?;
//! let blocked = Partitioning::build("blocked", &space, &group, &Block::new(0), None);
//!
//! let mut data: Container<f64> = Container::new(space, group);
//! let backend = transport.clone();
//! data.switch_to(&blocked, Flow::Init, ReductionOp::None, &backend, &mut transport)?;
//!
//! let my_slices: Vec<_> = data.partitioning().slices().iter().cloned().collect();
//! for slice in my_slices {
//!     if let Some(mapping) = data.get_map_mut(slice.map_no) {
//!         for idx in slice.range.iter_indices() {
//!             mapping.set(&idx, idx[0] as f64);
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### `IndexSpace` and `Range`
//!
//! An [`range::IndexSpace`] is the N-dimensional extent a container's
//! indices live in; a [`range::Range`] is a half-open `[from, to)`
//! sub-rectangle of one. Every partitioner ultimately hands back a set of
//! `Range`s, one or more per process.
//!
//! ### `Partitioner` and `Partitioning`
//!
//! A [`partitioner::Partitioner`] is a strategy (`Block`, `Bisection`,
//! `Halo`, ...); a [`partitioning::Partitioning`] is what you get from
//! running one over a space and [`group::ProcessGroup`] — a concrete,
//! sorted assignment of ranges to processes, cached rather than
//! recomputed.
//!
//! ### `Container`
//!
//! A [`container::Container<T>`] owns one process's share of a typed
//! backing array. [`container::Container::switch_to`] is the core
//! operation: given a new partitioning and a `(Flow, ReductionOp)`, it
//! diffs the current and target partitionings via [`planner::plan_transition`],
//! builds an [`action::ActionSequence`], and executes it against a
//! [`backend::Transport`].
//!
//! ### `Instance`
//!
//! [`instance::Instance`] ties a [`group::ProcessGroup`], a backend, a
//! [`log::Logger`], and a [`kv::KvStore`] together behind the arena-style
//! API external callers actually drive: `new_space`, `new_partitioning`,
//! `new_reservation`, `calc_transition`, `calc_actions`, `exec_actions`,
//! `allow_world_resize`, `finalize`.
//!
//! ## Non-goals
//!
//! This crate plans and executes transitions; it does not ship a real
//! network transport, a work-stealing scheduler, or GPU-resident storage.
//! See `DESIGN.md` for what was deliberately left out and why.

pub mod action;
pub mod backend;
pub mod container;
pub mod error;
pub mod group;
pub mod handle;
pub mod instance;
pub mod kv;
pub mod log;
pub mod partitioner;
pub mod partitioning;
pub mod planner;
pub mod range;
pub mod reduce;
pub mod reservation;
pub mod testing;
pub mod utils;

pub use action::{Action, ActionSequence, TransitionId};
pub use container::Container;
pub use error::{Error, Result};
pub use group::ProcessGroup;
pub use handle::{GroupId, PartitioningId, ReservationHandle, ReservationId, SpaceId};
pub use instance::Instance;
pub use partitioner::{OverlapPolicy, Partitioner, TaskSlice};
pub use partitioning::Partitioning;
pub use planner::Transition;
pub use range::{IndexSpace, Range};
pub use reduce::{Elem, Flow, ReductionOp};
pub use utils::OrdF64;
