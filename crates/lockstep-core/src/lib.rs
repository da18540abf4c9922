//! Cooperative lockstep block execution on CPU threads.
//!
//! This crate simulates the execution model of a GPU thread block: a fixed
//! set of symmetric units all run the same kernel closure, synchronize with
//! a full-group barrier, and exchange register values within power-of-two
//! sized planes (warps / subgroups) without going through shared memory.
//!
//! The three building blocks are:
//!
//! - [`BlockLauncher`] / [`UnitCtx`] — spawns exactly `BlockDim::num_units()`
//!   worker threads and gives each its identity (flat position, plane
//!   position, lane position) plus the group barrier.
//! - [`SharedArray`] — a block-shared scratch arena with no locks; callers
//!   uphold the write→barrier→read ordering discipline.
//! - [`PlaneExchange`] — lane-to-lane shuffle and inclusive scan within one
//!   plane, synchronizing only the participating lanes.
//!
//! Kernels must be barrier-uniform: every unit of the block has to reach
//! every [`UnitCtx::sync_units`] call. A barrier reached by only part of the
//! block deadlocks, exactly like a divergent `__syncthreads`.

pub mod dim;
pub mod error;
pub mod launch;
pub mod plane;
pub mod shared;

pub use dim::BlockDim;
pub use error::LaunchError;
pub use launch::{BlockLauncher, UnitCtx, DEFAULT_PLANE_DIM, MAX_UNITS};
pub use plane::PlaneExchange;
pub use shared::SharedArray;
