//! Block-level prefix scan for a cooperative lockstep block.
//!
//! Implements the reduce-then-scan shape over the execution model of
//! [`lockstep_core`]: every unit contributes one value (or a fixed array of
//! values), and the block cooperatively computes the inclusive or exclusive
//! prefix scan under any associative operator — associativity is required,
//! commutativity is not.
//!
//! The engine uses a bounded shared scratch arena with bank-conflict-free
//! padding, a single plane's register exchange for the inter-lane scan of
//! partial reductions, and exactly two block barriers per call. An optional
//! [`BlockPrefix`] callback folds an externally supplied running prefix into
//! the whole block's result, which is how multi-block scans chain one block
//! after another.
//!
//! All configuration (`BLOCK_SIZE`, plane width, bank count) is resolved at
//! compile time; a configuration the layout cannot support fails to build.
//! There is no runtime validation in the scan path itself: calling the
//! engine from a block whose size does not match `BLOCK_SIZE`, or skipping
//! a barrier-uniform call on some units, is a correctness bug that shows up
//! as a deadlock or stale data, matching the contract of the hardware
//! primitive this models.

mod block_scan;
mod layout;
mod prefix;
mod storage;

pub use block_scan::BlockScan;
pub use prefix::{BlockPrefix, RunningTotal};
pub use storage::ScanStorage;
