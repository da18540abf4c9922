use std::sync::Barrier;
use std::thread;

use crate::{BlockDim, LaunchError};

/// Per-block unit limit, mirroring the usual hardware cap.
pub const MAX_UNITS: u32 = 1024;

/// Default simulated hardware plane (subgroup) width.
pub const DEFAULT_PLANE_DIM: u32 = 32;

/// Runs a kernel closure cooperatively over every unit of a block.
///
/// Exactly [`BlockDim::num_units`] worker threads execute the same closure,
/// synchronized through [`UnitCtx::sync_units`]: no unit passes a barrier
/// until all units have arrived. The kernel must make every unit execute
/// the same sequence of barriers; divergent barriers deadlock rather than
/// fail, the same way a divergent group barrier hangs on hardware.
pub struct BlockLauncher {
    dim: BlockDim,
    plane_dim: u32,
}

impl BlockLauncher {
    /// A launcher for a block of the given dimension, using the default
    /// plane width.
    pub fn new(dim: BlockDim) -> Self {
        Self {
            dim,
            plane_dim: DEFAULT_PLANE_DIM,
        }
    }

    /// Overrides the simulated hardware plane width. Must be a power of
    /// two.
    pub fn with_plane_dim(mut self, plane_dim: u32) -> Self {
        self.plane_dim = plane_dim;
        self
    }

    /// The block dimension this launcher was configured with.
    pub fn dim(&self) -> BlockDim {
        self.dim
    }

    fn validate(&self) -> Result<u32, LaunchError> {
        let units = self.dim.num_units();
        if units == 0 {
            return Err(LaunchError::EmptyBlock {
                x: self.dim.x,
                y: self.dim.y,
                z: self.dim.z,
            });
        }
        if units > MAX_UNITS {
            return Err(LaunchError::BlockTooLarge {
                units,
                max: MAX_UNITS,
            });
        }
        if !self.plane_dim.is_power_of_two() {
            return Err(LaunchError::InvalidPlaneDim(self.plane_dim));
        }
        Ok(units)
    }

    /// Launches the kernel and returns every unit's result in flat-position
    /// order.
    ///
    /// The launch blocks the calling thread until the whole block has run to
    /// completion; there is no cancellation. Panicking units are reported as
    /// [`LaunchError::UnitPanicked`] with the lowest panicked position once
    /// the remaining units finish, but a panic between two barriers that
    /// other units still wait on deadlocks the block instead.
    pub fn launch<R, F>(&self, kernel: F) -> Result<Vec<R>, LaunchError>
    where
        R: Send,
        F: Fn(&UnitCtx) -> R + Sync,
    {
        let units = self.validate()?;
        log::debug!(
            "launching block {}x{}x{} ({units} units, plane_dim = {})",
            self.dim.x,
            self.dim.y,
            self.dim.z,
            self.plane_dim
        );

        let barrier = Barrier::new(units as usize);
        thread::scope(|scope| {
            let handles: Vec<_> = (0..units)
                .map(|unit_pos| {
                    let kernel = &kernel;
                    let ctx = UnitCtx {
                        unit_pos,
                        dim: self.dim,
                        plane_dim: self.plane_dim,
                        barrier: &barrier,
                    };
                    scope.spawn(move || kernel(&ctx))
                })
                .collect();
            // Join every handle before folding into a single result: a
            // handle dropped unjoined would make the scope re-raise its
            // panic instead of letting it surface as a launch error.
            let results: Vec<_> = handles
                .into_iter()
                .enumerate()
                .map(|(unit, handle)| {
                    handle
                        .join()
                        .map_err(|_| LaunchError::UnitPanicked(unit as u32))
                })
                .collect();
            results.into_iter().collect()
        })
    }
}

/// A unit's view of its cooperative block: identity plus the group barrier.
pub struct UnitCtx<'scope> {
    unit_pos: u32,
    dim: BlockDim,
    plane_dim: u32,
    barrier: &'scope Barrier,
}

impl UnitCtx<'_> {
    /// Flat position of this unit within the block.
    pub fn unit_pos(&self) -> u32 {
        self.unit_pos
    }

    /// Position of this unit's plane within the block.
    pub fn plane_pos(&self) -> u32 {
        self.unit_pos / self.plane_dim
    }

    /// Position of this unit within its plane.
    pub fn unit_pos_plane(&self) -> u32 {
        self.unit_pos % self.plane_dim
    }

    /// The simulated hardware plane width.
    pub fn plane_dim(&self) -> u32 {
        self.plane_dim
    }

    /// The dimension of the block this unit belongs to.
    pub fn block_dim(&self) -> BlockDim {
        self.dim
    }

    /// Full-group barrier with memory-fence semantics.
    ///
    /// Suspends this unit until every unit of the block has arrived. All
    /// shared writes made before the barrier are visible to every unit
    /// afterwards.
    pub fn sync_units(&self) {
        self.barrier.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_come_back_in_flat_order() {
        let launcher = BlockLauncher::new(BlockDim::new_1d(64));
        let out = launcher.launch(|ctx| ctx.unit_pos()).unwrap();
        assert_eq!(out, (0..64).collect::<Vec<_>>());
    }

    #[test]
    fn plane_identity_follows_the_launch_width() {
        let launcher = BlockLauncher::new(BlockDim::new_1d(16)).with_plane_dim(4);
        let out = launcher
            .launch(|ctx| (ctx.plane_pos(), ctx.unit_pos_plane()))
            .unwrap();
        assert_eq!(out[0], (0, 0));
        assert_eq!(out[5], (1, 1));
        assert_eq!(out[15], (3, 3));
    }

    #[test]
    fn empty_block_is_rejected() {
        let launcher = BlockLauncher::new(BlockDim::new_2d(8, 0));
        let err = launcher.launch(|_| ()).unwrap_err();
        assert_eq!(err, LaunchError::EmptyBlock { x: 8, y: 0, z: 1 });
    }

    #[test]
    fn oversized_block_is_rejected() {
        let launcher = BlockLauncher::new(BlockDim::new_2d(64, 64));
        let err = launcher.launch(|_| ()).unwrap_err();
        assert_eq!(
            err,
            LaunchError::BlockTooLarge {
                units: 4096,
                max: MAX_UNITS
            }
        );
    }

    #[test]
    fn non_power_of_two_plane_dim_is_rejected() {
        let launcher = BlockLauncher::new(BlockDim::new_1d(8)).with_plane_dim(6);
        let err = launcher.launch(|_| ()).unwrap_err();
        assert_eq!(err, LaunchError::InvalidPlaneDim(6));
    }

    #[test]
    fn panicking_unit_is_reported() {
        let launcher = BlockLauncher::new(BlockDim::new_1d(4));
        let err = launcher
            .launch(|ctx| {
                ctx.sync_units();
                if ctx.unit_pos() == 2 {
                    panic!("kernel assertion failed");
                }
                ctx.unit_pos()
            })
            .unwrap_err();
        assert_eq!(err, LaunchError::UnitPanicked(2));
    }

    #[test]
    fn whole_block_panic_still_returns_an_error() {
        // Every unit panics at once; the launch must still come back as an
        // error instead of unwinding through the scope.
        let launcher = BlockLauncher::new(BlockDim::new_1d(4));
        let err = launcher
            .launch(|ctx| -> u32 { panic!("unit {} failed", ctx.unit_pos()) })
            .unwrap_err();
        assert_eq!(err, LaunchError::UnitPanicked(0));
    }

    #[test]
    fn barrier_orders_shared_writes() {
        use crate::SharedArray;

        let n = 32;
        let shared = SharedArray::<u32>::new(n);
        let launcher = BlockLauncher::new(BlockDim::new_1d(n));
        let out = launcher
            .launch(|ctx| {
                let unit = ctx.unit_pos();
                // Safety: one writer per slot, reads after the barrier.
                unsafe {
                    shared.write(unit, unit * 10);
                    ctx.sync_units();
                    shared.read((unit + 1) % n)
                }
            })
            .unwrap();
        for (unit, value) in out.into_iter().enumerate() {
            assert_eq!(value, ((unit as u32 + 1) % n) * 10);
        }
    }
}
