/// Callback supplying the prefix folded into a block-wide scan.
///
/// The engine invokes the callback exactly once per scan call, on lane 0 of
/// plane 0, with the block-wide reduction; the returned prefix is combined
/// into every unit's result. This is the hook multi-block scans use to
/// serialize a running prefix block by block without device-wide atomics.
pub trait BlockPrefix<T> {
    /// Returns the prefix for the whole block, given its total reduction.
    fn block_prefix(&mut self, reduction: T) -> T;
}

impl<T, F: FnMut(T) -> T> BlockPrefix<T> for F {
    fn block_prefix(&mut self, reduction: T) -> T {
        self(reduction)
    }
}

/// A [`BlockPrefix`] carrying a running total across consecutive scans.
///
/// Each invocation returns the total accumulated so far and then folds the
/// new reduction into it. Every unit owns its own instance, but only lane 0
/// of plane 0 is ever invoked, so only that unit's total advances — which is
/// exactly the unit whose value the engine distributes.
pub struct RunningTotal<T, F> {
    total: T,
    op: F,
}

impl<T: Copy, F: Fn(T, T) -> T> RunningTotal<T, F> {
    /// Starts the running total at `init`.
    pub fn new(init: T, op: F) -> Self {
        Self { total: init, op }
    }

    /// The total accumulated so far.
    pub fn total(&self) -> T {
        self.total
    }
}

impl<T: Copy, F: Fn(T, T) -> T> BlockPrefix<T> for RunningTotal<T, F> {
    fn block_prefix(&mut self, reduction: T) -> T {
        let prefix = self.total;
        self.total = (self.op)(prefix, reduction);
        prefix
    }
}
