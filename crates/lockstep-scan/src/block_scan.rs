use lockstep_core::UnitCtx;

use crate::layout::ScanLayout;
use crate::prefix::BlockPrefix;
use crate::storage::ScanStorage;

/// Block-wide prefix scan using the reduce-then-scan shape.
///
/// The block writes one value per unit into shared scratch, a single plane
/// folds and scans the per-lane partial reductions through a register
/// exchange, then re-expands the scanned partials back through the scratch
/// slots. Work is `O(BLOCK_SIZE)` with exactly two block barriers per call,
/// independent of the number of items each unit contributes.
///
/// `BLOCK_SIZE` is the number of cooperating units and must match the
/// launched block exactly; `PLANE_WIDTH` is the hardware plane width the
/// scratch layout is tuned for and `BANKS` the shared-memory bank count used
/// to derive conflict-free padding. Invalid configurations (a zero block,
/// a non-power-of-two plane width) fail to compile.
///
/// The engine is `Sync`: construct it on the host, share it with the kernel
/// closure by reference, and call its operations from every unit of the
/// block. All operations are barrier-uniform — every unit must make the
/// same call with its own input. Scratch is reused across calls; a block
/// must [`sync_units`](UnitCtx::sync_units) between two calls on the same
/// engine.
///
/// ```
/// use lockstep_core::{BlockDim, BlockLauncher};
/// use lockstep_scan::BlockScan;
///
/// let scan = BlockScan::<u32, 4>::new();
/// let launcher = BlockLauncher::new(BlockDim::new_1d(4));
/// let out = launcher
///     .launch(|ctx| {
///         let input = ctx.unit_pos() + 1;
///         scan.inclusive_scan(ctx, input, |a, b| a + b)
///     })
///     .unwrap();
/// assert_eq!(out, vec![1, 3, 6, 10]);
/// ```
pub struct BlockScan<T, const BLOCK_SIZE: u32, const PLANE_WIDTH: u32 = 32, const BANKS: u32 = 32>
{
    storage: ScanStorage<T, BLOCK_SIZE, PLANE_WIDTH, BANKS>,
}

impl<T, const BLOCK_SIZE: u32, const PLANE_WIDTH: u32, const BANKS: u32>
    BlockScan<T, BLOCK_SIZE, PLANE_WIDTH, BANKS>
where
    T: Copy + Send + Sync,
{
    const LAYOUT: ScanLayout = ScanLayout::derive(BLOCK_SIZE, PLANE_WIDTH, BANKS);

    /// An engine with internally allocated scratch, reused across calls.
    pub fn new() -> Self {
        Self {
            storage: ScanStorage::new(),
        }
    }

    /// An engine over caller-owned scratch.
    pub fn with_storage(storage: ScanStorage<T, BLOCK_SIZE, PLANE_WIDTH, BANKS>) -> Self {
        Self { storage }
    }

    /// Releases the scratch for reuse elsewhere.
    pub fn into_storage(self) -> ScanStorage<T, BLOCK_SIZE, PLANE_WIDTH, BANKS> {
        self.storage
    }

    // ---------------------------------------------------------------------
    // Scalar operations
    // ---------------------------------------------------------------------

    /// Inclusive scan of one value per unit.
    pub fn inclusive_scan<F>(&self, ctx: &UnitCtx, input: T, op: F) -> T
    where
        F: Fn(T, T) -> T,
    {
        self.inclusive_scan_base(ctx, input, &op);
        unsafe { self.slot(ctx.unit_pos()) }
    }

    /// Inclusive scan of one value per unit; also returns the block-wide
    /// reduction to every unit.
    pub fn inclusive_scan_with_reduction<F>(&self, ctx: &UnitCtx, input: T, op: F) -> (T, T)
    where
        F: Fn(T, T) -> T,
    {
        self.inclusive_scan_base(ctx, input, &op);
        let output = unsafe { self.slot(ctx.unit_pos()) };
        let reduction = unsafe { self.slot(BLOCK_SIZE - 1) };
        (output, reduction)
    }

    /// Inclusive scan of one value per unit, offset by a prefix obtained
    /// from `prefix` exactly once for the whole block.
    pub fn inclusive_scan_with_prefix<F, P>(
        &self,
        ctx: &UnitCtx,
        input: T,
        prefix: &mut P,
        op: F,
    ) -> T
    where
        F: Fn(T, T) -> T,
        P: BlockPrefix<T>,
    {
        self.inclusive_scan_base(ctx, input, &op);
        let output = unsafe { self.slot(ctx.unit_pos()) };
        let reduction = unsafe { self.slot(BLOCK_SIZE - 1) };
        let block_prefix = self.block_prefix(ctx, reduction, prefix);
        op(block_prefix, output)
    }

    /// Exclusive scan of one value per unit. Unit 0 emits `init`; every
    /// other unit emits `init` folded with the inclusive result of the
    /// previous unit.
    pub fn exclusive_scan<F>(&self, ctx: &UnitCtx, input: T, init: T, op: F) -> T
    where
        F: Fn(T, T) -> T,
    {
        self.inclusive_scan_base(ctx, input, &op);
        match self.previous_slot(ctx) {
            Some(previous) => op(init, previous),
            None => init,
        }
    }

    /// Exclusive scan of one value per unit; also returns the block-wide
    /// reduction (which does not include `init`) to every unit.
    pub fn exclusive_scan_with_reduction<F>(
        &self,
        ctx: &UnitCtx,
        input: T,
        init: T,
        op: F,
    ) -> (T, T)
    where
        F: Fn(T, T) -> T,
    {
        self.inclusive_scan_base(ctx, input, &op);
        let output = match self.previous_slot(ctx) {
            Some(previous) => op(init, previous),
            None => init,
        };
        let reduction = unsafe { self.slot(BLOCK_SIZE - 1) };
        (output, reduction)
    }

    /// Exclusive scan of one value per unit, seeded by a prefix obtained
    /// from `prefix` exactly once for the whole block. Unit 0 emits the
    /// prefix itself; there is no separate `init`.
    pub fn exclusive_scan_with_prefix<F, P>(
        &self,
        ctx: &UnitCtx,
        input: T,
        prefix: &mut P,
        op: F,
    ) -> T
    where
        F: Fn(T, T) -> T,
        P: BlockPrefix<T>,
    {
        self.inclusive_scan_base(ctx, input, &op);
        let previous = self.previous_slot(ctx);
        let reduction = unsafe { self.slot(BLOCK_SIZE - 1) };
        let block_prefix = self.block_prefix(ctx, reduction, prefix);
        match previous {
            Some(previous) => op(block_prefix, previous),
            None => block_prefix,
        }
    }

    // ---------------------------------------------------------------------
    // Multi-item operations
    // ---------------------------------------------------------------------

    /// Inclusive scan over `ITEMS` ordered values per unit.
    ///
    /// Folds the unit's items into one representative, scans the
    /// representatives, then finishes with a unit-local scan seeded by the
    /// unit's block-exclusive prefix. No extra block barriers.
    pub fn inclusive_scan_items<F, const ITEMS: usize>(
        &self,
        ctx: &UnitCtx,
        input: &[T; ITEMS],
        op: F,
    ) -> [T; ITEMS]
    where
        F: Fn(T, T) -> T,
    {
        const { assert!(ITEMS >= 1, "each unit must contribute at least one item") }
        self.inclusive_scan_base(ctx, Self::fold_items(input, &op), &op);
        let first = match self.previous_slot(ctx) {
            Some(unit_prefix) => op(unit_prefix, input[0]),
            None => input[0],
        };
        Self::local_inclusive(first, input, &op)
    }

    /// Inclusive scan over `ITEMS` values per unit; also returns the
    /// block-wide reduction to every unit.
    pub fn inclusive_scan_items_with_reduction<F, const ITEMS: usize>(
        &self,
        ctx: &UnitCtx,
        input: &[T; ITEMS],
        op: F,
    ) -> ([T; ITEMS], T)
    where
        F: Fn(T, T) -> T,
    {
        const { assert!(ITEMS >= 1, "each unit must contribute at least one item") }
        self.inclusive_scan_base(ctx, Self::fold_items(input, &op), &op);
        let first = match self.previous_slot(ctx) {
            Some(unit_prefix) => op(unit_prefix, input[0]),
            None => input[0],
        };
        let reduction = unsafe { self.slot(BLOCK_SIZE - 1) };
        (Self::local_inclusive(first, input, &op), reduction)
    }

    /// Inclusive scan over `ITEMS` values per unit, offset by a prefix
    /// obtained from `prefix` exactly once for the whole block.
    pub fn inclusive_scan_items_with_prefix<F, P, const ITEMS: usize>(
        &self,
        ctx: &UnitCtx,
        input: &[T; ITEMS],
        prefix: &mut P,
        op: F,
    ) -> [T; ITEMS]
    where
        F: Fn(T, T) -> T,
        P: BlockPrefix<T>,
    {
        const { assert!(ITEMS >= 1, "each unit must contribute at least one item") }
        self.inclusive_scan_base(ctx, Self::fold_items(input, &op), &op);
        let unit_prefix = self.previous_slot(ctx);
        let reduction = unsafe { self.slot(BLOCK_SIZE - 1) };
        let block_prefix = self.block_prefix(ctx, reduction, prefix);
        let first = match unit_prefix {
            Some(unit_prefix) => op(unit_prefix, input[0]),
            None => input[0],
        };
        Self::local_inclusive(op(block_prefix, first), input, &op)
    }

    /// Exclusive scan over `ITEMS` ordered values per unit, seeded with
    /// `init`.
    pub fn exclusive_scan_items<F, const ITEMS: usize>(
        &self,
        ctx: &UnitCtx,
        input: &[T; ITEMS],
        init: T,
        op: F,
    ) -> [T; ITEMS]
    where
        F: Fn(T, T) -> T,
    {
        const { assert!(ITEMS >= 1, "each unit must contribute at least one item") }
        self.inclusive_scan_base(ctx, Self::fold_items(input, &op), &op);
        let first = match self.previous_slot(ctx) {
            Some(previous) => op(init, previous),
            None => init,
        };
        Self::local_exclusive(first, input, &op)
    }

    /// Exclusive scan over `ITEMS` values per unit; also returns the
    /// block-wide reduction (which does not include `init`) to every unit.
    pub fn exclusive_scan_items_with_reduction<F, const ITEMS: usize>(
        &self,
        ctx: &UnitCtx,
        input: &[T; ITEMS],
        init: T,
        op: F,
    ) -> ([T; ITEMS], T)
    where
        F: Fn(T, T) -> T,
    {
        const { assert!(ITEMS >= 1, "each unit must contribute at least one item") }
        self.inclusive_scan_base(ctx, Self::fold_items(input, &op), &op);
        let first = match self.previous_slot(ctx) {
            Some(previous) => op(init, previous),
            None => init,
        };
        let reduction = unsafe { self.slot(BLOCK_SIZE - 1) };
        (Self::local_exclusive(first, input, &op), reduction)
    }

    /// Exclusive scan over `ITEMS` values per unit, seeded by a prefix
    /// obtained from `prefix` exactly once for the whole block. The first
    /// item of unit 0 is the prefix itself.
    pub fn exclusive_scan_items_with_prefix<F, P, const ITEMS: usize>(
        &self,
        ctx: &UnitCtx,
        input: &[T; ITEMS],
        prefix: &mut P,
        op: F,
    ) -> [T; ITEMS]
    where
        F: Fn(T, T) -> T,
        P: BlockPrefix<T>,
    {
        const { assert!(ITEMS >= 1, "each unit must contribute at least one item") }
        self.inclusive_scan_base(ctx, Self::fold_items(input, &op), &op);
        let previous = self.previous_slot(ctx);
        let reduction = unsafe { self.slot(BLOCK_SIZE - 1) };
        let block_prefix = self.block_prefix(ctx, reduction, prefix);
        let first = match previous {
            Some(previous) => op(block_prefix, previous),
            None => block_prefix,
        };
        Self::local_exclusive(first, input, &op)
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    /// Computes the block-wide inclusive scan into the scratch slots:
    /// `slot(index(n))` holds the inclusive result of flat position `n`
    /// once this returns. Two block barriers.
    fn inclusive_scan_base<F>(&self, ctx: &UnitCtx, input: T, op: &F)
    where
        F: Fn(T, T) -> T,
    {
        let layout = Self::LAYOUT;
        let unit = ctx.unit_pos();
        let scratch = &self.storage.units;

        debug_assert_eq!(ctx.block_dim().num_units(), BLOCK_SIZE);

        // Safety: phase 1 gives each slot exactly one writer; in phase 2
        // each scanning lane touches only its own contiguous run of slots,
        // and the surrounding barriers order the cross-unit reads.
        unsafe {
            scratch.write(layout.index(unit), input);
            ctx.sync_units();

            if unit < layout.plane_size {
                let base = unit * layout.unit_reduction;

                // Serial fold of this lane's run of slots.
                let mut partial = scratch.read(layout.index(base));
                for i in 1..layout.unit_reduction {
                    partial = op(partial, scratch.read(layout.index(base + i)));
                }

                // Exclusive plane prefix: inclusive scan over the lane
                // partials, shifted down by one lane. Lane 0 has no prefix
                // and restarts from its own input.
                let scanned = self.storage.exchange.inclusive_scan(unit, partial, op);
                let shifted = self.storage.exchange.shuffle_up(unit, scanned, 1);

                let mut running = if unit == 0 {
                    input
                } else {
                    op(shifted, scratch.read(layout.index(base)))
                };
                scratch.write(layout.index(base), running);
                for i in 1..layout.unit_reduction {
                    running = op(running, scratch.read(layout.index(base + i)));
                    scratch.write(layout.index(base + i), running);
                }
            }
            ctx.sync_units();
        }
    }

    /// Obtains the block prefix from the callback and distributes it.
    ///
    /// Lane 0 of plane 0 invokes the callback with the block reduction and
    /// parks the result in scratch slot 0, which holds no live data at this
    /// point. The leading barrier is simulation-specific: free-running CPU
    /// threads lack the plane-lockstep ordering that lets the hardware
    /// version overwrite slot 0 while its last readers are mid-instruction.
    fn block_prefix<P>(&self, ctx: &UnitCtx, reduction: T, prefix: &mut P) -> T
    where
        P: BlockPrefix<T>,
    {
        let scratch = &self.storage.units;
        ctx.sync_units();
        if ctx.unit_pos() == 0 {
            let value = prefix.block_prefix(reduction);
            // Safety: sole writer of slot 0 between the two barriers.
            unsafe { scratch.write(0, value) };
        }
        ctx.sync_units();
        unsafe { scratch.read(0) }
    }

    /// Reads the inclusive result stored for flat position `n`.
    ///
    /// # Safety
    ///
    /// Only valid after `inclusive_scan_base` and before anything overwrites
    /// the scratch.
    unsafe fn slot(&self, n: u32) -> T {
        unsafe { self.storage.units.read(Self::LAYOUT.index(n)) }
    }

    /// The inclusive result of the previous flat position, or `None` for
    /// unit 0. Requires no barrier: the previous result was stored before
    /// the final barrier of the base scan.
    fn previous_slot(&self, ctx: &UnitCtx) -> Option<T> {
        let unit = ctx.unit_pos();
        (unit > 0).then(|| unsafe { self.slot(unit - 1) })
    }

    fn fold_items<F, const ITEMS: usize>(input: &[T; ITEMS], op: &F) -> T
    where
        F: Fn(T, T) -> T,
    {
        let mut folded = input[0];
        for item in &input[1..] {
            folded = op(folded, *item);
        }
        folded
    }

    /// Unit-local inclusive scan with the first output already combined.
    fn local_inclusive<F, const ITEMS: usize>(first: T, input: &[T; ITEMS], op: &F) -> [T; ITEMS]
    where
        F: Fn(T, T) -> T,
    {
        let mut output = [first; ITEMS];
        for i in 1..ITEMS {
            output[i] = op(output[i - 1], input[i]);
        }
        output
    }

    /// Unit-local exclusive scan seeded with `first`.
    fn local_exclusive<F, const ITEMS: usize>(first: T, input: &[T; ITEMS], op: &F) -> [T; ITEMS]
    where
        F: Fn(T, T) -> T,
    {
        let mut output = [first; ITEMS];
        let mut exclusive = first;
        let mut previous = input[0];
        for i in 1..ITEMS {
            exclusive = op(exclusive, previous);
            previous = input[i];
            output[i] = exclusive;
        }
        output
    }
}

impl<T, const BLOCK_SIZE: u32, const PLANE_WIDTH: u32, const BANKS: u32> Default
    for BlockScan<T, BLOCK_SIZE, PLANE_WIDTH, BANKS>
where
    T: Copy + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}
