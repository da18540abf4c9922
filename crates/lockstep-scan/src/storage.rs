use lockstep_core::{PlaneExchange, SharedArray};

use crate::layout::ScanLayout;

/// Shared scratch for one [`BlockScan`](crate::BlockScan) configuration.
///
/// Holds the padded per-unit slot arena and the plane exchange used to scan
/// the per-lane partial reductions. The arena is written and read only
/// between the barriers of a scan call; it is logically dead afterwards and
/// may be reused by the next call once the block has synchronized.
pub struct ScanStorage<T, const BLOCK_SIZE: u32, const PLANE_WIDTH: u32 = 32, const BANKS: u32 = 32>
{
    pub(crate) units: SharedArray<T>,
    pub(crate) exchange: PlaneExchange<T>,
}

impl<T, const BLOCK_SIZE: u32, const PLANE_WIDTH: u32, const BANKS: u32>
    ScanStorage<T, BLOCK_SIZE, PLANE_WIDTH, BANKS>
where
    T: Copy + Send + Sync,
{
    pub(crate) const LAYOUT: ScanLayout = ScanLayout::derive(BLOCK_SIZE, PLANE_WIDTH, BANKS);

    /// Allocates scratch sized for the block configuration.
    pub fn new() -> Self {
        let layout = Self::LAYOUT;
        Self {
            units: SharedArray::new(layout.storage_len()),
            exchange: PlaneExchange::new(layout.plane_size),
        }
    }
}

impl<T, const BLOCK_SIZE: u32, const PLANE_WIDTH: u32, const BANKS: u32> Default
    for ScanStorage<T, BLOCK_SIZE, PLANE_WIDTH, BANKS>
where
    T: Copy + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}
