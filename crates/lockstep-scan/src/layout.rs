//! Compile-time layout derivation for the reduce-then-scan engine.
//!
//! Everything here is `const`: an invalid configuration fails when the
//! engine's layout constant is evaluated, not at runtime.

/// Derived scratch layout for one block configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScanLayout {
    /// Number of units in the block.
    pub block_size: u32,
    /// Width of the plane that scans the per-lane partial reductions.
    /// Always a power of two that divides `block_size` evenly.
    pub plane_size: u32,
    /// Number of contiguous scratch slots each scanning lane folds.
    pub unit_reduction: u32,
    /// Number of scratch banks the padding stride is derived from.
    pub banks: u32,
    /// Extra slots inserted to break up bank-aligned access patterns.
    pub padding: u32,
}

impl ScanLayout {
    /// Derives the layout for a block of `block_size` units on hardware with
    /// the given plane width and bank count.
    pub const fn derive(block_size: u32, plane_width: u32, banks: u32) -> Self {
        assert!(block_size >= 1, "block size must be at least 1");
        assert!(
            plane_width.is_power_of_two(),
            "plane width must be a power of two"
        );
        assert!(banks >= 1, "bank count must be at least 1");

        // Largest power of two <= the hardware plane width that tiles the
        // block evenly. Falls back to 1 (a serial fold) when the block size
        // has no larger power-of-two divisor.
        let mut plane_size = plane_width;
        while plane_size > 1 && block_size % plane_size != 0 {
            plane_size /= 2;
        }

        let unit_reduction = block_size / plane_size;

        // Bank conflicts only arise when the per-lane stride is a
        // power-of-two multiple of the slot size.
        let has_conflicts = unit_reduction.is_power_of_two() && unit_reduction > 1;
        let padding = if has_conflicts { block_size / banks } else { 0 };

        Self {
            block_size,
            plane_size,
            unit_reduction,
            banks,
            padding,
        }
    }

    /// Total number of scratch slots, padding included.
    pub const fn storage_len(&self) -> u32 {
        self.block_size + self.padding
    }

    /// Bank-conflict-avoidance index mapping: shifts every `banks`-wide row
    /// of slots by one when padding is active.
    #[inline]
    pub const fn index(&self, n: u32) -> u32 {
        if self.padding != 0 { n + n / self.banks } else { n }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_size_is_the_largest_power_of_two_divisor() {
        assert_eq!(ScanLayout::derive(256, 32, 32).plane_size, 32);
        assert_eq!(ScanLayout::derive(64, 32, 32).plane_size, 32);
        assert_eq!(ScanLayout::derive(48, 32, 32).plane_size, 16);
        assert_eq!(ScanLayout::derive(24, 32, 32).plane_size, 8);
        assert_eq!(ScanLayout::derive(4, 32, 32).plane_size, 4);
        assert_eq!(ScanLayout::derive(7, 32, 32).plane_size, 1);
        assert_eq!(ScanLayout::derive(1, 32, 32).plane_size, 1);
    }

    #[test]
    fn plane_size_always_tiles_the_block() {
        for block_size in 1..300 {
            let layout = ScanLayout::derive(block_size, 32, 32);
            assert!(layout.plane_size.is_power_of_two());
            assert_eq!(layout.plane_size * layout.unit_reduction, block_size);
        }
    }

    #[test]
    fn padding_only_for_power_of_two_reductions() {
        // 256 units / 32 lanes => 8 slots per lane: padded.
        let padded = ScanLayout::derive(256, 32, 32);
        assert_eq!(padded.unit_reduction, 8);
        assert_eq!(padded.padding, 256 / 32);
        assert_eq!(padded.storage_len(), 256 + 8);

        // 48 units / 16 lanes => 3 slots per lane: no padding.
        let unpadded = ScanLayout::derive(48, 32, 32);
        assert_eq!(unpadded.unit_reduction, 3);
        assert_eq!(unpadded.padding, 0);

        // One slot per lane: no padding.
        assert_eq!(ScanLayout::derive(32, 32, 32).padding, 0);
    }

    #[test]
    fn index_mapping_shifts_every_bank_row() {
        let layout = ScanLayout::derive(256, 32, 32);
        assert_eq!(layout.index(0), 0);
        assert_eq!(layout.index(31), 31);
        assert_eq!(layout.index(32), 33);
        assert_eq!(layout.index(255), 255 + 7);
        assert!(layout.index(255) < layout.storage_len());

        let unpadded = ScanLayout::derive(32, 32, 32);
        assert_eq!(unpadded.index(31), 31);
    }

    #[test]
    fn index_mapping_is_injective() {
        let layout = ScanLayout::derive(128, 32, 32);
        let mut seen = vec![false; layout.storage_len() as usize];
        for n in 0..layout.block_size {
            let mapped = layout.index(n) as usize;
            assert!(!seen[mapped]);
            seen[mapped] = true;
        }
    }
}
