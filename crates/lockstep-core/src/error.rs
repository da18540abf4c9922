use thiserror::Error;

/// An error raised when configuring or running a block launch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LaunchError {
    /// The block dimension contains a zero axis.
    #[error("block dimension {x}x{y}x{z} has no units")]
    EmptyBlock {
        /// The number of units in the x axis.
        x: u32,
        /// The number of units in the y axis.
        y: u32,
        /// The number of units in the z axis.
        z: u32,
    },

    /// The block exceeds the per-block unit limit.
    #[error("block of {units} units exceeds the limit of {max}")]
    BlockTooLarge {
        /// The requested number of units.
        units: u32,
        /// The maximum supported number of units.
        max: u32,
    },

    /// The plane width is not a power of two.
    #[error("plane width {0} is not a power of two")]
    InvalidPlaneDim(u32),

    /// A unit panicked while executing the kernel.
    #[error("unit {0} panicked during the launch")]
    UnitPanicked(u32),
}
