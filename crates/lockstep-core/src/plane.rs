use std::sync::Barrier;

use crate::SharedArray;

/// Lane-to-lane exchange within one plane of cooperating units.
///
/// On hardware this is a register shuffle: lanes of a plane trade values
/// directly, with no shared memory and no group barrier. The simulation
/// uses a lane slot per participant and a plane-scoped barrier, so the
/// block-wide barrier is never involved.
///
/// The width must be a power of two, and every one of the `width`
/// participating lanes must call each operation — the exchange itself is
/// uniform, only what a lane does with the result may diverge.
pub struct PlaneExchange<T> {
    width: u32,
    lanes: SharedArray<T>,
    barrier: Barrier,
}

impl<T: Copy + Send + Sync> PlaneExchange<T> {
    /// An exchange for a plane of `width` lanes.
    ///
    /// # Panics
    ///
    /// Panics if `width` is not a power of two.
    pub fn new(width: u32) -> Self {
        assert!(
            width.is_power_of_two(),
            "plane width {width} is not a power of two"
        );
        Self {
            width,
            lanes: SharedArray::new(width),
            barrier: Barrier::new(width as usize),
        }
    }

    /// The number of lanes in the plane.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The value held by lane `lane - delta`, or the lane's own value when
    /// the source lane would fall off the low end of the plane.
    pub fn shuffle_up(&self, lane: u32, value: T, delta: u32) -> T {
        // Safety: each lane writes only its own slot; reads happen after the
        // plane barrier, and the trailing barrier keeps the next call's
        // writes from racing with this call's reads.
        unsafe {
            self.lanes.write(lane, value);
            self.barrier.wait();
            let result = if lane >= delta {
                self.lanes.read(lane - delta)
            } else {
                value
            };
            self.barrier.wait();
            result
        }
    }

    /// The value held by lane `src`, returned to every lane.
    pub fn broadcast(&self, lane: u32, value: T, src: u32) -> T {
        unsafe {
            self.lanes.write(lane, value);
            self.barrier.wait();
            let result = self.lanes.read(src);
            self.barrier.wait();
            result
        }
    }

    /// Inclusive scan of one value per lane with an associative operator.
    ///
    /// Hillis-Steele over shuffles: log2(width) rounds, each lane folding in
    /// the value `delta` lanes below once `delta` no longer reaches past
    /// lane 0. Every lane participates in every round; only the fold is
    /// guarded by the lane position.
    pub fn inclusive_scan(&self, lane: u32, value: T, op: impl Fn(T, T) -> T) -> T {
        let mut acc = value;
        let mut delta = 1;
        while delta < self.width {
            let below = self.shuffle_up(lane, acc, delta);
            if lane >= delta {
                acc = op(below, acc);
            }
            delta <<= 1;
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BlockDim, BlockLauncher};

    fn run_plane<R: Send>(
        width: u32,
        kernel: impl Fn(&PlaneExchange<u32>, u32) -> R + Sync,
    ) -> Vec<R> {
        let exchange = PlaneExchange::<u32>::new(width);
        BlockLauncher::new(BlockDim::new_1d(width))
            .launch(|ctx| kernel(&exchange, ctx.unit_pos()))
            .unwrap()
    }

    #[test]
    fn shuffle_up_shifts_by_delta() {
        let out = run_plane(8, |exchange, lane| exchange.shuffle_up(lane, lane * 2, 3));
        for (lane, value) in out.into_iter().enumerate() {
            let lane = lane as u32;
            let expected = if lane >= 3 { (lane - 3) * 2 } else { lane * 2 };
            assert_eq!(value, expected);
        }
    }

    #[test]
    fn broadcast_reads_the_source_lane() {
        let out = run_plane(16, |exchange, lane| exchange.broadcast(lane, lane + 100, 5));
        assert_eq!(out, vec![105; 16]);
    }

    #[test]
    fn inclusive_scan_matches_prefix_sums() {
        let out = run_plane(32, |exchange, lane| {
            exchange.inclusive_scan(lane, lane + 1, |a, b| a + b)
        });
        for (lane, value) in out.into_iter().enumerate() {
            let n = lane as u32 + 1;
            assert_eq!(value, n * (n + 1) / 2);
        }
    }

    #[test]
    fn single_lane_plane_is_a_no_op() {
        let out = run_plane(1, |exchange, lane| {
            exchange.inclusive_scan(lane, 7, |a, b| a + b)
        });
        assert_eq!(out, vec![7]);
    }

    #[test]
    #[should_panic(expected = "not a power of two")]
    fn non_power_of_two_width_panics() {
        let _ = PlaneExchange::<u32>::new(12);
    }
}
