use std::cell::UnsafeCell;
use std::mem::MaybeUninit;

/// A block-shared scratch arena of `T` slots.
///
/// Models GPU shared memory: slots start uninitialized and there are no
/// locks or per-slot atomics. Soundness comes entirely from the callers'
/// write→barrier→read ordering discipline — between two barriers, a slot
/// has at most one writer and is not accessed by any other unit, and the
/// barrier provides the happens-before edge that makes writes visible to
/// subsequent readers.
pub struct SharedArray<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// Safety: concurrent access is delegated to the callers' barrier discipline,
// see the `read`/`write` contracts.
unsafe impl<T: Send> Send for SharedArray<T> {}
unsafe impl<T: Send + Sync> Sync for SharedArray<T> {}

impl<T: Copy> SharedArray<T> {
    /// Allocates `len` uninitialized slots.
    pub fn new(len: u32) -> Self {
        let slots = (0..len)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();
        Self { slots }
    }

    /// The number of slots in the arena.
    pub fn len(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Whether the arena has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Writes `value` into slot `index`.
    ///
    /// # Safety
    ///
    /// No other unit may read or write this slot between the barrier
    /// preceding this write and the next barrier.
    pub unsafe fn write(&self, index: u32, value: T) {
        unsafe { (*self.slots[index as usize].get()).write(value) };
    }

    /// Reads slot `index`.
    ///
    /// # Safety
    ///
    /// The slot must have been written either by this unit or before a
    /// barrier this unit has passed, and no unit may be writing it
    /// concurrently.
    pub unsafe fn read(&self, index: u32) -> T {
        unsafe { (*self.slots[index as usize].get()).assume_init() }
    }
}
