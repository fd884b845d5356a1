//! The `raw` module manages the slot array under a [`crate::Deque`]:
//! where it lives, who owns it, and how elements move in and out of
//! it.  It knows nothing about which slots are live; callers track
//! that with their cursors.
use std::alloc::Layout;
use std::mem::MaybeUninit;
use std::ops::Range;
use std::ptr::NonNull;

use deque_alloc::AllocError;
use deque_alloc::DequeAllocator;

/// Who is responsible for releasing the slot array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Ownership {
    /// The array came from the allocator, and goes back to it on drop.
    Owned,
    /// The array belongs to the caller (e.g., a fixed region).
    Borrowed,
}

/// A [`RawSlots`] is a fixed-size array of possibly uninitialised
/// `T`, plus the allocator that grows it.
///
/// Conceptually, an owned [`RawSlots`] is a `Box<[MaybeUninit<T>]>`
/// from a custom allocator.
pub(crate) struct RawSlots<'a, T, A: DequeAllocator + ?Sized> {
    ptr: NonNull<MaybeUninit<T>>,
    capacity: usize,
    ownership: Ownership,
    alloc: &'a A,
}

impl<'a, T: Copy, A: DequeAllocator + ?Sized> RawSlots<'a, T, A> {
    /// Obtains a fresh array of `capacity` slots from `alloc`.
    pub fn allocate(alloc: &'a A, capacity: usize) -> Result<Self, AllocError> {
        let layout = Self::layout(capacity)?;
        let ptr = alloc.allocate(layout).ok_or(AllocError)?;

        Ok(Self {
            ptr: ptr.cast::<MaybeUninit<T>>(),
            capacity,
            ownership: Ownership::Owned,
            alloc,
        })
    }

    /// Wraps `capacity` slots at `ptr`, which we will never release.
    ///
    /// # Safety
    ///
    /// `ptr` must be aligned for `T` and valid for reads and writes of
    /// `capacity` slots for as long as the [`RawSlots`] lives.
    pub unsafe fn borrowed(alloc: &'a A, ptr: NonNull<MaybeUninit<T>>, capacity: usize) -> Self {
        Self {
            ptr,
            capacity,
            ownership: Ownership::Borrowed,
            alloc,
        }
    }

    fn layout(capacity: usize) -> Result<Layout, AllocError> {
        Layout::array::<MaybeUninit<T>>(capacity).map_err(|_| AllocError)
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline(always)]
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Stores `value` in slot `index`.
    #[inline(always)]
    pub fn write(&mut self, index: usize, value: T) {
        assert!(index < self.capacity);
        // SAFETY: in bounds, and we have exclusive access to the array.
        unsafe { self.ptr.as_ptr().add(index).write(MaybeUninit::new(value)) }
    }

    /// Marks slot `index` as vacant, so nothing stale stays behind it.
    #[inline(always)]
    pub fn vacate(&mut self, index: usize) {
        assert!(index < self.capacity);
        // SAFETY: in bounds, and we have exclusive access to the array.
        unsafe { self.ptr.as_ptr().add(index).write(MaybeUninit::uninit()) }
    }

    /// Returns a copy of the value in slot `index`.
    ///
    /// # Safety
    ///
    /// Slot `index` must have been written since the array was obtained,
    /// and not vacated since.
    #[inline(always)]
    pub unsafe fn read(&self, index: usize) -> T {
        debug_assert!(index < self.capacity);
        // SAFETY: the caller guarantees the slot is in bounds and initialised.
        unsafe { (*self.ptr.as_ptr().add(index)).assume_init() }
    }

    /// Returns the slots in `range` as a slice.
    ///
    /// # Safety
    ///
    /// Every slot in `range` must be initialised.
    #[inline(always)]
    pub unsafe fn slice(&self, range: Range<usize>) -> &[T] {
        assert!(range.start <= range.end);
        assert!(range.end <= self.capacity);
        // SAFETY: in bounds, initialised per the caller, and
        // `MaybeUninit<T>` has the same layout as `T`.
        unsafe {
            std::slice::from_raw_parts(
                self.ptr.as_ptr().add(range.start).cast::<T>(),
                range.len(),
            )
        }
    }

    /// Moves the slots in `src` so they start at `dst`.  The ranges
    /// may overlap.
    pub fn move_within(&mut self, src: Range<usize>, dst: usize) {
        assert!(src.start <= src.end);
        assert!(src.end <= self.capacity);
        assert!(dst <= self.capacity - src.len());

        let base = self.ptr.as_ptr();
        // SAFETY: both ranges are in bounds, and `copy` handles overlap.
        unsafe { std::ptr::copy(base.add(src.start), base.add(dst), src.len()) }
    }

    /// Replaces the array with a fresh one of `new_capacity` slots,
    /// where the slots in `live` start at `dst`.
    ///
    /// On failure, the array is untouched.  On success, the old array
    /// is released if we owned it, and the new one is always owned.
    pub fn grow_into(
        &mut self,
        new_capacity: usize,
        live: Range<usize>,
        dst: usize,
    ) -> Result<(), AllocError> {
        assert!(new_capacity >= self.capacity);
        assert!(live.start <= live.end);
        assert!(live.end <= self.capacity);
        assert!(dst <= new_capacity - live.len());

        let mut grown = Self::allocate(self.alloc, new_capacity)?;

        // SAFETY: both ranges are in bounds, and the arrays are distinct.
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.ptr.as_ptr().add(live.start),
                grown.ptr.as_ptr().add(dst),
                live.len(),
            )
        };

        std::mem::swap(self, &mut grown);
        // `grown` now holds the old array, and releases it as needed.
        Ok(())
    }
}

impl<T, A: DequeAllocator + ?Sized> Drop for RawSlots<'_, T, A> {
    fn drop(&mut self) {
        if self.ownership == Ownership::Borrowed {
            return;
        }

        // The layout was valid when we allocated this array, so it still is.
        if let Ok(layout) = Layout::array::<MaybeUninit<T>>(self.capacity) {
            // SAFETY: owned arrays come from `self.alloc.allocate(layout)`.
            unsafe { self.alloc.release(self.ptr.cast::<u8>(), layout) }
        }
    }
}

#[cfg(test)]
use deque_alloc::testing::CountingAllocator;

#[test]
fn test_write_read_miri() {
    let alloc = CountingAllocator::new(deque_alloc::HeapAllocator);
    {
        let mut slots = RawSlots::<u32, _>::allocate(&alloc, 8).unwrap();
        assert_eq!(slots.capacity(), 8);
        assert_eq!(slots.ownership(), Ownership::Owned);

        for i in 0..8 {
            slots.write(i, 10 * i as u32);
        }

        // SAFETY: all slots were written above.
        unsafe {
            assert_eq!(slots.read(3), 30);
            assert_eq!(slots.slice(2..5), &[20, 30, 40]);
            assert_eq!(slots.slice(4..4), &[] as &[u32]);
        }
    }

    assert_eq!(alloc.stats().allocations, 1);
    assert!(alloc.stats().is_balanced());
}

#[test]
fn test_move_within_miri() {
    let mut slots = RawSlots::<u8, _>::allocate(deque_alloc::HeapAllocator::GLOBAL, 8).unwrap();
    for i in 0..8 {
        slots.write(i, i as u8);
    }

    // Overlapping move towards the front.
    slots.move_within(2..6, 1);
    // SAFETY: all slots were written.
    assert_eq!(unsafe { slots.slice(0..8) }, &[0, 2, 3, 4, 5, 5, 6, 7]);

    // Overlapping move towards the back.
    slots.move_within(1..4, 3);
    // SAFETY: all slots were written.
    assert_eq!(unsafe { slots.slice(0..8) }, &[0, 2, 3, 2, 3, 4, 6, 7]);
}

#[test]
fn test_grow_into_miri() {
    let alloc = CountingAllocator::new(deque_alloc::HeapAllocator);
    {
        let mut slots = RawSlots::<u16, _>::allocate(&alloc, 4).unwrap();
        for i in 0..4 {
            slots.write(i, 100 + i as u16);
        }

        slots.grow_into(8, 1..4, 2).unwrap();
        assert_eq!(slots.capacity(), 8);
        // SAFETY: the live slots were copied to 2..5.
        assert_eq!(unsafe { slots.slice(2..5) }, &[101, 102, 103]);

        let stats = alloc.stats();
        assert_eq!(stats.allocations, 2);
        assert_eq!(stats.releases, 1);
    }

    assert!(alloc.stats().is_balanced());
}

#[test]
fn test_grow_into_failure_miri() {
    let faulty = deque_alloc::testing::FaultInjectingAllocator::new(deque_alloc::HeapAllocator);
    let mut slots = RawSlots::<u64, _>::allocate(&faulty, 4).unwrap();
    for i in 0..4 {
        slots.write(i, i as u64);
    }

    faulty.fail_after(0);
    assert_eq!(slots.grow_into(8, 0..4, 0), Err(AllocError));
    assert_eq!(slots.capacity(), 4);
    // SAFETY: all slots were written.
    assert_eq!(unsafe { slots.slice(0..4) }, &[0, 1, 2, 3]);
}

#[test]
fn test_borrowed_is_not_released_miri() {
    let alloc = CountingAllocator::new(deque_alloc::NullAllocator);
    let mut storage = [MaybeUninit::<u32>::uninit(); 4];
    {
        // SAFETY: `storage` outlives `slots`.
        let mut slots =
            unsafe { RawSlots::borrowed(&alloc, NonNull::from(&mut storage).cast(), 4) };
        assert_eq!(slots.ownership(), Ownership::Borrowed);
        slots.write(0, 7);
        assert_eq!(slots.grow_into(8, 0..1, 0), Err(AllocError));
    }

    let stats = alloc.stats();
    assert_eq!(stats.failed_allocations, 1);
    assert_eq!(stats.releases, 0);
    assert_eq!(stats.bad_releases, 0);
    // SAFETY: slot 0 was written through `slots`.
    assert_eq!(unsafe { storage[0].assume_init() }, 7);
}

#[test]
fn test_vacate_miri() {
    let mut slots = RawSlots::<u32, _>::allocate(deque_alloc::HeapAllocator::GLOBAL, 4).unwrap();
    for i in 0..4 {
        slots.write(i, i as u32);
    }

    slots.vacate(1);
    slots.vacate(3);
    // SAFETY: slots 0 and 2 are still written.
    unsafe {
        assert_eq!(slots.read(0), 0);
        assert_eq!(slots.read(2), 2);
    }

    slots.write(1, 11);
    // SAFETY: slots 0..3 are written.
    assert_eq!(unsafe { slots.slice(0..3) }, &[0, 11, 2]);
}
