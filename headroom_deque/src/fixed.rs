//! The `fixed` module builds [`Deque`]s entirely inside a
//! caller-supplied byte region, for targets without a heap.
//!
//! The region's head holds the deque itself (the control block), and
//! the rest becomes its slot array.  The deque is wired to the
//! [`NullAllocator`], so it can never grow past the region, and never
//! releases anything: the caller owns the region.
use std::mem::align_of;
use std::mem::size_of;
use std::mem::MaybeUninit;
use std::ptr::NonNull;

use deque_alloc::NullAllocator;

use crate::policy::MIN_CAPACITY;
use crate::raw::RawSlots;
use crate::Deque;

/// The control block stored at the head of a fixed region.
type FixedDeque<T> = Deque<'static, T, NullAllocator>;

/// Returns a region size (in bytes) that is always large enough to
/// hold a fixed [`Deque`] of `T` with at least `slots` slots, however
/// the region is aligned, or `None` if that size overflows `usize`.
#[must_use]
pub const fn region_len_for<T: Copy>(slots: usize) -> Option<usize> {
    let control = (align_of::<FixedDeque<T>>() - 1) + size_of::<FixedDeque<T>>();
    let padding = align_of::<T>() - 1;

    let Some(array) = slots.checked_mul(size_of::<T>()) else {
        return None;
    };
    let Some(header) = control.checked_add(padding) else {
        return None;
    };
    header.checked_add(array)
}

/// Offsets (from the start of a region) of the control block and the
/// slot array, and the number of slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct RegionLayout {
    control: usize,
    slots: usize,
    capacity: usize,
}

#[inline(always)]
fn align_up(addr: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    Some(addr.checked_add(align - 1)? & !(align - 1))
}

/// Carves a region of `len` bytes at address `base` into a `Control`
/// block followed by an array of `T`, or returns `None` if that leaves
/// fewer than [`MIN_CAPACITY`] slots.
fn carve<T, Control>(base: usize, len: usize) -> Option<RegionLayout> {
    if size_of::<T>() == 0 {
        return None;
    }

    let control = align_up(base, align_of::<Control>())? - base;
    let control_end = control.checked_add(size_of::<Control>())?;
    let slots = align_up(base.checked_add(control_end)?, align_of::<T>())? - base;
    let capacity = len.checked_sub(slots)? / size_of::<T>();

    (capacity >= MIN_CAPACITY).then_some(RegionLayout {
        control,
        slots,
        capacity,
    })
}

impl<'a, T: Copy> Deque<'a, T, NullAllocator> {
    /// Any region at least this long can hold a fixed [`Deque`] of `T`
    /// (see [`region_len_for`]).
    pub const MIN_REGION_LEN: usize = match region_len_for::<T>(MIN_CAPACITY) {
        Some(len) => len,
        None => panic!("deque control block is absurdly large"),
    };

    /// Builds an empty [`Deque`] in `region`, using as many slots as fit
    /// after the control block.
    ///
    /// Returns `None` if the region can't hold at least
    /// [`MIN_CAPACITY`] slots; regions of [`Self::MIN_REGION_LEN`] bytes
    /// or more always can.
    ///
    /// The deque never allocates: insertions past the region's capacity
    /// fail with a [`crate::PushError`].
    pub fn new_in_region(region: &'a mut [u8]) -> Option<&'a mut Self> {
        // Don't touch `region` after deriving `base`.
        let len = region.len();
        let base = region.as_mut_ptr();
        let Some(layout) = carve::<T, Self>(base as usize, len) else {
            tracing::debug!(
                len,
                min_len = Self::MIN_REGION_LEN,
                "region too small for a fixed deque"
            );
            return None;
        };

        // SAFETY: `carve` only returns offsets that lie in `region`, with
        // the control block and `capacity` slots disjoint and aligned.
        let (control, slots) = unsafe {
            (
                base.add(layout.control).cast::<Self>(),
                NonNull::new_unchecked(base.add(layout.slots)).cast::<MaybeUninit<T>>(),
            )
        };

        // SAFETY: the slots live in `region`, which we borrow for `'a`.
        let slots = unsafe { RawSlots::borrowed(NullAllocator::GLOBAL, slots, layout.capacity) };
        let deque = Deque::from_slots(slots);

        // SAFETY: `control` is aligned, in bounds, and exclusively ours
        // for `'a`.  Nothing needs dropping: the slots are borrowed.
        unsafe {
            control.write(deque);
            Some(&mut *control)
        }
    }
}

#[test]
fn test_carve_miri() {
    // A nicely aligned region.
    let layout = carve::<u64, [u64; 4]>(0x1000, 32 + 8 * 6).unwrap();
    assert_eq!(
        layout,
        RegionLayout {
            control: 0,
            slots: 32,
            capacity: 6
        }
    );

    // Misaligned base: skip to the next multiple of 8 for the control
    // block, and again for the slots.
    let layout = carve::<u64, [u64; 4]>(0x1003, 5 + 32 + 8 * 4).unwrap();
    assert_eq!(layout.control, 5);
    assert_eq!(layout.slots, 37);
    assert_eq!(layout.capacity, 4);

    // Partial slots don't count.
    let layout = carve::<u64, [u64; 4]>(0x1000, 32 + 8 * 5 - 1).unwrap();
    assert_eq!(layout.capacity, 4);
}

#[test]
fn test_carve_too_small_miri() {
    assert_eq!(carve::<u64, [u64; 4]>(0x1000, 0), None);
    assert_eq!(carve::<u64, [u64; 4]>(0x1000, 2), None);
    assert_eq!(carve::<u64, [u64; 4]>(0x1000, 32), None);
    assert_eq!(carve::<u64, [u64; 4]>(0x1000, 32 + 8 * 4 - 1), None);
    assert_eq!(carve::<(), [u64; 4]>(0x1000, 1000), None);
    assert_eq!(carve::<u64, [u64; 4]>(usize::MAX - 8, 1000), None);
}

#[test]
fn test_region_len_is_enough_miri() {
    type Slot = &'static str;

    let wanted = region_len_for::<Slot>(MIN_CAPACITY).unwrap();
    assert_eq!(wanted, Deque::<Slot, NullAllocator>::MIN_REGION_LEN);

    // Whatever the misalignment, `MIN_REGION_LEN` bytes suffice.
    for base in 0x1000..0x1000 + align_of::<FixedDeque<Slot>>() {
        let layout = carve::<Slot, FixedDeque<Slot>>(base, wanted).unwrap();
        assert!(layout.capacity >= MIN_CAPACITY);
    }
}

#[test]
fn test_new_in_region_rejects_small_miri() {
    let mut empty: [u8; 0] = [];
    assert!(Deque::<&str, NullAllocator>::new_in_region(&mut empty).is_none());

    let mut tiny = [0u8; 2];
    assert!(Deque::<&str, NullAllocator>::new_in_region(&mut tiny).is_none());
}

#[test]
fn test_new_in_region_scenario_miri() {
    let mut region = [0u8; 1000];
    let deque = Deque::<&str, NullAllocator>::new_in_region(&mut region).unwrap();
    assert!(deque.is_fixed());
    assert!(deque.capacity() >= MIN_CAPACITY);

    assert_eq!(deque.len(), 0);
    assert_eq!(deque.pop(), None);

    deque.push("one").unwrap();
    deque.push("two").unwrap();
    deque.push("three").unwrap();
    assert_eq!(deque.len(), 3);

    deque.unshift("zero").unwrap();
    assert_eq!(deque.len(), 4);

    assert_eq!(deque.pop(), Some("three"));
    deque.push("four").unwrap();
    assert_eq!(deque.shift(), Some("zero"));
    assert_eq!(deque.shift(), Some("one"));
    assert_eq!(deque.pop(), Some("four"));
    assert_eq!(deque.pop(), Some("two"));
    assert_eq!(deque.len(), 0);
}

#[test]
fn test_exhaustion_miri() {
    // An 8-aligned region with room for exactly `K` slots after the
    // control block.
    const K: usize = 7;
    let mut storage = [0u64; 64];
    let len = size_of::<FixedDeque<u32>>() + K * size_of::<u32>();
    assert!(len <= size_of::<[u64; 64]>());
    // SAFETY: `storage` is valid for `len` bytes, and any bytes are valid `u8`s.
    let region = unsafe { std::slice::from_raw_parts_mut(storage.as_mut_ptr().cast::<u8>(), len) };

    let deque = Deque::<u32, NullAllocator>::new_in_region(region).unwrap();
    let capacity = deque.capacity();
    assert_eq!(capacity, K);

    for i in 0..capacity {
        deque.push(i as u32).unwrap();
    }

    let err = deque.push(1234).unwrap_err();
    assert_eq!(err.into_inner(), 1234);
    assert!(deque.unshift(5678).is_err());

    // Still valid and queryable.
    assert_eq!(deque.len(), capacity);
    assert_eq!(deque.capacity(), capacity);
    for i in 0..capacity {
        assert_eq!(deque.peek_bottom(i), Some(i as u32));
    }
    assert_eq!(deque.shift(), Some(0));
    deque.push(1234).unwrap();
    assert_eq!(deque.peek_top(0), Some(1234));
}

#[test]
fn test_region_len_for_miri() {
    const K: usize = 9;
    let mut region = vec![0u8; region_len_for::<u32>(K).unwrap()];
    let deque = Deque::<u32, NullAllocator>::new_in_region(&mut region).unwrap();
    assert!(deque.capacity() >= K);
}

#[test]
fn test_region_len_for_overflow_miri() {
    assert_eq!(region_len_for::<u32>(usize::MAX), None);
    assert_eq!(region_len_for::<u64>(usize::MAX / 8 + 1), None);
    assert_eq!(region_len_for::<u8>(usize::MAX), None);

    // Just below the limit still works.
    let header = region_len_for::<u8>(0).unwrap();
    assert_eq!(region_len_for::<u8>(usize::MAX - header), Some(usize::MAX));
}

#[test]
fn test_exhaustion_by_unshift_miri() {
    let mut region = [0u8; 512];
    let deque = Deque::<u16, NullAllocator>::new_in_region(&mut region).unwrap();
    let capacity = deque.capacity();

    for i in 0..capacity {
        deque.unshift(i as u16).unwrap();
    }
    assert!(deque.unshift(0).is_err());
    assert!(deque.push(0).is_err());

    for i in 0..capacity {
        assert_eq!(deque.pop(), Some(i as u16));
    }
    assert_eq!(deque.pop(), None);
}
