//! The `deque` module defines the [`Deque`] container: a double-ended
//! queue whose live elements always form one contiguous run inside a
//! single buffer.
//!
//! The buffer is a sliding window: `first_pos..end_pos` are the live
//! slots, with free headroom on either side.  When one end runs out of
//! room, we first try to slide the live run into the free space at
//! the other end (without allocating), and only then double the
//! buffer.  Either way, the work is amortised over the insertions
//! that filled the space.
use std::ops::ControlFlow;

use deque_alloc::AllocError;
use deque_alloc::DequeAllocator;
use deque_alloc::HeapAllocator;

use crate::error::PushError;
use crate::policy;
use crate::raw::Ownership;
use crate::raw::RawSlots;

/// A [`Deque`] stores `Copy` handles (references, indices, raw
/// pointers...) with amortised constant-time insertion and removal at
/// both ends, in a contiguous buffer obtained from an `A` allocator.
///
/// In stack terms, [`Deque::push`] and [`Deque::pop`] work on the top
/// (back) end, and [`Deque::unshift`] and [`Deque::shift`] on the
/// bottom (front) end.
///
/// The deque never interprets or frees what its handles refer to;
/// that stays the caller's business.
///
/// When an insertion needs memory and the allocator refuses, the
/// insertion fails with a [`PushError`] and the deque is left as it
/// was: nothing is lost, and the caller may retry later.
pub struct Deque<'a, T: Copy, A: DequeAllocator + ?Sized = HeapAllocator> {
    slots: RawSlots<'a, T, A>,
    first_pos: usize, // First live slot
    end_pos: usize,   // One past the last live slot
}

impl<T: Copy> Deque<'static, T> {
    /// Creates an empty [`Deque`] backed by the process heap.
    ///
    /// Fails only if the heap can't provide the initial buffer.
    pub fn new() -> Result<Self, AllocError> {
        Self::new_in(HeapAllocator::GLOBAL)
    }
}

impl<'a, T: Copy, A: DequeAllocator + ?Sized> Deque<'a, T, A> {
    const NOT_ZERO_SIZED: () = assert!(
        std::mem::size_of::<T>() > 0,
        "Deque elements must not be zero-sized"
    );

    /// Creates an empty [`Deque`] with the default capacity, backed by
    /// `alloc`.
    pub fn new_in(alloc: &'a A) -> Result<Self, AllocError> {
        Self::with_capacity_in(policy::DEFAULT_CAPACITY, alloc)
    }

    /// Creates an empty [`Deque`] with room for `capacity` elements
    /// (at least [`policy::MIN_CAPACITY`]), backed by `alloc`.
    pub fn with_capacity_in(capacity: usize, alloc: &'a A) -> Result<Self, AllocError> {
        let capacity = capacity.max(policy::MIN_CAPACITY);
        let slots = RawSlots::allocate(alloc, capacity).inspect_err(|_| {
            tracing::debug!(capacity, "failed to allocate initial deque buffer");
        })?;

        Ok(Self::from_slots(slots))
    }

    /// Wraps an empty slot array, with both cursors at the reserved
    /// headroom position.
    pub(crate) fn from_slots(slots: RawSlots<'a, T, A>) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NOT_ZERO_SIZED;
        assert!(slots.capacity() >= policy::MIN_CAPACITY);

        let start = policy::reserved_headroom(slots.capacity());
        let ret = Self {
            slots,
            first_pos: start,
            end_pos: start,
        };

        ret.check_rep();
        ret
    }

    /// Releases the deque's buffer (if it owns one).
    ///
    /// This is the same as dropping the deque; the elements' referents
    /// are left alone.
    #[inline(always)]
    pub fn free(self) {
        std::mem::drop(self)
    }

    /// Returns the number of elements in the deque.
    #[inline(always)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.end_pos - self.first_pos
    }

    /// Determines whether the deque is empty.
    #[inline(always)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first_pos == self.end_pos
    }

    /// Returns the number of slots in the current buffer.
    #[inline(always)]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Determines whether the deque lives in a caller-supplied region
    /// (and thus can never grow).
    #[inline(always)]
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.slots.ownership() == Ownership::Borrowed
    }

    /// Appends `value` at the top (back) of the deque.
    ///
    /// Returns `value` in a [`PushError`] if the buffer is full and
    /// can't grow; the deque is then unchanged.
    pub fn push(&mut self, value: T) -> Result<(), PushError<T>> {
        if self.end_pos == self.capacity() {
            if let Err(cause) = self.make_room_at_end() {
                return Err(PushError::new(value, cause));
            }
        }

        debug_assert!(self.end_pos < self.capacity());
        self.slots.write(self.end_pos, value);
        self.end_pos += 1;

        self.check_rep();
        Ok(())
    }

    /// Removes and returns the value at the top (back) of the deque,
    /// if any.
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        self.end_pos -= 1;
        // SAFETY: `end_pos` was a live slot.
        let ret = unsafe { self.slots.read(self.end_pos) };
        self.slots.vacate(self.end_pos);

        self.check_rep();
        Some(ret)
    }

    /// Prepends `value` at the bottom (front) of the deque.
    ///
    /// Returns `value` in a [`PushError`] if the buffer is full and
    /// can't grow; the deque is then unchanged.
    pub fn unshift(&mut self, value: T) -> Result<(), PushError<T>> {
        if self.is_empty() {
            // Nothing to move: start in the middle, with room both ways.
            self.recenter(policy::unshift_recenter(self.capacity()));
        } else if self.first_pos == 0 {
            if let Err(cause) = self.make_room_at_front() {
                return Err(PushError::new(value, cause));
            }
        }

        debug_assert!(self.first_pos > 0);
        self.first_pos -= 1;
        self.slots.write(self.first_pos, value);

        self.check_rep();
        Ok(())
    }

    /// Removes and returns the value at the bottom (front) of the
    /// deque, if any.
    ///
    /// Removing the last element resets the cursors to the reserved
    /// headroom position, like [`Deque::clear`].
    pub fn shift(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        // SAFETY: `first_pos` is a live slot.
        let ret = unsafe { self.slots.read(self.first_pos) };
        self.slots.vacate(self.first_pos);
        self.first_pos += 1;

        if self.is_empty() {
            self.recenter(policy::reserved_headroom(self.capacity()));
        }

        self.check_rep();
        Some(ret)
    }

    /// Returns the value `index` positions below the top (back) of the
    /// deque: `peek_top(0)` is the most recently pushed value.
    #[must_use]
    pub fn peek_top(&self, index: usize) -> Option<T> {
        if index >= self.len() {
            return None;
        }

        // SAFETY: `first_pos <= end_pos - 1 - index < end_pos` is live.
        Some(unsafe { self.slots.read(self.end_pos - 1 - index) })
    }

    /// Returns the value `index` positions above the bottom (front) of
    /// the deque: `peek_bottom(0)` is the first value in FIFO order.
    #[must_use]
    pub fn peek_bottom(&self, index: usize) -> Option<T> {
        if index >= self.len() {
            return None;
        }

        // SAFETY: `first_pos <= first_pos + index < end_pos` is live.
        Some(unsafe { self.slots.read(self.first_pos + index) })
    }

    /// Forgets all elements, but keeps the buffer.
    #[inline(always)]
    pub fn clear(&mut self) {
        self.recenter(policy::reserved_headroom(self.capacity()));
        self.check_rep();
    }

    /// Calls `visit` on each element, from bottom (front) to top (back),
    /// until `visit` breaks.
    ///
    /// Returns [`ControlFlow::Break`] if `visit` stopped the walk early,
    /// and [`ControlFlow::Continue`] if every element was visited.
    pub fn for_each<F>(&self, mut visit: F) -> ControlFlow<()>
    where
        F: FnMut(&Self, T) -> ControlFlow<()>,
    {
        self.live().iter().try_for_each(|&item| visit(self, item))
    }

    /// Returns the live elements, from bottom to top.
    #[inline(always)]
    fn live(&self) -> &[T] {
        // SAFETY: every slot in `first_pos..end_pos` is live.
        unsafe { self.slots.slice(self.first_pos..self.end_pos) }
    }

    /// Moves both cursors to `pos`, forgetting any live element.
    #[inline(always)]
    fn recenter(&mut self, pos: usize) {
        debug_assert!(pos <= self.capacity());

        tracing::trace!(pos, len = self.len(), capacity = self.capacity(), "recentered deque");
        self.first_pos = pos;
        self.end_pos = pos;
    }

    /// Slides the live elements toward the front, to reclaim half the
    /// free slots before `first_pos`.
    fn slide_down(&mut self) {
        debug_assert!(self.first_pos > 0);

        let shift = self.first_pos - self.first_pos / 2;
        self.slots
            .move_within(self.first_pos..self.end_pos, self.first_pos - shift);
        self.first_pos -= shift;
        self.end_pos -= shift;

        tracing::trace!(shift, len = self.len(), "slid deque toward the front");
    }

    /// Slides the live elements toward the back, to reclaim (a bit more
    /// than) half the free slots at or after `end_pos`.
    fn slide_up(&mut self) {
        let capacity = self.capacity();
        debug_assert!(self.end_pos < capacity);

        let shift = 1 + (capacity - self.end_pos) / 2;
        self.slots
            .move_within(self.first_pos..self.end_pos, self.first_pos + shift);
        self.first_pos += shift;
        self.end_pos += shift;

        tracing::trace!(shift, len = self.len(), "slid deque toward the back");
    }

    /// Moves the live elements to a buffer `GROWTH_FACTOR` times
    /// larger, starting at `offset(new_capacity)`.
    fn grow(&mut self, offset: fn(usize) -> usize) -> Result<(), AllocError> {
        let old_capacity = self.capacity();
        let len = self.len();
        let new_capacity = policy::grown_capacity(old_capacity).ok_or(AllocError)?;
        let dst = offset(new_capacity);

        if let Err(err) = self
            .slots
            .grow_into(new_capacity, self.first_pos..self.end_pos, dst)
        {
            tracing::debug!(old_capacity, new_capacity, len, "failed to grow deque buffer");
            return Err(err);
        }

        self.first_pos = dst;
        self.end_pos = dst + len;

        tracing::debug!(old_capacity, new_capacity, len, "grew deque buffer");
        Ok(())
    }

    /// Makes `end_pos < capacity`, or fails without changing anything.
    #[inline(never)]
    fn make_room_at_end(&mut self) -> Result<(), AllocError> {
        debug_assert_eq!(self.end_pos, self.capacity());

        if self.first_pos > 1 {
            self.slide_down();
            return Ok(());
        }

        match self.grow(policy::push_growth_offset) {
            Ok(()) => Ok(()),
            // Sliding by a single slot isn't worth it when we can grow,
            // but it's better than failing.
            Err(_) if self.first_pos == 1 => {
                self.slide_down();
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Makes `first_pos > 0`, or fails without changing anything.
    #[inline(never)]
    fn make_room_at_front(&mut self) -> Result<(), AllocError> {
        debug_assert_eq!(self.first_pos, 0);

        if self.end_pos < self.capacity() {
            self.slide_up();
            return Ok(());
        }

        self.grow(policy::unshift_growth_offset)
    }

    #[cfg_attr(test, mutants::skip)] // obviously, removing checks will not be detected.
    #[inline(always)]
    fn check_rep(&self) {
        debug_assert!(self.first_pos <= self.end_pos);
        debug_assert!(self.end_pos <= self.capacity());
        debug_assert!(self.capacity() >= policy::MIN_CAPACITY);
    }
}

impl<T, A> std::fmt::Debug for Deque<'_, T, A>
where
    T: Copy + std::fmt::Debug,
    A: DequeAllocator + ?Sized,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deque")
            .field("capacity", &self.capacity())
            .field("first_pos", &self.first_pos)
            .field("end_pos", &self.end_pos)
            .field("items", &self.live())
            .finish()
    }
}

#[cfg(test)]
use deque_alloc::testing::CountingAllocator;
#[cfg(test)]
use deque_alloc::testing::FaultInjectingAllocator;

#[cfg(test)]
fn collect<T: Copy, A: DequeAllocator + ?Sized>(deque: &Deque<'_, T, A>) -> Vec<T> {
    let mut ret = Vec::new();
    let _ = deque.for_each(|_, item| {
        ret.push(item);
        ControlFlow::Continue(())
    });
    ret
}

#[test]
fn test_scenario_miri() {
    let mut deque = Deque::new().unwrap();
    assert_eq!(deque.len(), 0);
    assert!(deque.is_empty());
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
    assert_eq!(deque.pop(), None);
    assert_eq!(deque.shift(), None);

    deque.free();
}

#[test]
fn test_peek_miri() {
    let mut deque = Deque::new().unwrap();
    assert_eq!(deque.peek_top(0), None);
    assert_eq!(deque.peek_bottom(0), None);

    deque.push("uno").unwrap();
    deque.push("due").unwrap();
    deque.push("tri").unwrap();

    assert_eq!(deque.peek_top(0), Some("tri"));
    assert_eq!(deque.peek_top(1), Some("due"));
    assert_eq!(deque.peek_top(2), Some("uno"));
    assert_eq!(deque.peek_top(3), None);
    assert_eq!(deque.peek_top(usize::MAX), None);

    assert_eq!(deque.peek_bottom(0), Some("uno"));
    assert_eq!(deque.peek_bottom(1), Some("due"));
    assert_eq!(deque.peek_bottom(2), Some("tri"));
    assert_eq!(deque.peek_bottom(3), None);
    assert_eq!(deque.peek_bottom(usize::MAX), None);

    // Peeking doesn't consume anything.
    assert_eq!(deque.len(), 3);
    assert_eq!(deque.peek_top(0), Some("tri"));

    deque.unshift("zero").unwrap();
    assert_eq!(deque.peek_bottom(0), Some("zero"));
    assert_eq!(deque.peek_top(3), Some("zero"));
}

#[test]
fn test_for_each_miri() {
    let mut deque = Deque::new().unwrap();
    deque.push("uno").unwrap();
    deque.push("due").unwrap();
    deque.push("tri").unwrap();

    let mut buf = String::new();
    let ret = deque.for_each(|_, item| {
        buf.push_str(item);
        ControlFlow::Continue(())
    });
    assert_eq!(ret, ControlFlow::Continue(()));
    assert_eq!(buf, "unoduetri");

    let mut buf = String::new();
    let ret = deque.for_each(|_, item| {
        if item == "tri" {
            return ControlFlow::Break(());
        }
        buf.push_str(item);
        ControlFlow::Continue(())
    });
    assert_eq!(ret, ControlFlow::Break(()));
    assert_eq!(buf, "unodue");

    // The visitor sees the deque itself.
    let ret = deque.for_each(|d, _| {
        assert_eq!(d.len(), 3);
        ControlFlow::Continue(())
    });
    assert_eq!(ret, ControlFlow::Continue(()));
}

#[test]
fn test_for_each_empty_miri() {
    let deque: Deque<u32> = Deque::new().unwrap();
    let ret = deque.for_each(|_, _| panic!("nothing to visit"));
    assert_eq!(ret, ControlFlow::Continue(()));
}

#[test]
fn test_lifo_miri() {
    let mut deque = Deque::new().unwrap();
    for i in 0..100u32 {
        deque.push(i).unwrap();
    }

    for i in (0..100u32).rev() {
        assert_eq!(deque.peek_top(0), Some(i));
        assert_eq!(deque.pop(), Some(i));
    }
    assert_eq!(deque.pop(), None);
}

#[test]
fn test_fifo_miri() {
    let mut deque = Deque::new().unwrap();
    for i in 0..100u32 {
        deque.push(i).unwrap();
    }

    for i in 0..100u32 {
        assert_eq!(deque.shift(), Some(i));
    }
    assert_eq!(deque.shift(), None);
}

#[test]
fn test_unshift_grow_miri() {
    let alloc = CountingAllocator::new(HeapAllocator);
    {
        let mut deque = Deque::with_capacity_in(4, &alloc).unwrap();
        assert_eq!(deque.capacity(), 4);

        for i in 0..50u32 {
            deque.unshift(i).unwrap();
        }

        assert!(deque.capacity() > 4);
        assert!(alloc.stats().allocations > 1);
        assert_eq!(collect(&deque), (0..50u32).rev().collect::<Vec<_>>());

        // Draining from the top yields insertion order.
        for i in 0..50u32 {
            assert_eq!(deque.pop(), Some(i));
        }
    }

    assert!(alloc.stats().is_balanced());
}

#[test]
fn test_push_grow_miri() {
    let alloc = CountingAllocator::new(HeapAllocator);
    {
        let mut deque = Deque::with_capacity_in(0, &alloc).unwrap();
        assert_eq!(deque.capacity(), policy::MIN_CAPACITY);

        for i in 0..50u32 {
            deque.push(i).unwrap();
        }

        assert!(deque.capacity() >= 50);
        assert_eq!(collect(&deque), (0..50u32).collect::<Vec<_>>());
    }

    assert!(alloc.stats().is_balanced());
}

#[test]
fn test_push_slides_before_growing_miri() {
    let alloc = CountingAllocator::new(HeapAllocator);
    {
        let mut deque = Deque::with_capacity_in(8, &alloc).unwrap();

        // Fill up to the end of the buffer, then free up the front.
        while deque.end_pos < deque.capacity() {
            deque.push(deque.len() as u32).unwrap();
        }
        for i in 0..4 {
            assert_eq!(deque.shift(), Some(i));
        }

        deque.push(100).unwrap();
        assert_eq!(deque.capacity(), 8);
        assert_eq!(alloc.stats().allocations, 1);
        assert_eq!(collect(&deque), [4, 5, 100]);
    }

    // Steady FIFO traffic at constant size never needs a bigger buffer.
    let mut deque = Deque::with_capacity_in(8, &alloc).unwrap();
    for i in 0..1000u32 {
        deque.push(i).unwrap();
        if deque.len() > 4 {
            assert_eq!(deque.shift(), Some(i - 4));
        }
    }
    assert_eq!(deque.capacity(), 8);
}

#[test]
fn test_unshift_slides_before_growing_miri() {
    let mut deque = Deque::with_capacity_in(8, HeapAllocator::GLOBAL).unwrap();

    // Steady reverse-FIFO traffic at constant size.
    for i in 0..1000u32 {
        deque.unshift(i).unwrap();
        if deque.len() > 4 {
            assert_eq!(deque.pop(), Some(i - 4));
        }
    }
    assert_eq!(deque.capacity(), 8);
}

#[test]
fn test_mixed_ends_miri() {
    let mut deque = Deque::with_capacity_in(4, HeapAllocator::GLOBAL).unwrap();
    let mut expected = std::collections::VecDeque::new();

    for i in 0..200u32 {
        if i % 3 == 0 {
            deque.unshift(i).unwrap();
            expected.push_front(i);
        } else {
            deque.push(i).unwrap();
            expected.push_back(i);
        }
    }

    assert_eq!(collect(&deque), expected.iter().copied().collect::<Vec<_>>());
}

#[test]
fn test_shift_recenters_miri() {
    let mut deque = Deque::with_capacity_in(16, HeapAllocator::GLOBAL).unwrap();
    for i in 0..10u32 {
        deque.push(i).unwrap();
    }
    for _ in 0..10 {
        let _ = deque.shift();
    }

    assert!(deque.is_empty());
    assert_eq!(deque.first_pos, policy::reserved_headroom(16));
    assert_eq!(deque.end_pos, policy::reserved_headroom(16));
}

#[test]
fn test_unshift_on_empty_recenters_miri() {
    let mut deque = Deque::with_capacity_in(16, HeapAllocator::GLOBAL).unwrap();
    deque.unshift(1u32).unwrap();

    assert_eq!(deque.first_pos, policy::unshift_recenter(16) - 1);
    assert_eq!(deque.end_pos, policy::unshift_recenter(16));
}

#[test]
fn test_clear_miri() {
    let alloc = CountingAllocator::new(HeapAllocator);
    let mut deque = Deque::with_capacity_in(4, &alloc).unwrap();
    for i in 0..20u32 {
        deque.push(i).unwrap();
    }
    let capacity = deque.capacity();
    let live = alloc.num_live();

    assert_eq!(deque.len(), 20);

    deque.clear();
    assert!(deque.is_empty());
    assert_eq!(deque.len(), 0);
    assert_eq!(deque.first_pos, policy::reserved_headroom(capacity));
    assert_eq!(deque.end_pos, policy::reserved_headroom(capacity));
    assert_eq!(deque.pop(), None);
    assert_eq!(deque.shift(), None);
    assert_eq!(deque.peek_top(0), None);
    // The buffer stays around.
    assert_eq!(deque.capacity(), capacity);
    assert_eq!(alloc.num_live(), live);

    deque.push(42).unwrap();
    assert_eq!(deque.peek_bottom(0), Some(42));

    // Clearing an already empty deque is fine too.
    deque.clear();
    deque.clear();
    assert!(deque.is_empty());
    drop(deque);
    assert!(alloc.stats().is_balanced());
}

#[test]
fn test_clear_fixed_miri() {
    let mut region = [0u8; 512];
    let deque = Deque::<u32, deque_alloc::NullAllocator>::new_in_region(&mut region).unwrap();
    let capacity = deque.capacity();
    for i in 0..capacity {
        deque.push(i as u32).unwrap();
    }

    deque.clear();
    assert!(deque.is_empty());
    assert_eq!(deque.capacity(), capacity);

    // The whole region is usable again, from both ends.
    for i in 0..capacity / 2 {
        deque.unshift(i as u32).unwrap();
    }
    while deque.len() < capacity {
        deque.push(0).unwrap();
    }
    assert!(deque.push(0).is_err());
}

#[test]
fn test_vacated_slots_are_never_read_miri() {
    // Under miri, reading a vacated (uninitialised) slot is an error.
    let mut deque = Deque::with_capacity_in(4, HeapAllocator::GLOBAL).unwrap();
    for round in 0..10u32 {
        for i in 0..6 {
            deque.push(round * 10 + i).unwrap();
            deque.unshift(round * 10 + i).unwrap();
        }
        assert_eq!(deque.pop(), Some(round * 10 + 5));
        assert_eq!(deque.shift(), Some(round * 10 + 5));
        assert_eq!(collect(&deque).len(), 10);

        while deque.pop().is_some() {}
        assert!(deque.is_empty());
    }
}

#[test]
fn test_new_fails_miri() {
    let alloc = deque_alloc::NullAllocator;
    assert_eq!(Deque::<u32, _>::new_in(&alloc).err(), Some(AllocError));

    let faulty = FaultInjectingAllocator::new(HeapAllocator);
    faulty.fail_call(1);
    assert!(Deque::<u32, _>::new_in(&faulty).is_err());
    assert!(Deque::<u32, _>::new_in(&faulty).is_ok());
}

#[test]
fn test_push_failure_preserves_state_miri() {
    let counting = CountingAllocator::new(HeapAllocator);
    let faulty = FaultInjectingAllocator::new(&counting);
    {
        let mut deque = Deque::with_capacity_in(4, &faulty).unwrap();
        faulty.fail_after(0);

        let mut pushed = Vec::new();
        let rejected = loop {
            let value = pushed.len() as u32;
            match deque.push(value) {
                Ok(()) => pushed.push(value),
                Err(err) => break err.into_inner(),
            }
        };

        assert_eq!(rejected, pushed.len() as u32);
        assert_eq!(deque.len(), pushed.len());
        assert_eq!(deque.capacity(), 4);
        assert_eq!(collect(&deque), pushed);

        // Still fully usable.
        assert!(deque.unshift(99).is_err());
        assert_eq!(deque.pop(), pushed.last().copied());
        deque.unshift(99).unwrap();
        assert_eq!(deque.peek_bottom(0), Some(99));

        faulty.heal();
        for i in 0..20 {
            deque.push(i).unwrap();
        }
    }

    assert!(faulty.failures() > 0);
    assert!(counting.stats().is_balanced());
}

#[test]
fn test_unshift_failure_preserves_state_miri() {
    let counting = CountingAllocator::new(HeapAllocator);
    let faulty = FaultInjectingAllocator::new(&counting);
    {
        let mut deque = Deque::with_capacity_in(4, &faulty).unwrap();
        faulty.fail_after(0);

        for i in 0..4u32 {
            deque.unshift(i).unwrap();
        }
        let err = deque.unshift(4).unwrap_err();
        assert_eq!(*err.value(), 4);

        assert_eq!(deque.len(), 4);
        assert_eq!(collect(&deque), [3, 2, 1, 0]);
    }

    assert!(counting.stats().is_balanced());
}

#[test]
fn test_dyn_allocator_miri() {
    let counting = CountingAllocator::new(HeapAllocator);
    let alloc: &dyn DequeAllocator = &counting;
    {
        let mut deque = Deque::with_capacity_in(4, alloc).unwrap();
        for i in 0..10u64 {
            deque.push(i).unwrap();
        }
        assert_eq!(deque.shift(), Some(0));
    }

    assert!(counting.stats().is_balanced());
}

#[test]
fn test_debug_miri() {
    let mut deque = Deque::with_capacity_in(4, HeapAllocator::GLOBAL).unwrap();
    deque.push(1u8).unwrap();
    deque.push(2).unwrap();

    assert_eq!(
        format!("{deque:?}"),
        "Deque { capacity: 4, first_pos: 1, end_pos: 3, items: [1, 2] }"
    );
}
