//! The `testing` module defines allocator wrappers that observe or
//! perturb another [`DequeAllocator`]:
//!
//! - [`CountingAllocator`] counts allocations and releases (and their
//!   sizes), and notices releases of pointers it never handed out;
//! - [`FaultInjectingAllocator`] fails chosen allocation calls.
//!
//! Both are single-threaded (they use [`Cell`]s), like the containers
//! they are meant to exercise.  Wrap a reference (`&CountingAllocator`)
//! to stack them, since `&A` is itself a [`DequeAllocator`].
use std::alloc::Layout;
use std::cell::Cell;
use std::cell::RefCell;
use std::ptr::NonNull;

use smallvec::SmallVec;

use crate::DequeAllocator;
use crate::HeapAllocator;

/// Running totals for a [`CountingAllocator`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocStats {
    /// Number of successful `allocate` calls.
    pub allocations: usize,
    /// Number of `allocate` calls that returned `None`.
    pub failed_allocations: usize,
    /// Number of well-formed `release` calls.
    pub releases: usize,
    /// Sum of the sizes of successful allocations.
    pub allocated_bytes: usize,
    /// Sum of the sizes of well-formed releases.
    pub released_bytes: usize,
    /// Releases of pointers that aren't live, or with a mismatched size.
    pub bad_releases: usize,
}

impl AllocStats {
    /// Determines whether everything that was allocated has been
    /// released, exactly once and with the right size.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.allocations == self.releases
            && self.allocated_bytes == self.released_bytes
            && self.bad_releases == 0
    }
}

/// A [`CountingAllocator`] forwards to an inner allocator and tracks
/// each live block.
#[derive(Debug, Default)]
pub struct CountingAllocator<A = HeapAllocator> {
    inner: A,
    stats: Cell<AllocStats>,
    live: RefCell<SmallVec<[(usize, usize); 8]>>, // (address, size) of live blocks
}

impl<A: DequeAllocator> CountingAllocator<A> {
    /// Wraps `inner` with zeroed counters.
    #[must_use]
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            stats: Default::default(),
            live: Default::default(),
        }
    }

    /// Returns a snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> AllocStats {
        self.stats.get()
    }

    /// Returns the number of blocks allocated and not yet released.
    #[must_use]
    pub fn num_live(&self) -> usize {
        self.live.borrow().len()
    }

    fn update(&self, f: impl FnOnce(&mut AllocStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

impl<A: DequeAllocator> DequeAllocator for CountingAllocator<A> {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        let Some(ptr) = self.inner.allocate(layout) else {
            self.update(|stats| stats.failed_allocations += 1);
            return None;
        };

        self.update(|stats| {
            stats.allocations += 1;
            stats.allocated_bytes += layout.size();
        });
        self.live
            .borrow_mut()
            .push((ptr.as_ptr() as usize, layout.size()));
        Some(ptr)
    }

    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        let addr = ptr.as_ptr() as usize;
        let found = {
            let mut live = self.live.borrow_mut();
            match live.iter().position(|&entry| entry == (addr, layout.size())) {
                Some(index) => {
                    live.swap_remove(index);
                    true
                }
                None => false,
            }
        };

        if !found {
            // Don't forward: the inner allocator would be handed garbage.
            tracing::debug!(addr, size = layout.size(), "bad release");
            self.update(|stats| stats.bad_releases += 1);
            return;
        }

        self.update(|stats| {
            stats.releases += 1;
            stats.released_bytes += layout.size();
        });
        // SAFETY: `ptr` is a live block from `self.inner`, with this `layout`.
        unsafe { self.inner.release(ptr, layout) }
    }
}

/// A [`FaultInjectingAllocator`] forwards to an inner allocator, except
/// for the calls it was told to fail.
///
/// Calls are numbered from 1, in the order `allocate` is invoked.
#[derive(Debug, Default)]
pub struct FaultInjectingAllocator<A = HeapAllocator> {
    inner: A,
    calls: Cell<usize>,
    failures: Cell<usize>,
    failing_calls: RefCell<SmallVec<[usize; 4]>>,
    budget: Cell<Option<usize>>, // Remaining successes, if limited.
}

impl<A: DequeAllocator> FaultInjectingAllocator<A> {
    /// Wraps `inner`; no call fails until configured otherwise.
    #[must_use]
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            calls: Cell::new(0),
            failures: Cell::new(0),
            failing_calls: Default::default(),
            budget: Cell::new(None),
        }
    }

    /// Makes the `ordinal`-th call to `allocate` (counting from 1 since
    /// construction) fail.
    pub fn fail_call(&self, ordinal: usize) -> &Self {
        self.failing_calls.borrow_mut().push(ordinal);
        self
    }

    /// Lets the next `successes` calls through, and fails every call
    /// after that.
    pub fn fail_after(&self, successes: usize) -> &Self {
        self.budget.set(Some(successes));
        self
    }

    /// Cancels all pending failures.
    pub fn heal(&self) {
        self.failing_calls.borrow_mut().clear();
        self.budget.set(None);
    }

    /// Returns the number of `allocate` calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// Returns the number of `allocate` calls that were failed on purpose.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.failures.get()
    }

    fn should_fail(&self, ordinal: usize) -> bool {
        if self.failing_calls.borrow().contains(&ordinal) {
            return true;
        }

        match self.budget.get() {
            None => false,
            Some(0) => true,
            Some(remaining) => {
                self.budget.set(Some(remaining - 1));
                false
            }
        }
    }
}

impl<A: DequeAllocator> DequeAllocator for FaultInjectingAllocator<A> {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        let ordinal = self.calls.get() + 1;
        self.calls.set(ordinal);

        if self.should_fail(ordinal) {
            tracing::trace!(ordinal, size = layout.size(), "injected allocation failure");
            self.failures.set(self.failures.get() + 1);
            return None;
        }

        self.inner.allocate(layout)
    }

    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: we only hand out blocks from `self.inner`.
        unsafe { self.inner.release(ptr, layout) }
    }
}

#[test]
fn test_counting_miri() {
    let counting = CountingAllocator::new(HeapAllocator);
    let small = Layout::array::<u8>(3).unwrap();
    let large = Layout::array::<u32>(5).unwrap();

    let first = counting.allocate(small).unwrap();
    let second = counting.allocate(large).unwrap();
    assert_eq!(counting.num_live(), 2);
    assert!(!counting.stats().is_balanced());

    // SAFETY: live blocks, released with their own layouts.
    unsafe {
        counting.release(second, large);
        counting.release(first, small);
    }

    let stats = counting.stats();
    assert_eq!(stats.allocations, 2);
    assert_eq!(stats.releases, 2);
    assert_eq!(stats.allocated_bytes, 23);
    assert_eq!(stats.released_bytes, 23);
    assert_eq!(counting.num_live(), 0);
    assert!(stats.is_balanced());
}

#[test]
fn test_counting_bad_release_miri() {
    let counting = CountingAllocator::new(HeapAllocator);
    let layout = Layout::array::<u8>(8).unwrap();

    let ptr = counting.allocate(layout).unwrap();
    // SAFETY: live block.
    unsafe { counting.release(ptr, layout) };
    // SAFETY: the counting allocator intercepts the double release.
    unsafe { counting.release(ptr, layout) };

    let stats = counting.stats();
    assert_eq!(stats.releases, 1);
    assert_eq!(stats.bad_releases, 1);
    assert!(!stats.is_balanced());
}

#[test]
fn test_counting_failed_allocations_miri() {
    let counting = CountingAllocator::new(crate::NullAllocator);

    assert!(counting.allocate(Layout::new::<u64>()).is_none());
    let stats = counting.stats();
    assert_eq!(stats.allocations, 0);
    assert_eq!(stats.failed_allocations, 1);
    assert!(stats.is_balanced());
}

#[test]
fn test_fault_injection_by_ordinal_miri() {
    let counting = CountingAllocator::new(HeapAllocator);
    let faulty = FaultInjectingAllocator::new(&counting);
    faulty.fail_call(2).fail_call(4);

    let layout = Layout::new::<u64>();
    let results: Vec<_> = (0..5).map(|_| faulty.allocate(layout)).collect();
    let outcome: Vec<bool> = results.iter().map(Option::is_some).collect();
    assert_eq!(outcome, [true, false, true, false, true]);
    assert_eq!(faulty.calls(), 5);
    assert_eq!(faulty.failures(), 2);
    assert_eq!(counting.stats().allocations, 3);

    for ptr in results.into_iter().flatten() {
        // SAFETY: live blocks from `faulty`.
        unsafe { faulty.release(ptr, layout) };
    }
    assert!(counting.stats().is_balanced());
}

#[test]
fn test_fault_injection_budget_miri() {
    let faulty = FaultInjectingAllocator::new(HeapAllocator);
    faulty.fail_after(2);

    let layout = Layout::new::<u32>();
    let first = faulty.allocate(layout);
    let second = faulty.allocate(layout);
    assert!(first.is_some());
    assert!(second.is_some());
    assert!(faulty.allocate(layout).is_none());
    assert!(faulty.allocate(layout).is_none());

    faulty.heal();
    let third = faulty.allocate(layout);
    assert!(third.is_some());
    assert_eq!(faulty.failures(), 2);

    for ptr in [first, second, third].into_iter().flatten() {
        // SAFETY: live blocks from `faulty`.
        unsafe { faulty.release(ptr, layout) };
    }
}
