//! The [`HeapAllocator`] is the default source of memory for hosted
//! targets.  It forwards to the C allocator on unix (the same
//! allocator C callers of the process use), and to [`std::alloc`]
//! elsewhere.
//!
//! Every live block is tracked in process-wide counters, so tests
//! can check that containers release everything they obtain.
use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use crate::DequeAllocator;

static NUM_LIVE_ALLOCATIONS: AtomicUsize = AtomicUsize::new(0);
static NUM_LIVE_BYTES: AtomicUsize = AtomicUsize::new(0);

/// The [`HeapAllocator`] is stateless: all instances share the
/// process heap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapAllocator;

impl HeapAllocator {
    /// A `'static` instance, for containers that must hold a
    /// reference to their allocator.
    pub const GLOBAL: &'static HeapAllocator = &HeapAllocator;

    /// Returns the current number of live (allocated, not yet released)
    /// blocks for all [`HeapAllocator`]s in the process.
    #[must_use]
    pub fn num_live_allocations() -> usize {
        NUM_LIVE_ALLOCATIONS.load(Ordering::Relaxed)
    }

    /// Returns the total size in bytes of live (allocated, not yet
    /// released) blocks for all [`HeapAllocator`]s in the process.
    #[must_use]
    pub fn num_live_bytes() -> usize {
        NUM_LIVE_BYTES.load(Ordering::Relaxed)
    }
}

impl DequeAllocator for HeapAllocator {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        // Zero-sized blocks have no address to hand back.
        if layout.size() == 0 {
            return None;
        }

        let Some(ptr) = sys::allocate(layout) else {
            tracing::debug!(
                size = layout.size(),
                align = layout.align(),
                "heap allocation failed"
            );
            return None;
        };

        NUM_LIVE_ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
        NUM_LIVE_BYTES.fetch_add(layout.size(), Ordering::Relaxed);
        Some(ptr)
    }

    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: the caller guarantees `ptr` came from `allocate(layout)`.
        unsafe { sys::release(ptr, layout) };

        NUM_LIVE_ALLOCATIONS.fetch_sub(1, Ordering::Relaxed);
        NUM_LIVE_BYTES.fetch_sub(layout.size(), Ordering::Relaxed);
    }
}

#[cfg(unix)]
mod sys {
    use std::alloc::Layout;
    use std::ptr::NonNull;

    pub fn allocate(layout: Layout) -> Option<NonNull<u8>> {
        // posix_memalign wants a power-of-two multiple of `sizeof(void *)`.
        let align = layout
            .align()
            .max(std::mem::size_of::<*mut libc::c_void>());
        let mut ret: *mut libc::c_void = std::ptr::null_mut();

        // SAFETY: `ret` is a valid out-parameter, and `align` is a power
        // of two (max of two powers of two) at least as large as a pointer.
        let err = unsafe { libc::posix_memalign(&mut ret, align, layout.size()) };
        if err != 0 {
            return None;
        }

        NonNull::new(ret.cast::<u8>())
    }

    pub unsafe fn release(ptr: NonNull<u8>, _layout: Layout) {
        // SAFETY: `ptr` came from `posix_memalign`, which pairs with `free`.
        unsafe { libc::free(ptr.as_ptr().cast::<libc::c_void>()) }
    }
}

#[cfg(not(unix))]
mod sys {
    use std::alloc::Layout;
    use std::ptr::NonNull;

    pub fn allocate(layout: Layout) -> Option<NonNull<u8>> {
        // SAFETY: the caller checked that `layout` has a non-zero size.
        NonNull::new(unsafe { std::alloc::alloc(layout) })
    }

    pub unsafe fn release(ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: `ptr` came from `std::alloc::alloc(layout)`.
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

#[test]
fn test_allocate_release_miri() {
    let layout = Layout::array::<u64>(16).unwrap();
    let ptr = HeapAllocator.allocate(layout).expect("must allocate");

    assert_eq!(ptr.as_ptr() as usize % layout.align(), 0);

    // The block must be writable over its whole extent.
    // SAFETY: fresh block of `layout.size()` bytes.
    unsafe { ptr.as_ptr().write_bytes(0xa5, layout.size()) };

    // SAFETY: fresh allocation with the same layout.
    unsafe { HeapAllocator.release(ptr, layout) };
}

#[test]
fn test_over_aligned_miri() {
    let layout = Layout::from_size_align(24, 64).unwrap();
    let ptr = HeapAllocator.allocate(layout).expect("must allocate");

    assert_eq!(ptr.as_ptr() as usize % 64, 0);
    // SAFETY: fresh allocation with the same layout.
    unsafe { HeapAllocator.release(ptr, layout) };
}

#[test]
fn test_zero_size_miri() {
    assert!(HeapAllocator.allocate(Layout::new::<()>()).is_none());
}

// The counters are process-wide, so run in a subprocess to avoid
// interference from concurrent tests.
#[cfg(test)]
use rusty_fork::rusty_fork_test;

#[cfg(test)]
rusty_fork_test! {
    #[test]
    fn test_live_counters() {
        let base_count = HeapAllocator::num_live_allocations();
        let base_bytes = HeapAllocator::num_live_bytes();

        let small = Layout::array::<u8>(10).unwrap();
        let large = Layout::array::<u64>(100).unwrap();
        let first = HeapAllocator.allocate(small).unwrap();
        let second = HeapAllocator.allocate(large).unwrap();

        assert_eq!(HeapAllocator::num_live_allocations(), base_count + 2);
        assert_eq!(HeapAllocator::num_live_bytes(), base_bytes + 810);

        // SAFETY: fresh allocation with the same layout.
        unsafe { HeapAllocator.release(first, small) };
        assert_eq!(HeapAllocator::num_live_allocations(), base_count + 1);
        assert_eq!(HeapAllocator::num_live_bytes(), base_bytes + 800);

        // SAFETY: fresh allocation with the same layout.
        unsafe { HeapAllocator.release(second, large) };
        assert_eq!(HeapAllocator::num_live_allocations(), base_count);
        assert_eq!(HeapAllocator::num_live_bytes(), base_bytes);
    }
}
