//! The `deque_alloc` crate defines the [`DequeAllocator`] strategy
//! trait, through which containers obtain and release their backing
//! buffers, along with the two production strategies:
//!
//! - [`HeapAllocator`] hands out memory from the process heap;
//! - [`NullAllocator`] never hands out anything, which guarantees that
//!   a container built over a fixed region will never allocate.
//!
//! The [`testing`] module adds counting and fault-injecting wrappers,
//! useful to check that a container releases everything it obtains and
//! survives allocation failures.
//!
//! # Examples
//!
//! ```rust
//! use std::alloc::Layout;
//! use deque_alloc::{DequeAllocator, HeapAllocator, NullAllocator};
//!
//! let layout = Layout::array::<usize>(8).unwrap();
//!
//! let ptr = HeapAllocator.allocate(layout).expect("heap should have room");
//! // SAFETY: `ptr` was just obtained from `HeapAllocator` with `layout`.
//! unsafe { HeapAllocator.release(ptr, layout) };
//!
//! assert!(NullAllocator.allocate(layout).is_none());
//! ```
mod heap;
mod null;
pub mod testing;

use std::alloc::Layout;
use std::ptr::NonNull;

pub use heap::HeapAllocator;
pub use null::NullAllocator;

/// A [`DequeAllocator`] is a source of raw memory blocks.
///
/// The allocator value itself is the allocation context: containers
/// only ever borrow it, and the owner must keep it alive for as long
/// as any container refers to it.
pub trait DequeAllocator {
    /// Returns a block of at least `layout.size()` bytes aligned to
    /// `layout.align()`, or `None` when no memory is available.
    ///
    /// Failure is a normal outcome, not a panic.
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Returns `ptr` to the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `self.allocate(layout)` with
    /// the same `layout`, and not released since.
    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout);
}

impl<A: DequeAllocator + ?Sized> DequeAllocator for &A {
    #[inline(always)]
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        (**self).allocate(layout)
    }

    #[inline(always)]
    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded verbatim from our caller.
        unsafe { (**self).release(ptr, layout) }
    }
}

/// An [`AllocError`] reports that an allocator could not (or would
/// not) provide the memory we asked for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct AllocError;

impl std::fmt::Display for AllocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("memory allocation failed")
    }
}

impl std::error::Error for AllocError {}

#[test]
fn test_alloc_error_display_miri() {
    assert_eq!(AllocError.to_string(), "memory allocation failed");
}

#[test]
fn test_allocator_by_reference_miri() {
    fn roundtrip(alloc: impl DequeAllocator) -> bool {
        let layout = Layout::new::<u64>();
        match alloc.allocate(layout) {
            Some(ptr) => {
                // SAFETY: fresh allocation with the same layout.
                unsafe { alloc.release(ptr, layout) };
                true
            }
            None => false,
        }
    }

    let heap = HeapAllocator;
    assert!(roundtrip(&heap));
    assert!(!roundtrip(&NullAllocator));

    let dynamic: &dyn DequeAllocator = &heap;
    assert!(roundtrip(dynamic));
}
