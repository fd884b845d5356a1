use std::alloc::Layout;
use std::ptr::NonNull;

use crate::DequeAllocator;

/// The [`NullAllocator`] refuses every allocation request.
///
/// Containers built over a caller-supplied region use it so that any
/// attempt to grow past the region observably fails, rather than
/// silently moving to the heap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NullAllocator;

impl NullAllocator {
    /// A `'static` instance, for containers that must hold a
    /// reference to their allocator.
    pub const GLOBAL: &'static NullAllocator = &NullAllocator;
}

impl DequeAllocator for NullAllocator {
    #[inline(always)]
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        tracing::trace!(size = layout.size(), "null allocator refused request");
        None
    }

    /// Nothing was ever handed out, so there is nothing to release:
    /// this is a no-op for any pointer.
    #[inline(always)]
    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        let _ = (ptr, layout);
    }
}

#[test]
fn test_always_fails_miri() {
    for size in [1usize, 8, 4096, 1 << 30] {
        let layout = Layout::from_size_align(size, 8).unwrap();
        assert!(NullAllocator.allocate(layout).is_none());
        assert!(NullAllocator::GLOBAL.allocate(layout).is_none());
    }
}

#[test]
fn test_release_is_harmless_miri() {
    let layout = Layout::new::<u64>();
    // SAFETY: `NullAllocator::release` never touches its argument.
    unsafe { NullAllocator.release(NonNull::dangling(), layout) };
}
