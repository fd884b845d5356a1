//! Sizing policy for [`crate::Deque`] buffers.
//!
//! These constants only tune space/time trade-offs: any values that
//! keep the headroom strictly below the capacity preserve correctness.

/// Number of slots in the buffer of a default-constructed deque.
pub const DEFAULT_CAPACITY: usize = 32;

/// Every deque buffer has at least this many slots, including deques
/// carved out of a fixed region.
pub const MIN_CAPACITY: usize = 4;

/// Buffers double in size whenever they must grow.
pub const GROWTH_FACTOR: usize = 2;

const _: () = assert!(DEFAULT_CAPACITY >= MIN_CAPACITY);
const _: () = assert!(reserved_headroom(MIN_CAPACITY) < MIN_CAPACITY);
const _: () = assert!(GROWTH_FACTOR >= 2);

/// Returns the position of both cursors in a fresh, cleared, or
/// drained buffer of `capacity` slots: a quarter of the buffer is
/// kept free for prepending.
#[inline(always)]
#[must_use]
pub const fn reserved_headroom(capacity: usize) -> usize {
    capacity / 4
}

/// Returns the position of both cursors before prepending to an empty
/// deque: just past the middle, so both ends have room to grow.
#[inline(always)]
#[must_use]
pub const fn unshift_recenter(capacity: usize) -> usize {
    capacity / 2 + 1
}

/// Returns the capacity after growing a buffer of `capacity` slots,
/// or `None` on overflow.
#[inline(always)]
#[must_use]
pub const fn grown_capacity(capacity: usize) -> Option<usize> {
    capacity.checked_mul(GROWTH_FACTOR)
}

/// Returns where the live elements land in a buffer of `new_capacity`
/// slots after growing because the back end ran out of room.
#[inline(always)]
#[must_use]
pub const fn push_growth_offset(new_capacity: usize) -> usize {
    reserved_headroom(new_capacity)
}

/// Returns where the live elements land in a buffer of `new_capacity`
/// slots after growing because the front end ran out of room.  The
/// whole front half goes to future prepends.
#[inline(always)]
#[must_use]
pub const fn unshift_growth_offset(new_capacity: usize) -> usize {
    new_capacity / 2
}

#[test]
fn test_positions_stay_in_bounds_miri() {
    for capacity in MIN_CAPACITY..=1024 {
        assert!(reserved_headroom(capacity) < capacity);
        assert!(unshift_recenter(capacity) <= capacity);
        assert!(unshift_recenter(capacity) > 0);
    }
}

#[test]
fn test_growth_leaves_room_miri() {
    // Growth happens when the old buffer is (nearly) full, so up to
    // `capacity` live elements must fit after the offset, with room
    // for one more on the growing side.
    for capacity in MIN_CAPACITY..=1024 {
        let grown = grown_capacity(capacity).unwrap();
        assert!(push_growth_offset(grown) + capacity < grown);
        assert!(unshift_growth_offset(grown) > 0);
        assert!(unshift_growth_offset(grown) + capacity <= grown);
    }

    assert_eq!(grown_capacity(usize::MAX), None);
}
