//! The `headroom_deque` crate defines the [`Deque`] container, a
//! double-ended queue that keeps its elements in a single contiguous
//! buffer, with free headroom at both ends.
//!
//! Like the standard [`VecDeque`], a [`Deque`] supports amortised
//! constant-time insertion and removal at both ends.  Unlike
//! [`VecDeque`], the buffer comes from a pluggable
//! [`DequeAllocator`], and a [`Deque`] may also live entirely in a
//! caller-supplied byte region, without ever allocating (see
//! [`Deque::new_in_region`]).  That makes it usable on targets without
//! a heap.
//!
//! A [`Deque`] only stores [`Copy`] handles (references, indices, raw
//! pointers): it never takes ownership of what they refer to.
//!
//! Insertions report allocation failures as a [`PushError`] instead
//! of aborting, and leave the deque unchanged; queries on an empty
//! deque (or past its end) simply return `None`.
//!
//! # Examples
//!
//! ```rust
//! use headroom_deque::Deque;
//!
//! let mut deque = Deque::new().expect("heap should have room");
//! deque.push("one").unwrap();
//! deque.push("two").unwrap();
//! deque.unshift("zero").unwrap();
//!
//! assert_eq!(deque.len(), 3);
//! assert_eq!(deque.peek_top(0), Some("two"));
//! assert_eq!(deque.peek_bottom(0), Some("zero"));
//! assert_eq!(deque.shift(), Some("zero"));
//! assert_eq!(deque.pop(), Some("two"));
//! ```
//!
//! ```rust
//! use headroom_deque::{Deque, NullAllocator};
//!
//! let mut region = [0u8; 256];
//! let deque = Deque::<u32, NullAllocator>::new_in_region(&mut region)
//!     .expect("region should be large enough");
//!
//! let capacity = deque.capacity();
//! for i in 0..capacity {
//!     deque.push(i as u32).unwrap();
//! }
//!
//! // The region is full, and there is no heap to grow into.
//! assert!(deque.push(0).is_err());
//! assert_eq!(deque.len(), capacity);
//! ```
//!
//! [`VecDeque`]: std::collections::VecDeque
mod deque;
mod error;
mod fixed;
pub mod policy;
mod raw;

pub use deque::Deque;
pub use error::PushError;
pub use fixed::region_len_for;
pub use policy::DEFAULT_CAPACITY;
pub use policy::MIN_CAPACITY;

pub use deque_alloc::AllocError;
pub use deque_alloc::DequeAllocator;
pub use deque_alloc::HeapAllocator;
pub use deque_alloc::NullAllocator;
