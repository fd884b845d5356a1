//! Model-based tests: random operation sequences on a [`Deque`] must
//! behave like the same sequence on a [`VecDeque`].
use std::collections::VecDeque;
use std::ops::ControlFlow;

use deque_alloc::testing::CountingAllocator;
use headroom_deque::Deque;
use headroom_deque::DequeAllocator;
use headroom_deque::HeapAllocator;
use headroom_deque::NullAllocator;
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Push(u32),
    Pop,
    Unshift(u32),
    Shift,
    PeekTop(usize),
    PeekBottom(usize),
    Clear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        8 => any::<u32>().prop_map(Op::Push),
        4 => Just(Op::Pop),
        8 => any::<u32>().prop_map(Op::Unshift),
        4 => Just(Op::Shift),
        2 => (0usize..40).prop_map(Op::PeekTop),
        2 => (0usize..40).prop_map(Op::PeekBottom),
        1 => Just(Op::Clear),
    ]
}

fn contents<A: DequeAllocator + ?Sized>(deque: &Deque<'_, u32, A>) -> Vec<u32> {
    let mut ret = Vec::with_capacity(deque.len());
    let flow = deque.for_each(|_, item| {
        ret.push(item);
        ControlFlow::Continue(())
    });
    assert_eq!(flow, ControlFlow::Continue(()));
    ret
}

/// Applies `op` to both containers.  Insertions into `deque` may only
/// fail when it's full; `model` then stays as is.
fn apply<A: DequeAllocator + ?Sized>(
    deque: &mut Deque<'_, u32, A>,
    model: &mut VecDeque<u32>,
    op: &Op,
) -> Result<(), TestCaseError> {
    match *op {
        Op::Push(value) => match deque.push(value) {
            Ok(()) => model.push_back(value),
            Err(err) => {
                prop_assert_eq!(err.into_inner(), value);
                prop_assert_eq!(deque.len(), deque.capacity());
            }
        },
        Op::Unshift(value) => match deque.unshift(value) {
            Ok(()) => model.push_front(value),
            Err(err) => {
                prop_assert_eq!(err.into_inner(), value);
                prop_assert_eq!(deque.len(), deque.capacity());
            }
        },
        Op::Pop => prop_assert_eq!(deque.pop(), model.pop_back()),
        Op::Shift => prop_assert_eq!(deque.shift(), model.pop_front()),
        Op::PeekTop(index) => {
            let expected = model.len().checked_sub(index + 1).map(|i| model[i]);
            prop_assert_eq!(deque.peek_top(index), expected);
        }
        Op::PeekBottom(index) => prop_assert_eq!(deque.peek_bottom(index), model.get(index).copied()),
        Op::Clear => {
            deque.clear();
            model.clear();
        }
    }

    prop_assert_eq!(deque.len(), model.len());
    prop_assert_eq!(deque.is_empty(), model.is_empty());
    prop_assert!(deque.len() <= deque.capacity());
    Ok(())
}

proptest! {
    #[test]
    fn heap_deque_matches_vecdeque(
        capacity in 0usize..16,
        ops in proptest::collection::vec(op_strategy(), 0..300),
    ) {
        let alloc = CountingAllocator::new(HeapAllocator);
        {
            let mut deque = Deque::with_capacity_in(capacity, &alloc).unwrap();
            let mut model = VecDeque::new();

            for op in &ops {
                apply(&mut deque, &mut model, op)?;
            }

            prop_assert_eq!(contents(&deque), model.iter().copied().collect::<Vec<_>>());
        }

        prop_assert!(alloc.stats().is_balanced());
    }

    #[test]
    fn fixed_deque_matches_vecdeque(
        region_len in 0usize..512,
        ops in proptest::collection::vec(op_strategy(), 0..300),
    ) {
        let mut region = vec![0u8; region_len];
        let Some(deque) = Deque::<u32, NullAllocator>::new_in_region(&mut region) else {
            prop_assert!(region_len < Deque::<u32, NullAllocator>::MIN_REGION_LEN);
            return Ok(());
        };

        let capacity = deque.capacity();
        let mut model = VecDeque::new();
        for op in &ops {
            apply(&mut *deque, &mut model, op)?;
            prop_assert_eq!(deque.capacity(), capacity);
        }

        prop_assert_eq!(contents(&*deque), model.iter().copied().collect::<Vec<_>>());
    }

    #[test]
    fn size_counts_successful_operations(
        ops in proptest::collection::vec(op_strategy(), 0..300),
    ) {
        let mut deque = Deque::new().unwrap();
        let mut inserted = 0usize;
        let mut removed = 0usize;

        for op in &ops {
            match *op {
                Op::Push(value) => {
                    deque.push(value).unwrap();
                    inserted += 1;
                }
                Op::Unshift(value) => {
                    deque.unshift(value).unwrap();
                    inserted += 1;
                }
                Op::Pop => removed += usize::from(deque.pop().is_some()),
                Op::Shift => removed += usize::from(deque.shift().is_some()),
                Op::PeekTop(_) | Op::PeekBottom(_) | Op::Clear => continue,
            }

            prop_assert_eq!(deque.len(), inserted - removed);
        }
    }

    #[test]
    fn for_each_stops_where_asked(
        values in proptest::collection::vec(any::<u32>(), 0..100),
        stop_at in 0usize..120,
    ) {
        let mut deque = Deque::new().unwrap();
        for &value in &values {
            deque.push(value).unwrap();
        }

        let mut seen = Vec::new();
        let flow = deque.for_each(|_, item| {
            if seen.len() == stop_at {
                return ControlFlow::Break(());
            }
            seen.push(item);
            ControlFlow::Continue(())
        });

        let expected_len = values.len().min(stop_at);
        prop_assert_eq!(flow.is_break(), stop_at < values.len());
        prop_assert_eq!(&seen[..], &values[..expected_len]);
    }
}

#[test]
fn growth_preserves_insertion_order() {
    let alloc = CountingAllocator::new(HeapAllocator);
    {
        let mut deque = Deque::with_capacity_in(4, &alloc).unwrap();
        for i in 0..1000u32 {
            deque.push(i).unwrap();
        }
        assert!(alloc.stats().allocations > 1);

        for i in 0..1000u32 {
            assert_eq!(deque.shift(), Some(i));
        }
        assert_eq!(deque.shift(), None);
    }

    assert!(alloc.stats().is_balanced());
}
