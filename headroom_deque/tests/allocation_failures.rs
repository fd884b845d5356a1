//! Allocation-failure injection: whichever allocation fails, the deque
//! must report it, keep every element it already had, and release
//! exactly what it allocated.
use deque_alloc::testing::CountingAllocator;
use deque_alloc::testing::FaultInjectingAllocator;
use headroom_deque::Deque;
use headroom_deque::HeapAllocator;
use rusty_fork::rusty_fork_test;

/// Number of allocations a capacity-4 deque makes while growing to
/// hold 200 elements (the initial buffer, then one per doubling).
fn allocations_for_200() -> usize {
    let counting = CountingAllocator::new(HeapAllocator);
    let mut deque = Deque::with_capacity_in(4, &counting).unwrap();
    for i in 0..200u32 {
        deque.push(i).unwrap();
    }
    drop(deque);

    counting.stats().allocations
}

#[test]
fn fail_each_allocation_in_turn() {
    let total = allocations_for_200();
    assert!(total > 2);

    for failing in 1..=total {
        let counting = CountingAllocator::new(HeapAllocator);
        let faulty = FaultInjectingAllocator::new(&counting);
        faulty.fail_call(failing);

        let Ok(mut deque) = Deque::with_capacity_in(4, &faulty) else {
            assert_eq!(failing, 1);
            assert!(counting.stats().is_balanced());
            continue;
        };

        let mut pushed = Vec::new();
        let mut failures = 0;
        for i in 0..200u32 {
            match deque.push(i) {
                Ok(()) => pushed.push(i),
                Err(err) => {
                    assert_eq!(err.into_inner(), i);
                    failures += 1;
                }
            }

            assert_eq!(deque.len(), pushed.len());
            assert_eq!(deque.peek_top(0), pushed.last().copied());
            assert_eq!(deque.peek_bottom(0), pushed.first().copied());
        }

        // A failed grow with a single free slot at the front falls back
        // to sliding, so the push may still succeed.
        assert!(failures <= 1, "call {failing} failed {failures} pushes");
        assert_eq!(pushed.len() + failures, 200);
        assert_eq!(faulty.failures(), 1);

        // Every element that made it in is still there, in order.
        for &expected in &pushed {
            assert_eq!(deque.shift(), Some(expected));
        }
        assert_eq!(deque.shift(), None);

        deque.free();
        let stats = counting.stats();
        assert!(stats.is_balanced(), "call {failing}: {stats:?}");
        assert_eq!(stats.allocations, stats.releases);
        assert_eq!(stats.allocated_bytes, stats.released_bytes);
    }
}

#[test]
fn unshift_failure_keeps_elements() {
    let counting = CountingAllocator::new(HeapAllocator);
    let faulty = FaultInjectingAllocator::new(&counting);
    {
        let mut deque = Deque::with_capacity_in(8, &faulty).unwrap();
        faulty.fail_after(0);

        let mut unshifted = Vec::new();
        let rejected = loop {
            let value = unshifted.len() as u32;
            match deque.unshift(value) {
                Ok(()) => unshifted.push(value),
                Err(err) => break err.into_inner(),
            }
        };

        assert_eq!(rejected as usize, unshifted.len());
        assert_eq!(deque.len(), deque.capacity());

        // Popping from the top returns insertion order.
        for &expected in &unshifted {
            assert_eq!(deque.pop(), Some(expected));
        }
    }

    assert!(counting.stats().is_balanced());
}

#[test]
fn construction_failure_releases_nothing() {
    let counting = CountingAllocator::new(HeapAllocator);
    let faulty = FaultInjectingAllocator::new(&counting);
    faulty.fail_after(0);

    assert!(Deque::<u32, _>::new_in(&faulty).is_err());
    let stats = counting.stats();
    assert_eq!(stats.allocations, 0);
    assert_eq!(stats.releases, 0);
}

// `HeapAllocator` counters are process-wide: check them in a child
// process, away from concurrent tests.
rusty_fork_test! {
    #[test]
    fn heap_deque_releases_everything() {
        let base_count = HeapAllocator::num_live_allocations();
        let base_bytes = HeapAllocator::num_live_bytes();

        let mut deque = Deque::new().unwrap();
        assert_eq!(HeapAllocator::num_live_allocations(), base_count + 1);

        for i in 0..10_000u64 {
            deque.push(i).unwrap();
            deque.unshift(i).unwrap();
        }
        assert_eq!(HeapAllocator::num_live_allocations(), base_count + 1);
        assert!(HeapAllocator::num_live_bytes() >= base_bytes + 20_000 * 8);

        deque.clear();
        assert_eq!(HeapAllocator::num_live_allocations(), base_count + 1);

        deque.free();
        assert_eq!(HeapAllocator::num_live_allocations(), base_count);
        assert_eq!(HeapAllocator::num_live_bytes(), base_bytes);
    }
}
