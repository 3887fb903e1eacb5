use quickcheck_macros::quickcheck;
use std::{collections::VecDeque, thread, vec::Vec};

use super::*;

#[test]
fn zero_capacity_is_rejected() {
    assert_eq!(
        AtomicFifo::<u32>::new(0).err(),
        Some(NewFifoError::ConfigurationError)
    );
    assert_eq!(
        AtomicFifoPair::<u32, u32>::new(0).err(),
        Some(NewFifoError::ConfigurationError)
    );
    assert_eq!(
        AtomicFifo::<u32>::new(usize::MAX).err(),
        Some(NewFifoError::ConfigurationError)
    );
}

#[test]
fn refills_after_get() {
    let fifo = AtomicFifo::new(4).unwrap();
    assert!(fifo.put(1));
    assert!(fifo.put(2));
    assert!(fifo.put(3));
    assert!(fifo.put(4));
    assert!(!fifo.put(5));
    assert_eq!(fifo.try_put(5), Err(PutError::Full));
    assert_eq!(fifo.len(), 4);

    assert_eq!(fifo.get(), Ok(1));
    assert_eq!(fifo.get(), Ok(2));
    assert!(fifo.put(5));

    assert_eq!(fifo.get(), Ok(3));
    assert_eq!(fifo.get(), Ok(4));
    assert_eq!(fifo.get(), Ok(5));
    assert_eq!(fifo.get(), Err(GetError::Empty));
    assert!(fifo.is_empty());
}

#[test]
fn capacity_one_wraps() {
    let fifo = AtomicFifo::new(1).unwrap();
    assert_eq!(fifo.capacity(), 1);
    for i in 0..10u8 {
        assert!(fifo.put(i));
        assert!(!fifo.put(i));
        assert_eq!(fifo.len(), 1);
        assert_eq!(fifo.get(), Ok(i));
        assert_eq!(fifo.len(), 0);
    }
}

#[test]
fn nested_puts_are_delivered_in_completion_order() {
    let fifo = AtomicFifo::new(4).unwrap();
    fifo.ring
        .put_preempted(1, || {
            // An interrupt handler runs to completion while the outer `put` is
            // between its write and its publication
            assert!(fifo.put(2));
            assert!(fifo.put(3));
            // The nested items are readable right away
            assert_eq!(fifo.len(), 2);
        })
        .unwrap();

    assert_eq!(fifo.len(), 3);
    assert_eq!(fifo.get(), Ok(2));
    assert_eq!(fifo.get(), Ok(3));
    assert_eq!(fifo.get(), Ok(1));
}

#[test]
fn nested_put_sees_full_fifo() {
    let fifo = AtomicFifo::new(2).unwrap();
    assert!(fifo.put(0));
    fifo.ring
        .put_preempted(1, || {
            // The preempted put already holds the last free slot
            assert_eq!(fifo.try_put(2), Err(PutError::Full));
        })
        .unwrap();
    assert_eq!(fifo.get(), Ok(0));
    assert_eq!(fifo.get(), Ok(1));
    assert_eq!(fifo.get(), Err(GetError::Empty));
}

#[test]
fn doubly_nested_puts() {
    let fifo = AtomicFifoPair::new(8).unwrap();
    fifo.ring
        .put_preempted((0, 'a'), || {
            fifo.ring
                .put_preempted((1, 'b'), || {
                    assert!(fifo.put(2, 'c'));
                })
                .unwrap();
            assert_eq!(fifo.len(), 2);
            assert!(fifo.put(3, 'd'));
        })
        .unwrap();

    let got: Vec<_> = std::iter::from_fn(|| fifo.get().ok()).collect();
    assert_eq!(got, [(2, 'c'), (1, 'b'), (3, 'd'), (0, 'a')]);
}

#[test]
fn slots_are_recycled_in_any_order() {
    let fifo = AtomicFifo::new(3).unwrap();
    for round in 0..20u32 {
        fifo.ring
            .put_preempted(round * 10, || {
                assert!(fifo.put(round * 10 + 1));
            })
            .unwrap();
        assert!(fifo.put(round * 10 + 2));
        assert!(!fifo.put(round * 10 + 3));
        assert_eq!(fifo.get(), Ok(round * 10 + 1));
        assert_eq!(fifo.get(), Ok(round * 10));
        assert_eq!(fifo.get(), Ok(round * 10 + 2));
        assert_eq!(fifo.get(), Err(GetError::Empty));
    }
}

#[test]
fn reentrant_get_is_rejected() {
    let fifo = AtomicFifo::new(2).unwrap();
    assert!(fifo.put(1));
    let _guard = ring::ConsumerGuard::new(&fifo.ring.consumer_busy).unwrap();
    assert_eq!(fifo.get(), Err(GetError::BadContext));
}

#[test]
fn deinit_is_idempotent() {
    let fifo = AtomicFifo::new(2).unwrap();
    assert!(fifo.put(1));
    fifo.deinit();
    fifo.deinit();
    assert!(fifo.is_deinited());
    assert!(!fifo.put(2));
    assert_eq!(fifo.try_put(2), Err(PutError::InvalidState));
    assert_eq!(fifo.get(), Err(GetError::InvalidState));
}

#[test]
fn pair_is_delivered_whole() {
    let fifo = AtomicFifoPair::new(3).unwrap();
    assert!(fifo.put(1u16, -1i64));
    assert!(fifo.put(2, -2));
    assert_eq!(fifo.try_put(3, -3), Ok(()));
    assert_eq!(fifo.try_put(4, -4), Err(PutError::Full));
    assert_eq!(fifo.get(), Ok((1, -1)));
    assert_eq!(fifo.get(), Ok((2, -2)));
    assert_eq!(fifo.get(), Ok((3, -3)));
    assert_eq!(fifo.get(), Err(GetError::Empty));
}

#[test]
fn spsc_across_threads() {
    const COUNT: u32 = 100_000;
    let fifo = AtomicFifo::new(16).unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..COUNT {
                while !fifo.put(i) {
                    thread::yield_now();
                }
            }
        });

        // Neither the producer nor the consumer
        s.spawn(|| {
            for _ in 0..COUNT {
                assert!(fifo.len() <= fifo.capacity());
            }
        });

        let mut expected = 0;
        while expected < COUNT {
            match fifo.get() {
                Ok(x) => {
                    assert_eq!(x, expected);
                    expected += 1;
                }
                Err(GetError::Empty) => thread::yield_now(),
                Err(e) => panic!("{e:?}"),
            }
            assert!(fifo.len() <= fifo.capacity());
        }
    });
}

/// Compare against `VecDeque` with random put/get sequences.
#[quickcheck]
fn matches_bounded_deque(capacity: u8, ops: Vec<Option<u16>>) {
    let capacity = usize::from(capacity % 16) + 1;
    let fifo = AtomicFifo::new(capacity).unwrap();
    let mut reference = VecDeque::new();

    for op in ops {
        match op {
            Some(x) => {
                let accepted = fifo.put(x);
                assert_eq!(accepted, reference.len() < capacity);
                if accepted {
                    reference.push_back(x);
                }
            }
            None => {
                assert_eq!(fifo.get().ok(), reference.pop_front());
            }
        }
        assert_eq!(fifo.len(), reference.len());
    }
}
