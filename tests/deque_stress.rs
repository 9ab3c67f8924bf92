//! Stress tests for the work-stealing deque under owner/thief contention.

use quarterdeck::scheduler::deque::StealDeque;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

/// One pusher, several thieves, every pushed value taken exactly once.
#[test]
fn one_pusher_many_thieves_account_for_every_entry() {
    let total: usize = 100_000;
    let thief_count = thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(3)
        .clamp(2, 8);

    let deque: Arc<StealDeque<usize>> = Arc::new(StealDeque::with_capacity(64));
    let counts: Arc<Vec<AtomicUsize>> =
        Arc::new((0..total).map(|_| AtomicUsize::new(0)).collect());
    let producer_done = Arc::new(AtomicBool::new(false));
    let barrier = Arc::new(Barrier::new(thief_count + 1));

    let mut thieves = Vec::new();
    for _ in 0..thief_count {
        let deque = Arc::clone(&deque);
        let counts = Arc::clone(&counts);
        let producer_done = Arc::clone(&producer_done);
        let barrier = Arc::clone(&barrier);
        thieves.push(thread::spawn(move || {
            barrier.wait();
            loop {
                match deque.steal() {
                    Some(value) => {
                        counts[value].fetch_add(1, Ordering::SeqCst);
                    }
                    None => {
                        if producer_done.load(Ordering::SeqCst) && deque.is_empty() {
                            break;
                        }
                        thread::yield_now();
                    }
                }
            }
        }));
    }

    barrier.wait();
    // The owner interleaves pushes with occasional pops, repeatedly growing
    // the deque past its initial capacity.
    for value in 0..total {
        deque.push(value);
        if value % 13 == 0 {
            if let Some(popped) = deque.pop() {
                counts[popped].fetch_add(1, Ordering::SeqCst);
            }
        }
    }
    while let Some(popped) = deque.pop() {
        counts[popped].fetch_add(1, Ordering::SeqCst);
    }
    producer_done.store(true, Ordering::SeqCst);

    for thief in thieves {
        thief.join().expect("thief join");
    }

    // Late steals may have landed between the owner's final pop and the
    // done flag; drain any leftovers before accounting.
    while let Some(popped) = deque.pop() {
        counts[popped].fetch_add(1, Ordering::SeqCst);
    }

    let mut executed = 0;
    for (value, count) in counts.iter().enumerate() {
        let seen = count.load(Ordering::SeqCst);
        assert!(seen <= 1, "entry {value} taken {seen} times");
        executed += seen;
    }
    assert_eq!(executed, total, "every entry must be taken exactly once");
}

/// Size invariant holds at every quiescent observation point.
#[test]
fn quiescent_size_stays_within_capacity() {
    let deque = StealDeque::with_capacity(4);
    for round in 0..5 {
        for value in 0..(1 << (round + 3)) {
            deque.push(value);
            assert!(deque.len() <= deque.capacity());
        }
        while deque.pop().is_some() {}
        assert_eq!(deque.len(), 0);
    }
}

/// Thieves contending on a single entry never duplicate it.
#[test]
fn contended_single_entry_is_stolen_once() {
    for _ in 0..200 {
        let deque = Arc::new(StealDeque::with_capacity(4));
        deque.push(7_usize);

        let winners = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(4));
        let mut thieves = Vec::new();
        for _ in 0..4 {
            let deque = Arc::clone(&deque);
            let winners = Arc::clone(&winners);
            let barrier = Arc::clone(&barrier);
            thieves.push(thread::spawn(move || {
                barrier.wait();
                if deque.steal().is_some() {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for thief in thieves {
            thief.join().expect("thief join");
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}

/// Steal order matches push order even while the owner keeps pushing.
#[test]
fn steals_observe_push_order() {
    let total = 10_000;
    let deque = Arc::new(StealDeque::with_capacity(16));
    let stolen = Arc::new(Mutex::new(Vec::new()));
    let producer_done = Arc::new(AtomicBool::new(false));

    let thief = {
        let deque = Arc::clone(&deque);
        let stolen = Arc::clone(&stolen);
        let producer_done = Arc::clone(&producer_done);
        thread::spawn(move || loop {
            match deque.steal() {
                Some(value) => stolen.lock().unwrap().push(value),
                None => {
                    if producer_done.load(Ordering::SeqCst) && deque.is_empty() {
                        break;
                    }
                    thread::yield_now();
                }
            }
        })
    };

    for value in 0..total {
        deque.push(value);
    }
    producer_done.store(true, Ordering::SeqCst);
    thief.join().expect("thief join");

    let stolen = stolen.lock().unwrap();
    assert_eq!(stolen.len(), total, "single thief must take everything");
    for window in stolen.windows(2) {
        assert!(
            window[0] < window[1],
            "steal order must follow push order: {} before {}",
            window[0],
            window[1]
        );
    }

    // Cross-check exactly-once while we have the full log.
    let unique: HashSet<_> = stolen.iter().copied().collect();
    assert_eq!(unique.len(), total);
}
