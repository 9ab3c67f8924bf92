//! End-to-end scheduler scenarios.

use quarterdeck::{install_system_scheduler, query_system_context, Priority, Scheduler, SchedulerBuilder};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::time::{Duration, Instant};

fn wait_until(deadline: Duration, predicate: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    predicate()
}

#[test]
fn fan_out_executes_every_task_exactly_once() {
    let total = 100_000;
    let counter = Arc::new(AtomicUsize::new(0));

    let scheduler = SchedulerBuilder::new()
        .worker_threads(4)
        .numa_pinning(false)
        .build()
        .expect("pool should start");

    for _ in 0..total {
        let counter = Arc::clone(&counter);
        scheduler.schedule(Priority::Normal, move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }
    drop(scheduler);

    assert_eq!(counter.load(Ordering::SeqCst), total);
}

#[test]
fn critical_tasks_run_before_low_tasks_in_the_same_queue() {
    // A single worker makes queue targeting deterministic: every
    // submission lands on queue 0.
    let scheduler = SchedulerBuilder::new()
        .worker_threads(1)
        .numa_pinning(false)
        .build()
        .expect("pool should start");

    // Gate the worker so both batches queue up before anything runs.
    let gate = Arc::new(Barrier::new(2));
    {
        let gate = Arc::clone(&gate);
        scheduler.schedule(Priority::Critical, move || {
            gate.wait();
        });
    }

    let order: Arc<Mutex<Vec<Priority>>> = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..10 {
        let order = Arc::clone(&order);
        scheduler.schedule(Priority::Low, move || {
            order.lock().unwrap().push(Priority::Low);
        });
    }
    for _ in 0..10 {
        let order = Arc::clone(&order);
        scheduler.schedule(Priority::Critical, move || {
            order.lock().unwrap().push(Priority::Critical);
        });
    }

    gate.wait();
    assert!(
        wait_until(Duration::from_secs(10), || order.lock().unwrap().len() == 20),
        "all 20 tasks should complete"
    );

    let order = order.lock().unwrap();
    assert_eq!(
        &order[..10],
        &[Priority::Critical; 10],
        "every critical task must finish before any low task"
    );
}

#[test]
fn load_spreads_across_workers() {
    let workers = 4;
    let total = 64;

    let scheduler = SchedulerBuilder::new()
        .worker_threads(workers)
        .thread_name_prefix("spread-worker")
        .numa_pinning(false)
        .build()
        .expect("pool should start");

    let executors: Arc<Mutex<std::collections::HashSet<String>>> =
        Arc::new(Mutex::new(std::collections::HashSet::new()));
    let done = Arc::new(AtomicUsize::new(0));
    for _ in 0..total {
        let executors = Arc::clone(&executors);
        let done = Arc::clone(&done);
        scheduler.schedule(Priority::Normal, move || {
            // Sleeping keeps each worker busy long enough that the others
            // must pick up (and steal) the remaining load.
            std::thread::sleep(Duration::from_millis(2));
            if let Some(name) = std::thread::current().name() {
                executors.lock().unwrap().insert(name.to_string());
            }
            done.fetch_add(1, Ordering::Relaxed);
        });
    }
    assert!(
        wait_until(Duration::from_secs(30), || done.load(Ordering::SeqCst) == total),
        "all tasks should complete"
    );

    let executors = executors.lock().unwrap();
    assert!(
        executors.len() >= 2,
        "load should spread beyond one worker, saw {executors:?}"
    );
    for name in executors.iter() {
        assert!(
            name.starts_with("spread-worker"),
            "tasks must run on pool workers, saw {name}"
        );
    }
}

#[test]
fn bulk_schedule_covers_every_index_exactly_once() {
    let n = 97;
    let hits: Arc<Vec<AtomicU32>> = Arc::new((0..n).map(|_| AtomicU32::new(0)).collect());

    let scheduler = SchedulerBuilder::new()
        .worker_threads(4)
        .numa_pinning(false)
        .build()
        .expect("pool should start");

    {
        let hits = Arc::clone(&hits);
        scheduler.bulk_schedule(n as u32, Priority::Normal, move |i| {
            hits[i as usize].fetch_add(1, Ordering::Relaxed);
        });
    }
    drop(scheduler);

    for (index, hit) in hits.iter().enumerate() {
        assert_eq!(
            hit.load(Ordering::SeqCst),
            1,
            "index {index} must run exactly once"
        );
    }
}

#[test]
fn graceful_shutdown_drains_every_pending_task() {
    let total = 1_000;
    let counter = Arc::new(AtomicUsize::new(0));

    let scheduler = SchedulerBuilder::new()
        .worker_threads(4)
        .numa_pinning(false)
        .build()
        .expect("pool should start");

    for _ in 0..total {
        let counter = Arc::clone(&counter);
        scheduler.schedule(Priority::Normal, move || {
            std::thread::sleep(Duration::from_micros(100));
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }
    scheduler.set_stopped();
    drop(scheduler);

    assert_eq!(counter.load(Ordering::SeqCst), total);
}

#[test]
fn shutdown_is_idempotent_and_terminal() {
    let counter = Arc::new(AtomicUsize::new(0));
    let scheduler = SchedulerBuilder::new()
        .worker_threads(2)
        .numa_pinning(false)
        .build()
        .expect("pool should start");

    for _ in 0..100 {
        let counter = Arc::clone(&counter);
        scheduler.schedule(Priority::Normal, move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }
    scheduler.set_stopped();
    scheduler.set_stopped();
    assert!(scheduler.is_stopped());

    // Submissions after stop are silently dropped.
    {
        let counter = Arc::clone(&counter);
        scheduler.schedule(Priority::Critical, move || {
            counter.fetch_add(1_000_000, Ordering::Relaxed);
        });
    }
    drop(scheduler);

    assert_eq!(counter.load(Ordering::SeqCst), 100);
}

#[test]
fn panicking_task_does_not_kill_its_worker() {
    let counter = Arc::new(AtomicUsize::new(0));
    let scheduler = SchedulerBuilder::new()
        .worker_threads(1)
        .numa_pinning(false)
        .build()
        .expect("pool should start");

    scheduler.schedule(Priority::Normal, || panic!("task failure"));
    {
        let counter = Arc::clone(&counter);
        scheduler.schedule(Priority::Normal, move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }
    drop(scheduler);

    assert_eq!(
        counter.load(Ordering::SeqCst),
        1,
        "the worker must survive the panic and run the next task"
    );
}

#[test]
fn tasks_can_resubmit_through_the_process_default() {
    // One test owns all process-default interactions to avoid cross-test
    // interference on the global slot.
    let pool = SchedulerBuilder::new()
        .worker_threads(2)
        .numa_pinning(false)
        .build()
        .expect("pool should start");
    let replacement = Arc::new(Scheduler::Pool(pool));
    install_system_scheduler(Arc::clone(&replacement));

    let current = query_system_context();
    assert!(
        Arc::ptr_eq(&current, &replacement),
        "query_system_context must hand back the installed instance"
    );

    let counter = Arc::new(AtomicUsize::new(0));
    {
        let counter = Arc::clone(&counter);
        let inner = Arc::clone(&current);
        current.schedule(Priority::Normal, move || {
            let counter = Arc::clone(&counter);
            // Fan a second task out from inside the first.
            inner.schedule(Priority::High, move || {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        });
    }

    assert!(
        wait_until(Duration::from_secs(10), || counter.load(Ordering::SeqCst) == 1),
        "nested submission should execute"
    );
    assert_eq!(current.get_priority(), Priority::Normal);
}

#[test]
fn set_error_reports_without_stopping_the_pool() {
    let scheduler = SchedulerBuilder::new()
        .worker_threads(1)
        .numa_pinning(false)
        .build()
        .expect("pool should start");

    let failure = std::io::Error::new(std::io::ErrorKind::Other, "external failure");
    scheduler.set_error(&failure);
    assert!(!scheduler.is_stopped());

    let counter = Arc::new(AtomicUsize::new(0));
    {
        let counter = Arc::clone(&counter);
        scheduler.schedule(Priority::Normal, move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }
    drop(scheduler);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}
