mod common;

use common::{DropCounter, init_tracing};
use kestrel::testing::serial;
use kestrel::time::sleep;
use kestrel::{RuntimeError, task};

use std::cell::Cell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn run_without_tasks_returns_immediately() {
    let _serial = serial();
    init_tracing();

    kestrel::init();
    let started = Instant::now();
    kestrel::run();

    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn loop_can_be_recreated_after_run() {
    let _serial = serial();

    for _ in 0..3 {
        assert_eq!(kestrel::try_init(), Ok(()));
        kestrel::run();
    }
}

#[test]
fn second_init_is_rejected() {
    let _serial = serial();

    kestrel::init();
    assert_eq!(kestrel::try_init(), Err(RuntimeError::AlreadyInitialized));

    let from_other_thread = thread::spawn(kestrel::try_init).join().unwrap();
    assert_eq!(from_other_thread, Err(RuntimeError::AlreadyInitialized));

    kestrel::run();
}

#[test]
fn stop_resumes_cancelled_tasks_once_and_destroys_the_rest() {
    const SPAWNED: usize = 6;
    const CANCELLED: usize = 2;

    let _serial = serial();
    init_tracing();

    let ran = Rc::new(Cell::new(0));
    let observed_cancel = Rc::new(Cell::new(0));
    let dropped = Rc::new(Cell::new(0));

    kestrel::init();

    task::spawn({
        let (ran, observed_cancel, dropped) =
            (ran.clone(), observed_cancel.clone(), dropped.clone());

        async move {
            let handles: Vec<_> = (0..SPAWNED)
                .map(|_| {
                    let (ran, observed_cancel) = (ran.clone(), observed_cancel.clone());
                    let guard = DropCounter(dropped.clone());

                    task::spawn(async move {
                        let _guard = guard;
                        if task::cancelled() {
                            observed_cancel.set(observed_cancel.get() + 1);
                        } else {
                            ran.set(ran.get() + 1);
                        }
                    })
                })
                .collect();

            for handle in &handles[..CANCELLED] {
                handle.cancel();
            }

            kestrel::stop();
        }
    });

    kestrel::run();

    assert_eq!(observed_cancel.get(), CANCELLED);
    assert_eq!(ran.get(), 0);
    assert_eq!(dropped.get(), SPAWNED);
}

/// Spawns a task that counts whether it saw its cancel flag or ran normally.
fn counted_task(
    ran: &Rc<Cell<usize>>,
    observed_cancel: &Rc<Cell<usize>>,
    dropped: &Rc<Cell<usize>>,
) -> task::JoinHandle<()> {
    let (ran, observed_cancel) = (ran.clone(), observed_cancel.clone());
    let guard = DropCounter(dropped.clone());

    task::spawn(async move {
        let _guard = guard;
        if task::cancelled() {
            observed_cancel.set(observed_cancel.get() + 1);
        } else {
            ran.set(ran.get() + 1);
        }
    })
}

#[test]
fn stop_between_init_and_run_settles_queued_tasks() {
    const SPAWNED: usize = 4;
    const CANCELLED: usize = 1;

    let _serial = serial();
    init_tracing();

    let ran = Rc::new(Cell::new(0));
    let observed_cancel = Rc::new(Cell::new(0));
    let dropped = Rc::new(Cell::new(0));

    kestrel::init();

    let handles: Vec<_> = (0..SPAWNED)
        .map(|_| counted_task(&ran, &observed_cancel, &dropped))
        .collect();
    for handle in &handles[..CANCELLED] {
        handle.cancel();
    }

    kestrel::stop();
    kestrel::run();

    assert_eq!(observed_cancel.get(), CANCELLED);
    assert_eq!(ran.get(), 0);
    assert_eq!(dropped.get(), SPAWNED);
    assert!(handles.iter().all(|handle| handle.is_finished()));
}

#[test]
fn stop_from_another_thread_mid_drain_skips_the_rest_of_the_batch() {
    let _serial = serial();

    let ran = Rc::new(Cell::new(0));
    let observed_cancel = Rc::new(Cell::new(0));
    let dropped = Rc::new(Cell::new(0));

    kestrel::init();

    let stopper = task::spawn(async {
        thread::spawn(kestrel::stop).join().unwrap();
    });
    let queued: Vec<_> = (0..3)
        .map(|_| counted_task(&ran, &observed_cancel, &dropped))
        .collect();
    queued[2].cancel();

    kestrel::run();

    assert!(stopper.is_finished());
    assert_eq!(ran.get(), 0);
    assert_eq!(observed_cancel.get(), 1);
    assert_eq!(dropped.get(), 3);
}

#[test]
fn stop_from_another_thread_interrupts_a_blocked_loop() {
    let _serial = serial();

    let dropped = Rc::new(Cell::new(0));

    kestrel::init();

    let sleeper = task::spawn({
        let guard = DropCounter(dropped.clone());
        async move {
            let _guard = guard;
            sleep(Duration::from_secs(30)).await;
        }
    });

    let stopper = thread::spawn(|| {
        thread::sleep(Duration::from_millis(20));
        kestrel::stop();
    });

    let started = Instant::now();
    kestrel::run();
    stopper.join().unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(sleeper.is_finished());
    assert_eq!(dropped.get(), 1);
}

#[test]
fn stop_without_a_loop_is_a_no_op() {
    let _serial = serial();

    kestrel::stop();

    kestrel::init();
    let finished = task::spawn(async { 7 });
    kestrel::run();

    assert!(finished.is_finished());
}

#[kestrel::test]
async fn cancel_only_sets_a_flag() {
    let handle = task::spawn(async {
        let mut polls = 0;
        while !task::cancelled() {
            polls += 1;
            kestrel::yield_now().await;
        }
        polls
    });

    kestrel::yield_now().await;
    handle.cancel();
    assert!(handle.is_cancelled());

    let polls = handle.await.unwrap();
    assert!(polls >= 1);
}

#[test]
fn builder_sizes_the_worker_pool() {
    let _serial = serial();

    let names = kestrel::RuntimeBuilder::new()
        .worker_threads(2)
        .block_on(async {
            let mut names = Vec::new();
            for _ in 0..4 {
                let name = kestrel::pool::submit(|| {
                    thread::current().name().map(str::to_owned)
                })
                .await
                .unwrap();
                names.push(name);
            }
            names
        });

    for name in names {
        let name = name.unwrap();
        assert!(name == "kestrel-worker-0" || name == "kestrel-worker-1");
    }
}

#[test]
#[should_panic(expected = "spawn must be called within the context of a runtime")]
fn spawn_outside_a_loop_panics() {
    let _ = task::spawn(async {});
}
