mod common;

use kestrel::error::{Elapsed, OperationError};
use kestrel::task::{self, gather};
use kestrel::time::{sleep, timeout};
use kestrel::{fs, pool, process};

use common::WakeCounter;
use kestrel::testing::serial;
use rstest::rstest;
use std::future::Future;
use std::io;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::task::{Context, Poll, Waker};
use std::thread;
use std::time::{Duration, Instant};

#[kestrel::test]
async fn timeout_completes_before_deadline() {
    let handle = task::spawn(async {
        sleep(Duration::from_millis(10)).await;
        123
    });

    let result = timeout(Duration::from_millis(500), handle).await;

    assert!(matches!(result, Ok(Ok(123))));
}

#[kestrel::test]
async fn timeout_expires() {
    let result = timeout(Duration::from_millis(10), sleep(Duration::from_secs(5))).await;

    let err = result.unwrap_err();
    assert!(matches!(err, Elapsed { .. }));
    assert_eq!(err.to_string(), "deadline has elapsed");
}

#[kestrel::test]
async fn gather_keeps_input_order() {
    let delays = [30u64, 10, 20];
    let futures = delays.into_iter().enumerate().map(|(i, ms)| async move {
        sleep(Duration::from_millis(ms)).await;
        i + 1
    });

    let results = gather(futures).await.unwrap();

    assert_eq!(results, vec![1, 2, 3]);
}

#[kestrel::test]
async fn pool_work_runs_off_the_loop_thread() {
    let loop_thread = thread::current().id();

    let worker_thread = pool::submit(|| thread::current().id()).await.unwrap();

    assert_ne!(worker_thread, loop_thread);
}

#[kestrel::test]
async fn pool_panic_is_reported_to_the_awaiter() {
    let result = pool::submit(|| -> u32 { panic!("index corrupted") }).await;

    match result {
        Err(OperationError::Panicked(message)) => assert_eq!(message, "index corrupted"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[kestrel::test]
async fn dropped_pool_request_does_not_block_shutdown() {
    let result = timeout(
        Duration::from_millis(5),
        pool::submit(|| thread::sleep(Duration::from_millis(50))),
    )
    .await;

    assert!(result.is_err());
}

#[test]
fn expired_timeout_releases_the_inner_timer() {
    let _serial = serial();

    let started = Instant::now();
    let result = kestrel::block_on(timeout(
        Duration::from_millis(10),
        sleep(Duration::from_secs(30)),
    ));

    assert!(result.is_err());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn dropped_pool_request_never_wakes_its_task() {
    let _serial = serial();

    let wakes = Arc::new(WakeCounter::default());
    let finished = Arc::new(AtomicBool::new(false));

    kestrel::block_on({
        let (wakes, finished) = (wakes.clone(), finished.clone());

        async move {
            let (started_tx, started_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel::<()>();

            let mut request = Box::pin(pool::submit(move || {
                started_tx.send(()).unwrap();
                release_rx.recv().unwrap();
                finished.store(true, Ordering::SeqCst);
            }));

            let waker = Waker::from(wakes);
            let mut cx = Context::from_waker(&waker);
            assert!(request.as_mut().poll(&mut cx).is_pending());

            started_rx.recv().unwrap();
            drop(request);
            release_tx.send(()).unwrap();
        }
    });

    // `run` only returns once the worker has reported back.
    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(wakes.count(), 0);
}

#[kestrel::test]
async fn fs_write_then_read() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("build/compile_commands");
    let file = nested.join("entry.json");

    fs::create_dir_all(&nested).await.unwrap();
    fs::write(&file, br#"{"file": "main.cpp"}"#).await.unwrap();

    assert_eq!(
        fs::read_to_string(&file).await.unwrap(),
        r#"{"file": "main.cpp"}"#
    );
    assert_eq!(fs::read(&file).await.unwrap().len(), 20);
    assert!(fs::metadata(&nested).await.unwrap().is_dir());
}

#[kestrel::test]
async fn fs_error_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.cpp");

    let err = fs::read(&missing).await.unwrap_err();

    assert_eq!(err.io_kind(), Some(io::ErrorKind::NotFound));
    match err {
        OperationError::Io { op, path, .. } => {
            assert_eq!(op, "read");
            assert_eq!(path, missing);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[kestrel::test]
async fn process_output_is_collected() {
    let mut command = Command::new("sh");
    command.args(["-c", "printf clang"]);

    let output = process::output(command).await.unwrap();

    assert_eq!(output.stdout, b"clang");
}

#[rstest]
#[case::exit_code(3)]
#[case::exit_code_one(1)]
fn process_failure_carries_status_and_stderr(#[case] code: i32) {
    let _serial = serial();

    let err = kestrel::block_on(async move {
        let mut command = Command::new("sh");
        command.args(["-c", &format!("echo failed >&2; exit {code}")]);
        process::output(command).await.unwrap_err()
    });

    match err {
        OperationError::Exit {
            program,
            status,
            stderr,
        } => {
            assert_eq!(program, "sh");
            assert_eq!(status.code(), Some(code));
            assert_eq!(stderr, "failed\n");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[kestrel::test]
async fn missing_program_is_a_spawn_error() {
    let command = Command::new("kestrel-definitely-not-a-program");

    let err = process::output(command).await.unwrap_err();

    assert!(matches!(err, OperationError::Spawn { .. }));
    assert_eq!(err.io_kind(), Some(io::ErrorKind::NotFound));
}

#[test]
fn pool_without_a_loop_reports_shutdown() {
    let mut cx = Context::from_waker(Waker::noop());
    let mut request = std::pin::pin!(pool::submit(|| 1));

    let poll = request.as_mut().poll(&mut cx);

    assert!(matches!(poll, Poll::Ready(Err(OperationError::Shutdown))));
}
