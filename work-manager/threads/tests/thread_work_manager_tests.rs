// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::collections::HashSet;
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use work_manager_core::{BoxedTask, TaskError, WorkManager, WorkManagerError, WorkManagerMode};
use work_manager_threads::{ThreadConfig, ThreadWorkManager};

fn started(n_workers: usize) -> ThreadWorkManager<BoxedTask<usize>> {
    let mut manager = ThreadWorkManager::new(ThreadConfig::with_workers(n_workers));
    assert_eq!(manager.startup().unwrap(), WorkManagerMode::Master);
    manager
}

fn square(i: usize) -> BoxedTask<usize> {
    Box::new(move || {
        thread::sleep(Duration::from_millis(fastrand::u64(0..3)));
        Ok(i * i)
    })
}

// ============================================================
// Lifecycle
// ============================================================

#[test]
fn test_safety_startup_only_once() {
    let mut manager = started(2);
    assert!(manager.is_master());
    assert!(matches!(
        manager.startup(),
        Err(WorkManagerError::AlreadyStarted)
    ));
    manager.shutdown(0);
}

#[test]
fn test_safety_zero_workers_is_a_config_error() {
    let mut manager: ThreadWorkManager<BoxedTask<usize>> =
        ThreadWorkManager::new(ThreadConfig::with_workers(0));
    assert!(matches!(manager.startup(), Err(WorkManagerError::Config(_))));
    assert_eq!(manager.mode(), None);
}

#[test]
fn test_safety_submit_before_startup_and_after_shutdown() {
    let mut manager: ThreadWorkManager<BoxedTask<usize>> =
        ThreadWorkManager::new(ThreadConfig::with_workers(1));
    assert!(matches!(
        manager.submit(square(1)),
        Err(WorkManagerError::NotStarted)
    ));

    manager.startup().unwrap();
    manager.shutdown(0);
    assert!(matches!(
        manager.submit(square(1)),
        Err(WorkManagerError::ShutDown)
    ));
}

// ============================================================
// Execution
// ============================================================

#[test]
fn test_liveness_wait_all_collects_every_result() {
    let mut manager = started(4);
    let futures = manager.submit_many((0..200).map(square)).unwrap();

    let results = manager.wait_all(&futures).unwrap();
    assert_eq!(results, (0..200).map(|i| i * i).collect::<Vec<_>>());
    manager.shutdown(0);
}

#[test]
fn test_liveness_as_completed_over_pool() {
    let mut manager = started(3);
    let futures = manager.submit_many((0..50).map(square)).unwrap();

    let values: HashSet<usize> = manager
        .as_completed(&futures)
        .map(|future| future.get_result().unwrap())
        .collect();
    assert_eq!(values, (0..50).map(|i| i * i).collect());
    manager.shutdown(0);
}

#[test]
fn test_liveness_tasks_run_in_parallel() {
    let mut manager = started(4);
    let barrier = Arc::new(Barrier::new(4));
    let tasks = (0..4).map(|i| -> BoxedTask<usize> {
        let barrier = Arc::clone(&barrier);
        Box::new(move || {
            barrier.wait();
            Ok(i)
        })
    });

    let futures = manager.submit_many(tasks).unwrap();
    assert_eq!(
        manager
            .wait_all_timeout(&futures, Duration::from_secs(5))
            .unwrap(),
        vec![0, 1, 2, 3]
    );
    manager.shutdown(0);
}

#[test]
fn test_safety_panicking_task_fails_only_its_future() {
    let mut manager = started(1);
    let panicking: BoxedTask<usize> = Box::new(|| -> Result<usize, TaskError> {
        panic!("worker crash")
    });
    let futures = manager
        .submit_many([panicking, square(3)])
        .unwrap();

    assert_eq!(
        futures[0].get_result(),
        Err(TaskError::Panicked("worker crash".to_string()))
    );
    assert_eq!(futures[1].get_result(), Ok(9));
    manager.shutdown(0);
}

#[test]
fn test_safety_wait_any_returns_first_finisher() {
    let mut manager = started(2);
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let blocked: BoxedTask<usize> = Box::new(move || {
        let _ = release_rx.recv();
        Ok(0)
    });
    let futures = manager.submit_many([blocked, square(5)]).unwrap();

    let first = manager.wait_any(&futures).unwrap();
    assert_eq!(first.task_id(), futures[1].task_id());

    release_tx.send(()).unwrap();
    manager.shutdown(0);
}

#[test]
fn test_safety_shutdown_cancels_queued_tasks() {
    let mut manager = started(1);
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (running_tx, running_rx) = mpsc::channel::<()>();
    let blocking: BoxedTask<usize> = Box::new(move || {
        running_tx.send(()).unwrap();
        let _ = release_rx.recv();
        Ok(1)
    });
    let in_flight = manager.submit(blocking).unwrap();
    running_rx.recv().unwrap();

    let queued = manager.submit_many((0..5).map(square)).unwrap();
    assert_eq!(manager.queued(), 5);

    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        release_tx.send(()).unwrap();
    });
    manager.shutdown(0);
    releaser.join().unwrap();

    assert_eq!(in_flight.get_result(), Ok(1));
    for future in queued {
        assert!(matches!(future.get_result(), Err(TaskError::Cancelled(_))));
    }
}
