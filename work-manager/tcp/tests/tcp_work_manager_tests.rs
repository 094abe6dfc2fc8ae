// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use serde::{Deserialize, Serialize};
use std::io::BufReader;
use std::net::{TcpListener, TcpStream};
use std::sync::{mpsc, Barrier, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use work_manager_core::{
    Task, TaskError, TaskId, WaitError, WorkManager, WorkManagerError, WorkManagerMode,
};
use work_manager_tcp::{
    read_frame, write_frame, MasterMessage, TcpConfig, TcpRole, TcpWorkManager, WorkerMessage,
};

static RENDEZVOUS: OnceLock<Barrier> = OnceLock::new();

#[derive(Debug, Serialize, Deserialize)]
enum Arith {
    Square(u64),
    Fail(String),
    Panic,
    /// Blocks until a second worker runs the same variant
    Rendezvous(u64),
}

impl Task for Arith {
    type Output = u64;

    fn run(self) -> Result<u64, TaskError> {
        match self {
            Arith::Square(n) => Ok(n * n),
            Arith::Fail(message) => Err(TaskError::failed(message)),
            Arith::Panic => panic!("arith exploded"),
            Arith::Rendezvous(n) => {
                RENDEZVOUS.get_or_init(|| Barrier::new(2)).wait();
                Ok(n)
            }
        }
    }
}

fn started_master() -> TcpWorkManager<Arith> {
    let mut master = TcpWorkManager::new(TcpConfig::master("127.0.0.1:0"));
    assert_eq!(master.startup().unwrap(), WorkManagerMode::Master);
    master
}

/// Connects a peer that announces itself, takes one assignment and never
/// answers it
fn connect_stalled_worker(master: &TcpWorkManager<Arith>, expected: TaskId) -> TcpStream {
    let stream = TcpStream::connect(master.local_addr().unwrap()).unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut writer = stream.try_clone().unwrap();
    write_frame(
        &mut writer,
        &WorkerMessage::<u64>::Ready {
            name: "stalled".to_string(),
        },
    )
    .unwrap();
    match read_frame::<_, MasterMessage<Arith>>(&mut reader).unwrap() {
        Some(MasterMessage::Assign { task_id, .. }) => assert_eq!(task_id, expected),
        other => panic!("expected an assignment, got {:?}", other),
    }
    stream
}

fn spawn_worker(address: String) -> JoinHandle<Option<i32>> {
    thread::spawn(move || {
        let mut worker: TcpWorkManager<Arith> = TcpWorkManager::new(TcpConfig::worker(address));
        assert_eq!(worker.startup().unwrap(), WorkManagerMode::Worker);
        worker.worker_exit_code()
    })
}

// ============================================================
// Master with real workers
// ============================================================

#[test]
fn test_liveness_tasks_run_on_remote_workers() {
    let mut master = started_master();
    let address = master.local_addr().unwrap().to_string();
    let workers: Vec<_> = (0..2).map(|_| spawn_worker(address.clone())).collect();

    // Each worker holds one task at a time, so both must be connected
    let meeting = master
        .submit_many([Arith::Rendezvous(1), Arith::Rendezvous(2)])
        .unwrap();
    assert_eq!(master.wait_all(&meeting), Ok(vec![1, 2]));

    let squares = master.submit_many((1..=20).map(Arith::Square)).unwrap();
    let expected: Vec<u64> = (1..=20).map(|n| n * n).collect();
    assert_eq!(master.wait_all(&squares), Ok(expected));

    master.shutdown(3);
    for worker in workers {
        assert_eq!(worker.join().unwrap(), Some(3));
    }
}

#[test]
fn test_safety_remote_failures_reach_the_future() {
    let mut master = started_master();
    let worker = spawn_worker(master.local_addr().unwrap().to_string());

    let failed = master.submit(Arith::Fail("bad input".to_string())).unwrap();
    let panicked = master.submit(Arith::Panic).unwrap();
    let fine = master.submit(Arith::Square(9)).unwrap();

    assert_eq!(
        failed.get_result(),
        Err(TaskError::Failed("bad input".to_string()))
    );
    assert_eq!(
        panicked.get_result(),
        Err(TaskError::Panicked("arith exploded".to_string()))
    );
    assert_eq!(fine.get_result(), Ok(81));

    master.shutdown(0);
    assert_eq!(worker.join().unwrap(), Some(0));
}

#[test]
fn test_safety_lost_worker_fails_in_flight_task() {
    let mut master = started_master();
    let future = master.submit(Arith::Square(5)).unwrap();

    let stream = TcpStream::connect(master.local_addr().unwrap()).unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut writer = stream;
    write_frame(
        &mut writer,
        &WorkerMessage::<u64>::Ready {
            name: "flaky".to_string(),
        },
    )
    .unwrap();

    let assigned = read_frame::<_, MasterMessage<Arith>>(&mut reader).unwrap();
    match assigned {
        Some(MasterMessage::Assign { task_id, .. }) => assert_eq!(task_id, future.task_id()),
        other => panic!("expected an assignment, got {:?}", other),
    }
    drop(reader);
    drop(writer);

    assert!(matches!(future.get_result(), Err(TaskError::WorkerLost(_))));
    master.shutdown(0);
}

#[test]
fn test_safety_stalled_worker_times_out() {
    let mut config = TcpConfig::master("127.0.0.1:0");
    config.task_timeout_ms = 200;
    let mut master: TcpWorkManager<Arith> = TcpWorkManager::new(config);
    master.startup().unwrap();

    let future = master.submit(Arith::Square(6)).unwrap();
    let _stalled = connect_stalled_worker(&master, future.task_id());

    match future.get_result_timeout(Duration::from_secs(5)) {
        Err(WaitError::Task(TaskError::WorkerLost(reason))) => {
            assert!(reason.contains("no outcome"), "{}", reason)
        }
        other => panic!("expected a lost worker, got {:?}", other),
    }
    master.shutdown(0);
}

#[test]
fn test_liveness_shutdown_interrupts_stalled_worker() {
    let mut master = started_master();
    let future = master.submit(Arith::Square(6)).unwrap();
    let _stalled = connect_stalled_worker(&master, future.task_id());

    let (done_tx, done_rx) = mpsc::channel();
    thread::spawn(move || {
        master.shutdown(0);
        let _ = done_tx.send(());
    });
    done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("shutdown waited on a stalled worker");

    assert!(matches!(future.get_result(), Err(TaskError::Cancelled(_))));
}

#[test]
fn test_safety_shutdown_without_workers_cancels_queue() {
    let mut master = started_master();
    let futures = master
        .submit_many([Arith::Square(1), Arith::Square(2)])
        .unwrap();
    assert_eq!(master.queued(), 2);

    master.shutdown(0);
    for future in &futures {
        assert!(matches!(future.get_result(), Err(TaskError::Cancelled(_))));
    }
    assert!(matches!(
        master.submit(Arith::Square(3)),
        Err(WorkManagerError::ShutDown)
    ));
}

// ============================================================
// Worker role
// ============================================================

#[test]
fn test_liveness_worker_serves_until_master_releases_it() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let fake_master = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = stream;

        let hello = read_frame::<_, WorkerMessage<u64>>(&mut reader).unwrap();
        assert!(matches!(hello, Some(WorkerMessage::Ready { .. })));

        let task_id = work_manager_core::TaskId::new();
        write_frame(
            &mut writer,
            &MasterMessage::Assign {
                task_id,
                task: Arith::Square(4),
            },
        )
        .unwrap();
        let reply = read_frame::<_, WorkerMessage<u64>>(&mut reader).unwrap();
        write_frame(&mut writer, &MasterMessage::<Arith>::Shutdown { exit_code: 7 }).unwrap();

        match reply {
            Some(WorkerMessage::Outcome {
                task_id: reported,
                outcome,
            }) => {
                assert_eq!(reported, task_id);
                outcome
            }
            other => panic!("expected an outcome, got {:?}", other),
        }
    });

    let mut worker: TcpWorkManager<Arith> = TcpWorkManager::new(TcpConfig::worker(address));
    assert_eq!(worker.startup().unwrap(), WorkManagerMode::Worker);
    assert!(!worker.is_master());
    assert_eq!(worker.worker_exit_code(), Some(7));
    assert!(matches!(
        worker.submit(Arith::Square(1)),
        Err(WorkManagerError::WorkerMode)
    ));
    worker.shutdown(7);

    assert_eq!(fake_master.join().unwrap(), Ok(16));
}

#[test]
fn test_safety_worker_gives_up_without_master() {
    let address = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    };
    let mut config = TcpConfig::worker(address);
    config.connect_timeout_ms = 200;
    config.retry_interval_ms = 20;

    let mut worker: TcpWorkManager<Arith> = TcpWorkManager::new(config);
    assert!(matches!(worker.startup(), Err(WorkManagerError::Io(_))));
}

// ============================================================
// Arguments
// ============================================================

#[test]
fn test_liveness_aux_args_configure_the_transport() {
    let mut manager: TcpWorkManager<Arith> = TcpWorkManager::new(TcpConfig::default());
    let args = [
        "--work-manager-address",
        "10.1.1.1:8080",
        "--verbose",
        "--work-manager-role",
        "worker",
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect();

    let remaining = manager.parse_aux_args(args);
    assert_eq!(remaining, vec!["--verbose".to_string()]);
    assert_eq!(manager.config().address, "10.1.1.1:8080");
    assert_eq!(manager.config().role, TcpRole::Worker);
}

#[test]
fn test_safety_bad_role_is_left_in_place() {
    let mut manager: TcpWorkManager<Arith> = TcpWorkManager::new(TcpConfig::default());
    let remaining = manager.parse_aux_args(vec![
        "--work-manager-role".to_string(),
        "observer".to_string(),
    ]);
    assert_eq!(remaining.len(), 2);
    assert_eq!(manager.config().role, TcpRole::Master);
}
