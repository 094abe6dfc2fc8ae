// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::{read_frame, run_worker, write_frame, MasterMessage, TcpConfig, TcpRole, WorkerMessage};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, BufReader, ErrorKind};
use std::mem;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use work_manager_core::{
    AtomicShutdownSignal, Lifecycle, PendingTask, ShutdownSignal, Task, TaskError, TaskFuture,
    TaskId, TaskQueue, WorkManager, WorkManagerError, WorkManagerMode,
};

/// State shared by the master's acceptor and dispatcher threads
struct MasterShared<K: Task> {
    queue: Arc<TaskQueue<PendingTask<K>>>,
    shutdown_signal: AtomicShutdownSignal,
    exit_code: Arc<AtomicI32>,
    dispatchers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    /// Connections currently waiting for a task's outcome
    in_flight: Arc<Mutex<HashMap<TaskId, TcpStream>>>,
    handshake_timeout: Duration,
    task_timeout: Option<Duration>,
    poll_interval: Duration,
}

impl<K: Task> Clone for MasterShared<K> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            shutdown_signal: self.shutdown_signal.clone(),
            exit_code: Arc::clone(&self.exit_code),
            dispatchers: Arc::clone(&self.dispatchers),
            in_flight: Arc::clone(&self.in_flight),
            handshake_timeout: self.handshake_timeout,
            task_timeout: self.task_timeout,
            poll_interval: self.poll_interval,
        }
    }
}

impl<K: Task> MasterShared<K> {
    /// Records the connection serving `task_id` so shutdown can interrupt
    /// it. Returns false once shutdown has begun.
    fn track(&self, task_id: TaskId, stream: &TcpStream) -> io::Result<bool> {
        let mut in_flight = self.in_flight.lock();
        if self.shutdown_signal.is_cancelled() {
            return Ok(false);
        }
        in_flight.insert(task_id, stream.try_clone()?);
        Ok(true)
    }

    fn untrack(&self, task_id: TaskId) {
        self.in_flight.lock().remove(&task_id);
    }

    /// Breaks every connection still waiting for an outcome
    fn interrupt_in_flight(&self) {
        for (task_id, stream) in self.in_flight.lock().drain() {
            debug!(%task_id, "interrupting in-flight task");
            if let Err(error) = stream.shutdown(Shutdown::Both) {
                debug!(%task_id, %error, "connection already closed");
            }
        }
    }

    fn lost_task_error(
        &self,
        worker: &str,
        peer: SocketAddr,
        error: &WorkManagerError,
    ) -> TaskError {
        if self.shutdown_signal.is_cancelled() {
            return TaskError::Cancelled(format!(
                "work manager shut down while worker {} ran the task",
                worker
            ));
        }
        match error {
            WorkManagerError::Io(io_error)
                if matches!(io_error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                TaskError::WorkerLost(format!(
                    "worker {} at {} sent no outcome within {:?}",
                    worker,
                    peer,
                    self.task_timeout.unwrap_or_default()
                ))
            }
            _ => TaskError::WorkerLost(format!("worker {} at {}: {}", worker, peer, error)),
        }
    }
}

/// Distributes tasks from one master process to worker processes over TCP.
///
/// The role comes from [`TcpConfig`]. In master mode `startup` binds the
/// listener and returns at once; every connecting worker gets a dispatcher
/// thread that feeds it one task at a time. In worker mode `startup`
/// connects to the master, executes tasks until the master shuts down, and
/// only then returns [`WorkManagerMode::Worker`].
///
/// A task whose worker disconnects, or reports nothing within
/// `task_timeout_ms`, is failed with [`TaskError::WorkerLost`]; it is not
/// retried. Shutdown breaks connections still waiting for an outcome and
/// fails those tasks with [`TaskError::Cancelled`].
pub struct TcpWorkManager<K: Task> {
    config: TcpConfig,
    lifecycle: Lifecycle,
    shared: MasterShared<K>,
    local_addr: Option<SocketAddr>,
    acceptor: Option<JoinHandle<()>>,
    worker_exit_code: Option<i32>,
}

impl<K> TcpWorkManager<K>
where
    K: Task + Serialize + DeserializeOwned,
    K::Output: Serialize + DeserializeOwned,
{
    pub fn new(config: TcpConfig) -> Self {
        let shared = MasterShared {
            queue: Arc::new(TaskQueue::new()),
            shutdown_signal: AtomicShutdownSignal::new(),
            exit_code: Arc::new(AtomicI32::new(0)),
            dispatchers: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            handshake_timeout: config.connect_timeout(),
            task_timeout: config.task_timeout(),
            poll_interval: config.poll_interval(),
        };
        Self {
            config,
            lifecycle: Lifecycle::new(),
            shared,
            local_addr: None,
            acceptor: None,
            worker_exit_code: None,
        }
    }

    pub fn config(&self) -> &TcpConfig {
        &self.config
    }

    /// Address the master is listening on, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Exit code the master sent when this worker was released
    pub fn worker_exit_code(&self) -> Option<i32> {
        self.worker_exit_code
    }

    /// Tasks waiting for a free worker
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    fn start_master(&mut self) -> Result<(), WorkManagerError> {
        let listener = TcpListener::bind(&self.config.address)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let shared = self.shared.clone();
        let acceptor = thread::Builder::new()
            .name("work-manager-acceptor".to_string())
            .spawn(move || accept_loop(listener, shared))?;

        self.local_addr = Some(local_addr);
        self.acceptor = Some(acceptor);
        info!(%local_addr, "tcp work manager listening for workers");
        Ok(())
    }

    fn start_worker(&mut self) -> Result<(), WorkManagerError> {
        let stream = connect_with_retry(
            &self.config.address,
            self.config.connect_timeout(),
            self.config.retry_interval(),
        )?;
        stream.set_nodelay(true)?;
        info!(
            address = %self.config.address,
            worker = %self.config.worker_name,
            "connected to master"
        );

        let exit_code = run_worker::<K>(stream, &self.config.worker_name)?;
        self.worker_exit_code = Some(exit_code);
        Ok(())
    }

    fn shutdown_master(&mut self, exit_code: i32) {
        self.shared.exit_code.store(exit_code, Ordering::SeqCst);
        self.shared.shutdown_signal.shutdown();

        let cancelled = self.shared.queue.close();
        if !cancelled.is_empty() {
            warn!(count = cancelled.len(), "cancelling tasks no worker picked up");
        }
        for pending in cancelled {
            pending.cancel("work manager shut down");
        }
        self.shared.interrupt_in_flight();

        if let Some(acceptor) = self.acceptor.take() {
            if acceptor.join().is_err() {
                warn!("acceptor thread panicked");
            }
        }
        let dispatchers = mem::take(&mut *self.shared.dispatchers.lock());
        for dispatcher in dispatchers {
            if dispatcher.join().is_err() {
                warn!("dispatcher thread panicked");
            }
        }
        info!(exit_code, "tcp work manager shut down");
    }
}

impl<K> WorkManager<K> for TcpWorkManager<K>
where
    K: Task + Serialize + DeserializeOwned,
    K::Output: Serialize + DeserializeOwned,
{
    fn startup(&mut self) -> Result<WorkManagerMode, WorkManagerError> {
        match self.config.role {
            TcpRole::Master => {
                self.lifecycle.start(WorkManagerMode::Master)?;
                self.start_master()?;
                Ok(WorkManagerMode::Master)
            }
            TcpRole::Worker => {
                self.lifecycle.start(WorkManagerMode::Worker)?;
                self.start_worker()?;
                Ok(WorkManagerMode::Worker)
            }
        }
    }

    fn shutdown(&mut self, exit_code: i32) {
        if !self.lifecycle.mark_shutdown() {
            return;
        }
        match self.lifecycle.mode() {
            Some(WorkManagerMode::Master) => self.shutdown_master(exit_code),
            Some(WorkManagerMode::Worker) | None => {
                debug!(exit_code, "nothing to shut down");
            }
        }
    }

    fn mode(&self) -> Option<WorkManagerMode> {
        self.lifecycle.mode()
    }

    fn submit(&self, task: K) -> Result<TaskFuture<K::Output>, WorkManagerError> {
        self.lifecycle.ensure_master()?;
        let future = TaskFuture::new();
        self.shared
            .queue
            .push(PendingTask::new(task, future.clone()))
            .map_err(|_| WorkManagerError::ShutDown)?;
        Ok(future)
    }

    /// Consumes `--work-manager-address ADDR` and
    /// `--work-manager-role master|worker`
    fn parse_aux_args(&mut self, aux_args: Vec<String>) -> Vec<String> {
        let mut remaining = Vec::new();
        let mut args = aux_args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--work-manager-address" => match args.next() {
                    Some(address) => self.config.address = address,
                    None => remaining.push(arg),
                },
                "--work-manager-role" => match args.next() {
                    Some(value) => match value.parse() {
                        Ok(role) => self.config.role = role,
                        Err(error) => {
                            warn!(%error, "ignoring work manager role");
                            remaining.extend([arg, value]);
                        }
                    },
                    None => remaining.push(arg),
                },
                _ => remaining.push(arg),
            }
        }
        remaining
    }
}

impl<K: Task> Drop for TcpWorkManager<K> {
    fn drop(&mut self) {
        if self.lifecycle.mode() == Some(WorkManagerMode::Master) && self.lifecycle.mark_shutdown()
        {
            self.shared.shutdown_signal.shutdown();
            for pending in self.shared.queue.close() {
                pending.cancel("work manager dropped");
            }
            self.shared.interrupt_in_flight();
        }
    }
}

fn connect_with_retry(
    address: &str,
    timeout: Duration,
    retry_interval: Duration,
) -> Result<TcpStream, WorkManagerError> {
    let deadline = Instant::now() + timeout;
    loop {
        match TcpStream::connect(address) {
            Ok(stream) => return Ok(stream),
            Err(error) if Instant::now() < deadline => {
                debug!(%error, address, "master not reachable yet");
                thread::sleep(retry_interval);
            }
            Err(error) => return Err(error.into()),
        }
    }
}

fn accept_loop<K>(listener: TcpListener, shared: MasterShared<K>)
where
    K: Task + Serialize,
    K::Output: DeserializeOwned,
{
    while !shared.shutdown_signal.is_cancelled() {
        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(error) = spawn_dispatcher(stream, peer, &shared) {
                    warn!(%peer, %error, "failed to start dispatcher");
                }
            }
            Err(ref error) if error.kind() == ErrorKind::WouldBlock => {
                thread::sleep(shared.poll_interval);
            }
            Err(error) => {
                warn!(%error, "accept failed");
                thread::sleep(shared.poll_interval);
            }
        }
    }
    debug!("acceptor exiting");
}

fn spawn_dispatcher<K>(
    stream: TcpStream,
    peer: SocketAddr,
    shared: &MasterShared<K>,
) -> Result<(), WorkManagerError>
where
    K: Task + Serialize,
    K::Output: DeserializeOwned,
{
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;

    let dispatcher_shared = shared.clone();
    let handle = thread::Builder::new()
        .name(format!("work-manager-dispatch-{}", peer))
        .spawn(move || dispatch(stream, peer, dispatcher_shared))?;
    shared.dispatchers.lock().push(handle);
    Ok(())
}

fn dispatch<K>(stream: TcpStream, peer: SocketAddr, shared: MasterShared<K>)
where
    K: Task + Serialize,
    K::Output: DeserializeOwned,
{
    match serve_connection(stream, peer, &shared) {
        Ok(assigned) => info!(%peer, assigned, "worker released"),
        Err(error) => warn!(%peer, %error, "worker connection lost"),
    }
}

/// Feeds tasks to one worker until the queue closes. Returns the number of
/// tasks the worker completed.
fn serve_connection<K>(
    stream: TcpStream,
    peer: SocketAddr,
    shared: &MasterShared<K>,
) -> Result<usize, WorkManagerError>
where
    K: Task + Serialize,
    K::Output: DeserializeOwned,
{
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    writer.set_read_timeout(Some(shared.handshake_timeout))?;
    let name = match read_frame::<_, WorkerMessage<K::Output>>(&mut reader)? {
        Some(WorkerMessage::Ready { name }) => name,
        Some(WorkerMessage::Outcome { task_id, .. }) => {
            return Err(WorkManagerError::Codec(format!(
                "worker reported task {} before announcing itself",
                task_id
            )))
        }
        None => return Ok(0),
    };
    writer.set_read_timeout(shared.task_timeout)?;
    info!(%peer, worker = %name, "worker connected");

    let mut assigned = 0usize;
    while let Some(pending) = shared.queue.pop() {
        let (task, future) = pending.into_parts();
        let task_id = future.task_id();
        match shared.track(task_id, &writer) {
            Ok(true) => {}
            Ok(false) => {
                future.set_failure(TaskError::Cancelled("work manager shut down".to_string()));
                continue;
            }
            Err(error) => {
                let error = WorkManagerError::from(error);
                future.set_failure(shared.lost_task_error(&name, peer, &error));
                return Err(error);
            }
        }
        debug!(%task_id, worker = %name, "assigning task");

        let result = exchange(&mut reader, &mut writer, task_id, task);
        shared.untrack(task_id);
        match result {
            Ok(outcome) => {
                future.set_outcome(outcome);
                assigned += 1;
            }
            Err(error) => {
                future.set_failure(shared.lost_task_error(&name, peer, &error));
                return Err(error);
            }
        }
    }

    let exit_code = shared.exit_code.load(Ordering::SeqCst);
    write_frame(&mut writer, &MasterMessage::<K>::Shutdown { exit_code })?;
    Ok(assigned)
}

/// Sends one assignment and waits for its outcome
fn exchange<K>(
    reader: &mut BufReader<TcpStream>,
    writer: &mut TcpStream,
    task_id: TaskId,
    task: K,
) -> Result<Result<K::Output, TaskError>, WorkManagerError>
where
    K: Task + Serialize,
    K::Output: DeserializeOwned,
{
    write_frame(writer, &MasterMessage::Assign { task_id, task })?;
    match read_frame::<_, WorkerMessage<K::Output>>(reader)? {
        Some(WorkerMessage::Outcome {
            task_id: reported,
            outcome,
        }) if reported == task_id => Ok(outcome),
        Some(_) => Err(WorkManagerError::Codec(format!(
            "unexpected reply while waiting for task {}",
            task_id
        ))),
        None => Err(io::Error::new(ErrorKind::UnexpectedEof, "worker closed the connection").into()),
    }
}
