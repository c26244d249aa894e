//! Background worker tasks that load the system between sleep transitions.
//!
//! Each worker is an OS thread that waits out its period and then emits a
//! heartbeat, forever. The pool parks the workers before a sleep transition and
//! releases them after, proving that no task activity leaks into a sleep
//! window. Workers only ever park at their periodic wait point, never in the
//! middle of a heartbeat.
//!
//! Task state only changes through [`WorkerPool`]. Suspending a task that is
//! already suspended, or resuming one that is running, is a programming error
//! and panics.

use core::fmt;
use core::time::Duration;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use heapless::HistoryBuffer;
use log::{error, info, trace};

use crate::error::PmError;
use crate::sync::{Arc, Condvar, Mutex, MutexGuard};

/// Heartbeat timestamps kept per task.
const HEARTBEAT_HISTORY: usize = 64;

/// Lifecycle of a worker task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Registered with the pool, thread not spawned yet.
    Created,
    Running,
    /// Parked at its periodic wait point.
    Suspended,
    /// Thread has exited and been joined.
    Stopped,
}

/// Task identifier, the position of the task in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u8);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Static description of a worker task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub name: &'static str,
    pub period: Duration,
    /// Disabled specs are not created at all.
    pub enabled: bool,
    /// Keeps running while the others are suspended for sleep.
    pub runs_during_sleep: bool,
}

impl WorkerSpec {
    pub const fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period,
            enabled: true,
            runs_during_sleep: false,
        }
    }

    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub const fn running_during_sleep(mut self) -> Self {
        self.runs_during_sleep = true;
        self
    }

    /// The stock task set: two fast tasks that are suspended for sleep, plus a
    /// slow, disabled task that would keep running through it.
    pub fn defaults() -> Vec<WorkerSpec> {
        vec![
            WorkerSpec::new("A", Duration::from_millis(100)),
            WorkerSpec::new("B", Duration::from_millis(1000)),
            WorkerSpec::new("C", Duration::from_millis(8000))
                .enabled(false)
                .running_during_sleep(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Suspend,
    Stop,
}

struct Control {
    command: Command,
    parked: bool,
    beats: u64,
    history: HistoryBuffer<Instant, HEARTBEAT_HISTORY>,
}

struct Shared {
    control: Mutex<Control>,
    signal: Condvar,
}

impl Shared {
    fn new() -> Self {
        Self {
            control: Mutex::new(Control {
                command: Command::Run,
                parked: false,
                beats: 0,
                history: HistoryBuffer::new(),
            }),
            signal: Condvar::new(),
        }
    }

    fn command(&self, command: Command) -> MutexGuard<'_, Control> {
        let mut control = self.control.lock();
        control.command = command;
        self.signal.notify_all();
        control
    }
}

/// Handle to one worker task, owned by the pool.
struct WorkerTask {
    id: TaskId,
    spec: WorkerSpec,
    state: TaskState,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerTask {
    fn new(id: TaskId, spec: WorkerSpec) -> Self {
        Self {
            id,
            spec,
            state: TaskState::Created,
            shared: Arc::new(Shared::new()),
            handle: None,
        }
    }

    fn spawn(&mut self) -> Result<(), PmError> {
        let shared = Arc::clone(&self.shared);
        let name = self.spec.name;
        let period = self.spec.period;
        let handle = thread::Builder::new()
            .name(format!("pm-task-{name}"))
            .spawn(move || task_loop(&shared, name, period))
            .map_err(|source| PmError::WorkerSpawn { name, source })?;

        info!("Thread task {name} init");
        self.handle = Some(handle);
        self.state = TaskState::Running;
        Ok(())
    }

    fn suspend(&mut self) {
        assert_eq!(
            self.state,
            TaskState::Running,
            "task {} suspended while {:?}",
            self.spec.name,
            self.state
        );
        let mut control = self.shared.command(Command::Suspend);
        while !control.parked {
            self.shared.signal.wait(&mut control);
        }
        self.state = TaskState::Suspended;
    }

    fn resume(&mut self) {
        assert_eq!(
            self.state,
            TaskState::Suspended,
            "task {} resumed while {:?}",
            self.spec.name,
            self.state
        );
        drop(self.shared.command(Command::Run));
        self.state = TaskState::Running;
    }

    fn stop(&mut self) {
        drop(self.shared.command(Command::Stop));
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Thread task {} panicked", self.spec.name);
            }
        }
        self.state = TaskState::Stopped;
    }
}

fn task_loop(shared: &Shared, name: &'static str, period: Duration) {
    let mut control = shared.control.lock();
    let mut deadline = Instant::now() + period;

    loop {
        match control.command {
            Command::Stop => break,
            Command::Suspend => {
                if !control.parked {
                    control.parked = true;
                    shared.signal.notify_all();
                }
                shared.signal.wait(&mut control);
            }
            Command::Run => {
                control.parked = false;
                let now = Instant::now();
                if now >= deadline {
                    control.beats += 1;
                    control.history.write(now);
                    trace!("{name}");
                    deadline = Instant::now() + period;
                } else {
                    shared.signal.wait_until(&mut control, deadline);
                }
            }
        }
    }
}

/// Owner of every worker task of a scenario.
pub struct WorkerPool {
    tasks: Vec<WorkerTask>,
}

impl WorkerPool {
    /// Registers every enabled spec; threads are not spawned until
    /// [`WorkerPool::start`].
    pub fn new(specs: &[WorkerSpec]) -> Self {
        let tasks = specs
            .iter()
            .filter(|spec| spec.enabled)
            .enumerate()
            .map(|(index, spec)| WorkerTask::new(TaskId(index as u8), spec.clone()))
            .collect();
        Self { tasks }
    }

    /// Spawns every created task and returns how many are running.
    ///
    /// A task that fails to spawn is logged and dropped from the pool; the
    /// others keep going.
    pub fn start(&mut self) -> usize {
        self.tasks.retain_mut(|task| {
            if task.state != TaskState::Created {
                return true;
            }
            match task.spawn() {
                Ok(()) => true,
                Err(err) => {
                    match &err {
                        PmError::WorkerSpawn { source, .. } => error!("{err}: {source}"),
                        _ => error!("{err}"),
                    }
                    false
                }
            }
        });
        self.running()
    }

    /// Parks every task that does not run during sleep.
    ///
    /// Returns once each of them acknowledged it is parked.
    pub fn suspend_all(&mut self) {
        for task in self.sleeping_tasks() {
            task.suspend();
        }
    }

    /// Releases every task parked by [`WorkerPool::suspend_all`].
    pub fn resume_all(&mut self) {
        for task in self.sleeping_tasks() {
            task.resume();
        }
    }

    /// Stops and joins every live task.
    pub fn stop_all(&mut self) {
        for task in &mut self.tasks {
            if matches!(task.state, TaskState::Running | TaskState::Suspended) {
                task.stop();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of tasks currently running.
    pub fn running(&self) -> usize {
        self.tasks
            .iter()
            .filter(|task| task.state == TaskState::Running)
            .count()
    }

    pub fn states(&self) -> Vec<(TaskId, &'static str, TaskState)> {
        self.tasks
            .iter()
            .map(|task| (task.id, task.spec.name, task.state))
            .collect()
    }

    pub fn state(&self, name: &str) -> Option<TaskState> {
        self.find(name).map(|task| task.state)
    }

    /// Total heartbeats emitted by the named task.
    pub fn heartbeats(&self, name: &str) -> Option<u64> {
        self.find(name).map(|task| task.shared.control.lock().beats)
    }

    /// Heartbeats of tasks that sleep with the system, timestamped in
    /// `[from, to]`.
    ///
    /// Only the most recent heartbeats of each task are retained.
    pub fn heartbeats_between(&self, from: Instant, to: Instant) -> usize {
        self.tasks
            .iter()
            .filter(|task| !task.spec.runs_during_sleep)
            .map(|task| {
                let control = task.shared.control.lock();
                control
                    .history
                    .oldest_ordered()
                    .filter(|at| **at >= from && **at <= to)
                    .count()
            })
            .sum()
    }

    fn find(&self, name: &str) -> Option<&WorkerTask> {
        self.tasks.iter().find(|task| task.spec.name == name)
    }

    fn sleeping_tasks(&mut self) -> impl Iterator<Item = &mut WorkerTask> {
        self.tasks
            .iter_mut()
            .filter(|task| !task.spec.runs_during_sleep)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop_all();
    }
}
