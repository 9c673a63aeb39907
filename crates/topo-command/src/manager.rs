//! Command admission and execution
//!
//! The manager owns the session (store, mesh store, history) behind one lock,
//! so only one command mutates the graph at a time. Submitted work goes
//! through a FIFO queue; whichever thread finds the queue idle drains it.
//! Long threadable commands are handed to a worker thread under the
//! concurrent policy, everything else runs on the draining thread.
//!
//! Status notifications are queued on a channel and only delivered to
//! observers by [`CommandManager::dispatch_notifications`], on the thread
//! that owns the manager.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use uuid::Uuid;

use topo_core::{
    check_all, CheckReport, Description, EntityId, GeometryProvider, InMemoryMeshStore, MeshStore,
    NullGeometry, TopoResult, TopoStore,
};

use crate::command::{Command, CommandHandle, CommandStatus, Play};
use crate::config::{ExecutionPolicy, ManagerConfig};
use crate::error::{CommandError, CommandResult};
use crate::history::History;

/// Status change of a played command
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub command: Uuid,
    pub name: String,
    pub play: Play,
    pub status: CommandStatus,
    pub message: Option<String>,
}

impl Notification {
    fn of(command: &Command, play: Play) -> Self {
        Self {
            command: command.id(),
            name: command.name().to_string(),
            play,
            status: command.status(),
            message: command.message(),
        }
    }
}

/// Observer callback
pub type Observer = Box<dyn FnMut(&Notification) + Send>;

type Ticket = Arc<Mutex<Option<CommandResult<Option<Uuid>>>>>;

enum Job {
    Do(Command),
    /// Binds to the top of the undo stack when dequeued
    Undo(Ticket),
    Redo(Ticket),
}

struct Session {
    store: TopoStore,
    mesh: Box<dyn MeshStore>,
    history: History,
    transcript: Vec<String>,
}

#[derive(Default)]
struct Queue {
    jobs: VecDeque<Job>,
    /// A thread is draining the queue
    active: bool,
}

struct Shared {
    session: Mutex<Session>,
    queue: Mutex<Queue>,
    changed: Condvar,
    geom: Arc<dyn GeometryProvider>,
    config: ManagerConfig,
    notify: Sender<Notification>,
}

impl Shared {
    /// Run queued jobs until the queue is empty or a worker takes over
    fn drain(shared: &Arc<Shared>) {
        loop {
            let job = {
                let mut queue = shared.queue.lock();
                match queue.jobs.pop_front() {
                    Some(job) => job,
                    None => {
                        queue.active = false;
                        shared.changed.notify_all();
                        return;
                    }
                }
            };
            if shared.on_worker(&job) {
                let worker = Arc::clone(shared);
                std::thread::spawn(move || {
                    worker.run(job);
                    Shared::drain(&worker);
                });
                return;
            }
            shared.run(job);
        }
    }

    fn on_worker(&self, job: &Job) -> bool {
        match job {
            Job::Do(command) => {
                self.config.policy == ExecutionPolicy::Concurrent
                    && command.threadable()
                    && command.estimated_duration()
                        >= Duration::from_millis(self.config.sequential_threshold_ms)
            }
            Job::Undo(_) | Job::Redo(_) => false,
        }
    }

    fn run(&self, job: Job) {
        match job {
            Job::Do(command) => self.run_do(command),
            Job::Undo(ticket) => {
                let outcome = self.run_undo();
                *ticket.lock() = Some(outcome);
            }
            Job::Redo(ticket) => {
                let outcome = self.run_redo();
                *ticket.lock() = Some(outcome);
            }
        }
        let _queue = self.queue.lock();
        self.changed.notify_all();
    }

    fn send(&self, command: &Command, play: Play) {
        self.notify.send(Notification::of(command, play)).ok();
    }

    fn run_do(&self, mut command: Command) {
        if command.status() == CommandStatus::Canceled {
            tracing::info!("Skipping canceled {}", command.name());
            self.send(&command, Play::Do);
            return;
        }
        let mut session = self.session.lock();
        let Session {
            store,
            mesh,
            history,
            transcript,
        } = &mut *session;
        tracing::info!("Starting {}", command.name());
        match command.execute(Play::Do, store, mesh.as_mut(), self.geom.as_ref()) {
            Ok(()) => {
                let script = command.initial_script_command();
                let comments = command.name().to_string();
                command.save_script_command_and_comments(script.clone(), comments);
                transcript.push(script);
                tracing::info!("{} done", command.name());
                self.send(&command, Play::Do);
                history.push_done(command, store);
            }
            Err(_) => self.send(&command, Play::Do),
        }
    }

    fn run_undo(&self) -> CommandResult<Option<Uuid>> {
        let mut session = self.session.lock();
        let Session {
            store,
            mesh,
            history,
            transcript,
        } = &mut *session;
        let Some(mut command) = history.pop_undo() else {
            tracing::warn!("Nothing to undo");
            return Ok(None);
        };
        match command.execute(Play::Undo, store, mesh.as_mut(), self.geom.as_ref()) {
            Ok(()) => {
                transcript.push("ctx.undo()".to_string());
                tracing::info!("{} undone", command.name());
                self.send(&command, Play::Undo);
                let id = command.id();
                history.push_undone(command);
                Ok(Some(id))
            }
            Err(err) => {
                self.send(&command, Play::Undo);
                command.release(store);
                history.clear_redo(store);
                Err(err)
            }
        }
    }

    fn run_redo(&self) -> CommandResult<Option<Uuid>> {
        let mut session = self.session.lock();
        let Session {
            store,
            mesh,
            history,
            transcript,
        } = &mut *session;
        let Some(mut command) = history.pop_redo() else {
            tracing::warn!("Nothing to redo");
            return Ok(None);
        };
        match command.execute(Play::Redo, store, mesh.as_mut(), self.geom.as_ref()) {
            Ok(()) => {
                transcript.push("ctx.redo()".to_string());
                tracing::info!("{} redone", command.name());
                self.send(&command, Play::Redo);
                let id = command.id();
                history.push_redone(command, store);
                Ok(Some(id))
            }
            Err(err) => {
                self.send(&command, Play::Redo);
                command.release(store);
                history.clear_redo(store);
                Err(err)
            }
        }
    }
}

/// Entry point for running commands against one topology session
pub struct CommandManager {
    shared: Arc<Shared>,
    notifications: Receiver<Notification>,
    observers: Mutex<Vec<Observer>>,
}

impl CommandManager {
    /// Manager over an empty store, an in-memory mesh store and no CAD model
    pub fn new(config: ManagerConfig) -> Self {
        Self::with_providers(config, Arc::new(NullGeometry), Box::new(InMemoryMeshStore::new()))
    }

    pub fn with_providers(
        config: ManagerConfig,
        geom: Arc<dyn GeometryProvider>,
        mesh: Box<dyn MeshStore>,
    ) -> Self {
        let (tx, rx) = unbounded();
        let session = Session {
            store: TopoStore::new(config.topo.clone()),
            mesh,
            history: History::new(config.undo_depth),
            transcript: Vec::new(),
        };
        tracing::debug!("Command manager created with {:?} policy", config.policy);
        Self {
            shared: Arc::new(Shared {
                session: Mutex::new(session),
                queue: Mutex::new(Queue::default()),
                changed: Condvar::new(),
                geom,
                config,
                notify: tx,
            }),
            notifications: rx,
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }

    pub fn geometry(&self) -> Arc<dyn GeometryProvider> {
        Arc::clone(&self.shared.geom)
    }

    /// Submit a command to be done.
    ///
    /// Undo and redo are not submitted with a command: they bind to the
    /// history when they run, see [`CommandManager::undo`].
    pub fn add_command(&self, command: Command, play: Play) -> CommandResult<CommandHandle> {
        if play != Play::Do || command.status() != CommandStatus::Inited {
            return Err(CommandError::InvalidState {
                command: command.name().to_string(),
                action: play.name().to_string(),
                status: command.status().name().to_string(),
            });
        }
        let handle = command.handle();
        self.submit(Job::Do(command));
        Ok(handle)
    }

    /// Undo the most recent command, once every queued command has run.
    ///
    /// Returns the id of the undone command, none when nothing was undoable.
    pub fn undo(&self) -> CommandResult<Option<Uuid>> {
        let ticket: Ticket = Arc::new(Mutex::new(None));
        self.submit(Job::Undo(Arc::clone(&ticket)));
        self.wait_ticket(&ticket)
    }

    pub fn redo(&self) -> CommandResult<Option<Uuid>> {
        let ticket: Ticket = Arc::new(Mutex::new(None));
        self.submit(Job::Redo(Arc::clone(&ticket)));
        self.wait_ticket(&ticket)
    }

    /// Request cancellation of a submitted command
    pub fn cancel(&self, handle: &CommandHandle) -> bool {
        handle.cancel()
    }

    /// Block until the queue is empty and no command runs
    pub fn wait_idle(&self) {
        let mut queue = self.shared.queue.lock();
        while queue.active || !queue.jobs.is_empty() {
            self.shared.changed.wait(&mut queue);
        }
    }

    /// Register an observer, called from [`CommandManager::dispatch_notifications`]
    pub fn subscribe(&self, observer: impl FnMut(&Notification) + Send + 'static) {
        self.observers.lock().push(Box::new(observer));
    }

    /// Deliver pending notifications on the calling thread
    pub fn dispatch_notifications(&self) -> usize {
        let mut observers = self.observers.lock();
        let mut delivered = 0;
        while let Ok(notification) = self.notifications.try_recv() {
            for observer in observers.iter_mut() {
                observer(&notification);
            }
            delivered += 1;
        }
        delivered
    }

    /// Read access to the store, waiting for the running command if any
    pub fn with_store<R>(&self, f: impl FnOnce(&TopoStore) -> R) -> R {
        f(&self.shared.session.lock().store)
    }

    pub fn describe(&self, id: EntityId) -> TopoResult<Description> {
        let geom = self.geometry();
        self.with_store(|store| store.describe(id, geom.as_ref()))
    }

    pub fn check(&self) -> TopoResult<CheckReport> {
        let geom = self.geometry();
        self.with_store(|store| check_all(store, geom.as_ref()))
    }

    /// Script lines of the session: completed commands, undo and redo
    pub fn transcript(&self) -> Vec<String> {
        self.shared.session.lock().transcript.clone()
    }

    pub fn undo_len(&self) -> usize {
        self.shared.session.lock().history.undo_len()
    }

    pub fn redo_len(&self) -> usize {
        self.shared.session.lock().history.redo_len()
    }

    pub fn undo_names(&self) -> Vec<String> {
        self.shared.session.lock().history.undo_names()
    }

    fn submit(&self, job: Job) {
        {
            let mut queue = self.shared.queue.lock();
            queue.jobs.push_back(job);
            if queue.active {
                return;
            }
            queue.active = true;
        }
        Shared::drain(&self.shared);
    }

    fn wait_ticket(&self, ticket: &Ticket) -> CommandResult<Option<Uuid>> {
        let mut queue = self.shared.queue.lock();
        loop {
            if let Some(outcome) = ticket.lock().take() {
                return outcome;
            }
            self.shared.changed.wait(&mut queue);
        }
    }
}

impl Drop for CommandManager {
    fn drop(&mut self) {
        self.wait_idle();
    }
}
