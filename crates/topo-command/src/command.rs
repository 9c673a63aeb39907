//! Commands
//!
//! A [`Command`] wraps one [`Edit`] with everything needed to play it back:
//! the transaction log of its last run, the delta of its first run and the
//! script text it emits. The first DO records the delta; UNDO rolls the log
//! back and REDO re-runs the edit from the same id watermark, which must give
//! the same delta again.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use uuid::Uuid;

use topo_core::{
    Change, EntityId, GeometryProvider, MeshData, MeshStore, TopoError, TopoResult, TopoStore,
    TransactionLog,
};

use crate::error::{CommandError, CommandResult};

/// How a command is played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Play {
    Do,
    Undo,
    Redo,
}

impl Play {
    pub fn name(&self) -> &'static str {
        match self {
            Play::Do => "do",
            Play::Undo => "undo",
            Play::Redo => "redo",
        }
    }
}

/// Command status; DONE, CANCELED and FAIL are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandStatus {
    Inited,
    Starting,
    Processing,
    Done,
    Canceled,
    Fail,
}

impl CommandStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommandStatus::Done | CommandStatus::Canceled | CommandStatus::Fail
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            CommandStatus::Inited => "INITED",
            CommandStatus::Starting => "STARTING",
            CommandStatus::Processing => "PROCESSING",
            CommandStatus::Done => "DONE",
            CommandStatus::Canceled => "CANCELED",
            CommandStatus::Fail => "FAIL",
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What an edit sees while it runs
pub struct EditContext<'a> {
    pub store: &'a mut TopoStore,
    pub log: &'a mut TransactionLog,
    pub mesh: &'a mut dyn MeshStore,
    pub geom: &'a dyn GeometryProvider,
    cancel: &'a AtomicBool,
}

impl<'a> EditContext<'a> {
    pub fn new(
        store: &'a mut TopoStore,
        log: &'a mut TransactionLog,
        mesh: &'a mut dyn MeshStore,
        geom: &'a dyn GeometryProvider,
        cancel: &'a AtomicBool,
    ) -> Self {
        Self {
            store,
            log,
            mesh,
            geom,
            cancel,
        }
    }

    /// Fail with [`TopoError::Canceled`] once cancellation was requested
    pub fn checkpoint(&self) -> TopoResult<()> {
        if self.cancel.load(Ordering::Acquire) {
            return Err(TopoError::Canceled);
        }
        Ok(())
    }
}

/// Editing logic run by a command.
///
/// `apply` is run again on redo, against the state undo restored, and must
/// then make the same changes.
pub trait Edit: Send {
    /// Name shown to the user
    fn name(&self) -> String;

    /// Line of script replaying the edit
    fn script_command(&self) -> String;

    fn estimated_duration(&self) -> Duration {
        Duration::ZERO
    }

    /// Whether the edit may run on a worker thread
    fn threadable(&self) -> bool {
        false
    }

    fn apply(&mut self, ctx: &mut EditContext<'_>) -> TopoResult<()>;

    /// Main entities produced by the last run
    fn outputs(&self) -> Vec<EntityId> {
        Vec::new()
    }
}

#[derive(Debug)]
struct CommandState {
    id: Uuid,
    name: String,
    status: Mutex<CommandStatus>,
    message: Mutex<Option<String>>,
    cancel: AtomicBool,
}

/// Shared view on a submitted command
#[derive(Debug, Clone)]
pub struct CommandHandle(Arc<CommandState>);

impl CommandHandle {
    pub fn id(&self) -> Uuid {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn status(&self) -> CommandStatus {
        *self.0.status.lock()
    }

    /// Failure or cancellation message
    pub fn message(&self) -> Option<String> {
        self.0.message.lock().clone()
    }

    /// Request cancellation; returns false once the command reached a terminal status
    pub fn cancel(&self) -> bool {
        let mut status = self.0.status.lock();
        if status.is_terminal() {
            return false;
        }
        self.0.cancel.store(true, Ordering::Release);
        *status = CommandStatus::Canceled;
        tracing::info!("Cancel requested for {}", self.0.name);
        true
    }
}

/// Undoable unit of mutation
pub struct Command {
    state: Arc<CommandState>,
    edit: Box<dyn Edit>,
    script_command: Option<String>,
    script_comments: Option<String>,
    /// Log of the last DO or REDO, none while undone
    log: Option<TransactionLog>,
    /// Delta of the first DO
    delta: Vec<(EntityId, Change)>,
    watermark: u64,
    end: u64,
    undone: bool,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.state.id)
            .field("name", &self.state.name)
            .field("status", &self.status())
            .field("undone", &self.undone)
            .finish()
    }
}

impl Command {
    pub fn new(edit: impl Edit + 'static) -> Self {
        let name = edit.name();
        Self {
            state: Arc::new(CommandState {
                id: Uuid::new_v4(),
                name,
                status: Mutex::new(CommandStatus::Inited),
                message: Mutex::new(None),
                cancel: AtomicBool::new(false),
            }),
            edit: Box::new(edit),
            script_command: None,
            script_comments: None,
            log: None,
            delta: Vec::new(),
            watermark: 0,
            end: 0,
            undone: false,
        }
    }

    pub fn handle(&self) -> CommandHandle {
        CommandHandle(Arc::clone(&self.state))
    }

    pub fn id(&self) -> Uuid {
        self.state.id
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn status(&self) -> CommandStatus {
        *self.state.status.lock()
    }

    pub fn message(&self) -> Option<String> {
        self.state.message.lock().clone()
    }

    pub fn estimated_duration(&self) -> Duration {
        self.edit.estimated_duration()
    }

    pub fn threadable(&self) -> bool {
        self.edit.threadable()
    }

    pub fn outputs(&self) -> Vec<EntityId> {
        self.edit.outputs()
    }

    /// Delta recorded by the first DO
    pub fn delta(&self) -> &[(EntityId, Change)] {
        &self.delta
    }

    pub fn is_undone(&self) -> bool {
        self.undone
    }

    /// Keep the script text of the command; the first call wins
    pub fn save_script_command_and_comments(
        &mut self,
        command: impl Into<String>,
        comments: impl Into<String>,
    ) {
        if self.script_command.is_none() {
            self.script_command = Some(command.into());
            self.script_comments = Some(comments.into());
        }
    }

    /// Stored script text, or the one the edit would emit now
    pub fn initial_script_command(&self) -> String {
        self.script_command
            .clone()
            .unwrap_or_else(|| self.edit.script_command())
    }

    pub fn script_comments(&self) -> Option<&str> {
        self.script_comments.as_deref()
    }

    fn set_status(&self, status: CommandStatus) {
        *self.state.status.lock() = status;
    }

    fn set_message(&self, message: impl Into<String>) {
        *self.state.message.lock() = Some(message.into());
    }

    fn invalid(&self, play: Play) -> CommandError {
        let status = if self.undone {
            "undone".to_string()
        } else {
            self.status().name().to_string()
        };
        CommandError::InvalidState {
            command: self.state.name.clone(),
            action: play.name().to_string(),
            status,
        }
    }

    /// Move to `status` unless cancellation was requested
    fn advance(&self, status: CommandStatus) -> TopoResult<()> {
        let mut current = self.state.status.lock();
        if self.state.cancel.load(Ordering::Acquire) {
            return Err(TopoError::Canceled);
        }
        *current = status;
        Ok(())
    }

    /// Play the command against the session
    pub fn execute(
        &mut self,
        play: Play,
        store: &mut TopoStore,
        mesh: &mut dyn MeshStore,
        geom: &dyn GeometryProvider,
    ) -> CommandResult<()> {
        match play {
            Play::Do => self.execute_do(store, mesh, geom),
            Play::Undo => self.execute_undo(store, mesh),
            Play::Redo => self.execute_redo(store, mesh, geom),
        }
    }

    fn execute_do(
        &mut self,
        store: &mut TopoStore,
        mesh: &mut dyn MeshStore,
        geom: &dyn GeometryProvider,
    ) -> CommandResult<()> {
        match self.status() {
            CommandStatus::Inited => {}
            CommandStatus::Canceled => return Err(TopoError::Canceled.into()),
            _ => return Err(self.invalid(Play::Do)),
        }
        let mut log = TransactionLog::begin(store);
        // A cancel landing after the last checkpoint still wins over DONE
        let result = self
            .advance(CommandStatus::Starting)
            .and_then(|_| self.advance(CommandStatus::Processing))
            .and_then(|_| self.run(store, &mut log, mesh, geom))
            .and_then(|_| self.advance(CommandStatus::Done));
        match result {
            Ok(()) => {
                discard_mesh(mesh, log.take_orphan_mesh());
                log.commit(store);
                self.watermark = log.watermark();
                self.end = log.end().unwrap_or_else(|| store.next_id());
                self.delta = log.delta();
                self.log = Some(log);
                Ok(())
            }
            Err(err) => Err(self.abort(store, mesh, log, err)),
        }
    }

    fn execute_undo(&mut self, store: &mut TopoStore, mesh: &mut dyn MeshStore) -> CommandResult<()> {
        if self.status() != CommandStatus::Done || self.undone {
            return Err(self.invalid(Play::Undo));
        }
        let Some(log) = self.log.take() else {
            return Err(self.invalid(Play::Undo));
        };
        if let Err(err) = rollback(store, mesh, log) {
            return Err(self.fail(err.to_string()));
        }
        self.undone = true;
        Ok(())
    }

    fn execute_redo(
        &mut self,
        store: &mut TopoStore,
        mesh: &mut dyn MeshStore,
        geom: &dyn GeometryProvider,
    ) -> CommandResult<()> {
        if self.status() != CommandStatus::Done || !self.undone {
            return Err(self.invalid(Play::Redo));
        }
        let mut log = TransactionLog::begin_at(store, self.watermark);
        if let Err(err) = self.run(store, &mut log, mesh, geom) {
            let message = match rollback(store, mesh, log) {
                Ok(()) => err.to_string(),
                Err(rollback) => format!("{err}; rollback failed: {rollback}"),
            };
            return Err(self.fail(message));
        }
        log.commit(store);
        if log.delta() != self.delta {
            tracing::error!(
                "Redo of {} touched {} entities instead of {}",
                self.state.name,
                log.len(),
                self.delta.len()
            );
            if let Err(err) = rollback(store, mesh, log) {
                return Err(self.fail(format!("redo diverged; rollback failed: {err}")));
            }
            self.set_status(CommandStatus::Fail);
            self.set_message("redo diverged from the first run");
            return Err(CommandError::RedoDiverged {
                command: self.state.name.clone(),
            });
        }
        discard_mesh(mesh, log.take_orphan_mesh());
        store.ensure_next_id(self.end);
        self.log = Some(log);
        self.undone = false;
        Ok(())
    }

    fn run(
        &mut self,
        store: &mut TopoStore,
        log: &mut TransactionLog,
        mesh: &mut dyn MeshStore,
        geom: &dyn GeometryProvider,
    ) -> TopoResult<()> {
        let cancel = &self.state.cancel;
        let edit = &mut self.edit;
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut ctx = EditContext::new(store, log, mesh, geom, cancel);
            ctx.checkpoint()?;
            edit.apply(&mut ctx)?;
            ctx.checkpoint()
        }));
        match outcome {
            Ok(result) => result,
            Err(payload) => Err(TopoError::Internal(format!(
                "edit panicked: {}",
                panic_message(payload.as_ref())
            ))),
        }
    }

    /// Undo a failed or canceled DO and record the terminal status
    fn abort(
        &mut self,
        store: &mut TopoStore,
        mesh: &mut dyn MeshStore,
        log: TransactionLog,
        err: TopoError,
    ) -> CommandError {
        let rollback = rollback(store, mesh, log);
        if matches!(err, TopoError::Canceled) && rollback.is_ok() {
            self.set_status(CommandStatus::Canceled);
            self.set_message("canceled");
            tracing::info!("{} canceled", self.state.name);
            return err.into();
        }
        let message = match rollback {
            Ok(()) => err.to_string(),
            Err(rollback) => format!("{err}; rollback failed: {rollback}"),
        };
        self.fail(message)
    }

    fn fail(&mut self, message: String) -> CommandError {
        tracing::error!("{} failed: {}", self.state.name, message);
        self.set_status(CommandStatus::Fail);
        self.set_message(message.clone());
        CommandError::Failed {
            command: self.state.name.clone(),
            message,
        }
    }

    /// Give up the slots retained by the command log
    pub fn release(&mut self, store: &mut TopoStore) {
        if let Some(mut log) = self.log.take() {
            log.release(store);
        }
    }
}

/// Roll `log` back, then delete the mesh written under it
fn rollback(store: &mut TopoStore, mesh: &mut dyn MeshStore, mut log: TransactionLog) -> TopoResult<()> {
    let created = log.take_created_mesh();
    log.rollback(store)?;
    discard_mesh(mesh, created);
    Ok(())
}

/// Delete mesh data nothing refers to anymore
fn discard_mesh(mesh: &mut dyn MeshStore, data: MeshData) {
    if data.is_empty() {
        return;
    }
    match mesh.delete(&data) {
        Ok(()) => tracing::debug!(
            "Deleted {} node(s) and {} element(s)",
            data.nodes.len(),
            data.elements.len()
        ),
        Err(err) => tracing::warn!("Mesh cleanup failed: {}", err),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use topo_core::edit::new_vertex;
    use topo_core::{InMemoryMeshStore, NullGeometry, TopoConfig, Vertex};

    /// Creates one vertex per run, or more when `extra` is bumped after the first run
    struct AddVertex {
        runs: u32,
        extra_on_rerun: bool,
        panic: bool,
    }

    impl Edit for AddVertex {
        fn name(&self) -> String {
            "Add vertex".into()
        }

        fn script_command(&self) -> String {
            "ctx.getTopoManager().newVertex(0, 0, 0)".into()
        }

        fn apply(&mut self, ctx: &mut EditContext<'_>) -> TopoResult<()> {
            if self.panic {
                panic!("broken edit");
            }
            self.runs += 1;
            new_vertex(ctx.store, ctx.log, DVec3::ZERO)?;
            if self.extra_on_rerun && self.runs > 1 {
                new_vertex(ctx.store, ctx.log, DVec3::X)?;
            }
            Ok(())
        }
    }

    fn add_vertex() -> AddVertex {
        AddVertex {
            runs: 0,
            extra_on_rerun: false,
            panic: false,
        }
    }

    #[test]
    fn test_do_undo_redo() {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut mesh = InMemoryMeshStore::new();
        let mut command = Command::new(add_vertex());
        command.execute(Play::Do, &mut store, &mut mesh, &NullGeometry).unwrap();
        assert_eq!(command.status(), CommandStatus::Done);
        assert_eq!(store.count::<Vertex>(), 1);
        let first = store.ids::<topo_core::VertexId>();

        command.execute(Play::Undo, &mut store, &mut mesh, &NullGeometry).unwrap();
        assert_eq!(store.count::<Vertex>(), 0);
        assert!(command.execute(Play::Undo, &mut store, &mut mesh, &NullGeometry).is_err());

        command.execute(Play::Redo, &mut store, &mut mesh, &NullGeometry).unwrap();
        assert_eq!(store.ids::<topo_core::VertexId>(), first);
        assert_eq!(store.next_id(), first[0].0 + 1);
    }

    #[test]
    fn test_diverging_redo_fails() {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut mesh = InMemoryMeshStore::new();
        let mut command = Command::new(AddVertex {
            extra_on_rerun: true,
            ..add_vertex()
        });
        command.execute(Play::Do, &mut store, &mut mesh, &NullGeometry).unwrap();
        command.execute(Play::Undo, &mut store, &mut mesh, &NullGeometry).unwrap();
        let err = command
            .execute(Play::Redo, &mut store, &mut mesh, &NullGeometry)
            .unwrap_err();
        assert!(matches!(err, CommandError::RedoDiverged { .. }));
        assert_eq!(command.status(), CommandStatus::Fail);
        assert_eq!(store.count::<Vertex>(), 0);
    }

    #[test]
    fn test_panic_becomes_fail() {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut mesh = InMemoryMeshStore::new();
        let mut command = Command::new(AddVertex {
            panic: true,
            ..add_vertex()
        });
        let err = command
            .execute(Play::Do, &mut store, &mut mesh, &NullGeometry)
            .unwrap_err();
        assert!(matches!(err, CommandError::Failed { .. }));
        assert_eq!(command.status(), CommandStatus::Fail);
        assert!(command.message().unwrap().contains("broken edit"));
    }

    #[test]
    fn test_cancel_before_start() {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut mesh = InMemoryMeshStore::new();
        let mut command = Command::new(add_vertex());
        assert!(command.handle().cancel());
        assert_eq!(command.status(), CommandStatus::Canceled);
        let err = command
            .execute(Play::Do, &mut store, &mut mesh, &NullGeometry)
            .unwrap_err();
        assert_eq!(err, CommandError::Topo(TopoError::Canceled));
        assert_eq!(store.count::<Vertex>(), 0);
    }

    #[test]
    fn test_cancel_has_no_effect_once_done() {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut mesh = InMemoryMeshStore::new();
        let mut command = Command::new(add_vertex());
        command.execute(Play::Do, &mut store, &mut mesh, &NullGeometry).unwrap();
        assert!(!command.handle().cancel());
        assert_eq!(command.status(), CommandStatus::Done);
    }

    #[test]
    fn test_cancel_after_last_checkpoint_wins_over_done() {
        let command = Command::new(add_vertex());
        command.advance(CommandStatus::Processing).unwrap();
        assert!(command.handle().cancel());
        assert_eq!(command.advance(CommandStatus::Done), Err(TopoError::Canceled));
        assert_eq!(command.status(), CommandStatus::Canceled);
    }

    /// Cancels its own command once its work is done
    struct CancelSelf {
        handle: Arc<Mutex<Option<CommandHandle>>>,
    }

    impl Edit for CancelSelf {
        fn name(&self) -> String {
            "Cancel self".into()
        }

        fn script_command(&self) -> String {
            String::new()
        }

        fn apply(&mut self, ctx: &mut EditContext<'_>) -> TopoResult<()> {
            new_vertex(ctx.store, ctx.log, DVec3::ZERO)?;
            ctx.checkpoint()?;
            if let Some(handle) = self.handle.lock().as_ref() {
                assert!(handle.cancel());
            }
            Ok(())
        }
    }

    #[test]
    fn test_late_cancel_rolls_back() {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut mesh = InMemoryMeshStore::new();
        let slot = Arc::new(Mutex::new(None));
        let mut command = Command::new(CancelSelf {
            handle: Arc::clone(&slot),
        });
        *slot.lock() = Some(command.handle());

        let err = command
            .execute(Play::Do, &mut store, &mut mesh, &NullGeometry)
            .unwrap_err();
        assert_eq!(err, CommandError::Topo(TopoError::Canceled));
        assert_eq!(command.status(), CommandStatus::Canceled);
        assert_eq!(store.count::<Vertex>(), 0);
        assert!(command.execute(Play::Undo, &mut store, &mut mesh, &NullGeometry).is_err());
    }

    /// Writes two nodes and a segment, then fails when asked to
    struct WriteMesh {
        fail: bool,
    }

    impl Edit for WriteMesh {
        fn name(&self) -> String {
            "Write mesh".into()
        }

        fn script_command(&self) -> String {
            String::new()
        }

        fn apply(&mut self, ctx: &mut EditContext<'_>) -> TopoResult<()> {
            let a = ctx.mesh.create_node(DVec3::ZERO);
            let b = ctx.mesh.create_node(DVec3::X);
            let segment = ctx.mesh.create_element(&[a, b])?;
            ctx.log.mesh_created(&[a, b], &[segment]);
            new_vertex(ctx.store, ctx.log, DVec3::ZERO)?;
            if self.fail {
                return Err(TopoError::MeshStore("disk full".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_undo_and_failure_delete_written_mesh() {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut mesh = InMemoryMeshStore::new();
        let mut command = Command::new(WriteMesh { fail: false });
        for _ in 0..3 {
            let play = if command.is_undone() { Play::Redo } else { Play::Do };
            command.execute(play, &mut store, &mut mesh, &NullGeometry).unwrap();
            assert_eq!((mesh.nb_nodes(), mesh.nb_elements()), (2, 1));
            command.execute(Play::Undo, &mut store, &mut mesh, &NullGeometry).unwrap();
            assert_eq!((mesh.nb_nodes(), mesh.nb_elements()), (0, 0));
        }

        let mut failing = Command::new(WriteMesh { fail: true });
        assert!(failing.execute(Play::Do, &mut store, &mut mesh, &NullGeometry).is_err());
        assert_eq!(failing.status(), CommandStatus::Fail);
        assert_eq!((mesh.nb_nodes(), mesh.nb_elements()), (0, 0));
        assert_eq!(store.count::<Vertex>(), 0);
    }

    #[test]
    fn test_first_script_wins() {
        let mut command = Command::new(add_vertex());
        assert_eq!(
            command.initial_script_command(),
            "ctx.getTopoManager().newVertex(0, 0, 0)"
        );
        command.save_script_command_and_comments("first()", "First");
        command.save_script_command_and_comments("second()", "Second");
        assert_eq!(command.initial_script_command(), "first()");
        assert_eq!(command.script_comments(), Some("First"));
    }
}
