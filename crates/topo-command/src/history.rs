//! Undo/redo history
//!
//! Two stacks of commands. A command leaving the history for good gives its
//! log back so the store can reclaim what only that log kept alive.

use topo_core::TopoStore;

use crate::command::Command;

#[derive(Debug, Default)]
pub struct History {
    undo: Vec<Command>,
    redo: Vec<Command>,
    /// Maximum undo stack length, 0 for no limit
    depth: usize,
}

impl History {
    pub fn new(depth: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            depth,
        }
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Names on the undo stack, most recent last
    pub fn undo_names(&self) -> Vec<String> {
        self.undo.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn redo_names(&self) -> Vec<String> {
        self.redo.iter().map(|c| c.name().to_string()).collect()
    }

    /// Record a completed DO; the redo stack no longer applies
    pub fn push_done(&mut self, command: Command, store: &mut TopoStore) {
        self.clear_redo(store);
        self.undo.push(command);
        self.enforce_depth(store);
    }

    pub fn pop_undo(&mut self) -> Option<Command> {
        self.undo.pop()
    }

    pub fn push_undone(&mut self, command: Command) {
        self.redo.push(command);
    }

    pub fn pop_redo(&mut self) -> Option<Command> {
        self.redo.pop()
    }

    pub fn push_redone(&mut self, command: Command, store: &mut TopoStore) {
        self.undo.push(command);
        self.enforce_depth(store);
    }

    pub fn clear_redo(&mut self, store: &mut TopoStore) {
        for mut command in self.redo.drain(..) {
            command.release(store);
        }
    }

    fn enforce_depth(&mut self, store: &mut TopoStore) {
        if self.depth == 0 || self.undo.len() <= self.depth {
            return;
        }
        let evicted = self.undo.len() - self.depth;
        for mut command in self.undo.drain(..evicted) {
            tracing::debug!("Dropping {} from the undo history", command.name());
            command.release(store);
        }
        store.reclaim();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Edit, EditContext, Play};
    use glam::DVec3;
    use topo_core::edit::{free_vertex, new_vertex};
    use topo_core::{InMemoryMeshStore, NullGeometry, TopoConfig, TopoResult, VertexId};

    struct Create;

    impl Edit for Create {
        fn name(&self) -> String {
            "Create".into()
        }

        fn script_command(&self) -> String {
            String::new()
        }

        fn apply(&mut self, ctx: &mut EditContext<'_>) -> TopoResult<()> {
            new_vertex(ctx.store, ctx.log, DVec3::ZERO)?;
            Ok(())
        }
    }

    struct Free(VertexId);

    impl Edit for Free {
        fn name(&self) -> String {
            format!("Free {}", self.0)
        }

        fn script_command(&self) -> String {
            String::new()
        }

        fn apply(&mut self, ctx: &mut EditContext<'_>) -> TopoResult<()> {
            free_vertex(ctx.store, ctx.log, self.0)
        }
    }

    fn run(edit: impl Edit + 'static, store: &mut TopoStore, history: &mut History) {
        let mut command = Command::new(edit);
        command
            .execute(Play::Do, store, &mut InMemoryMeshStore::new(), &NullGeometry)
            .unwrap();
        history.push_done(command, store);
    }

    #[test]
    fn test_eviction_reclaims_freed_slots() {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut history = History::new(1);
        run(Create, &mut store, &mut history);
        let vertex = store.ids::<VertexId>()[0];
        run(Free(vertex), &mut store, &mut history);
        // the free is still undoable
        assert_eq!(store.nb_slots(), 1);
        run(Create, &mut store, &mut history);
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.undo_names(), vec!["Create".to_string()]);
        assert!(store.slot(vertex).is_none());
    }

    #[test]
    fn test_new_command_clears_redo() {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut history = History::new(0);
        run(Create, &mut store, &mut history);
        let mut command = history.pop_undo().unwrap();
        command
            .execute(Play::Undo, &mut store, &mut InMemoryMeshStore::new(), &NullGeometry)
            .unwrap();
        history.push_undone(command);
        assert!(history.can_redo());
        run(Create, &mut store, &mut history);
        assert!(!history.can_redo());
        assert_eq!(history.undo_len(), 1);
    }
}
