//! Transaction log
//!
//! Before any entity is mutated, the mutating code asks the log to save it.
//! The first save of an entity wins: the log keeps that one snapshot and a
//! classification that only ever upgrades. Undo walks the log backwards,
//! putting every snapshot back and dropping what the log created.
//!
//! Nodes and elements written to the mesh store are listed too, since the
//! log cannot reach the mesh store itself: whoever rolls a log back deletes
//! its [`TransactionLog::take_created_mesh`] ids.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entity::{EntityRecord, Lifecycle};
use crate::error::{TopoError, TopoResult};
use crate::id::EntityId;
use crate::provider::{ElementId, MeshData, NodeId};
use crate::store::TopoStore;

/// What happened to an entity during a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Change {
    /// Topology, meshing law or group change
    OtherModified,
    /// Change that only affects display, such as a coordinate
    DispModified,
    Created,
    Deleted,
    /// Created then deleted in the same transaction
    Scratch,
}

impl Change {
    /// Classification after a later change of the same entity
    pub fn upgrade(self, later: Change) -> Change {
        match (self, later) {
            (Change::Scratch, _) | (_, Change::Scratch) => Change::Scratch,
            (Change::Created, Change::Deleted) => Change::Scratch,
            (current, later) => current.max(later),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Change::OtherModified => "OTHERMODIFIED",
            Change::DispModified => "DISPMODIFIED",
            Change::Created => "CREATED",
            Change::Deleted => "DELETED",
            Change::Scratch => "SCRATCH",
        }
    }
}

#[derive(Debug, Clone)]
struct LogEntry {
    change: Change,
    /// State before the first save; none for created entities
    snapshot: Option<(EntityRecord, Lifecycle)>,
}

/// Record of every entity touched by one command, or one atomic edit
#[derive(Debug, Clone)]
pub struct TransactionLog {
    entries: BTreeMap<EntityId, LogEntry>,
    /// First-touch order
    order: Vec<EntityId>,
    /// Id counter when the log started
    watermark: u64,
    /// Id counter when the log was committed
    end: Option<u64>,
    /// Mesh written by the edits recorded here
    mesh: MeshData,
    /// Mesh written by nested edits that were rolled back
    orphans: MeshData,
}

impl TransactionLog {
    /// Start a log on the current state of `store`
    pub fn begin(store: &TopoStore) -> Self {
        Self {
            entries: BTreeMap::new(),
            order: Vec::new(),
            watermark: store.next_id(),
            end: None,
            mesh: MeshData::default(),
            orphans: MeshData::default(),
        }
    }

    /// Start a log as if the id counter were at `watermark`.
    ///
    /// Used to re-run an edit after undo so it allocates the same ids. Ids
    /// still occupied past the watermark are skipped, so the rerun allocates
    /// different ids instead of overwriting them.
    pub fn begin_at(store: &mut TopoStore, watermark: u64) -> Self {
        store.rewind_next_id(watermark);
        Self::begin(store)
    }

    pub fn watermark(&self) -> u64 {
        self.watermark
    }

    pub fn end(&self) -> Option<u64> {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn change(&self, id: EntityId) -> Option<Change> {
        self.entries.get(&id).map(|e| e.change)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Record nodes and elements just written to the mesh store
    pub fn mesh_created(&mut self, nodes: &[NodeId], elements: &[ElementId]) {
        self.mesh.nodes.extend_from_slice(nodes);
        self.mesh.elements.extend_from_slice(elements);
    }

    /// Mesh written by nested edits that failed; nothing refers to it
    pub fn take_orphan_mesh(&mut self) -> MeshData {
        std::mem::take(&mut self.orphans)
    }

    /// Every mesh id written under this log, to delete once it is rolled back
    pub fn take_created_mesh(&mut self) -> MeshData {
        let mut created = std::mem::take(&mut self.mesh);
        created.append(std::mem::take(&mut self.orphans));
        created
    }

    /// Save before a topology or meshing change; meshed entities are refused
    pub fn save(&mut self, store: &mut TopoStore, id: EntityId) -> TopoResult<()> {
        self.guard(store, id)?;
        self.touch(store, id, Change::OtherModified)
    }

    /// Save before a change that only affects display
    pub fn save_display(&mut self, store: &mut TopoStore, id: EntityId) -> TopoResult<()> {
        self.guard(store, id)?;
        self.touch(store, id, Change::DispModified)
    }

    /// Save before writing or clearing mesh data
    pub fn save_mesh_data(&mut self, store: &mut TopoStore, id: EntityId) -> TopoResult<()> {
        self.touch(store, id, Change::OtherModified)
    }

    /// Save before a group membership change, allowed on meshed entities
    pub fn save_groups(&mut self, store: &mut TopoStore, id: EntityId) -> TopoResult<()> {
        self.touch(store, id, Change::OtherModified)
    }

    /// Save before a back-link change caused by a neighbour
    pub(crate) fn save_links(&mut self, store: &mut TopoStore, id: EntityId) -> TopoResult<()> {
        self.touch(store, id, Change::OtherModified)
    }

    /// Record an entity that was just inserted
    pub fn created(&mut self, store: &mut TopoStore, id: EntityId) -> TopoResult<()> {
        if self.entries.contains_key(&id) {
            return Err(TopoError::Internal(format!("{id} created twice")));
        }
        store.retain(id);
        self.entries.insert(
            id,
            LogEntry {
                change: Change::Created,
                snapshot: None,
            },
        );
        self.order.push(id);
        Ok(())
    }

    /// Record an entity about to be marked destroyed
    pub fn deleted(&mut self, store: &mut TopoStore, id: EntityId) -> TopoResult<()> {
        self.touch(store, id, Change::Deleted)
    }

    fn guard(&self, store: &TopoStore, id: EntityId) -> TopoResult<()> {
        if store.is_meshed(id) {
            return Err(TopoError::Meshed(id.to_string()));
        }
        Ok(())
    }

    fn touch(&mut self, store: &mut TopoStore, id: EntityId, change: Change) -> TopoResult<()> {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.change = entry.change.upgrade(change);
            return Ok(());
        }
        let snapshot = store
            .record(id)
            .ok_or_else(|| TopoError::NotFound(id.to_string()))?;
        store.retain(id);
        tracing::debug!("Saved {} ({})", id, change.name());
        self.entries.insert(
            id,
            LogEntry {
                change,
                snapshot: Some(snapshot),
            },
        );
        self.order.push(id);
        Ok(())
    }

    /// Run `edit` in a child log: absorbed on success, rolled back on error.
    ///
    /// The graph is left untouched by a failed edit.
    pub fn atomic<T>(
        &mut self,
        store: &mut TopoStore,
        edit: impl FnOnce(&mut TopoStore, &mut TransactionLog) -> TopoResult<T>,
    ) -> TopoResult<T> {
        let mut child = TransactionLog::begin(store);
        match edit(store, &mut child) {
            Ok(value) => {
                self.absorb(store, child);
                Ok(value)
            }
            Err(err) => {
                self.orphans.append(child.take_created_mesh());
                if let Err(rollback_err) = child.rollback(store) {
                    return Err(TopoError::Internal(format!(
                        "{err}; rollback failed: {rollback_err}"
                    )));
                }
                Err(err)
            }
        }
    }

    fn absorb(&mut self, store: &mut TopoStore, child: TransactionLog) {
        let TransactionLog {
            mut entries,
            order,
            mesh,
            orphans,
            ..
        } = child;
        self.mesh.append(mesh);
        self.orphans.append(orphans);
        for id in order {
            let Some(entry) = entries.remove(&id) else {
                continue;
            };
            match self.entries.get_mut(&id) {
                Some(mine) => {
                    mine.change = mine.change.upgrade(entry.change);
                    // Both logs retained the slot; the earlier snapshot wins
                    store.release(id);
                }
                None => {
                    self.entries.insert(id, entry);
                    self.order.push(id);
                }
            }
        }
    }

    /// Close the log: scratch entities are deallocated for good
    pub fn commit(&mut self, store: &mut TopoStore) {
        for (id, entry) in &self.entries {
            if entry.change == Change::Scratch {
                store.remove(*id);
            }
        }
        self.end = Some(store.next_id());
    }

    /// Undo every recorded change and give up the retained slots.
    ///
    /// Snapshots are restored in reverse first-touch order, created entities
    /// are removed and the id counter goes back to the watermark.
    pub fn rollback(mut self, store: &mut TopoStore) -> TopoResult<()> {
        let mut result = Ok(());
        for id in self.order.iter().rev() {
            let Some(entry) = self.entries.get_mut(id) else {
                continue;
            };
            match (entry.change, entry.snapshot.take()) {
                (Change::Created | Change::Scratch, _) => store.remove(*id),
                (_, Some((record, lifecycle))) => {
                    if let Err(err) = store.restore(record, lifecycle) {
                        result = Err(err);
                    }
                }
                (_, None) => {
                    result = Err(TopoError::Internal(format!("no snapshot for {id}")));
                }
            }
        }
        store.rewind_next_id(self.watermark);
        self.release(store);
        tracing::debug!("Rolled back {} entity change(s)", self.entries.len());
        result
    }

    /// Give up the slots this log retains
    pub fn release(&mut self, store: &mut TopoStore) {
        for id in self.order.drain(..) {
            store.release(id);
        }
    }

    /// Touched entities with their classification, in id order
    pub fn delta(&self) -> Vec<(EntityId, Change)> {
        self.entries.iter().map(|(id, e)| (*id, e.change)).collect()
    }

    pub fn created_ids(&self) -> Vec<EntityId> {
        self.with_change(Change::Created)
    }

    pub fn deleted_ids(&self) -> Vec<EntityId> {
        self.with_change(Change::Deleted)
    }

    pub fn modified_ids(&self) -> Vec<EntityId> {
        self.entries
            .iter()
            .filter(|(_, e)| matches!(e.change, Change::OtherModified | Change::DispModified))
            .map(|(id, _)| *id)
            .collect()
    }

    fn with_change(&self, change: Change) -> Vec<EntityId> {
        self.entries
            .iter()
            .filter(|(_, e)| e.change == change)
            .map(|(id, _)| *id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TopoConfig;
    use crate::edit;
    use crate::id::VertexId;
    use glam::DVec3;

    #[test]
    fn test_change_upgrades() {
        assert_eq!(
            Change::OtherModified.upgrade(Change::DispModified),
            Change::DispModified
        );
        assert_eq!(Change::Created.upgrade(Change::OtherModified), Change::Created);
        assert_eq!(Change::Created.upgrade(Change::Deleted), Change::Scratch);
        assert_eq!(Change::Scratch.upgrade(Change::OtherModified), Change::Scratch);
        assert_eq!(Change::DispModified.upgrade(Change::Deleted), Change::Deleted);
    }

    #[test]
    fn test_first_save_wins() {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut setup = TransactionLog::begin(&store);
        let v = edit::new_vertex(&mut store, &mut setup, DVec3::ZERO).unwrap();
        setup.commit(&mut store);

        let mut log = TransactionLog::begin(&store);
        edit::move_vertex(&mut store, &mut log, v, DVec3::X).unwrap();
        edit::move_vertex(&mut store, &mut log, v, DVec3::Y).unwrap();
        assert_eq!(log.change(v.into()), Some(Change::DispModified));
        log.rollback(&mut store).unwrap();
        assert_eq!(store.vertex(v).unwrap().coord(), DVec3::ZERO);
    }

    #[test]
    fn test_rollback_removes_created_and_rewinds_ids() {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut log = TransactionLog::begin(&store);
        let watermark = store.next_id();
        let v = edit::new_vertex(&mut store, &mut log, DVec3::ZERO).unwrap();
        assert_eq!(log.created_ids(), vec![EntityId::from(v)]);
        log.rollback(&mut store).unwrap();
        assert!(store.get(v).is_err());
        assert_eq!(store.next_id(), watermark);
        assert_eq!(store.nb_slots(), 0);
    }

    #[test]
    fn test_atomic_failure_leaves_store_untouched() {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut log = TransactionLog::begin(&store);
        let result: TopoResult<VertexId> = log.atomic(&mut store, |store, child| {
            edit::new_vertex(store, child, DVec3::ZERO)?;
            Err(TopoError::InvalidArgument("stop".into()))
        });
        assert!(result.is_err());
        assert!(log.is_empty());
        assert_eq!(store.nb_slots(), 0);
    }

    #[test]
    fn test_scratch_is_removed_on_commit() {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut log = TransactionLog::begin(&store);
        let v = edit::new_vertex(&mut store, &mut log, DVec3::ZERO).unwrap();
        edit::free_vertex(&mut store, &mut log, v).unwrap();
        assert_eq!(log.change(v.into()), Some(Change::Scratch));
        log.commit(&mut store);
        assert_eq!(store.nb_slots(), 0);
        assert_eq!(log.end(), Some(store.next_id()));
    }

    #[test]
    fn test_meshed_entity_is_refused() {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut setup = TransactionLog::begin(&store);
        let v = edit::new_vertex(&mut store, &mut setup, DVec3::ZERO).unwrap();
        setup.commit(&mut store);
        store.header_mut(v.into()).unwrap().mesh = Some(Default::default());

        let mut log = TransactionLog::begin(&store);
        let err = edit::move_vertex(&mut store, &mut log, v, DVec3::X).unwrap_err();
        assert!(matches!(err, TopoError::Meshed(_)));
        assert!(log.is_empty());
    }
}
