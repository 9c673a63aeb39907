//! Arena-based topology store
//!
//! All entities live in the [`TopoStore`], one ordered map per kind, and
//! reference each other through typed ids. This avoids reference cycles in the
//! inherently cyclic topology graph. Freed entities stay in their slot until
//! no transaction log needs their prior state anymore.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::TopoConfig;
use crate::entity::{
    Block, CoEdge, CoFace, Edge, EntityRecord, Face, Header, Lifecycle, TopoEntity, Vertex,
};
use crate::error::{TopoError, TopoResult};
use crate::id::{BlockId, CoEdgeId, CoFaceId, EdgeId, EntityId, FaceId, TypedId, VertexId};
use crate::txn::TransactionLog;

/// Arena cell holding one entity and its lifecycle
#[derive(Debug, Clone, PartialEq)]
pub struct Slot<T> {
    pub(crate) entity: T,
    pub(crate) lifecycle: Lifecycle,
    /// Number of transaction logs holding the prior state of this entity
    pub(crate) retention: u32,
}

impl<T> Slot<T> {
    fn live(entity: T) -> Self {
        Self {
            entity,
            lifecycle: Lifecycle::Live,
            retention: 0,
        }
    }

    pub fn entity(&self) -> &T {
        &self.entity
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn retention(&self) -> u32 {
        self.retention
    }
}

/// Run `$body` with `$raw` bound to the typed id inside an [`EntityId`]
macro_rules! dispatch {
    ($id:expr, $raw:ident => $body:expr) => {
        match $id {
            EntityId::Vertex($raw) => $body,
            EntityId::CoEdge($raw) => $body,
            EntityId::Edge($raw) => $body,
            EntityId::CoFace($raw) => $body,
            EntityId::Face($raw) => $body,
            EntityId::Block($raw) => $body,
        }
    };
}

/// Arena storage for all topology entities
#[derive(Debug, Clone, Default)]
pub struct TopoStore {
    pub(crate) vertices: BTreeMap<VertexId, Slot<Vertex>>,
    pub(crate) coedges: BTreeMap<CoEdgeId, Slot<CoEdge>>,
    pub(crate) edges: BTreeMap<EdgeId, Slot<Edge>>,
    pub(crate) cofaces: BTreeMap<CoFaceId, Slot<CoFace>>,
    pub(crate) faces: BTreeMap<FaceId, Slot<Face>>,
    pub(crate) blocks: BTreeMap<BlockId, Slot<Block>>,
    /// Next raw id, shared by every kind
    pub(crate) next_id: u64,
    pub(crate) config: TopoConfig,
}

impl TopoStore {
    pub fn new(config: TopoConfig) -> Self {
        Self {
            next_id: 1,
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &TopoConfig {
        &self.config
    }

    /// Raw value the next allocated id will carry
    pub fn next_id(&self) -> u64 {
        self.next_id.max(1)
    }

    /// Set the id counter back to `next_id`, never at or below an occupied slot
    pub(crate) fn rewind_next_id(&mut self, next_id: u64) {
        let highest = [
            self.vertices.keys().next_back().map(|id| id.0),
            self.coedges.keys().next_back().map(|id| id.0),
            self.edges.keys().next_back().map(|id| id.0),
            self.cofaces.keys().next_back().map(|id| id.0),
            self.faces.keys().next_back().map(|id| id.0),
            self.blocks.keys().next_back().map(|id| id.0),
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(0);
        self.next_id = next_id.max(highest + 1);
    }

    /// Move the id counter forward to at least `next_id`
    pub fn ensure_next_id(&mut self, next_id: u64) {
        self.next_id = self.next_id.max(next_id);
    }

    pub(crate) fn alloc<I: TypedId>(&mut self) -> I {
        let raw = self.next_id();
        self.next_id = raw + 1;
        I::from_raw(raw)
    }

    // ============== Typed access ==============

    pub fn slot<I: TypedId>(&self, id: I) -> Option<&Slot<I::Entity>> {
        <I::Entity as TopoEntity>::arena(self).get(&id)
    }

    /// Live entity
    pub fn get<I: TypedId>(&self, id: I) -> TopoResult<&I::Entity> {
        match self.slot(id) {
            Some(slot) if slot.lifecycle == Lifecycle::Live => Ok(&slot.entity),
            Some(_) => Err(TopoError::Destroyed(id.to_string())),
            None => Err(TopoError::NotFound(id.to_string())),
        }
    }

    /// Entity in any lifecycle state
    pub fn get_any<I: TypedId>(&self, id: I) -> TopoResult<&I::Entity> {
        self.slot(id)
            .map(|slot| &slot.entity)
            .ok_or_else(|| TopoError::NotFound(id.to_string()))
    }

    /// Mutable access without any log bookkeeping; callers save first
    pub(crate) fn get_mut<I: TypedId>(&mut self, id: I) -> TopoResult<&mut I::Entity> {
        match <I::Entity as TopoEntity>::arena_mut(self).get_mut(&id) {
            Some(slot) if slot.lifecycle == Lifecycle::Live => Ok(&mut slot.entity),
            Some(_) => Err(TopoError::Destroyed(id.to_string())),
            None => Err(TopoError::NotFound(id.to_string())),
        }
    }

    pub fn is_live<I: TypedId>(&self, id: I) -> bool {
        self.slot(id)
            .is_some_and(|slot| slot.lifecycle == Lifecycle::Live)
    }

    /// Ids of the live entities of one kind, in id order
    pub fn ids<I: TypedId>(&self) -> Vec<I> {
        <I::Entity as TopoEntity>::arena(self)
            .iter()
            .filter(|(_, slot)| slot.lifecycle == Lifecycle::Live)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Live entities of one kind, in id order
    pub fn iter<E: TopoEntity>(&self) -> impl Iterator<Item = &E> + '_ {
        E::arena(self)
            .values()
            .filter(|slot| slot.lifecycle == Lifecycle::Live)
            .map(|slot| &slot.entity)
    }

    pub fn count<E: TopoEntity>(&self) -> usize {
        self.iter::<E>().count()
    }

    /// Number of occupied slots, whatever their lifecycle
    pub fn nb_slots(&self) -> usize {
        self.vertices.len()
            + self.coedges.len()
            + self.edges.len()
            + self.cofaces.len()
            + self.faces.len()
            + self.blocks.len()
    }

    pub fn vertex(&self, id: VertexId) -> TopoResult<&Vertex> {
        self.get(id)
    }

    pub fn coedge(&self, id: CoEdgeId) -> TopoResult<&CoEdge> {
        self.get(id)
    }

    pub fn edge(&self, id: EdgeId) -> TopoResult<&Edge> {
        self.get(id)
    }

    pub fn coface(&self, id: CoFaceId) -> TopoResult<&CoFace> {
        self.get(id)
    }

    pub fn face(&self, id: FaceId) -> TopoResult<&Face> {
        self.get(id)
    }

    pub fn block(&self, id: BlockId) -> TopoResult<&Block> {
        self.get(id)
    }

    pub(crate) fn insert<E: TopoEntity>(&mut self, entity: E) {
        E::arena_mut(self).insert(entity.id(), Slot::live(entity));
    }

    // ============== Untyped access ==============

    pub fn lifecycle(&self, id: EntityId) -> Option<Lifecycle> {
        dispatch!(id, raw => self.slot(raw).map(|s| s.lifecycle))
    }

    pub fn retention(&self, id: EntityId) -> u32 {
        dispatch!(id, raw => self.slot(raw).map_or(0, |s| s.retention))
    }

    pub fn header(&self, id: EntityId) -> Option<&Header> {
        dispatch!(id, raw => self.slot(raw).map(|s| s.entity.header()))
    }

    pub(crate) fn header_mut(&mut self, id: EntityId) -> TopoResult<&mut Header> {
        dispatch!(id, raw => self.get_mut(raw).map(|e| e.header_mut()))
    }

    pub fn is_meshed(&self, id: EntityId) -> bool {
        self.header(id).is_some_and(Header::is_meshed)
    }

    /// Copy of an entity together with its lifecycle
    pub fn record(&self, id: EntityId) -> Option<(EntityRecord, Lifecycle)> {
        dispatch!(id, raw => self
            .slot(raw)
            .map(|s| (s.entity.clone().into_record(), s.lifecycle)))
    }

    /// Put a recorded state back into an existing slot
    pub(crate) fn restore(&mut self, record: EntityRecord, lifecycle: Lifecycle) -> TopoResult<()> {
        fn put<E: TopoEntity>(store: &mut TopoStore, entity: E, lifecycle: Lifecycle) -> TopoResult<()> {
            let id = entity.id();
            let slot = E::arena_mut(store)
                .get_mut(&id)
                .ok_or_else(|| TopoError::Internal(format!("no slot left to restore {id}")))?;
            slot.entity = entity;
            slot.lifecycle = lifecycle;
            Ok(())
        }
        match record {
            EntityRecord::Vertex(e) => put(self, e, lifecycle),
            EntityRecord::CoEdge(e) => put(self, e, lifecycle),
            EntityRecord::Edge(e) => put(self, e, lifecycle),
            EntityRecord::CoFace(e) => put(self, e, lifecycle),
            EntityRecord::Face(e) => put(self, e, lifecycle),
            EntityRecord::Block(e) => put(self, e, lifecycle),
        }
    }

    /// Deallocate a slot immediately
    pub(crate) fn remove(&mut self, id: EntityId) {
        fn take<I: TypedId>(store: &mut TopoStore, id: I) {
            <I::Entity as TopoEntity>::arena_mut(store).remove(&id);
        }
        dispatch!(id, raw => take(self, raw))
    }

    pub(crate) fn set_lifecycle(&mut self, id: EntityId, lifecycle: Lifecycle) {
        fn set<I: TypedId>(store: &mut TopoStore, id: I, lifecycle: Lifecycle) {
            if let Some(slot) = <I::Entity as TopoEntity>::arena_mut(store).get_mut(&id) {
                slot.lifecycle = match lifecycle {
                    Lifecycle::Destroyed if slot.retention == 0 => Lifecycle::Reclaimable,
                    other => other,
                };
            }
        }
        dispatch!(id, raw => set(self, raw, lifecycle))
    }

    // ============== Retention ==============

    pub(crate) fn retain(&mut self, id: EntityId) {
        fn inc<I: TypedId>(store: &mut TopoStore, id: I) {
            if let Some(slot) = <I::Entity as TopoEntity>::arena_mut(store).get_mut(&id) {
                slot.retention += 1;
            }
        }
        dispatch!(id, raw => inc(self, raw))
    }

    pub(crate) fn release(&mut self, id: EntityId) {
        fn dec<I: TypedId>(store: &mut TopoStore, id: I) {
            if let Some(slot) = <I::Entity as TopoEntity>::arena_mut(store).get_mut(&id) {
                slot.retention = slot.retention.saturating_sub(1);
                if slot.retention == 0 && slot.lifecycle == Lifecycle::Destroyed {
                    slot.lifecycle = Lifecycle::Reclaimable;
                }
            }
        }
        dispatch!(id, raw => dec(self, raw))
    }

    /// Deallocate every reclaimable slot, returning how many were removed
    pub fn reclaim(&mut self) -> usize {
        fn sweep<T>(arena: &mut BTreeMap<impl Ord, Slot<T>>) -> usize {
            let before = arena.len();
            arena.retain(|_, slot| slot.lifecycle != Lifecycle::Reclaimable);
            before - arena.len()
        }
        let removed = sweep(&mut self.vertices)
            + sweep(&mut self.coedges)
            + sweep(&mut self.edges)
            + sweep(&mut self.cofaces)
            + sweep(&mut self.faces)
            + sweep(&mut self.blocks);
        if removed > 0 {
            tracing::debug!("Reclaimed {} entity slot(s)", removed);
        }
        removed
    }

    /// Copies of every live entity, in kind then id order
    pub fn live_records(&self) -> Vec<EntityRecord> {
        fn collect<E: TopoEntity>(store: &TopoStore, out: &mut Vec<EntityRecord>) {
            out.extend(store.iter::<E>().cloned().map(E::into_record));
        }
        let mut out = Vec::new();
        collect::<Vertex>(self, &mut out);
        collect::<CoEdge>(self, &mut out);
        collect::<Edge>(self, &mut out);
        collect::<CoFace>(self, &mut out);
        collect::<Face>(self, &mut out);
        collect::<Block>(self, &mut out);
        out
    }

    // ============== Rewiring ==============

    /// Replace the ordered children of `owner`, keeping back links in sync.
    ///
    /// This is the single step through which forward and back links change.
    /// The owner and every child gaining or losing the owner are saved in
    /// `log` first; the owner save fails on a meshed owner.
    pub fn rewire<P: Downward>(
        &mut self,
        log: &mut TransactionLog,
        owner: P::Id,
        children: Vec<ChildId<P>>,
    ) -> TopoResult<()> {
        let old: BTreeSet<ChildId<P>> = self.get(owner)?.children().into_iter().collect();
        let new: BTreeSet<ChildId<P>> = children.iter().copied().collect();
        let mut gained = Vec::new();
        for child in &new {
            if !P::parents(self.get(*child)?).contains(&owner) {
                gained.push(*child);
            }
        }
        let lost: Vec<ChildId<P>> = old
            .difference(&new)
            .copied()
            .filter(|child| self.is_live(*child))
            .collect();

        log.save(self, owner.into())?;
        for child in gained.iter().chain(lost.iter()) {
            log.save_links(self, (*child).into())?;
        }

        self.get_mut(owner)?.set_children(children)?;
        for child in lost {
            P::parents_mut(self.get_mut(child)?).remove(&owner);
        }
        for child in gained {
            P::parents_mut(self.get_mut(child)?).insert(owner);
        }
        tracing::debug!("Rewired {} to {} child(ren)", owner, new.len());
        Ok(())
    }

    /// Drop the back links the children of `owner` hold to it
    pub(crate) fn unlink_children<P: Downward>(
        &mut self,
        log: &mut TransactionLog,
        owner: P::Id,
    ) -> TopoResult<()> {
        let children: BTreeSet<ChildId<P>> = self.get_any(owner)?.children().into_iter().collect();
        for child in children {
            if !self.is_live(child) {
                continue;
            }
            log.save_links(self, child.into())?;
            P::parents_mut(self.get_mut(child)?).remove(&owner);
        }
        Ok(())
    }
}

/// Id of the child kind of `P`
pub type ChildId<P> = <<P as Downward>::Child as TopoEntity>::Id;

/// Ordered downward adjacency mirrored by a back-link set in the child
pub trait Downward: TopoEntity {
    type Child: TopoEntity;

    fn children(&self) -> Vec<ChildId<Self>>;

    fn set_children(&mut self, children: Vec<ChildId<Self>>) -> TopoResult<()>;

    fn parents(child: &Self::Child) -> &BTreeSet<Self::Id>;

    fn parents_mut(child: &mut Self::Child) -> &mut BTreeSet<Self::Id>;
}

impl Downward for CoEdge {
    type Child = Vertex;

    fn children(&self) -> Vec<VertexId> {
        self.vertices.to_vec()
    }

    fn set_children(&mut self, children: Vec<VertexId>) -> TopoResult<()> {
        match children.as_slice() {
            [a, b] => {
                self.vertices = [*a, *b];
                Ok(())
            }
            _ => Err(TopoError::invariant(
                self.id,
                format!("a coedge joins 2 vertices, got {}", children.len()),
            )),
        }
    }

    fn parents(child: &Vertex) -> &BTreeSet<CoEdgeId> {
        &child.coedges
    }

    fn parents_mut(child: &mut Vertex) -> &mut BTreeSet<CoEdgeId> {
        &mut child.coedges
    }
}

impl Downward for Edge {
    type Child = CoEdge;

    fn children(&self) -> Vec<CoEdgeId> {
        self.coedges.clone()
    }

    fn set_children(&mut self, children: Vec<CoEdgeId>) -> TopoResult<()> {
        self.ratios.retain(|coedge, _| children.contains(coedge));
        self.coedges = children;
        Ok(())
    }

    fn parents(child: &CoEdge) -> &BTreeSet<EdgeId> {
        &child.edges
    }

    fn parents_mut(child: &mut CoEdge) -> &mut BTreeSet<EdgeId> {
        &mut child.edges
    }
}

impl Downward for CoFace {
    type Child = Edge;

    fn children(&self) -> Vec<EdgeId> {
        self.edges.clone()
    }

    fn set_children(&mut self, children: Vec<EdgeId>) -> TopoResult<()> {
        self.edges = children;
        Ok(())
    }

    fn parents(child: &Edge) -> &BTreeSet<CoFaceId> {
        &child.cofaces
    }

    fn parents_mut(child: &mut Edge) -> &mut BTreeSet<CoFaceId> {
        &mut child.cofaces
    }
}

impl Downward for Face {
    type Child = CoFace;

    fn children(&self) -> Vec<CoFaceId> {
        self.cofaces.clone()
    }

    fn set_children(&mut self, children: Vec<CoFaceId>) -> TopoResult<()> {
        self.cofaces = children;
        Ok(())
    }

    fn parents(child: &CoFace) -> &BTreeSet<FaceId> {
        &child.faces
    }

    fn parents_mut(child: &mut CoFace) -> &mut BTreeSet<FaceId> {
        &mut child.faces
    }
}

impl Downward for Block {
    type Child = Face;

    fn children(&self) -> Vec<FaceId> {
        self.faces.clone()
    }

    fn set_children(&mut self, children: Vec<FaceId>) -> TopoResult<()> {
        self.faces = children;
        Ok(())
    }

    fn parents(child: &Face) -> &BTreeSet<BlockId> {
        &child.blocks
    }

    fn parents_mut(child: &mut Face) -> &mut BTreeSet<BlockId> {
        &mut child.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::law::EdgeMeshing;
    use glam::DVec3;

    fn two_vertices(store: &mut TopoStore) -> (VertexId, VertexId) {
        let a: VertexId = store.alloc();
        store.insert(Vertex::new(a, DVec3::ZERO));
        let b: VertexId = store.alloc();
        store.insert(Vertex::new(b, DVec3::X));
        (a, b)
    }

    #[test]
    fn test_ids_are_shared_across_kinds() {
        let mut store = TopoStore::new(TopoConfig::default());
        let v: VertexId = store.alloc();
        let e: EdgeId = store.alloc();
        assert_eq!(v.raw(), 1);
        assert_eq!(e.raw(), 2);
        assert_eq!(store.next_id(), 3);
    }

    #[test]
    fn test_rewire_keeps_back_links() {
        let mut store = TopoStore::new(TopoConfig::default());
        let (a, b) = two_vertices(&mut store);
        let c: VertexId = store.alloc();
        store.insert(Vertex::new(c, DVec3::Y));
        let ce: CoEdgeId = store.alloc();
        store.insert(CoEdge::new(ce, [a, b], EdgeMeshing::uniform(2)));

        let mut log = TransactionLog::begin(&store);
        store.rewire::<CoEdge>(&mut log, ce, vec![a, b]).unwrap();
        assert!(store.vertex(a).unwrap().coedges().contains(&ce));

        store.rewire::<CoEdge>(&mut log, ce, vec![a, c]).unwrap();
        assert!(!store.vertex(b).unwrap().coedges().contains(&ce));
        assert!(store.vertex(c).unwrap().coedges().contains(&ce));
        assert!(store.rewire::<CoEdge>(&mut log, ce, vec![a]).is_err());
    }

    #[test]
    fn test_get_reports_destroyed() {
        let mut store = TopoStore::new(TopoConfig::default());
        let (a, _) = two_vertices(&mut store);
        store.set_lifecycle(a.into(), Lifecycle::Destroyed);
        // nothing retains it, so it is reclaimable right away
        assert_eq!(store.lifecycle(a.into()), Some(Lifecycle::Reclaimable));
        assert!(matches!(store.get(a), Err(TopoError::Destroyed(_))));
        assert!(store.get_any(a).is_ok());
        assert_eq!(store.reclaim(), 1);
        assert!(matches!(store.get(a), Err(TopoError::NotFound(_))));
    }

    #[test]
    fn test_release_makes_reclaimable() {
        let mut store = TopoStore::new(TopoConfig::default());
        let (a, _) = two_vertices(&mut store);
        store.retain(a.into());
        store.set_lifecycle(a.into(), Lifecycle::Destroyed);
        assert_eq!(store.lifecycle(a.into()), Some(Lifecycle::Destroyed));
        assert_eq!(store.reclaim(), 0);
        store.release(a.into());
        assert_eq!(store.lifecycle(a.into()), Some(Lifecycle::Reclaimable));
    }
}
