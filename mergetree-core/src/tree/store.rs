//! Concurrent node and arc arenas written by the sweep.
//!
//! Nodes and arcs live in append-only `boxcar` vectors so tasks can create
//! them without a global lock while ids stay stable. Each vertex's
//! [`Correspondence`] is packed into one atomic word.

use std::sync::{
    Mutex, MutexGuard,
    atomic::{AtomicUsize, Ordering},
};

use super::{ArcId, Correspondence, Node, NodeId, SuperArc};
use crate::{MergeTreeError, Result, error::invariant};

const UNSET: usize = usize::MAX;

#[derive(Debug, Default)]
struct NodeLinks {
    up: Vec<ArcId>,
    down: Vec<ArcId>,
}

#[derive(Debug)]
struct NodeSlot {
    vertex: usize,
    termination: Option<usize>,
    links: Mutex<NodeLinks>,
}

#[derive(Debug)]
struct ArcSlot {
    down: NodeId,
    up: AtomicUsize,
    seen: AtomicUsize,
}

/// Build-time tree storage shared by every task.
pub(crate) struct TreeStore {
    nodes: boxcar::Vec<NodeSlot>,
    arcs: boxcar::Vec<ArcSlot>,
    correspondence: Vec<AtomicUsize>,
    roots: Mutex<Vec<NodeId>>,
}

const fn encode(correspondence: Correspondence) -> usize {
    match correspondence {
        Correspondence::Unassigned => 0,
        Correspondence::Node(node) => (node.get() << 1) | 1,
        Correspondence::Arc(arc) => (arc.get() + 1) << 1,
    }
}

const fn decode(raw: usize) -> Correspondence {
    if raw == 0 {
        Correspondence::Unassigned
    } else if raw & 1 == 1 {
        Correspondence::Node(NodeId::new(raw >> 1))
    } else {
        Correspondence::Arc(ArcId::new((raw >> 1) - 1))
    }
}

impl TreeStore {
    pub(crate) fn new(vertex_count: usize) -> Self {
        Self {
            nodes: boxcar::Vec::new(),
            arcs: boxcar::Vec::new(),
            correspondence: (0..vertex_count).map(|_| AtomicUsize::new(0)).collect(),
            roots: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn vertex_count(&self) -> usize {
        self.correspondence.len()
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.count()
    }

    pub(crate) fn arc_count(&self) -> usize {
        self.arcs.count()
    }

    pub(crate) fn correspondence(&self, vertex: usize) -> Correspondence {
        self.correspondence
            .get(vertex)
            .map_or(Correspondence::Unassigned, |raw| {
                decode(raw.load(Ordering::SeqCst))
            })
    }

    pub(crate) fn node_of(&self, vertex: usize) -> Option<NodeId> {
        match self.correspondence(vertex) {
            Correspondence::Node(node) => Some(node),
            _ => None,
        }
    }

    fn cell(&self, vertex: usize) -> Result<&AtomicUsize> {
        self.correspondence
            .get(vertex)
            .ok_or(MergeTreeError::VertexOutOfBounds {
                vertex,
                vertex_count: self.correspondence.len(),
            })
    }

    /// Records `vertex` as interior to `arc`.
    pub(crate) fn assign_arc(&self, vertex: usize, arc: ArcId) -> Result<()> {
        self.cell(vertex)?
            .store(encode(Correspondence::Arc(arc)), Ordering::SeqCst);
        Ok(())
    }

    /// Returns the node at `vertex`, creating it when the vertex has none.
    pub(crate) fn make_node(&self, vertex: usize, termination: Option<usize>) -> Result<NodeId> {
        let cell = self.cell(vertex)?;
        if let Correspondence::Node(existing) = decode(cell.load(Ordering::SeqCst)) {
            return Ok(existing);
        }
        let node = NodeId::new(self.nodes.push(NodeSlot {
            vertex,
            termination,
            links: Mutex::new(NodeLinks::default()),
        }));
        cell.store(encode(Correspondence::Node(node)), Ordering::SeqCst);
        Ok(node)
    }

    pub(crate) fn node_vertex(&self, node: NodeId) -> Result<usize> {
        Ok(self.node_slot(node)?.vertex)
    }

    /// Opens an arc leaving `down`; its up end is set by [`Self::close_arc`].
    pub(crate) fn open_arc(&self, down: NodeId) -> Result<ArcId> {
        let slot = self.node_slot(down)?;
        let arc = ArcId::new(self.arcs.push(ArcSlot {
            down,
            up: AtomicUsize::new(UNSET),
            seen: AtomicUsize::new(1),
        }));
        lock_links(slot)?.up.push(arc);
        Ok(arc)
    }

    /// Creates an arc whose endpoints are both known.
    pub(crate) fn make_arc(&self, down: NodeId, up: NodeId) -> Result<ArcId> {
        let arc = self.open_arc(down)?;
        self.close_arc(arc, up)?;
        Ok(arc)
    }

    pub(crate) fn close_arc(&self, arc: ArcId, up: NodeId) -> Result<()> {
        let up_slot = self.node_slot(up)?;
        self.arc_slot(arc)?.up.store(up.get(), Ordering::SeqCst);
        lock_links(up_slot)?.down.push(arc);
        Ok(())
    }

    pub(crate) fn add_seen(&self, arc: ArcId, count: usize) -> Result<()> {
        self.arc_slot(arc)?.seen.fetch_add(count, Ordering::SeqCst);
        Ok(())
    }

    /// Removes one vertex from an arc's count when that vertex became the
    /// arc's closing node.
    pub(crate) fn retract_seen(&self, arc: ArcId) -> Result<()> {
        self.arc_slot(arc)?
            .seen
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |seen| seen.checked_sub(1))
            .map(|_| ())
            .map_err(|_| invariant("arc seen count must stay positive", arc.get()))
    }

    pub(crate) fn seen(&self, arc: ArcId) -> Result<usize> {
        Ok(self.arc_slot(arc)?.seen.load(Ordering::SeqCst))
    }

    pub(crate) fn push_root(&self, node: NodeId) -> Result<()> {
        self.node_slot(node)?;
        self.roots
            .lock()
            .map_err(|_| MergeTreeError::LockPoisoned {
                resource: "tree root list",
            })?
            .push(node);
        Ok(())
    }

    fn node_slot(&self, node: NodeId) -> Result<&NodeSlot> {
        self.nodes.get(node.get()).ok_or(MergeTreeError::UnknownNode {
            node: node.get(),
            node_count: self.nodes.count(),
        })
    }

    fn arc_slot(&self, arc: ArcId) -> Result<&ArcSlot> {
        self.arcs.get(arc.get()).ok_or(MergeTreeError::UnknownArc {
            arc: arc.get(),
            arc_count: self.arcs.count(),
        })
    }

    /// Converts the store into plain vectors once every task has finished.
    ///
    /// `regions` holds one region per arc when segmentation was built.
    pub(crate) fn freeze(self, mut regions: Option<Vec<Vec<usize>>>) -> Result<FrozenStore> {
        let node_count = self.nodes.count();
        let mut nodes = Vec::with_capacity(node_count);
        for index in 0..node_count {
            let slot = self
                .nodes
                .get(index)
                .ok_or_else(|| invariant("node slots must be contiguous", index))?;
            let links = lock_links(slot)?;
            nodes.push(Node::new(
                slot.vertex,
                slot.termination,
                links.up.clone(),
                links.down.clone(),
            ));
        }

        let arc_count = self.arcs.count();
        let mut arcs = Vec::with_capacity(arc_count);
        for index in 0..arc_count {
            let slot = self
                .arcs
                .get(index)
                .ok_or_else(|| invariant("arc slots must be contiguous", index))?;
            let up = match slot.up.load(Ordering::SeqCst) {
                UNSET => None,
                up => Some(NodeId::new(up)),
            };
            let region = regions
                .as_mut()
                .and_then(|regions| regions.get_mut(index))
                .map(std::mem::take)
                .unwrap_or_default();
            arcs.push(SuperArc::new(
                slot.down,
                up,
                slot.seen.load(Ordering::SeqCst),
                region,
            ));
        }

        let correspondence = self
            .correspondence
            .into_iter()
            .map(|raw| decode(raw.into_inner()))
            .collect();
        let roots = self
            .roots
            .into_inner()
            .map_err(|_| MergeTreeError::LockPoisoned {
                resource: "tree root list",
            })?;
        Ok(FrozenStore {
            nodes,
            arcs,
            roots,
            correspondence,
        })
    }
}

pub(crate) struct FrozenStore {
    pub(crate) nodes: Vec<Node>,
    pub(crate) arcs: Vec<SuperArc>,
    pub(crate) roots: Vec<NodeId>,
    pub(crate) correspondence: Vec<Correspondence>,
}

fn lock_links(slot: &NodeSlot) -> Result<MutexGuard<'_, NodeLinks>> {
    slot.links.lock().map_err(|_| MergeTreeError::LockPoisoned {
        resource: "node arc lists",
    })
}
