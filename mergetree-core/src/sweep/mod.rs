//! Task-parallel sweep that grows one front per leaf.
//!
//! Every leaf seeds a task. A task pops vertices from its front in sweep
//! order, assigning regular vertices to its open arc. At a saddle the task
//! parks its front on its union-find component and decrements the saddle's
//! valence; only the last arrival merges the waiting components, closes their
//! arcs at a new node and continues from the saddle as a fresh work item.
//! When a last arrival finds itself the only live task, the remaining chain is
//! left to [`backbone`].

pub(crate) mod backbone;
mod front;
pub(crate) mod segmentation;
mod union_find;

use std::sync::{
    OnceLock,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use rayon::prelude::*;
use tracing::{debug, instrument, trace};

use self::{
    front::PendingFront,
    union_find::{ComponentArena, ComponentId},
};
use crate::{
    Adjacency, MergeTreeError, Result, TreeType,
    error::invariant,
    order::Sweep,
    tree::{ArcId, Correspondence, NodeId, store::TreeStore},
};

const NO_COMPONENT: usize = 0;

/// Valences and extrema computed for one orientation.
///
/// Returned by [`crate::MergeTreeEngine::precompute`] and accepted by
/// [`crate::MergeTreeEngine::build_with_precomputation`], which then skips the
/// precompute phase.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Precomputation {
    tree_type: TreeType,
    valences: Vec<usize>,
    extrema: Vec<usize>,
}

impl Precomputation {
    /// Orientation the valences were counted for.
    #[must_use]
    #[rustfmt::skip]
    pub fn tree_type(&self) -> TreeType { self.tree_type }

    /// Local extrema in ascending vertex order.
    #[must_use]
    #[rustfmt::skip]
    pub fn extrema(&self) -> &[usize] { &self.extrema }

    /// Number of same-side neighbours of `vertex`.
    #[must_use]
    pub fn valence(&self, vertex: usize) -> Option<usize> {
        self.valences.get(vertex).copied()
    }

    /// Number of vertices covered.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.valences.len()
    }

    pub(crate) fn check(&self, tree_type: TreeType, vertex_count: usize) -> Result<()> {
        if self.tree_type != tree_type {
            return Err(MergeTreeError::PrecomputationMismatch {
                reason: "tree type differs",
            });
        }
        if self.valences.len() != vertex_count {
            return Err(MergeTreeError::PrecomputationMismatch {
                reason: "vertex count differs",
            });
        }
        Ok(())
    }
}

/// Counts same-side neighbours per vertex in contiguous vertex-id chunks.
#[instrument(name = "core.precompute", err, skip_all, fields(vertices = sweep.len(), chunk_size = chunk_size))]
pub(crate) fn precompute<M: Adjacency + Sync>(
    mesh: &M,
    sweep: &Sweep,
    tree_type: TreeType,
    chunk_size: usize,
) -> Result<Precomputation> {
    let vertex_count = sweep.len();
    let mut valences = vec![0; vertex_count];
    let extrema: Vec<Vec<usize>> = valences
        .par_chunks_mut(chunk_size)
        .enumerate()
        .map(|(chunk, slice)| {
            let base = chunk * chunk_size;
            let mut local = Vec::new();
            for (offset, valence) in slice.iter_mut().enumerate() {
                let vertex = base + offset;
                let position = sweep.position(vertex);
                let mut count = 0;
                for neighbour in mesh.neighbours(vertex) {
                    if neighbour >= vertex_count {
                        return Err(MergeTreeError::NeighbourOutOfBounds {
                            vertex,
                            neighbour,
                            vertex_count,
                        });
                    }
                    if sweep.position(neighbour) < position {
                        count += 1;
                    }
                }
                *valence = count;
                if count == 0 {
                    local.push(vertex);
                }
            }
            Ok(local)
        })
        .collect::<Result<_>>()?;
    let extrema: Vec<usize> = extrema.into_iter().flatten().collect();
    debug!(leaves = extrema.len(), "precompute finished");
    Ok(Precomputation {
        tree_type,
        valences,
        extrema,
    })
}

#[derive(Clone, Copy, Debug)]
struct SweepTask {
    start: usize,
    depth: usize,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Detection {
    is_saddle: bool,
    is_last: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum MergeMode {
    Parallel,
    Backbone,
}

/// Shared state of one build.
pub(crate) struct SweepContext<'a, M> {
    mesh: &'a M,
    sweep: &'a Sweep,
    store: TreeStore,
    valences: Vec<AtomicUsize>,
    owners: Vec<AtomicUsize>,
    tags: Vec<AtomicUsize>,
    needs_node: Vec<AtomicBool>,
    components: ComponentArena,
    leaves: Vec<NodeId>,
    active_tasks: AtomicUsize,
    max_depth: AtomicUsize,
    failure: OnceLock<MergeTreeError>,
}

impl<'a, M: Adjacency + Sync> SweepContext<'a, M> {
    /// Materialises the leaf nodes and one component per leaf.
    ///
    /// `leaf_vertices` is the launch order.
    pub(crate) fn new(
        mesh: &'a M,
        sweep: &'a Sweep,
        precomputation: &Precomputation,
        leaf_vertices: &[usize],
    ) -> Result<Self> {
        let vertex_count = sweep.len();
        let store = TreeStore::new(vertex_count);
        let mut leaves = Vec::with_capacity(leaf_vertices.len());
        for &vertex in leaf_vertices {
            leaves.push(store.make_node(vertex, Some(vertex))?);
        }
        let owners: Vec<AtomicUsize> = (0..vertex_count)
            .map(|_| AtomicUsize::new(NO_COMPONENT))
            .collect();
        for (component, &vertex) in leaf_vertices.iter().enumerate() {
            owners[vertex].store(component + 1, Ordering::SeqCst);
        }
        Ok(Self {
            mesh,
            sweep,
            store,
            valences: precomputation
                .valences
                .iter()
                .map(|&valence| AtomicUsize::new(valence))
                .collect(),
            owners,
            tags: (0..vertex_count)
                .map(|_| AtomicUsize::new(NO_COMPONENT))
                .collect(),
            needs_node: (0..vertex_count).map(|_| AtomicBool::new(false)).collect(),
            components: ComponentArena::with_seeds(leaf_vertices),
            leaves,
            active_tasks: AtomicUsize::new(leaf_vertices.len()),
            max_depth: AtomicUsize::new(0),
            failure: OnceLock::new(),
        })
    }

    pub(crate) fn leaves(&self) -> &[NodeId] {
        &self.leaves
    }

    pub(crate) fn store(&self) -> &TreeStore {
        &self.store
    }

    pub(crate) fn into_store(self) -> TreeStore {
        self.store
    }

    pub(crate) fn max_depth(&self) -> usize {
        self.max_depth.load(Ordering::SeqCst)
    }

    /// Runs one task per leaf until every front has finished or parked.
    ///
    /// Returns the vertex seeding the backbone when the mesh has a single
    /// leaf.
    #[instrument(name = "core.launch", err, skip_all, fields(leaves = self.leaves.len()))]
    pub(crate) fn launch(&self) -> Result<Option<usize>> {
        if let [only] = self.leaves.as_slice() {
            let vertex = self.store.node_vertex(*only)?;
            self.needs_node[vertex].store(true, Ordering::SeqCst);
            debug!(vertex, "single leaf, deferring to backbone");
            return Ok(Some(vertex));
        }

        rayon::scope(|scope| {
            for &leaf in &self.leaves {
                match self.store.node_vertex(leaf) {
                    Ok(start) => self.spawn(scope, SweepTask { start, depth: 0 }),
                    Err(error) => self.fail(error),
                }
            }
        });

        if let Some(error) = self.failure.get() {
            return Err(error.clone());
        }
        debug!(
            components = self.components.len(),
            nodes = self.store.node_count(),
            arcs = self.store.arc_count(),
            max_depth = self.max_depth(),
            "leaf sweep finished"
        );
        Ok(None)
    }

    fn spawn<'scope>(&'scope self, scope: &rayon::Scope<'scope>, task: SweepTask) {
        scope.spawn(move |scope| {
            if self.failure.get().is_some() {
                return;
            }
            if let Err(error) = self.run_task(scope, task) {
                self.fail(error);
            }
        });
    }

    fn fail(&self, error: MergeTreeError) {
        if self.failure.set(error).is_err() {
            trace!("a task failed after the first recorded failure");
        }
    }

    fn run_task<'scope>(&'scope self, scope: &rayon::Scope<'scope>, task: SweepTask) -> Result<()> {
        self.max_depth.fetch_max(task.depth, Ordering::SeqCst);
        let start = task.start;
        let component = self
            .owner(start)
            .ok_or_else(|| invariant("task start vertex must have an owner", start))?;
        let component = self.components.find(component);
        let start_node = self
            .store
            .node_of(start)
            .ok_or_else(|| invariant("task start vertex must own a node", start))?;

        let mut front = self.components.take_front(component)?;
        front.push(self.sweep.position(start), start);
        trace!(start, depth = task.depth, pending = front.len(), "task started");

        let mut open: Option<ArcId> = None;
        let mut last_visited = start;
        let mut start_expanded = false;

        while let Some(vertex) = front.pop() {
            match self.store.correspondence(vertex) {
                Correspondence::Arc(_) => continue,
                Correspondence::Node(_) if vertex != start || start_expanded => continue,
                Correspondence::Node(_) => {
                    start_expanded = true;
                    self.expand(start, component, &mut front);
                    continue;
                }
                Correspondence::Unassigned => {}
            }

            let arc = match open {
                Some(arc) => arc,
                None => {
                    let arc = self.store.open_arc(start_node)?;
                    self.components.register_arc(component, arc)?;
                    open = Some(arc);
                    arc
                }
            };

            let detection = self.detect(vertex, component, &mut front)?;
            if detection.is_saddle {
                if !detection.is_last {
                    self.active_tasks.fetch_sub(1, Ordering::SeqCst);
                    return Ok(());
                }
                if self.active_tasks.load(Ordering::SeqCst) == 1 {
                    debug!(saddle = vertex, "single front remaining, leaving chain to backbone");
                    return Ok(());
                }
                self.merge_and_close(vertex, Some(component), MergeMode::Parallel)?;
                self.spawn(scope, SweepTask {
                    start: vertex,
                    depth: task.depth + 1,
                });
                return Ok(());
            }

            self.store.assign_arc(vertex, arc)?;
            self.store.add_seen(arc, 1)?;
            last_visited = vertex;
        }

        let root = match open {
            Some(arc) => {
                let node = self.store.make_node(last_visited, None)?;
                self.store.retract_seen(arc)?;
                self.store.close_arc(arc, node)?;
                self.components.unregister_arc(component, arc)?;
                node
            }
            None => start_node,
        };
        self.components.set_extremum(component, last_visited)?;
        self.store.push_root(root)?;
        let extremum = self.components.extremum(component)?;
        trace!(root = root.get(), extremum, "front exhausted");
        Ok(())
    }

    /// Pushes opposite-side neighbours not yet claimed by `component`.
    fn expand(&self, vertex: usize, component: ComponentId, front: &mut PendingFront) {
        let position = self.sweep.position(vertex);
        for neighbour in self.mesh.neighbours(vertex) {
            if self.sweep.position(neighbour) > position {
                self.offer(neighbour, component, front);
            }
        }
    }

    fn offer(&self, vertex: usize, component: ComponentId, front: &mut PendingFront) {
        let tag = &self.tags[vertex];
        let claimed = match tag.load(Ordering::SeqCst) {
            NO_COMPONENT => false,
            raw => self.components.find(ComponentId::new(raw - 1)) == component,
        };
        if !claimed {
            front.push(self.sweep.position(vertex), vertex);
            tag.store(component.get() + 1, Ordering::SeqCst);
        }
    }

    /// Classifies `vertex` and consumes this front's share of its valence.
    ///
    /// A saddle's front is parked on `component` before the decrement so the
    /// last arrival finds it.
    fn detect(
        &self,
        vertex: usize,
        component: ComponentId,
        front: &mut PendingFront,
    ) -> Result<Detection> {
        let position = self.sweep.position(vertex);
        let mut is_saddle = false;
        let mut same_front = 0;
        for neighbour in self.mesh.neighbours(vertex) {
            if self.sweep.position(neighbour) < position {
                match self.owner(neighbour) {
                    Some(owner) if self.components.find(owner) == component => same_front += 1,
                    _ => is_saddle = true,
                }
            } else {
                self.offer(neighbour, component, front);
            }
        }

        self.owners[vertex].store(component.get() + 1, Ordering::SeqCst);
        if is_saddle {
            self.needs_node[vertex].store(true, Ordering::SeqCst);
            self.components
                .park(component, std::mem::take(front))?;
        }

        let previous = self.valences[vertex]
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |valence| {
                valence.checked_sub(same_front)
            })
            .map_err(|_| invariant("valence decrement must not exceed the remaining valence", vertex))?;
        Ok(Detection {
            is_saddle,
            is_last: previous == same_front,
        })
    }

    /// Materialises a node at `saddle`, merges every component meeting there
    /// and closes their opened arcs at the node.
    pub(crate) fn merge_and_close(
        &self,
        saddle: usize,
        component: Option<ComponentId>,
        mode: MergeMode,
    ) -> Result<NodeId> {
        let node = self.store.make_node(saddle, None)?;
        let mut merged = component.map(|component| self.components.find(component));
        let position = self.sweep.position(saddle);
        for neighbour in self.mesh.neighbours(saddle) {
            if self.sweep.position(neighbour) >= position {
                continue;
            }
            let Some(owner) = self.owner(neighbour) else {
                if mode == MergeMode::Parallel {
                    return Err(invariant(
                        "same-side neighbours of a resolved saddle must have an owner",
                        neighbour,
                    ));
                }
                continue;
            };
            merged = Some(match merged {
                Some(current) => self.components.union(current, owner)?,
                None => self.components.find(owner),
            });
        }

        if let Some(merged) = merged {
            let closed = self.components.drain_opened(merged)?;
            for &arc in &closed {
                self.store.close_arc(arc, node)?;
            }
            self.components.set_extremum(merged, saddle)?;
            self.owners[saddle].store(merged.get() + 1, Ordering::SeqCst);
            trace!(saddle, node = node.get(), closed = closed.len(), "merged at saddle");
        }
        Ok(node)
    }

    /// Flagged saddles that no task resolved, in sweep order.
    pub(crate) fn unresolved_saddles(&self, seed: Option<usize>) -> Vec<usize> {
        let mut pending: Vec<usize> = (0..self.sweep.len())
            .into_par_iter()
            .filter(|&vertex| {
                self.needs_node[vertex].load(Ordering::SeqCst) && self.store.node_of(vertex).is_none()
            })
            .collect();
        if let Some(seed) = seed {
            pending.push(seed);
        }
        pending.par_sort_unstable_by_key(|&vertex| self.sweep.position(vertex));
        pending.dedup();
        pending
    }

    pub(crate) fn owner(&self, vertex: usize) -> Option<ComponentId> {
        match self.owners.get(vertex)?.load(Ordering::SeqCst) {
            NO_COMPONENT => None,
            raw => Some(ComponentId::new(raw - 1)),
        }
    }

    pub(crate) fn sweep(&self) -> &Sweep {
        self.sweep
    }
}

#[cfg(test)]
mod tests;
