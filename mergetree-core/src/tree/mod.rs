//! The merge tree produced by a build and its read API.
//!
//! During construction the engine writes into a concurrent [`store::TreeStore`];
//! once every phase has finished the store is frozen into a [`MergeTree`],
//! which owns plain vectors and supports the edit operations in [`edit`].

mod edit;
pub(crate) mod store;

use std::fmt;

use rayon::prelude::*;
use tracing::warn;

use crate::{MergeTreeError, Result, TreeType, stats::{BuildStats, HeightStats}};

/// Identifier of a node within a [`MergeTree`].
///
/// # Examples
/// ```
/// use mergetree_core::NodeId;
///
/// let id = NodeId::new(3);
/// assert_eq!(id.get(), 3);
/// assert_eq!(id.to_string(), "n3");
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(usize);

impl NodeId {
    /// Wraps a raw node index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw node index.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Identifier of a super arc within a [`MergeTree`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ArcId(usize);

impl ArcId {
    /// Wraps a raw arc index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw arc index.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for ArcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}", self.0)
    }
}

/// What a vertex belongs to in the tree.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Correspondence {
    /// The vertex has not been reached.
    #[default]
    Unassigned,
    /// The vertex is a critical point owning this node.
    Node(NodeId),
    /// The vertex is interior to this arc.
    Arc(ArcId),
}

/// A critical point of the scalar field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Node {
    vertex: usize,
    termination: Option<usize>,
    up_arcs: Vec<ArcId>,
    down_arcs: Vec<ArcId>,
}

impl Node {
    pub(crate) const fn new(
        vertex: usize,
        termination: Option<usize>,
        up_arcs: Vec<ArcId>,
        down_arcs: Vec<ArcId>,
    ) -> Self {
        Self {
            vertex,
            termination,
            up_arcs,
            down_arcs,
        }
    }

    /// Mesh vertex carrying this node.
    #[must_use]
    #[rustfmt::skip]
    pub fn vertex(&self) -> usize { self.vertex }

    /// Termination tag: the leaf vertex this node was seeded from, if any.
    #[must_use]
    #[rustfmt::skip]
    pub fn termination(&self) -> Option<usize> { self.termination }

    /// Arcs leaving this node in the sweep direction.
    #[must_use]
    #[rustfmt::skip]
    pub fn up_arcs(&self) -> &[ArcId] { &self.up_arcs }

    /// Arcs arriving at this node.
    #[must_use]
    #[rustfmt::skip]
    pub fn down_arcs(&self) -> &[ArcId] { &self.down_arcs }

    /// Returns `true` when no arc arrives at this node.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.down_arcs.is_empty() && !self.up_arcs.is_empty()
    }

    /// Returns `true` when several arcs arrive at this node.
    #[must_use]
    pub fn is_saddle(&self) -> bool {
        self.down_arcs.len() > 1
    }

    /// Returns `true` when the node is disconnected from every arc.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.down_arcs.is_empty() && self.up_arcs.is_empty()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vertex {} down [", self.vertex)?;
        write_ids(f, &self.down_arcs)?;
        f.write_str("] up [")?;
        write_ids(f, &self.up_arcs)?;
        f.write_str("]")
    }
}

fn write_ids<T: fmt::Display>(f: &mut fmt::Formatter<'_>, ids: &[T]) -> fmt::Result {
    for (position, id) in ids.iter().enumerate() {
        if position > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{id}")?;
    }
    Ok(())
}

/// A monotone path between two nodes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SuperArc {
    down: NodeId,
    up: Option<NodeId>,
    seen: usize,
    region: Vec<usize>,
    hidden: bool,
}

impl SuperArc {
    pub(crate) const fn new(down: NodeId, up: Option<NodeId>, seen: usize, region: Vec<usize>) -> Self {
        Self {
            down,
            up,
            seen,
            region,
            hidden: false,
        }
    }

    /// Node the arc starts from.
    #[must_use]
    #[rustfmt::skip]
    pub fn down(&self) -> NodeId { self.down }

    /// Node the arc ends at; `None` only for an arc that was never closed.
    #[must_use]
    #[rustfmt::skip]
    pub fn up(&self) -> Option<NodeId> { self.up }

    /// Vertices counted on the arc during the sweep, including one endpoint.
    #[must_use]
    #[rustfmt::skip]
    pub fn seen(&self) -> usize { self.seen }

    /// Interior vertices in sweep order; empty unless segmentation was built.
    #[must_use]
    #[rustfmt::skip]
    pub fn region(&self) -> &[usize] { &self.region }

    /// Returns `true` when an edit removed the arc from the tree.
    #[must_use]
    #[rustfmt::skip]
    pub fn is_hidden(&self) -> bool { self.hidden }
}

impl fmt::Display for SuperArc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.up {
            Some(up) => write!(f, "{} -> {up}", self.down)?,
            None => write!(f, "{} -> open", self.down)?,
        }
        write!(f, " seen {}", self.seen)?;
        if !self.region.is_empty() {
            write!(f, " region {}", self.region.len())?;
        }
        if self.hidden {
            f.write_str(" hidden")?;
        }
        Ok(())
    }
}

/// A join or split tree built over a mesh.
#[derive(Clone, Debug)]
pub struct MergeTree {
    tree_type: TreeType,
    nodes: Vec<Node>,
    arcs: Vec<SuperArc>,
    leaves: Vec<NodeId>,
    roots: Vec<NodeId>,
    correspondence: Vec<Correspondence>,
    positions: Vec<usize>,
    segmented: bool,
    stats: BuildStats,
}

pub(crate) struct MergeTreeParts {
    pub(crate) tree_type: TreeType,
    pub(crate) nodes: Vec<Node>,
    pub(crate) arcs: Vec<SuperArc>,
    pub(crate) leaves: Vec<NodeId>,
    pub(crate) roots: Vec<NodeId>,
    pub(crate) correspondence: Vec<Correspondence>,
    pub(crate) positions: Vec<usize>,
    pub(crate) segmented: bool,
    pub(crate) stats: BuildStats,
}

impl MergeTree {
    pub(crate) fn from_parts(parts: MergeTreeParts) -> Self {
        Self {
            tree_type: parts.tree_type,
            nodes: parts.nodes,
            arcs: parts.arcs,
            leaves: parts.leaves,
            roots: parts.roots,
            correspondence: parts.correspondence,
            positions: parts.positions,
            segmented: parts.segmented,
            stats: parts.stats,
        }
    }

    /// Orientation the tree was built with.
    #[must_use]
    #[rustfmt::skip]
    pub fn tree_type(&self) -> TreeType { self.tree_type }

    /// All nodes, indexed by [`NodeId`].
    #[must_use]
    #[rustfmt::skip]
    pub fn nodes(&self) -> &[Node] { &self.nodes }

    /// All arcs, indexed by [`ArcId`], including arcs hidden by edits.
    #[must_use]
    #[rustfmt::skip]
    pub fn arcs(&self) -> &[SuperArc] { &self.arcs }

    /// Leaf nodes in launch order.
    #[must_use]
    #[rustfmt::skip]
    pub fn leaves(&self) -> &[NodeId] { &self.leaves }

    /// Root nodes, one per connected component.
    #[must_use]
    #[rustfmt::skip]
    pub fn roots(&self) -> &[NodeId] { &self.roots }

    /// Statistics collected while building.
    #[must_use]
    #[rustfmt::skip]
    pub fn stats(&self) -> &BuildStats { &self.stats }

    /// Returns `true` when arc regions were filled.
    #[must_use]
    #[rustfmt::skip]
    pub fn is_segmented(&self) -> bool { self.segmented }

    /// Number of nodes, detached ones included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of arcs, hidden ones included.
    #[must_use]
    pub fn arc_count(&self) -> usize {
        self.arcs.len()
    }

    /// Number of mesh vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.correspondence.len()
    }

    /// Iterates over the arcs that are still part of the tree.
    pub fn visible_arcs(&self) -> impl Iterator<Item = (ArcId, &SuperArc)> + '_ {
        self.arcs
            .iter()
            .enumerate()
            .filter(|(_, arc)| !arc.hidden)
            .map(|(index, arc)| (ArcId::new(index), arc))
    }

    /// Iterates over nodes where several arcs merge.
    pub fn saddles(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_saddle())
            .map(|(index, _)| NodeId::new(index))
    }

    /// Looks up a node.
    ///
    /// # Errors
    /// Returns [`MergeTreeError::UnknownNode`] when `id` is out of range.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.get()).ok_or_else(|| {
            warn!(node = id.get(), node_count = self.nodes.len(), "node id out of range");
            MergeTreeError::UnknownNode {
                node: id.get(),
                node_count: self.nodes.len(),
            }
        })
    }

    /// Looks up an arc.
    ///
    /// # Errors
    /// Returns [`MergeTreeError::UnknownArc`] when `id` is out of range.
    pub fn arc(&self, id: ArcId) -> Result<&SuperArc> {
        self.arcs.get(id.get()).ok_or_else(|| {
            warn!(arc = id.get(), arc_count = self.arcs.len(), "arc id out of range");
            MergeTreeError::UnknownArc {
                arc: id.get(),
                arc_count: self.arcs.len(),
            }
        })
    }

    /// Returns what `vertex` belongs to.
    ///
    /// # Errors
    /// Returns [`MergeTreeError::VertexOutOfBounds`] when `vertex` is not a
    /// mesh vertex.
    pub fn correspondence(&self, vertex: usize) -> Result<Correspondence> {
        self.correspondence
            .get(vertex)
            .copied()
            .ok_or_else(|| self.vertex_out_of_bounds(vertex))
    }

    /// Returns the node owned by `vertex`, if it is critical.
    #[must_use]
    pub fn vertex_node(&self, vertex: usize) -> Option<NodeId> {
        match self.correspondence.get(vertex) {
            Some(Correspondence::Node(node)) => Some(*node),
            _ => None,
        }
    }

    /// Returns the arc `vertex` is interior to, if any.
    #[must_use]
    pub fn vertex_arc(&self, vertex: usize) -> Option<ArcId> {
        match self.correspondence.get(vertex) {
            Some(Correspondence::Arc(arc)) => Some(*arc),
            _ => None,
        }
    }

    /// Returns the up node of `node`'s first up arc; `None` for a root.
    ///
    /// # Errors
    /// Returns [`MergeTreeError::UnknownNode`] when `node` is out of range.
    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>> {
        let Some(&first) = self.node(node)?.up_arcs.first() else {
            return Ok(None);
        };
        Ok(self.arc(first)?.up)
    }

    /// Returns every node id sorted by the sweep position of its vertex.
    ///
    /// # Examples
    /// ```
    /// use mergetree_core::{AdjacencyGraph, MergeTreeBuilder, ScalarField};
    ///
    /// let mesh = AdjacencyGraph::from_edges(3, [(0, 1), (1, 2)]).expect("valid edges");
    /// let field = ScalarField::new(vec![0.0, 2.0, 1.0]).expect("finite values");
    /// let engine = MergeTreeBuilder::new().build().expect("valid configuration");
    /// let tree = engine.build(&mesh, &field, false).expect("build succeeds");
    /// let vertices: Vec<usize> = tree
    ///     .sorted_nodes()
    ///     .into_iter()
    ///     .map(|node| tree.nodes()[node.get()].vertex())
    ///     .collect();
    /// assert_eq!(vertices, vec![0, 2, 1]);
    /// ```
    #[must_use]
    pub fn sorted_nodes(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = (0..self.nodes.len()).map(NodeId::new).collect();
        ids.sort_unstable_by_key(|id| self.sweep_position(self.nodes[id.get()].vertex));
        ids
    }

    /// Measures leaf-to-root path lengths in arcs.
    ///
    /// Returns `None` for a tree without leaves.
    #[must_use]
    pub fn height_stats(&self) -> Option<HeightStats> {
        if self.leaves.is_empty() {
            return None;
        }
        let heights: Vec<usize> = self
            .leaves
            .par_iter()
            .map(|&leaf| self.height_from(leaf))
            .collect();
        let max = heights.iter().copied().max().unwrap_or(0);
        #[expect(
            clippy::cast_precision_loss,
            reason = "heights and leaf counts stay far below 2^52"
        )]
        let (mean, variance) = {
            let count = heights.len() as f64;
            let mean = heights.iter().sum::<usize>() as f64 / count;
            let variance = heights
                .iter()
                .map(|&height| (height as f64 - mean).powi(2))
                .sum::<f64>()
                / count;
            (mean, variance)
        };
        Some(HeightStats {
            max,
            mean,
            variance,
            std_dev: variance.sqrt(),
        })
    }

    /// Returns, per arc, the most arcs crossed from any leaf to reach it.
    ///
    /// A leaf's own up arc has depth 0. The result is indexed by [`ArcId`];
    /// arcs that no leaf reaches, such as arcs hidden by edits, are `None`.
    #[must_use]
    pub fn arc_depths(&self) -> Vec<Option<usize>> {
        let mut depths = vec![None; self.arcs.len()];
        for &leaf in &self.leaves {
            let mut current = leaf;
            for depth in 0..self.nodes.len() {
                let Some(&arc) = self.nodes[current.get()].up_arcs.first() else {
                    break;
                };
                depths[arc.get()] = Some(depths[arc.get()].map_or(depth, |seen: usize| seen.max(depth)));
                match self.arcs[arc.get()].up {
                    Some(up) => current = up,
                    None => break,
                }
            }
        }
        depths
    }

    /// Returns, per arc, the number of region vertices between a root and the
    /// arc's down node, the arc's own region included.
    ///
    /// The result is indexed by [`ArcId`]; arcs not reachable from a root are
    /// `None`. Potentials are only meaningful once segmentation was built.
    #[must_use]
    pub fn arc_potentials(&self) -> Vec<Option<usize>> {
        let mut potentials = vec![None; self.arcs.len()];
        let mut pending: Vec<(NodeId, usize)> = self.roots.iter().map(|&root| (root, 0)).collect();
        while let Some((node, above)) = pending.pop() {
            for &arc in &self.nodes[node.get()].down_arcs {
                if potentials[arc.get()].is_some() {
                    continue;
                }
                let potential = above + self.arcs[arc.get()].region.len();
                potentials[arc.get()] = Some(potential);
                pending.push((self.arcs[arc.get()].down, potential));
            }
        }
        potentials
    }

    fn height_from(&self, leaf: NodeId) -> usize {
        let mut current = leaf;
        let mut height = 0;
        // bounded by the node count so a malformed edit cannot loop forever
        while height < self.nodes.len() {
            match self.parent(current) {
                Ok(Some(parent)) => {
                    current = parent;
                    height += 1;
                }
                _ => break,
            }
        }
        height
    }

    /// Sorts every arc region in sweep order.
    ///
    /// Builds keep regions sorted; this restores the order after regions were
    /// rearranged by edits.
    pub fn finalize_segmentation(&mut self) {
        let positions = &self.positions;
        self.arcs
            .par_iter_mut()
            .for_each(|arc| arc.region.sort_unstable_by_key(|&vertex| positions[vertex]));
    }

    fn sweep_position(&self, vertex: usize) -> usize {
        self.positions.get(vertex).copied().unwrap_or(usize::MAX)
    }

    fn vertex_out_of_bounds(&self, vertex: usize) -> MergeTreeError {
        warn!(vertex, vertex_count = self.correspondence.len(), "vertex out of range");
        MergeTreeError::VertexOutOfBounds {
            vertex,
            vertex_count: self.correspondence.len(),
        }
    }
}

impl fmt::Display for MergeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} tree: {} nodes, {} arcs",
            self.tree_type,
            self.nodes.len(),
            self.arcs.len()
        )?;
        for (index, node) in self.nodes.iter().enumerate() {
            writeln!(f, "  {}: {node}", NodeId::new(index))?;
        }
        for (index, arc) in self.arcs.iter().enumerate() {
            writeln!(f, "  {}: {arc}", ArcId::new(index))?;
        }
        f.write_str("  leaves [")?;
        write_ids(f, &self.leaves)?;
        f.write_str("]\n  roots [")?;
        write_ids(f, &self.roots)?;
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests;
