//! Structural edits on a built tree.

use rayon::prelude::*;
use tracing::{debug, warn};

use super::{ArcId, Correspondence, MergeTree, Node, NodeId, SuperArc};
use crate::{MergeTreeError, Result, error::invariant};

impl MergeTree {
    /// Splits the arc containing `vertex` by turning the vertex into a node.
    ///
    /// The original arc keeps its down node and now ends at the new node; a
    /// new arc runs from the new node to the original up node and takes over
    /// every interior vertex beyond `vertex` in sweep order. Returns the new
    /// arc.
    ///
    /// # Errors
    /// Returns [`MergeTreeError::NodeAlreadyExists`] when the vertex is
    /// already critical and [`MergeTreeError::NotOnArc`] when it was never
    /// reached by the sweep.
    ///
    /// # Examples
    /// ```
    /// use mergetree_core::{AdjacencyGraph, Correspondence, MergeTreeBuilder, ScalarField};
    ///
    /// let mesh = AdjacencyGraph::from_edges(5, (0..4).map(|v| (v, v + 1))).expect("valid edges");
    /// let field = ScalarField::new(vec![0.0, 1.0, 2.0, 3.0, 4.0]).expect("finite values");
    /// let engine = MergeTreeBuilder::new().build().expect("valid configuration");
    /// let mut tree = engine.build(&mesh, &field, true).expect("build succeeds");
    ///
    /// let upper = tree.insert_node(2).expect("vertex 2 is interior");
    /// assert_eq!(tree.arcs()[upper.get()].region(), &[3]);
    /// assert!(matches!(tree.correspondence(2), Ok(Correspondence::Node(_))));
    /// ```
    pub fn insert_node(&mut self, vertex: usize) -> Result<ArcId> {
        let arc = match self.correspondence(vertex)? {
            Correspondence::Arc(arc) => arc,
            Correspondence::Node(node) => {
                warn!(vertex, node = node.get(), "refusing to insert a node on a critical vertex");
                return Err(MergeTreeError::NodeAlreadyExists {
                    vertex,
                    node: node.get(),
                });
            }
            Correspondence::Unassigned => {
                warn!(vertex, "refusing to insert a node on an unassigned vertex");
                return Err(MergeTreeError::NotOnArc { vertex });
            }
        };
        let (down, up) = {
            let current = self.arc(arc)?;
            let up = current
                .up
                .ok_or_else(|| invariant("interior vertices must lie on closed arcs", arc.get()))?;
            (current.down, up)
        };
        let termination = self.node(down)?.termination;
        let new_node = NodeId::new(self.nodes.len());
        let new_arc = ArcId::new(self.arcs.len());
        let split = self.positions[vertex];

        let moved = self.reassign(
            |position, owner| owner == Correspondence::Arc(arc) && position > split,
            Correspondence::Arc(new_arc),
        );
        self.correspondence[vertex] = Correspondence::Node(new_node);

        let current = &mut self.arcs[arc.get()];
        let upper = if self.segmented {
            let positions = &self.positions;
            let cut = current
                .region
                .partition_point(|&member| positions[member] < split);
            let mut upper = current.region.split_off(cut);
            if upper.first() == Some(&vertex) {
                upper.remove(0);
            }
            upper
        } else {
            Vec::new()
        };
        current.seen = current.seen.saturating_sub(moved + 1).max(1);
        current.up = Some(new_node);

        self.nodes
            .push(Node::new(vertex, termination, vec![new_arc], vec![arc]));
        self.arcs
            .push(SuperArc::new(new_node, Some(up), moved + 1, upper));
        let up_node = &mut self.nodes[up.get()];
        if let Some(slot) = up_node.down_arcs.iter_mut().find(|slot| **slot == arc) {
            *slot = new_arc;
        } else {
            up_node.down_arcs.push(new_arc);
        }

        debug!(vertex, arc = arc.get(), new_arc = new_arc.get(), moved, "inserted node");
        Ok(new_arc)
    }

    /// Removes a node that has at most one arc on each side.
    ///
    /// A node with one down and one up arc is spliced out: the two arcs and
    /// the node's vertex become a single arc. A root with a single down arc
    /// hands the root role to the node below it, and a leaf is dropped with
    /// its arc. In both of the latter cases the vertices of the removed arc
    /// become unassigned and the arc is marked hidden.
    ///
    /// # Errors
    /// Returns [`MergeTreeError::UnknownNode`] for an unknown id and
    /// [`MergeTreeError::CannotDelete`] when the node merges several arcs or
    /// is already detached.
    pub fn delete_node(&mut self, node: NodeId) -> Result<()> {
        let target = self.node(node)?;
        let vertex = target.vertex;
        let up_arcs = target.up_arcs.clone();
        let down_arcs = target.down_arcs.clone();
        match (up_arcs.as_slice(), down_arcs.as_slice()) {
            (&[up_arc], &[down_arc]) => self.splice_out(vertex, up_arc, down_arc)?,
            (&[], &[down_arc]) => {
                let child = self.arc(down_arc)?.down;
                self.nodes[child.get()].up_arcs.retain(|&arc| arc != down_arc);
                self.hide_arc(down_arc, vertex);
                for root in &mut self.roots {
                    if *root == node {
                        *root = child;
                    }
                }
            }
            (&[up_arc], &[]) => {
                if let Some(parent) = self.arc(up_arc)?.up {
                    self.nodes[parent.get()]
                        .down_arcs
                        .retain(|&arc| arc != up_arc);
                }
                self.hide_arc(up_arc, vertex);
                self.leaves.retain(|&leaf| leaf != node);
            }
            (&[], &[]) => {
                warn!(node = node.get(), "refusing to delete a detached node");
                return Err(MergeTreeError::CannotDelete {
                    node: node.get(),
                    reason: "node is not connected to any arc",
                });
            }
            _ => {
                warn!(node = node.get(), "refusing to delete a node joining several arcs");
                return Err(MergeTreeError::CannotDelete {
                    node: node.get(),
                    reason: "node joins more than one arc on a side",
                });
            }
        }
        let removed = &mut self.nodes[node.get()];
        removed.up_arcs.clear();
        removed.down_arcs.clear();
        debug!(node = node.get(), vertex, "deleted node");
        Ok(())
    }

    fn splice_out(&mut self, vertex: usize, up_arc: ArcId, down_arc: ArcId) -> Result<()> {
        let parent = self
            .arc(up_arc)?
            .up
            .ok_or_else(|| invariant("spliced arcs must be closed", up_arc.get()))?;
        self.reassign(
            |_, owner| owner == Correspondence::Arc(up_arc),
            Correspondence::Arc(down_arc),
        );
        self.correspondence[vertex] = Correspondence::Arc(down_arc);

        let upper = &mut self.arcs[up_arc.get()];
        let upper_region = std::mem::take(&mut upper.region);
        let upper_seen = upper.seen;
        upper.hidden = true;

        let lower = &mut self.arcs[down_arc.get()];
        lower.up = Some(parent);
        lower.seen += upper_seen;
        if self.segmented {
            lower.region.push(vertex);
            lower.region.extend(upper_region);
        }

        if let Some(slot) = self.nodes[parent.get()]
            .down_arcs
            .iter_mut()
            .find(|slot| **slot == up_arc)
        {
            *slot = down_arc;
        }
        Ok(())
    }

    fn hide_arc(&mut self, arc: ArcId, vertex: usize) {
        self.reassign(
            |_, owner| owner == Correspondence::Arc(arc),
            Correspondence::Unassigned,
        );
        self.correspondence[vertex] = Correspondence::Unassigned;
        let hidden = &mut self.arcs[arc.get()];
        hidden.region.clear();
        hidden.hidden = true;
    }

    /// Rewrites every vertex matching `select` to `to`; returns how many moved.
    fn reassign<F>(&mut self, select: F, to: Correspondence) -> usize
    where
        F: Fn(usize, Correspondence) -> bool + Sync,
    {
        self.correspondence
            .par_iter_mut()
            .zip(self.positions.par_iter())
            .map(|(owner, &position)| {
                if select(position, *owner) {
                    *owner = to;
                    1
                } else {
                    0
                }
            })
            .sum()
    }
}
