//! Sequential completion of the chain left when a single front remains.
//!
//! The saddles on the chain are resolved one at a time in sweep order, linked
//! by arcs and capped with the root at the global extremum. The vertices still
//! unassigned above the first chain node are then distributed over the chain
//! arcs in parallel.

use rayon::prelude::*;
use tracing::{debug, instrument};

use super::{MergeMode, SweepContext};
use crate::{
    Adjacency, Result,
    error::invariant,
    order::Sweep,
    tree::{ArcId, Correspondence, store::TreeStore},
};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct BackboneSummary {
    pub(crate) nodes: usize,
    pub(crate) vertices: usize,
}

#[instrument(name = "core.backbone", err, skip_all, fields(seeded = seed.is_some()))]
pub(crate) fn complete<M: Adjacency + Sync>(
    context: &SweepContext<'_, M>,
    seed: Option<usize>,
    chunk_count: usize,
) -> Result<BackboneSummary> {
    let pending = context.unresolved_saddles(seed);
    let (Some(&first), Some(&last)) = (pending.first(), pending.last()) else {
        debug!("no backbone to complete");
        return Ok(BackboneSummary::default());
    };
    let store = context.store();
    let sweep = context.sweep();

    let mut nodes = Vec::with_capacity(pending.len());
    for &vertex in &pending {
        let component = context.owner(vertex);
        nodes.push(context.merge_and_close(vertex, component, MergeMode::Backbone)?);
    }

    let mut chain = Vec::with_capacity(pending.len());
    for pair in nodes.windows(2) {
        if let &[down, up] = pair {
            chain.push(store.make_arc(down, up)?);
        }
    }
    let extremum = sweep
        .extremum()
        .ok_or_else(|| invariant("a non-empty mesh has an extremum", last))?;
    let last_node = *nodes
        .last()
        .ok_or_else(|| invariant("backbone nodes mirror pending saddles", last))?;
    let root = if last == extremum {
        last_node
    } else {
        let root = store.make_node(extremum, None)?;
        chain.push(store.make_arc(last_node, root)?);
        root
    };
    store.push_root(root)?;

    let boundaries: Vec<usize> = pending.iter().map(|&vertex| sweep.position(vertex)).collect();
    let begin = sweep.position(first) + 1;
    let vertices = assign_chain(store, sweep, &boundaries, &chain, begin, chunk_count)?;
    debug!(
        nodes = pending.len(),
        vertices,
        root = root.get(),
        "backbone completed"
    );
    Ok(BackboneSummary {
        nodes: pending.len(),
        vertices,
    })
}

/// Assigns every unassigned vertex from sweep position `begin` onwards to the
/// chain arc whose endpoints bracket it.
///
/// `boundaries[i]` is the sweep position of the down node of `chain[i]`.
fn assign_chain(
    store: &TreeStore,
    sweep: &Sweep,
    boundaries: &[usize],
    chain: &[ArcId],
    begin: usize,
    chunk_count: usize,
) -> Result<usize> {
    let end = sweep.len();
    if begin >= end || chain.is_empty() {
        return Ok(0);
    }
    let span = end - begin;
    let chunk_size = span.div_ceil(chunk_count.clamp(1, span));
    (0..span.div_ceil(chunk_size))
        .into_par_iter()
        .map(|chunk| {
            let start = begin + chunk * chunk_size;
            assign_range(store, sweep, boundaries, chain, start, (start + chunk_size).min(end))
        })
        .try_reduce(|| 0, |left, right| Ok(left + right))
}

fn assign_range(
    store: &TreeStore,
    sweep: &Sweep,
    boundaries: &[usize],
    chain: &[ArcId],
    start: usize,
    end: usize,
) -> Result<usize> {
    let mut interval = boundaries
        .partition_point(|&boundary| boundary < start)
        .saturating_sub(1);
    let mut batch = 0;
    let mut assigned = 0;
    for position in start..end {
        let vertex = sweep.vertex_at(position);
        if store.correspondence(vertex) != Correspondence::Unassigned {
            continue;
        }
        let mut next = interval;
        while boundaries
            .get(next + 1)
            .is_some_and(|&boundary| boundary < position)
        {
            next += 1;
        }
        if next != interval {
            flush(store, chain, interval, batch)?;
            batch = 0;
            interval = next;
        }
        let arc = *chain
            .get(interval)
            .ok_or_else(|| invariant("backbone vertices must fall on a chain arc", vertex))?;
        store.assign_arc(vertex, arc)?;
        batch += 1;
        assigned += 1;
    }
    flush(store, chain, interval, batch)?;
    Ok(assigned)
}

fn flush(store: &TreeStore, chain: &[ArcId], interval: usize, batch: usize) -> Result<()> {
    if batch == 0 {
        return Ok(());
    }
    let arc = *chain
        .get(interval)
        .ok_or_else(|| invariant("backbone batches must target a chain arc", interval))?;
    store.add_seen(arc, batch)
}
