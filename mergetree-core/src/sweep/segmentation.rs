//! Parallel fill of per-arc regions.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::{
    Result,
    error::invariant,
    order::Sweep,
    tree::{ArcId, Correspondence, store::TreeStore},
};

/// Collects every arc's interior vertices, sorted in sweep order.
///
/// Each region is preallocated from the arc's seen count minus the shared
/// endpoint, then filled by a pass over contiguous vertex-id chunks that
/// reserve slots with one atomic increment per vertex.
#[instrument(name = "core.segmentation", err, skip_all, fields(arcs = store.arc_count()))]
pub(crate) fn build(store: &TreeStore, sweep: &Sweep, chunk_size: usize) -> Result<Vec<Vec<usize>>> {
    let arc_count = store.arc_count();
    let sizes: Vec<usize> = (0..arc_count)
        .into_par_iter()
        .map(|arc| {
            store
                .seen(ArcId::new(arc))
                .map(|seen| seen.saturating_sub(1))
        })
        .collect::<Result<_>>()?;
    let slots: Vec<Vec<AtomicUsize>> = sizes
        .par_iter()
        .map(|&size| (0..size).map(|_| AtomicUsize::new(0)).collect())
        .collect();
    let cursors: Vec<AtomicUsize> = (0..arc_count).map(|_| AtomicUsize::new(0)).collect();

    let vertex_count = store.vertex_count();
    (0..vertex_count.div_ceil(chunk_size))
        .into_par_iter()
        .try_for_each(|chunk| {
            let start = chunk * chunk_size;
            for vertex in start..(start + chunk_size).min(vertex_count) {
                let Correspondence::Arc(arc) = store.correspondence(vertex) else {
                    continue;
                };
                let (Some(cursor), Some(region)) = (cursors.get(arc.get()), slots.get(arc.get()))
                else {
                    return Err(invariant("vertex assigned to an unknown arc", vertex));
                };
                let slot = cursor.fetch_add(1, Ordering::SeqCst);
                region
                    .get(slot)
                    .ok_or_else(|| invariant("arc region overflowed its seen count", arc.get()))?
                    .store(vertex, Ordering::SeqCst);
            }
            Ok(())
        })?;

    let regions: Vec<Vec<usize>> = slots
        .into_par_iter()
        .zip(cursors.into_par_iter())
        .enumerate()
        .map(|(arc, (slots, cursor))| {
            if cursor.into_inner() != slots.len() {
                return Err(invariant("arc region must be filled to its seen count", arc));
            }
            let mut region: Vec<usize> = slots.into_iter().map(AtomicUsize::into_inner).collect();
            region.sort_unstable_by_key(|&vertex| sweep.position(vertex));
            Ok(region)
        })
        .collect::<Result<_>>()?;
    debug!(
        assigned = regions.iter().map(Vec::len).sum::<usize>(),
        "segmentation built"
    );
    Ok(regions)
}
