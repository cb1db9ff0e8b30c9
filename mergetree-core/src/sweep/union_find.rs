//! Concurrent union-find over growth fronts.
//!
//! One record exists per leaf. Parents are atomic indices compressed by path
//! halving. A union locks both roots' state in `(min_root, max_root)` order,
//! re-validates that they are still roots and then moves the child's pending
//! fronts and opened-arc registry into the parent, so the merged component
//! carries the state of every front it absorbed.

use std::sync::{
    Mutex, MutexGuard,
    atomic::{AtomicUsize, Ordering},
};

use super::front::PendingFront;
use crate::{MergeTreeError, Result, error::invariant, tree::ArcId};

/// Index of a union-find record.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct ComponentId(usize);

impl ComponentId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    pub(crate) const fn get(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
pub(crate) struct ComponentState {
    extremum: usize,
    fronts: Vec<PendingFront>,
    opened_arcs: Vec<ArcId>,
}

pub(crate) struct ComponentArena {
    parents: Vec<AtomicUsize>,
    ranks: Vec<AtomicUsize>,
    states: Vec<Mutex<ComponentState>>,
}

impl ComponentArena {
    /// Creates one singleton component per seed vertex.
    pub(crate) fn with_seeds(seeds: &[usize]) -> Self {
        let mut parents = Vec::with_capacity(seeds.len());
        let mut ranks = Vec::with_capacity(seeds.len());
        let mut states = Vec::with_capacity(seeds.len());
        for (id, &seed) in seeds.iter().enumerate() {
            parents.push(AtomicUsize::new(id));
            ranks.push(AtomicUsize::new(0));
            states.push(Mutex::new(ComponentState {
                extremum: seed,
                fronts: Vec::new(),
                opened_arcs: Vec::new(),
            }));
        }
        Self {
            parents,
            ranks,
            states,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.parents.len()
    }

    /// Returns the current representative of `component`.
    pub(crate) fn find(&self, component: ComponentId) -> ComponentId {
        let mut current = component.get();
        loop {
            let Some(parent) = self.parents.get(current).map(|p| p.load(Ordering::Acquire)) else {
                return ComponentId::new(current);
            };
            if parent == current {
                return ComponentId::new(current);
            }
            let grandparent = self.parents[parent].load(Ordering::Acquire);
            if grandparent != parent {
                self.parents[current].store(grandparent, Ordering::Release);
            }
            current = parent;
        }
    }

    fn is_root(&self, component: ComponentId) -> bool {
        self.parents[component.get()].load(Ordering::Acquire) == component.get()
    }

    /// Merges the components of `left` and `right`, returning the surviving
    /// representative.
    pub(crate) fn union(&self, left: ComponentId, right: ComponentId) -> Result<ComponentId> {
        loop {
            let left_root = self.find(left);
            let right_root = self.find(right);
            if left_root == right_root {
                return Ok(left_root);
            }

            let (first, second) = lock_order(left_root, right_root);
            let mut first_state = self.lock(first)?;
            let mut second_state = self.lock(second)?;

            let left_root = self.find(left);
            let right_root = self.find(right);
            if left_root == right_root {
                return Ok(left_root);
            }
            if lock_order(left_root, right_root) != (first, second)
                || !self.is_root(first)
                || !self.is_root(second)
            {
                continue;
            }

            let first_rank = self.ranks[first.get()].load(Ordering::Relaxed);
            let second_rank = self.ranks[second.get()].load(Ordering::Relaxed);
            let (parent, child, parent_state, child_state) = if second_rank > first_rank {
                (second, first, &mut *second_state, &mut *first_state)
            } else {
                (first, second, &mut *first_state, &mut *second_state)
            };

            parent_state.fronts.append(&mut child_state.fronts);
            parent_state
                .opened_arcs
                .append(&mut child_state.opened_arcs);
            self.parents[child.get()].store(parent.get(), Ordering::Release);
            if first_rank == second_rank {
                self.ranks[parent.get()].fetch_add(1, Ordering::Relaxed);
            }
            return Ok(parent);
        }
    }

    /// Takes every front parked on the component, merged into one.
    pub(crate) fn take_front(&self, component: ComponentId) -> Result<PendingFront> {
        let fronts = self.with_root_state(component, |state| std::mem::take(&mut state.fronts))?;
        let mut merged = PendingFront::new();
        for front in fronts {
            merged.absorb(front);
        }
        Ok(merged)
    }

    /// Parks a front on the component until a later task resumes it.
    pub(crate) fn park(&self, component: ComponentId, front: PendingFront) -> Result<()> {
        self.with_root_state(component, |state| state.fronts.push(front))
    }

    pub(crate) fn register_arc(&self, component: ComponentId, arc: ArcId) -> Result<()> {
        self.with_root_state(component, |state| state.opened_arcs.push(arc))
    }

    pub(crate) fn unregister_arc(&self, component: ComponentId, arc: ArcId) -> Result<()> {
        self.with_root_state(component, |state| state.opened_arcs.retain(|&opened| opened != arc))
    }

    /// Clears and returns the component's opened-arc registry.
    pub(crate) fn drain_opened(&self, component: ComponentId) -> Result<Vec<ArcId>> {
        self.with_root_state(component, |state| std::mem::take(&mut state.opened_arcs))
    }

    pub(crate) fn set_extremum(&self, component: ComponentId, vertex: usize) -> Result<()> {
        self.with_root_state(component, |state| state.extremum = vertex)
    }

    pub(crate) fn extremum(&self, component: ComponentId) -> Result<usize> {
        self.with_root_state(component, |state| state.extremum)
    }

    fn with_root_state<T>(
        &self,
        component: ComponentId,
        action: impl FnOnce(&mut ComponentState) -> T,
    ) -> Result<T> {
        // a concurrent union may move the root between find and lock
        loop {
            let root = self.find(component);
            let mut state = self.lock(root)?;
            if self.is_root(root) {
                return Ok(action(&mut state));
            }
        }
    }

    fn lock(&self, component: ComponentId) -> Result<MutexGuard<'_, ComponentState>> {
        let state = self
            .states
            .get(component.get())
            .ok_or_else(|| invariant("component id must be within the arena", component.get()))?;
        state.lock().map_err(|_| MergeTreeError::LockPoisoned {
            resource: "union-find component state",
        })
    }
}

fn lock_order(first: ComponentId, second: ComponentId) -> (ComponentId, ComponentId) {
    if first.get() <= second.get() {
        (first, second)
    } else {
        (second, first)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::rstest;

    use super::*;

    fn id(index: usize) -> ComponentId {
        ComponentId::new(index)
    }

    #[rstest]
    fn union_moves_fronts_and_arcs_to_the_survivor() {
        let arena = ComponentArena::with_seeds(&[10, 20, 30]);
        let mut front = PendingFront::new();
        front.push(5, 50);
        arena.park(id(1), front).expect("lock is healthy");
        arena.register_arc(id(1), ArcId::new(7)).expect("lock is healthy");
        arena.register_arc(id(0), ArcId::new(3)).expect("lock is healthy");

        let root = arena.union(id(0), id(1)).expect("union succeeds");
        assert_eq!(arena.find(id(0)), root);
        assert_eq!(arena.find(id(1)), root);
        assert_ne!(arena.find(id(2)), root);

        let mut merged = arena.take_front(id(0)).expect("lock is healthy");
        assert_eq!(merged.pop(), Some(50));
        let mut opened = arena.drain_opened(id(1)).expect("lock is healthy");
        opened.sort_unstable();
        assert_eq!(opened, vec![ArcId::new(3), ArcId::new(7)]);
        assert!(arena.drain_opened(root).expect("lock is healthy").is_empty());
    }

    #[rstest]
    fn union_of_merged_components_is_idempotent() {
        let arena = ComponentArena::with_seeds(&[0, 1]);
        let root = arena.union(id(0), id(1)).expect("union succeeds");
        assert_eq!(arena.union(id(1), id(0)).expect("union succeeds"), root);
    }

    #[rstest]
    fn unregister_removes_only_the_named_arc() {
        let arena = ComponentArena::with_seeds(&[0]);
        arena.register_arc(id(0), ArcId::new(1)).expect("lock is healthy");
        arena.register_arc(id(0), ArcId::new(2)).expect("lock is healthy");
        arena.unregister_arc(id(0), ArcId::new(1)).expect("lock is healthy");
        assert_eq!(arena.drain_opened(id(0)).expect("lock is healthy"), vec![ArcId::new(2)]);
    }

    #[rstest]
    fn extremum_follows_the_latest_merge() {
        let arena = ComponentArena::with_seeds(&[4, 9]);
        assert_eq!(arena.extremum(id(1)).expect("lock is healthy"), 9);
        let root = arena.union(id(0), id(1)).expect("union succeeds");
        arena.set_extremum(root, 12).expect("lock is healthy");
        assert_eq!(arena.extremum(id(0)).expect("lock is healthy"), 12);
    }

    #[rstest]
    fn concurrent_unions_converge_to_one_component() {
        let size = 64;
        let seeds: Vec<usize> = (0..size).collect();
        let arena = Arc::new(ComponentArena::with_seeds(&seeds));
        rayon::scope(|scope| {
            for index in 1..size {
                let arena = Arc::clone(&arena);
                scope.spawn(move |_| {
                    arena
                        .register_arc(id(index), ArcId::new(index))
                        .expect("lock is healthy");
                    arena.union(id(index - 1), id(index)).expect("union succeeds");
                });
            }
        });
        let root = arena.find(id(0));
        assert!((0..size).all(|index| arena.find(id(index)) == root));
        assert_eq!(arena.drain_opened(root).expect("lock is healthy").len(), size - 1);
        assert_eq!(arena.len(), size);
    }
}
