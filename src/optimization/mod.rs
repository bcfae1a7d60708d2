//! Conformational search: per-seed Monte Carlo tasks and the shared,
//! clustered result container.

pub mod monte_carlo;

pub use monte_carlo::monte_carlo_task;

use std::sync::Mutex;

use nalgebra::Vector3;
use rayon::prelude::*;

use crate::grid::{GridMap, SearchBox};
use crate::ligand::Ligand;
use crate::scoring::ScoringFunction;

/// One docked binding mode: energies plus the absolute coordinates of
/// every atom.
#[derive(Debug, Clone)]
pub struct DockingResult {
    /// Conformation free energy (inter + intra).
    pub e: f64,
    /// Inter-molecular (grid map) component alone.
    pub f: f64,
    pub heavy_atoms: Vec<Vector3<f64>>,
    pub hydrogens: Vec<Vector3<f64>>,
}

/// Squared sum of per-heavy-atom displacements between two poses, without
/// alignment: the clustering distance of the result container.
fn conformational_distance_sqr(a: &DockingResult, b: &DockingResult) -> f64 {
    a.heavy_atoms
        .iter()
        .zip(&b.heavy_atoms)
        .map(|(p, q)| (p - q).norm_squared())
        .sum()
}

/// Capacity-bounded container of docking results, ordered by increasing
/// energy and deduplicated by conformational distance.
///
/// This is the single point of cross-task contention: tasks share it
/// behind one mutex, and an insert (including its clustering scan) runs
/// entirely under that lock.
#[derive(Debug)]
pub struct ResultContainer {
    capacity: usize,
    results: Vec<DockingResult>,
}

impl ResultContainer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            results: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.results.len() >= self.capacity
    }

    /// Residents, ordered by increasing energy.
    pub fn results(&self) -> &[DockingResult] {
        &self.results
    }

    /// The lowest-energy resident.
    pub fn best(&self) -> Option<&DockingResult> {
        self.results.first()
    }

    pub fn into_results(self) -> Vec<DockingResult> {
        self.results
    }

    /// Inserts a result.
    ///
    /// A pose within `required_square_error` of a resident belongs to that
    /// resident's cluster: it replaces the resident only when its energy
    /// is lower, and is discarded otherwise. A novel pose is inserted in
    /// energy order while capacity remains, or displaces the worst
    /// resident if it beats it.
    pub fn push(&mut self, r: DockingResult, required_square_error: f64) {
        for i in 0..self.results.len() {
            if conformational_distance_sqr(&r, &self.results[i]) < required_square_error {
                if r.e < self.results[i].e {
                    self.results[i] = r;
                    self.results.sort_by(|a, b| a.e.total_cmp(&b.e));
                }
                return;
            }
        }

        if self.results.len() < self.capacity {
            let at = self.results.partition_point(|x| x.e <= r.e);
            self.results.insert(at, r);
        } else if let Some(worst) = self.results.last() {
            if r.e < worst.e {
                self.results.pop();
                let at = self.results.partition_point(|x| x.e <= r.e);
                self.results.insert(at, r);
            }
        }
    }
}

/// Runs one Monte Carlo task per seed across the rayon thread pool and
/// returns the drained result container.
///
/// All inputs are shared immutably; the container mutex is the only
/// synchronization. The result set is a function of the seed set alone.
pub fn dock(
    lig: &Ligand,
    sf: &dyn ScoringFunction,
    bx: &SearchBox,
    maps: &[GridMap],
    seeds: &[u64],
    capacity: usize,
) -> ResultContainer {
    let container = Mutex::new(ResultContainer::new(capacity));
    seeds
        .par_iter()
        .for_each(|&seed| monte_carlo_task(&container, lig, seed, sf, bx, maps));
    container
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
