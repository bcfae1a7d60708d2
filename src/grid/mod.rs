//! Search box and per-atom-type potential grids.
//!
//! The box is the axis-aligned search volume, half open per axis:
//! `corner0 <= v < corner1`. It carries the grid granularity and so owns
//! all index arithmetic; a [`GridMap`] is just the dense sample buffer of
//! one XScore atom type over the box probe lattice.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when wiring grid maps to a box.
#[derive(Error, Debug)]
pub enum GridError {
    #[error("map holds {got} samples but the box probe lattice has {expected}")]
    SampleCountMismatch { expected: usize, got: usize },
}

/// Axis-aligned search volume with a uniform grid granularity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchBox {
    /// Corner with the smallest coordinate on every axis.
    pub corner0: Vector3<f64>,
    /// Corner with the largest coordinate on every axis (exclusive).
    pub corner1: Vector3<f64>,
    /// Edge length of one cubic grid cell in Angstroms.
    pub granularity: f64,
    /// Cached `1 / granularity`.
    pub granularity_inverse: f64,
    /// Grid cells per axis.
    pub num_grids: [usize; 3],
    /// Probe samples per axis, one more than cells.
    pub num_probes: [usize; 3],
}

impl SearchBox {
    /// Builds a box centered at `center`, at least `size` wide, snapped
    /// outward to whole grid cells of `granularity`.
    pub fn new(center: Vector3<f64>, size: Vector3<f64>, granularity: f64) -> Self {
        let corner0 = center - 0.5 * size;
        let mut num_grids = [0usize; 3];
        let mut num_probes = [0usize; 3];
        let mut corner1 = corner0;
        for i in 0..3 {
            num_grids[i] = (size[i] / granularity).ceil().max(1.0) as usize;
            num_probes[i] = num_grids[i] + 1;
            corner1[i] = corner0[i] + granularity * num_grids[i] as f64;
        }
        Self {
            corner0,
            corner1,
            granularity,
            granularity_inverse: 1.0 / granularity,
            num_grids,
            num_probes,
        }
    }

    /// True when the coordinate lies inside the half-open box.
    #[inline]
    pub fn within(&self, v: &Vector3<f64>) -> bool {
        (0..3).all(|i| self.corner0[i] <= v[i] && v[i] < self.corner1[i])
    }

    /// Grid cell containing the coordinate. The caller guarantees the
    /// coordinate passed [`SearchBox::within`].
    #[inline]
    pub fn grid_index(&self, v: &Vector3<f64>) -> [usize; 3] {
        [
            ((v[0] - self.corner0[0]) * self.granularity_inverse) as usize,
            ((v[1] - self.corner0[1]) * self.granularity_inverse) as usize,
            ((v[2] - self.corner0[2]) * self.granularity_inverse) as usize,
        ]
    }

    /// Flattens a probe index, x being the fastest-varying dimension.
    #[inline]
    pub fn probe_index(&self, idx: [usize; 3]) -> usize {
        (idx[2] * self.num_probes[1] + idx[1]) * self.num_probes[0] + idx[0]
    }

    /// Total number of probes on the lattice.
    pub fn num_probes_product(&self) -> usize {
        self.num_probes[0] * self.num_probes[1] * self.num_probes[2]
    }
}

/// Dense scalar potential of one XScore atom type, sampled on the box
/// probe lattice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridMap {
    data: Vec<f64>,
}

impl GridMap {
    /// Wraps a precomputed sample buffer laid out per
    /// [`SearchBox::probe_index`].
    pub fn new(bx: &SearchBox, data: Vec<f64>) -> Result<Self, GridError> {
        let expected = bx.num_probes_product();
        if data.len() != expected {
            return Err(GridError::SampleCountMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self { data })
    }

    /// A map holding the same value at every probe.
    pub fn filled(bx: &SearchBox, value: f64) -> Self {
        Self {
            data: vec![value; bx.num_probes_product()],
        }
    }

    /// A map sampled from a probe-index function.
    pub fn from_fn(bx: &SearchBox, f: impl Fn(usize, usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(bx.num_probes_product());
        for z in 0..bx.num_probes[2] {
            for y in 0..bx.num_probes[1] {
                for x in 0..bx.num_probes[0] {
                    data.push(f(x, y, z));
                }
            }
        }
        Self { data }
    }

    /// Placeholder for an atom type the ligand does not use.
    pub fn unused() -> Self {
        Self { data: Vec::new() }
    }

    /// True for [`GridMap::unused`] placeholders.
    pub fn is_unused(&self) -> bool {
        self.data.is_empty()
    }

    /// Sample at a probe index. The caller guarantees the index lies on
    /// the lattice of the box the map was built for.
    #[inline]
    pub fn at(&self, bx: &SearchBox, idx: [usize; 3]) -> f64 {
        self.data[bx.probe_index(idx)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> SearchBox {
        SearchBox::new(Vector3::new(5.0, 5.0, 5.0), Vector3::new(10.0, 10.0, 10.0), 1.0)
    }

    #[test]
    fn test_box_geometry() {
        let bx = unit_box();
        assert_eq!(bx.corner0, Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(bx.corner1, Vector3::new(10.0, 10.0, 10.0));
        assert_eq!(bx.num_grids, [10, 10, 10]);
        assert_eq!(bx.num_probes, [11, 11, 11]);
    }

    #[test]
    fn test_box_snaps_to_whole_cells() {
        let bx = SearchBox::new(Vector3::zeros(), Vector3::new(4.3, 4.3, 4.3), 0.5);
        assert_eq!(bx.num_grids, [9, 9, 9]);
        assert!((bx.corner1[0] - bx.corner0[0] - 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_within_half_open() {
        let bx = unit_box();
        assert!(bx.within(&Vector3::new(0.0, 0.0, 0.0)));
        assert!(bx.within(&Vector3::new(9.999, 5.0, 5.0)));
        assert!(!bx.within(&Vector3::new(10.0, 5.0, 5.0)));
        assert!(!bx.within(&Vector3::new(-0.001, 5.0, 5.0)));
    }

    #[test]
    fn test_grid_index() {
        let bx = unit_box();
        assert_eq!(bx.grid_index(&Vector3::new(0.2, 3.7, 9.9)), [0, 3, 9]);
    }

    #[test]
    fn test_map_layout_x_fastest() {
        let bx = unit_box();
        let map = GridMap::from_fn(&bx, |x, y, z| (x + 100 * y + 10_000 * z) as f64);
        assert_eq!(map.at(&bx, [3, 0, 0]), 3.0);
        assert_eq!(map.at(&bx, [0, 2, 0]), 200.0);
        assert_eq!(map.at(&bx, [1, 2, 3]), 30_201.0);
    }

    #[test]
    fn test_map_sample_count_checked() {
        let bx = unit_box();
        assert!(GridMap::new(&bx, vec![0.0; 7]).is_err());
        assert!(GridMap::new(&bx, vec![0.0; bx.num_probes_product()]).is_ok());
    }
}
