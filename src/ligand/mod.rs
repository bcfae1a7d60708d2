//! Articulated ligand model: frame tree, kinematics, energy and gradient.
//!
//! A ligand is a tree of rigid fragments (frames) joined by rotatable
//! bonds. Frames live in a flat array in topological order (parents before
//! children), with half-open atom ranges partitioning the heavy-atom and
//! hydrogen arrays, which makes the forward sweep of [`Ligand::evaluate`]
//! and the backward force/torque aggregation plain index loops.

mod parse;

pub use parse::ParseError;

use std::ops::{Index, IndexMut};

use nalgebra::{Rotation3, Unit, UnitQuaternion, Vector3};

use crate::atom::{Atom, XsType};
use crate::grid::{GridMap, SearchBox};
use crate::optimization::DockingResult;
use crate::scoring::ScoringFunction;

/// A rigid fragment of the ligand: the ROOT or one BRANCH.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Index of the parent frame. Unused for the root.
    pub parent: usize,
    /// Heavy-atom index of the parent-side rotor atom. Unused for the root.
    pub rotor_x_idx: usize,
    /// Heavy-atom index of the child-side rotor atom, the frame origin.
    pub rotor_y_idx: usize,
    /// Half-open range into the heavy-atom array.
    pub ha_begin: usize,
    pub ha_end: usize,
    /// Half-open range into the hydrogen array.
    pub hy_begin: usize,
    pub hy_end: usize,
    /// False when the frame holds nothing but its rotor Y besides
    /// hydrogens, so its torsion cannot change the score.
    pub active: bool,
    /// Parent-local vector from the parent origin to this frame's origin.
    pub yy: Vector3<f64>,
    /// Parent-local unit vector from rotor X to rotor Y: the rotation axis.
    pub xy: Vector3<f64>,
}

impl Frame {
    pub(crate) fn root() -> Self {
        Self {
            parent: 0,
            rotor_x_idx: 0,
            rotor_y_idx: 0,
            ha_begin: 0,
            ha_end: 0,
            hy_begin: 0,
            hy_end: 0,
            active: true,
            yy: Vector3::zeros(),
            xy: Vector3::zeros(),
        }
    }

    pub(crate) fn branch(
        parent: usize,
        rotor_x_idx: usize,
        ha_begin: usize,
        hy_begin: usize,
    ) -> Self {
        Self {
            parent,
            rotor_x_idx,
            rotor_y_idx: 0,
            ha_begin,
            ha_end: 0,
            hy_begin,
            hy_end: 0,
            active: true,
            yy: Vector3::zeros(),
            xy: Vector3::zeros(),
        }
    }
}

/// An intra-ligand heavy-atom pair more than three covalent bonds apart,
/// with the scoring-table index of its XScore type pair precomputed.
#[derive(Debug, Clone, Copy)]
pub struct InteractingPair {
    pub i: usize,
    pub j: usize,
    pub type_pair_index: usize,
}

/// A point in the search space: rigid-body placement of the root frame
/// plus one angle per active torsion.
#[derive(Debug, Clone)]
pub struct Conformation {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
    pub torsions: Vec<f64>,
}

impl Conformation {
    /// Identity conformation with `n_active_torsions` zeroed torsions.
    pub fn new(n_active_torsions: usize) -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            torsions: vec![0.0; n_active_torsions],
        }
    }
}

/// Gradient in the tangent space of a conformation: force, torque, and one
/// scalar per active torsion, stored as a single flat buffer of length
/// `6 + n_active_torsions` so BFGS can treat it as a plain vector.
#[derive(Debug, Clone)]
pub struct Change {
    data: Vec<f64>,
}

impl Change {
    pub fn new(n_active_torsions: usize) -> Self {
        Self {
            data: vec![0.0; 6 + n_active_torsions],
        }
    }

    /// Number of variables: `6 + n_active_torsions`.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Force component (derivative with respect to position).
    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.data[0], self.data[1], self.data[2])
    }

    /// Torque component (derivative in the orientation tangent space).
    pub fn orientation(&self) -> Vector3<f64> {
        Vector3::new(self.data[3], self.data[4], self.data[5])
    }

    /// Derivative with respect to torsion `t`.
    pub fn torsion(&self, t: usize) -> f64 {
        self.data[6 + t]
    }

    fn set_position(&mut self, v: Vector3<f64>) {
        self.data[0] = v[0];
        self.data[1] = v[1];
        self.data[2] = v[2];
    }

    fn set_orientation(&mut self, v: Vector3<f64>) {
        self.data[3] = v[0];
        self.data[4] = v[1];
        self.data[5] = v[2];
    }

    fn set_torsion(&mut self, t: usize, value: f64) {
        self.data[6 + t] = value;
    }
}

impl Index<usize> for Change {
    type Output = f64;

    #[inline]
    fn index(&self, i: usize) -> &f64 {
        &self.data[i]
    }
}

impl IndexMut<usize> for Change {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.data[i]
    }
}

/// Total and inter-molecular energy of an accepted evaluation.
#[derive(Debug, Clone, Copy)]
pub struct Energies {
    /// Inter-molecular plus intra-molecular free energy.
    pub total: f64,
    /// Inter-molecular (grid map) component alone.
    pub inter: f64,
}

/// Scratch buffers for [`Ligand::evaluate`], sized by the ligand and meant
/// to be allocated once per search task and reused across iterations.
#[derive(Debug, Clone)]
pub struct Workspace {
    origins: Vec<Vector3<f64>>,
    orientations: Vec<UnitQuaternion<f64>>,
    rotations: Vec<Rotation3<f64>>,
    axes: Vec<Vector3<f64>>,
    forces: Vec<Vector3<f64>>,
    torques: Vec<Vector3<f64>>,
    /// World heavy-atom coordinates of the last accepted forward sweep.
    pub coordinates: Vec<Vector3<f64>>,
    derivatives: Vec<Vector3<f64>>,
}

/// An immutable parsed ligand.
///
/// Atom coordinates are frame-local (relative to each frame's rotor Y)
/// after construction; the verbatim input lines are retained so docked
/// conformations can be written back out.
#[derive(Debug, Clone)]
pub struct Ligand {
    /// Display name of the source, used in logs.
    pub name: String,
    /// ROOT first, then BRANCH frames in parse order, which is a valid
    /// topological order (every parent precedes its children).
    pub frames: Vec<Frame>,
    pub heavy_atoms: Vec<Atom>,
    pub hydrogens: Vec<Atom>,
    /// Verbatim input lines, recognized or not.
    pub lines: Vec<String>,
    pub interacting_pairs: Vec<InteractingPair>,
    pub num_frames: usize,
    pub num_torsions: usize,
    pub num_active_torsions: usize,
    pub num_heavy_atoms: usize,
    pub num_hydrogens: usize,
    /// `1 / (1 + 0.05846 (Nact + 0.5 (Ntor - Nact)))`, scaling a
    /// conformation energy into the reported binding affinity.
    pub flexibility_penalty_factor: f64,
}

impl Ligand {
    /// Distinct XScore types among the heavy atoms: the set of grid maps a
    /// receptor must provide for this ligand.
    pub fn xs_types(&self) -> Vec<XsType> {
        let mut types = Vec::with_capacity(10);
        for a in &self.heavy_atoms {
            if !types.contains(&a.xs()) {
                types.push(a.xs());
            }
        }
        types
    }

    /// Fresh scratch buffers sized for this ligand.
    pub fn workspace(&self) -> Workspace {
        Workspace {
            origins: vec![Vector3::zeros(); self.num_frames],
            orientations: vec![UnitQuaternion::identity(); self.num_frames],
            rotations: vec![Rotation3::identity(); self.num_frames],
            axes: vec![Vector3::zeros(); self.num_frames],
            forces: vec![Vector3::zeros(); self.num_frames],
            torques: vec![Vector3::zeros(); self.num_frames],
            coordinates: vec![Vector3::zeros(); self.num_heavy_atoms],
            derivatives: vec![Vector3::zeros(); self.num_heavy_atoms],
        }
    }

    /// Evaluates a conformation: grid-map inter-molecular term plus the
    /// intra-molecular pair term, with the analytical gradient.
    ///
    /// Returns `None` when the conformation places any heavy atom (or any
    /// frame origin) outside the box, or its energy reaches
    /// `e_upper_bound`. On success the gradient is written into `g` and
    /// the world heavy-atom coordinates remain in `ws.coordinates`.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate(
        &self,
        conf: &Conformation,
        sf: &dyn ScoringFunction,
        bx: &SearchBox,
        maps: &[GridMap],
        e_upper_bound: f64,
        ws: &mut Workspace,
        g: &mut Change,
    ) -> Option<Energies> {
        if !bx.within(&conf.position) {
            return None;
        }

        // Forward sweep: place the root, then every branch in topological
        // order, rejecting as soon as anything leaves the box.
        let root = &self.frames[0];
        ws.origins[0] = conf.position;
        ws.orientations[0] = conf.orientation;
        ws.rotations[0] = conf.orientation.to_rotation_matrix();
        for i in root.ha_begin..root.ha_end {
            ws.coordinates[i] = ws.origins[0] + ws.rotations[0] * self.heavy_atoms[i].coordinate;
            if !bx.within(&ws.coordinates[i]) {
                return None;
            }
        }

        let mut t = 0;
        for k in 1..self.num_frames {
            let f = &self.frames[k];
            ws.origins[k] = ws.origins[f.parent] + ws.rotations[f.parent] * f.yy;
            if !bx.within(&ws.origins[k]) {
                return None;
            }

            if !f.active {
                // An inactive frame is a single heavy atom sitting on the
                // frame origin.
                debug_assert_eq!(f.ha_begin + 1, f.ha_end);
                debug_assert_eq!(f.ha_begin, f.rotor_y_idx);
                ws.coordinates[f.rotor_y_idx] = ws.origins[k];
                continue;
            }

            ws.axes[k] = ws.rotations[f.parent] * f.xy;
            debug_assert!((ws.axes[k].norm_squared() - 1.0).abs() < 1e-6);
            ws.orientations[k] =
                UnitQuaternion::from_axis_angle(&Unit::new_unchecked(ws.axes[k]), conf.torsions[t])
                    * ws.orientations[f.parent];
            t += 1;
            ws.rotations[k] = ws.orientations[k].to_rotation_matrix();

            for i in f.ha_begin..f.ha_end {
                ws.coordinates[i] =
                    ws.origins[k] + ws.rotations[k] * self.heavy_atoms[i].coordinate;
                if !bx.within(&ws.coordinates[i]) {
                    return None;
                }
            }
        }

        // Inter-molecular term: the grid map value at the floor corner of
        // the cell holding each atom, with a forward-difference spatial
        // gradient over the neighboring probes.
        let mut e = 0.0;
        for i in 0..self.num_heavy_atoms {
            let map = &maps[self.heavy_atoms[i].xs().index()];
            debug_assert!(!map.is_unused());
            let [x0, y0, z0] = bx.grid_index(&ws.coordinates[i]);
            let e000 = map.at(bx, [x0, y0, z0]);
            let e100 = map.at(bx, [x0 + 1, y0, z0]);
            let e010 = map.at(bx, [x0, y0 + 1, z0]);
            let e001 = map.at(bx, [x0, y0, z0 + 1]);
            ws.derivatives[i] = Vector3::new(e100 - e000, e010 - e000, e001 - e000)
                * bx.granularity_inverse;
            e += e000;
        }
        let inter = e;

        // Intra-molecular term over the non-1-4 interacting pairs.
        for p in &self.interacting_pairs {
            let r = ws.coordinates[p.j] - ws.coordinates[p.i];
            let r2 = r.norm_squared();
            if r2 < sf.cutoff_sqr() {
                let interaction = sf.evaluate(p.type_pair_index, r2);
                e += interaction.e;
                let derivative = interaction.dor * r;
                ws.derivatives[p.i] -= derivative;
                ws.derivatives[p.j] += derivative;
            }
        }

        if e >= e_upper_bound {
            return None;
        }

        // Backward sweep: aggregate forces and torques from the leaves to
        // the root, projecting each active frame's torque onto its axis.
        for k in 0..self.num_frames {
            ws.forces[k] = Vector3::zeros();
            ws.torques[k] = Vector3::zeros();
        }
        let mut t = self.num_active_torsions;
        for k in (1..self.num_frames).rev() {
            let f = &self.frames[k];
            for i in f.ha_begin..f.ha_end {
                ws.forces[k] += ws.derivatives[i];
                ws.torques[k] += (ws.coordinates[i] - ws.origins[k]).cross(&ws.derivatives[i]);
            }
            let force = ws.forces[k];
            let torque = ws.torques[k];
            ws.forces[f.parent] += force;
            ws.torques[f.parent] +=
                torque + (ws.origins[k] - ws.origins[f.parent]).cross(&force);
            if f.active {
                t -= 1;
                g.set_torsion(t, ws.torques[k].dot(&ws.axes[k]));
            }
        }
        for i in root.ha_begin..root.ha_end {
            ws.forces[0] += ws.derivatives[i];
            ws.torques[0] += (ws.coordinates[i] - ws.origins[0]).cross(&ws.derivatives[i]);
        }
        g.set_position(ws.forces[0]);
        g.set_orientation(ws.torques[0]);

        Some(Energies { total: e, inter })
    }

    /// Rebuilds absolute heavy-atom and hydrogen coordinates for a
    /// conformation, without any box gating: the same forward sweep as
    /// [`Ligand::evaluate`], extended to hydrogens.
    pub fn compose_result(&self, e: f64, f: f64, conf: &Conformation) -> DockingResult {
        let mut origins = vec![Vector3::zeros(); self.num_frames];
        let mut orientations = vec![UnitQuaternion::identity(); self.num_frames];
        let mut rotations = vec![Rotation3::identity(); self.num_frames];
        let mut heavy_atoms = vec![Vector3::zeros(); self.num_heavy_atoms];
        let mut hydrogens = vec![Vector3::zeros(); self.num_hydrogens];

        origins[0] = conf.position;
        orientations[0] = conf.orientation;
        rotations[0] = conf.orientation.to_rotation_matrix();

        let root = &self.frames[0];
        for i in root.ha_begin..root.ha_end {
            heavy_atoms[i] = origins[0] + rotations[0] * self.heavy_atoms[i].coordinate;
        }
        for i in root.hy_begin..root.hy_end {
            hydrogens[i] = origins[0] + rotations[0] * self.hydrogens[i].coordinate;
        }

        let mut t = 0;
        for k in 1..self.num_frames {
            let fr = &self.frames[k];
            origins[k] = origins[fr.parent] + rotations[fr.parent] * fr.yy;

            let angle = if fr.active {
                let angle = conf.torsions[t];
                t += 1;
                angle
            } else {
                0.0
            };
            let axis = Unit::new_normalize(rotations[fr.parent] * fr.xy);
            orientations[k] =
                UnitQuaternion::from_axis_angle(&axis, angle) * orientations[fr.parent];
            rotations[k] = orientations[k].to_rotation_matrix();

            for i in fr.ha_begin..fr.ha_end {
                heavy_atoms[i] = origins[k] + rotations[k] * self.heavy_atoms[i].coordinate;
            }
            for i in fr.hy_begin..fr.hy_end {
                hydrogens[i] = origins[k] + rotations[k] * self.hydrogens[i].coordinate;
            }
        }

        DockingResult {
            e,
            f,
            heavy_atoms,
            hydrogens,
        }
    }
}
