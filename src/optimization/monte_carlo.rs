//! Per-seed Monte Carlo search with BFGS refinement.
//!
//! Each task owns a Mersenne-Twister generator seeded once, so its whole
//! trajectory is a pure function of `(seed, ligand, scoring, grids, box)`.
//! An iteration mutates one entity of the current conformation, runs a
//! quasi-Newton local minimization with a Wolfe-condition line search, and
//! applies the Metropolis criterion to the refined candidate.

use std::f64::consts::PI;
use std::mem;
use std::sync::Mutex;

use log::{debug, warn};
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use rand::distributions::{Distribution, Uniform};
use rand::SeedableRng;
use rand_distr::StandardNormal;
use rand_mt::Mt64;

use crate::grid::{GridMap, SearchBox};
use crate::ligand::{Change, Conformation, Ligand};
use crate::math::TriangularMatrix;
use crate::scoring::ScoringFunction;

use super::ResultContainer;

/// Random conformations tried before a task concludes the box admits none.
const MAX_INITIAL_TRIALS: usize = 1000;
/// Line search trials per BFGS step; alpha shrinks tenfold each trial.
const NUM_ALPHAS: usize = 5;
/// Armijo sufficient-decrease factor.
const ARMIJO_C1: f64 = 1e-4;
/// Curvature condition factor.
const CURVATURE_C2: f64 = 0.9;
/// Magnitude of an orientation mutation, in radians.
const ORIENTATION_STEP: f64 = 0.01;

/// Runs one seeded Monte Carlo search task over the ligand, streaming
/// accepted poses into the shared result container.
///
/// The iteration count, energy upper bound, and clustering threshold all
/// scale with the ligand size. A task that cannot find any valid initial
/// conformation returns without touching the container.
pub fn monte_carlo_task(
    results: &Mutex<ResultContainer>,
    lig: &Ligand,
    seed: u64,
    sf: &dyn ScoringFunction,
    bx: &SearchBox,
    maps: &[GridMap],
) {
    let num_mc_iterations = 100 * lig.num_heavy_atoms;
    let num_entities = 2 + lig.num_active_torsions;
    let num_variables = 6 + lig.num_active_torsions;
    let e_upper_bound = (4 * lig.num_heavy_atoms) as f64;
    let required_square_error = lig.num_heavy_atoms as f64;

    let mut rng = Mt64::seed_from_u64(seed);
    let uniform_01 = Uniform::new(0.0f64, 1.0);
    let uniform_11 = Uniform::new(-1.0f64, 1.0);
    let uniform_pi = Uniform::new(-PI, PI);
    let uniform_box = [
        Uniform::new(bx.corner0[0], bx.corner1[0]),
        Uniform::new(bx.corner0[1], bx.corner1[1]),
        Uniform::new(bx.corner0[2], bx.corner1[2]),
    ];
    let uniform_entity = Uniform::new(0usize, num_entities);

    let mut ws = lig.workspace();

    // Draw random conformations until one evaluates, or give up.
    let mut c0 = Conformation::new(lig.num_active_torsions);
    let mut g0 = Change::new(lig.num_active_torsions);
    let mut initial = None;
    for _ in 0..MAX_INITIAL_TRIALS {
        c0.position = Vector3::new(
            uniform_box[0].sample(&mut rng),
            uniform_box[1].sample(&mut rng),
            uniform_box[2].sample(&mut rng),
        );
        let w: f64 = StandardNormal.sample(&mut rng);
        let x: f64 = StandardNormal.sample(&mut rng);
        let y: f64 = StandardNormal.sample(&mut rng);
        let z: f64 = StandardNormal.sample(&mut rng);
        c0.orientation = UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z));
        for torsion in c0.torsions.iter_mut() {
            *torsion = uniform_pi.sample(&mut rng);
        }
        if let Some(en) = lig.evaluate(&c0, sf, bx, maps, e_upper_bound, &mut ws, &mut g0) {
            initial = Some(en);
            break;
        }
    }
    let Some(initial) = initial else {
        warn!(
            "{}: seed {seed}: no valid initial conformation in {MAX_INITIAL_TRIALS} trials",
            lig.name
        );
        return;
    };
    let mut e0 = initial.total;
    let mut best_e = e0;

    // Search state, allocated once and reused across iterations.
    let mut c1 = Conformation::new(lig.num_active_torsions);
    let mut c2 = Conformation::new(lig.num_active_torsions);
    let mut g1 = Change::new(lig.num_active_torsions);
    let mut g2 = Change::new(lig.num_active_torsions);
    let mut p = Change::new(lig.num_active_torsions);
    let mut y = Change::new(lig.num_active_torsions);
    let mut mhy = Change::new(lig.num_active_torsions);
    let identity = TriangularMatrix::identity(num_variables);
    let mut h = identity.clone();

    for _ in 0..num_mc_iterations {
        // Mutate c0 into a valid candidate c1: resample one entity, one
        // per active torsion plus one for position and one for orientation.
        let mut e1;
        let mut f1;
        loop {
            c1.clone_from(&c0);
            let entity = uniform_entity.sample(&mut rng);
            if entity < lig.num_active_torsions {
                c1.torsions[entity] = uniform_pi.sample(&mut rng);
            } else if entity == lig.num_active_torsions {
                c1.position += Vector3::new(
                    uniform_11.sample(&mut rng),
                    uniform_11.sample(&mut rng),
                    uniform_11.sample(&mut rng),
                );
            } else {
                let step = ORIENTATION_STEP
                    * Vector3::new(
                        uniform_11.sample(&mut rng),
                        uniform_11.sample(&mut rng),
                        uniform_11.sample(&mut rng),
                    );
                c1.orientation = UnitQuaternion::from_scaled_axis(step) * c1.orientation;
            }
            if let Some(en) = lig.evaluate(&c1, sf, bx, maps, e_upper_bound, &mut ws, &mut g1) {
                e1 = en.total;
                f1 = en.inter;
                break;
            }
        }

        // BFGS local minimization of c1, restarting the inverse Hessian
        // from identity. The loop ends when no step length satisfies both
        // Wolfe conditions.
        h.clone_from(&identity);
        loop {
            // Descent direction p = -H g.
            for i in 0..num_variables {
                let mut sum = 0.0;
                for j in 0..num_variables {
                    sum += h.get(i, j) * g1[j];
                }
                p[i] = -sum;
            }
            let mut pg1 = 0.0;
            for i in 0..num_variables {
                pg1 += p[i] * g1[i];
            }

            // Wolfe line search over a shrinking alpha schedule.
            let mut alpha = 1.0;
            let mut accepted = None;
            for _ in 0..NUM_ALPHAS {
                alpha *= 0.1;
                c2.position = c1.position + alpha * Vector3::new(p[0], p[1], p[2]);
                c2.orientation = UnitQuaternion::from_scaled_axis(
                    alpha * Vector3::new(p[3], p[4], p[5]),
                ) * c1.orientation;
                for i in 0..lig.num_active_torsions {
                    c2.torsions[i] = c1.torsions[i] + alpha * p[6 + i];
                }

                // The evaluation upper bound enforces the Armijo condition;
                // the curvature condition follows from the new gradient.
                if let Some(en) = lig.evaluate(
                    &c2,
                    sf,
                    bx,
                    maps,
                    e1 + ARMIJO_C1 * alpha * pg1,
                    &mut ws,
                    &mut g2,
                ) {
                    let mut pg2 = 0.0;
                    for i in 0..num_variables {
                        pg2 += p[i] * g2[i];
                    }
                    if pg2 >= CURVATURE_C2 * pg1 {
                        accepted = Some(en);
                        break;
                    }
                }
            }
            let Some(en2) = accepted else { break };

            // Inverse-Hessian update with y = g2 - g1 and s = alpha p.
            for i in 0..num_variables {
                y[i] = g2[i] - g1[i];
            }
            for i in 0..num_variables {
                let mut sum = 0.0;
                for j in 0..num_variables {
                    sum += h.get(i, j) * y[j];
                }
                mhy[i] = -sum;
            }
            let mut yhy = 0.0;
            let mut yp = 0.0;
            for i in 0..num_variables {
                yhy -= y[i] * mhy[i];
                yp += y[i] * p[i];
            }
            let ryp = 1.0 / yp;
            let pco = ryp * (ryp * yhy + alpha);
            for i in 0..num_variables {
                for j in i..num_variables {
                    *h.get_mut(i, j) += ryp * (mhy[i] * p[j] + mhy[j] * p[i]) + pco * p[i] * p[j];
                }
            }

            mem::swap(&mut c1, &mut c2);
            mem::swap(&mut g1, &mut g2);
            e1 = en2.total;
            f1 = en2.inter;
        }

        // Metropolis acceptance of the refined candidate.
        let delta = e0 - e1;
        if delta > 0.0 || uniform_01.sample(&mut rng) < delta.exp() {
            let submit = e1 < best_e || !results.lock().unwrap().is_full();
            if submit {
                let pose = lig.compose_result(e1, f1, &c1);
                results.lock().unwrap().push(pose, required_square_error);
                best_e = best_e.min(e1);
            }
            c0.clone_from(&c1);
            e0 = e1;
        }
    }
    debug!(
        "{}: seed {seed}: {num_mc_iterations} iterations done, best energy {best_e:.3}",
        lig.name
    );
}
