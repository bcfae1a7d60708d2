//! The Vina empirical scoring function in closed form.
//!
//! Five terms over the surface distance `d = r - (vdw_i + vdw_j)`: two
//! attractive gaussians, a quadratic repulsion, and piecewise-linear
//! hydrophobic and hydrogen-bond terms. The radial derivative is analytic,
//! so gradients are exact away from the piecewise-linear kinks.

use crate::atom::XsType;
use crate::math::mp;

use super::{Interaction, ScoringFunction};

/// Interaction cutoff in Angstroms.
const CUTOFF: f64 = 8.0;

/// Term weights of the Vina scoring function.
#[derive(Debug, Clone)]
pub struct VinaWeights {
    pub gauss1: f64,
    pub gauss2: f64,
    pub repulsion: f64,
    pub hydrophobic: f64,
    pub hbond: f64,
}

impl Default for VinaWeights {
    fn default() -> Self {
        Self {
            gauss1: -0.035579,
            gauss2: -0.005156,
            repulsion: 0.840245,
            hydrophobic: -0.035069,
            hbond: -0.587439,
        }
    }
}

/// Closed-form Vina pair potential with analytic radial derivative.
#[derive(Debug, Clone)]
pub struct VinaScore {
    weights: VinaWeights,
    /// Type pair for each triangular pair index.
    pairs: Vec<(XsType, XsType)>,
}

impl VinaScore {
    pub fn new() -> Self {
        Self::with_weights(VinaWeights::default())
    }

    pub fn with_weights(weights: VinaWeights) -> Self {
        let mut pairs = vec![(XsType::HydrophobicCarbon, XsType::HydrophobicCarbon);
            XsType::PAIR_COUNT];
        for t1 in XsType::ALL {
            for t2 in XsType::ALL {
                if t1.index() <= t2.index() {
                    pairs[mp(t1.index(), t2.index())] = (t1, t2);
                }
            }
        }
        Self { weights, pairs }
    }

    /// Energy and `dE/dr` at separation `r` for the given type pair.
    fn terms(&self, t1: XsType, t2: XsType, r: f64) -> (f64, f64) {
        let w = &self.weights;
        let d = r - (t1.vdw_radius() + t2.vdw_radius());
        let mut e = 0.0;
        let mut de = 0.0;

        // gauss1: exp(-(d / 0.5)^2)
        let g1 = (-(d / 0.5) * (d / 0.5)).exp();
        e += w.gauss1 * g1;
        de += w.gauss1 * g1 * (-2.0 * d / 0.25);

        // gauss2: exp(-((d - 3) / 2)^2)
        let q = (d - 3.0) / 2.0;
        let g2 = (-q * q).exp();
        e += w.gauss2 * g2;
        de += w.gauss2 * g2 * (-q);

        // repulsion: d^2 inside the surface
        if d < 0.0 {
            e += w.repulsion * d * d;
            de += w.repulsion * 2.0 * d;
        }

        // hydrophobic: 1 up to d = 0.5, fading linearly to 0 at d = 1.5
        if t1.is_hydrophobic() && t2.is_hydrophobic() {
            if d <= 0.5 {
                e += w.hydrophobic;
            } else if d < 1.5 {
                e += w.hydrophobic * (1.5 - d);
                de -= w.hydrophobic;
            }
        }

        // hydrogen bond: 1 up to d = -0.7, fading linearly to 0 at d = 0
        if (t1.is_donor() && t2.is_acceptor()) || (t1.is_acceptor() && t2.is_donor()) {
            if d <= -0.7 {
                e += w.hbond;
            } else if d < 0.0 {
                e += w.hbond * (d / -0.7);
                de += w.hbond / -0.7;
            }
        }

        (e, de)
    }
}

impl Default for VinaScore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoringFunction for VinaScore {
    fn evaluate(&self, type_pair_index: usize, r2: f64) -> Interaction {
        debug_assert!(r2 < self.cutoff_sqr());
        let (t1, t2) = self.pairs[type_pair_index];
        let r = r2.sqrt();
        let (e, de) = self.terms(t1, t2, r);
        Interaction { e, dor: de / r }
    }

    fn cutoff_sqr(&self) -> f64 {
        CUTOFF * CUTOFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pair_index(t1: XsType, t2: XsType) -> usize {
        mp(t1.index(), t2.index())
    }

    #[test]
    fn test_pair_index_symmetry() {
        let sf = VinaScore::new();
        let r2 = 9.0;
        let a = sf.evaluate(pair_index(XsType::Nitrogen, XsType::HydrophobicCarbon), r2);
        let b = sf.evaluate(pair_index(XsType::HydrophobicCarbon, XsType::Nitrogen), r2);
        assert_eq!(a.e, b.e);
        assert_eq!(a.dor, b.dor);
    }

    #[test]
    fn test_repulsion_dominates_at_contact() {
        let sf = VinaScore::new();
        let tp = pair_index(XsType::HydrophobicCarbon, XsType::HydrophobicCarbon);
        // 1 Angstrom separation is deep inside the 3.8 Angstrom surface.
        let close = sf.evaluate(tp, 1.0);
        assert!(close.e > 1.0, "contact energy should be repulsive, got {}", close.e);
        assert!(close.dor < 0.0, "repulsion should push atoms apart");
    }

    #[test]
    fn test_hbond_term_requires_donor_acceptor() {
        let sf = VinaScore::new();
        // At the surface distance of an N_D / O_A pair the gaussian terms are
        // shared; the hydrogen bond term separates the pairs.
        let r = 1.8 + 1.7 - 0.7;
        let da = sf.evaluate(pair_index(XsType::DonorNitrogen, XsType::AcceptorOxygen), r * r);
        let dd = sf.evaluate(pair_index(XsType::DonorNitrogen, XsType::DonorNitrogen), r * r);
        assert!(da.e < dd.e - 0.5, "donor-acceptor pair should gain the hbond term");
    }

    #[test]
    fn test_analytic_derivative_matches_finite_difference() {
        let sf = VinaScore::new();
        let tp = pair_index(XsType::HydrophobicCarbon, XsType::AcceptorOxygen);
        let h = 1e-6;
        // Sample radii away from the piecewise-linear kinks.
        for r in [2.0, 3.3, 4.1, 5.7, 6.9] {
            let e_plus = sf.evaluate(tp, (r + h) * (r + h)).e;
            let e_minus = sf.evaluate(tp, (r - h) * (r - h)).e;
            let numeric = (e_plus - e_minus) / (2.0 * h);
            let analytic = sf.evaluate(tp, r * r).dor * r;
            assert_relative_eq!(numeric, analytic, epsilon = 1e-6, max_relative = 1e-4);
        }
    }
}
