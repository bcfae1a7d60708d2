//! Atom representation and the AutoDock / XScore type taxonomies.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// AutoDock atom types recognized in the PDBQT type column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdType {
    Hydrogen,         // H
    PolarHydrogen,    // HD (bonded to a hydrogen bond donor)
    Carbon,           // C
    AromaticCarbon,   // A
    Nitrogen,         // N
    AcceptorNitrogen, // NA
    AcceptorOxygen,   // OA
    Sulfur,           // S
    AcceptorSulfur,   // SA
    Selenium,         // Se
    Phosphorus,       // P
    Fluorine,         // F
    Chlorine,         // Cl
    Bromine,          // Br
    Iodine,           // I
    Zinc,             // Zn
    Iron,             // Fe
    Magnesium,        // Mg
    Calcium,          // Ca
    Manganese,        // Mn
}

impl AdType {
    /// Parse an AutoDock type from its PDBQT string representation.
    /// Returns `None` for types the engine does not support.
    pub fn from_pdbqt_string(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "H" => Some(AdType::Hydrogen),
            "HD" => Some(AdType::PolarHydrogen),
            "C" => Some(AdType::Carbon),
            "A" => Some(AdType::AromaticCarbon),
            "N" => Some(AdType::Nitrogen),
            "NA" => Some(AdType::AcceptorNitrogen),
            "OA" => Some(AdType::AcceptorOxygen),
            "S" => Some(AdType::Sulfur),
            "SA" => Some(AdType::AcceptorSulfur),
            "SE" => Some(AdType::Selenium),
            "P" => Some(AdType::Phosphorus),
            "F" => Some(AdType::Fluorine),
            "CL" => Some(AdType::Chlorine),
            "BR" => Some(AdType::Bromine),
            "I" => Some(AdType::Iodine),
            "ZN" => Some(AdType::Zinc),
            "FE" => Some(AdType::Iron),
            "MG" => Some(AdType::Magnesium),
            "CA" => Some(AdType::Calcium),
            "MN" => Some(AdType::Manganese),
            _ => None,
        }
    }

    /// PDBQT string representation.
    pub fn to_pdbqt_string(self) -> &'static str {
        match self {
            AdType::Hydrogen => "H",
            AdType::PolarHydrogen => "HD",
            AdType::Carbon => "C",
            AdType::AromaticCarbon => "A",
            AdType::Nitrogen => "N",
            AdType::AcceptorNitrogen => "NA",
            AdType::AcceptorOxygen => "OA",
            AdType::Sulfur => "S",
            AdType::AcceptorSulfur => "SA",
            AdType::Selenium => "Se",
            AdType::Phosphorus => "P",
            AdType::Fluorine => "F",
            AdType::Chlorine => "Cl",
            AdType::Bromine => "Br",
            AdType::Iodine => "I",
            AdType::Zinc => "Zn",
            AdType::Iron => "Fe",
            AdType::Magnesium => "Mg",
            AdType::Calcium => "Ca",
            AdType::Manganese => "Mn",
        }
    }

    /// Covalent radius in Angstroms, scaled by a 1.1 tolerance so that the
    /// sum of two radii serves directly as a bond-detection cutoff.
    pub fn covalent_radius(self) -> f64 {
        match self {
            AdType::Hydrogen | AdType::PolarHydrogen => 0.407,
            AdType::Carbon | AdType::AromaticCarbon => 0.847,
            AdType::Nitrogen | AdType::AcceptorNitrogen => 0.825,
            AdType::AcceptorOxygen => 0.803,
            AdType::Sulfur | AdType::AcceptorSulfur => 1.122,
            AdType::Selenium => 1.287,
            AdType::Phosphorus => 1.166,
            AdType::Fluorine => 0.781,
            AdType::Chlorine => 1.089,
            AdType::Bromine => 1.254,
            AdType::Iodine => 1.463,
            AdType::Zinc => 1.342,
            AdType::Iron => 1.375,
            AdType::Magnesium => 1.430,
            AdType::Calcium => 1.914,
            AdType::Manganese => 1.529,
        }
    }
}

/// XScore atom types, the taxonomy indexing grid maps and the pairwise
/// scoring table. Derived from the AutoDock type and refined during ligand
/// construction (donor marking, dehydrophobicization).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum XsType {
    HydrophobicCarbon,     // C_H
    PolarCarbon,           // C_P
    Nitrogen,              // N_P
    DonorNitrogen,         // N_D
    AcceptorNitrogen,      // N_A
    DonorAcceptorNitrogen, // N_DA
    AcceptorOxygen,        // O_A
    DonorAcceptorOxygen,   // O_DA
    Sulfur,                // S_P
    Phosphorus,            // P_P
    Fluorine,              // F_H
    Chlorine,              // Cl_H
    Bromine,               // Br_H
    Iodine,                // I_H
    Metal,                 // Met_D
}

impl XsType {
    /// Number of XScore types.
    pub const COUNT: usize = 15;

    /// Number of unordered type pairs, the size of a pairwise scoring table.
    pub const PAIR_COUNT: usize = Self::COUNT * (Self::COUNT + 1) / 2;

    /// All types, in index order.
    pub const ALL: [XsType; Self::COUNT] = [
        XsType::HydrophobicCarbon,
        XsType::PolarCarbon,
        XsType::Nitrogen,
        XsType::DonorNitrogen,
        XsType::AcceptorNitrogen,
        XsType::DonorAcceptorNitrogen,
        XsType::AcceptorOxygen,
        XsType::DonorAcceptorOxygen,
        XsType::Sulfur,
        XsType::Phosphorus,
        XsType::Fluorine,
        XsType::Chlorine,
        XsType::Bromine,
        XsType::Iodine,
        XsType::Metal,
    ];

    /// Position in the taxonomy, usable as a grid-map or table index.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Initial XScore type for an AutoDock type. Hydrogens carry none.
    pub fn from_ad(ad: AdType) -> Option<Self> {
        match ad {
            AdType::Hydrogen | AdType::PolarHydrogen => None,
            AdType::Carbon | AdType::AromaticCarbon => Some(XsType::HydrophobicCarbon),
            AdType::Nitrogen => Some(XsType::Nitrogen),
            AdType::AcceptorNitrogen => Some(XsType::AcceptorNitrogen),
            AdType::AcceptorOxygen => Some(XsType::AcceptorOxygen),
            AdType::Sulfur | AdType::AcceptorSulfur | AdType::Selenium => Some(XsType::Sulfur),
            AdType::Phosphorus => Some(XsType::Phosphorus),
            AdType::Fluorine => Some(XsType::Fluorine),
            AdType::Chlorine => Some(XsType::Chlorine),
            AdType::Bromine => Some(XsType::Bromine),
            AdType::Iodine => Some(XsType::Iodine),
            AdType::Zinc | AdType::Iron | AdType::Magnesium | AdType::Calcium
            | AdType::Manganese => Some(XsType::Metal),
        }
    }

    /// Van der Waals radius in Angstroms, defining the surface distance of
    /// the pairwise scoring terms.
    pub fn vdw_radius(self) -> f64 {
        match self {
            XsType::HydrophobicCarbon | XsType::PolarCarbon => 1.9,
            XsType::Nitrogen
            | XsType::DonorNitrogen
            | XsType::AcceptorNitrogen
            | XsType::DonorAcceptorNitrogen => 1.8,
            XsType::AcceptorOxygen | XsType::DonorAcceptorOxygen => 1.7,
            XsType::Sulfur => 2.0,
            XsType::Phosphorus => 2.1,
            XsType::Fluorine => 1.5,
            XsType::Chlorine => 1.8,
            XsType::Bromine => 2.0,
            XsType::Iodine => 2.2,
            XsType::Metal => 1.2,
        }
    }

    /// True for types participating in the hydrophobic scoring term.
    pub fn is_hydrophobic(self) -> bool {
        matches!(
            self,
            XsType::HydrophobicCarbon
                | XsType::Fluorine
                | XsType::Chlorine
                | XsType::Bromine
                | XsType::Iodine
        )
    }

    /// True for hydrogen bond donors.
    pub fn is_donor(self) -> bool {
        matches!(
            self,
            XsType::DonorNitrogen
                | XsType::DonorAcceptorNitrogen
                | XsType::DonorAcceptorOxygen
                | XsType::Metal
        )
    }

    /// True for hydrogen bond acceptors.
    pub fn is_acceptor(self) -> bool {
        matches!(
            self,
            XsType::AcceptorNitrogen
                | XsType::DonorAcceptorNitrogen
                | XsType::AcceptorOxygen
                | XsType::DonorAcceptorOxygen
        )
    }

    /// The type after the atom is marked a hydrogen bond donor.
    pub fn donorized(self) -> Self {
        match self {
            XsType::Nitrogen => XsType::DonorNitrogen,
            XsType::AcceptorNitrogen => XsType::DonorAcceptorNitrogen,
            XsType::AcceptorOxygen => XsType::DonorAcceptorOxygen,
            other => other,
        }
    }

    /// The type after the atom loses its hydrophobic character.
    pub fn dehydrophobicized(self) -> Self {
        match self {
            XsType::HydrophobicCarbon => XsType::PolarCarbon,
            other => other,
        }
    }
}

/// A ligand atom: Cartesian coordinate plus its AutoDock type and the
/// derived XScore type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    /// Coordinate in Angstroms. Absolute while the ligand is being parsed,
    /// frame-local once construction finishes.
    pub coordinate: Vector3<f64>,
    /// AutoDock type from the PDBQT type column.
    pub ad: AdType,
    xs: Option<XsType>,
}

impl Atom {
    /// Create an atom; the XScore type is derived from the AutoDock type.
    pub fn new(coordinate: Vector3<f64>, ad: AdType) -> Self {
        Self {
            coordinate,
            ad,
            xs: XsType::from_ad(ad),
        }
    }

    /// XScore type. Only heavy atoms carry one; querying a hydrogen
    /// violates the construction invariant.
    #[inline]
    pub fn xs(&self) -> XsType {
        self.xs.expect("XScore type queried on a hydrogen")
    }

    /// True for H and HD atoms.
    pub fn is_hydrogen(&self) -> bool {
        matches!(self.ad, AdType::Hydrogen | AdType::PolarHydrogen)
    }

    /// True for heavy atoms other than carbon.
    pub fn is_hetero(&self) -> bool {
        !matches!(
            self.ad,
            AdType::Hydrogen | AdType::PolarHydrogen | AdType::Carbon | AdType::AromaticCarbon
        )
    }

    /// True once the atom has been marked a hydrogen bond donor.
    pub fn is_donor(&self) -> bool {
        self.xs.is_some_and(XsType::is_donor)
    }

    /// True while the atom retains hydrophobic character.
    pub fn is_hydrophobic(&self) -> bool {
        self.xs.is_some_and(XsType::is_hydrophobic)
    }

    /// Mark the atom as a hydrogen bond donor.
    pub fn donorize(&mut self) {
        self.xs = self.xs.map(XsType::donorized);
    }

    /// Strip the atom of its hydrophobic character.
    pub fn dehydrophobicize(&mut self) {
        self.xs = self.xs.map(XsType::dehydrophobicized);
    }

    /// Two atoms are covalently bonded neighbors when their distance is
    /// below the sum of their covalent radii.
    pub fn is_neighbor(&self, other: &Atom) -> bool {
        let cutoff = self.ad.covalent_radius() + other.ad.covalent_radius();
        (self.coordinate - other.coordinate).norm_squared() < cutoff * cutoff
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}, {}, {})",
            self.ad.to_pdbqt_string(),
            self.coordinate.x,
            self.coordinate.y,
            self.coordinate.z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ad_type_round_trip() {
        for s in ["C", "A", "N", "NA", "OA", "HD", "Cl", "Zn"] {
            let t = AdType::from_pdbqt_string(s).expect("supported type");
            assert_eq!(t.to_pdbqt_string(), s);
        }
        assert_eq!(AdType::from_pdbqt_string(" OA "), Some(AdType::AcceptorOxygen));
        assert_eq!(AdType::from_pdbqt_string("X"), None);
        assert_eq!(AdType::from_pdbqt_string(""), None);
    }

    #[test]
    fn test_xs_derivation() {
        assert_eq!(XsType::from_ad(AdType::Carbon), Some(XsType::HydrophobicCarbon));
        assert_eq!(
            XsType::from_ad(AdType::AromaticCarbon),
            Some(XsType::HydrophobicCarbon)
        );
        assert_eq!(XsType::from_ad(AdType::AcceptorOxygen), Some(XsType::AcceptorOxygen));
        assert_eq!(XsType::from_ad(AdType::Zinc), Some(XsType::Metal));
        assert_eq!(XsType::from_ad(AdType::PolarHydrogen), None);
    }

    #[test]
    fn test_xs_index_order() {
        for (i, t) in XsType::ALL.iter().enumerate() {
            assert_eq!(t.index(), i);
        }
    }

    #[test]
    fn test_donorize_and_dehydrophobicize() {
        let mut n = Atom::new(Vector3::zeros(), AdType::Nitrogen);
        assert!(!n.is_donor());
        n.donorize();
        assert_eq!(n.xs(), XsType::DonorNitrogen);
        assert!(n.is_donor());

        let mut o = Atom::new(Vector3::zeros(), AdType::AcceptorOxygen);
        o.donorize();
        assert_eq!(o.xs(), XsType::DonorAcceptorOxygen);
        assert!(o.is_donor() && o.xs().is_acceptor());

        let mut c = Atom::new(Vector3::zeros(), AdType::Carbon);
        assert!(c.is_hydrophobic());
        c.dehydrophobicize();
        assert_eq!(c.xs(), XsType::PolarCarbon);
        assert!(!c.is_hydrophobic());
    }

    #[test]
    fn test_neighbor_detection() {
        let a = Atom::new(Vector3::zeros(), AdType::Carbon);
        let bonded = Atom::new(Vector3::new(1.5, 0.0, 0.0), AdType::Carbon);
        let apart = Atom::new(Vector3::new(1.8, 0.0, 0.0), AdType::Carbon);
        assert!(a.is_neighbor(&bonded));
        assert!(!a.is_neighbor(&apart));
    }
}
