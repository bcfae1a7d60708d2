//! griddock: the computational core of a grid-map molecular docking engine.
//!
//! Given a flexible ligand in PDBQT format, a receptor-defined search box,
//! and precomputed per-atom-type potential grids, griddock searches the
//! continuous space of ligand conformations (translation, orientation,
//! torsion angles) with seeded Monte Carlo tasks refined by BFGS local
//! minimization, and collects clustered low-energy binding modes.
//!
//! The search is stochastic: it offers no global-optimum guarantee, but a
//! task is fully deterministic in its seed, so a result set is a function
//! of the ligand, the grids, and the set of seeds.

pub mod atom;
pub mod grid;
pub mod io;
pub mod ligand;
pub mod math;
pub mod optimization;
pub mod scoring;

// Re-export the types an embedding program touches directly.
pub use grid::{GridMap, SearchBox};
pub use ligand::{Conformation, Ligand, ParseError};
pub use optimization::{dock, monte_carlo_task, DockingResult, ResultContainer};
pub use scoring::{ScoringFunction, VinaScore};

/// Version of the library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
