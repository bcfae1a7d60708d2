//! PDBQT ligand parser and kinematic preprocessing.
//!
//! Parsing walks the BRANCH tree with a stack encoded as the `current`
//! frame index, exactly mirroring the nesting of the input file. Atom
//! records use fixed columns; BRANCH/ENDBRANCH serials are whitespace
//! separated. Every input line is retained verbatim so docked models can
//! be re-emitted with only the coordinate columns rewritten.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use nalgebra::Vector3;
use thiserror::Error;

use crate::atom::{AdType, Atom};
use crate::math::mp;

use super::{Frame, InteractingPair, Ligand};

/// Errors raised while constructing a ligand from PDBQT input.
/// Line numbers are 1-based.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("{}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        source: io::Error,
    },

    #[error("{}:{}: atom type `{}` is not supported", .path.display(), .line, .ad)]
    UnsupportedAtomType {
        path: PathBuf,
        line: usize,
        ad: String,
    },

    #[error("{}:{}: malformed {} field", .path.display(), .line, .field)]
    MalformedField {
        path: PathBuf,
        line: usize,
        field: &'static str,
    },

    #[error("{}:{}: ATOM record outside the open frame", .path.display(), .line)]
    AtomOutsideFrame { path: PathBuf, line: usize },

    #[error("{}:{}: empty BRANCH frame", .path.display(), .line)]
    EmptyBranch { path: PathBuf, line: usize },

    #[error(
        "{}:{}: serial {} does not name a heavy atom of the current frame",
        .path.display(), .line, .serial
    )]
    RotorSerialNotFound {
        path: PathBuf,
        line: usize,
        serial: usize,
    },

    #[error("{}:{}: unmatched ENDBRANCH", .path.display(), .line)]
    UnmatchedEndBranch { path: PathBuf, line: usize },

    #[error("{}: BRANCH left open at end of file", .path.display())]
    UnclosedBranch { path: PathBuf },

    #[error("{}: no atom records", .path.display())]
    NoAtoms { path: PathBuf },
}

/// Trimmed fixed-column field, `None` when the line is too short.
fn column(line: &str, begin: usize, end: usize) -> Option<&str> {
    line.get(begin..end.min(line.len())).map(str::trim)
}

fn column_f64(
    line: &str,
    begin: usize,
    end: usize,
    field: &'static str,
    path: &Path,
    lineno: usize,
) -> Result<f64, ParseError> {
    column(line, begin, end)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ParseError::MalformedField {
            path: path.to_path_buf(),
            line: lineno,
            field,
        })
}

fn column_usize(
    line: &str,
    begin: usize,
    end: usize,
    field: &'static str,
    path: &Path,
    lineno: usize,
) -> Result<usize, ParseError> {
    column(line, begin, end)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ParseError::MalformedField {
            path: path.to_path_buf(),
            line: lineno,
            field,
        })
}

/// Whitespace-separated serial in a BRANCH / ENDBRANCH record.
fn branch_serial(
    line: &str,
    position: usize,
    path: &Path,
    lineno: usize,
) -> Result<usize, ParseError> {
    line.split_whitespace()
        .nth(position)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ParseError::MalformedField {
            path: path.to_path_buf(),
            line: lineno,
            field: "rotor serial",
        })
}

impl Ligand {
    /// Parses a ligand from a PDBQT file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file), path)
    }

    /// Parses a ligand from any buffered reader; `path` labels errors.
    pub fn from_reader<R: BufRead>(reader: R, path: &Path) -> Result<Self, ParseError> {
        let mut lines: Vec<String> = Vec::with_capacity(200);
        let mut frames: Vec<Frame> = Vec::with_capacity(30);
        frames.push(Frame::root());
        let mut heavy_atoms: Vec<Atom> = Vec::with_capacity(100);
        let mut hydrogens: Vec<Atom> = Vec::with_capacity(50);
        let mut serials: Vec<usize> = Vec::with_capacity(100);
        let mut current = 0usize;
        let mut num_active_torsions = 0usize;

        for (lineno, line) in reader.lines().enumerate() {
            let lineno = lineno + 1;
            let line = line.map_err(|source| ParseError::Io {
                path: path.to_path_buf(),
                source,
            })?;

            if line.starts_with("ATOM") || line.starts_with("HETATM") {
                // Atom records may only extend the most recently opened frame.
                if current != frames.len() - 1 {
                    return Err(ParseError::AtomOutsideFrame {
                        path: path.to_path_buf(),
                        line: lineno,
                    });
                }

                let ad_str = column(&line, 77, 79).unwrap_or("");
                let ad = AdType::from_pdbqt_string(ad_str).ok_or_else(|| {
                    ParseError::UnsupportedAtomType {
                        path: path.to_path_buf(),
                        line: lineno,
                        ad: ad_str.to_string(),
                    }
                })?;

                let coordinate = Vector3::new(
                    column_f64(&line, 30, 38, "x coordinate", path, lineno)?,
                    column_f64(&line, 38, 46, "y coordinate", path, lineno)?,
                    column_f64(&line, 46, 54, "z coordinate", path, lineno)?,
                );
                let a = Atom::new(coordinate, ad);

                if a.is_hydrogen() {
                    // A polar hydrogen marks the hetero atom it is bonded to
                    // as a hydrogen bond donor. Scan the current frame's
                    // heavy atoms from the most recent backward.
                    if ad == AdType::PolarHydrogen {
                        for i in (frames[current].ha_begin..heavy_atoms.len()).rev() {
                            let b = &mut heavy_atoms[i];
                            if !b.is_hetero() {
                                continue;
                            }
                            if a.is_neighbor(b) {
                                b.donorize();
                                break;
                            }
                        }
                    }
                    hydrogens.push(a);
                } else {
                    serials.push(column_usize(&line, 6, 11, "atom serial", path, lineno)?);
                    heavy_atoms.push(a);
                }
                lines.push(line);
            } else if line.starts_with("BRANCH") {
                let x = branch_serial(&line, 1, path, lineno)?;
                let rotor_x_idx = (frames[current].ha_begin..heavy_atoms.len())
                    .find(|&i| serials[i] == x)
                    .ok_or_else(|| ParseError::RotorSerialNotFound {
                        path: path.to_path_buf(),
                        line: lineno,
                        serial: x,
                    })?;

                frames.push(Frame::branch(
                    current,
                    rotor_x_idx,
                    heavy_atoms.len(),
                    hydrogens.len(),
                ));
                current = frames.len() - 1;

                // The new frame's begin indices close out the previous one.
                frames[current - 1].ha_end = heavy_atoms.len();
                frames[current - 1].hy_end = hydrogens.len();
                lines.push(line);
            } else if line.starts_with("ENDBRANCH") {
                if current == 0 {
                    return Err(ParseError::UnmatchedEndBranch {
                        path: path.to_path_buf(),
                        line: lineno,
                    });
                }
                // An empty frame means the input structure is degenerate.
                if frames[current].ha_begin == heavy_atoms.len() {
                    return Err(ParseError::EmptyBranch {
                        path: path.to_path_buf(),
                        line: lineno,
                    });
                }

                let y = branch_serial(&line, 2, path, lineno)?;
                let rotor_y_idx = (frames[current].ha_begin..heavy_atoms.len())
                    .find(|&i| serials[i] == y)
                    .ok_or_else(|| ParseError::RotorSerialNotFound {
                        path: path.to_path_buf(),
                        line: lineno,
                        serial: y,
                    })?;
                frames[current].rotor_y_idx = rotor_y_idx;

                // A leaf frame holding nothing but its rotor Y (plus
                // hydrogens, e.g. a hydroxyl) cannot change the score when
                // its torsion turns.
                if current == frames.len() - 1
                    && frames[current].ha_begin + 1 == heavy_atoms.len()
                {
                    frames[current].active = false;
                } else {
                    num_active_torsions += 1;
                }

                current = frames[current].parent;
                lines.push(line);
            } else {
                // ROOT, ENDROOT, TORSDOF, REMARK and anything else carry no
                // structure but are retained for re-emission.
                lines.push(line);
            }
        }

        if current != 0 {
            return Err(ParseError::UnclosedBranch {
                path: path.to_path_buf(),
            });
        }
        if heavy_atoms.is_empty() {
            return Err(ParseError::NoAtoms {
                path: path.to_path_buf(),
            });
        }

        Ok(assemble(
            path,
            lines,
            frames,
            heavy_atoms,
            hydrogens,
            num_active_torsions,
        ))
    }
}

/// Post-parse passes, in dependency order: counts, hydrophobic pruning,
/// frame-local rotor geometry, bond graph, interacting pairs, and finally
/// the switch of all atom coordinates to frame-local space.
fn assemble(
    path: &Path,
    lines: Vec<String>,
    mut frames: Vec<Frame>,
    mut heavy_atoms: Vec<Atom>,
    hydrogens: Vec<Atom>,
    num_active_torsions: usize,
) -> Ligand {
    let num_frames = frames.len();
    let num_torsions = num_frames - 1;
    let num_heavy_atoms = heavy_atoms.len();
    let num_hydrogens = hydrogens.len();
    let flexibility_penalty_factor = 1.0
        / (1.0
            + 0.05846
                * (num_active_torsions as f64
                    + 0.5 * (num_torsions - num_active_torsions) as f64));
    frames[num_frames - 1].ha_end = num_heavy_atoms;
    frames[num_frames - 1].hy_end = num_hydrogens;

    // A carbon bonded to a hetero atom loses its hydrophobic character,
    // within a frame and across each rotatable bond.
    for k in 0..num_frames {
        let f = frames[k].clone();
        for i in f.ha_begin..f.ha_end {
            if !heavy_atoms[i].is_hetero() {
                continue;
            }
            for j in f.ha_begin..f.ha_end {
                if heavy_atoms[j].is_hetero() {
                    continue;
                }
                if heavy_atoms[i].is_neighbor(&heavy_atoms[j]) {
                    heavy_atoms[j].dehydrophobicize();
                }
            }
        }
        if k > 0 {
            let y_hetero = heavy_atoms[f.rotor_y_idx].is_hetero();
            let x_hetero = heavy_atoms[f.rotor_x_idx].is_hetero();
            if y_hetero && !x_hetero {
                heavy_atoms[f.rotor_x_idx].dehydrophobicize();
            }
            if x_hetero && !y_hetero {
                heavy_atoms[f.rotor_y_idx].dehydrophobicize();
            }
        }
    }

    // Rotor geometry in parent-local coordinates, while atom coordinates
    // are still absolute.
    for k in 1..num_frames {
        let parent_origin = heavy_atoms[frames[frames[k].parent].rotor_y_idx].coordinate;
        let y = heavy_atoms[frames[k].rotor_y_idx].coordinate;
        let x = heavy_atoms[frames[k].rotor_x_idx].coordinate;
        frames[k].yy = y - parent_origin;
        frames[k].xy = (y - x).normalize();
    }

    // Bond graph over heavy atoms: covalent neighbors within a frame plus
    // the rotor X <-> rotor Y edge of each rotatable bond.
    let mut bonds: Vec<Vec<usize>> = vec![Vec::with_capacity(4); num_heavy_atoms];
    for k in 0..num_frames {
        let f = &frames[k];
        for i in f.ha_begin..f.ha_end {
            for j in (i + 1)..f.ha_end {
                if heavy_atoms[i].is_neighbor(&heavy_atoms[j]) {
                    bonds[i].push(j);
                    bonds[j].push(i);
                }
            }
        }
        if k > 0 {
            bonds[f.rotor_y_idx].push(f.rotor_x_idx);
            bonds[f.rotor_x_idx].push(f.rotor_y_idx);
        }
    }

    // Intra-ligand interacting pairs: heavy atoms of distinct frames that
    // are separated by more than three covalent bonds and are not the
    // rotor atoms of the connecting bond itself.
    let mut interacting_pairs = Vec::new();
    let mut neighbors: Vec<usize> = Vec::with_capacity(10);
    for k1 in 0..num_frames {
        let f1 = &frames[k1];
        for i in f1.ha_begin..f1.ha_end {
            // Atoms reachable from i within three bond hops.
            for &b1 in &bonds[i] {
                if !neighbors.contains(&b1) {
                    neighbors.push(b1);
                }
                for &b2 in &bonds[b1] {
                    if !neighbors.contains(&b2) {
                        neighbors.push(b2);
                    }
                    for &b3 in &bonds[b2] {
                        if !neighbors.contains(&b3) {
                            neighbors.push(b3);
                        }
                    }
                }
            }

            for (k2, f2) in frames.iter().enumerate().skip(k1 + 1) {
                for j in f2.ha_begin..f2.ha_end {
                    if (k1 == f2.parent && (j == f2.rotor_y_idx || i == f2.rotor_x_idx))
                        || neighbors.contains(&j)
                    {
                        continue;
                    }
                    interacting_pairs.push(InteractingPair {
                        i,
                        j,
                        type_pair_index: mp(
                            heavy_atoms[i].xs().index(),
                            heavy_atoms[j].xs().index(),
                        ),
                    });
                }
            }

            neighbors.clear();
        }
    }

    // Switch atom coordinates to frame-local space: each frame's origin is
    // its rotor Y.
    let mut hydrogens = hydrogens;
    for f in &frames {
        let origin = heavy_atoms[f.rotor_y_idx].coordinate;
        for a in &mut heavy_atoms[f.ha_begin..f.ha_end] {
            a.coordinate -= origin;
        }
        for a in &mut hydrogens[f.hy_begin..f.hy_end] {
            a.coordinate -= origin;
        }
    }

    Ligand {
        name: path.display().to_string(),
        frames,
        heavy_atoms,
        hydrogens,
        lines,
        interacting_pairs,
        num_frames,
        num_torsions,
        num_active_torsions,
        num_heavy_atoms,
        num_hydrogens,
        flexibility_penalty_factor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::XsType;
    use approx::assert_relative_eq;

    fn atom_line(serial: usize, name: &str, x: f64, y: f64, z: f64, ad: &str) -> String {
        format!(
            "ATOM  {:>5} {:<4} LIG A   1    {:>8.3}{:>8.3}{:>8.3}  1.00  0.00    +0.000 {:<2}",
            serial, name, x, y, z, ad
        )
    }

    fn parse(text: &str) -> Result<Ligand, ParseError> {
        Ligand::from_reader(text.as_bytes(), Path::new("inline.pdbqt"))
    }

    /// A two-frame ligand with one active torsion: two root carbons and a
    /// three-carbon branch rotating about the z axis.
    pub(crate) fn torsion_ligand_text() -> String {
        [
            "ROOT".to_string(),
            atom_line(1, "C1", 0.0, 0.0, 0.0, "C"),
            atom_line(2, "C2", 0.75, 1.299, -0.5, "C"),
            "ENDROOT".to_string(),
            "BRANCH   1   3".to_string(),
            atom_line(3, "C3", 0.0, 0.0, 1.5, "C"),
            atom_line(4, "C4", 1.5, 0.0, 1.5, "C"),
            atom_line(5, "C5", 2.0, 0.0, 0.4, "C"),
            "ENDBRANCH   1   3".to_string(),
            "TORSDOF 1".to_string(),
        ]
        .join("\n")
    }

    #[test]
    fn test_frame_tree_and_ranges() {
        let lig = parse(&torsion_ligand_text()).expect("fixture parses");
        assert_eq!(lig.num_frames, 2);
        assert_eq!(lig.num_torsions, 1);
        assert_eq!(lig.num_active_torsions, 1);
        assert_eq!(lig.num_heavy_atoms, 5);
        assert_eq!(lig.num_hydrogens, 0);

        let root = &lig.frames[0];
        assert_eq!((root.ha_begin, root.ha_end), (0, 2));
        let branch = &lig.frames[1];
        assert_eq!((branch.ha_begin, branch.ha_end), (2, 5));
        assert_eq!(branch.parent, 0);
        assert_eq!(branch.rotor_x_idx, 0);
        assert_eq!(branch.rotor_y_idx, 2);
        assert!(branch.active);

        assert_relative_eq!(branch.yy[2], 1.5, epsilon = 1e-12);
        assert_relative_eq!(branch.xy[2], 1.0, epsilon = 1e-12);

        assert_relative_eq!(
            lig.flexibility_penalty_factor,
            1.0 / (1.0 + 0.05846),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_frame_local_coordinates() {
        let lig = parse(&torsion_ligand_text()).expect("fixture parses");
        // Root origin is atom 0, branch origin is atom 2 (its rotor Y).
        assert_relative_eq!(lig.heavy_atoms[0].coordinate.norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(lig.heavy_atoms[2].coordinate.norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(
            (lig.heavy_atoms[4].coordinate - Vector3::new(2.0, 0.0, -1.1)).norm(),
            0.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_interacting_pairs_exclude_near_bonds() {
        let lig = parse(&torsion_ligand_text()).expect("fixture parses");
        // Of the six cross-frame pairs, rotor exclusions remove everything
        // involving atoms 0 (rotor X) and 2 (rotor Y), and (1, 3) sits only
        // three bonds apart. Only (1, 4) survives.
        assert_eq!(lig.interacting_pairs.len(), 1);
        let p = lig.interacting_pairs[0];
        assert_eq!((p.i, p.j), (1, 4));
        assert_eq!(p.type_pair_index, mp(0, 0));
    }

    #[test]
    fn test_polar_hydrogen_marks_donor() {
        let text = [
            "ROOT".to_string(),
            atom_line(1, "C1", 0.0, 0.0, 0.0, "C"),
            atom_line(2, "O1", 0.0, 0.0, 1.4, "OA"),
            atom_line(3, "H1", 0.0, 0.6, 2.1, "HD"),
            "ENDROOT".to_string(),
            "TORSDOF 0".to_string(),
        ]
        .join("\n");
        let lig = parse(&text).expect("fixture parses");
        assert_eq!(lig.num_heavy_atoms, 2);
        assert_eq!(lig.num_hydrogens, 1);
        assert_eq!(lig.heavy_atoms[1].xs(), XsType::DonorAcceptorOxygen);
        // The carbon bonded to the hetero oxygen loses hydrophobicity.
        assert_eq!(lig.heavy_atoms[0].xs(), XsType::PolarCarbon);
    }

    #[test]
    fn test_terminal_single_atom_frame_is_inactive() {
        let text = [
            "ROOT".to_string(),
            atom_line(1, "C1", 0.0, 0.0, 0.0, "C"),
            "ENDROOT".to_string(),
            "BRANCH   1   2".to_string(),
            atom_line(2, "O1", 0.0, 0.0, 1.4, "OA"),
            atom_line(3, "H1", 0.0, 0.6, 2.0, "HD"),
            "ENDBRANCH   1   2".to_string(),
            "TORSDOF 1".to_string(),
        ]
        .join("\n");
        let lig = parse(&text).expect("fixture parses");
        assert_eq!(lig.num_torsions, 1);
        assert_eq!(lig.num_active_torsions, 0);
        assert!(!lig.frames[1].active);
        assert!(lig.heavy_atoms[1].is_donor());
        assert_relative_eq!(
            lig.flexibility_penalty_factor,
            1.0 / (1.0 + 0.05846 * 0.5),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_all_lines_retained_verbatim() {
        let text = format!(
            "REMARK  Name = example\n{}\n",
            torsion_ligand_text()
        );
        let lig = parse(&text).expect("fixture parses");
        assert_eq!(lig.lines.len(), 11);
        assert_eq!(lig.lines[0], "REMARK  Name = example");
    }

    #[test]
    fn test_empty_branch_is_rejected() {
        let text = [
            "ROOT".to_string(),
            atom_line(1, "C1", 0.0, 0.0, 0.0, "C"),
            "ENDROOT".to_string(),
            "BRANCH   1   2".to_string(),
            "ENDBRANCH   1   2".to_string(),
        ]
        .join("\n");
        assert!(matches!(parse(&text), Err(ParseError::EmptyBranch { .. })));
    }

    #[test]
    fn test_unsupported_atom_type_is_rejected() {
        let text = ["ROOT".to_string(), atom_line(1, "X1", 0.0, 0.0, 0.0, "XX")].join("\n");
        match parse(&text) {
            Err(ParseError::UnsupportedAtomType { line, ad, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(ad, "XX");
            }
            other => panic!("expected UnsupportedAtomType, got {other:?}"),
        }
    }

    #[test]
    fn test_unclosed_branch_is_rejected() {
        let text = [
            "ROOT".to_string(),
            atom_line(1, "C1", 0.0, 0.0, 0.0, "C"),
            "ENDROOT".to_string(),
            "BRANCH   1   2".to_string(),
            atom_line(2, "C2", 0.0, 0.0, 1.5, "C"),
        ]
        .join("\n");
        assert!(matches!(parse(&text), Err(ParseError::UnclosedBranch { .. })));
    }

    #[test]
    fn test_unmatched_endbranch_is_rejected() {
        let text = [
            "ROOT".to_string(),
            atom_line(1, "C1", 0.0, 0.0, 0.0, "C"),
            "ENDROOT".to_string(),
            "ENDBRANCH   1   2".to_string(),
        ]
        .join("\n");
        assert!(matches!(
            parse(&text),
            Err(ParseError::UnmatchedEndBranch { .. })
        ));
    }

    #[test]
    fn test_atom_after_closed_frame_is_rejected() {
        let text = [
            "ROOT".to_string(),
            atom_line(1, "C1", 0.0, 0.0, 0.0, "C"),
            "ENDROOT".to_string(),
            "BRANCH   1   2".to_string(),
            atom_line(2, "C2", 0.0, 0.0, 1.5, "C"),
            "ENDBRANCH   1   2".to_string(),
            atom_line(3, "C3", 0.0, 1.5, 0.0, "C"),
        ]
        .join("\n");
        assert!(matches!(
            parse(&text),
            Err(ParseError::AtomOutsideFrame { .. })
        ));
    }
}
