//! Output of docked conformations as a PDBQT model list.
//!
//! Each result becomes one `MODEL` block: an affinity `REMARK`, then the
//! ligand's verbatim input lines with only the coordinate columns (31-54)
//! of `ATOM`/`HETATM` records rewritten, then `ENDMDL`. Hydrogens are
//! recognized by the `H` in the type column and drawn from the hydrogen
//! array, so the original interleaving of the file is preserved.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::ligand::Ligand;
use crate::optimization::DockingResult;

/// Writes up to `max_models` results, ordered as given (the result
/// container orders by increasing energy), to a PDBQT file.
pub fn write_models<P: AsRef<Path>>(
    path: P,
    lig: &Ligand,
    results: &[DockingResult],
    max_models: usize,
) -> io::Result<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    write_models_to(&mut out, lig, results, max_models)?;
    out.flush()
}

/// Writer-generic variant of [`write_models`].
///
/// The reported affinity of conformation `i` is
/// `(e_i - (e_best - f_best)) * flexibility_penalty_factor`: the
/// conformation energy rebased by the best pose's intra-molecular
/// contribution, scaled by the ligand flexibility penalty.
pub fn write_models_to<W: Write>(
    out: &mut W,
    lig: &Ligand,
    results: &[DockingResult],
    max_models: usize,
) -> io::Result<()> {
    let num_models = max_models.min(results.len());
    if num_models == 0 {
        return Ok(());
    }
    let best_intra = results[0].e - results[0].f;

    for (m, r) in results[..num_models].iter().enumerate() {
        let affinity = (r.e - best_intra) * lig.flexibility_penalty_factor;
        writeln!(out, "MODEL     {:4}", m + 1)?;
        writeln!(out, "REMARK     PREDICTED FREE ENERGY:{affinity:8.3} KCAL/MOL")?;

        let mut heavy = 0;
        let mut hydrogen = 0;
        for line in &lig.lines {
            if line.starts_with("ATOM") || line.starts_with("HETATM") {
                // The parser admitted this record, so the line reaches the
                // type column and the coordinate columns are well-formed.
                let coordinate = if line.as_bytes()[77] == b'H' {
                    let c = r.hydrogens[hydrogen];
                    hydrogen += 1;
                    c
                } else {
                    let c = r.heavy_atoms[heavy];
                    heavy += 1;
                    c
                };
                writeln!(
                    out,
                    "{}{:8.3}{:8.3}{:8.3}{}",
                    &line[..30],
                    coordinate[0],
                    coordinate[1],
                    coordinate[2],
                    &line[54..]
                )?;
            } else {
                writeln!(out, "{line}")?;
            }
        }
        writeln!(out, "ENDMDL")?;
    }
    Ok(())
}
