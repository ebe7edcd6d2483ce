//! Text output for the CLI frontend.
//!
//! Prints the capacitance table to stdout and writes cross-section dumps of
//! converged grids for plotting.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::capacitance::{CapacitanceMatrix, CapacitancePair, SolveObserver};
use crate::error::{CapError, Result};
use crate::geometry::{Axis, V3i};
use crate::mesh::{cross_section, CrossSection, Space};

/// Format `value` like C's `%.Ne`: signed exponent of at least two digits.
pub fn sci(value: f64, precision: usize) -> String {
    let s = format!("{:.*e}", precision, value);
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => s,
    }
}

/// The two report lines of one net pair.
pub fn format_pair(pair: &CapacitancePair) -> String {
    format!(
        "C{:02}{:02} {} {} {}\n* numerical error: +/- {} ({:5.0} %)\n",
        pair.first,
        pair.second,
        pair.first_name,
        pair.second_name,
        sci(pair.value, 6),
        sci(pair.error, 2),
        pair.error_percent()
    )
}

/// Write every pair of `matrix`.
pub fn write_table<W: Write>(out: &mut W, matrix: &CapacitanceMatrix) -> io::Result<()> {
    for pair in matrix.pairs() {
        out.write_all(format_pair(&pair).as_bytes())?;
    }
    out.flush()
}

/// Print the capacitance table to stdout.
pub fn print_table(matrix: &CapacitanceMatrix) -> Result<()> {
    let stdout = io::stdout();
    write_table(&mut stdout.lock(), matrix).map_err(|source| CapError::OutputError {
        path: "<stdout>".to_string(),
        source,
    })
}

/// Write one cross-section in gnuplot's grid format.
pub fn write_section<W: Write>(out: &mut W, section: &CrossSection) -> io::Result<()> {
    let (u, v) = section.axis.tangents();
    let p = section.probe;
    writeln!(out, "# Cross-section at ({}, {}, {})", p.x, p.y, p.z)?;
    writeln!(out, "# {} {} field potential material constant", u.name(), v.name())?;
    for row in &section.rows {
        for s in row {
            writeln!(
                out,
                "{} {} {} {} {} {}",
                s.u,
                s.v,
                sci(s.field, 6),
                sci(s.potential, 6),
                sci(s.material, 6),
                u8::from(s.fixed)
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn dump_section(space: &Space, axis: Axis, probe: V3i, path: &Path) -> Result<()> {
    let output_err = |source| CapError::OutputError {
        path: path.display().to_string(),
        source,
    };
    let section = cross_section(space, axis, probe)?;
    debug!(file = %path.display(), probe = %probe, "writing cross-section");
    let mut out = BufWriter::new(File::create(path).map_err(output_err)?);
    write_section(&mut out, &section).map_err(output_err)?;
    out.flush().map_err(output_err)
}

/// Dump the X and Y sections through the grid centre and a Z section at
/// mid-height of every layer into `dir`.
///
/// Files are named `<net>-x.dat`, `<net>-y.dat` and `<net>-<layer>.dat`.
pub fn dump_space(space: &Space, dir: &Path, net: &str) -> Result<Vec<PathBuf>> {
    let centre = space.pos() + V3i::new(space.size().x / 2, space.size().y / 2, space.size().z / 2);

    let mut written = Vec::new();
    for axis in [Axis::X, Axis::Y] {
        let path = dir.join(format!("{}-{}.dat", net, axis.name()));
        dump_section(space, axis, centre, &path)?;
        written.push(path);
    }
    for layer in space.layers() {
        let mut probe = centre;
        probe.z = space.pos().z + layer.z + layer.height / 2;
        let path = dir.join(format!("{}-{}.dat", net, layer.name));
        dump_section(space, Axis::Z, probe, &path)?;
        written.push(path);
    }
    Ok(written)
}

/// Observer used by the binary: logs progress and optionally dumps each
/// converged grid.
#[derive(Debug, Default)]
pub struct CliObserver {
    dump_dir: Option<PathBuf>,
}

impl CliObserver {
    pub fn new(dump_dir: Option<PathBuf>) -> Self {
        Self { dump_dir }
    }
}

impl SolveObserver for CliObserver {
    fn on_batch(&mut self, net: &str, batch: usize, max_error: f64) {
        info!(net, batch, error = %format!("{:.2}%", max_error * 100.0), "relaxing");
    }

    fn on_converged(&mut self, net: &str, space: &Space) -> Result<()> {
        if let Some(dir) = &self.dump_dir {
            let files = dump_space(space, dir, net)?;
            info!(net, files = files.len(), "cross-sections written");
        }
        Ok(())
    }
}
