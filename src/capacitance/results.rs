//! Capacitance matrix and restart state.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CapError, Result};

/// Flux matrix, one row per drive net.
///
/// Row `n` holds the flux through the probe surface of every net while net
/// `n` sits at 1 V. Rows are filled one solve at a time, so a partially
/// computed matrix is a valid restart state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacitanceMatrix {
    nets: Vec<String>,
    rows: Vec<Option<Vec<f64>>>,
}

/// Symmetrised capacitance between two nets.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacitancePair {
    pub first: usize,
    pub second: usize,
    pub first_name: String,
    pub second_name: String,
    /// Mean of both directions in farads
    pub value: f64,
    /// Half the disagreement between both directions
    pub error: f64,
}

impl CapacitancePair {
    /// Numerical error as a percentage of the value, 0 for a zero value.
    pub fn error_percent(&self) -> f64 {
        if self.value == 0.0 {
            return 0.0;
        }
        self.error / self.value * 100.0
    }
}

impl CapacitanceMatrix {
    pub fn new(nets: Vec<String>) -> Self {
        let rows = vec![None; nets.len()];
        Self { nets, rows }
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    pub fn net_names(&self) -> &[String] {
        &self.nets
    }

    pub fn row(&self, drive: usize) -> Option<&[f64]> {
        self.rows.get(drive).and_then(|r| r.as_deref())
    }

    pub fn has_row(&self, drive: usize) -> bool {
        self.row(drive).is_some()
    }

    /// Store the fluxes measured with `drive` at 1 V.
    pub fn set_row(&mut self, drive: usize, values: Vec<f64>) -> Result<()> {
        if values.len() != self.len() || drive >= self.len() {
            return Err(CapError::StateMismatch {
                message: format!(
                    "row {} with {} values for {} nets",
                    drive,
                    values.len(),
                    self.len()
                ),
            });
        }
        self.rows[drive] = Some(values);
        Ok(())
    }

    pub fn completed(&self) -> usize {
        self.rows.iter().filter(|r| r.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.completed() == self.len()
    }

    pub fn get(&self, drive: usize, probe: usize) -> Option<f64> {
        self.row(drive).and_then(|r| r.get(probe).copied())
    }

    /// Every pair `n < m` for which both directions are known.
    pub fn pairs(&self) -> Vec<CapacitancePair> {
        let mut pairs = Vec::new();
        for n in 0..self.len() {
            for m in n + 1..self.len() {
                let (Some(nm), Some(mn)) = (self.get(n, m), self.get(m, n)) else {
                    continue;
                };
                let value = (nm + mn) / 2.0;
                pairs.push(CapacitancePair {
                    first: n,
                    second: m,
                    first_name: self.nets[n].clone(),
                    second_name: self.nets[m].clone(),
                    value,
                    error: (nm - value).abs(),
                });
            }
        }
        pairs
    }

    /// Write the matrix as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let state_err = |source| CapError::StateError {
            path: path.display().to_string(),
            source,
        };
        let file = File::create(path).map_err(state_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|source| CapError::StateFormat {
            path: path.display().to_string(),
            source,
        })?;
        writer.flush().map_err(state_err)
    }

    /// Read a matrix saved by [`save`](Self::save) and check that it was
    /// computed for the nets `nets`, in that order.
    pub fn restore(path: &Path, nets: &[String]) -> Result<Self> {
        let file = File::open(path).map_err(|source| CapError::StateError {
            path: path.display().to_string(),
            source,
        })?;
        let matrix: CapacitanceMatrix =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| {
                CapError::StateFormat {
                    path: path.display().to_string(),
                    source,
                }
            })?;

        if matrix.nets != nets {
            return Err(CapError::StateMismatch {
                message: format!("saved nets {:?}, configured nets {:?}", matrix.nets, nets),
            });
        }
        if matrix.rows.len() != nets.len()
            || matrix.rows.iter().flatten().any(|r| r.len() != nets.len())
        {
            return Err(CapError::StateMismatch {
                message: "row count does not match net count".to_string(),
            });
        }
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn names(n: &[&str]) -> Vec<String> {
        n.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pairs_symmetrise() {
        let mut m = CapacitanceMatrix::new(names(&["a", "b", "c"]));
        m.set_row(0, vec![-3.0, 1.0, 2.0]).unwrap();
        m.set_row(1, vec![1.2, -3.0, 0.5]).unwrap();
        assert!(!m.is_complete());

        let pairs = m.pairs();
        assert_eq!(pairs.len(), 1);
        let p = &pairs[0];
        assert_eq!((p.first, p.second), (0, 1));
        assert_eq!((p.first_name.as_str(), p.second_name.as_str()), ("a", "b"));
        assert_relative_eq!(p.value, 1.1, epsilon = 1e-12);
        assert_relative_eq!(p.error, 0.1, epsilon = 1e-12);
        assert_relative_eq!(p.error_percent(), 100.0 / 11.0, epsilon = 1e-9);

        m.set_row(2, vec![2.0, 0.5, -1.0]).unwrap();
        assert!(m.is_complete());
        assert_eq!(m.pairs().len(), 3);
    }

    #[test]
    fn test_zero_pair_has_no_error_percent() {
        let mut m = CapacitanceMatrix::new(names(&["a", "b"]));
        m.set_row(0, vec![-1.0, 0.0]).unwrap();
        m.set_row(1, vec![0.0, -1.0]).unwrap();
        let p = &m.pairs()[0];
        assert_eq!(p.value, 0.0);
        assert_eq!(p.error_percent(), 0.0);

        // opposite directions cancel to a zero mean with a nonzero spread
        m.set_row(1, vec![2.0e-12, -1.0]).unwrap();
        m.set_row(0, vec![-1.0, -2.0e-12]).unwrap();
        let p = &m.pairs()[0];
        assert_eq!(p.value, 0.0);
        assert!(p.error > 0.0);
        assert_eq!(p.error_percent(), 0.0);
    }

    #[test]
    fn test_row_length_checked() {
        let mut m = CapacitanceMatrix::new(names(&["a", "b"]));
        assert!(matches!(m.set_row(0, vec![1.0]), Err(CapError::StateMismatch { .. })));
        assert!(m.set_row(2, vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_save_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut m = CapacitanceMatrix::new(names(&["gnd", "sig"]));
        m.set_row(1, vec![1.5e-12, -2.5e-12]).unwrap();
        m.save(&path).unwrap();

        let back = CapacitanceMatrix::restore(&path, &names(&["gnd", "sig"])).unwrap();
        assert_eq!(back, m);
        assert!(!back.has_row(0));
        assert_eq!(back.get(1, 0), Some(1.5e-12));
    }

    #[test]
    fn test_restore_rejects_other_nets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        CapacitanceMatrix::new(names(&["a", "b"])).save(&path).unwrap();

        let err = CapacitanceMatrix::restore(&path, &names(&["b", "a"])).unwrap_err();
        assert!(matches!(err, CapError::StateMismatch { .. }));
    }

    #[test]
    fn test_restore_reports_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            CapacitanceMatrix::restore(&missing, &[]),
            Err(CapError::StateError { .. })
        ));

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, "1.0e-12 a b").unwrap();
        assert!(matches!(
            CapacitanceMatrix::restore(&garbage, &[]),
            Err(CapError::StateFormat { .. })
        ));
    }
}
