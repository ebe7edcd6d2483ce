//! Per-net field solves and the extraction loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::envelope::net_faces;
use super::flux::flux_sum;
use super::results::CapacitanceMatrix;
use crate::design::{Design, NetId, ObjectId};
use crate::error::{CapError, Result};
use crate::geometry::{GrowKernel, Object, V2i};
use crate::mesh::Space;
use crate::solver::Sor;
use crate::{DEFAULT_BATCH_ITERATIONS, DEFAULT_MAX_ERROR, DEFAULT_STANDOFF, PROBE_STANDOFF};

/// Parameters of an extraction run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionConfig {
    /// Distance in cells between a drive net and the edge of its grid
    pub standoff: i32,
    /// SOR sweeps between two flux evaluations
    pub batch_iterations: usize,
    /// SOR relaxation factor
    pub omega: f64,
    /// Largest relative flux change at which a net counts as converged
    pub max_error: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            standoff: DEFAULT_STANDOFF,
            batch_iterations: DEFAULT_BATCH_ITERATIONS,
            omega: crate::solver::DEFAULT_OMEGA,
            max_error: DEFAULT_MAX_ERROR,
        }
    }
}

impl ExtractionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the grid margin around the drive net.
    ///
    /// Larger margins capture more fringe field at the cost of a bigger
    /// grid.
    pub fn with_standoff(mut self, standoff: i32) -> Self {
        self.standoff = standoff;
        self
    }

    pub fn with_batch_iterations(mut self, iterations: usize) -> Self {
        self.batch_iterations = iterations;
        self
    }

    /// Set the SOR relaxation factor, in `[0, 2]`.
    pub fn with_omega(mut self, omega: f64) -> Self {
        self.omega = omega;
        self
    }

    /// Set the convergence threshold as a fraction (0.01 is 1%).
    pub fn with_max_error(mut self, max_error: f64) -> Self {
        self.max_error = max_error;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.standoff <= 0 {
            return Err(CapError::solver_param(format!(
                "standoff must be positive, got {}",
                self.standoff
            )));
        }
        if self.batch_iterations == 0 {
            return Err(CapError::solver_param("iterations per batch must be positive"));
        }
        if !(self.max_error > 0.0) {
            return Err(CapError::solver_param(format!(
                "maximum error must be positive, got {}",
                self.max_error
            )));
        }
        Sor::new(self.omega).map(|_| ())
    }
}

/// Shared flag asking a run to stop after the current net.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress hooks of an extraction run.
pub trait SolveObserver {
    /// Called after each batch of sweeps with the largest relative flux
    /// change of the batch (`-1` if every flux was zero).
    fn on_batch(&mut self, _net: &str, _batch: usize, _max_error: f64) {}

    /// Called with the converged grid before it is released.
    fn on_converged(&mut self, _net: &str, _space: &Space) -> Result<()> {
        Ok(())
    }
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl SolveObserver for Silent {}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every row of the matrix is filled
    Complete,
    /// Stopped early through the cancel token
    Interrupted,
}

/// Capacitance extraction over a design.
pub struct Extraction<'d> {
    design: &'d mut Design,
    config: ExtractionConfig,
    sor: Sor,
}

impl<'d> Extraction<'d> {
    pub fn new(design: &'d mut Design, config: ExtractionConfig) -> Result<Self> {
        config.validate()?;
        let sor = Sor::new(config.omega)?;
        Ok(Self { design, config, sor })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// An empty matrix for the design's nets.
    pub fn matrix(&self) -> CapacitanceMatrix {
        CapacitanceMatrix::new(self.design.net_names())
    }

    /// Flux through every net's probe surface with `drive` at 1 V and all
    /// other nets at 0 V.
    ///
    /// The grid covers the drive net grown by the standoff. Sweeps run in
    /// batches until no flux changes by more than the configured fraction
    /// between two batches.
    pub fn solve_net(
        &mut self,
        drive: NetId,
        observer: &mut dyn SolveObserver,
    ) -> Result<Vec<f64>> {
        let config = self.config.clone();
        let Design {
            materials,
            objects,
            nets,
            space,
        } = &mut *self.design;

        let net = nets.get(drive.0).ok_or_else(|| {
            CapError::solver_param(format!("no net {} in a design of {} nets", drive, nets.len()))
        })?;
        if net.objects.is_empty() {
            return Err(CapError::EmptyNet {
                net: net.name.clone(),
            });
        }

        for (k, other) in nets.iter().enumerate() {
            let value = if k == drive.0 { 1.0 } else { 0.0 };
            for id in &other.objects {
                let object = object_mut(objects, id.0, &other.name)?;
                object.value = value;
                object.constant = true;
            }
        }

        info!(net = %net.name, standoff = config.standoff, "evaluating net");

        for id in &net.objects {
            object_mut(objects, id.0, &net.name)?.load()?;
        }
        let members = net
            .objects
            .iter()
            .map(|id| {
                objects.get(id.0).ok_or_else(|| CapError::UnknownObject {
                    object: id.to_string(),
                    owner: net.name.clone(),
                })
            })
            .collect::<Result<Vec<&Object>>>()?;
        let mut region = Object::composite(&format!("{}-region", net.name), members)?
            .ok_or_else(|| CapError::EmptyNet {
                net: net.name.clone(),
            })?;
        region.grow(config.standoff, GrowKernel::Round)?;

        space.load(region.pos(), region.size() + V2i::new(1, 1), materials)?;

        region.constant = false;
        region.value = 0.0;
        region.material = None;
        for layer in 0..space.layers().len() {
            space.stamp_object(&region, layer, materials)?;
        }

        info!(size = %space.size(), pos = %space.pos(), "grid ready");

        space.stamp_all_objects(objects, materials)?;
        space.apply_border(0.0)?;
        space.optimize();
        debug!(bytes = space.allocated_bytes(), "grid memory");

        let mut row = vec![0.0; nets.len()];
        let mut batch = 0;
        loop {
            self.sor.relax(space, config.batch_iterations)?;
            batch += 1;

            let mut max_error = -1.0f64;
            for (k, probe) in nets.iter().enumerate() {
                let faces = net_faces(space, probe, objects, PROBE_STANDOFF)?;
                let q = flux_sum(space, &faces)?;
                if q != 0.0 {
                    max_error = max_error.max(((row[k] - q) / q).abs());
                }
                row[k] = q;
            }

            debug!(net = %net.name, batch, max_error, "batch done");
            observer.on_batch(&net.name, batch, max_error);
            if max_error < config.max_error {
                break;
            }
        }

        info!(
            net = %net.name,
            iterations = batch * config.batch_iterations,
            "net converged"
        );
        observer.on_converged(&net.name, space)?;

        space.unload();
        objects.iter_mut().for_each(Object::unload);
        Ok(row)
    }

    /// Fill every missing row of `matrix`.
    ///
    /// Rows already present, for instance from a restored state, are kept.
    /// The cancel token is checked after each net; a cancelled run returns
    /// [`RunOutcome::Interrupted`] with the rows finished so far.
    pub fn run(
        &mut self,
        matrix: &mut CapacitanceMatrix,
        cancel: &CancelToken,
        observer: &mut dyn SolveObserver,
    ) -> Result<RunOutcome> {
        let names = self.design.net_names();
        if matrix.net_names() != names.as_slice() {
            return Err(CapError::StateMismatch {
                message: format!(
                    "matrix nets {:?}, design nets {:?}",
                    matrix.net_names(),
                    names
                ),
            });
        }

        for k in 0..names.len() {
            if matrix.has_row(k) {
                info!(net = %names[k], "already evaluated, skipped");
            } else {
                let row = self.solve_net(NetId(k), observer)?;
                matrix.set_row(k, row)?;
            }
            if cancel.is_cancelled() {
                warn!(
                    completed = matrix.completed(),
                    total = matrix.len(),
                    "interrupted"
                );
                return Ok(RunOutcome::Interrupted);
            }
        }
        Ok(RunOutcome::Complete)
    }
}

fn object_mut<'o>(objects: &'o mut [Object], index: usize, owner: &str) -> Result<&'o mut Object> {
    objects.get_mut(index).ok_or_else(|| CapError::UnknownObject {
        object: ObjectId(index).to_string(),
        owner: owner.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let c = ExtractionConfig::new()
            .with_standoff(8)
            .with_batch_iterations(20)
            .with_omega(1.7)
            .with_max_error(0.02);
        assert_eq!(c.standoff, 8);
        assert_eq!(c.batch_iterations, 20);
        assert_eq!(c.omega, 1.7);
        assert_eq!(c.max_error, 0.02);
        assert!(c.validate().is_ok());

        let d = ExtractionConfig::default();
        assert_eq!(d.standoff, 50);
        assert_eq!(d.batch_iterations, 100);
        assert_eq!(d.omega, 1.0);
        assert_eq!(d.max_error, 0.10);
    }

    #[test]
    fn test_config_validation() {
        let base = ExtractionConfig::default();
        for bad in [
            base.clone().with_standoff(0),
            base.clone().with_batch_iterations(0),
            base.clone().with_omega(2.5),
            base.clone().with_max_error(0.0),
            base.clone().with_max_error(f64::NAN),
        ] {
            assert!(matches!(bad.validate(), Err(CapError::InvalidSolverParam { .. })));
        }
    }

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let handle = token.clone();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }
}
