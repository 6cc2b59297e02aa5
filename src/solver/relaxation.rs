//! Gauss-Seidel relaxation across coupled floating nodes.

use log::{debug, warn};

use super::{DEFAULT_MAX_PASSES, DEFAULT_TOLERANCE, MAX_ROOT_ITERATIONS, ROOT_XTOL};
use crate::circuit::{Circuit, NodeSolution};
use crate::error::{MosdcError, Result};

/// Configuration for the solver.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Residual tolerance for endpoint roots and voltage tolerance for change
    /// detection.
    pub tolerance: f64,
    /// Maximum relaxation passes before giving up.
    pub max_passes: usize,
    /// Maximum Brent iterations per node solve.
    pub max_root_iterations: usize,
    /// Absolute root location tolerance for Brent's method.
    pub root_xtol: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_passes: DEFAULT_MAX_PASSES,
            max_root_iterations: MAX_ROOT_ITERATIONS,
            root_xtol: ROOT_XTOL,
        }
    }
}

impl SolverConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum relaxation passes.
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Set the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Reject settings that can never converge.
    pub fn validate(&self) -> Result<()> {
        if self.max_passes == 0 {
            return Err(MosdcError::InvalidParameter {
                message: "max_passes must be at least 1".to_string(),
            });
        }
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(MosdcError::InvalidParameter {
                message: format!("tolerance must be positive and finite, got {}", self.tolerance),
            });
        }
        if !(self.root_xtol > 0.0 && self.root_xtol.is_finite()) {
            return Err(MosdcError::InvalidParameter {
                message: format!("root_xtol must be positive and finite, got {}", self.root_xtol),
            });
        }
        if self.max_root_iterations == 0 {
            return Err(MosdcError::InvalidParameter {
                message: "max_root_iterations must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Summary of a converged relaxation run.
#[derive(Debug, Clone)]
pub struct RelaxationReport {
    /// Passes run, including the final quiet pass
    pub passes: usize,
    /// Node solutions from the final pass, in solve order
    pub solutions: Vec<NodeSolution>,
}

/// Relaxation driver.
#[derive(Debug, Clone, Default)]
pub struct Relaxation {
    pub config: SolverConfig,
}

impl Relaxation {
    /// Create a driver with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a driver with custom configuration.
    pub fn with_config(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Relax the circuit to a joint fixed point.
    ///
    /// Nodes keep their previous voltages between calls, so call
    /// [`Circuit::reset`] before solving a new sample. When no node has been
    /// solved since construction or the last reset, every node is first
    /// seeded with [`Circuit::seed`].
    pub fn solve(&self, circuit: &mut Circuit) -> Result<RelaxationReport> {
        self.config.validate()?;
        if circuit.nodes().iter().all(|n| n.is_unsolved()) {
            circuit.seed()?;
        }

        let mut last: Vec<NodeSolution> = Vec::new();

        for pass in 1..=self.config.max_passes {
            let mut solutions = Vec::with_capacity(circuit.num_nodes());
            for id in circuit.node_ids() {
                solutions.push(circuit.solve_node_with(id, &self.config)?);
            }

            let changed = solutions.iter().filter(|s| s.changed).count();
            debug!("pass {}: {} of {} nodes changed", pass, changed, solutions.len());

            if changed == 0 {
                return Ok(RelaxationReport {
                    passes: pass,
                    solutions,
                });
            }
            last = solutions;
        }

        let changes: Vec<(String, f64)> = last
            .iter()
            .map(|s| (circuit.node(s.node).name.clone(), s.delta))
            .collect();
        warn!(
            "relaxation gave up after {} passes: {:?}",
            self.config.max_passes, changes
        );
        Err(MosdcError::non_convergence(self.config.max_passes, changes))
    }
}
