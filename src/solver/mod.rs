//! DC operating-point solver.
//!
//! The solver never assembles a matrix. Each floating node is solved on its
//! own with a bracketed scalar root finder, holding every other node fixed,
//! and the circuit is relaxed node by node until a full pass changes nothing:
//!
//! ```text
//! repeat (at most max_passes times)
//!     for node in circuit.nodes (fixed order)
//!         [a, b]  = feasible bracket from attached terminals
//!         V*      = root of Σ I(V) on [a, b]        (Brent)
//!         changed = |V* - V_prev| > tolerance
//!     until no node changed
//! ```
//!
//! Exceeding `max_passes` is reported as [`NonConvergence`](crate::MosdcError::NonConvergence)
//! rather than looping on.

mod analysis;
mod brent;
mod relaxation;

pub use analysis::{sweep_with, DcSweep, DeviceSample, NodeSample, OperatingPoint, SweepSample};
pub use brent::Brent;
pub use relaxation::{Relaxation, RelaxationReport, SolverConfig};

/// KCL residual tolerance (amps), also used for change detection (volts).
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Maximum relaxation passes per operating point.
pub const DEFAULT_MAX_PASSES: usize = 50;

/// Maximum Brent iterations per node solve.
pub const MAX_ROOT_ITERATIONS: usize = 100;

/// Absolute tolerance on a root's location (volts).
pub const ROOT_XTOL: f64 = 2e-12;
