//! # mosdc Core
//!
//! DC operating points of idealized MOS/resistor circuits.
//!
//! This library provides:
//! - A square-law nMOS/pMOS model and a linear resistor
//! - A per-node KCL solve: feasible bracket plus Brent's method
//! - Gauss-Seidel relaxation across coupled nodes, with a pass cap
//! - DC sweeps of driven nodes
//! - A SPICE-style description language for circuits
//!
//! ## Architecture
//!
//! - [`dsl`] - Parser for the circuit description language
//! - [`circuit`] - Device table, floating and driven nodes, validation
//! - [`components`] - Device models (MOSFET, resistor)
//! - [`solver`] - Root finding, relaxation and sweeps
//! - [`report`] - Table and CSV output (CLI only)
//!
//! ## Usage
//!
//! ```bash
//! mosdc demos/diff_pair.cir
//! ```
//!
//! ```no_run
//! use mosdc_core::{dsl, Circuit, Relaxation};
//!
//! let ast = dsl::parse(".fixed vdd 5\n.fixed in 1.2\nR1 vdd out 2.5k\nM1 out in 0 NMOS\n")?;
//! let mut circuit = Circuit::from_ast(&ast)?;
//! Relaxation::new().solve(&mut circuit)?;
//! println!("out = {:?}", circuit.node_voltage("out"));
//! # Ok::<(), mosdc_core::MosdcError>(())
//! ```
//!
//! ## Solution Method
//!
//! There is no matrix. Each floating node is solved alone, holding every
//! other node at its last voltage:
//!
//! 1. Bound the node voltage using the drain/source ordering of every
//!    attached MOS device and the orientation of every attached resistor
//! 2. Find the voltage where the signed sum of terminal currents vanishes
//! 3. Repeat over all nodes until a full pass moves none of them
//!
//! A circuit that has not settled after `max_passes` passes is reported as
//! [`MosdcError::NonConvergence`].

pub mod circuit;
pub mod components;
pub mod dsl;
pub mod error;
pub mod solver;

#[cfg(feature = "cli")]
pub mod report;

// Re-export main types for convenience
pub use circuit::Circuit;
pub use components::{Component, Region};
pub use error::{MosdcError, Result};
pub use solver::{Relaxation, SolverConfig};
