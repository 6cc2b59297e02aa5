//! mosdc - DC operating points of MOS/resistor circuits
//!
//! # Usage
//!
//! ```bash
//! mosdc demos/inverter.cir
//! RUST_LOG=debug mosdc demos/common_source.cir --csv > transfer.csv
//! ```

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use log::info;
use mosdc_core::{
    circuit::{validate_circuit, Circuit},
    dsl::{self, CircuitAst},
    error::{MosdcError, Result},
    report::{self, Format},
    solver::{DcSweep, OperatingPoint, Relaxation, SolverConfig},
};

/// DC operating-point solver for MOS/resistor circuits
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the circuit description file
    #[arg(value_name = "CIRCUIT_FILE")]
    circuit_file: PathBuf,

    /// Maximum relaxation passes (overrides `.options max_passes`)
    #[arg(long)]
    max_passes: Option<usize>,

    /// Convergence tolerance in volts (overrides `.options tol`)
    #[arg(long)]
    tolerance: Option<f64>,

    /// Write CSV instead of a table
    #[arg(long)]
    csv: bool,
}

/// Defaults, then `.options` from the file, then command-line flags.
fn solver_config(ast: &CircuitAst, args: &Args) -> Result<SolverConfig> {
    let mut config = SolverConfig::default();

    if let Some(&passes) = ast.options.get("max_passes") {
        if passes < 1.0 || passes.fract() != 0.0 {
            return Err(MosdcError::InvalidParameter {
                message: format!("max_passes must be a positive integer, got {}", passes),
            });
        }
        config = config.with_max_passes(passes as usize);
    }
    if let Some(&tol) = ast.options.get("tol").or_else(|| ast.options.get("tolerance")) {
        config = config.with_tolerance(tol);
    }

    if let Some(passes) = args.max_passes {
        config = config.with_max_passes(passes);
    }
    if let Some(tol) = args.tolerance {
        config = config.with_tolerance(tol);
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // Parse the circuit file
    let ast = dsl::parse_file(&args.circuit_file)?;
    let config = solver_config(&ast, &args)?;

    // Build and validate
    let mut circuit = Circuit::from_ast(&ast)?;
    validate_circuit(&circuit)?;
    info!(
        "{}: {} devices, {} floating nodes",
        args.circuit_file.display(),
        circuit.devices.len(),
        circuit.num_nodes()
    );

    let relaxation = Relaxation::with_config(config);
    let format = if args.csv { Format::Csv } else { Format::Table };
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &ast.sweep {
        Some(def) => {
            let sweep = DcSweep::new(&def.node, def.start, def.stop, def.points)?;
            let samples = sweep.run(&mut circuit, &relaxation)?;
            report::write_sweep(&mut out, &sweep.target, &samples, format)?;
        }
        None => {
            let result = relaxation.solve(&mut circuit)?;
            let op = OperatingPoint::capture(&mut circuit, result.passes)?;
            report::write_operating_point(&mut out, &op, format)?;
        }
    }

    out.flush().map_err(|e| MosdcError::OutputError {
        message: e.to_string(),
    })
}
