//! Error types for the mosdc operating-point solver.
//!
//! This module provides a unified error type [`MosdcError`] that covers
//! all error conditions that can occur while parsing a circuit description,
//! wiring devices to nodes, and solving for the DC operating point.
//!
//! None of the solver errors are recovered internally: a circuit either
//! reaches a KCL fixed point or the caller gets an error describing why not.

use thiserror::Error;

/// Result type alias using [`MosdcError`].
pub type Result<T> = std::result::Result<T, MosdcError>;

/// Which ordering invariant a MOS device violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// nMOS drain fell below its source (Vds negative).
    NegativeVds,
    /// pMOS drain rose above its source (Vds positive).
    PositiveVds,
}

impl std::fmt::Display for Polarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarity::NegativeVds => write!(f, "Vds is negative"),
            Polarity::PositiveVds => write!(f, "Vds is positive"),
        }
    }
}

/// Unified error type for all mosdc operations.
#[derive(Error, Debug)]
pub enum MosdcError {
    // ============ Description Language Errors ============
    /// Error during lexical analysis
    #[error("Lexer error at line {line}, column {column}: {message}")]
    LexerError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Error during parsing
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Invalid device definition
    #[error("Invalid device '{name}' at line {line}: {message}")]
    InvalidDevice {
        name: String,
        line: usize,
        message: String,
    },

    /// Undefined model reference
    #[error("Undefined model '{model}' referenced by device '{device}'")]
    UndefinedModel { model: String, device: String },

    /// Duplicate device name
    #[error("Duplicate device name '{name}'")]
    DuplicateDevice { name: String },

    /// Duplicate model name
    #[error("Duplicate model name '{name}'")]
    DuplicateModel { name: String },

    // ============ Wiring Errors ============
    /// Node not found in circuit
    #[error("Node '{node}' not found in circuit")]
    NodeNotFound { node: String },

    /// A terminal role was used on a device that does not have it
    #[error("Device '{device}' has no {role} terminal")]
    InvalidConnection { device: String, role: String },

    /// Invalid circuit topology
    #[error("Invalid circuit topology: {message}")]
    InvalidTopology { message: String },

    /// Invalid solver or sweep parameter
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    // ============ Solver Errors ============
    /// A MOS terminal ordering invariant was violated
    #[error("{device}: {polarity}! (Vd = {vd:.6}, Vs = {vs:.6})")]
    DomainError {
        device: String,
        polarity: Polarity,
        vd: f64,
        vs: f64,
    },

    /// A node's wiring yields no usable voltage bracket
    #[error("Node '{node}' is underdetermined: {reason}")]
    Underdetermined { node: String, reason: String },

    /// The bracketed root finder failed on a node
    #[error(
        "Root finding failed on node '{node}' in [{a:.6}, {b:.6}] \
         (residuals {fa:.3e}, {fb:.3e}): {reason}"
    )]
    ConvergenceError {
        node: String,
        a: f64,
        b: f64,
        fa: f64,
        fb: f64,
        reason: String,
    },

    /// The relaxation driver ran out of passes
    #[error("Relaxation did not converge after {passes} passes (largest change: {max_change:.3e} V)")]
    NonConvergence {
        passes: usize,
        max_change: f64,
        /// Per-node voltage change during the last pass, in solve order
        changes: Vec<(String, f64)>,
    },

    // ============ I/O Errors ============
    /// Error reading circuit file
    #[error("Failed to read circuit file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error writing a report
    #[error("Output error: {message}")]
    OutputError { message: String },
}

impl MosdcError {
    /// Create a lexer error
    pub fn lexer(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::LexerError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Create an invalid device error
    pub fn invalid_device(name: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::InvalidDevice {
            name: name.into(),
            line,
            message: message.into(),
        }
    }

    /// Create an underdetermined-node error
    pub fn underdetermined(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Underdetermined {
            node: node.into(),
            reason: reason.into(),
        }
    }

    /// Create a non-convergence error from the last pass's per-node changes
    pub fn non_convergence(passes: usize, changes: Vec<(String, f64)>) -> Self {
        let max_change = changes
            .iter()
            .map(|(_, dv)| dv.abs())
            .fold(0.0f64, f64::max);
        Self::NonConvergence {
            passes,
            max_change,
            changes,
        }
    }
}
