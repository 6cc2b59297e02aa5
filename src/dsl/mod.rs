//! Parser for circuit descriptions.
//!
//! A small SPICE-style, line-oriented language describing MOS/resistor
//! circuits for the operating-point solver.
//!
//! # Grammar Overview
//!
//! ```text
//! circuit     = { line }
//! line        = comment | directive | device | empty
//! comment     = ('#' | ';') { any_char }
//! directive   = '.' directive_name { argument }
//! device      = name node+ (value | model_ref)
//!
//! directive_name = "model" | "fixed" | "sweep" | "options"
//! name        = ('M' | 'R') { letter | digit | '_' }
//! node        = identifier | "0" | "GND"
//! value       = number [unit_suffix]
//!
//! number      = ['-'] digit+ ['.' digit+] [('e'|'E') ['-'|'+'] digit+]
//! unit_suffix = 'p' | 'n' | 'u' | 'm' | 'k' | 'M' | 'G'
//! ```
//!
//! # Devices
//!
//! | Type | Description | Syntax |
//! |------|-------------|--------|
//! | M | MOSFET | `M<name> <drain> <gate> <source> <model>` |
//! | R | Resistor | `R<name> <hi> <lo> <ohms>` |
//!
//! The models `NMOS` and `PMOS` are built in and need no `.model` line.
//!
//! # Directives
//!
//! | Directive | Description | Syntax |
//! |-----------|-------------|--------|
//! | .model | MOS parameters | `.model <name> NMOS\|PMOS (l= w= mu= cox= lambda= vth=)` |
//! | .fixed | Driven node | `.fixed <node> <volts>` |
//! | .sweep | Step a driven node | `.sweep <node> <start> <stop> <points>` |
//! | .options | Solver settings | `.options max_passes=<n> tol=<volts>` |
//!
//! Every node that is not fixed is floating and gets solved. Ground (`0` or
//! `GND`) is always fixed at 0 V.
//!
//! # Example
//!
//! ```text
//! # Common-source amplifier
//! .fixed vdd 5
//! .fixed in 1.2
//!
//! R1 vdd out 2.5k
//! M1 out in 0 NMOS
//! ```

mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use lexer::{parse_value, Lexer, Token, TokenKind};
pub use parser::Parser;

use crate::error::Result;

/// Parse a circuit description into an AST.
pub fn parse(input: &str) -> Result<CircuitAst> {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer)?;
    parser.parse()
}

/// Parse a circuit description file.
#[cfg(feature = "cli")]
pub fn parse_file(path: &std::path::Path) -> Result<CircuitAst> {
    let content = std::fs::read_to_string(path).map_err(|e| crate::error::MosdcError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_netlists_parse() {
        for src in [
            include_str!("../../demos/inverter.cir"),
            include_str!("../../demos/common_source.cir"),
            include_str!("../../demos/current_mirror.cir"),
            include_str!("../../demos/diff_pair.cir"),
        ] {
            let ast = parse(src).unwrap();
            assert!(!ast.devices.is_empty());
            assert!(!ast.fixed.is_empty());
        }
    }
}
