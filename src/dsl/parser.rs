//! Parser for the circuit description language.

use std::collections::{HashMap, HashSet};

use super::ast::*;
use super::lexer::{parse_value, Lexer, Token, TokenKind};
use crate::error::{MosdcError, Result};

/// Recognised `.options` keys.
const OPTION_KEYS: [&str; 3] = ["max_passes", "tol", "tolerance"];

/// Parser for circuit descriptions.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Create a new parser with the given lexer.
    pub fn new(mut lexer: Lexer<'a>) -> Result<Self> {
        let current = lexer.next_token()?;
        Ok(Self { lexer, current })
    }

    /// Parse the entire circuit description.
    pub fn parse(&mut self) -> Result<CircuitAst> {
        let mut ast = CircuitAst::new();
        let mut device_names = HashSet::new();

        while self.current.kind != TokenKind::Eof {
            match self.current.kind {
                TokenKind::Newline => {
                    self.advance()?;
                    continue;
                }
                TokenKind::Directive => self.parse_directive(&mut ast)?,
                TokenKind::Identifier => {
                    let device = self.parse_device()?;
                    if !device_names.insert(device.name.clone()) {
                        return Err(MosdcError::DuplicateDevice { name: device.name });
                    }
                    ast.devices.push(device);
                }
                _ => {
                    return Err(MosdcError::parse(
                        self.current.line,
                        format!("unexpected token: {:?}", self.current.text),
                    ));
                }
            }
            self.end_of_line()?;
        }

        if let Some(sweep) = &ast.sweep {
            if !ast.fixed.iter().any(|f| f.node == sweep.node) {
                return Err(MosdcError::parse(
                    sweep.line,
                    format!("sweep node '{}' is not declared with .fixed", sweep.node),
                ));
            }
        }

        Ok(ast)
    }

    fn advance(&mut self) -> Result<()> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn end_of_line(&mut self) -> Result<()> {
        match self.current.kind {
            TokenKind::Newline => self.advance(),
            TokenKind::Eof => Ok(()),
            _ => Err(MosdcError::parse(
                self.current.line,
                format!("unexpected trailing token: {:?}", self.current.text),
            )),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.current.kind == kind {
            let tok = self.current.clone();
            self.advance()?;
            Ok(tok)
        } else {
            Err(MosdcError::parse(
                self.current.line,
                format!("expected {:?}, got {:?}", kind, self.current.kind),
            ))
        }
    }

    /// A node name: an identifier, or a number token used as a name (`0`).
    fn expect_node(&mut self) -> Result<String> {
        match self.current.kind {
            TokenKind::Identifier | TokenKind::Number => {
                let text = self.current.text.clone();
                self.advance()?;
                Ok(normalize_node(text))
            }
            kind => Err(MosdcError::parse(
                self.current.line,
                format!("expected node name, got {:?}", kind),
            )),
        }
    }

    fn expect_value(&mut self) -> Result<f64> {
        let tok = self.expect(TokenKind::Number)?;
        parse_value(&tok.text)
            .ok_or_else(|| MosdcError::parse(tok.line, format!("invalid number: {}", tok.text)))
    }

    /// `key=value` pairs up to the end of the line or a closing paren.
    fn parse_assignments(&mut self) -> Result<HashMap<String, f64>> {
        let mut params = HashMap::new();
        while self.current.kind == TokenKind::Identifier {
            let key = self.expect(TokenKind::Identifier)?.text.to_lowercase();
            self.expect(TokenKind::Equals)?;
            let value = self.expect_value()?;
            params.insert(key, value);
        }
        Ok(params)
    }

    fn parse_directive(&mut self, ast: &mut CircuitAst) -> Result<()> {
        let directive = self.current.text.clone();
        let line = self.current.line;
        self.advance()?;

        match directive.to_lowercase().as_str() {
            ".model" => {
                let model = self.parse_model_def(line)?;
                if ast.models.contains_key(&model.name) {
                    return Err(MosdcError::DuplicateModel { name: model.name });
                }
                ast.models.insert(model.name.clone(), model);
            }
            ".fixed" => {
                let node = self.expect_node()?;
                let voltage = self.expect_value()?;
                if node == "0" && voltage != 0.0 {
                    return Err(MosdcError::parse(line, "ground is fixed at 0 V"));
                }
                if ast.fixed.iter().any(|f| f.node == node) {
                    return Err(MosdcError::parse(line, format!("node '{}' is already fixed", node)));
                }
                ast.fixed.push(FixedDef { node, voltage, line });
            }
            ".sweep" => {
                if ast.sweep.is_some() {
                    return Err(MosdcError::parse(line, "only one .sweep is allowed"));
                }
                let node = self.expect_node()?;
                let start = self.expect_value()?;
                let stop = self.expect_value()?;
                let points = self.expect_value()?;
                if points < 1.0 || points.fract() != 0.0 {
                    return Err(MosdcError::parse(
                        line,
                        format!("sweep points must be a positive integer, got {}", points),
                    ));
                }
                ast.sweep = Some(SweepDef {
                    node,
                    start,
                    stop,
                    points: points as usize,
                    line,
                });
            }
            ".options" => {
                for (key, value) in self.parse_assignments()? {
                    if !OPTION_KEYS.contains(&key.as_str()) {
                        return Err(MosdcError::parse(line, format!("unknown option: {}", key)));
                    }
                    ast.options.insert(key, value);
                }
            }
            _ => {
                return Err(MosdcError::parse(
                    line,
                    format!("unknown directive: {}", directive),
                ));
            }
        }

        Ok(())
    }

    fn parse_model_def(&mut self, line: usize) -> Result<ModelDef> {
        let name = self.expect(TokenKind::Identifier)?.text;
        let type_str = self.expect(TokenKind::Identifier)?.text;

        let model_type = ModelType::from_str(&type_str)
            .ok_or_else(|| MosdcError::parse(line, format!("unknown model type: {}", type_str)))?;

        let params = if self.current.kind == TokenKind::OpenParen {
            self.advance()?;
            let params = self.parse_assignments()?;
            self.expect(TokenKind::CloseParen)?;
            params
        } else {
            self.parse_assignments()?
        };

        Ok(ModelDef {
            name,
            model_type,
            params,
            line,
        })
    }

    fn parse_device(&mut self) -> Result<DeviceDef> {
        let name = self.current.text.clone();
        let line = self.current.line;
        self.advance()?;

        let first = name.chars().next().unwrap_or('?');
        let device_type = DeviceType::from_prefix(first).ok_or_else(|| {
            MosdcError::invalid_device(&name, line, "unknown device type (expected M or R)")
        })?;

        let expected = device_type.expected_node_count();
        let mut nodes = Vec::with_capacity(expected);
        while nodes.len() < expected {
            if matches!(self.current.kind, TokenKind::Newline | TokenKind::Eof) {
                return Err(MosdcError::invalid_device(
                    &name,
                    line,
                    format!("expected {} nodes, got {}", expected, nodes.len()),
                ));
            }
            nodes.push(self.expect_node()?);
        }

        let (value, model_ref) = match device_type {
            DeviceType::Mosfet => {
                let model = self.expect(TokenKind::Identifier).map_err(|_| {
                    MosdcError::invalid_device(&name, line, "MOSFET requires a model name")
                })?;
                (None, Some(model.text))
            }
            DeviceType::Resistor => {
                let value = self.expect_value().map_err(|_| {
                    MosdcError::invalid_device(&name, line, "resistor requires a resistance")
                })?;
                (Some(value), None)
            }
        };

        Ok(DeviceDef {
            device_type,
            name,
            nodes,
            value,
            model_ref,
            line,
        })
    }
}

/// Ground aliases all map to `0`.
fn normalize_node(name: String) -> String {
    if name == "0" || name.eq_ignore_ascii_case("gnd") {
        "0".to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;

    #[test]
    fn test_parse_resistor() {
        let ast = parse("R1 vdd out 2.5k").unwrap();
        assert_eq!(ast.devices.len(), 1);
        assert_eq!(ast.devices[0].device_type, DeviceType::Resistor);
        assert_eq!(ast.devices[0].name, "R1");
        assert_eq!(ast.devices[0].nodes, vec!["vdd", "out"]);
        assert_eq!(ast.devices[0].value, Some(2500.0));
    }

    #[test]
    fn test_parse_mosfet_and_ground_alias() {
        let ast = parse("M1 out in GND NMOS\nM2 out in vdd pmos").unwrap();
        assert_eq!(ast.devices[0].nodes, vec!["out", "in", "0"]);
        assert_eq!(ast.devices[0].model_ref.as_deref(), Some("NMOS"));
        assert_eq!(ast.devices[1].model_ref.as_deref(), Some("pmos"));
    }

    #[test]
    fn test_parse_model() {
        let ast = parse(".model N1 NMOS (vth=0.5 Lambda=0.02 w=2)").unwrap();
        let model = &ast.models["N1"];
        assert_eq!(model.model_type, ModelType::Nmos);
        assert_eq!(model.params["vth"], 0.5);
        assert_eq!(model.params["lambda"], 0.02);
        assert_eq!(model.params.len(), 3);
    }

    #[test]
    fn test_parse_fixed_sweep_options() {
        let src = "\
.fixed vdd 5
.fixed in 0
.sweep in 0 5 11
.options max_passes=80 tol=1e-9
R1 vdd out 2.5k
M1 out in 0 NMOS
";
        let ast = parse(src).unwrap();
        assert_eq!(ast.fixed.len(), 2);
        assert_eq!(ast.fixed[0].voltage, 5.0);
        let sweep = ast.sweep.unwrap();
        assert_eq!((sweep.node.as_str(), sweep.start, sweep.stop, sweep.points), ("in", 0.0, 5.0, 11));
        assert_eq!(ast.options["max_passes"], 80.0);
        assert_eq!(ast.options["tol"], 1e-9);
    }

    #[test]
    fn test_parse_with_comments() {
        let ast = parse("# inverter\nR1 a b 1k ; load\n\n").unwrap();
        assert_eq!(ast.devices.len(), 1);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse("R1 a b 1k\nR1 b c 1k"),
            Err(MosdcError::DuplicateDevice { .. })
        ));
        assert!(matches!(
            parse(".model A NMOS\n.model A PMOS"),
            Err(MosdcError::DuplicateModel { .. })
        ));
        assert!(matches!(parse("M1 a b"), Err(MosdcError::InvalidDevice { .. })));
        assert!(matches!(parse("R1 a b"), Err(MosdcError::InvalidDevice { .. })));
        assert!(matches!(parse("C1 a b 1n"), Err(MosdcError::InvalidDevice { .. })));
        assert!(matches!(parse(".model X BJT"), Err(MosdcError::ParseError { .. })));
        assert!(matches!(parse(".sweep in 0 1 3"), Err(MosdcError::ParseError { line: 1, .. })));
        assert!(matches!(parse(".fixed GND 1"), Err(MosdcError::ParseError { .. })));
        assert!(matches!(parse(".options speed=2"), Err(MosdcError::ParseError { .. })));
        assert!(matches!(parse("R1 a b 1k extra"), Err(MosdcError::ParseError { line: 1, .. })));
    }
}
