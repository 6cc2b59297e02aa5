//! Abstract Syntax Tree types for the circuit description language.

use std::collections::HashMap;

/// Complete AST representation of a parsed circuit.
#[derive(Debug, Clone, Default)]
pub struct CircuitAst {
    /// All device instances, in file order
    pub devices: Vec<DeviceDef>,
    /// Model definitions
    pub models: HashMap<String, ModelDef>,
    /// Driven nodes declared with `.fixed`
    pub fixed: Vec<FixedDef>,
    /// Sweep request, if any
    pub sweep: Option<SweepDef>,
    /// Solver options from `.options`
    pub options: HashMap<String, f64>,
}

impl CircuitAst {
    /// Create a new empty circuit AST.
    pub fn new() -> Self {
        Self::default()
    }
}

/// A device definition.
#[derive(Debug, Clone)]
pub struct DeviceDef {
    pub device_type: DeviceType,
    /// Unique device name
    pub name: String,
    /// Connected node names: drain, gate, source for MOS; hi, lo for resistors
    pub nodes: Vec<String>,
    /// Resistance
    pub value: Option<f64>,
    /// MOS model name
    pub model_ref: Option<String>,
    /// Source line number for error reporting
    pub line: usize,
}

/// Device types supported by the description language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Mosfet,
    Resistor,
}

impl DeviceType {
    /// Parse a device type from the first letter of its name.
    pub fn from_prefix(prefix: char) -> Option<Self> {
        match prefix.to_ascii_uppercase() {
            'M' => Some(Self::Mosfet),
            'R' => Some(Self::Resistor),
            _ => None,
        }
    }

    /// Number of nodes a device of this type connects.
    pub fn expected_node_count(&self) -> usize {
        match self {
            Self::Mosfet => 3,
            Self::Resistor => 2,
        }
    }
}

/// A `.model` definition.
#[derive(Debug, Clone)]
pub struct ModelDef {
    pub name: String,
    pub model_type: ModelType,
    /// Parameters, keys lowercased
    pub params: HashMap<String, f64>,
    pub line: usize,
}

/// Model types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    Nmos,
    Pmos,
}

impl ModelType {
    /// Parse a model type from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NMOS" => Some(Self::Nmos),
            "PMOS" => Some(Self::Pmos),
            _ => None,
        }
    }
}

/// A `.fixed` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedDef {
    pub node: String,
    pub voltage: f64,
    pub line: usize,
}

/// A `.sweep` request: step a driven node over evenly spaced voltages.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepDef {
    pub node: String,
    pub start: f64,
    pub stop: f64,
    pub points: usize,
    pub line: usize,
}
