//! Circuit structure: device table, floating nodes and driven nodes.

use std::collections::HashMap;

use super::node::{Node, NodeSolution};
use super::types::{DeviceId, FixedId, NodeId, Role};
use crate::components::Component;
use crate::dsl::{CircuitAst, DeviceType};
use crate::error::{MosdcError, Result};
use crate::solver::SolverConfig;

/// A node held at a fixed voltage by the caller (a supply rail, an input,
/// ground). Its voltage is pushed into every attached terminal.
#[derive(Debug, Clone)]
pub struct FixedNode {
    pub name: String,
    pub voltage: f64,
    pub terminals: Vec<(DeviceId, Role)>,
}

/// A circuit ready for an operating-point solve.
///
/// The circuit owns every device; nodes refer to devices by [`DeviceId`].
#[derive(Debug, Clone, Default)]
pub struct Circuit {
    /// All devices, indexed by [`DeviceId`]
    pub devices: Vec<Component>,

    /// Floating nodes, in solve order
    nodes: Vec<Node>,

    /// Driven nodes
    fixed: Vec<FixedNode>,

    device_map: HashMap<String, DeviceId>,
    node_map: HashMap<String, NodeId>,
    fixed_map: HashMap<String, FixedId>,
}

impl Circuit {
    /// Create an empty circuit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a circuit from a parsed description.
    ///
    /// Ground (`0`) is always a driven node at 0 V. Every node name that is
    /// not declared with `.fixed` becomes a floating node, in order of first
    /// appearance.
    pub fn from_ast(ast: &CircuitAst) -> Result<Self> {
        let mut circuit = Circuit::new();
        circuit.add_fixed("0", 0.0);

        for def in &ast.fixed {
            if def.node == "0" && def.voltage != 0.0 {
                return Err(MosdcError::parse(def.line, "ground is fixed at 0 V"));
            }
            circuit.add_fixed(&def.node, def.voltage);
        }

        for def in &ast.devices {
            let model = def.model_ref.as_ref().and_then(|name| ast.models.get(name));
            let component = Component::from_def(def, model)?;
            let id = circuit.add_device(component)?;

            let roles: &[Role] = match def.device_type {
                DeviceType::Mosfet => &[Role::Drain, Role::Gate, Role::Source],
                DeviceType::Resistor => &[Role::ResistHi, Role::ResistLo],
            };

            for (node_name, &role) in def.nodes.iter().zip(roles) {
                match circuit.find_fixed(node_name) {
                    Some(fixed) => circuit.attach_fixed(fixed, role, id)?,
                    None => {
                        let node = circuit.add_node(node_name);
                        circuit.connect(node, role, id)?;
                    }
                }
            }
        }

        Ok(circuit)
    }

    /// Add a device. Names must be unique.
    pub fn add_device(&mut self, component: Component) -> Result<DeviceId> {
        let name = component.name().to_string();
        if self.device_map.contains_key(&name) {
            return Err(MosdcError::DuplicateDevice { name });
        }
        let id = DeviceId(self.devices.len());
        self.devices.push(component);
        self.device_map.insert(name, id);
        Ok(id)
    }

    /// Get or create the floating node called `name`.
    pub fn add_node(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.node_map.get(name) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(id, name));
        self.node_map.insert(name.to_string(), id);
        id
    }

    /// Get or create the driven node called `name` and set its voltage.
    pub fn add_fixed(&mut self, name: &str, voltage: f64) -> FixedId {
        if let Some(&id) = self.fixed_map.get(name) {
            self.fixed[id.0].voltage = voltage;
            return id;
        }
        let id = FixedId(self.fixed.len());
        self.fixed.push(FixedNode {
            name: name.to_string(),
            voltage,
            terminals: Vec::new(),
        });
        self.fixed_map.insert(name.to_string(), id);
        id
    }

    fn check_role(&self, role: Role, device: DeviceId) -> Result<()> {
        let dev = self.devices.get(device.0).ok_or_else(|| MosdcError::InvalidParameter {
            message: format!("device index {} is not in the device table", device),
        })?;
        if dev.has_role(role) {
            Ok(())
        } else {
            Err(MosdcError::InvalidConnection {
                device: dev.name().to_string(),
                role: role.to_string(),
            })
        }
    }

    /// Connect a device terminal to a floating node.
    pub fn connect(&mut self, node: NodeId, role: Role, device: DeviceId) -> Result<()> {
        self.check_role(role, device)?;
        let n = self.nodes.get_mut(node.0).ok_or_else(|| MosdcError::NodeNotFound {
            node: node.to_string(),
        })?;
        n.connect(role, device);
        Ok(())
    }

    /// Tie a device terminal to a driven node, applying its voltage now.
    pub fn attach_fixed(&mut self, fixed: FixedId, role: Role, device: DeviceId) -> Result<()> {
        self.check_role(role, device)?;
        let f = self.fixed.get_mut(fixed.0).ok_or_else(|| MosdcError::NodeNotFound {
            node: fixed.to_string(),
        })?;
        f.terminals.push((device, role));
        let voltage = f.voltage;
        self.devices[device.0].set_terminal(role, voltage)
    }

    /// Change a driven node's voltage and push it into its terminals.
    pub fn set_fixed(&mut self, name: &str, voltage: f64) -> Result<()> {
        let id = self.find_fixed(name).ok_or_else(|| MosdcError::NodeNotFound {
            node: name.to_string(),
        })?;
        let fixed = &mut self.fixed[id.0];
        fixed.voltage = voltage;
        for &(device, role) in &fixed.terminals {
            self.devices[device.0].set_terminal(role, voltage)?;
        }
        Ok(())
    }

    /// Reset every node's previous voltage. Call before solving a new sample.
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.reset();
        }
    }

    /// Starting voltage for floating nodes: halfway between the lowest and
    /// highest driven voltage, or 0 V without driven nodes.
    pub fn seed_voltage(&self) -> f64 {
        let mut rails = self.fixed.iter().map(|f| f.voltage);
        match rails.next() {
            None => 0.0,
            Some(first) => {
                let (lo, hi) = rails.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
                0.5 * (lo + hi)
            }
        }
    }

    /// Put every floating node and its terminals at [`Circuit::seed_voltage`].
    ///
    /// The first pass then sees the same neighbour voltages whatever the
    /// node order, instead of the 0 V terminals left by construction.
    pub fn seed(&mut self) -> Result<()> {
        let voltage = self.seed_voltage();
        for node in &mut self.nodes {
            node.seed(voltage, &mut self.devices)?;
        }
        Ok(())
    }

    /// Solve one node with the default configuration.
    pub fn solve_node(&mut self, id: NodeId) -> Result<NodeSolution> {
        self.solve_node_with(id, &SolverConfig::default())
    }

    /// Solve one node, holding every other node where it is.
    pub fn solve_node_with(&mut self, id: NodeId, config: &SolverConfig) -> Result<NodeSolution> {
        let node = self.nodes.get_mut(id.0).ok_or_else(|| MosdcError::NodeNotFound {
            node: id.to_string(),
        })?;
        node.solve(&mut self.devices, config)
    }

    /// KCL residual at a node's stored voltage.
    pub fn residual(&mut self, id: NodeId) -> Result<f64> {
        let node = self.nodes.get_mut(id.0).ok_or_else(|| MosdcError::NodeNotFound {
            node: id.to_string(),
        })?;
        let voltage = node.voltage;
        node.current_law(voltage, &mut self.devices)
    }

    /// Number of floating nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Floating node IDs in solve order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Get a floating node. Panics on an ID from another circuit.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// All floating nodes, in solve order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All driven nodes.
    pub fn fixed_nodes(&self) -> &[FixedNode] {
        &self.fixed
    }

    /// Get a device.
    pub fn device(&self, id: DeviceId) -> Option<&Component> {
        self.devices.get(id.0)
    }

    /// Find a floating node by name.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.node_map.get(name).copied()
    }

    /// Find a driven node by name.
    pub fn find_fixed(&self, name: &str) -> Option<FixedId> {
        self.fixed_map.get(name).copied()
    }

    /// Find a device by name.
    pub fn find_device(&self, name: &str) -> Option<DeviceId> {
        self.device_map.get(name).copied()
    }

    /// Voltage of a node by name: the solved voltage of a floating node or
    /// the set voltage of a driven one.
    pub fn node_voltage(&self, name: &str) -> Option<f64> {
        if let Some(id) = self.find_node(name) {
            return Some(self.nodes[id.0].voltage);
        }
        self.find_fixed(name).map(|id| self.fixed[id.0].voltage)
    }
}
