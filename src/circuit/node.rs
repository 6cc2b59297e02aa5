//! Floating nodes and the single-node KCL solve.
//!
//! A [`Node`] is a wire whose voltage is not driven. It keeps the indices of
//! the device terminals it touches, grouped by [`Role`], and finds the
//! voltage at which the signed sum of terminal currents is zero:
//!
//! 1. Build the feasible bracket `[a, b]` from the MOS ordering invariants
//!    and resistor orientation ([`Node::generate_constraints`]).
//! 2. Accept an endpoint whose residual is already below tolerance.
//! 3. Otherwise run Brent's method on [`Node::current_law`] over `[a, b]`
//!    and check the residual at the returned voltage.

use log::trace;

use super::types::{DeviceId, NodeId, Role};
use crate::components::{Component, MosType};
use crate::error::{MosdcError, Result};
use crate::solver::{Brent, SolverConfig};

/// Device terminals attached to a node, one collection per role.
#[derive(Debug, Clone, Default)]
pub struct Connections {
    pub drain: Vec<DeviceId>,
    pub source: Vec<DeviceId>,
    pub gate: Vec<DeviceId>,
    pub resist_hi: Vec<DeviceId>,
    pub resist_lo: Vec<DeviceId>,
}

impl Connections {
    /// Terminals attached through `role`.
    pub fn get(&self, role: Role) -> &[DeviceId] {
        match role {
            Role::Drain => &self.drain,
            Role::Source => &self.source,
            Role::Gate => &self.gate,
            Role::ResistHi => &self.resist_hi,
            Role::ResistLo => &self.resist_lo,
        }
    }

    fn get_mut(&mut self, role: Role) -> &mut Vec<DeviceId> {
        match role {
            Role::Drain => &mut self.drain,
            Role::Source => &mut self.source,
            Role::Gate => &mut self.gate,
            Role::ResistHi => &mut self.resist_hi,
            Role::ResistLo => &mut self.resist_lo,
        }
    }

    fn len(&self) -> usize {
        Role::ALL.iter().map(|&r| self.get(r).len()).sum()
    }

    /// Check if any terminal that can carry current is attached.
    pub fn carries_current(&self) -> bool {
        self.len() > self.gate.len()
    }
}

/// Feasible voltage interval for a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub lower: f64,
    pub upper: f64,
}

/// Outcome of one node solve.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSolution {
    pub node: NodeId,
    /// Solved node voltage
    pub voltage: f64,
    /// Through current at the solved voltage
    pub current: f64,
    /// Voltage change against the previous solve (infinite on the first solve
    /// after a reset)
    pub delta: f64,
    /// True when `|delta|` exceeds the solver tolerance
    pub changed: bool,
}

/// A floating node.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    connections: Connections,
    /// Last solved voltage
    pub voltage: f64,
    /// Last solved through current
    pub current: f64,
    /// Voltage from the previous solve, `-inf` after a reset
    pub previous_voltage: f64,
}

fn device<'a>(devices: &'a [Component], id: DeviceId) -> Result<&'a Component> {
    devices.get(id.0).ok_or_else(|| MosdcError::InvalidParameter {
        message: format!("device index {} is not in the device table", id),
    })
}

fn device_mut<'a>(devices: &'a mut [Component], id: DeviceId) -> Result<&'a mut Component> {
    devices.get_mut(id.0).ok_or_else(|| MosdcError::InvalidParameter {
        message: format!("device index {} is not in the device table", id),
    })
}

/// Tighten a bound: the largest lower bound or the smallest upper bound wins.
fn raise(bound: &mut Option<f64>, v: f64, take_max: bool) {
    *bound = Some(match *bound {
        None => v,
        Some(b) if take_max => b.max(v),
        Some(b) => b.min(v),
    });
}

fn mos_type(dev: &Component, role: Role) -> Result<MosType> {
    dev.mos_type().ok_or_else(|| MosdcError::InvalidConnection {
        device: dev.name().to_string(),
        role: role.to_string(),
    })
}

impl Node {
    /// Create a node with no connections.
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            connections: Connections::default(),
            voltage: 0.0,
            current: 0.0,
            previous_voltage: f64::NEG_INFINITY,
        }
    }

    /// Attach a device terminal. The caller checks that the device has `role`.
    pub fn connect(&mut self, role: Role, device: DeviceId) {
        self.connections.get_mut(role).push(device);
    }

    /// Attached terminals.
    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    /// Forget the previous voltage so the next solve reports a change.
    pub fn reset(&mut self) {
        self.previous_voltage = f64::NEG_INFINITY;
    }

    /// Check if the node has not been solved since the last reset.
    pub fn is_unsolved(&self) -> bool {
        self.previous_voltage == f64::NEG_INFINITY
    }

    /// Set the node and every attached terminal to a starting voltage without
    /// solving. Nothing is evaluated.
    pub fn seed(&mut self, voltage: f64, devices: &mut [Component]) -> Result<()> {
        for role in Role::ALL {
            for &id in self.connections.get(role) {
                device_mut(devices, id)?.set_terminal(role, voltage)?;
            }
        }
        self.voltage = voltage;
        Ok(())
    }

    /// Build the voltage bracket that keeps every attached device legal.
    ///
    /// | connection      | bound                 |
    /// |-----------------|-----------------------|
    /// | nMOS drain      | lower = that Vs       |
    /// | nMOS source     | upper = that Vd       |
    /// | pMOS drain      | upper = that Vs       |
    /// | pMOS source     | lower = that Vd       |
    /// | resistor hi     | lower = that Vl       |
    /// | resistor lo     | upper = that Vh       |
    pub fn generate_constraints(&self, devices: &[Component]) -> Result<Bracket> {
        let mut lower: Option<f64> = None;
        let mut upper: Option<f64> = None;

        for &id in &self.connections.drain {
            let dev = device(devices, id)?;
            let vs = dev.terminal(Role::Source)?;
            match mos_type(dev, Role::Drain)? {
                MosType::N => raise(&mut lower, vs, true),
                MosType::P => raise(&mut upper, vs, false),
            }
        }

        for &id in &self.connections.source {
            let dev = device(devices, id)?;
            let vd = dev.terminal(Role::Drain)?;
            match mos_type(dev, Role::Source)? {
                MosType::N => raise(&mut upper, vd, false),
                MosType::P => raise(&mut lower, vd, true),
            }
        }

        for &id in &self.connections.resist_hi {
            let vl = device(devices, id)?.terminal(Role::ResistLo)?;
            raise(&mut lower, vl, true);
        }

        for &id in &self.connections.resist_lo {
            let vh = device(devices, id)?.terminal(Role::ResistHi)?;
            raise(&mut upper, vh, false);
        }

        let (lower, upper) = match (lower, upper) {
            (Some(a), Some(b)) => (a, b),
            (None, _) => {
                return Err(MosdcError::underdetermined(&self.name, "no connection bounds the voltage from below"));
            }
            (_, None) => {
                return Err(MosdcError::underdetermined(&self.name, "no connection bounds the voltage from above"));
            }
        };

        if lower > upper {
            return Err(MosdcError::underdetermined(
                &self.name,
                format!("contradictory bounds: lower {:.6} V exceeds upper {:.6} V", lower, upper),
            ));
        }

        trace!("node {}: bracket [{:.6}, {:.6}]", self.name, lower, upper);
        Ok(Bracket { lower, upper })
    }

    /// Push `voltage` into every attached terminal and return the net current
    /// flowing into the node.
    ///
    /// Gate terminals only receive the voltage. The node's through current is
    /// updated as a side effect.
    pub fn current_law(&mut self, voltage: f64, devices: &mut [Component]) -> Result<f64> {
        let mut residual = 0.0;
        let mut through = 0.0;

        for &id in &self.connections.gate {
            device_mut(devices, id)?.set_terminal(Role::Gate, voltage)?;
        }

        for &id in &self.connections.drain {
            let dev = device_mut(devices, id)?;
            dev.set_terminal(Role::Drain, voltage)?;
            let i = dev.evaluate()?.current;
            match mos_type(dev, Role::Drain)? {
                MosType::N => residual -= i,
                MosType::P => {
                    residual += i;
                    through += i;
                }
            }
        }

        for &id in &self.connections.source {
            let dev = device_mut(devices, id)?;
            dev.set_terminal(Role::Source, voltage)?;
            let i = dev.evaluate()?.current;
            match mos_type(dev, Role::Source)? {
                MosType::N => {
                    residual += i;
                    through += i;
                }
                MosType::P => residual -= i,
            }
        }

        for &id in &self.connections.resist_hi {
            let dev = device_mut(devices, id)?;
            dev.set_terminal(Role::ResistHi, voltage)?;
            residual -= dev.evaluate()?.current;
        }

        for &id in &self.connections.resist_lo {
            let dev = device_mut(devices, id)?;
            dev.set_terminal(Role::ResistLo, voltage)?;
            let i = dev.evaluate()?.current;
            residual += i;
            through += i;
        }

        self.current = through;
        Ok(residual)
    }

    /// Solve for the KCL voltage and update the node state.
    ///
    /// The residual is not monotone in general, so a bracket can hold more
    /// than one root. Brent returns one of them and the voltages of the other
    /// nodes decide which. When the root finder stops on a jump in the
    /// residual instead of a zero, the solve fails with
    /// [`MosdcError::ConvergenceError`].
    pub fn solve(&mut self, devices: &mut [Component], config: &SolverConfig) -> Result<NodeSolution> {
        let Bracket { lower, upper } = self.generate_constraints(devices)?;
        let tol = config.tolerance;

        // Brent's method cannot report a root sitting exactly on an endpoint,
        // so check both ends first.
        let fa = self.current_law(lower, devices)?;
        let voltage = if fa.abs() < tol {
            lower
        } else {
            let fb = self.current_law(upper, devices)?;
            if fb.abs() < tol {
                upper
            } else {
                let name = self.name.clone();
                let brent = Brent::from_config(config);
                let root = brent.find_root(&name, |v| self.current_law(v, devices), lower, upper, fa, fb)?;
                let residual = self.current_law(root, devices)?;
                if !(residual.abs() < tol) {
                    return Err(MosdcError::ConvergenceError {
                        node: name,
                        a: lower,
                        b: upper,
                        fa,
                        fb,
                        reason: format!(
                            "residual {:.3e} A at {:.9} V is above tolerance (current law is discontinuous there)",
                            residual, root
                        ),
                    });
                }
                root
            }
        };

        // Leave every terminal and the through current at the accepted voltage.
        self.current_law(voltage, devices)?;
        self.voltage = voltage;

        let delta = voltage - self.previous_voltage;
        let changed = delta.abs() > tol;
        self.previous_voltage = voltage;

        trace!(
            "node {}: V = {:.6} V, I = {:.6e} A, changed = {}",
            self.name,
            voltage,
            self.current,
            changed
        );

        Ok(NodeSolution {
            node: self.id,
            voltage,
            current: self.current,
            delta,
            changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{MosParams, Mosfet, Region, Resistor};
    use approx::assert_abs_diff_eq;

    fn nmos(vg: f64, vs: f64) -> Component {
        let mut m = Mosfet::nmos("n");
        m.vg = vg;
        m.vs = vs;
        Component::Mos(m)
    }

    fn pmos(vg: f64, vs: f64) -> Component {
        let mut m = Mosfet::pmos("p");
        m.vg = vg;
        m.vs = vs;
        Component::Mos(m)
    }

    fn resistor(r: f64, vh: f64) -> Component {
        let mut res = Resistor::new("r", r).unwrap();
        res.vh = vh;
        Component::Resistor(res)
    }

    #[test]
    fn test_common_source_node_balances() {
        // nMOS pulling down against a 2.5k load from 5 V.
        let mut devices = vec![nmos(1.0, 0.0), resistor(2500.0, 5.0)];
        let mut node = Node::new(NodeId(0), "out");
        node.connect(Role::Drain, DeviceId(0));
        node.connect(Role::ResistLo, DeviceId(1));

        let bracket = node.generate_constraints(&devices).unwrap();
        assert_eq!(bracket, Bracket { lower: 0.0, upper: 5.0 });

        let sol = node.solve(&mut devices, &SolverConfig::default()).unwrap();
        assert!(sol.voltage > 0.0 && sol.voltage < 5.0);
        let residual = node.current_law(sol.voltage, &mut devices).unwrap();
        assert!(residual.abs() < 1e-6);
        // Through current is the resistor current.
        assert_abs_diff_eq!(sol.current, (5.0 - sol.voltage) / 2500.0, epsilon = 1e-12);
    }

    #[test]
    fn test_single_nmos_against_pmos_load() {
        let mut devices = vec![nmos(2.0, 0.0), pmos(0.0, 3.0)];
        let mut node = Node::new(NodeId(0), "out");
        node.connect(Role::Drain, DeviceId(0));
        node.connect(Role::Drain, DeviceId(1));
        let sol = node.solve(&mut devices, &SolverConfig::default()).unwrap();
        let residual = node.current_law(sol.voltage, &mut devices).unwrap();
        assert!(residual.abs() < 1e-6);
        assert!(sol.voltage >= 0.0 && sol.voltage <= 3.0);
    }

    #[test]
    fn test_endpoint_root_accepted() {
        // Gate below threshold: nothing conducts, the load pulls the node to Vdd.
        let mut devices = vec![nmos(0.2, 0.0), resistor(1000.0, 5.0)];
        let mut node = Node::new(NodeId(0), "out");
        node.connect(Role::Drain, DeviceId(0));
        node.connect(Role::ResistLo, DeviceId(1));
        let sol = node.solve(&mut devices, &SolverConfig::default()).unwrap();
        assert_eq!(sol.voltage, 5.0);
        assert_eq!(sol.current, 0.0);
    }

    #[test]
    fn test_solve_is_idempotent() {
        let mut devices = vec![nmos(1.2, 0.0), resistor(10.0, 5.0)];
        let mut node = Node::new(NodeId(0), "out");
        node.connect(Role::Drain, DeviceId(0));
        node.connect(Role::ResistLo, DeviceId(1));
        let config = SolverConfig::default();

        let first = node.solve(&mut devices, &config).unwrap();
        assert!(first.changed);
        assert!(first.delta.is_infinite());

        let second = node.solve(&mut devices, &config).unwrap();
        assert!(!second.changed);
        assert_eq!(first.voltage, second.voltage);

        node.reset();
        assert!(node.solve(&mut devices, &config).unwrap().changed);
    }

    #[test]
    fn test_missing_bound_is_underdetermined() {
        let mut devices = vec![nmos(1.0, 0.0)];
        let mut node = Node::new(NodeId(0), "dangling");
        node.connect(Role::Drain, DeviceId(0));
        match node.solve(&mut devices, &SolverConfig::default()) {
            Err(MosdcError::Underdetermined { node, .. }) => assert_eq!(node, "dangling"),
            other => panic!("expected underdetermined, got {:?}", other),
        }

        let mut gate_only = Node::new(NodeId(1), "gate");
        gate_only.connect(Role::Gate, DeviceId(0));
        assert!(gate_only.generate_constraints(&devices).is_err());
    }

    #[test]
    fn test_contradictory_bounds_are_underdetermined() {
        // nMOS drain needs V >= 4, the resistor lo terminal needs V <= 2.
        let mut devices = vec![nmos(5.0, 4.0), resistor(100.0, 2.0)];
        let mut node = Node::new(NodeId(0), "x");
        node.connect(Role::Drain, DeviceId(0));
        node.connect(Role::ResistLo, DeviceId(1));
        assert!(matches!(
            node.generate_constraints(&devices),
            Err(MosdcError::Underdetermined { .. })
        ));
        assert!(node.solve(&mut devices, &SolverConfig::default()).is_err());
    }

    #[test]
    fn test_bracket_is_ordered_for_wellformed_wiring() {
        for vs_n in [0.0, 0.5, 1.0] {
            for vdd in [1.0, 3.0, 5.0] {
                let devices = vec![nmos(2.0, vs_n), pmos(0.0, vdd), resistor(50.0, vdd)];
                let mut node = Node::new(NodeId(0), "x");
                node.connect(Role::Drain, DeviceId(0));
                node.connect(Role::Drain, DeviceId(1));
                node.connect(Role::ResistLo, DeviceId(2));
                let b = node.generate_constraints(&devices).unwrap();
                assert!(b.lower <= b.upper);
                assert_eq!(b.lower, vs_n);
                assert_eq!(b.upper, vdd);
            }
        }
    }

    #[test]
    fn test_source_connection_through_current() {
        // Source follower: gate and drain at 5 V, source on the node, 100 ohm to ground.
        // The residual is monotone on the bracket, so the root is unique:
        // 100 u^2 + u - 4.3 = 0 with u = 4.3 - V.
        let mut m = Mosfet::new("n", MosType::N, MosParams::nmos());
        m.vd = 5.0;
        m.vg = 5.0;
        let mut r = Resistor::new("r", 100.0).unwrap();
        r.vl = 0.0;
        let mut devices = vec![Component::Mos(m), Component::Resistor(r)];
        let mut node = Node::new(NodeId(0), "src");
        node.connect(Role::Source, DeviceId(0));
        node.connect(Role::ResistHi, DeviceId(1));

        let sol = node.solve(&mut devices, &SolverConfig::default()).unwrap();
        let u = (-1.0 + (1.0 + 400.0 * 4.3_f64).sqrt()) / 200.0;
        assert_abs_diff_eq!(sol.voltage, 4.3 - u, epsilon = 1e-9);
        assert_abs_diff_eq!(sol.voltage, 4.097_575, epsilon = 1e-6);
        // Through current counts the source device's own current.
        assert_abs_diff_eq!(sol.current, devices[0].last_current(), epsilon = 1e-15);
        assert_abs_diff_eq!(sol.current, sol.voltage / 100.0, epsilon = 1e-6);
        assert_eq!(devices[0].region(), Some(Region::Triode));
    }

    #[test]
    fn test_residual_jump_is_not_a_root() {
        // With lambda > 0 the drain current jumps from 1.0 to 1.5 A at
        // Vds = Vgs - Vth = 1 V. The load supplies 1.2 A there, so the residual
        // changes sign without crossing zero.
        let mut params = MosParams::nmos();
        params.lambda = 0.5;
        let mut m = Mosfet::new("n", MosType::N, params);
        m.vg = 1.7;
        m.vs = 0.0;
        let mut devices = vec![Component::Mos(m), resistor(4.0 / 1.2, 5.0)];
        let mut node = Node::new(NodeId(0), "kink");
        node.connect(Role::Drain, DeviceId(0));
        node.connect(Role::ResistLo, DeviceId(1));

        match node.solve(&mut devices, &SolverConfig::default()) {
            Err(MosdcError::ConvergenceError { node: name, a, b, fa, fb, .. }) => {
                assert_eq!(name, "kink");
                assert_eq!((a, b), (0.0, 5.0));
                assert_abs_diff_eq!(fa, 1.5, epsilon = 1e-12);
                assert_abs_diff_eq!(fb, -3.5, epsilon = 1e-12);
            }
            other => panic!("expected convergence error, got {:?}", other),
        }
        // The failed solve leaves the node state untouched.
        assert!(node.is_unsolved());
    }

    #[test]
    fn test_seed_sets_every_terminal() {
        let mut devices = vec![nmos(1.0, 0.0), resistor(100.0, 5.0)];
        let mut node = Node::new(NodeId(0), "out");
        node.connect(Role::Drain, DeviceId(0));
        node.connect(Role::Gate, DeviceId(0));
        node.connect(Role::ResistLo, DeviceId(1));
        node.seed(2.5, &mut devices).unwrap();

        assert_eq!(node.voltage, 2.5);
        assert_eq!(devices[0].terminal(Role::Drain).unwrap(), 2.5);
        assert_eq!(devices[0].terminal(Role::Gate).unwrap(), 2.5);
        assert_eq!(devices[0].terminal(Role::Source).unwrap(), 0.0);
        assert_eq!(devices[1].terminal(Role::ResistLo).unwrap(), 2.5);
        assert!(node.is_unsolved());
    }
}
