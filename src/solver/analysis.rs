//! Operating-point snapshots and DC sweeps.

use log::{debug, error};

use super::relaxation::Relaxation;
use crate::circuit::Circuit;
use crate::components::{Component, Region};
use crate::error::{MosdcError, Result};

/// Solved state of one floating node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSample {
    pub name: String,
    pub voltage: f64,
    /// Through current
    pub current: f64,
}

/// Solved state of one device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSample {
    pub name: String,
    pub current: f64,
    /// MOS devices only
    pub region: Option<Region>,
    /// Small-signal dId/dVg, MOS devices only
    pub gm: Option<f64>,
}

/// A converged DC operating point.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatingPoint {
    pub nodes: Vec<NodeSample>,
    pub devices: Vec<DeviceSample>,
    /// Relaxation passes it took to get here
    pub passes: usize,
}

impl OperatingPoint {
    /// Record the state of a converged circuit.
    ///
    /// Every device is re-evaluated at its final terminal voltages.
    pub fn capture(circuit: &mut Circuit, passes: usize) -> Result<Self> {
        let nodes = circuit
            .nodes()
            .iter()
            .map(|n| NodeSample {
                name: n.name.clone(),
                voltage: n.voltage,
                current: n.current,
            })
            .collect();

        let mut devices = Vec::with_capacity(circuit.devices.len());
        for device in &mut circuit.devices {
            let eval = device.evaluate()?;
            let gm = match device {
                Component::Mos(m) => Some(m.transconductance()?),
                Component::Resistor(_) => None,
            };
            devices.push(DeviceSample {
                name: device.name().to_string(),
                current: eval.current,
                region: eval.region,
                gm,
            });
        }

        Ok(Self {
            nodes,
            devices,
            passes,
        })
    }

    /// Look up a node by name.
    pub fn node(&self, name: &str) -> Option<&NodeSample> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Look up a device by name.
    pub fn device(&self, name: &str) -> Option<&DeviceSample> {
        self.devices.iter().find(|d| d.name == name)
    }
}

/// One step of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepSample {
    /// Swept parameter value
    pub input: f64,
    pub point: OperatingPoint,
}

/// Solve the circuit once per value, applying each value with `apply` first.
///
/// The circuit is reset before every sample, so every sample starts from the
/// same seed. The first error aborts the sweep.
pub fn sweep_with<I, F>(
    circuit: &mut Circuit,
    relaxation: &Relaxation,
    values: I,
    mut apply: F,
) -> Result<Vec<SweepSample>>
where
    I: IntoIterator<Item = f64>,
    F: FnMut(&mut Circuit, f64) -> Result<()>,
{
    let mut samples = Vec::new();
    for input in values {
        let point = match solve_sample(circuit, relaxation, input, &mut apply) {
            Ok(point) => point,
            Err(e) => {
                error!("sweep aborted at {}: {}", input, e);
                return Err(e);
            }
        };
        debug!("sample {}: {} passes", input, point.passes);
        samples.push(SweepSample { input, point });
    }
    Ok(samples)
}

fn solve_sample<F>(
    circuit: &mut Circuit,
    relaxation: &Relaxation,
    input: f64,
    apply: &mut F,
) -> Result<OperatingPoint>
where
    F: FnMut(&mut Circuit, f64) -> Result<()>,
{
    apply(circuit, input)?;
    circuit.reset();
    let report = relaxation.solve(circuit)?;
    OperatingPoint::capture(circuit, report.passes)
}

/// DC sweep of one driven node.
#[derive(Debug, Clone, PartialEq)]
pub struct DcSweep {
    /// Name of the driven node to step
    pub target: String,
    pub start: f64,
    pub stop: f64,
    pub points: usize,
}

impl DcSweep {
    /// Create a sweep over `points` evenly spaced values in `[start, stop]`.
    pub fn new(target: impl Into<String>, start: f64, stop: f64, points: usize) -> Result<Self> {
        if points == 0 {
            return Err(MosdcError::InvalidParameter {
                message: "sweep needs at least one point".to_string(),
            });
        }
        if !start.is_finite() || !stop.is_finite() {
            return Err(MosdcError::InvalidParameter {
                message: format!("sweep bounds must be finite, got [{}, {}]", start, stop),
            });
        }
        Ok(Self {
            target: target.into(),
            start,
            stop,
            points,
        })
    }

    /// The swept values, both ends included.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        let step = if self.points > 1 {
            (self.stop - self.start) / (self.points - 1) as f64
        } else {
            0.0
        };
        (0..self.points).map(move |i| {
            if i + 1 == self.points && self.points > 1 {
                self.stop
            } else {
                self.start + step * i as f64
            }
        })
    }

    /// Run the sweep on `circuit`.
    pub fn run(&self, circuit: &mut Circuit, relaxation: &Relaxation) -> Result<Vec<SweepSample>> {
        if circuit.find_fixed(&self.target).is_none() {
            return Err(MosdcError::NodeNotFound {
                node: self.target.clone(),
            });
        }
        sweep_with(circuit, relaxation, self.values(), |c, v| {
            c.set_fixed(&self.target, v)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Role;
    use crate::components::{Mosfet, Resistor};
    use approx::assert_abs_diff_eq;

    /// Resistor-loaded nMOS, R = 2500 Ω from a 5 V rail.
    fn common_source() -> Circuit {
        let mut c = Circuit::new();
        let vdd = c.add_fixed("vdd", 5.0);
        let gnd = c.add_fixed("0", 0.0);
        let vin = c.add_fixed("in", 0.0);
        let r = c
            .add_device(Component::Resistor(Resistor::new("R1", 2500.0).unwrap()))
            .unwrap();
        let m = c.add_device(Component::Mos(Mosfet::nmos("M1"))).unwrap();
        c.attach_fixed(vdd, Role::ResistHi, r).unwrap();
        c.attach_fixed(gnd, Role::Source, m).unwrap();
        c.attach_fixed(vin, Role::Gate, m).unwrap();
        let out = c.add_node("out");
        c.connect(out, Role::ResistLo, r).unwrap();
        c.connect(out, Role::Drain, m).unwrap();
        c
    }

    #[test]
    fn test_sweep_values_inclusive() {
        let sweep = DcSweep::new("in", 0.0, 5.0, 11).unwrap();
        let values: Vec<f64> = sweep.values().collect();
        assert_eq!(values.len(), 11);
        assert_eq!(values[0], 0.0);
        assert_eq!(values[10], 5.0);
        assert_abs_diff_eq!(values[3], 1.5, epsilon = 1e-12);

        let single: Vec<f64> = DcSweep::new("in", 2.0, 5.0, 1).unwrap().values().collect();
        assert_eq!(single, vec![2.0]);

        assert!(DcSweep::new("in", 0.0, 1.0, 0).is_err());
        assert!(DcSweep::new("in", f64::NAN, 1.0, 3).is_err());
    }

    #[test]
    fn test_common_source_transfer_is_non_increasing() {
        let mut c = common_source();
        let samples = DcSweep::new("in", 0.0, 5.0, 51)
            .unwrap()
            .run(&mut c, &Relaxation::new())
            .unwrap();
        assert_eq!(samples.len(), 51);

        let outs: Vec<f64> = samples
            .iter()
            .map(|s| s.point.node("out").unwrap().voltage)
            .collect();
        for pair in outs.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-6, "{} then {}", pair[0], pair[1]);
        }
        // Below threshold the device is off and the output sits at the rail.
        assert_abs_diff_eq!(outs[0], 5.0, epsilon = 1e-6);
        assert!(outs[50] < 1.0);
    }

    #[test]
    fn test_capture_records_regions_and_gm() {
        let mut c = common_source();
        c.set_fixed("in", 1.2).unwrap();
        let report = Relaxation::new().solve(&mut c).unwrap();
        let op = OperatingPoint::capture(&mut c, report.passes).unwrap();

        let m1 = op.device("M1").unwrap();
        let r1 = op.device("R1").unwrap();
        assert!(m1.region.is_some());
        assert!(m1.gm.unwrap() > 0.0);
        assert_eq!(r1.region, None);
        assert_eq!(r1.gm, None);
        // Series devices carry the same current at the operating point.
        assert_abs_diff_eq!(m1.current, r1.current, epsilon = 1e-6);
        assert_abs_diff_eq!(op.node("out").unwrap().current, r1.current, epsilon = 1e-9);
    }

    #[test]
    fn test_sweep_with_custom_apply() {
        let mut c = common_source();
        c.set_fixed("in", 2.0).unwrap();
        let samples = sweep_with(&mut c, &Relaxation::new(), [1.0e3, 2.5e3, 1.0e4], |c, r| {
            let id = c.find_device("R1").unwrap();
            c.devices[id.0] = Component::Resistor(Resistor::new("R1", r)?);
            c.set_fixed("vdd", 5.0)
        })
        .unwrap();
        // A heavier load drops more voltage.
        let outs: Vec<f64> = samples.iter().map(|s| s.point.node("out").unwrap().voltage).collect();
        assert!(outs[0] > outs[1] && outs[1] > outs[2]);
    }

    #[test]
    fn test_sweep_unknown_target() {
        let mut c = common_source();
        let sweep = DcSweep::new("nowhere", 0.0, 1.0, 2).unwrap();
        assert!(matches!(
            sweep.run(&mut c, &Relaxation::new()),
            Err(MosdcError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn test_common_source_demo_sweep() {
        let ast = crate::dsl::parse(include_str!("../../demos/common_source.cir")).unwrap();
        let def = ast.sweep.clone().unwrap();
        let mut c = Circuit::from_ast(&ast).unwrap();
        let samples = DcSweep::new(def.node, def.start, def.stop, def.points)
            .unwrap()
            .run(&mut c, &Relaxation::new())
            .unwrap();
        assert_eq!(samples.len(), 26);
        let outs: Vec<f64> = samples
            .iter()
            .map(|s| s.point.node("out").unwrap().voltage)
            .collect();
        assert!(outs.windows(2).all(|w| w[1] <= w[0] + 1e-6));
    }
}
