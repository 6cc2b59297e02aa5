//! Device models for the operating-point solver.
//!
//! The device set is closed:
//! - MOSFET: nMOS and pMOS square-law devices ([`Mosfet`])
//! - Linear: Resistor
//!
//! Every device exposes the same capability through [`Component`]: push a
//! voltage into one of its terminals, then evaluate the terminal current.

mod linear;
mod mosfet;

pub use linear::Resistor;
pub use mosfet::{MosParams, MosType, Mosfet, GM_STEP};

use std::fmt;

use crate::circuit::Role;
use crate::dsl::{DeviceDef, DeviceType, ModelDef};
use crate::error::{MosdcError, Result};

/// Operating region of a MOS device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// Gate overdrive below threshold; no channel current.
    Cutoff,
    /// `Vds < Vgs - Vth`; current grows with Vds along the quadratic branch.
    Saturation,
    /// `Vds >= Vgs - Vth`; current set by the overdrive, modulated by λ·Vds.
    Triode,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Region::Cutoff => "cutoff",
            Region::Saturation => "saturation",
            Region::Triode => "triode",
        };
        f.write_str(name)
    }
}

/// Result of evaluating one device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Terminal current (drain-source magnitude for MOS, Hi to Lo for resistors)
    pub current: f64,
    /// Operating region, MOS devices only
    pub region: Option<Region>,
}

/// A circuit device.
#[derive(Debug, Clone)]
pub enum Component {
    Mos(Mosfet),
    Resistor(Resistor),
}

impl Component {
    /// Create a device from a circuit description definition.
    pub fn from_def(def: &DeviceDef, model: Option<&ModelDef>) -> Result<Self> {
        match def.device_type {
            DeviceType::Mosfet => {
                let model_name = def.model_ref.as_deref().ok_or_else(|| {
                    MosdcError::invalid_device(&def.name, def.line, "MOSFET requires a model")
                })?;
                let (mos_type, params) = match model {
                    Some(m) => MosParams::from_model(m)?,
                    None if model_name.eq_ignore_ascii_case("nmos") => (MosType::N, MosParams::nmos()),
                    None if model_name.eq_ignore_ascii_case("pmos") => (MosType::P, MosParams::pmos()),
                    None => {
                        return Err(MosdcError::UndefinedModel {
                            model: model_name.to_string(),
                            device: def.name.clone(),
                        });
                    }
                };
                Ok(Component::Mos(Mosfet::new(def.name.clone(), mos_type, params)))
            }

            DeviceType::Resistor => {
                let value = def.value.ok_or_else(|| {
                    MosdcError::invalid_device(&def.name, def.line, "resistor requires a value")
                })?;
                Resistor::new(def.name.clone(), value)
                    .map(Component::Resistor)
                    .map_err(|e| MosdcError::invalid_device(&def.name, def.line, e.to_string()))
            }
        }
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        match self {
            Component::Mos(m) => &m.name,
            Component::Resistor(r) => &r.name,
        }
    }

    /// Get the MOS channel type, if this is a MOSFET.
    pub fn mos_type(&self) -> Option<MosType> {
        match self {
            Component::Mos(m) => Some(m.mos_type),
            Component::Resistor(_) => None,
        }
    }

    /// Check whether this device has a terminal for the given role.
    pub fn has_role(&self, role: Role) -> bool {
        match self {
            Component::Mos(_) => role.is_mos(),
            Component::Resistor(_) => !role.is_mos(),
        }
    }

    fn wrong_role(&self, role: Role) -> MosdcError {
        MosdcError::InvalidConnection {
            device: self.name().to_string(),
            role: role.to_string(),
        }
    }

    /// Set the voltage of the terminal that plays `role`.
    pub fn set_terminal(&mut self, role: Role, voltage: f64) -> Result<()> {
        match (self, role) {
            (Component::Mos(m), Role::Gate) => m.vg = voltage,
            (Component::Mos(m), Role::Drain) => m.vd = voltage,
            (Component::Mos(m), Role::Source) => m.vs = voltage,
            (Component::Resistor(r), Role::ResistHi) => r.vh = voltage,
            (Component::Resistor(r), Role::ResistLo) => r.vl = voltage,
            (c, role) => return Err(c.wrong_role(role)),
        }
        Ok(())
    }

    /// Read the voltage of the terminal that plays `role`.
    pub fn terminal(&self, role: Role) -> Result<f64> {
        match (self, role) {
            (Component::Mos(m), Role::Gate) => Ok(m.vg),
            (Component::Mos(m), Role::Drain) => Ok(m.vd),
            (Component::Mos(m), Role::Source) => Ok(m.vs),
            (Component::Resistor(r), Role::ResistHi) => Ok(r.vh),
            (Component::Resistor(r), Role::ResistLo) => Ok(r.vl),
            (c, role) => Err(c.wrong_role(role)),
        }
    }

    /// Evaluate the device at its stored terminal voltages.
    pub fn evaluate(&mut self) -> Result<Evaluation> {
        match self {
            Component::Mos(m) => {
                let (current, region) = m.evaluate()?;
                Ok(Evaluation {
                    current,
                    region: Some(region),
                })
            }
            Component::Resistor(r) => Ok(Evaluation {
                current: r.evaluate(),
                region: None,
            }),
        }
    }

    /// Current recorded by the last evaluation.
    pub fn last_current(&self) -> f64 {
        match self {
            Component::Mos(m) => m.id,
            Component::Resistor(r) => r.ir,
        }
    }

    /// Region recorded by the last evaluation.
    pub fn region(&self) -> Option<Region> {
        match self {
            Component::Mos(m) => m.region,
            Component::Resistor(_) => None,
        }
    }
}
