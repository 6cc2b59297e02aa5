//! MOSFET model.
//!
//! Square-law long-channel model shared by nMOS and pMOS devices. Both
//! polarities keep `Vgs` and `Vds` as magnitudes, so one current law serves
//! both; the polarity only decides which terminal ordering is legal:
//!
//! ```text
//!   Vgs <  Vth                : cutoff,      Id = 0
//!   Vds <  Vgs - Vth          : saturation,  Id = β·((Vgs - Vth) - Vds/2)·Vds
//!   otherwise                 : triode,      Id = β/2·(Vgs - Vth)²·(1 + λ·Vds)
//! ```
//!
//! with `β = (W/L)·µ·Cox`. The two conducting branches meet at
//! `Vds = Vgs - Vth` when `λ = 0`.

use crate::dsl::{ModelDef, ModelType};
use crate::error::{MosdcError, Polarity, Result};

use super::Region;

/// Step used for the forward-difference transconductance, in volts.
pub const GM_STEP: f64 = 0.01;

/// MOSFET channel type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MosType {
    N,
    P,
}

impl MosType {
    /// Short label used in messages ("nMOS" / "pMOS").
    pub fn label(&self) -> &'static str {
        match self {
            MosType::N => "nMOS",
            MosType::P => "pMOS",
        }
    }
}

/// Geometry and process parameters for a MOSFET.
#[derive(Debug, Clone, PartialEq)]
pub struct MosParams {
    /// Channel length (L)
    pub l: f64,
    /// Channel width (W)
    pub w: f64,
    /// Carrier mobility (µ)
    pub mu: f64,
    /// Gate oxide capacitance per unit area (Cox)
    pub cox: f64,
    /// Channel-length modulation (λ), 1/V
    pub lambda: f64,
    /// Threshold voltage magnitude (Vth), V
    pub vth: f64,
}

impl MosParams {
    /// Default nMOS parameters.
    pub fn nmos() -> Self {
        Self {
            l: 1.0,
            w: 1.0,
            mu: 2.0,
            cox: 1.0,
            lambda: 0.0,
            vth: 0.7,
        }
    }

    /// Default pMOS parameters. Hole mobility is about a quarter of the nMOS value.
    pub fn pmos() -> Self {
        Self {
            mu: 0.5,
            ..Self::nmos()
        }
    }

    /// Default parameters for a channel type.
    pub fn for_type(mos_type: MosType) -> Self {
        match mos_type {
            MosType::N => Self::nmos(),
            MosType::P => Self::pmos(),
        }
    }

    /// Create parameters from a model definition.
    ///
    /// Parameters missing from the model keep the channel type's default.
    pub fn from_model(model: &ModelDef) -> Result<(MosType, Self)> {
        let mos_type = match model.model_type {
            ModelType::Nmos => MosType::N,
            ModelType::Pmos => MosType::P,
        };

        let mut params = Self::for_type(mos_type);
        for (key, &value) in &model.params {
            let slot = match key.as_str() {
                "l" => &mut params.l,
                "w" => &mut params.w,
                "mu" | "u0" => &mut params.mu,
                "cox" => &mut params.cox,
                "lambda" | "lmd" => &mut params.lambda,
                "vth" | "vto" => &mut params.vth,
                _ => {
                    return Err(MosdcError::InvalidParameter {
                        message: format!("unknown MOS parameter '{}' in model '{}'", key, model.name),
                    });
                }
            };
            *slot = value;
        }
        params.check(&model.name)?;
        Ok((mos_type, params))
    }

    /// Reject parameter sets the current law cannot use.
    pub fn check(&self, name: &str) -> Result<()> {
        if self.l <= 0.0 || self.w <= 0.0 {
            return Err(MosdcError::InvalidParameter {
                message: format!("'{}': channel length and width must be positive", name),
            });
        }
        if self.mu <= 0.0 || self.cox <= 0.0 {
            return Err(MosdcError::InvalidParameter {
                message: format!("'{}': mobility and Cox must be positive", name),
            });
        }
        Ok(())
    }

    /// Gain factor β = (W/L)·µ·Cox.
    pub fn beta(&self) -> f64 {
        self.w / self.l * self.mu * self.cox
    }
}

/// A MOSFET device.
#[derive(Debug, Clone)]
pub struct Mosfet {
    pub name: String,
    pub mos_type: MosType,
    pub params: MosParams,
    /// Gate voltage
    pub vg: f64,
    /// Drain voltage
    pub vd: f64,
    /// Source voltage
    pub vs: f64,
    /// Region found by the last evaluation
    pub region: Option<Region>,
    /// Current found by the last evaluation. Always a magnitude: drain to
    /// source for nMOS, source to drain for pMOS.
    pub id: f64,
}

impl Mosfet {
    /// Create a new MOSFET with all terminals at 0 V.
    pub fn new(name: impl Into<String>, mos_type: MosType, params: MosParams) -> Self {
        Self {
            name: name.into(),
            mos_type,
            params,
            vg: 0.0,
            vd: 0.0,
            vs: 0.0,
            region: None,
            id: 0.0,
        }
    }

    /// Create an nMOS with default parameters.
    pub fn nmos(name: impl Into<String>) -> Self {
        Self::new(name, MosType::N, MosParams::nmos())
    }

    /// Create a pMOS with default parameters.
    pub fn pmos(name: impl Into<String>) -> Self {
        Self::new(name, MosType::P, MosParams::pmos())
    }

    /// Set all three terminal voltages at once.
    pub fn set_terminals(&mut self, vg: f64, vd: f64, vs: f64) {
        self.vg = vg;
        self.vd = vd;
        self.vs = vs;
    }

    /// Gate-source voltage magnitude.
    pub fn vgs(&self) -> f64 {
        (self.vg - self.vs).abs()
    }

    /// Drain-source voltage magnitude.
    pub fn vds(&self) -> f64 {
        (self.vd - self.vs).abs()
    }

    /// Check the terminal ordering invariant for this channel type.
    fn check_ordering(&self, vd: f64, vs: f64) -> Result<()> {
        let polarity = match self.mos_type {
            MosType::N if vd < vs => Polarity::NegativeVds,
            MosType::P if vs < vd => Polarity::PositiveVds,
            _ => return Ok(()),
        };
        Err(MosdcError::DomainError {
            device: format!("{} {}", self.mos_type.label(), self.name),
            polarity,
            vd,
            vs,
        })
    }

    /// Compute the channel current and region for the given terminal voltages
    /// without touching the device state.
    pub fn current_at(&self, vg: f64, vd: f64, vs: f64) -> Result<(f64, Region)> {
        let vgs = (vg - vs).abs();
        let vds = (vd - vs).abs();
        self.check_ordering(vd, vs)?;

        let vth = self.params.vth;
        let beta = self.params.beta();

        if vgs < 0.0 {
            // Unreachable while Vgs is a magnitude.
            return Ok((0.0, Region::Cutoff));
        }

        let result = if vgs < vth {
            (0.0, Region::Cutoff)
        } else if vds < vgs - vth {
            (beta * ((vgs - vth) - 0.5 * vds) * vds, Region::Saturation)
        } else {
            let vov = vgs - vth;
            (
                0.5 * beta * vov * vov * (1.0 + self.params.lambda * vds),
                Region::Triode,
            )
        };
        Ok(result)
    }

    /// Evaluate the device at its stored terminal voltages, recording the
    /// region and current.
    pub fn evaluate(&mut self) -> Result<(f64, Region)> {
        let (id, region) = self.current_at(self.vg, self.vd, self.vs)?;
        self.id = id;
        self.region = Some(region);
        Ok((id, region))
    }

    /// Transconductance dId/dVg by forward difference at the stored bias.
    ///
    /// Diagnostic only: the stored terminal voltages, region and current
    /// are left as they were.
    pub fn transconductance(&self) -> Result<f64> {
        let (i0, _) = self.current_at(self.vg, self.vd, self.vs)?;
        let (i1, _) = self.current_at(self.vg + GM_STEP, self.vd, self.vs)?;
        Ok((i1 - i0) / GM_STEP)
    }
}
