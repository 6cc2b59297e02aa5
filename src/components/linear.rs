//! Linear passive components.

use crate::error::{MosdcError, Result};

/// A resistor. Positive current flows from the Hi terminal to the Lo terminal.
#[derive(Debug, Clone)]
pub struct Resistor {
    pub name: String,
    /// Resistance in ohms
    pub resistance: f64,
    /// Hi terminal voltage
    pub vh: f64,
    /// Lo terminal voltage
    pub vl: f64,
    /// Current found by the last evaluation
    pub ir: f64,
}

impl Resistor {
    /// Create a new resistor with both terminals at 0 V.
    pub fn new(name: impl Into<String>, resistance: f64) -> Result<Self> {
        let name = name.into();
        if !(resistance > 0.0) || !resistance.is_finite() {
            return Err(MosdcError::InvalidParameter {
                message: format!("resistor '{}' needs a positive finite resistance", name),
            });
        }
        Ok(Self {
            name,
            resistance,
            vh: 0.0,
            vl: 0.0,
            ir: 0.0,
        })
    }

    /// Current at the given terminal voltages, (Vh - Vl) / R.
    pub fn current_at(&self, vh: f64, vl: f64) -> f64 {
        (vh - vl) / self.resistance
    }

    /// Evaluate at the stored terminal voltages and record the current.
    pub fn evaluate(&mut self) -> f64 {
        self.ir = self.current_at(self.vh, self.vl);
        self.ir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resistor_current_direction() {
        let mut r = Resistor::new("R1", 2500.0).unwrap();
        r.vh = 5.0;
        r.vl = 0.0;
        assert!((r.evaluate() - 0.002).abs() < 1e-12);

        // No polarity constraint: reversed bias just flips the sign.
        r.vh = 0.0;
        r.vl = 5.0;
        assert!((r.evaluate() + 0.002).abs() < 1e-12);
        assert!((r.ir + 0.002).abs() < 1e-12);
    }

    #[test]
    fn test_resistor_rejects_non_positive() {
        assert!(Resistor::new("R0", 0.0).is_err());
        assert!(Resistor::new("Rn", -10.0).is_err());
        assert!(Resistor::new("Rnan", f64::NAN).is_err());
    }
}
