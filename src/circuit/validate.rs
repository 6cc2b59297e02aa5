//! Circuit validation.

use std::collections::HashMap;

use crate::error::{MosdcError, Result};

use super::types::{DeviceId, Role};
use super::Circuit;

/// Validate a circuit before solving.
///
/// Checks:
/// - There is at least one device and one floating node
/// - Every floating node touches a terminal that carries current
/// - Every device terminal is wired exactly once
pub fn validate_circuit(circuit: &Circuit) -> Result<()> {
    if circuit.devices.is_empty() {
        return Err(MosdcError::InvalidTopology {
            message: "Circuit has no devices".to_string(),
        });
    }

    if circuit.num_nodes() == 0 {
        return Err(MosdcError::InvalidTopology {
            message: "Circuit has no floating nodes to solve".to_string(),
        });
    }

    for node in circuit.nodes() {
        if !node.connections().carries_current() {
            return Err(MosdcError::underdetermined(
                &node.name,
                "only gates are attached",
            ));
        }
    }

    let mut wired: HashMap<(DeviceId, Role), usize> = HashMap::new();
    for node in circuit.nodes() {
        for role in Role::ALL {
            for &id in node.connections().get(role) {
                *wired.entry((id, role)).or_default() += 1;
            }
        }
    }
    for fixed in circuit.fixed_nodes() {
        for &(id, role) in &fixed.terminals {
            *wired.entry((id, role)).or_default() += 1;
        }
    }

    for (index, device) in circuit.devices.iter().enumerate() {
        let id = DeviceId(index);
        for role in Role::ALL.into_iter().filter(|&r| device.has_role(r)) {
            match wired.get(&(id, role)).copied().unwrap_or(0) {
                1 => {}
                0 => {
                    return Err(MosdcError::InvalidTopology {
                        message: format!("{} {} is not connected", device.name(), role),
                    })
                }
                n => {
                    return Err(MosdcError::InvalidTopology {
                        message: format!("{} {} is connected {} times", device.name(), role, n),
                    })
                }
            }
        }
    }

    Ok(())
}
