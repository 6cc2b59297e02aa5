//! Core types for circuit representation.

use std::fmt;

/// Index of a floating node in the circuit's node table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// Index of a device in the circuit's device table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub usize);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D{}", self.0)
    }
}

/// Index of a driven (fixed-voltage) node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedId(pub usize);

impl fmt::Display for FixedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}", self.0)
    }
}

/// The terminal through which a node touches a device.
///
/// Drain, Source and Gate belong to MOS devices; ResistHi and ResistLo
/// belong to resistors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Drain,
    Source,
    Gate,
    ResistHi,
    ResistLo,
}

impl Role {
    /// All roles, in the order a node pushes trial voltages into them.
    pub const ALL: [Role; 5] = [
        Role::Gate,
        Role::Drain,
        Role::Source,
        Role::ResistHi,
        Role::ResistLo,
    ];

    /// Check if this role is a MOS terminal.
    pub fn is_mos(&self) -> bool {
        matches!(self, Role::Drain | Role::Source | Role::Gate)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Drain => "drain",
            Role::Source => "source",
            Role::Gate => "gate",
            Role::ResistHi => "resistor hi",
            Role::ResistLo => "resistor lo",
        };
        f.write_str(name)
    }
}
