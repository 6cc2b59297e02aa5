//! Circuit representation and validation.
//!
//! A [`Circuit`] owns every device in one table and refers to them by
//! [`DeviceId`]. Floating [`Node`]s keep the IDs of the terminals they touch;
//! driven nodes push their fixed voltage into theirs.

mod graph;
mod node;
mod types;
mod validate;

pub use graph::{Circuit, FixedNode};
pub use node::{Bracket, Connections, Node, NodeSolution};
pub use types::*;
pub use validate::validate_circuit;
