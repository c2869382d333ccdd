//! Production entities, the branch navigator and active-leaf markers.

pub mod active;
pub mod branch;
pub mod production;
pub mod setting;
pub mod turn;

pub use active::ActiveTurns;
pub use production::Production;
pub use setting::{Scenario, World};
pub use turn::{ContentField, Turn, TurnContent, TurnRole, VectorField, Vectors};
