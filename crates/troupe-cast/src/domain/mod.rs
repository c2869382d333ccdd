//! Cast entities and the visibility resolver.

pub mod assistant;
pub mod model;
pub mod persona;
pub mod relation;
pub mod visibility;

pub use assistant::Assistant;
pub use model::Model;
pub use persona::Persona;
pub use relation::Relation;
