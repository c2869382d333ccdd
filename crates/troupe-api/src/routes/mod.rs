//! Route modules, one per resource.

pub mod assistants;
pub mod health;
pub mod models;
pub mod personas;
pub mod productions;
pub mod session;
pub mod turns;

#[cfg(test)]
pub(crate) mod testing;
