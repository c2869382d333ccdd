//! Troupe — productions.
//!
//! Worlds and scenarios set the stage, a production binds them to a cast,
//! and turns form a parent-pointer tree whose branches are navigated here.

pub mod domain;
