//! Deploy command pipeline

pub mod attempt;
pub mod command;
pub mod executor;
pub mod gate;
pub mod validate;
