//! Application wiring

pub mod handler;
pub mod options;
pub mod run;
