//! Startup inputs: environment settings and the command dictionary

pub mod dictionary;
pub mod settings;
