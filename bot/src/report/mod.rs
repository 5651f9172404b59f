//! Status reporting: inline chat replies and the audit webhook

pub mod audit;
pub mod messages;
pub mod reporter;
