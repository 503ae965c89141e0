//! CLI Commands

pub mod config;
pub mod probe;
pub mod scenario;
