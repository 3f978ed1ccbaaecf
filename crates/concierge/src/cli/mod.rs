//! Command-line interface for building artifacts and querying them locally.

pub mod commands;
pub mod display;
