//! Subcommand implementations.

pub mod batch;
pub mod common;
pub mod config;
pub mod info;
pub mod value;
