//! Infrastructure adapters: providers, persistence, packages, config.

pub mod config;
pub mod package;
pub mod providers;
pub mod sqlite;
