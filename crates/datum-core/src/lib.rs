//! Core types and utilities for the datum transformer.
//!
//! This crate provides the record type, the validated transformation
//! configuration and the error type shared by the transform engine and
//! the workspace tools.

pub mod cli;
pub mod config;
pub mod error;
pub mod types;

pub use cli::*;
pub use config::*;
pub use error::{Error, Result};
pub use types::*;
