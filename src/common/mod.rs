//! Common utilities and shared functionality
//!
//! Identifiers, collaborator traits and configuration loading shared by the
//! engine and its host.

pub mod types;
pub mod config;
pub mod traits;
