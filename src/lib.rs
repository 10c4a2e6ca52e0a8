//! GAFFER — Automated roster-trading agent for fantasy football markets
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod roster;
pub mod pricing;
pub mod learner;
pub mod search;
