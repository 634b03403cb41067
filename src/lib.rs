//! playbooks - mine winning content formulas and test them
//!
//! This crate provides:
//! - Ranking of top-performing content per format over a lookback window
//! - Pattern extraction and evidence scoring into reusable playbooks
//! - Deterministic variant generation for each playbook
//! - Experiments with automatic attribution of new content to variants

pub mod commands;
pub mod config;
pub mod error;
pub mod evidence;
pub mod experiment;
pub mod extract;
pub mod meta;
pub mod models;
pub mod playbook;
pub mod progress;
pub mod rank;
pub mod tracking;
pub mod variant;

pub use config::Config;
pub use error::{Error, Result};
