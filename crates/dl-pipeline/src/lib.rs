//! DriveLens pipeline — library crate for the detection-to-strategy flow.
//!
//! Re-exports all modules so the binary (`main.rs`) and external crates
//! (e.g. `dl-e2e-tests`) can reach `Orchestrator`, `OpenAiVisionClient`,
//! and the pure prompt/parser functions.

pub mod config;
pub mod detector;
pub mod error;
pub mod inference;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
