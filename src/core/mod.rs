//! Core pipeline — types, parsing, dependency resolution, lowering, planning.

pub mod deps;
pub mod orchestrator;
pub mod parser;
pub mod planner;
pub mod registry;
pub mod types;
