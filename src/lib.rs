//! Cirrus — lower backend-neutral infrastructure intents into cloud resources.
//!
//! Intents and a typed node graph go in; a deduplicated, dependency-ordered
//! resource plan comes out. Plans link against live provider objects at
//! execution time and deploy or preview on a named stack.

pub mod cli;
pub mod core;
pub mod deploy;
pub mod link;
pub mod lowerers;
