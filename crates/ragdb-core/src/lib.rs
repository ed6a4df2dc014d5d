//! Shared data model, collaborator traits, errors and configuration for the
//! hybrid retrieval workspace.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod traits;
pub mod types;
