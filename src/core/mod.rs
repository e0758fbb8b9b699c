//! Core domain models
//!
//! Run state, manifests, configuration and the step abstraction the loops
//! are assembled from.

pub mod config;
pub mod error;
pub mod manifest;
pub mod state;
pub mod step;

pub use error::PipelineError;
pub use state::*;
pub use step::*;
