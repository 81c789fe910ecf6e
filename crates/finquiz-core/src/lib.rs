//! finquiz-core: Test session state machine, timer, and scoring.
//!
//! This crate defines the data model, the collaborator traits, and the
//! session controller that the rest of finquiz builds on.

pub mod catalog;
pub mod context;
pub mod error;
pub mod model;
pub mod parser;
pub mod report;
pub mod score;
pub mod session;
pub mod timer;
pub mod traits;
