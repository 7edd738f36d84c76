//! coinscout - crypto analysis relay
//!
//! This library provides the request-validation and upstream-relay pipeline
//! behind the coinscout server: configuration, request types, payload
//! building, and the LLM and price-data clients.

pub mod config;
pub mod error;
pub mod payload;
pub mod relay;
pub mod upstream;

pub use config::Config;
pub use error::{Error, Result};
