//! API exposure modules
//!
//! Each exposure type consumes a `JsonApiHost` and produces a Router for its protocol.

pub mod rest;

pub use rest::RestExposure;
