//! Server module for exposing the resource graph over HTTP
//!
//! `ServerBuilder` assembles a [`JsonApiHost`] from a resource graph, options,
//! a data source and resource definitions; [`RestExposure`] turns the host
//! into an Axum router.

pub mod builder;
pub mod exposure;
pub mod host;

pub use builder::ServerBuilder;
pub use exposure::RestExposure;
pub use host::JsonApiHost;
