//! Hive trust CRD definitions
//!
//! Typed views of the third-party resources the trust propagation controller
//! reads and writes. None of these CRDs are owned by this project, so schema
//! generation is disabled and every spec keeps the fields it does not model
//! in a flattened map, which makes a read-modify-replace cycle lossless.

pub mod api_server;
pub mod cluster_deployment;
pub mod hive_config;
pub mod names;
pub mod references;

pub use api_server::*;
pub use cluster_deployment::*;
pub use hive_config::*;
pub use references::*;
