//! Connection resolution: configured connections, discovery, URI canonicalization.

pub mod discovery;
pub mod resolver;

pub use discovery::MemoryDiscovery;
pub use resolver::{update_connection, validate_connection, HttpConnectionResolver};
