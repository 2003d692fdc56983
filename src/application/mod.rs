//! Application-level composition of services and adapters.

pub mod guarded_client;

pub use guarded_client::GuardedAgentClient;
