//! Adapters for external services.

pub mod agenthq;
