//! Infrastructure adapters and runtime bootstrap.

pub mod assets;
pub mod cache;
pub mod error;
pub mod http;
pub mod telemetry;
