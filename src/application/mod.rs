//! Application services: feed assembly, page chrome, streaming and export.

pub mod chrome;
pub mod error;
pub mod export;
pub mod feed;
pub mod pagination;
pub mod stream;
