//! Server-rendered blog front-end backed by the Prismic headless CMS.

pub mod application;
pub mod cms;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
pub mod util;
