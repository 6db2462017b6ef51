//! Murmur: a social-feed backend with keyset pagination, a version-gated
//! post cache and fan-out personal feeds.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
