//! Infrastructure adapters: storage, HTTP, telemetry.

pub mod db;
pub mod error;
pub mod http;
pub mod memory;
pub mod telemetry;
