// src/transport/mod.rs - Transport Layer
//! HTTP transport exposing the engines to the admin console

pub mod rest;

pub use rest::{create_router, ApiState};
