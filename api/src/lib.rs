//! Ingestion and retrieval API for swim-device telemetry, fronting a
//! remote PostgREST-style store.

pub mod devices;
pub mod errors;
pub mod memstore;
pub mod metrics;
pub mod model;
pub mod repo;
pub mod rest;
pub mod seed;
pub mod store;
pub mod validate;
