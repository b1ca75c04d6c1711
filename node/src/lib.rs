//! Config loading, component wiring, command dispatch, and the HTTP
//! surface — the deployable process that wraps `pay-core`.

pub mod command;
pub mod config;
pub mod http;
pub mod kms_provider;
pub mod mock;
