//! The `pay-common` crate contains types and functionality shared between
//! the payment core and the node binary: the ambient stack (errors, config,
//! task/shutdown primitives) and the wire-level domain model.

/// Retry-delay schedules for chain submission and ad-hoc jobs.
pub mod backoff;
/// User-facing decimal amounts and the SPL tokens they move.
pub mod amount;
/// Process configuration, read from double-underscore env vars.
pub mod config;
/// Entities and the transaction state machine.
pub mod domain;
/// The stable error-code taxonomy and HTTP status mapping.
pub mod error;
/// Hex encode/decode.
pub mod hex;
/// A single-slot coalescing wake-up channel.
pub mod notify;
/// Random number generation.
pub mod rng;
/// A broadcastable, resubscribable shutdown signal.
pub mod shutdown;
/// A thin `#[must_use]` wrapper around spawned tasks.
pub mod task;
