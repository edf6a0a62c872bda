//! Observability infrastructure.
//!
//! Provides:
//! - Structured logging via tracing-subscriber
//! - OpenTelemetry metrics for delivery and persistence

pub mod metrics;
pub mod tracing;
