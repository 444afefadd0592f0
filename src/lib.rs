#![deny(missing_docs)]

//! Core library for cvlens: document ingestion, the analysis gateway, and the resilient
//! request orchestrator that ties them together.

/// HTTP routing and handlers for the gateway server.
pub mod api;
/// Caller-driven cancellation signals.
pub mod cancel;
/// Environment-driven configuration management.
pub mod config;
/// Gateway contract, upstream adapter, and proxy client.
pub mod gateway;
/// Document validation and text extraction.
pub mod ingest;
/// Structured logging and tracing setup.
pub mod logging;
/// Gateway traffic counters.
pub mod metrics;
/// Retry/backoff state machine over the gateway.
pub mod orchestrator;
