// runbookpilot-providers/src/lib.rs
// ============================================================================
// Module: Reference Adapters And Enrichment Sources
// Description: Concrete implementations of the engine's Adapter and
//              EnrichmentSource interfaces.
// Purpose: Give a deployment working building blocks — an HTTP-dispatching
//          adapter for SIEM/EDR/ticketing webhooks, a no-op adapter for
//          display-only and read-only demo steps, and enrichment sources
//          over HTTP, a static JSON/YAML fixture, and the alert's own
//          timestamp — without the engine itself embedding any concrete
//          integration.
// Dependencies: runbookpilot-core, reqwest, serde_json, serde_yaml, time, tokio
// ============================================================================

//! ## Overview
//! Everything here is a reference implementation, not a requirement: the
//! engine only ever depends on `runbookpilot_core::Adapter` and
//! `runbookpilot_core::EnrichmentSource`. Real SIEM/EDR/ticketing
//! integrations are expected to implement the same traits with their own
//! client libraries.

pub mod http_adapter;
pub mod http_source;
pub mod json_source;
pub mod noop_adapter;
pub mod time_source;

pub use http_adapter::HttpAdapter;
pub use http_adapter::HttpAdapterConfig;
pub use http_source::HttpEnrichmentSource;
pub use http_source::HttpEnrichmentSourceConfig;
pub use json_source::JsonFixtureSource;
pub use json_source::JsonFixtureSourceConfig;
pub use noop_adapter::NoopAdapter;
pub use time_source::TimeEnrichmentSource;
