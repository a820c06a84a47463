//! # beacon-core
//!
//! Client-embedded telemetry pipeline for mobile applications.
//!
//! This library provides:
//! - Typed telemetry records and their dispatch categories
//! - An event pipeline that queues, batches and retries delivery
//! - A touch-gesture classifier producing tap/long-press/swipe/pinch and
//!   scroll-depth records
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! ```text
//! platform touch/scroll ──→ GestureTracker ──(buffer of 50)──┐
//! collectors ────────────────────────────────────────────────┼──→ Pipeline ──→ Transport
//! errors/crashes ──send_immediate──────────────────────────────────────────↗
//! ```
//!
//! Delivery is best-effort and at-least-once: failed sends are retried on
//! later flushes up to a fixed count and then dropped. No pipeline operation
//! ever returns an error to, or blocks, the host application.

pub use client::{Beacon, BeaconOptions};
pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{Delivery, FlushReport, Pipeline, PipelineHandle, PublishStats};
pub use session::SessionContext;
pub use transport::{Endpoint, HttpTransport, Transport};
pub use types::*;

pub mod client;
pub mod config;
pub mod error;
pub mod gesture;
pub mod logging;
pub mod pipeline;
pub mod session;
pub mod transport;
pub mod types;
