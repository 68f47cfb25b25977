//! Prometheus metrics backend for the reminder scheduler.
//!
//! This crate provides a [`PrometheusSweepMetrics`] implementation of
//! [`remind_core::SweepMetrics`] that exposes sweep telemetry in Prometheus
//! format.
//!
//! ## Metrics
//! - `remind_sweeps_total{outcome}` - Counter (`completed` | `aborted`)
//! - `remind_tasks_examined_total` - Counter
//! - `remind_notifications_total{outcome}` - Counter (`delivered` | `failed` | `lost_race`)
//! - `remind_sweep_duration_seconds` - Histogram
//!
//! ## HTTP Server
//! This crate does NOT provide an HTTP server for the `/metrics` endpoint.
//! Use your application's existing HTTP framework (axum, warp, etc) to
//! encode [`PrometheusSweepMetrics::gather`] output with a `TextEncoder`.

mod backend;
pub use backend::PrometheusSweepMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
