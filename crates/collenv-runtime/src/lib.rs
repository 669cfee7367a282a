//! `collenv-runtime` – The Collision Environment
//!
//! Turns tracked object frames into the collision set a motion planner
//! consumes, cycle after cycle.
//!
//! # Modules
//!
//! - [`collision_set`] – [`CollisionEnvironment`][collision_set::CollisionEnvironment]:
//!   owns the published set, rebuilds it on every
//!   [`update`][collision_set::CollisionEnvironment::update] and hands out the
//!   matching removal batch.
//! - [`config`] – [`CollisionEnvConfig`][config::CollisionEnvConfig]:
//!   TOML configuration with `COLLENV_*` environment overrides and
//!   validation.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.

pub mod collision_set;
pub mod config;
pub mod telemetry;

pub use collision_set::{CollisionEnvironment, UpdateOutcome, mesh_resource_locator};
pub use config::CollisionEnvConfig;
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
