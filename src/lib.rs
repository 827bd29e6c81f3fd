//! Live contest feed ingestion and event-sourcing adapter pipeline.
//!
//! Consumes a CLICS-like contest event feed, normalizes it into an immutable
//! contest model, derives computed facts through a chain of composable
//! adapter stages (hidden propagation, first-to-solve, score differences,
//! freeze redaction, finalization, tuning overrides, emulation replay), and
//! republishes a stream of minimal "latest known value" updates.
//!
//! # Examples
//!
//! Driving the adapter chain directly:
//! ```
//! use std::sync::Arc;
//! use scorefeed::{
//!     adapters::{Pipeline, PipelineConfig},
//!     model::{contest::ContestInfo, run::RunInfo},
//!     types::ResultKind,
//!     update::ContestUpdate,
//! };
//!
//! let mut pipeline = Pipeline::new(&PipelineConfig::default());
//! let info = Arc::new(ContestInfo::new("demo", ResultKind::Icpc));
//! let out = pipeline.process(ContestUpdate::Info(info));
//! assert!(matches!(out[0], ContestUpdate::Info(_)));
//! let out = pipeline.process(ContestUpdate::Run(RunInfo::pending("1", "a", "t1", 60_000)));
//! assert_eq!(out.len(), 1);
//! ```
//!
//! End-to-end over a local feed file:
//! ```no_run
//! use scorefeed::{
//!     feed::{spawn_ingest, transport::{FeedConfig, FeedSourceConfig}},
//!     runtime::handle::{RuntimeConfig, spawn_pipeline},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let updates = spawn_ingest(FeedConfig::single(FeedSourceConfig::new("event-feed.ndjson")));
//! let handle = spawn_pipeline(updates, None, RuntimeConfig::default());
//! let mut events = handle.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # }
//! ```

/// Composable stream transformation stages.
pub mod adapters;
/// Append-only update journal used for replay and multi-day bundles.
pub mod archive;
/// Grouped-run incremental recompute primitive.
pub mod engine;
/// Feed transport, event model, and protocol normalization.
pub mod feed;
/// Contest entity model.
pub mod model;
/// Single-writer pipeline runtime and handle.
pub mod runtime;
/// Event-sourced contest state snapshots.
pub mod state;
/// Shared primitive types and enums.
pub mod types;
/// Downstream update events.
pub mod update;
