//! # Annex Guard
//!
//! Classifies cosmetic ingredient lists against the EU Annex II list of
//! prohibited substances. Each ingredient comes back SAFE, WARNING (a
//! probable misspelling of a prohibited substance), or PROHIBITED, with
//! CMR annotations where the dataset has them.
//!
//! The matching pipeline itself lives in [`annex_guard_core`]; this crate
//! adds configuration, dataset loading, the `annexg` CLI, and the HTTP
//! server.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────────────┐
//! │ Annex II     │──▶│ ReferenceIndex + overrides │
//! │ dataset.json │   └─────────────┬─────────────┘
//! └──────────────┘                 │
//!                                  ▼
//!   text ──▶ AnalysisPipeline ──▶ ResultCache ──▶ Matcher
//!                │
//!        ┌───────┴───────┐
//!        ▼               ▼
//!   ┌──────────┐   ┌──────────┐
//!   │   CLI    │   │   HTTP   │
//!   │ (annexg) │   │  (jobs)  │
//!   └──────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! annexg peek                                   # inspect the dataset
//! annexg analyze "Aqua, Glycerin, Hydroquinone" # one-shot analysis
//! annexg serve                                  # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`dataset`] | Dataset file loading and versioning |
//! | [`engine`] | Builds the pipeline from configuration |
//! | [`analyze`] | `annexg analyze` |
//! | [`peek`] | `annexg peek` |
//! | [`server`] | HTTP server |

pub mod analyze;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod peek;
pub mod server;
