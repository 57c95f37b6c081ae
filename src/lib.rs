//! csroll core library.
//!
//! This crate rolls the C# sources of a `.sln`/`.slnx` solution into one
//! reviewable artifact, with project manifests and diagnostics attached
//! where they belong.
//!
//! High-level modules:
//! - `cli`: CLI argument parsing (binary uses this).
//! - `config`: Discovery and effective configuration resolution.
//! - `solution`: Solution discovery, project listing and selection.
//! - `resolver`: Per-project source resolution with ordered fallback.
//! - `evaluate`: Build-evaluation interface and the manifest reader.
//! - `filter` / `paths` / `merge`: Inclusion rules, path identity, file sets.
//! - `analysis` / `diagnostics`: Analysis engine interface and bucketing.
//! - `roll`: Assembly of the final bundle.
//! - `writer`: `.cs` / `.md` rendering.
//! - `output`: Human/JSON run reports.
//! - `logging`: `tracing` subscriber setup.
pub mod analysis;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod evaluate;
pub mod filter;
pub mod logging;
pub mod merge;
pub mod models;
pub mod output;
pub mod paths;
pub mod resolver;
pub mod roll;
pub mod solution;
pub mod writer;
