//! Tojiru - Batch Image Folder to PDF Binding Library
//!
//! This crate turns directories full of page images into one PDF per collection.
//! A collection is either a subdirectory of images or a `.zip` / `.cbz` archive.
//! Pages are ordered naturally (`page2` before `page10`), converted to RGB and
//! optionally brought to one shared size. Collections are converted concurrently,
//! each one all-or-nothing: a single unreadable page fails that collection and
//! leaves no output behind.
//!
//! # Getting Started
//!
//! Configure a run with `TojiruConfig`'s builder, then call one of its entry points.
//!
//! ```rust,no_run
//! use tojiru::prelude::*;
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> tojiru::error::Result<()> {
//!     let progress: ProgressCallback = Arc::new(|p: &ItemProgress| {
//!         println!("[{}/{}] {} {}", p.completed, p.total, p.display_name,
//!                  if p.success { "ok" } else { "FAILED" });
//!     });
//!
//!     // 1. Describe the run
//!     let config = TojiruConfig::builder()
//!         .base_dir(PathBuf::from("./scans"))
//!         .source_kind(SourceKind::All)
//!         .uniform_sizing(true)
//!         .size_policy(SizePolicy::Auto)
//!         .resize_method(ResizeMethod::Fit)
//!         .progress_callback(progress)
//!         .build()?;
//!
//!     // Optional: fail early on a bad base directory
//!     config.preflight_check()?;
//!
//!     // 2. Convert everything that has no PDF yet
//!     let report = config.convert_batch().await?;
//!     println!("{}", report);
//!
//!     Ok(())
//! }
//! ```
//!
//! Running the same batch again converts nothing: collections whose PDF already
//! exists are skipped during discovery.

pub mod assembler;
pub mod collector;
pub mod engine;
pub mod error;
pub mod generator;
pub mod natural;
pub mod normalizer;
pub mod path_utils;
pub mod sizing;
pub mod tojiru;
pub mod types;

// Publicly expose the main `TojiruConfig` struct and its builder
pub use tojiru::TojiruConfig;
pub use tojiru::TojiruConfigBuilder;

// Re-export error and core types for direct access
pub use types::{
    BatchReport, ItemOutcome, ItemProgress, ItemReport, ProgressCallback, ResizeMethod,
    SizePolicy, SourceKind, TargetSize, WorkItem, WorkItemKind,
};

/// Prelude module for convenient imports.
///
/// Re-exports the most commonly used types so that `use tojiru::prelude::*;`
/// is enough to configure and run a batch.
pub mod prelude {
    pub use super::{
        BatchReport, ItemOutcome, ItemProgress, ItemReport, ProgressCallback, ResizeMethod,
        SizePolicy, SourceKind, TargetSize, TojiruConfig, TojiruConfigBuilder, WorkItem,
        WorkItemKind, error, generator, types,
    };
    pub use crate::assembler::Assembler;
    pub use crate::collector::Collector;
    pub use crate::engine::{Engine, WorkerPool};
    pub use crate::natural::natural_cmp;
    pub use std::path::{Path, PathBuf};
    pub use std::sync::Arc;
}
