use std::path::{Path, PathBuf};

use log::info;
use tokio::fs::try_exists;
use tokio::task::spawn_blocking;

use crate::assembler::Assembler;
use crate::collector::Collector;
use crate::engine::{Engine, default_worker_count};
use crate::error::{Error, Result};
use crate::generator::pdf::DEFAULT_JPEG_QUALITY;
use crate::path_utils::validate_base_dir;
use crate::types::{
    BatchReport, ItemOutcome, ProgressCallback, ResizeMethod, SizePolicy, SourceKind, WorkItem,
};

/// The main Tojiru batch configuration, built declaratively using the builder pattern.
///
/// A configuration describes where collections live and how their pages are
/// normalized. Once built it can be used through these entry points:
///
/// - [`discover`](TojiruConfig::discover): List the collections that would be converted
/// - [`convert_batch`](TojiruConfig::convert_batch): Convert every pending collection in `base_dir`
/// - [`convert_single`](TojiruConfig::convert_single): Convert one explicit folder or archive
///
/// ## Builder Pattern
///
/// ```rust,no_run
/// # use tojiru::prelude::*;
/// # use std::path::PathBuf;
/// let config = TojiruConfig::builder()
///     .base_dir(PathBuf::from("./scans"))
///     .uniform_sizing(true)
///     .resize_method(ResizeMethod::Fill)
///     .build()
///     .expect("Invalid configuration");
/// ```
#[derive(Clone, derive_builder::Builder)]
#[builder(setter(into, strip_option), build_fn(validate = "Self::validate"))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TojiruConfig {
    /// Directory whose immediate children are converted.
    ///
    /// Output documents are written into this directory, next to their sources.
    /// Required for [`discover`](TojiruConfig::discover) and
    /// [`convert_batch`](TojiruConfig::convert_batch).
    #[builder(default)]
    pub base_dir: PathBuf,

    /// Which collections discovery picks up.
    ///
    /// - [`SourceKind::All`]: Folders and archives
    /// - [`SourceKind::Folders`]: Only subdirectories
    /// - [`SourceKind::Archives`]: Only `.zip` / `.cbz` files
    #[builder(default)]
    pub source_kind: SourceKind,

    /// Bring every page of a document to one shared size.
    #[builder(default = "false")]
    pub uniform_sizing: bool,

    /// How the shared size is chosen when [`uniform_sizing`](TojiruConfig::uniform_sizing) is on.
    #[builder(default)]
    pub size_policy: SizePolicy,

    /// How pages reach the shared size.
    #[builder(default)]
    pub resize_method: ResizeMethod,

    /// Number of collections converted concurrently.
    ///
    /// Defaults to half the logical CPUs, at least one.
    #[builder(default)]
    pub max_workers: Option<usize>,

    /// JPEG quality (1-100) of the page images.
    #[builder(default = "DEFAULT_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// Called once per finished collection during a batch.
    #[builder(default)]
    #[cfg_attr(feature = "serde", serde(skip))]
    pub progress_callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for TojiruConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TojiruConfig")
            .field("base_dir", &self.base_dir)
            .field("source_kind", &self.source_kind)
            .field("uniform_sizing", &self.uniform_sizing)
            .field("size_policy", &self.size_policy)
            .field("resize_method", &self.resize_method)
            .field("max_workers", &self.max_workers)
            .field("jpeg_quality", &self.jpeg_quality)
            .field(
                "progress_callback",
                if self.progress_callback.is_some() {
                    &"Some(Function)"
                } else {
                    &"None"
                },
            )
            .finish()
    }
}

impl TojiruConfig {
    /// Creates a new builder for configuring `TojiruConfig`.
    pub fn builder() -> TojiruConfigBuilder {
        TojiruConfigBuilder::default()
    }

    /// Checks that `base_dir` is set, exists and is a directory.
    ///
    /// [`discover`](TojiruConfig::discover) and [`convert_batch`](TojiruConfig::convert_batch)
    /// call this automatically.
    ///
    /// # Returns
    ///
    /// * `Ok(&self)` - The base directory can be scanned
    /// * `Err(Error::Discovery)` - It cannot
    pub fn preflight_check(&self) -> Result<&Self> {
        validate_base_dir(&self.base_dir)?;
        Ok(self)
    }

    /// Assembly settings derived from this configuration.
    pub fn assembler(&self) -> Assembler {
        Assembler {
            uniform_sizing: self.uniform_sizing,
            size_policy: self.size_policy,
            resize_method: self.resize_method,
            jpeg_quality: self.jpeg_quality,
            overwrite: false,
        }
    }

    /// Execution engine derived from this configuration.
    pub fn engine(&self) -> Engine {
        Engine::new(self.assembler())
            .workers(self.max_workers.unwrap_or_else(default_worker_count))
            .progress(self.progress_callback.clone())
    }

    /// Lists the collections in `base_dir` that have no output document yet.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<WorkItem>)` - Pending collections in natural order
    /// * `Err(Error::Discovery)` - The base directory is unusable
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use tojiru::prelude::*;
    /// # use std::path::PathBuf;
    /// # #[tokio::main]
    /// # async fn main() -> tojiru::error::Result<()> {
    /// let config = TojiruConfig::builder()
    ///     .base_dir(PathBuf::from("./scans"))
    ///     .build()?;
    ///
    /// for item in config.discover().await? {
    ///     println!("{} -> {:?}", item.display_name, item.output_path);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn discover(&self) -> Result<Vec<WorkItem>> {
        self.preflight_check()?;
        Collector::new(&self.base_dir, self.source_kind)
            .discover()
            .await
    }

    /// Converts every pending collection in `base_dir`.
    ///
    /// Collections are converted concurrently. A failing collection never aborts
    /// the batch; its reason is recorded in the returned report.
    ///
    /// # Returns
    ///
    /// * `Ok(BatchReport)` - Per-collection outcomes and the success count
    /// * `Err(Error)` - Discovery failed, nothing was converted
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use tojiru::prelude::*;
    /// # use std::path::PathBuf;
    /// # #[tokio::main]
    /// # async fn main() -> tojiru::error::Result<()> {
    /// let report = TojiruConfig::builder()
    ///     .base_dir(PathBuf::from("./scans"))
    ///     .build()?
    ///     .convert_batch()
    ///     .await?;
    ///
    /// println!("{}", report);
    /// for failure in report.failures() {
    ///     eprintln!("{}: {}", failure.display_name, failure.outcome);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn convert_batch(&self) -> Result<BatchReport> {
        let items = self.discover().await?;
        let engine = self.engine();
        let report = spawn_blocking(move || engine.run(items)).await?;
        info!("Batch finished: {}", report);
        Ok(report)
    }

    /// Converts one explicit folder or archive.
    ///
    /// # Arguments
    ///
    /// * `path` - The folder or `.zip` / `.cbz` file to convert
    /// * `overwrite` - Replace an existing output document instead of skipping
    ///
    /// # Returns
    ///
    /// * `Ok(ItemOutcome)` - `Skipped` if the output exists and `overwrite` is false,
    ///   otherwise the result of the conversion (which may be `Failed`)
    /// * `Err(Error::NotFound | Error::Unsupported)` - The path is not a collection
    pub async fn convert_single(
        &self,
        path: impl AsRef<Path>,
        overwrite: bool,
    ) -> Result<ItemOutcome> {
        let item = WorkItem::from_path(path.as_ref())?;

        if !overwrite && try_exists(&item.output_path).await? {
            info!(
                "Skipping '{}': {:?} already exists",
                item.display_name, item.output_path
            );
            return Ok(ItemOutcome::Skipped);
        }

        let assembler = Assembler {
            overwrite,
            ..self.assembler()
        };
        let engine = Engine::new(assembler)
            .workers(1)
            .progress(self.progress_callback.clone());
        let report = spawn_blocking(move || engine.run(vec![item])).await?;
        report
            .items
            .into_iter()
            .next()
            .map(|r| r.outcome)
            .ok_or_else(|| Error::Other("Engine returned no outcome".to_string()))
    }
}

impl TojiruConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(quality) = self.jpeg_quality {
            if !(1..=100).contains(&quality) {
                return Err(format!("JPEG quality must be between 1 and 100, got {}", quality));
            }
        }

        if let Some(Some(0)) = self.max_workers {
            return Err("max_workers must be at least 1".to_string());
        }

        if let Some(SizePolicy::Fixed(width, height)) = self.size_policy {
            if width == 0 || height == 0 {
                return Err(format!("Fixed page size must be non-zero, got {}x{}", width, height));
            }
            // Largest page the JPEG encoder accepts.
            let limit = u32::from(u16::MAX);
            if width > limit || height > limit {
                return Err(format!(
                    "Fixed page size must be at most {}x{}, got {}x{}",
                    limit, limit, width, height
                ));
            }
        }

        Ok(())
    }
}
