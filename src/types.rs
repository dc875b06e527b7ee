//! Core data types, enums, and reports for the Tojiru batch pipeline.
//!
//! This module defines the fundamental data structures used throughout Tojiru:
//! - Work items produced by discovery (`WorkItem`, `WorkItemKind`)
//! - Sizing and resampling settings (`TargetSize`, `SizePolicy`, `ResizeMethod`)
//! - Discovery filters (`SourceKind`)
//! - Per-item and per-batch results (`ItemOutcome`, `ItemReport`, `BatchReport`, `ItemProgress`)

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::path_utils::{file_name_lossy, is_archive_file, output_path_for};

/// Extension given to every output document.
pub const DOCUMENT_EXTENSION: &str = "pdf";

/// Image extensions accepted as pages, compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "tiff", "tif", "webp"];

/// File extensions treated as page archives. Both are plain ZIP containers.
pub const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "cbz"];

/// Directory names (lowercased) that are never treated as collections.
pub const RESERVED_DIR_NAMES: &[&str] = &[
    "build",
    "dist",
    "__pycache__",
    ".cache",
    ".git",
    ".svn",
    ".hg",
    ".vscode",
    ".idea",
];

/// Number of leading members inspected when resolving a shared page size.
pub const SIZE_SAMPLE_LIMIT: usize = 10;

/// Whether a collection is a plain directory or a packed archive.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WorkItemKind {
    Folder,
    Archive,
}

/// One collection to convert into one output document.
///
/// Created by discovery (or [`WorkItem::from_path`]) and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkItem {
    pub kind: WorkItemKind,
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub display_name: String,
}

impl WorkItem {
    /// Builds a work item for an explicit folder or archive path.
    ///
    /// The output document is placed next to the source, named after the folder
    /// or after the archive with its extension replaced.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(format!("Collection does not exist: {:?}", path)));
        }
        let parent = path.parent().unwrap_or_else(|| Path::new(""));
        let display_name = file_name_lossy(path);

        if path.is_dir() {
            let name = path.file_name().ok_or_else(|| {
                Error::InvalidPath(path.to_path_buf(), "Folder has no name".to_string())
            })?;
            Ok(Self {
                kind: WorkItemKind::Folder,
                source_path: path.to_path_buf(),
                output_path: output_path_for(parent, name),
                display_name,
            })
        } else if is_archive_file(path) {
            let stem = path.file_stem().ok_or_else(|| {
                Error::InvalidPath(path.to_path_buf(), "Archive has no name".to_string())
            })?;
            Ok(Self {
                kind: WorkItemKind::Archive,
                source_path: path.to_path_buf(),
                output_path: output_path_for(parent, stem),
                display_name,
            })
        } else {
            Err(Error::Unsupported(format!(
                "'{}' is neither a folder nor a {:?} archive",
                display_name, ARCHIVE_EXTENSIONS
            )))
        }
    }

    /// Title embedded in the output document: the output file name without extension.
    pub fn title(&self) -> String {
        self.output_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.display_name.clone())
    }
}

/// Which kinds of collections discovery should pick up.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SourceKind {
    #[default]
    All,
    Folders,
    Archives,
}

impl SourceKind {
    pub fn accepts(&self, kind: WorkItemKind) -> bool {
        match self {
            SourceKind::All => true,
            SourceKind::Folders => kind == WorkItemKind::Folder,
            SourceKind::Archives => kind == WorkItemKind::Archive,
        }
    }
}

/// Shared page geometry in pixels.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<(u32, u32)> for TargetSize {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for TargetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How the shared page geometry is derived from the sampled images.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SizePolicy {
    /// Most frequent exact size in the sample; ties go to the size seen first.
    #[default]
    Auto,
    /// Per-axis maximum of the sample.
    Max,
    /// Per-axis minimum of the sample.
    Min,
    /// Caller-supplied size, used verbatim.
    Fixed(u32, u32),
}

/// How a page is brought to the shared geometry.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResizeMethod {
    /// Scale uniformly to fit inside the target and pad with white.
    #[default]
    Fit,
    /// Scale uniformly to cover the target and crop the overflow around the center.
    Fill,
    /// Scale each axis independently to the target.
    Stretch,
}

/// Result of converting one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ItemOutcome {
    /// A document with this many pages was written.
    Converted { pages: usize },
    /// The collection had no usable images; nothing was written.
    Empty,
    /// The output already existed and overwriting was not requested.
    Skipped,
    /// The collection could not be converted; nothing was written.
    Failed(String),
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, ItemOutcome::Failed(_))
    }
}

impl From<Result<usize>> for ItemOutcome {
    fn from(result: Result<usize>) -> Self {
        match result {
            Ok(0) => ItemOutcome::Empty,
            Ok(pages) => ItemOutcome::Converted { pages },
            Err(e) => ItemOutcome::Failed(e.to_string()),
        }
    }
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemOutcome::Converted { pages } => write!(f, "converted ({} pages)", pages),
            ItemOutcome::Empty => write!(f, "no images, nothing to do"),
            ItemOutcome::Skipped => write!(f, "skipped, output exists"),
            ItemOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Outcome of one work item inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemReport {
    pub display_name: String,
    pub output_path: PathBuf,
    pub outcome: ItemOutcome,
}

/// Aggregate result of a batch run. Items are listed in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    /// True when some items ran on the sequential fallback path.
    pub fell_back: bool,
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.total - self.succeeded
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemReport> {
        self.items.iter().filter(|r| !r.outcome.is_success())
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} succeeded", self.succeeded, self.total)
    }
}

/// Snapshot passed to the progress callback once per finished item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemProgress {
    pub display_name: String,
    pub success: bool,
    pub completed: usize,
    pub total: usize,
}

/// Progress hook invoked from the coordinating thread.
pub type ProgressCallback = Arc<dyn Fn(&ItemProgress) + Send + Sync + 'static>;
