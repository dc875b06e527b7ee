//! Work-item discovery and member enumeration.
//!
//! Discovery scans the immediate children of a base directory and turns every
//! folder and page archive into a [`WorkItem`]. Member enumeration lists the page
//! images of one work item in natural order so the assembler can load them one
//! at a time.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use futures::future::join_all;
use log::{debug, info, warn};
use tokio::fs::{ReadDir, metadata, read_dir, try_exists};
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::natural::{natural_cmp, natural_cmp_paths};
use crate::normalizer::ImageSource;
use crate::path_utils::{
    entry_base_name, file_name_lossy, is_archive_file, is_hidden_name,
    is_supported_image_name, output_path_for,
};
use crate::types::{RESERVED_DIR_NAMES, SourceKind, WorkItem, WorkItemKind};

/// Finds convertible collections inside a base directory.
#[derive(Debug)]
pub struct Collector<'a> {
    base_directory: &'a Path,
    source_kind: SourceKind,
}

impl<'a> Collector<'a> {
    /// Creates a new Collector for the specified directory.
    ///
    /// # Arguments
    ///
    /// * `base_directory` - Directory whose immediate children are scanned
    /// * `source_kind` - Which kinds of collections to pick up
    pub fn new(base_directory: &'a Path, source_kind: SourceKind) -> Self {
        Self {
            base_directory,
            source_kind,
        }
    }

    /// Lists the work items of the base directory in natural order of their names.
    ///
    /// Items whose output document already exists are left out, so a second run
    /// over a fully converted directory returns nothing. When two items would write
    /// the same output (a folder `a` next to `a.zip`), the first one wins.
    ///
    /// # Returns
    ///
    /// * `Result<Vec<WorkItem>>` - The items to convert, or `Error::Discovery` if the
    ///   base directory cannot be read
    pub async fn discover(&self) -> Result<Vec<WorkItem>> {
        let mut children = self.read_children().await?;
        children.sort_by(|a, b| natural_cmp_paths(a, b));

        let classified = join_all(children.iter().map(|path| self.classify(path))).await;

        let mut claimed_outputs: HashSet<PathBuf> = HashSet::new();
        let mut items = Vec::new();
        for item in classified.into_iter().flatten() {
            match try_exists(&item.output_path).await {
                Ok(false) => {}
                Ok(true) => {
                    info!(
                        "Skipping '{}': {} already exists",
                        item.display_name,
                        file_name_lossy(&item.output_path)
                    );
                    continue;
                }
                // An output we cannot check might exist and must not be replaced.
                Err(e) => {
                    warn!(
                        "Skipping '{}': cannot check {}: {}",
                        item.display_name,
                        file_name_lossy(&item.output_path),
                        e
                    );
                    continue;
                }
            }
            if !claimed_outputs.insert(item.output_path.clone()) {
                warn!(
                    "Skipping '{}': another collection already writes {}",
                    item.display_name,
                    file_name_lossy(&item.output_path)
                );
                continue;
            }
            items.push(item);
        }

        info!(
            "Discovered {} collection(s) in {:?}",
            items.len(),
            self.base_directory
        );
        Ok(items)
    }

    async fn read_children(&self) -> Result<Vec<PathBuf>> {
        let discovery_error =
            |e: std::io::Error| Error::Discovery(self.base_directory.to_path_buf(), e.to_string());

        let mut entries: ReadDir = read_dir(self.base_directory)
            .await
            .map_err(discovery_error)?;
        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(discovery_error)? {
            children.push(entry.path());
        }
        Ok(children)
    }

    /// Turns one child of the base directory into a work item, if it is one.
    async fn classify(&self, path: &Path) -> Option<WorkItem> {
        // Follows symlinks; dangling links are ignored.
        let meta = match metadata(path).await {
            Ok(meta) => meta,
            Err(e) => {
                debug!("Ignoring {:?}: {}", path, e);
                return None;
            }
        };
        let name = path.file_name()?;

        let item = if meta.is_dir() {
            let lowered = name.to_string_lossy().to_lowercase();
            if RESERVED_DIR_NAMES.contains(&lowered.as_str()) {
                debug!("Ignoring reserved directory {:?}", path);
                return None;
            }
            WorkItem {
                kind: WorkItemKind::Folder,
                source_path: path.to_path_buf(),
                output_path: output_path_for(self.base_directory, name),
                display_name: file_name_lossy(path),
            }
        } else if meta.is_file() && is_archive_file(path) {
            WorkItem {
                kind: WorkItemKind::Archive,
                source_path: path.to_path_buf(),
                output_path: output_path_for(self.base_directory, path.file_stem()?),
                display_name: file_name_lossy(path),
            }
        } else {
            return None;
        };

        self.source_kind.accepts(item.kind).then_some(item)
    }
}

/// The page images of one work item, in natural order.
///
/// Archive members stay compressed until [`CollectionMembers::load`] asks for them,
/// so only one page payload is held in memory at a time.
pub enum CollectionMembers {
    Files(Vec<PathBuf>),
    Archive {
        archive: ZipArchive<File>,
        entries: Vec<String>,
    },
}

impl CollectionMembers {
    pub fn len(&self) -> usize {
        match self {
            CollectionMembers::Files(files) => files.len(),
            CollectionMembers::Archive { entries, .. } => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the member at `index`: the file name, or the full entry name inside the archive.
    pub fn name(&self, index: usize) -> Option<String> {
        match self {
            CollectionMembers::Files(files) => files.get(index).map(|p| file_name_lossy(p)),
            CollectionMembers::Archive { entries, .. } => entries.get(index).cloned(),
        }
    }

    /// Produces the payload of the member at `index`.
    ///
    /// Folder members are returned as file references; archive members are
    /// decompressed into memory.
    pub fn load(&mut self, index: usize) -> Result<ImageSource> {
        match self {
            CollectionMembers::Files(files) => files
                .get(index)
                .cloned()
                .map(ImageSource::File)
                .ok_or_else(|| Error::NotFound(format!("No member at index {}", index))),
            CollectionMembers::Archive { archive, entries } => {
                let name = entries
                    .get(index)
                    .ok_or_else(|| Error::NotFound(format!("No member at index {}", index)))?;
                let mut entry = archive.by_name(name)?;
                let mut bytes = Vec::with_capacity(entry.size() as usize);
                entry.read_to_end(&mut bytes)?;
                Ok(ImageSource::Memory {
                    name: name.clone(),
                    bytes,
                })
            }
        }
    }
}

impl std::fmt::Debug for CollectionMembers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionMembers::Files(files) => f.debug_tuple("Files").field(files).finish(),
            CollectionMembers::Archive { entries, .. } => f
                .debug_struct("Archive")
                .field("entries", entries)
                .finish_non_exhaustive(),
        }
    }
}

/// Enumerates the page images of a work item.
///
/// # Arguments
///
/// * `item` - The folder or archive to list
///
/// # Returns
///
/// * `Result<CollectionMembers>` - Supported images in natural order of their base
///   names. Hidden archive entries (`__MACOSX/._01.png`) are left out. An empty
///   result is not an error.
pub fn collect_members(item: &WorkItem) -> Result<CollectionMembers> {
    match item.kind {
        WorkItemKind::Folder => collect_folder_members(&item.source_path),
        WorkItemKind::Archive => collect_archive_members(&item.source_path),
    }
}

fn collect_folder_members(directory: &Path) -> Result<CollectionMembers> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if is_supported_image_name(&file_name_lossy(&path)) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| natural_cmp_paths(a, b));
    Ok(CollectionMembers::Files(files))
}

fn collect_archive_members(archive_path: &Path) -> Result<CollectionMembers> {
    let mut archive = ZipArchive::new(File::open(archive_path)?)?;

    let mut entries = Vec::new();
    for index in 0..archive.len() {
        // Raw access reads only the headers, so entries that are encrypted or use an
        // unsupported compression method do not matter unless they are pages.
        let entry = archive.by_index_raw(index)?;
        if entry.is_dir() {
            continue;
        }
        let base_name = entry_base_name(entry.name());
        if is_hidden_name(base_name) || !is_supported_image_name(base_name) {
            continue;
        }
        entries.push(entry.name().to_string());
    }

    entries.sort_by(|a, b| {
        natural_cmp(entry_base_name(a), entry_base_name(b)).then_with(|| natural_cmp(a, b))
    });
    Ok(CollectionMembers::Archive { archive, entries })
}
