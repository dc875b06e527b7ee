//! Collection assembly: one work item in, one output document out.

use log::{debug, info};

use crate::collector::{CollectionMembers, collect_members};
use crate::error::Result;
use crate::generator::Generator;
use crate::generator::pdf::{DEFAULT_JPEG_QUALITY, Pdf};
use crate::normalizer::{normalize, probe_size};
use crate::sizing;
use crate::types::{ResizeMethod, SIZE_SAMPLE_LIMIT, SizePolicy, TargetSize, WorkItem};

/// Per-run assembly settings, shared read-only by every worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assembler {
    pub uniform_sizing: bool,
    pub size_policy: SizePolicy,
    pub resize_method: ResizeMethod,
    pub jpeg_quality: u8,
    /// Replace existing output documents. Off for batch runs.
    pub overwrite: bool,
}

impl Default for Assembler {
    fn default() -> Self {
        Self {
            uniform_sizing: false,
            size_policy: SizePolicy::default(),
            resize_method: ResizeMethod::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            overwrite: false,
        }
    }
}

impl Assembler {
    /// Converts one collection into its output document.
    ///
    /// Pages follow the natural order of the member names. Any member that fails to
    /// decode fails the whole item and nothing is written.
    ///
    /// # Returns
    ///
    /// * `Ok(pages)` - Number of pages written; `Ok(0)` when the collection has no
    ///   images, in which case no document is created
    /// * `Err(_)` - The item failed; the output path was not touched
    pub fn assemble(&self, item: &WorkItem) -> Result<usize> {
        let mut members = collect_members(item)?;
        if members.is_empty() {
            info!("'{}' has no images, nothing to do", item.display_name);
            return Ok(0);
        }

        let target = if self.uniform_sizing {
            self.resolve_target(&mut members)?
        } else {
            None
        };
        if let Some(target) = target {
            debug!("'{}' pages resized to {}", item.display_name, target);
        }

        let mut document = Pdf::new(&item.output_path, &item.title())?
            .with_quality(self.jpeg_quality)
            .with_overwrite(self.overwrite);
        for index in 0..members.len() {
            let source = members.load(index)?;
            // Each page buffer is dropped as soon as it is encoded.
            let page = normalize(&source, target, self.resize_method)?;
            document.add_page(&page)?;
        }

        let pages = document.page_count();
        document.save()?;
        Ok(pages)
    }

    /// Decodes up to [`SIZE_SAMPLE_LIMIT`] leading members and resolves the shared page size.
    ///
    /// Members that fail to decode are left out of the sample; the main pass reports them.
    fn resolve_target(&self, members: &mut CollectionMembers) -> Result<Option<TargetSize>> {
        if matches!(self.size_policy, SizePolicy::Fixed(..)) {
            return Ok(sizing::resolve(&[], self.size_policy));
        }

        let mut sample = Vec::with_capacity(SIZE_SAMPLE_LIMIT.min(members.len()));
        for index in 0..members.len().min(SIZE_SAMPLE_LIMIT) {
            let source = members.load(index)?;
            match probe_size(&source) {
                Ok(size) => sample.push(size),
                Err(e) => debug!("Leaving '{}' out of the size sample: {}", source.display_name(), e),
            }
        }
        Ok(sizing::resolve(&sample, self.size_policy))
    }
}
