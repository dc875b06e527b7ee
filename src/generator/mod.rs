//! Generator module provides the trait and implementation for output document generators.
//!
//! A generator owns one document under construction. Pages are appended in order
//! and nothing is written to disk until [`Generator::save`] succeeds, so dropping
//! a generator discards the document without leaving a file behind.

use crate::error::Result;
use crate::normalizer::NormalizedImage;
use std::path::Path;

pub mod pdf;

/// Common interface for page document generators.
///
/// Generators run inside worker jobs and are exclusively owned by the job that
/// assembles one collection.
pub trait Generator {
    /// Creates a new generator instance.
    ///
    /// # Parameters
    /// * `output_path` - Final path of the document, including extension
    /// * `title` - Title stored in the document information
    ///
    /// # Returns
    /// * `Result<Self>` - A new generator instance or an error if the path is unusable
    fn new(output_path: &Path, title: &str) -> Result<Self>
    where
        Self: Sized;

    /// Appends a page holding the given image.
    ///
    /// # Returns
    /// * `Result<&mut Self>` - Self reference for method chaining, or an encoding error
    fn add_page(&mut self, page: &NormalizedImage) -> Result<&mut Self>
    where
        Self: Sized;

    /// Number of pages appended so far.
    fn page_count(&self) -> usize;

    /// Finalizes the document and writes it to the output path.
    ///
    /// An existing file at the output path is left alone unless the generator
    /// was configured to overwrite it.
    ///
    /// # Returns
    /// * `Result<()>` - Success, or `Error::Write` with no file left at the output path
    fn save(self) -> Result<()>;
}
