use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};

use crate::error::{Error, Result};
use crate::generator::Generator;
use crate::normalizer::NormalizedImage;
use crate::path_utils::partial_path;

/// Default JPEG quality for page image streams.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;
const PDF_VERSION: &str = "1.5";
/// Name the page image is registered under in each page's resources.
const PAGE_IMAGE_NAME: &str = "Im0";

/// A generator for image-only PDF documents.
///
/// Every page is one JPEG-compressed image drawn edge to edge, with the page
/// measured at one point per pixel. The whole document is kept in memory until
/// [`Generator::save`], so nothing touches the output path before then.
pub struct Pdf {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<Object>,
    output_path: PathBuf,
    title: String,
    quality: u8,
    overwrite: bool,
}

impl Pdf {
    /// Sets the JPEG quality (1-100) used for pages added after this call.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// Allows [`Generator::save`] to replace a document already at the output path.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    fn encode_page(&self, page: &NormalizedImage) -> Result<Vec<u8>> {
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality).encode_image(page.as_rgb())?;
        Ok(jpeg)
    }

    fn info_dictionary(&self) -> Dictionary {
        dictionary! {
            "Title" => text_string(&self.title),
            "Producer" => text_string(&format!("tojiru {}", env!("CARGO_PKG_VERSION"))),
            "CreationDate" => Object::string_literal(Utc::now().format("D:%Y%m%d%H%M%SZ").to_string()),
        }
    }

    /// Serializes to the partial path, then moves the file into place.
    fn write_atomically(&mut self) -> std::result::Result<(), String> {
        let partial = partial_path(&self.output_path);
        let result = match self.doc.save(&partial) {
            Ok(_) => finalize(&partial, &self.output_path, self.overwrite).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        // Gone already after a rename; still there after a link or any failure.
        let _ = std::fs::remove_file(&partial);
        result
    }
}

/// Moves a finished partial file to `output`.
///
/// Without `overwrite` an existing output is never replaced, even one that
/// appeared after the item was discovered.
fn finalize(partial: &Path, output: &Path, overwrite: bool) -> std::io::Result<()> {
    if overwrite {
        return std::fs::rename(partial, output);
    }
    match std::fs::hard_link(partial, output) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(std::io::Error::new(
            ErrorKind::AlreadyExists,
            "output already exists, not replacing it",
        )),
        // Filesystems without hard links
        Err(_) if matches!(output.try_exists(), Ok(false)) => std::fs::rename(partial, output),
        Err(e) => Err(e),
    }
}

impl Generator for Pdf {
    fn new(output_path: &Path, title: &str) -> Result<Self> {
        if output_path.file_name().is_none() {
            return Err(Error::InvalidPath(
                output_path.to_path_buf(),
                "Output path has no file name".to_string(),
            ));
        }

        let mut doc = Document::with_version(PDF_VERSION);
        let pages_id = doc.new_object_id();

        Ok(Pdf {
            doc,
            pages_id,
            page_ids: Vec::new(),
            output_path: output_path.to_path_buf(),
            title: title.to_string(),
            quality: DEFAULT_JPEG_QUALITY,
            overwrite: false,
        })
    }

    fn add_page(&mut self, page: &NormalizedImage) -> Result<&mut Self> {
        let (width, height) = page.dimensions();
        let (width, height) = (i64::from(width), i64::from(height));
        let jpeg = self.encode_page(page)?;

        let mut image_dict = Dictionary::new();
        image_dict.set("Type", Object::Name(b"XObject".to_vec()));
        image_dict.set("Subtype", Object::Name(b"Image".to_vec()));
        image_dict.set("Width", Object::Integer(width));
        image_dict.set("Height", Object::Integer(height));
        image_dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
        image_dict.set("BitsPerComponent", Object::Integer(8));
        image_dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
        let image_id = self.doc.add_object(Stream::new(image_dict, jpeg));

        // Scale the unit square image to the full page.
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        width.into(),
                        0_i64.into(),
                        0_i64.into(),
                        height.into(),
                        0_i64.into(),
                        0_i64.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(PAGE_IMAGE_NAME.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width),
                Object::Integer(height),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    PAGE_IMAGE_NAME => image_id,
                },
            },
        });
        self.page_ids.push(page_id.into());

        Ok(self)
    }

    fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn save(mut self) -> Result<()> {
        if self.page_ids.is_empty() {
            return Err(Error::Write(
                self.output_path,
                "Document has no pages".to_string(),
            ));
        }

        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.page_ids.clone(),
            "Count" => self.page_ids.len() as i64,
        };
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        let info = self.info_dictionary();
        let info_id = self.doc.add_object(info);
        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", info_id);

        self.write_atomically()
            .map_err(|reason| Error::Write(self.output_path.clone(), reason))
    }
}

/// PDF text string: literal for ASCII, UTF-16BE with byte order mark otherwise.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    bytes.extend(text.encode_utf16().flat_map(|unit| unit.to_be_bytes()));
    Object::String(bytes, StringFormat::Hexadecimal)
}
