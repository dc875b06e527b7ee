//! Common test utilities and constants for the Tojiru crate.
//!
//! Provides functions for setting up test directories, writing image and
//! archive fixtures, and inspecting generated PDF documents.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use lopdf::Document;
use rand::{Rng, distributions::Alphanumeric};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tojiru::error::Result;
use tokio::fs;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[allow(dead_code)]
pub const TEST_TMP_DIR: &str = "tests/tmp";
#[allow(dead_code)]
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);
#[allow(dead_code)]
pub const LONG_TEST_TIMEOUT: Duration = Duration::from_secs(120); // For batches with many pages

#[allow(dead_code)]
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
#[allow(dead_code)]
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

/// A unique scratch directory and the base directory scanned inside it.
#[allow(dead_code)]
pub struct TestDirs {
    pub test_dir: PathBuf,
    pub base_dir: PathBuf,
}

/// Creates a clean, uniquely named test directory with an empty `base` subdirectory.
#[allow(dead_code)]
pub async fn setup_test_dirs(sub_path: &str) -> TestDirs {
    let rand_string: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let unique_sub_path = format!("{}-{}", sub_path, rand_string);
    let test_dir = PathBuf::from(TEST_TMP_DIR).join(unique_sub_path);
    if test_dir.exists() {
        fs::remove_dir_all(&test_dir).await.unwrap();
    }
    let base_dir = test_dir.join("base");
    fs::create_dir_all(&base_dir).await.unwrap();

    TestDirs { test_dir, base_dir }
}

/// Encodes a solid-color RGB image in the given format.
#[allow(dead_code)]
pub fn encoded_image(width: u32, height: u32, color: Rgb<u8>, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, color);
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

/// Writes a solid-color image; the format follows the file extension.
#[allow(dead_code)]
pub async fn create_image(path: &Path, width: u32, height: u32, color: Rgb<u8>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let img = RgbImage::from_pixel(width, height, color);
    let path_clone = path.to_path_buf();
    tokio::task::spawn_blocking(move || img.save(path_clone)).await??;
    Ok(())
}

/// Creates a minimal 100x100 color JPEG page.
#[allow(dead_code)]
pub async fn create_dummy_image(path: &Path) -> Result<()> {
    create_image(path, 100, 100, RED).await
}

/// Writes a fully transparent RGBA PNG.
#[allow(dead_code)]
pub async fn create_transparent_png(path: &Path, width: u32, height: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let img = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    let path_clone = path.to_path_buf();
    tokio::task::spawn_blocking(move || img.save_with_format(path_clone, ImageFormat::Png))
        .await??;
    Ok(())
}

/// Writes a file that carries an image extension but no image data.
#[allow(dead_code)]
pub async fn create_corrupt_image(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, b"this is not a picture").await?;
    Ok(())
}

/// Writes a ZIP archive with the given entries. Names ending in `/` become directory entries.
#[allow(dead_code)]
pub async fn create_zip(path: &Path, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let path_clone = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = std::fs::File::create(path_clone)?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, bytes) in entries {
            if name.ends_with('/') {
                zip.add_directory(name, options)?;
            } else {
                zip.start_file(name, options)?;
                zip.write_all(&bytes)?;
            }
        }
        zip.finish()?;
        Ok(())
    })
    .await??;
    Ok(())
}

/// Rewrites the compression method recorded for `entry` in both its local and
/// central directory headers. Used to plant entries that cannot be decompressed.
#[allow(dead_code)]
pub async fn set_entry_compression_method(path: &Path, entry: &str, method: u16) -> Result<()> {
    let mut bytes = fs::read(path).await?;
    let name = entry.as_bytes();
    let mut patched = 0;
    for start in 0..bytes.len().saturating_sub(4) {
        // (method offset, name length offset, name offset) per header kind
        let (method_at, name_len_at, name_at) = match &bytes[start..start + 4] {
            [0x50, 0x4b, 0x03, 0x04] => (8, 26, 30),
            [0x50, 0x4b, 0x01, 0x02] => (10, 28, 46),
            _ => continue,
        };
        if start + name_at > bytes.len() {
            continue;
        }
        let name_len =
            u16::from_le_bytes([bytes[start + name_len_at], bytes[start + name_len_at + 1]]) as usize;
        if bytes.get(start + name_at..start + name_at + name_len) == Some(name) {
            bytes[start + method_at..start + method_at + 2].copy_from_slice(&method.to_le_bytes());
            patched += 1;
        }
    }
    assert_eq!(patched, 2, "expected a local and a central header for {}", entry);
    fs::write(path, bytes).await?;
    Ok(())
}

/// Encodes an uncompressed, single-strip CMYK TIFF filled with one ink mix.
#[allow(dead_code)]
pub fn cmyk_tiff(width: u32, height: u32, cmyk: [u8; 4]) -> Vec<u8> {
    const SHORT: u16 = 3;
    const LONG: u16 = 4;
    let entry_count: u16 = 10;
    let ifd_len = 2 + 12 * entry_count as u32 + 4;
    let bits_offset = 8 + ifd_len;
    let data_offset = bits_offset + 8;
    let data_len = width * height * 4;

    let mut out = Vec::new();
    out.extend_from_slice(b"II*\0");
    out.extend_from_slice(&8u32.to_le_bytes());
    out.extend_from_slice(&entry_count.to_le_bytes());
    let mut entry = |tag: u16, kind: u16, count: u32, value: u32| {
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        if kind == SHORT && count == 1 {
            out.extend_from_slice(&(value as u16).to_le_bytes());
            out.extend_from_slice(&[0, 0]);
        } else {
            out.extend_from_slice(&value.to_le_bytes());
        }
    };
    entry(256, LONG, 1, width);
    entry(257, LONG, 1, height);
    entry(258, SHORT, 4, bits_offset);
    entry(259, SHORT, 1, 1); // no compression
    entry(262, SHORT, 1, 5); // separated (CMYK)
    entry(273, LONG, 1, data_offset);
    entry(277, SHORT, 1, 4);
    entry(278, LONG, 1, height);
    entry(279, LONG, 1, data_len);
    entry(284, SHORT, 1, 1); // chunky
    out.extend_from_slice(&0u32.to_le_bytes());

    for _ in 0..4 {
        out.extend_from_slice(&8u16.to_le_bytes());
    }
    for _ in 0..width * height {
        out.extend_from_slice(&cmyk);
    }
    out
}

/// Page sizes (MediaBox width and height) of a generated PDF, in page order.
#[allow(dead_code)]
pub fn pdf_page_sizes(path: &Path) -> Vec<(i64, i64)> {
    let doc = Document::load(path).unwrap();
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let page = doc.get_dictionary(page_id).unwrap();
            let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
            (
                media_box[2].as_i64().unwrap(),
                media_box[3].as_i64().unwrap(),
            )
        })
        .collect()
}

/// Number of pages of a generated PDF.
#[allow(dead_code)]
pub fn pdf_page_count(path: &Path) -> usize {
    Document::load(path).unwrap().get_pages().len()
}

/// Title stored in the document information dictionary.
#[allow(dead_code)]
pub fn pdf_title(path: &Path) -> Vec<u8> {
    let doc = Document::load(path).unwrap();
    let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
    let info = doc.get_dictionary(info_id).unwrap();
    info.get(b"Title").unwrap().as_str().unwrap().to_vec()
}

/// Decodes the image drawn on page `index` (0-based).
#[allow(dead_code)]
pub fn pdf_page_image(path: &Path, index: usize) -> RgbImage {
    let doc = Document::load(path).unwrap();
    let page_id = *doc.get_pages().values().nth(index).unwrap();
    let page = doc.get_dictionary(page_id).unwrap();
    let image_id = page
        .get(b"Resources")
        .unwrap()
        .as_dict()
        .unwrap()
        .get(b"XObject")
        .unwrap()
        .as_dict()
        .unwrap()
        .get(b"Im0")
        .unwrap()
        .as_reference()
        .unwrap();
    let stream = doc.get_object(image_id).unwrap().as_stream().unwrap();
    image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
        .unwrap()
        .to_rgb8()
}

/// True if a pixel is close to `expected`, allowing for JPEG error.
#[allow(dead_code)]
pub fn roughly(pixel: &Rgb<u8>, expected: Rgb<u8>) -> bool {
    pixel
        .0
        .iter()
        .zip(expected.0.iter())
        .all(|(a, b)| a.abs_diff(*b) <= 24)
}
