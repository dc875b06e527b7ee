//! Image normalization: decoding page payloads into opaque RGB pixel buffers,
//! optionally resampled to a shared page geometry.
//!
//! Every page that reaches the document generator goes through [`normalize`], which
//! guarantees RGB channel order regardless of the source encoding (grayscale,
//! palette, alpha-bearing, CMYK and other color models).

use std::fs::File;
use std::io::Cursor;
use std::path::PathBuf;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageReader, Rgb, RgbImage, RgbaImage};
use log::warn;
use memmap2::MmapOptions;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::path_utils::file_name_lossy;
use crate::types::{ResizeMethod, TargetSize};

/// Background used for letterboxing and for compositing transparent pixels.
const FILL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
/// Resampling filter used for every resize.
const RESIZE_FILTER: FilterType = FilterType::Lanczos3;

/// Raw page bytes, either on disk or already extracted from an archive.
#[derive(Debug, Clone)]
pub enum ImageSource {
    File(PathBuf),
    Memory { name: String, bytes: Vec<u8> },
}

impl ImageSource {
    /// Name used in diagnostics.
    pub fn display_name(&self) -> String {
        match self {
            ImageSource::File(path) => file_name_lossy(path),
            ImageSource::Memory { name, .. } => name.clone(),
        }
    }

    /// Runs `f` over the payload bytes. Files are memory-mapped for the duration of the call.
    fn with_bytes<T>(&self, f: impl FnOnce(&[u8]) -> Result<T>) -> Result<T> {
        match self {
            ImageSource::File(path) => {
                let file = File::open(path)?;
                if file.metadata()?.len() == 0 {
                    return Err(Error::Decode(self.display_name(), "file is empty".to_string()));
                }
                // Read-only map, dropped before this function returns.
                let mmap = unsafe { MmapOptions::new().map(&file)? };
                f(&mmap[..])
            }
            ImageSource::Memory { bytes, .. } => f(bytes),
        }
    }
}

/// Color model the source was stored in, before conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMode {
    Rgb,
    RgbAlpha,
    Gray,
    GrayAlpha,
    /// Anything else (CMYK, BGR, packed or unknown layouts), by its decoder name.
    Other(String),
}

impl From<ExtendedColorType> for SourceMode {
    fn from(color: ExtendedColorType) -> Self {
        match color {
            ExtendedColorType::Rgb8 | ExtendedColorType::Rgb16 | ExtendedColorType::Rgb32F => {
                SourceMode::Rgb
            }
            ExtendedColorType::Rgba8
            | ExtendedColorType::Rgba16
            | ExtendedColorType::Rgba32F => SourceMode::RgbAlpha,
            ExtendedColorType::L1
            | ExtendedColorType::L2
            | ExtendedColorType::L4
            | ExtendedColorType::L8
            | ExtendedColorType::L16 => SourceMode::Gray,
            ExtendedColorType::La1
            | ExtendedColorType::La2
            | ExtendedColorType::La4
            | ExtendedColorType::La8
            | ExtendedColorType::La16 => SourceMode::GrayAlpha,
            other => SourceMode::Other(format!("{:?}", other)),
        }
    }
}

/// A decoded page in RGB channel order.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pixels: RgbImage,
    source_mode: SourceMode,
}

impl NormalizedImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn into_rgb(self) -> RgbImage {
        self.pixels
    }

    pub fn source_mode(&self) -> &SourceMode {
        &self.source_mode
    }
}

/// Decodes a payload without any conversion.
///
/// # Returns
///
/// * `Ok((DynamicImage, SourceMode))` - The decoded image and the color model it was stored in
/// * `Err(Error::Decode)` - The payload is not a readable image
/// * `Err(Error::UnsupportedMode)` - The decoder cannot handle the image's color layout
pub fn decode(source: &ImageSource) -> Result<(DynamicImage, SourceMode)> {
    let name = source.display_name();
    source.with_bytes(|bytes| {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| Error::Decode(name.clone(), e.to_string()))?;
        let decoder = reader
            .into_decoder()
            .map_err(|e| Error::from_decode(&name, e))?;
        let mode = SourceMode::from(decoder.original_color_type());
        let image = DynamicImage::from_decoder(decoder).map_err(|e| Error::from_decode(&name, e))?;
        Ok((image, mode))
    })
}

/// Decodes a payload and reports its pixel size. Used for size sampling.
pub fn probe_size(source: &ImageSource) -> Result<TargetSize> {
    let (image, _) = decode(source)?;
    Ok(TargetSize::new(image.width(), image.height()))
}

/// Opens a page and returns it as opaque RGB, resized to `target` when one is given.
///
/// # Arguments
///
/// * `source` - The page payload
/// * `target` - Shared page size, or `None` to keep the source dimensions
/// * `method` - How to reach `target`; ignored when `target` is `None`
pub fn normalize(
    source: &ImageSource,
    target: Option<TargetSize>,
    method: ResizeMethod,
) -> Result<NormalizedImage> {
    let (image, source_mode) = decode(source)?;
    if let SourceMode::Other(color) = &source_mode {
        warn!(
            "'{}' is stored as {}, converting to RGB; colors may not be exact",
            source.display_name(),
            color
        );
    }

    if image.width() == 0 || image.height() == 0 {
        return Err(Error::Decode(
            source.display_name(),
            "image has no pixels".to_string(),
        ));
    }

    let rgb = to_opaque_rgb(image);
    let pixels = match target {
        Some(target) => resize_to(rgb, target, method),
        None => rgb,
    };

    Ok(NormalizedImage {
        pixels,
        source_mode,
    })
}

/// Converts any decoded image to RGB. Transparent pixels are composited onto white.
pub fn to_opaque_rgb(image: DynamicImage) -> RgbImage {
    if image.color().has_alpha() {
        flatten_onto_fill(&image.to_rgba8())
    } else {
        image.into_rgb8()
    }
}

fn flatten_onto_fill(rgba: &RgbaImage) -> RgbImage {
    let (width, height) = rgba.dimensions();
    let mut out = RgbImage::from_pixel(width, height, FILL_COLOR);

    out.par_chunks_exact_mut(3)
        .zip(rgba.par_chunks_exact(4))
        .for_each(|(dst, src)| {
            let alpha = src[3] as u32;
            for channel in 0..3 {
                let background = FILL_COLOR.0[channel] as u32;
                dst[channel] =
                    ((src[channel] as u32 * alpha + background * (255 - alpha) + 127) / 255) as u8;
            }
        });

    out
}

/// Brings an RGB image to exactly `target` using `method`.
pub fn resize_to(image: RgbImage, target: TargetSize, method: ResizeMethod) -> RgbImage {
    let (width, height) = image.dimensions();
    if (width, height) == (target.width, target.height) {
        return image;
    }

    match method {
        ResizeMethod::Stretch => imageops::resize(&image, target.width, target.height, RESIZE_FILTER),
        ResizeMethod::Fit => {
            let scale = f64::min(
                target.width as f64 / width as f64,
                target.height as f64 / height as f64,
            );
            let (scaled_w, scaled_h) = scaled_dimensions(width, height, scale);
            let scaled_w = scaled_w.min(target.width);
            let scaled_h = scaled_h.min(target.height);
            let scaled = imageops::resize(&image, scaled_w, scaled_h, RESIZE_FILTER);

            let mut canvas = RgbImage::from_pixel(target.width, target.height, FILL_COLOR);
            let x = (target.width - scaled_w) / 2;
            let y = (target.height - scaled_h) / 2;
            imageops::overlay(&mut canvas, &scaled, x as i64, y as i64);
            canvas
        }
        ResizeMethod::Fill => {
            let scale = f64::max(
                target.width as f64 / width as f64,
                target.height as f64 / height as f64,
            );
            let (scaled_w, scaled_h) = scaled_dimensions(width, height, scale);
            let scaled_w = scaled_w.max(target.width);
            let scaled_h = scaled_h.max(target.height);
            let scaled = imageops::resize(&image, scaled_w, scaled_h, RESIZE_FILTER);

            let x = (scaled_w - target.width) / 2;
            let y = (scaled_h - target.height) / 2;
            imageops::crop_imm(&scaled, x, y, target.width, target.height).to_image()
        }
    }
}

fn scaled_dimensions(width: u32, height: u32, scale: f64) -> (u32, u32) {
    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);
    (w, h)
}
