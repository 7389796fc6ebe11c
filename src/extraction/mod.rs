//! PDF content extraction.
//!
//! Loads an uploaded PDF from memory with `lopdf`, concatenates the plain text of every page in
//! page order, and decodes every embedded raster image (page order, then resource order within a
//! page, descending into form XObjects) so that it can be handed to OCR. Images the decoder does
//! not understand are skipped.

use std::collections::HashSet;

use image::{DynamicImage, GrayImage, ImageBuffer, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use thiserror::Error;

/// Errors raised while opening or walking a PDF.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The upload contained no bytes.
    #[error("uploaded file is empty")]
    Empty,
    /// The bytes could not be parsed as a PDF document.
    #[error("failed to load PDF: {0}")]
    Load(#[from] lopdf::Error),
    /// The blocking extraction task did not complete.
    #[error("extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Text and images recovered from a single PDF.
#[derive(Debug, Default)]
pub struct ExtractedDocument {
    /// Concatenated page text in page order.
    pub text: String,
    /// Decoded embedded images in page order.
    pub images: Vec<DynamicImage>,
}

/// Extract text and embedded images from PDF bytes.
///
/// This is CPU-bound; async callers should run it on the blocking pool.
pub fn extract(pdf_bytes: &[u8]) -> Result<ExtractedDocument, ExtractionError> {
    if pdf_bytes.is_empty() {
        return Err(ExtractionError::Empty);
    }

    let document = Document::load_mem(pdf_bytes)?;
    let mut extracted = ExtractedDocument::default();

    for (page_number, page_id) in document.get_pages() {
        match document.extract_text(&[page_number]) {
            Ok(text) => extracted.text.push_str(&text),
            Err(error) => {
                tracing::debug!(page = page_number, error = %error, "Page text extraction failed");
            }
        }
        extracted
            .images
            .extend(page_images(&document, page_number, page_id));
    }

    tracing::debug!(
        pages = document.get_pages().len(),
        chars = extracted.text.chars().count(),
        images = extracted.images.len(),
        "Extracted PDF content"
    );
    Ok(extracted)
}

fn page_images(document: &Document, page_number: u32, page_id: ObjectId) -> Vec<DynamicImage> {
    let mut images = Vec::new();
    if let Some(resources) = page_resources(document, page_id) {
        let mut visited_forms = HashSet::new();
        collect_images(
            document,
            page_number,
            resources,
            &mut visited_forms,
            &mut images,
        );
    }
    images
}

/// Decode the image XObjects of `resources`, recursing into form XObjects.
///
/// Each form is entered at most once per page, which also breaks reference cycles.
fn collect_images(
    document: &Document,
    page_number: u32,
    resources: &Dictionary,
    visited_forms: &mut HashSet<ObjectId>,
    images: &mut Vec<DynamicImage>,
) {
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|object| resolve_dict(document, object))
    else {
        return;
    };

    for (name, object) in xobjects.iter() {
        let Ok(stream_id) = object.as_reference() else {
            continue;
        };
        let Ok(stream) = document.get_object(stream_id).and_then(Object::as_stream) else {
            continue;
        };

        match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(b"Image") => match decode_image(document, stream) {
                Some(image) => images.push(image),
                None => tracing::debug!(
                    page = page_number,
                    xobject = %String::from_utf8_lossy(name),
                    "Skipping undecodable embedded image"
                ),
            },
            Ok(b"Form") => {
                if !visited_forms.insert(stream_id) {
                    continue;
                }
                if let Some(form_resources) = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|object| resolve_dict(document, object))
                {
                    collect_images(document, page_number, form_resources, visited_forms, images);
                }
            }
            _ => {}
        }
    }
}

/// Find the resource dictionary for a page, following inherited `Resources` up the page tree.
fn page_resources(document: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut current = document.get_dictionary(page_id).ok()?;
    loop {
        if let Ok(resources) = current.get(b"Resources") {
            return resolve_dict(document, resources);
        }
        let parent_id = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = document.get_dictionary(parent_id).ok()?;
    }
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(document, object)? {
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn stream_filters(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

/// Colour spaces the raw-sample decoder can turn into pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Palette lookup; `palette` holds `hival + 1` entries in the base space.
    Indexed {
        base: Box<ColorSpace>,
        hival: usize,
        palette: Vec<u8>,
    },
}

impl ColorSpace {
    fn components(&self) -> usize {
        match self {
            Self::Gray | Self::Indexed { .. } => 1,
            Self::Rgb => 3,
            Self::Cmyk => 4,
        }
    }
}

fn device_color_space(name: &[u8]) -> Option<ColorSpace> {
    match name {
        b"DeviceGray" | b"G" | b"CalGray" => Some(ColorSpace::Gray),
        b"DeviceRGB" | b"RGB" | b"CalRGB" => Some(ColorSpace::Rgb),
        b"DeviceCMYK" | b"CMYK" => Some(ColorSpace::Cmyk),
        _ => None,
    }
}

fn resolve_color_space(document: &Document, object: &Object) -> Option<ColorSpace> {
    match resolve(document, object)? {
        Object::Name(name) => device_color_space(name),
        Object::Array(items) => {
            let family = items.first()?.as_name().ok()?;
            match family {
                b"CalGray" => Some(ColorSpace::Gray),
                b"CalRGB" => Some(ColorSpace::Rgb),
                b"ICCBased" => {
                    let profile = resolve(document, items.get(1)?)?.as_stream().ok()?;
                    match profile.dict.get(b"N").and_then(Object::as_i64).ok()? {
                        1 => Some(ColorSpace::Gray),
                        3 => Some(ColorSpace::Rgb),
                        4 => Some(ColorSpace::Cmyk),
                        _ => None,
                    }
                }
                b"Indexed" | b"I" => {
                    let base = resolve_color_space(document, items.get(1)?)?;
                    if matches!(base, ColorSpace::Indexed { .. }) {
                        return None;
                    }
                    let hival = usize::try_from(items.get(2)?.as_i64().ok()?).ok()?;
                    let palette = match resolve(document, items.get(3)?)? {
                        Object::String(bytes, _) => bytes.clone(),
                        Object::Stream(stream) => stream
                            .decompressed_content()
                            .unwrap_or_else(|_| stream.content.clone()),
                        _ => return None,
                    };
                    if palette.len() < (hival + 1).checked_mul(base.components())? {
                        return None;
                    }
                    Some(ColorSpace::Indexed {
                        base: Box::new(base),
                        hival,
                        palette,
                    })
                }
                other => {
                    tracing::debug!(
                        color_space = %String::from_utf8_lossy(other),
                        "Unsupported image colour space"
                    );
                    None
                }
            }
        }
        _ => None,
    }
}

fn decode_image(document: &Document, stream: &Stream) -> Option<DynamicImage> {
    let filters = stream_filters(&stream.dict);
    let last = filters.last().map(Vec::as_slice);

    // Encoded image formats carry their own headers.
    if matches!(last, Some(b"DCTDecode") | Some(b"JPXDecode")) {
        return image::load_from_memory(&stream.content).ok();
    }

    let samples = match filters.as_slice() {
        [] => stream.content.clone(),
        [only] if only.as_slice() == b"FlateDecode" => stream.decompressed_content().ok()?,
        _ => return None,
    };

    let dict = &stream.dict;
    let width = u32::try_from(dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
    let height = u32::try_from(dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;
    let is_mask = dict
        .get(b"ImageMask")
        .and_then(Object::as_bool)
        .unwrap_or(false);
    let bits = dict
        .get(b"BitsPerComponent")
        .and_then(Object::as_i64)
        .unwrap_or(if is_mask { 1 } else { 8 });
    let bits = u8::try_from(bits).ok()?;

    let color_space = if is_mask {
        ColorSpace::Gray
    } else {
        match dict.get(b"ColorSpace") {
            Ok(object) => resolve_color_space(document, object)?,
            Err(_) if bits == 8 => infer_color_space(width, height, samples.len())?,
            Err(_) => ColorSpace::Gray,
        }
    };

    let values = unpack_samples(&samples, width, height, color_space.components(), bits)?;
    raster_from_values(
        &color_space,
        width,
        height,
        bits,
        decode_inverted(dict),
        values,
    )
}

fn infer_color_space(width: u32, height: u32, sample_len: usize) -> Option<ColorSpace> {
    let pixels = (width as usize).checked_mul(height as usize)?;
    if pixels == 0 {
        return None;
    }
    match sample_len / pixels {
        1 | 2 => Some(ColorSpace::Gray),
        3 => Some(ColorSpace::Rgb),
        4.. => Some(ColorSpace::Cmyk),
        _ => None,
    }
}

/// A `Decode` array whose first range runs high to low, e.g. `[1 0]`.
fn decode_inverted(dict: &Dictionary) -> bool {
    let Ok(Object::Array(items)) = dict.get(b"Decode") else {
        return false;
    };
    match items.as_slice() {
        [low, high, ..] => matches!((number(low), number(high)), (Some(low), Some(high)) if low > high),
        _ => false,
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

/// Split packed sample rows into one byte per component.
///
/// Rows are padded to a whole byte. Values keep their raw range (`0..2^bits`); 16-bit samples
/// keep only their high byte.
fn unpack_samples(
    data: &[u8],
    width: u32,
    height: u32,
    components: usize,
    bits: u8,
) -> Option<Vec<u8>> {
    let row_samples = (width as usize).checked_mul(components)?;
    let rows = height as usize;
    match bits {
        8 => {
            let needed = row_samples.checked_mul(rows)?;
            data.get(..needed).map(<[u8]>::to_vec)
        }
        16 => {
            let row_bytes = row_samples.checked_mul(2)?;
            let needed = row_bytes.checked_mul(rows)?;
            let data = data.get(..needed)?;
            Some(data.iter().step_by(2).copied().collect())
        }
        1 | 2 | 4 => {
            let bits = usize::from(bits);
            let row_bytes = row_samples.checked_mul(bits)?.div_ceil(8);
            let needed = row_bytes.checked_mul(rows)?;
            let data = data.get(..needed)?;
            let mask = (1u8 << bits) - 1;
            let mut values = Vec::with_capacity(row_samples * rows);
            for row in data.chunks_exact(row_bytes.max(1)).take(rows) {
                for index in 0..row_samples {
                    let offset = index * bits;
                    let shift = 8 - bits - offset % 8;
                    values.push((row[offset / 8] >> shift) & mask);
                }
            }
            Some(values)
        }
        _ => None,
    }
}

/// Stretch a raw sample value to the full 8-bit range.
fn scale_to_byte(value: u8, bits: u8) -> u8 {
    match bits {
        1 => value * 255,
        2 => value * 85,
        4 => value * 17,
        _ => value,
    }
}

fn raster_from_values(
    color_space: &ColorSpace,
    width: u32,
    height: u32,
    bits: u8,
    inverted: bool,
    values: Vec<u8>,
) -> Option<DynamicImage> {
    match color_space {
        ColorSpace::Indexed {
            base,
            hival,
            palette,
        } => {
            let stride = base.components();
            let mut expanded = Vec::with_capacity(values.len() * stride);
            for index in values {
                let start = usize::from(index).min(*hival) * stride;
                expanded.extend_from_slice(palette.get(start..start + stride)?);
            }
            raster_from_values(base, width, height, 8, false, expanded)
        }
        _ => {
            let mut scaled: Vec<u8> = values
                .into_iter()
                .map(|value| scale_to_byte(value, bits))
                .collect();
            if inverted && *color_space == ColorSpace::Gray {
                scaled.iter_mut().for_each(|value| *value = 255 - *value);
            }
            raster_from_samples(color_space, width, height, scaled)
        }
    }
}

fn raster_from_samples(
    color_space: &ColorSpace,
    width: u32,
    height: u32,
    samples: Vec<u8>,
) -> Option<DynamicImage> {
    let pixels = (width as usize).checked_mul(height as usize)?;
    match color_space {
        ColorSpace::Gray => {
            let buffer: GrayImage = ImageBuffer::from_raw(width, height, samples)?;
            Some(DynamicImage::ImageLuma8(buffer))
        }
        ColorSpace::Rgb => {
            let buffer: RgbImage = ImageBuffer::from_raw(width, height, samples)?;
            Some(DynamicImage::ImageRgb8(buffer))
        }
        ColorSpace::Cmyk => {
            if samples.len() < pixels.checked_mul(4)? {
                return None;
            }
            let rgb: Vec<u8> = samples
                .chunks_exact(4)
                .take(pixels)
                .flat_map(|cmyk| {
                    let k = u16::from(cmyk[3]);
                    [cmyk[0], cmyk[1], cmyk[2]]
                        .map(|channel| 255u16.saturating_sub(u16::from(channel) + k) as u8)
                })
                .collect();
            let buffer: RgbImage = ImageBuffer::from_raw(width, height, rgb)?;
            Some(DynamicImage::ImageRgb8(buffer))
        }
        ColorSpace::Indexed { .. } => None,
    }
}
