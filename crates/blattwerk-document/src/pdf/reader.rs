// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader — open existing PDF documents with `lopdf`, pull a raster out of
// each page, and merge documents page-by-page.
//
// Page rasterization here means "extract the largest embedded image": scanned
// and photographed documents carry one image per page, which is exactly what
// the editor works with. Pages without readable image content fail with a
// per-page `Decode` error so the extract job can skip them.

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::{RasterFormat, RasterRef};
use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, instrument, warn};

use crate::raster::processor::ImageProcessor;

/// How far up the page tree resources are looked up before giving up.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// A paginated document whose pages can be turned into rasters.
pub trait PageSource: Send + Sync {
    fn page_count(&self) -> usize;

    /// Rasterize page `index` (0-based) at `scale`.
    fn rasterize(&self, index: usize, scale: f32) -> Result<RasterRef>;
}

/// Reads existing PDF files.
pub struct PdfReader {
    document: Document,
}

impl PdfReader {
    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data)
            .map_err(|err| BlattwerkError::Decode(format!("failed to load PDF: {err}")))?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");
        Ok(Self { document })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The lopdf object id of page `index` (0-based).
    fn page_id(&self, index: usize) -> Result<ObjectId> {
        let pages = self.document.get_pages();
        // lopdf pages are keyed by 1-indexed page number.
        let page_number = u32::try_from(index + 1)
            .map_err(|_| BlattwerkError::Decode(format!("page index {index} out of range")))?;
        pages.get(&page_number).copied().ok_or_else(|| {
            BlattwerkError::Decode(format!(
                "page {} out of range (document has {} pages)",
                page_number,
                pages.len()
            ))
        })
    }

    /// Image XObject streams reachable from the page's resources.
    fn page_images(&self, page_id: ObjectId) -> Vec<&Stream> {
        let Some(resources) = inherited_resources(&self.document, page_id) else {
            return Vec::new();
        };
        let Some(xobjects) = resources
            .get(b"XObject")
            .ok()
            .and_then(|obj| resolve(&self.document, obj))
            .and_then(|obj| obj.as_dict().ok())
        else {
            return Vec::new();
        };

        xobjects
            .iter()
            .filter_map(|(_, value)| resolve(&self.document, value))
            .filter_map(|obj| obj.as_stream().ok())
            .filter(|stream| {
                stream
                    .dict
                    .get(b"Subtype")
                    .and_then(Object::as_name)
                    .map(|name| name == b"Image")
                    .unwrap_or(false)
            })
            .collect()
    }
}

impl PageSource for PdfReader {
    fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    #[instrument(skip(self))]
    fn rasterize(&self, index: usize, scale: f32) -> Result<RasterRef> {
        let page_id = self.page_id(index)?;
        let largest = self
            .page_images(page_id)
            .into_iter()
            .max_by_key(|stream| {
                let (w, h) = stream_dimensions(stream);
                u64::from(w) * u64::from(h)
            })
            .ok_or_else(|| {
                BlattwerkError::Decode(format!("page {} has no embedded raster", index + 1))
            })?;

        let raster = decode_image_stream(largest, scale)?;
        debug!(
            page = index + 1,
            width = raster.width(),
            height = raster.height(),
            "Page rasterized"
        );
        Ok(raster)
    }
}

// -- Image stream decoding ----------------------------------------------------

fn stream_dimensions(stream: &Stream) -> (u32, u32) {
    let dim = |key: &[u8]| {
        stream
            .dict
            .get(key)
            .and_then(Object::as_i64)
            .ok()
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0)
    };
    (dim(b"Width"), dim(b"Height"))
}

/// Names in the stream's /Filter entry (a single name or an array).
fn stream_filters(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

fn decode_image_stream(stream: &Stream, scale: f32) -> Result<RasterRef> {
    let filters = stream_filters(stream);
    let unscaled = (scale - 1.0).abs() < f32::EPSILON;

    match filters.as_slice() {
        // JPEG payload: the stream content is a complete JPEG file.
        [only] if only.as_slice() == b"DCTDecode" => {
            let processor = ImageProcessor::from_bytes(&stream.content)?;
            if unscaled {
                let (width, height) = (processor.width(), processor.height());
                return Ok(RasterRef::new(
                    stream.content.clone(),
                    width,
                    height,
                    RasterFormat::Jpeg,
                ));
            }
            png_raster(processor.scale(scale))
        }
        [] => {
            let image = raw_samples(stream, &stream.content)?;
            png_raster(ImageProcessor::from_dynamic(image).scale(scale))
        }
        [only] if only.as_slice() == b"FlateDecode" => {
            let samples = stream.decompressed_content().map_err(|err| {
                BlattwerkError::Decode(format!("failed to inflate image stream: {err}"))
            })?;
            let image = raw_samples(stream, &samples)?;
            png_raster(ImageProcessor::from_dynamic(image).scale(scale))
        }
        other => {
            let names: Vec<String> = other
                .iter()
                .map(|name| String::from_utf8_lossy(name).into_owned())
                .collect();
            Err(BlattwerkError::Decode(format!(
                "unsupported image encoding {}",
                names.join("+")
            )))
        }
    }
}

/// Interpret uncompressed 8-bit samples as a gray or RGB image.
fn raw_samples(stream: &Stream, samples: &[u8]) -> Result<DynamicImage> {
    let (width, height) = stream_dimensions(stream);
    let bits = stream
        .dict
        .get(b"BitsPerComponent")
        .and_then(Object::as_i64)
        .unwrap_or(8);
    if bits != 8 {
        return Err(BlattwerkError::Decode(format!(
            "unsupported {bits}-bit image samples"
        )));
    }

    let color_space = stream
        .dict
        .get(b"ColorSpace")
        .and_then(Object::as_name)
        .map(<[u8]>::to_vec)
        .unwrap_or_default();

    let expected = |channels: usize| {
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(channels))
            .ok_or_else(|| {
                BlattwerkError::Decode(format!("image dimensions {width}x{height} are too large"))
            })
    };
    let truncated = || BlattwerkError::Decode("image samples are truncated".to_string());

    match color_space.as_slice() {
        b"DeviceRGB" => {
            let data = samples.get(..expected(3)?).ok_or_else(truncated)?.to_vec();
            RgbImage::from_raw(width, height, data)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(truncated)
        }
        b"DeviceGray" => {
            let data = samples.get(..expected(1)?).ok_or_else(truncated)?.to_vec();
            GrayImage::from_raw(width, height, data)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(truncated)
        }
        other => Err(BlattwerkError::Decode(format!(
            "unsupported colour space {}",
            String::from_utf8_lossy(other)
        ))),
    }
}

fn png_raster(processor: ImageProcessor) -> Result<RasterRef> {
    let (width, height) = (processor.width(), processor.height());
    let bytes = processor.to_png_bytes()?;
    Ok(RasterRef::new(bytes, width, height, RasterFormat::Png))
}

// -- Merging ------------------------------------------------------------------

/// Accumulates pages from several PDFs into one new document.
///
/// Each source is appended independently, so one unreadable input never
/// spoils the pages already merged.
pub struct PdfMerger {
    target: Document,
    pages_id: ObjectId,
    documents: usize,
}

impl Default for PdfMerger {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfMerger {
    pub fn new() -> Self {
        let mut target = Document::with_version("1.5");
        let pages_id = target.new_object_id();
        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Kids", Object::Array(Vec::new()));
        pages.set("Count", Object::Integer(0));
        target.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = target.add_object(Object::Dictionary(catalog));
        target.trailer.set("Root", Object::Reference(catalog_id));

        Self {
            target,
            pages_id,
            documents: 0,
        }
    }

    /// Append every page of `source`, in page order. Either all pages are
    /// appended or, on error, none are.
    #[instrument(skip_all)]
    pub fn append(&mut self, source: &PdfReader) -> Result<usize> {
        let pages = source.document.get_pages();
        let mut page_numbers: Vec<u32> = pages.keys().copied().collect();
        page_numbers.sort_unstable();

        let kids_before = self.kids_len();
        for page_num in &page_numbers {
            let page_id = pages[page_num];
            if let Err(err) =
                clone_page_into(&source.document, &mut self.target, self.pages_id, page_id)
            {
                self.truncate_kids(kids_before);
                return Err(err);
            }
        }
        self.documents += 1;
        debug!(pages = page_numbers.len(), "Document appended");
        Ok(page_numbers.len())
    }

    pub fn page_count(&self) -> usize {
        self.target.get_pages().len()
    }

    /// Documents appended so far.
    pub fn document_count(&self) -> usize {
        self.documents
    }

    fn kids_len(&self) -> usize {
        match self.target.get_dictionary(self.pages_id).and_then(|d| d.get(b"Kids")) {
            Ok(Object::Array(kids)) => kids.len(),
            _ => 0,
        }
    }

    fn truncate_kids(&mut self, len: usize) {
        if let Ok(Object::Dictionary(pages_dict)) = self.target.get_object_mut(self.pages_id) {
            if let Ok(Object::Array(kids)) = pages_dict.get_mut(b"Kids") {
                kids.truncate(len);
            }
            pages_dict.set("Count", Object::Integer(len as i64));
        }
    }

    /// Serialise the merged document.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.target
            .save_to(&mut output)
            .map_err(|err| BlattwerkError::Pdf(format!("failed to serialise merged PDF: {err}")))?;
        info!(
            documents = self.documents,
            output_bytes = output.len(),
            "Merge complete"
        );
        Ok(output)
    }
}

// -- Object graph helpers -----------------------------------------------------

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// The page's /Resources dictionary, following /Parent inheritance.
fn inherited_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Some(resources) = node
            .get(b"Resources")
            .ok()
            .and_then(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_dict().ok())
        {
            return Some(resources);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Clone a single page object (and its referenced resources) from `source`
/// into `target`, appending it as the last kid of `pages_id`.
fn clone_page_into(
    source: &Document,
    target: &mut Document,
    pages_id: ObjectId,
    page_id: ObjectId,
) -> Result<()> {
    let page_object = source.get_object(page_id).map_err(|err| {
        BlattwerkError::Pdf(format!("cannot read page object {page_id:?}: {err}"))
    })?;

    let mut cloned = deep_clone_object(source, target, page_object, 0);

    // Attributes a page may inherit from its tree; pin them on the clone.
    if let Object::Dictionary(dict) = &mut cloned {
        for key in [b"MediaBox".as_slice(), b"Resources", b"Rotate"] {
            if dict.get(key).is_ok() {
                continue;
            }
            if let Some(value) = inherited_attribute(source, page_id, key) {
                let value = deep_clone_object(source, target, value, 0);
                dict.set(key.to_vec(), value);
            }
        }
        dict.set("Parent", Object::Reference(pages_id));
    }
    let cloned_id = target.add_object(cloned);

    if let Ok(Object::Dictionary(pages_dict)) = target.get_object_mut(pages_id) {
        if let Ok(Object::Array(kids)) = pages_dict.get_mut(b"Kids") {
            kids.push(Object::Reference(cloned_id));
        }
        if let Ok(Object::Integer(count)) = pages_dict.get_mut(b"Count") {
            *count += 1;
        }
    }
    Ok(())
}

fn inherited_attribute<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Deep-clone a lopdf object, recursively resolving references (except
/// /Parent, which the caller patches).
fn deep_clone_object(source: &Document, target: &mut Document, object: &Object, depth: usize) -> Object {
    if depth > 64 {
        warn!("Object graph too deep, truncating with Null");
        return Object::Null;
    }
    match object {
        Object::Dictionary(dict) => Object::Dictionary(clone_dictionary(source, target, dict, depth)),
        Object::Array(items) => Object::Array(
            items
                .iter()
                .map(|item| deep_clone_object(source, target, item, depth + 1))
                .collect(),
        ),
        Object::Reference(ref_id) => match source.get_object(*ref_id) {
            Ok(referenced) => {
                let cloned = deep_clone_object(source, target, referenced, depth + 1);
                Object::Reference(target.add_object(cloned))
            }
            Err(err) => {
                warn!(?ref_id, %err, "Cannot resolve reference, using Null");
                Object::Null
            }
        },
        Object::Stream(stream) => Object::Stream(Stream::new(
            clone_dictionary(source, target, &stream.dict, depth),
            stream.content.clone(),
        )),
        other => other.clone(),
    }
}

fn clone_dictionary(source: &Document, target: &mut Document, dict: &Dictionary, depth: usize) -> Dictionary {
    let mut new_dict = Dictionary::new();
    for (key, value) in dict.iter() {
        if key == b"Parent" {
            continue;
        }
        new_dict.set(key.clone(), deep_clone_object(source, target, value, depth + 1));
    }
    new_dict
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_pdf;

    #[test]
    fn counts_pages() {
        let reader = PdfReader::from_bytes(&sample_pdf(&[Some((4, 4)), None, Some((2, 3))]))
            .expect("load");
        assert_eq!(reader.page_count(), 3);
    }

    #[test]
    fn rasterizes_embedded_image() {
        let reader = PdfReader::from_bytes(&sample_pdf(&[Some((6, 4))])).expect("load");
        let raster = reader.rasterize(0, 1.0).expect("rasterize");
        assert_eq!((raster.width(), raster.height()), (6, 4));
        assert_eq!(raster.format(), RasterFormat::Png);
    }

    #[test]
    fn rasterize_applies_scale() {
        let reader = PdfReader::from_bytes(&sample_pdf(&[Some((10, 20))])).expect("load");
        let raster = reader.rasterize(0, 0.5).expect("rasterize");
        assert_eq!((raster.width(), raster.height()), (5, 10));
    }

    #[test]
    fn page_without_image_is_a_decode_error() {
        let reader = PdfReader::from_bytes(&sample_pdf(&[None])).expect("load");
        assert!(matches!(
            reader.rasterize(0, 1.0),
            Err(BlattwerkError::Decode(_))
        ));
    }

    #[test]
    fn out_of_range_page_is_a_decode_error() {
        let reader = PdfReader::from_bytes(&sample_pdf(&[Some((2, 2))])).expect("load");
        assert!(reader.rasterize(5, 1.0).is_err());
    }

    #[test]
    fn garbage_bytes_fail_to_open() {
        assert!(matches!(
            PdfReader::from_bytes(b"not a pdf"),
            Err(BlattwerkError::Decode(_))
        ));
    }

    #[test]
    fn merger_concatenates_documents() {
        let first = PdfReader::from_bytes(&sample_pdf(&[Some((2, 2)), Some((3, 3))])).expect("a");
        let second = PdfReader::from_bytes(&sample_pdf(&[Some((4, 4))])).expect("b");

        let mut merger = PdfMerger::new();
        assert_eq!(merger.append(&first).expect("append a"), 2);
        assert_eq!(merger.append(&second).expect("append b"), 1);
        assert_eq!(merger.page_count(), 3);
        assert_eq!(merger.document_count(), 2);

        let merged = PdfReader::from_bytes(&merger.finish().expect("finish")).expect("reload");
        assert_eq!(merged.page_count(), 3);
        let last = merged.rasterize(2, 1.0).expect("rasterize merged page");
        assert_eq!((last.width(), last.height()), (4, 4));
    }

    #[test]
    fn oversized_dimensions_are_a_decode_error() {
        let mut dict = Dictionary::new();
        dict.set("Width", Object::Integer(i64::from(u32::MAX)));
        dict.set("Height", Object::Integer(i64::from(u32::MAX)));
        dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
        dict.set("BitsPerComponent", Object::Integer(8));
        let stream = Stream::new(dict, vec![0u8; 16]);
        assert!(matches!(
            raw_samples(&stream, &stream.content),
            Err(BlattwerkError::Decode(_))
        ));
    }
}
