//! PDF assembly: staged JPEG pages → one document, in numeric page order.
//!
//! ## Why numeric, not lexicographic, order
//!
//! The fetch stage names files `1.jpg`, `2.jpg`, … without zero padding, so
//! a lexicographic sort would put page 10 before page 2. Files are sorted
//! by the parsed numeric value of the stem.
//!
//! ## Why DCTDecode embedding
//!
//! A scanned page is already a JPEG; re-encoding it would cost time and
//! quality for nothing. Each file's raw bytes become an image XObject with
//! a `DCTDecode` filter, and the page's MediaBox is sized one PDF point per
//! pixel, so the PDF renders exactly what the scanner produced. Only the
//! JPEG header is read on the Rust side (dimensions + colour space).
//!
//! lopdf is synchronous, so the public entry point wraps the work in
//! `spawn_blocking` to keep it off the async executor's worker threads.

use crate::error::PaperError;
use image::ImageDecoder;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Assemble every `*.jpg` in `staging_dir` into a PDF at `destination`.
///
/// Returns the number of pages written. The staging directory itself is
/// left for the caller to remove — cleanup must also run on failure paths
/// the assembler never sees.
pub async fn assemble_pdf(staging_dir: &Path, destination: &Path) -> Result<usize, PaperError> {
    let staging = staging_dir.to_path_buf();
    let dest = destination.to_path_buf();

    tokio::task::spawn_blocking(move || assemble_blocking(&staging, &dest))
        .await
        .map_err(|e| PaperError::Assembly {
            detail: format!("assembly task panicked: {e}"),
        })?
}

fn assemble_blocking(staging_dir: &Path, destination: &Path) -> Result<usize, PaperError> {
    let pages = collect_page_files(staging_dir)?;
    if pages.is_empty() {
        return Err(PaperError::EmptyDocument);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());

    for (index, path) in &pages {
        let jpeg = std::fs::read(path).map_err(|e| PaperError::Assembly {
            detail: format!("failed to read staged page {index}: {e}"),
        })?;
        kids.push(Object::Reference(append_page(&mut doc, pages_id, &jpeg, *index)?));
    }

    let count = kids.len();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(count as i64)),
        ])),
    );

    let catalog_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    doc.save(destination).map_err(|e| PaperError::Assembly {
        detail: format!("failed to save '{}': {e}", destination.display()),
    })?;

    info!("Assembled {} pages into {}", count, destination.display());
    Ok(count)
}

/// Staged page files sorted by the numeric value of their stem.
fn collect_page_files(staging_dir: &Path) -> Result<Vec<(u64, PathBuf)>, PaperError> {
    let entries = std::fs::read_dir(staging_dir).map_err(|e| PaperError::Assembly {
        detail: format!("failed to read staging dir '{}': {e}", staging_dir.display()),
    })?;

    let mut pages = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PaperError::Assembly {
            detail: e.to_string(),
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jpg") {
            continue;
        }
        let Some(index) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<u64>().ok())
        else {
            debug!("Ignoring non-numeric staging file {}", path.display());
            continue;
        };
        pages.push((index, path));
    }

    pages.sort_by_key(|(index, _)| *index);
    Ok(pages)
}

/// Add one JPEG as a full-bleed page; returns the page object id.
fn append_page(
    doc: &mut Document,
    pages_id: lopdf::ObjectId,
    jpeg: &[u8],
    index: u64,
) -> Result<lopdf::ObjectId, PaperError> {
    let (width, height, color_space) = jpeg_geometry(jpeg).map_err(|e| PaperError::Assembly {
        detail: format!("staged page {index} is not a valid JPEG: {e}"),
    })?;

    let image_id = doc.add_object(Stream::new(
        Dictionary::from_iter([
            ("Type", Object::Name(b"XObject".to_vec())),
            ("Subtype", Object::Name(b"Image".to_vec())),
            ("Width", Object::Integer(width as i64)),
            ("Height", Object::Integer(height as i64)),
            ("ColorSpace", Object::Name(color_space.to_vec())),
            ("BitsPerComponent", Object::Integer(8)),
            ("Filter", Object::Name(b"DCTDecode".to_vec())),
        ]),
        jpeg.to_vec(),
    ));

    // Scale the unit image square up to the page size.
    let operations = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                Object::Integer(width as i64),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(height as i64),
                Object::Integer(0),
                Object::Integer(0),
            ],
        ),
        Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
        Operation::new("Q", vec![]),
    ];
    let encoded = Content { operations }
        .encode()
        .map_err(|e| PaperError::Assembly {
            detail: format!("content stream for page {index}: {e}"),
        })?;
    let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

    let resources = Dictionary::from_iter([(
        "XObject",
        Object::Dictionary(Dictionary::from_iter([("Im0", Object::Reference(image_id))])),
    )]);

    Ok(doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Page".to_vec())),
        ("Parent", Object::Reference(pages_id)),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width as i64),
                Object::Integer(height as i64),
            ]),
        ),
        ("Resources", Object::Dictionary(resources)),
        ("Contents", Object::Reference(content_id)),
    ])))
}

/// Dimensions and PDF colour-space name from the JPEG header alone.
fn jpeg_geometry(bytes: &[u8]) -> Result<(u32, u32, &'static [u8]), image::ImageError> {
    let decoder = image::codecs::jpeg::JpegDecoder::new(Cursor::new(bytes))?;
    let (width, height) = decoder.dimensions();
    let color_space: &'static [u8] = match decoder.color_type() {
        image::ColorType::L8 | image::ColorType::L16 => b"DeviceGray",
        _ => b"DeviceRGB",
    };
    Ok((width, height, color_space))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;

    /// A real JPEG of the given square size, so header sniffing works.
    fn jpeg_bytes(side: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(side, side, Rgb([90, 120, 150])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
            .expect("encode test jpeg");
        buf
    }

    fn media_box_width(doc: &Document, page_id: lopdf::ObjectId) -> i64 {
        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        media_box[2].as_i64().unwrap()
    }

    #[test]
    fn jpeg_geometry_reads_dimensions_and_color() {
        let (w, h, cs) = jpeg_geometry(&jpeg_bytes(17)).unwrap();
        assert_eq!((w, h), (17, 17));
        assert_eq!(cs, b"DeviceRGB");
    }

    #[test]
    fn pages_sort_numerically_not_lexically() {
        let staging = tempfile::tempdir().unwrap();
        // Deliberately created out of order, with sizes encoding identity:
        // page 1 → 10 px, page 2 → 20 px, page 10 → 30 px.
        for (name, side) in [("2.jpg", 20), ("10.jpg", 30), ("1.jpg", 10)] {
            std::fs::write(staging.path().join(name), jpeg_bytes(side)).unwrap();
        }

        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("merged.pdf");
        let count = assemble_blocking(staging.path(), &dest).unwrap();
        assert_eq!(count, 3);

        let doc = Document::load(&dest).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 3);

        let widths: Vec<i64> = (1u32..=3)
            .map(|n| media_box_width(&doc, pages[&n]))
            .collect();
        assert_eq!(widths, vec![10, 20, 30]);
    }

    #[test]
    fn non_jpg_and_non_numeric_files_are_ignored() {
        let staging = tempfile::tempdir().unwrap();
        std::fs::write(staging.path().join("1.jpg"), jpeg_bytes(10)).unwrap();
        std::fs::write(staging.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(staging.path().join("cover.jpg"), b"x").unwrap();

        let pages = collect_page_files(staging.path()).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].0, 1);
    }

    #[test]
    fn empty_staging_dir_is_an_empty_document() {
        let staging = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let err = assemble_blocking(staging.path(), &out.path().join("x.pdf")).unwrap_err();
        assert!(matches!(err, PaperError::EmptyDocument));
    }
}
