//! PDF assembly
//!
//! Builds the print-ready PDF out of filtered page rasters: one JPEG
//! image xobject per page, media box sized from the pixel dimensions at
//! the print DPI.

use std::io::Cursor;

use image::RgbImage;
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref};

use crate::error::{PalError, PalResult};

/// JPEG quality for embedded page images
const JPEG_QUALITY: u8 = 90;

fn encode_jpeg(img: &RgbImage) -> PalResult<Vec<u8>> {
    let mut buf = Vec::new();
    let mut cursor = Cursor::new(&mut buf);
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, JPEG_QUALITY);
    img.write_with_encoder(encoder)
        .map_err(|e| PalError::Processing(format!("JPEG encoding failed: {e}")))?;
    Ok(buf)
}

/// Assemble page images into one multi-page PDF.
pub fn images_to_pdf(pages: &[RgbImage], dpi: u32) -> PalResult<Vec<u8>> {
    if pages.is_empty() {
        return Err(PalError::Processing("No pages to assemble".into()));
    }
    let dpi = dpi.max(1) as f32;

    let mut next_id = 1;
    let mut alloc = || {
        let id = Ref::new(next_id);
        next_id += 1;
        id
    };

    let catalog_id = alloc();
    let page_tree_id = alloc();
    let page_ids: Vec<Ref> = pages.iter().map(|_| alloc()).collect();

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(page_tree_id);
    pdf.pages(page_tree_id)
        .kids(page_ids.iter().copied())
        .count(pages.len() as i32);

    let image_name = Name(b"Im0");
    for (img, &page_id) in pages.iter().zip(&page_ids) {
        let image_id = alloc();
        let content_id = alloc();

        let (w_px, h_px) = img.dimensions();
        let w_pt = w_px as f32 * 72.0 / dpi;
        let h_pt = h_px as f32 * 72.0 / dpi;

        let mut page = pdf.page(page_id);
        page.media_box(Rect::new(0.0, 0.0, w_pt, h_pt));
        page.parent(page_tree_id);
        page.contents(content_id);
        page.resources().x_objects().pair(image_name, image_id);
        page.finish();

        let jpeg = encode_jpeg(img)?;
        let mut xobject = pdf.image_xobject(image_id, &jpeg);
        xobject.filter(Filter::DctDecode);
        xobject.width(w_px as i32);
        xobject.height(h_px as i32);
        xobject.color_space().device_rgb();
        xobject.bits_per_component(8);
        xobject.finish();

        let mut content = Content::new();
        content.save_state();
        content.transform([w_pt, 0.0, 0.0, h_pt, 0.0, 0.0]);
        content.x_object(image_name);
        content.restore_state();
        pdf.stream(content_id, &content.finish());
    }

    Ok(pdf.finish())
}
