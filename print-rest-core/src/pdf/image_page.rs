use std::io::Cursor;

use printpdf::{Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, XObjectTransform};
use tracing::debug;

use crate::error::PrintError;

const MM_PER_PT: f32 = 0.352778;

/// Turns a raster image into a one-page PDF. The page is exactly the size
/// of the image at 72 dpi (one pixel per point).
pub fn image_to_pdf(bytes: &[u8], title: &str) -> Result<Vec<u8>, PrintError> {
    let decoded = ::image::load_from_memory(bytes)
        .map_err(|e| PrintError::bad_request(format!("Cannot decode image '{title}': {e}")))?;
    let rgb = ::image::DynamicImage::ImageRgb8(decoded.to_rgb8());
    let (width, height) = (rgb.width(), rgb.height());

    let mut png = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut png), ::image::ImageFormat::Png)
        .map_err(|e| PrintError::Pdf(format!("cannot re-encode image '{title}': {e}")))?;

    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let raw = RawImage::decode_from_bytes(&png, &mut warnings)
        .map_err(|e| PrintError::Pdf(format!("cannot embed image '{title}': {e}")))?;

    let mut doc = PdfDocument::new(title);
    let image_id = doc.add_image(&raw);
    let ops = vec![Op::UseXobject {
        id: image_id,
        transform: XObjectTransform {
            translate_x: Some(Pt(0.0)),
            translate_y: Some(Pt(0.0)),
            dpi: Some(72.0),
            scale_x: Some(1.0),
            scale_y: Some(1.0),
            rotate: None,
        },
    }];
    let page = PdfPage::new(
        Mm(width as f32 * MM_PER_PT),
        Mm(height as f32 * MM_PER_PT),
        ops,
    );
    doc.with_pages(vec![page]);
    let pdf = doc.save(&PdfSaveOptions::default(), &mut warnings);
    debug!(title, width, height, bytes = pdf.len(), "Converted image to PDF");
    Ok(pdf)
}
