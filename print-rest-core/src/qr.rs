use std::io::Cursor;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Luma, Rgba, RgbaImage};
use qrcode::{EcLevel, QrCode};
use tracing::{debug, warn};

use crate::config::QrConfig;
use crate::error::PrintError;

/// Renders `data` as a QR code (error correction level H) and returns it as
/// a `data:image/png;base64,` URI. When `logo` points to a readable image it
/// is scaled to a fifth of the code's side and centred on top.
pub fn generate_qrcode(data: &str, logo: Option<&Path>, config: &QrConfig) -> Result<String, PrintError> {
    if data.is_empty() {
        return Err(PrintError::Report("QR code value is empty".into()));
    }
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::H)
        .map_err(|e| PrintError::Report(format!("cannot encode QR code: {e}")))?;

    let box_size = config.box_size.max(1);
    let modules = code
        .render::<Luma<u8>>()
        .quiet_zone(false)
        .module_dimensions(box_size, box_size)
        .build();

    let offset = config.border * box_size;
    let side = modules.width() + 2 * offset;
    let mut canvas = RgbaImage::from_pixel(side, side, Rgba([255, 255, 255, 255]));
    for (x, y, pixel) in modules.enumerate_pixels() {
        let v = pixel.0[0];
        canvas.put_pixel(x + offset, y + offset, Rgba([v, v, v, 255]));
    }

    if let Some(logo) = logo {
        overlay_logo(&mut canvas, logo);
    }

    let mut png = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .to_rgb8()
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| PrintError::Report(format!("cannot encode QR code image: {e}")))?;
    debug!(side, bytes = png.len(), "Generated QR code");
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

fn overlay_logo(canvas: &mut RgbaImage, logo: &Path) {
    if !logo.is_file() {
        debug!(logo = %logo.display(), "QR logo not found, skipping");
        return;
    }
    let decoded = match image::open(logo) {
        Ok(img) => img.to_rgba8(),
        Err(err) => {
            warn!(logo = %logo.display(), error = %err, "Cannot decode QR logo, skipping");
            return;
        }
    };
    let size = canvas.width().min(canvas.height()) / 5;
    if size == 0 {
        return;
    }
    let resized = imageops::resize(&decoded, size, size, FilterType::Lanczos3);
    let x = (canvas.width() - size) / 2;
    let y = (canvas.height() - size) / 2;
    imageops::overlay(canvas, &resized, i64::from(x), i64::from(y));
}
