//! Document rendering
//!
//! Turns an uploaded PDF or raster image into either a preview PNG or a
//! print-ready PDF. PDF pages are rasterized through `pdftoppm` into a
//! scoped temp directory, page counts come from `pdfinfo`, and the mode
//! filters are pure functions over one page image.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbImage};
use tracing::{debug, info};

use crate::command::run_cmd;
use crate::error::{PalError, PalResult};
use crate::pdf::images_to_pdf;

/// Raster formats accepted for preview and printing (besides `.pdf`)
pub const SUPPORTED_IMAGE_EXTS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Image transform applied before preview/printing
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Pass the source through untouched
    Raw,
    /// Single-channel luminance
    Grayscale,
    /// Hard threshold to black/white
    Bw,
    /// Floyd-Steinberg error diffusion to 1-bit
    Dither,
    /// Edge detection, contrast stretch, invert, threshold
    Outline,
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Raw => "raw",
            RenderMode::Grayscale => "grayscale",
            RenderMode::Bw => "bw",
            RenderMode::Dither => "dither",
            RenderMode::Outline => "outline",
        }
    }
}

impl std::str::FromStr for RenderMode {
    type Err = PalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(RenderMode::Raw),
            "grayscale" => Ok(RenderMode::Grayscale),
            "bw" => Ok(RenderMode::Bw),
            "dither" => Ok(RenderMode::Dither),
            "outline" => Ok(RenderMode::Outline),
            other => Err(PalError::Validation(format!(
                "Unsupported mode: {other} (expected raw|grayscale|bw|dither|outline)"
            ))),
        }
    }
}

impl std::fmt::Display for RenderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived print artifact returned by [`prepare_print_file`].
///
/// When `prepared` is set the path is a temp file the caller must delete
/// once print submission finished, success or not.
#[derive(Debug)]
pub struct PreparedFile {
    pub path: PathBuf,
    pub prepared: bool,
    pub pages: Option<u32>,
    pub mode: RenderMode,
}

fn lowercase_ext(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Count pages of a PDF via `pdfinfo`.
pub async fn pdf_page_count(path: &Path) -> PalResult<u32> {
    if !path.exists() {
        return Err(PalError::NotFound(format!("PDF not found: {}", path.display())));
    }
    let path_str = path.to_string_lossy();
    let res = run_cmd(&["pdfinfo", &path_str], Duration::from_secs(8), true).await?;
    for line in res.stdout.lines() {
        if line.to_ascii_lowercase().starts_with("pages:") {
            if let Some(value) = line.splitn(2, ':').nth(1) {
                if let Ok(pages) = value.trim().parse::<u32>() {
                    return Ok(pages);
                }
            }
            break;
        }
    }
    Err(PalError::Processing(
        "Unable to determine PDF page count (pdfinfo output unexpected)".into(),
    ))
}

/// Rasterize one 1-indexed PDF page to an RGB image via `pdftoppm`.
///
/// The PNG is written into a scoped temp directory that is removed on
/// every exit path.
pub async fn render_pdf_page(path: &Path, page: u32, dpi: u32) -> PalResult<RgbImage> {
    if page < 1 {
        return Err(PalError::Processing("page must be >= 1".into()));
    }
    let tmp = tempfile::Builder::new().prefix("printerpal_pdf_").tempdir()?;
    let out_prefix = tmp.path().join("page");

    let page_str = page.to_string();
    let dpi_str = dpi.to_string();
    let path_str = path.to_string_lossy().into_owned();
    let prefix_str = out_prefix.to_string_lossy().into_owned();
    // pdftoppm uses 1-based page numbers
    run_cmd(
        &[
            "pdftoppm",
            "-png",
            "-f",
            &page_str,
            "-l",
            &page_str,
            "-r",
            &dpi_str,
            "-singlefile",
            &path_str,
            &prefix_str,
        ],
        Duration::from_secs(25),
        true,
    )
    .await?;

    let png_path = out_prefix.with_extension("png");
    if !png_path.exists() {
        return Err(PalError::Processing(
            "pdftoppm did not produce expected PNG output".into(),
        ));
    }
    let img = image::open(&png_path)
        .map_err(|e| PalError::Processing(format!("Unable to decode rasterized page: {e}")))?;
    Ok(img.to_rgb8())
}

fn open_image(path: &Path) -> PalResult<RgbImage> {
    let img = image::open(path)
        .map_err(|e| PalError::Processing(format!("Unable to open image: {e}")))?;
    Ok(img.to_rgb8())
}

/// Stretch gray levels so the darkest pixel maps to 0 and the brightest
/// to 255 (no-op on flat images).
fn autocontrast(img: &GrayImage) -> GrayImage {
    let (mut lo, mut hi) = (u8::MAX, u8::MIN);
    for p in img.pixels() {
        lo = lo.min(p[0]);
        hi = hi.max(p[0]);
    }
    if hi <= lo {
        return img.clone();
    }
    let span = (hi - lo) as u32;
    let mut out = img.clone();
    for p in out.pixels_mut() {
        p[0] = (((p[0] - lo) as u32 * 255) / span) as u8;
    }
    out
}

fn binarize(img: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = img.clone();
    for p in out.pixels_mut() {
        p[0] = if p[0] >= threshold { 255 } else { 0 };
    }
    out
}

/// Apply a render mode to one page image.
///
/// Deterministic: same input and threshold produce byte-identical output.
/// The result is always RGB for uniform downstream handling.
pub fn apply_mode(img: &RgbImage, mode: RenderMode, threshold: u8) -> RgbImage {
    match mode {
        RenderMode::Raw => img.clone(),
        RenderMode::Grayscale => {
            let gray = DynamicImage::ImageRgb8(img.clone()).to_luma8();
            DynamicImage::ImageLuma8(gray).to_rgb8()
        }
        RenderMode::Bw => {
            let gray = DynamicImage::ImageRgb8(img.clone()).to_luma8();
            DynamicImage::ImageLuma8(binarize(&gray, threshold)).to_rgb8()
        }
        RenderMode::Dither => {
            let mut gray = DynamicImage::ImageRgb8(img.clone()).to_luma8();
            image::imageops::dither(&mut gray, &image::imageops::BiLevel);
            DynamicImage::ImageLuma8(gray).to_rgb8()
        }
        RenderMode::Outline => {
            let gray = DynamicImage::ImageRgb8(img.clone()).to_luma8();
            let edges = image::imageops::filter3x3(
                &gray,
                &[-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0],
            );
            let stretched = autocontrast(&edges);
            let mut inverted = stretched;
            image::imageops::invert(&mut inverted);
            DynamicImage::ImageLuma8(binarize(&inverted, threshold)).to_rgb8()
        }
    }
}

/// Render a preview PNG for one page of a source file.
///
/// Width is accepted in [64, 2000]; the image is only ever downscaled,
/// preserving aspect ratio.
pub async fn render_preview_png(
    path: &Path,
    mode: RenderMode,
    page: u32,
    width: u32,
    preview_dpi: u32,
    threshold: u8,
) -> PalResult<Vec<u8>> {
    if !(64..=2000).contains(&width) {
        return Err(PalError::Processing("width must be between 64 and 2000".into()));
    }

    let ext = lowercase_ext(path);
    let img = if ext == "pdf" {
        render_pdf_page(path, page, preview_dpi).await?
    } else if SUPPORTED_IMAGE_EXTS.contains(&ext.as_str()) {
        open_image(path)?
    } else {
        return Err(PalError::Processing(
            "Preview supports PDF and common image formats".into(),
        ));
    };

    let filtered = apply_mode(&img, mode, threshold);

    let (w0, h0) = filtered.dimensions();
    if w0 == 0 || h0 == 0 {
        return Err(PalError::Processing("Invalid image dimensions".into()));
    }
    // Downscale only, preserve aspect ratio.
    let scale = (width as f64 / w0 as f64).min(1.0);
    let new_w = ((w0 as f64 * scale) as u32).max(1);
    let new_h = ((h0 as f64 * scale) as u32).max(1);
    let resized = DynamicImage::ImageRgb8(filtered).resize_exact(new_w, new_h, FilterType::Lanczos3);

    let mut buf = Vec::new();
    resized
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PalError::Processing(format!("PNG encoding failed: {e}")))?;
    Ok(buf)
}

/// Prepare a source file for printing.
///
/// Mode `raw` hands the original path back untouched. Every other mode
/// produces a new temp PDF the caller owns and must delete.
pub async fn prepare_print_file(
    src: &Path,
    mode: RenderMode,
    print_dpi: u32,
    max_pdf_pages: u32,
    threshold: u8,
) -> PalResult<PreparedFile> {
    if !src.exists() {
        return Err(PalError::Processing(format!(
            "Source file not found: {}",
            src.display()
        )));
    }

    if mode == RenderMode::Raw {
        // Print the original, no conversion.
        return Ok(PreparedFile {
            path: src.to_path_buf(),
            prepared: false,
            pages: None,
            mode,
        });
    }

    let ext = lowercase_ext(src);
    if ext == "pdf" {
        let pages = pdf_page_count(src).await?;
        if pages > max_pdf_pages {
            return Err(PalError::Processing(format!(
                "PDF has {pages} pages, which exceeds processing limit ({max_pdf_pages}). \
                 Either increase printing.max_pdf_pages_process or use 'Raw' mode."
            )));
        }

        info!(source = %src.display(), pages, %mode, dpi = print_dpi, "preparing PDF for print");
        let mut filtered = Vec::with_capacity(pages as usize);
        for page in 1..=pages {
            let img = render_pdf_page(src, page, print_dpi).await?;
            filtered.push(apply_mode(&img, mode, threshold));
        }
        let pdf_bytes = images_to_pdf(&filtered, print_dpi)?;
        let path = write_print_temp(&pdf_bytes)?;
        debug!(output = %path.display(), "prepared print file written");
        return Ok(PreparedFile {
            path,
            prepared: true,
            pages: Some(pages),
            mode,
        });
    }

    if SUPPORTED_IMAGE_EXTS.contains(&ext.as_str()) {
        let img = open_image(src)?;
        let filtered = apply_mode(&img, mode, threshold);
        // Single-page PDF for consistent handling across drivers.
        let pdf_bytes = images_to_pdf(std::slice::from_ref(&filtered), print_dpi)?;
        let path = write_print_temp(&pdf_bytes)?;
        return Ok(PreparedFile {
            path,
            prepared: true,
            pages: Some(1),
            mode,
        });
    }

    Err(PalError::Processing("Unsupported file type for printing".into()))
}

fn write_print_temp(bytes: &[u8]) -> PalResult<PathBuf> {
    let file = tempfile::Builder::new()
        .prefix("printerpal_print_")
        .suffix(".pdf")
        .tempfile()?;
    std::fs::write(file.path(), bytes)?;
    // Caller owns deletion from here on.
    let (_handle, path) = file.keep().map_err(|e| PalError::Io(e.error))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            let v = ((x * 255 / w.max(1)) as u8).wrapping_add((y * 7) as u8);
            Rgb([v, v / 2, 255 - v])
        })
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("BW".parse::<RenderMode>().unwrap(), RenderMode::Bw);
        assert_eq!(" dither ".parse::<RenderMode>().unwrap(), RenderMode::Dither);
        assert!("sepia".parse::<RenderMode>().is_err());
    }

    #[test]
    fn test_apply_mode_deterministic() {
        let img = gradient(120, 80);
        for mode in [
            RenderMode::Raw,
            RenderMode::Grayscale,
            RenderMode::Bw,
            RenderMode::Dither,
            RenderMode::Outline,
        ] {
            let a = apply_mode(&img, mode, 180);
            let b = apply_mode(&img, mode, 180);
            assert_eq!(a.as_raw(), b.as_raw(), "mode {mode} not deterministic");
        }
    }

    #[test]
    fn test_bw_idempotent() {
        let img = gradient(64, 64);
        let once = apply_mode(&img, RenderMode::Bw, 180);
        let twice = apply_mode(&once, RenderMode::Bw, 180);
        assert_eq!(once.as_raw(), twice.as_raw());
    }

    #[test]
    fn test_binarize_idempotent() {
        let gray = DynamicImage::ImageRgb8(gradient(64, 64)).to_luma8();
        let once = binarize(&gray, 128);
        let twice = binarize(&once, 128);
        assert_eq!(once.as_raw(), twice.as_raw());
    }

    #[test]
    fn test_bw_is_bilevel() {
        let out = apply_mode(&gradient(50, 50), RenderMode::Bw, 100);
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_outline_is_bilevel() {
        let out = apply_mode(&gradient(50, 50), RenderMode::Outline, 128);
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_grayscale_channels_equal() {
        let out = apply_mode(&gradient(40, 40), RenderMode::Grayscale, 180);
        assert!(out.pixels().all(|p| p[0] == p[1] && p[1] == p[2]));
    }

    #[tokio::test]
    async fn test_preview_width_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        gradient(1000, 500).save(&path).unwrap();

        let err = render_preview_png(&path, RenderMode::Raw, 1, 63, 150, 180)
            .await
            .unwrap_err();
        assert!(matches!(err, PalError::Processing(_)));
        let err = render_preview_png(&path, RenderMode::Raw, 1, 2001, 150, 180)
            .await
            .unwrap_err();
        assert!(matches!(err, PalError::Processing(_)));
    }

    #[tokio::test]
    async fn test_preview_never_upscales() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        gradient(1000, 500).save(&path).unwrap();

        let png = render_preview_png(&path, RenderMode::Grayscale, 1, 2000, 150, 180)
            .await
            .unwrap();
        let out = image::load_from_memory(&png).unwrap();
        assert_eq!(out.width(), 1000);
        assert_eq!(out.height(), 500);
    }

    #[tokio::test]
    async fn test_preview_downscales_to_requested_width() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        gradient(1000, 500).save(&path).unwrap();

        let png = render_preview_png(&path, RenderMode::Raw, 1, 300, 150, 180)
            .await
            .unwrap();
        let out = image::load_from_memory(&png).unwrap();
        assert_eq!(out.width(), 300);
        assert_eq!(out.height(), 150);
    }

    #[tokio::test]
    async fn test_preview_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let err = render_preview_png(&path, RenderMode::Raw, 1, 300, 150, 180)
            .await
            .unwrap_err();
        assert!(matches!(err, PalError::Processing(_)));
    }

    #[tokio::test]
    async fn test_render_pdf_page_rejects_page_zero() {
        let err = render_pdf_page(Path::new("/nonexistent.pdf"), 0, 150)
            .await
            .unwrap_err();
        assert!(matches!(err, PalError::Processing(_)));
    }

    #[tokio::test]
    async fn test_prepare_raw_returns_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        gradient(100, 100).save(&path).unwrap();

        let prepared = prepare_print_file(&path, RenderMode::Raw, 200, 30, 180)
            .await
            .unwrap();
        assert_eq!(prepared.path, path);
        assert!(!prepared.prepared);
        assert!(prepared.pages.is_none());
    }

    #[tokio::test]
    async fn test_prepare_image_produces_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        gradient(100, 100).save(&path).unwrap();

        let prepared = prepare_print_file(&path, RenderMode::Bw, 200, 30, 180)
            .await
            .unwrap();
        assert!(prepared.prepared);
        assert_ne!(prepared.path, path);
        let bytes = std::fs::read(&prepared.path).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        std::fs::remove_file(&prepared.path).unwrap();
    }

    #[tokio::test]
    async fn test_prepare_rejects_oversized_pdf_before_rasterizing() {
        use std::os::unix::fs::PermissionsExt;

        // Fake poppler tools: pdfinfo reports 40 pages, pdftoppm leaves a
        // marker so an unexpected invocation is detectable.
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("rasterized");
        std::fs::write(
            dir.path().join("pdfinfo"),
            "#!/bin/sh\necho 'Pages:          40'\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("pdftoppm"),
            format!("#!/bin/sh\ntouch '{}'\n", marker.display()),
        )
        .unwrap();
        for name in ["pdfinfo", "pdftoppm"] {
            std::fs::set_permissions(
                dir.path().join(name),
                std::fs::Permissions::from_mode(0o755),
            )
            .unwrap();
        }

        let old_path = std::env::var_os("PATH").unwrap_or_default();
        let new_path = std::env::join_paths(
            std::iter::once(dir.path().to_path_buf()).chain(std::env::split_paths(&old_path)),
        )
        .unwrap();
        unsafe { std::env::set_var("PATH", &new_path) };

        let src = dir.path().join("big.pdf");
        std::fs::write(&src, b"%PDF-1.4").unwrap();
        let result = prepare_print_file(&src, RenderMode::Bw, 200, 30, 180).await;

        unsafe { std::env::set_var("PATH", &old_path) };

        let err = result.unwrap_err();
        assert!(matches!(err, PalError::Processing(_)));
        assert!(err.to_string().contains("30"), "message names the limit");
        assert!(!marker.exists(), "rasterizer must not run past the page limit");
    }
}
