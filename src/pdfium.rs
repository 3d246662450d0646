//! pdfium access: page rasterisation and per-page text.
//!
//! ## Why bind per call?
//!
//! `pdfium-render` is built with `thread_safe`, which serialises every call
//! into the C library behind a global lock. Binding inside each blocking
//! call keeps the handle owned by the thread that uses it, and lets the
//! service start (and fall back to other strategies) when the shared
//! library is missing.
//!
//! All functions here are blocking; the dispatcher already runs jobs on
//! `tokio::task::spawn_blocking`.

use crate::error::ConvertError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Bind to the pdfium shared library.
///
/// Search order: the explicit `library` (file or directory), `./`, then the
/// system library path.
pub fn bind(library: Option<&Path>) -> Result<Pdfium, ConvertError> {
    let bindings = match library {
        Some(path) if path.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
        }
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ConvertError::unavailable("pdfium", format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

/// Whether pdfium can be bound at all.
pub fn is_available(library: Option<&Path>) -> bool {
    bind(library).is_ok()
}

fn load<'a>(pdfium: &'a Pdfium, pdf_path: &Path) -> Result<PdfDocument<'a>, ConvertError> {
    pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| ConvertError::malformed("pdf", format!("{e:?}")))
}

/// Number of pages in the document.
pub fn page_count(pdf_path: &Path, library: Option<&Path>) -> Result<usize, ConvertError> {
    let pdfium = bind(library)?;
    let document = load(&pdfium, pdf_path)?;
    Ok(document.pages().len() as usize)
}

/// Text of every page, in order.
pub fn page_texts(pdf_path: &Path, library: Option<&Path>) -> Result<Vec<String>, ConvertError> {
    let pdfium = bind(library)?;
    let document = load(&pdfium, pdf_path)?;
    let mut texts = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| ConvertError::malformed("pdf", format!("page {}: {e:?}", idx + 1)))?
            .all();
        texts.push(text);
    }
    debug!("pdfium extracted text from {} pages", texts.len());
    Ok(texts)
}

/// Rasterise pages at `dpi`. With `first_only`, only page 1 is rendered.
pub fn render_pages(
    pdf_path: &Path,
    library: Option<&Path>,
    dpi: u32,
    first_only: bool,
) -> Result<Vec<DynamicImage>, ConvertError> {
    let pdfium = bind(library)?;
    let document = load(&pdfium, pdf_path)?;
    let pages = document.pages();
    let total_pages = pages.len() as usize;
    let wanted = if first_only { total_pages.min(1) } else { total_pages };
    info!("PDF loaded: {} pages, rendering {} at {} dpi", total_pages, wanted, dpi);

    let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);
    let mut results = Vec::with_capacity(wanted);
    for idx in 0..wanted {
        results.push(render_one(&pages, idx, &render_config)?);
    }
    Ok(results)
}

/// Rasterise a single page (0-based) at `dpi`.
pub fn render_page(
    pdf_path: &Path,
    library: Option<&Path>,
    index: usize,
    dpi: u32,
) -> Result<DynamicImage, ConvertError> {
    let pdfium = bind(library)?;
    let document = load(&pdfium, pdf_path)?;
    let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);
    render_one(&document.pages(), index, &render_config)
}

fn render_one(
    pages: &PdfPages,
    idx: usize,
    render_config: &PdfRenderConfig,
) -> Result<DynamicImage, ConvertError> {
    let page = pages
        .get(idx as u16)
        .map_err(|e| ConvertError::malformed("pdf", format!("page {}: {e:?}", idx + 1)))?;
    let bitmap = page.render_with_config(render_config).map_err(|e| ConvertError::Unusable {
        reason: format!("rasterising page {} failed: {e:?}", idx + 1),
    })?;
    let image = bitmap.as_image();
    debug!("Rendered page {} → {}x{} px", idx + 1, image.width(), image.height());
    Ok(image)
}
