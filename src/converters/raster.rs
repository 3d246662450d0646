//! PDF pages as pictures: JPG (single file or ZIP bundle) and PPTX.

use super::images::encode_jpeg;
use super::ooxml::{self, SlideImage};
use crate::capabilities::Tool;
use crate::error::ConvertError;
use crate::format::TargetFormat;
use crate::job::ConversionJob;
use crate::process::ProcessSpec;
use crate::strategy::{Strategy, StrategyContext, StrategyOutput};
use crate::workspace::Workspace;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// JPEG quality of PDF→JPG output.
pub const JPG_QUALITY: u8 = 85;

/// Which engine turns PDF pages into bitmaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rasterizer {
    /// pdfium, optionally from an explicit library path.
    Pdfium(Option<PathBuf>),
    /// Poppler's `pdftoppm` binary.
    Pdftoppm(String),
}

impl Rasterizer {
    pub fn requires(&self) -> &'static [Tool] {
        match self {
            Rasterizer::Pdfium(_) => &[Tool::Pdfium],
            Rasterizer::Pdftoppm(_) => &[Tool::Pdftoppm],
        }
    }

    /// Render every page (or only the first) at `dpi`. `out_dir` receives
    /// intermediate files and must be private to the caller.
    pub fn render(
        &self,
        pdf: &Path,
        dpi: u32,
        first_only: bool,
        out_dir: &Path,
        ctx: &StrategyContext<'_>,
    ) -> Result<Vec<DynamicImage>, ConvertError> {
        match self {
            Rasterizer::Pdfium(lib) => crate::pdfium::render_pages(
                pdf,
                lib.as_deref(),
                dpi,
                first_only,
            ),
            Rasterizer::Pdftoppm(bin) => {
                let range = first_only.then_some((1, 1));
                pdftoppm(bin, pdf, dpi, range, out_dir, ctx)
            }
        }
    }

    /// Render one 0-based page at `dpi`.
    pub fn render_page(
        &self,
        pdf: &Path,
        index: usize,
        dpi: u32,
        out_dir: &Path,
        ctx: &StrategyContext<'_>,
    ) -> Result<DynamicImage, ConvertError> {
        match self {
            Rasterizer::Pdfium(lib) => crate::pdfium::render_page(pdf, lib.as_deref(), index, dpi),
            Rasterizer::Pdftoppm(bin) => {
                let n = index + 1;
                pdftoppm(bin, pdf, dpi, Some((n, n)), out_dir, ctx)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| ConvertError::Unusable {
                        reason: format!("pdftoppm rendered nothing for page {n}"),
                    })
            }
        }
    }
}

/// `pdftoppm -r <dpi> -png [-f a -l b] <pdf> <out_dir>/page`, then load the
/// `page-N.png` files in page order.
fn pdftoppm(
    bin: &str,
    pdf: &Path,
    dpi: u32,
    range: Option<(usize, usize)>,
    out_dir: &Path,
    ctx: &StrategyContext<'_>,
) -> Result<Vec<DynamicImage>, ConvertError> {
    std::fs::create_dir_all(out_dir).map_err(|e| ConvertError::io("creating render directory", e))?;
    let mut spec = ProcessSpec::new(bin, out_dir, ctx.tool_timeout())
        .arg("-r")
        .arg(dpi.to_string())
        .arg("-png");
    if let Some((first, last)) = range {
        spec = spec
            .arg("-f")
            .arg(first.to_string())
            .arg("-l")
            .arg(last.to_string());
    }
    let spec = spec.arg(pdf).arg(out_dir.join("page"));
    let out = ctx.runner.run(&spec)?;
    if !out.success() {
        let code = out.exit_code;
        return Err(out.into_failure(bin, format!("exit status {code:?}")));
    }

    let mut files = numbered_pngs(out_dir)?;
    files.sort();
    debug!("pdftoppm produced {} pages", files.len());
    files
        .into_iter()
        .map(|(_, path)| {
            image::open(&path).map_err(|e| ConvertError::Unusable {
                reason: format!("unreadable page image {}: {e}", path.display()),
            })
        })
        .collect()
}

/// `page-7.png` / `page-007.png` → `(7, path)`.
fn numbered_pngs(dir: &Path) -> Result<Vec<(usize, PathBuf)>, ConvertError> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| ConvertError::io("listing render directory", e))?;
    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
        let number = name
            .strip_prefix("page-")
            .and_then(|rest| rest.strip_suffix(".png"))
            .and_then(|n| n.parse::<usize>().ok());
        if let Some(n) = number {
            files.push((n, path));
        }
    }
    Ok(files)
}

/// Bundle JPEG pages as `page_1.jpg … page_n.jpg` in a deflate ZIP.
pub fn package_jpegs(pages: &[Vec<u8>]) -> Result<Vec<u8>, ConvertError> {
    let entries: Vec<(String, Vec<u8>)> = pages
        .iter()
        .enumerate()
        .map(|(i, jpeg)| (format!("page_{}.jpg", i + 1), jpeg.clone()))
        .collect();
    ooxml::write_zip(&entries)
}

fn scratch_name(prefix: &'static str, raster: &Rasterizer) -> &'static str {
    match (prefix, raster) {
        ("raster-jpg", Rasterizer::Pdfium(_)) => "raster-jpg:pdfium",
        ("raster-jpg", Rasterizer::Pdftoppm(_)) => "raster-jpg:pdftoppm",
        (_, Rasterizer::Pdfium(_)) => "raster-pptx:pdfium",
        (_, Rasterizer::Pdftoppm(_)) => "raster-pptx:pdftoppm",
    }
}

// ── PDF → JPG ───────────────────────────────────────────────────────────

pub struct RasterJpgStrategy {
    raster: Rasterizer,
}

impl RasterJpgStrategy {
    pub fn new(raster: Rasterizer) -> Self {
        Self { raster }
    }
}

impl Strategy for RasterJpgStrategy {
    fn name(&self) -> &'static str {
        scratch_name("raster-jpg", &self.raster)
    }

    fn requires(&self) -> &'static [Tool] {
        self.raster.requires()
    }

    fn run(
        &self,
        job: &ConversionJob,
        ws: &Workspace,
        ctx: &StrategyContext<'_>,
    ) -> Result<StrategyOutput, ConvertError> {
        let pdf = ctx.primary_input()?;
        let scratch = ws.scratch(self.name())?;
        let opts = &job.options;
        let images = self.raster.render(pdf, opts.dpi, opts.first_page_only, &scratch, ctx)?;
        if images.is_empty() {
            return Err(ConvertError::Unusable {
                reason: "PDF has no pages".into(),
            });
        }
        let jpegs = images
            .iter()
            .map(|img| encode_jpeg(img, JPG_QUALITY))
            .collect::<Result<Vec<_>, _>>()?;

        if jpegs.len() == 1 {
            let single = jpegs.into_iter().next().unwrap_or_default();
            Ok(StrategyOutput::new(single, TargetFormat::Jpg))
        } else {
            Ok(StrategyOutput::zip(package_jpegs(&jpegs)?))
        }
    }
}

// ── PDF → PPTX ──────────────────────────────────────────────────────────

pub struct RasterPptxStrategy {
    raster: Rasterizer,
}

impl RasterPptxStrategy {
    pub fn new(raster: Rasterizer) -> Self {
        Self { raster }
    }
}

impl Strategy for RasterPptxStrategy {
    fn name(&self) -> &'static str {
        scratch_name("raster-pptx", &self.raster)
    }

    fn requires(&self) -> &'static [Tool] {
        self.raster.requires()
    }

    fn run(
        &self,
        job: &ConversionJob,
        ws: &Workspace,
        ctx: &StrategyContext<'_>,
    ) -> Result<StrategyOutput, ConvertError> {
        let pdf = ctx.primary_input()?;
        let scratch = ws.scratch(self.name())?;
        let images = self.raster.render(pdf, job.options.dpi, false, &scratch, ctx)?;
        if images.is_empty() {
            return Err(ConvertError::Unusable {
                reason: "PDF has no pages".into(),
            });
        }
        let mut slides = Vec::with_capacity(images.len());
        for img in &images {
            let mut png = Vec::new();
            img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                .map_err(|e| ConvertError::Internal(format!("PNG encoding failed: {e}")))?;
            slides.push(SlideImage {
                png,
                width_px: img.width(),
                height_px: img.height(),
            });
        }
        Ok(StrategyOutput::new(ooxml::write_pptx(&slides)?, TargetFormat::Pptx))
    }
}
