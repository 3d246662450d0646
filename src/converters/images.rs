//! Images → one PDF, a page per decodable image.

use super::read_input;
use crate::error::ConvertError;
use crate::format::TargetFormat;
use crate::job::ConversionJob;
use crate::pdf_writer::PdfBuilder;
use crate::strategy::{Strategy, StrategyContext, StrategyOutput};
use crate::workspace::Workspace;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};
use tracing::{debug, warn};

/// JPEG quality used when embedding images into PDFs.
const EMBED_QUALITY: u8 = 90;

/// Encode an image as baseline RGB JPEG.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ConvertError> {
    encode_rgb_jpeg(&image.to_rgb8(), quality)
}

fn encode_rgb_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>, ConvertError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(rgb)
        .map_err(|e| ConvertError::Internal(format!("JPEG encoding failed: {e}")))?;
    Ok(buf)
}

/// Compose images into a PDF. Returns the PDF and the number of skipped
/// inputs. Fails with `EmptyInput` when nothing could be decoded.
pub fn compose(sources: &[(String, Vec<u8>)]) -> Result<(Vec<u8>, usize), ConvertError> {
    let mut pdf = PdfBuilder::new();
    let mut skipped = 0;
    for (name, bytes) in sources {
        if bytes.is_empty() {
            warn!("Skipping empty image '{}'", name);
            skipped += 1;
            continue;
        }
        let image = match image::load_from_memory(bytes) {
            Ok(img) => img,
            Err(e) => {
                warn!("Skipping undecodable image '{}': {}", name, e);
                skipped += 1;
                continue;
            }
        };
        let rgb = image.to_rgb8();
        let (w, h) = rgb.dimensions();
        if w == 0 || h == 0 {
            warn!("Skipping zero-sized image '{}'", name);
            skipped += 1;
            continue;
        }
        let jpeg = encode_rgb_jpeg(&rgb, EMBED_QUALITY)?;
        debug!("image '{}' → {}x{} page", name, w, h);
        pdf.add_jpeg_page(jpeg, w, h)?;
    }
    if pdf.page_count() == 0 {
        return Err(ConvertError::EmptyInput {
            detail: "No valid image files".into(),
        });
    }
    Ok((pdf.finish()?, skipped))
}

pub struct ImageComposeStrategy;

impl Strategy for ImageComposeStrategy {
    fn name(&self) -> &'static str {
        "image-compose"
    }

    fn run(
        &self,
        job: &ConversionJob,
        _ws: &Workspace,
        ctx: &StrategyContext<'_>,
    ) -> Result<StrategyOutput, ConvertError> {
        let mut sources = Vec::with_capacity(ctx.inputs.len());
        for (path, source) in ctx.inputs.iter().zip(&job.sources) {
            sources.push((source.filename.clone(), read_input(path)?));
        }
        let (pdf, skipped) = compose(&sources)?;
        Ok(StrategyOutput::new(pdf, TargetFormat::Pdf).with_skipped(skipped))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    pub(crate) fn png(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([200, 30, 30])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    #[test]
    fn one_page_per_valid_image() {
        let sources = vec![
            ("a.png".to_string(), png(20, 10)),
            ("broken.png".to_string(), b"not an image".to_vec()),
            ("empty.png".to_string(), Vec::new()),
            ("b.png".to_string(), png(5, 5)),
        ];
        let (pdf, skipped) = compose(&sources).unwrap();
        assert_eq!(skipped, 2);
        let doc = lopdf::Document::load_mem(&pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn nothing_decodable_is_empty_input() {
        let err = compose(&[("x.png".to_string(), b"junk".to_vec())]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyInput);
        assert!(err.to_string().contains("No valid image files"));
    }

    #[test]
    fn jpeg_encoding_produces_jpeg() {
        let img = image::load_from_memory(&png(3, 3)).unwrap();
        let jpeg = encode_jpeg(&img, 85).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }
}
