//! End-to-end integration tests for docconv.
//!
//! Most tests pin the host capabilities to "nothing installed" so that only
//! the pure-Rust strategies run and results do not depend on the machine.
//! Tests that need a real external tool check for it and skip when absent.
//! The office suite is replaced by small shell scripts on unix.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use docconv::converters::ooxml;
use docconv::{
    Capabilities, ConversionJob, ConversionOptions, Dispatcher, ErrorKind, ServiceConfig,
    SourceFile, SourceFormat, TargetFormat, Tool,
};
use std::io::Cursor;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn offline() -> Dispatcher {
    Dispatcher::with_capabilities(ServiceConfig::default(), Capabilities::none())
}

fn txt_to_pdf(d: &Dispatcher, text: &str) -> Vec<u8> {
    let job = ConversionJob::new(
        SourceFile::new(text.as_bytes().to_vec(), "in.txt"),
        SourceFormat::Txt,
        TargetFormat::Pdf,
    );
    d.convert(&job).expect("txt → pdf").bytes
}

fn pdf_job(pdf: Vec<u8>, target: TargetFormat) -> ConversionJob {
    ConversionJob::new(SourceFile::new(pdf, "doc.pdf"), SourceFormat::Pdf, target)
}

fn png(w: u32, h: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        w,
        h,
        image::Rgb([10, 120, 200]),
    ));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png).unwrap();
    buf
}

/// Skip this test unless the detected host has `$tool`.
macro_rules! skip_unless_tool {
    ($caps:expr, $tool:expr) => {{
        if !$caps.has($tool) {
            println!("SKIP: {} not installed", $tool);
            return;
        }
    }};
}

// ── Pure-Rust paths ──────────────────────────────────────────────────────────

#[test]
fn txt_pdf_txt_round_trip() {
    let d = offline();
    let pdf = txt_to_pdf(&d, "Hello docconv\r\nSecond line");
    assert!(pdf.starts_with(b"%PDF"));

    let out = d.convert(&pdf_job(pdf, TargetFormat::Txt)).unwrap();
    assert_eq!(out.filename, "doc.txt");
    assert_eq!(out.stats.strategy, "page-text:lopdf");
    let skipped: Vec<_> = out
        .stats
        .attempts
        .iter()
        .map(|a| (a.strategy.as_str(), a.kind))
        .collect();
    assert_eq!(
        skipped,
        vec![
            ("layout-text", ErrorKind::BackendUnavailable),
            ("page-text:pdfium", ErrorKind::BackendUnavailable),
        ]
    );
    assert_eq!(String::from_utf8(out.bytes).unwrap().trim(), "Hello docconv\nSecond line");
}

#[test]
fn multi_page_text_uses_join_separator() {
    let d = offline();
    let body: String = (0..60).map(|i| format!("row {i}\n")).collect();
    let pdf = txt_to_pdf(&d, &body);
    let options = ConversionOptions::builder(TargetFormat::Txt)
        .join_pages("\n<<PAGE>>\n")
        .build()
        .unwrap();
    let out = d.convert(&pdf_job(pdf, TargetFormat::Txt).with_options(options)).unwrap();
    let text = String::from_utf8(out.bytes).unwrap();
    assert_eq!(text.matches("<<PAGE>>").count(), 1);
    assert!(text.contains("row 0") && text.contains("row 59"));
}

#[test]
fn images_skip_undecodable_inputs() {
    let d = offline();
    let job = ConversionJob::images(vec![
        SourceFile::new(png(40, 20), "a.png"),
        SourceFile::new(b"definitely not a png".to_vec(), "broken.png"),
        SourceFile::new(png(10, 30), "b.png"),
    ]);
    let out = d.convert(&job).unwrap();
    assert_eq!(out.filename, "images.pdf");
    assert_eq!(out.stats.strategy, "image-compose");
    assert_eq!(out.stats.skipped_inputs, 1);
    let doc = lopdf::Document::load_mem(&out.bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 2);
}

#[test]
fn images_all_invalid_is_empty_input() {
    let d = offline();
    let job = ConversionJob::images(vec![SourceFile::new(b"junk".to_vec(), "x.png")]);
    let failure = d.convert(&job).unwrap_err();
    assert_eq!(failure.kind, ErrorKind::EmptyInput);
    assert!(failure.kind.is_client_error());
}

#[test]
fn pdf_to_xlsx_finds_column_tables() {
    let d = offline();
    let pdf = txt_to_pdf(
        &d,
        "Inventory\n\nName    Qty   Price\nApple   3     0.50\nPear    12    0.80\n",
    );
    let out = d.convert(&pdf_job(pdf, TargetFormat::Xlsx)).unwrap();
    assert_eq!(out.filename, "doc.xlsx");
    assert_eq!(out.stats.strategy, "page-tables:lopdf");

    let sheets = ooxml::read_xlsx(&out.bytes).unwrap();
    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0].name, "page_1_table_1");
    assert_eq!(sheets[0].rows[0], vec!["Name", "Qty", "Price"]);
    assert_eq!(sheets[0].rows[2], vec!["Pear", "12", "0.80"]);
}

#[test]
fn pdf_to_docx_rebuilds_paragraphs() {
    let d = offline();
    let pdf = txt_to_pdf(&d, "Heading\nA paragraph of text.");
    let out = d.convert(&pdf_job(pdf, TargetFormat::Docx)).unwrap();
    assert_eq!(out.stats.strategy, "text-docx:lopdf");
    let paragraphs = ooxml::read_docx_paragraphs(&out.bytes).unwrap();
    assert_eq!(paragraphs, vec!["Heading", "A paragraph of text."]);
}

#[test]
fn docx_falls_back_to_native_render() {
    let d = offline();
    let docx = ooxml::write_docx(&[vec!["Native fallback".to_string()]]).unwrap();
    let job = ConversionJob::new(
        SourceFile::new(docx, "letter.docx"),
        SourceFormat::Docx,
        TargetFormat::Pdf,
    );
    let out = d.convert(&job).unwrap();
    assert_eq!(out.filename, "letter.pdf");
    assert_eq!(out.stats.strategy, "docx-native-render");
    assert_eq!(out.stats.attempts[0].strategy, "office-suite");
    let pages = docconv::pdf_reader::page_texts(&out.bytes).unwrap();
    assert!(pages[0].contains("Native fallback"));
}

#[test]
fn xlsx_native_render_lists_sheets() {
    let d = offline();
    let xlsx = ooxml::write_xlsx(&[ooxml::Sheet {
        name: "Budget".into(),
        rows: vec![vec!["Item".into(), "Cost".into()], vec!["Paper".into(), "4".into()]],
    }])
    .unwrap();
    let job = ConversionJob::new(
        SourceFile::new(xlsx, "budget.xlsx"),
        SourceFormat::Xlsx,
        TargetFormat::Pdf,
    );
    let out = d.convert(&job).unwrap();
    assert_eq!(out.stats.strategy, "sheet-native-render");
    let text = docconv::pdf_reader::page_texts(&out.bytes).unwrap().join("\n");
    assert!(text.contains("Sheet: Budget"));
    assert!(text.contains("Paper"));
}

#[test]
fn corrupt_pdf_is_malformed_input() {
    let d = offline();
    let failure = d
        .convert(&pdf_job(b"%PDF-1.4 this is not really a pdf".to_vec(), TargetFormat::Txt))
        .unwrap_err();
    assert_eq!(failure.kind, ErrorKind::MalformedInput);
}

#[test]
fn pdf_to_jpg_without_rasteriser_is_exhausted() {
    let d = offline();
    let pdf = txt_to_pdf(&d, "page");
    let failure = d.convert(&pdf_job(pdf, TargetFormat::Jpg)).unwrap_err();
    assert_eq!(failure.kind, ErrorKind::AllStrategiesExhausted);
    assert_eq!(failure.attempts.len(), 2);
    assert!(failure.attempts.iter().all(|a| a.kind == ErrorKind::BackendUnavailable));
}

// ── Installed tools (skipped when absent) ────────────────────────────────────

#[test]
fn pdf_to_jpg_with_installed_rasteriser() {
    let d = Dispatcher::new(ServiceConfig::default());
    let caps = d.capabilities().clone();
    if !caps.has(Tool::Pdfium) && !caps.has(Tool::Pdftoppm) {
        println!("SKIP: no rasteriser installed");
        return;
    }
    let body: String = (0..120).map(|i| format!("line {i}\n")).collect();
    let pdf = txt_to_pdf(&d, &body);

    let first = ConversionOptions::builder(TargetFormat::Jpg)
        .first_page_only(true)
        .dpi(72)
        .build()
        .unwrap();
    let out = d.convert(&pdf_job(pdf.clone(), TargetFormat::Jpg).with_options(first)).unwrap();
    assert_eq!(out.filename, "doc.jpg");
    assert_eq!(&out.bytes[..2], &[0xFF, 0xD8]);

    let all = ConversionOptions::builder(TargetFormat::Jpg)
        .dpi(200)
        .build()
        .unwrap();
    let out = d
        .convert(&pdf_job(pdf, TargetFormat::Jpg).with_options(all))
        .unwrap();
    assert_eq!(out.filename, "doc.zip");
    let mut archive = zip::ZipArchive::new(Cursor::new(out.bytes)).unwrap();
    assert_eq!(archive.len(), 3);
    for n in 1..=3 {
        let mut entry = archive.by_name(&format!("page_{n}.jpg")).unwrap();
        let mut jpeg = Vec::new();
        std::io::Read::read_to_end(&mut entry, &mut jpeg).unwrap();
        image::load_from_memory_with_format(&jpeg, image::ImageFormat::Jpeg).unwrap();
    }
}

#[test]
fn layout_text_with_pdftotext() {
    let d = Dispatcher::new(ServiceConfig::default());
    skip_unless_tool!(d.capabilities(), Tool::Pdftotext);
    let pdf = txt_to_pdf(
        &d,
        "Column A      Column B\nvalue one     value two\nmore text to pass the length check",
    );
    let options = ConversionOptions::builder(TargetFormat::Txt).ocr(false).build().unwrap();
    let out = d.convert(&pdf_job(pdf, TargetFormat::Txt).with_options(options)).unwrap();
    assert_eq!(out.stats.strategy, "layout-text");
    let text = String::from_utf8(out.bytes).unwrap();
    assert!(text.contains("Column A"));
    assert!(text.contains("value two"));
}

// ── Scripted external tools (unix) ───────────────────────────────────────────

/// Write an executable shell script standing in for an external tool.
#[cfg(unix)]
fn write_script(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
mod poppler {
    use super::*;
    use std::path::Path;

    /// `pdftoppm` that drops `fixture` where page 1 is expected, and
    /// `tesseract` that reads `recognised` off any image.
    fn ocr_dispatcher(bin: &Path, recognised: &str) -> Dispatcher {
        let fixture = bin.join("fixture.png");
        std::fs::write(&fixture, png(40, 20)).unwrap();
        let pdftoppm = write_script(
            bin,
            "pdftoppm",
            &format!(
                "for a in \"$@\"; do prefix=\"$a\"; done\ncp '{}' \"$prefix-1.png\"",
                fixture.display()
            ),
        );
        let tesseract = write_script(bin, "tesseract", &format!("printf '%s\\n' '{recognised}'"));
        let config = ServiceConfig::builder()
            .pdftoppm_binary(pdftoppm.to_string_lossy())
            .tesseract_binary(tesseract.to_string_lossy())
            .build()
            .unwrap();
        let caps = Capabilities {
            pdftoppm: Some(pdftoppm),
            tesseract: Some(tesseract),
            ..Capabilities::none()
        };
        Dispatcher::with_capabilities(config, caps)
    }

    #[test]
    fn longer_ocr_text_replaces_thin_page() {
        let bin = tempfile::tempdir().unwrap();
        let d = ocr_dispatcher(bin.path(), "recovered scanned paragraph text");
        let pdf = txt_to_pdf(&offline(), "weak");
        let out = d.convert(&pdf_job(pdf, TargetFormat::Txt)).unwrap();
        assert_eq!(out.stats.strategy, "page-text:lopdf");
        assert_eq!(
            String::from_utf8(out.bytes).unwrap().trim(),
            "recovered scanned paragraph text"
        );
    }

    #[test]
    fn shorter_ocr_text_keeps_extraction() {
        let bin = tempfile::tempdir().unwrap();
        let d = ocr_dispatcher(bin.path(), "x");
        let pdf = txt_to_pdf(&offline(), "weak");
        let out = d.convert(&pdf_job(pdf, TargetFormat::Txt)).unwrap();
        assert_eq!(String::from_utf8(out.bytes).unwrap().trim(), "weak");
    }

    #[test]
    fn ocr_disabled_leaves_thin_page() {
        let bin = tempfile::tempdir().unwrap();
        let d = ocr_dispatcher(bin.path(), "recovered scanned paragraph text");
        let pdf = txt_to_pdf(&offline(), "weak");
        let options = ConversionOptions::builder(TargetFormat::Txt)
            .ocr(false)
            .build()
            .unwrap();
        let out = d
            .convert(&pdf_job(pdf, TargetFormat::Txt).with_options(options))
            .unwrap();
        assert_eq!(String::from_utf8(out.bytes).unwrap().trim(), "weak");
    }

    #[test]
    fn layout_text_is_returned_as_written() {
        let bin = tempfile::tempdir().unwrap();
        let pdftotext = write_script(
            bin.path(),
            "pdftotext",
            r"printf 'first page with enough text to count\nsecond line\n\fpage two\n\f'",
        );
        let config = ServiceConfig::builder()
            .pdftotext_binary(pdftotext.to_string_lossy())
            .build()
            .unwrap();
        let caps = Capabilities {
            pdftotext: Some(pdftotext),
            ..Capabilities::none()
        };
        let d = Dispatcher::with_capabilities(config, caps);
        let pdf = txt_to_pdf(&offline(), "anything");
        let options = ConversionOptions::builder(TargetFormat::Txt)
            .join_pages("\n<<PAGE>>\n")
            .build()
            .unwrap();
        let out = d
            .convert(&pdf_job(pdf, TargetFormat::Txt).with_options(options))
            .unwrap();
        assert_eq!(out.stats.strategy, "layout-text");
        assert_eq!(
            String::from_utf8(out.bytes).unwrap(),
            "first page with enough text to count\nsecond line\n\u{c}page two\n\u{c}"
        );
    }
}

// ── Scripted office suite (unix) ─────────────────────────────────────────────

#[cfg(unix)]
mod office {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, Instant};

    /// Argument loop shared by the fake `soffice` scripts: sets `$out` to the
    /// `--outdir` value and `$in` to the input file.
    const PARSE_ARGS: &str = r#"out=""; in=""
while [ $# -gt 0 ]; do
  case "$1" in
    --outdir) out="$2"; shift 2 ;;
    --convert-to) shift 2 ;;
    -env:*|--*) shift ;;
    *) in="$1"; shift ;;
  esac
done
name=$(basename "$in"); stem="${name%.*}"
"#;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        write_script(dir, name, &format!("{PARSE_ARGS}{body}"))
    }

    fn dispatcher(soffice: &Path, config: docconv::ServiceConfigBuilder) -> Dispatcher {
        let config = config.office_binary(soffice.to_string_lossy()).build().unwrap();
        let caps = Capabilities {
            office_suite: Some(soffice.to_path_buf()),
            ..Capabilities::none()
        };
        Dispatcher::with_capabilities(config, caps)
    }

    fn docx_job() -> ConversionJob {
        let docx = ooxml::write_docx(&[vec!["from the fallback".to_string()]]).unwrap();
        ConversionJob::new(
            SourceFile::new(docx, "memo.docx"),
            SourceFormat::Docx,
            TargetFormat::Pdf,
        )
    }

    #[test]
    fn office_suite_output_is_returned() {
        let bin = tempfile::tempdir().unwrap();
        let soffice = script(
            bin.path(),
            "soffice",
            r#"echo "$HOME" > "$out/home.txt"; printf '%%PDF-1.4 scripted' > "$out/$stem.pdf""#,
        );
        let d = dispatcher(&soffice, ServiceConfig::builder());
        let out = d.convert(&docx_job()).unwrap();
        assert_eq!(out.stats.strategy, "office-suite");
        assert_eq!(out.filename, "memo.pdf");
        assert_eq!(out.bytes, b"%PDF-1.4 scripted");
    }

    #[test]
    fn office_suite_timeout_falls_back() {
        let bin = tempfile::tempdir().unwrap();
        let soffice = script(bin.path(), "soffice", "sleep 10");
        let d = dispatcher(&soffice, ServiceConfig::builder().office_timeout_secs(1));

        let start = Instant::now();
        let out = d.convert(&docx_job()).unwrap();
        assert!(start.elapsed() < Duration::from_secs(8));
        assert_eq!(out.stats.strategy, "docx-native-render");
        assert_eq!(out.stats.attempts.len(), 1);
        assert_eq!(out.stats.attempts[0].kind, ErrorKind::Timeout);
    }

    #[test]
    fn office_suite_failure_is_reported_per_attempt() {
        let bin = tempfile::tempdir().unwrap();
        let soffice = script(
            bin.path(),
            "soffice",
            "echo 'source file could not be loaded' >&2; exit 3",
        );
        let root = tempfile::tempdir().unwrap();
        let d = dispatcher(
            &soffice,
            ServiceConfig::builder()
                .slide_text_fallback(false)
                .diagnostic_mode(true)
                .temp_root(root.path()),
        );
        let job = ConversionJob::new(
            SourceFile::new(b"PK\x03\x04".to_vec(), "deck.pptx"),
            SourceFormat::Pptx,
            TargetFormat::Pdf,
        );

        let failure = d.convert(&job).unwrap_err();
        assert_eq!(failure.kind, ErrorKind::AllStrategiesExhausted);
        assert_eq!(failure.attempts.len(), 1);
        assert_eq!(failure.attempts[0].kind, ErrorKind::ProcessFailure);
        assert!(failure.detail.contains("office-suite"));
        let kept = failure.diagnostic_path.expect("diagnostic workspace");
        assert!(kept.starts_with(root.path()));
    }

    #[test]
    fn office_suite_without_output_is_a_failure() {
        let bin = tempfile::tempdir().unwrap();
        let soffice = script(bin.path(), "soffice", "exit 0");
        let d = dispatcher(&soffice, ServiceConfig::builder());
        let out = d.convert(&docx_job()).unwrap();
        assert_eq!(out.stats.strategy, "docx-native-render");
        assert_eq!(out.stats.attempts[0].kind, ErrorKind::ProcessFailure);
    }

    #[test]
    fn concurrent_jobs_get_separate_profiles() {
        let bin = tempfile::tempdir().unwrap();
        let soffice = script(
            bin.path(),
            "soffice",
            r#"printf '%%PDF-%s' "$HOME" > "$out/$stem.pdf""#,
        );
        let d = dispatcher(&soffice, ServiceConfig::builder());
        let jobs: Vec<ConversionJob> = (0..4).map(|_| docx_job()).collect();
        let results = tokio_test::block_on(docconv::convert_all(&d, jobs, 4));
        let homes: std::collections::HashSet<Vec<u8>> =
            results.into_iter().map(|r| r.unwrap().bytes).collect();
        assert_eq!(homes.len(), 4);
    }
}
