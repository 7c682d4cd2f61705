//! Compression strategies: one external tool invocation per candidate.
//!
//! Each strategy writes a candidate PDF next to the others in a scratch
//! directory; the selector later decides which one, if any, is kept.

use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::exec::run_with_timeout;
use crate::tools::{ToolKind, Tools};

/// A way of producing a compressed candidate.
pub trait Strategy: Send + Sync {
    /// Unique identifier (e.g., "balanced"). Used in reports and file names.
    fn id(&self) -> &str;

    /// External tool this strategy needs, if any.
    fn tool(&self) -> Option<ToolKind>;

    /// Write a compressed version of `input` to `output`.
    fn run(&self, tools: &Tools, input: &Path, output: &Path, timeout: Duration) -> Result<()>;

    /// Whether the strategy can run with the detected tools.
    fn is_available(&self, tools: &Tools) -> bool {
        self.tool().map_or(true, |kind| tools.has(kind))
    }

    /// Run only on documents without a text layer.
    fn scanned_only(&self) -> bool {
        false
    }
}

/// Lossless structural optimization with qpdf.
#[derive(Debug, Clone, Copy, Default)]
pub struct QpdfConservative;

impl QpdfConservative {
    fn args(input: &Path, output: &Path) -> Vec<OsString> {
        vec![
            "--optimize-images".into(),
            "--compress-streams=y".into(),
            "--object-streams=generate".into(),
            input.into(),
            output.into(),
        ]
    }
}

impl Strategy for QpdfConservative {
    fn id(&self) -> &str {
        "conservative"
    }

    fn tool(&self) -> Option<ToolKind> {
        Some(ToolKind::Qpdf)
    }

    fn run(&self, tools: &Tools, input: &Path, output: &Path, timeout: Duration) -> Result<()> {
        let mut cmd = Command::new(tools.require(ToolKind::Qpdf)?);
        cmd.args(Self::args(input, output));
        run_with_timeout("qpdf", &mut cmd, timeout)?;
        Ok(())
    }
}

/// Ghostscript `pdfwrite` with a fixed preset.
#[derive(Debug, Clone)]
pub struct GhostscriptPreset {
    id: &'static str,
    /// `-dPDFSETTINGS` value.
    pdf_settings: &'static str,
    compatibility: &'static str,
    color_dpi: u32,
    mono_dpi: u32,
    downsample_threshold: &'static str,
    extra: &'static [&'static str],
    scanned_only: bool,
}

impl GhostscriptPreset {
    /// Near-lossless: prepress settings at 300 dpi.
    #[must_use]
    pub fn high_quality() -> Self {
        Self {
            id: "high_quality",
            pdf_settings: "/prepress",
            compatibility: "1.7",
            color_dpi: 300,
            mono_dpi: 1200,
            downsample_threshold: "2.0",
            extra: &[
                "-dGrayImageDownsampleThreshold=2.0",
                "-dMonoImageDownsampleThreshold=2.0",
                "-dCompressFonts=false",
                "-dPreserveAnnots=true",
            ],
            scanned_only: false,
        }
    }

    /// Printer settings at 200 dpi.
    #[must_use]
    pub fn balanced() -> Self {
        Self {
            id: "balanced",
            pdf_settings: "/printer",
            compatibility: "1.6",
            color_dpi: 200,
            mono_dpi: 600,
            downsample_threshold: "1.5",
            extra: &[],
            scanned_only: false,
        }
    }

    /// Ebook settings at 150 dpi with duplicate image detection.
    #[must_use]
    pub fn aggressive_safe() -> Self {
        Self {
            id: "aggressive_safe",
            pdf_settings: "/ebook",
            compatibility: "1.5",
            color_dpi: 150,
            mono_dpi: 600,
            downsample_threshold: "1.2",
            extra: &["-dDetectDuplicateImages=true"],
            scanned_only: false,
        }
    }

    /// Image-only rewrite for scans: forced JPEG at 150 dpi, bilevel at 300.
    #[must_use]
    pub fn scan_hybrid() -> Self {
        Self {
            id: "scan_hybrid",
            pdf_settings: "/ebook",
            compatibility: "1.4",
            color_dpi: 150,
            mono_dpi: 300,
            downsample_threshold: "1.5",
            extra: &[
                "-dJPEGQ=85",
                "-dAutoFilterColorImages=false",
                "-dAutoFilterGrayImages=false",
                "-dColorImageFilter=/DCTEncode",
                "-dGrayImageFilter=/DCTEncode",
            ],
            scanned_only: true,
        }
    }

    fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-sDEVICE=pdfwrite".into(),
            format!("-dCompatibilityLevel={}", self.compatibility).into(),
            format!("-dPDFSETTINGS={}", self.pdf_settings).into(),
            "-dNOPAUSE".into(),
            "-dQUIET".into(),
            "-dBATCH".into(),
            "-dSAFER".into(),
            format!("-dColorImageResolution={}", self.color_dpi).into(),
            format!("-dGrayImageResolution={}", self.color_dpi).into(),
            format!("-dMonoImageResolution={}", self.mono_dpi).into(),
            format!("-dColorImageDownsampleThreshold={}", self.downsample_threshold).into(),
            "-dOptimize=true".into(),
            "-dEmbedAllFonts=true".into(),
            "-dSubsetFonts=true".into(),
        ];
        args.extend(self.extra.iter().map(OsString::from));

        let mut out_arg = OsString::from("-sOutputFile=");
        out_arg.push(output);
        args.push(out_arg);
        args.push(input.into());
        args
    }
}

impl Strategy for GhostscriptPreset {
    fn id(&self) -> &str {
        self.id
    }

    fn tool(&self) -> Option<ToolKind> {
        Some(ToolKind::Ghostscript)
    }

    fn run(&self, tools: &Tools, input: &Path, output: &Path, timeout: Duration) -> Result<()> {
        let mut cmd = Command::new(tools.require(ToolKind::Ghostscript)?);
        cmd.args(self.args(input, output));
        run_with_timeout("gs", &mut cmd, timeout)?;
        Ok(())
    }

    fn scanned_only(&self) -> bool {
        self.scanned_only
    }
}

/// Stream compression with PDFtk.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdftkCompress;

impl PdftkCompress {
    fn args(input: &Path, output: &Path) -> Vec<OsString> {
        vec![input.into(), "output".into(), output.into(), "compress".into()]
    }
}

impl Strategy for PdftkCompress {
    fn id(&self) -> &str {
        "pdftk"
    }

    fn tool(&self) -> Option<ToolKind> {
        Some(ToolKind::Pdftk)
    }

    fn run(&self, tools: &Tools, input: &Path, output: &Path, timeout: Duration) -> Result<()> {
        let mut cmd = Command::new(tools.require(ToolKind::Pdftk)?);
        cmd.args(Self::args(input, output));
        run_with_timeout("pdftk", &mut cmd, timeout)?;
        Ok(())
    }
}

/// OCR pass for scans: OCRmyPDF adds a text layer (JBIG2 for bilevel
/// images when jbig2enc is installed), then Ghostscript recompresses.
#[derive(Debug, Clone)]
pub struct OcrRewrite {
    language: String,
}

impl OcrRewrite {
    /// OCR with the given Tesseract language code.
    #[must_use]
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    fn ocr_args(&self, input: &Path, output: &Path, jbig2: bool) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--quiet".into(),
            "--skip-text".into(),
            "--deskew".into(),
            "--language".into(),
            self.language.clone().into(),
            "--output-type".into(),
            "pdf".into(),
        ];
        if jbig2 {
            args.extend(["--optimize".into(), "3".into(), "--jbig2-lossy".into()]);
        }
        args.push(input.into());
        args.push(output.into());
        args
    }

    fn finish_args(input: &Path, output: &Path) -> Vec<OsString> {
        let mut out_arg = OsString::from("-sOutputFile=");
        out_arg.push(output);
        vec![
            "-sDEVICE=pdfwrite".into(),
            "-dCompatibilityLevel=1.4".into(),
            "-dPDFSETTINGS=/prepress".into(),
            "-dNOPAUSE".into(),
            "-dQUIET".into(),
            "-dBATCH".into(),
            "-dSAFER".into(),
            "-dCompressFonts=true".into(),
            "-dSubsetFonts=true".into(),
            out_arg,
            input.into(),
        ]
    }
}

impl Strategy for OcrRewrite {
    fn id(&self) -> &str {
        "ocr"
    }

    fn tool(&self) -> Option<ToolKind> {
        Some(ToolKind::OcrMyPdf)
    }

    fn run(&self, tools: &Tools, input: &Path, output: &Path, timeout: Duration) -> Result<()> {
        let workdir = tempfile::Builder::new().prefix("pdf-squeeze-ocr-").tempdir()?;
        let ocr_pdf = workdir.path().join("ocr.pdf");

        let mut cmd = Command::new(tools.require(ToolKind::OcrMyPdf)?);
        cmd.args(self.ocr_args(input, &ocr_pdf, tools.has(ToolKind::Jbig2)));
        run_with_timeout("ocrmypdf", &mut cmd, timeout)?;

        // The Ghostscript pass is optional; OCRmyPDF's output stands on its own.
        if let Some(gs) = tools.path(ToolKind::Ghostscript) {
            let mut cmd = Command::new(gs);
            cmd.args(Self::finish_args(&ocr_pdf, output));
            match run_with_timeout("gs", &mut cmd, timeout) {
                Ok(_) if output.is_file() => return Ok(()),
                Ok(_) => log::debug!("gs wrote nothing after OCR of {}", input.display()),
                Err(e) => log::debug!("gs pass after OCR of {} failed: {e}", input.display()),
            }
        }

        fs::copy(&ocr_pdf, output)?;
        Ok(())
    }

    fn scanned_only(&self) -> bool {
        true
    }
}

/// Built-in strategies, most conservative first. The scan strategies are
/// included unless OCR is switched off in `config`.
#[must_use]
pub fn builtin_strategies(config: &Config) -> Vec<Box<dyn Strategy>> {
    let mut strategies: Vec<Box<dyn Strategy>> = vec![
        Box::new(QpdfConservative),
        Box::new(GhostscriptPreset::high_quality()),
        Box::new(GhostscriptPreset::balanced()),
        Box::new(GhostscriptPreset::aggressive_safe()),
        Box::new(PdftkCompress),
    ];
    if config.ocr_enabled {
        strategies.push(Box::new(GhostscriptPreset::scan_hybrid()));
        strategies.push(Box::new(OcrRewrite::new(config.ocr_language.clone())));
    }
    strategies
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_builtin_ids_unique() {
        let strategies = builtin_strategies(&Config::default());
        let mut ids: Vec<&str> = strategies.iter().map(|s| s.id()).collect();
        assert_eq!(ids[0], "conservative");
        assert_eq!(ids.last(), Some(&"ocr"));
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 7);
    }

    #[test]
    fn test_ocr_disabled_drops_scan_strategies() {
        let mut config = Config::default();
        config.ocr_enabled = false;
        let strategies = builtin_strategies(&config);
        assert_eq!(strategies.len(), 5);
        assert!(strategies.iter().all(|s| !s.scanned_only()));
    }

    #[test]
    fn test_scan_strategies_are_scanned_only() {
        let strategies = builtin_strategies(&Config::default());
        let scanned: Vec<&str> = strategies
            .iter()
            .filter(|s| s.scanned_only())
            .map(|s| s.id())
            .collect();
        assert_eq!(scanned, vec!["scan_hybrid", "ocr"]);
    }

    #[test]
    fn test_ocr_args() {
        let ocr = OcrRewrite::new("eng+spa");
        let plain = strings(&ocr.ocr_args(Path::new("in.pdf"), Path::new("out.pdf"), false));
        assert!(plain.windows(2).any(|w| w == ["--language", "eng+spa"]));
        assert!(!plain.contains(&"--jbig2-lossy".to_string()));
        assert_eq!(&plain[plain.len() - 2..], ["in.pdf", "out.pdf"]);

        let jbig2 = strings(&ocr.ocr_args(Path::new("in.pdf"), Path::new("out.pdf"), true));
        assert!(jbig2.contains(&"--jbig2-lossy".to_string()));
        assert!(jbig2.windows(2).any(|w| w == ["--optimize", "3"]));
    }

    #[test]
    fn test_ocr_needs_ocrmypdf() {
        let tools = Tools::none().with_path(ToolKind::Ghostscript, "/usr/bin/gs");
        assert!(!OcrRewrite::new("eng").is_available(&tools));
        let tools = tools.with_path(ToolKind::OcrMyPdf, "/usr/bin/ocrmypdf");
        assert!(OcrRewrite::new("eng").is_available(&tools));
    }

    #[cfg(unix)]
    #[test]
    fn test_ocr_output_kept_without_ghostscript() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("ocrmypdf");
        // Last argument is the output file
        std::fs::write(&script, "#!/bin/sh\nfor a; do out=\"$a\"; done\nprintf '%%PDF-ocr' > \"$out\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let input = dir.path().join("scan.pdf");
        std::fs::write(&input, b"%PDF-scan").unwrap();
        let output = dir.path().join("out.pdf");
        let tools = Tools::none().with_path(ToolKind::OcrMyPdf, &script);

        OcrRewrite::new("eng")
            .run(&tools, &input, &output, Duration::from_secs(10))
            .unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"%PDF-ocr");
    }

    #[test]
    fn test_scan_hybrid_args() {
        let args = strings(&GhostscriptPreset::scan_hybrid().args(Path::new("a"), Path::new("b")));
        assert!(args.contains(&"-dColorImageFilter=/DCTEncode".to_string()));
        assert!(args.contains(&"-dMonoImageResolution=300".to_string()));
    }

    #[test]
    fn test_availability_follows_tools() {
        let tools = Tools::none().with_path(ToolKind::Qpdf, "/usr/bin/qpdf");
        let available: Vec<String> = builtin_strategies(&Config::default())
            .iter()
            .filter(|s| s.is_available(&tools))
            .map(|s| s.id().to_string())
            .collect();
        assert_eq!(available, vec!["conservative"]);
    }

    #[test]
    fn test_ghostscript_args() {
        let args = strings(&GhostscriptPreset::balanced().args(Path::new("in.pdf"), Path::new("/tmp/out.pdf")));
        assert!(args.contains(&"-dPDFSETTINGS=/printer".to_string()));
        assert!(args.contains(&"-dColorImageResolution=200".to_string()));
        assert!(args.contains(&"-sOutputFile=/tmp/out.pdf".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("in.pdf"));
    }

    #[test]
    fn test_aggressive_detects_duplicates() {
        let args = strings(&GhostscriptPreset::aggressive_safe().args(Path::new("a"), Path::new("b")));
        assert!(args.contains(&"-dDetectDuplicateImages=true".to_string()));
        assert!(args.contains(&"-dPDFSETTINGS=/ebook".to_string()));
    }

    #[test]
    fn test_qpdf_and_pdftk_args() {
        let qpdf = strings(&QpdfConservative::args(Path::new("a.pdf"), Path::new("b.pdf")));
        assert_eq!(&qpdf[3..], ["a.pdf", "b.pdf"]);
        let pdftk = strings(&PdftkCompress::args(Path::new("a.pdf"), Path::new("b.pdf")));
        assert_eq!(pdftk, ["a.pdf", "output", "b.pdf", "compress"]);
    }

    #[test]
    fn test_missing_tool_errors() {
        let result = QpdfConservative.run(
            &Tools::none(),
            Path::new("a.pdf"),
            Path::new("b.pdf"),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(crate::Error::ToolMissing(_))));
    }
}
