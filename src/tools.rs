//! Detection of the external PDF tools.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::exec::run_with_timeout;

/// Ghostscript locations checked before PATH (Homebrew on Apple Silicon and Intel).
const GHOSTSCRIPT_LOCATIONS: &[&str] = &["/opt/homebrew/bin/gs", "/usr/local/bin/gs"];

/// External programs the pipeline can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// Ghostscript: rewriting and rasterizing.
    Ghostscript,
    /// qpdf: lossless structural optimization.
    Qpdf,
    /// PDFtk: stream compression (optional).
    Pdftk,
    /// OCRmyPDF: text layer and JBIG2 recompression for scans (optional).
    OcrMyPdf,
    /// pdffonts (poppler): detects an embedded text layer.
    Pdffonts,
    /// jbig2enc: lets OCRmyPDF encode bilevel images as JBIG2.
    Jbig2,
}

impl ToolKind {
    /// All tools, in display order.
    pub const ALL: [ToolKind; 6] = [
        Self::Ghostscript,
        Self::Qpdf,
        Self::Pdftk,
        Self::OcrMyPdf,
        Self::Pdffonts,
        Self::Jbig2,
    ];

    /// Executable names searched on PATH.
    #[must_use]
    pub fn binary_names(self) -> &'static [&'static str] {
        match self {
            Self::Ghostscript => &["gs", "ghostscript"],
            Self::Qpdf => &["qpdf"],
            Self::Pdftk => &["pdftk"],
            Self::OcrMyPdf => &["ocrmypdf"],
            Self::Pdffonts => &["pdffonts"],
            Self::Jbig2 => &["jbig2", "jbig2enc"],
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ghostscript => write!(f, "Ghostscript"),
            Self::Qpdf => write!(f, "qpdf"),
            Self::Pdftk => write!(f, "PDFtk"),
            Self::OcrMyPdf => write!(f, "OCRmyPDF"),
            Self::Pdffonts => write!(f, "pdffonts"),
            Self::Jbig2 => write!(f, "jbig2enc"),
        }
    }
}

/// Availability of one tool, for display.
#[derive(Debug, Clone)]
pub struct ToolStatus {
    /// Which tool.
    pub kind: ToolKind,
    /// Resolved path, if found.
    pub path: Option<PathBuf>,
    /// Version string, if it could be queried.
    pub version: Option<String>,
}

/// Resolved tool paths.
#[derive(Debug, Clone, Default)]
pub struct Tools {
    gs: Option<PathBuf>,
    qpdf: Option<PathBuf>,
    pdftk: Option<PathBuf>,
    ocrmypdf: Option<PathBuf>,
    pdffonts: Option<PathBuf>,
    jbig2: Option<PathBuf>,
}

impl Tools {
    /// Detect tools using default search locations.
    #[must_use]
    pub fn detect() -> Self {
        Self::detect_with(&Config::default())
    }

    /// Detect tools, honoring path overrides from `config`.
    ///
    /// An override that does not resolve leaves the tool missing rather than
    /// silently falling back to a different binary.
    #[must_use]
    pub fn detect_with(config: &Config) -> Self {
        let resolve = |kind: ToolKind, configured: &Option<PathBuf>| match configured {
            Some(path) => {
                let found = resolve_override(path);
                if found.is_none() {
                    log::warn!("{kind} override {} not found", path.display());
                }
                found
            }
            None => search(kind),
        };

        Self {
            gs: resolve(ToolKind::Ghostscript, &config.gs_path),
            qpdf: resolve(ToolKind::Qpdf, &config.qpdf_path),
            pdftk: resolve(ToolKind::Pdftk, &config.pdftk_path),
            ocrmypdf: resolve(ToolKind::OcrMyPdf, &config.ocrmypdf_path),
            pdffonts: search(ToolKind::Pdffonts),
            jbig2: search(ToolKind::Jbig2),
        }
    }

    /// No tools at all.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Set a tool path explicitly.
    #[must_use]
    pub fn with_path(mut self, kind: ToolKind, path: impl Into<PathBuf>) -> Self {
        let path = Some(path.into());
        match kind {
            ToolKind::Ghostscript => self.gs = path,
            ToolKind::Qpdf => self.qpdf = path,
            ToolKind::Pdftk => self.pdftk = path,
            ToolKind::OcrMyPdf => self.ocrmypdf = path,
            ToolKind::Pdffonts => self.pdffonts = path,
            ToolKind::Jbig2 => self.jbig2 = path,
        }
        self
    }

    /// Path of a tool, if available.
    #[must_use]
    pub fn path(&self, kind: ToolKind) -> Option<&Path> {
        match kind {
            ToolKind::Ghostscript => self.gs.as_deref(),
            ToolKind::Qpdf => self.qpdf.as_deref(),
            ToolKind::Pdftk => self.pdftk.as_deref(),
            ToolKind::OcrMyPdf => self.ocrmypdf.as_deref(),
            ToolKind::Pdffonts => self.pdffonts.as_deref(),
            ToolKind::Jbig2 => self.jbig2.as_deref(),
        }
    }

    /// Path of a tool, or [`Error::ToolMissing`].
    pub fn require(&self, kind: ToolKind) -> Result<&Path> {
        self.path(kind)
            .ok_or_else(|| Error::ToolMissing(kind.to_string()))
    }

    /// Whether a tool is available.
    #[must_use]
    pub fn has(&self, kind: ToolKind) -> bool {
        self.path(kind).is_some()
    }

    /// Query a tool's version string (first line of output).
    #[must_use]
    pub fn version(&self, kind: ToolKind) -> Option<String> {
        let path = self.path(kind)?;
        let mut cmd = Command::new(path);
        cmd.arg("--version");
        let output = run_with_timeout(&kind.to_string(), &mut cmd, Duration::from_secs(10)).ok()?;
        output
            .stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
    }

    /// Status of every tool, including versions.
    #[must_use]
    pub fn describe(&self) -> Vec<ToolStatus> {
        ToolKind::ALL
            .into_iter()
            .map(|kind| ToolStatus {
                kind,
                path: self.path(kind).map(Path::to_path_buf),
                version: self.version(kind),
            })
            .collect()
    }
}

fn search(kind: ToolKind) -> Option<PathBuf> {
    if kind == ToolKind::Ghostscript {
        if let Some(found) = GHOSTSCRIPT_LOCATIONS
            .iter()
            .map(Path::new)
            .find(|p| p.is_file())
        {
            return Some(found.to_path_buf());
        }
    }
    kind.binary_names()
        .iter()
        .find_map(|name| which::which(name).ok())
}

fn resolve_override(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        Some(path.to_path_buf())
    } else {
        which::which(path).ok()
    }
}
