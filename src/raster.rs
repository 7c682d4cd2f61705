//! Rasterizing PDF pages with Ghostscript for quality comparison.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use std::time::Duration;

use imgref::ImgVec;
use rgb::RGB8;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::exec::run_with_timeout;

/// How pages are sampled for comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSelection {
    /// The first N pages.
    First,
    /// N pages spread evenly through the document.
    #[default]
    Distributed,
    /// N pages drawn with a seeded generator.
    Random,
}

impl fmt::Display for PageSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::Distributed => write!(f, "distributed"),
            Self::Random => write!(f, "random"),
        }
    }
}

impl FromStr for PageSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "distributed" => Ok(Self::Distributed),
            "random" => Ok(Self::Random),
            other => Err(Error::config(
                "page_selection",
                format!("unknown selection '{other}' (expected first, distributed or random)"),
            )),
        }
    }
}

/// Choose up to `max_pages` 0-based page indices out of `total_pages`.
///
/// The result is sorted and free of duplicates. Random selection is
/// reproducible for a given seed.
#[must_use]
pub fn select_pages(
    total_pages: usize,
    max_pages: usize,
    selection: PageSelection,
    seed: u64,
) -> Vec<usize> {
    let count = max_pages.min(total_pages);
    if count == total_pages {
        return (0..total_pages).collect();
    }

    match selection {
        PageSelection::First => (0..count).collect(),
        PageSelection::Distributed => (0..count).map(|i| i * total_pages / count).collect(),
        PageSelection::Random => {
            let mut rng = fastrand::Rng::with_seed(seed);
            let mut pages: Vec<usize> = (0..total_pages).collect();
            rng.shuffle(&mut pages);
            pages.truncate(count);
            pages.sort_unstable();
            pages
        }
    }
}

/// One rendered page.
pub struct RasterPage {
    /// 0-based page index.
    pub index: usize,
    /// PNG written by Ghostscript.
    pub path: PathBuf,
    /// Decoded pixels.
    pub image: ImgVec<RGB8>,
}

/// Rendered pages of one PDF. The PNG files live until this is dropped.
pub struct RasterizedPdf {
    _dir: TempDir,
    /// Pages that rendered successfully, in index order.
    pub pages: Vec<RasterPage>,
}

impl RasterizedPdf {
    /// Rendered page with the given index.
    #[must_use]
    pub fn page(&self, index: usize) -> Option<&RasterPage> {
        self.pages.iter().find(|p| p.index == index)
    }
}

/// Ghostscript-backed page renderer.
#[derive(Debug, Clone)]
pub struct Rasterizer {
    gs: PathBuf,
    qpdf: Option<PathBuf>,
    dpi: u32,
    timeout: Duration,
}

impl Rasterizer {
    /// Create a rasterizer using the Ghostscript binary at `gs`.
    #[must_use]
    pub fn new(gs: impl Into<PathBuf>, dpi: u32, timeout: Duration) -> Self {
        Self {
            gs: gs.into(),
            qpdf: None,
            dpi,
            timeout,
        }
    }

    /// Count pages with qpdf when available, falling back to Ghostscript.
    #[must_use]
    pub fn with_qpdf(mut self, qpdf: Option<&Path>) -> Self {
        self.qpdf = qpdf.map(Path::to_path_buf);
        self
    }

    /// Number of pages in `pdf`.
    pub fn page_count(&self, pdf: &Path) -> Result<usize> {
        if let Some(ref qpdf) = self.qpdf {
            let mut cmd = Command::new(qpdf);
            cmd.arg("--show-npages").arg(pdf);
            match run_with_timeout("qpdf", &mut cmd, self.timeout) {
                Ok(output) => {
                    if let Some(count) = last_number(&output.stdout) {
                        return Ok(count);
                    }
                }
                Err(e) => log::debug!("qpdf could not count pages of {}: {e}", pdf.display()),
            }
        }

        // SAFER stays on; only the document itself is readable.
        let program = format!(
            "({}) (r) file runpdfbegin pdfpagecount = quit",
            escape_postscript(&pdf.to_string_lossy())
        );
        let mut permit = OsString::from("--permit-file-read=");
        permit.push(pdf);
        let mut cmd = Command::new(&self.gs);
        cmd.args(["-q", "-dNODISPLAY", "-dSAFER"])
            .arg(permit)
            .arg("-c")
            .arg(program);

        let output = run_with_timeout("gs", &mut cmd, self.timeout)?;
        last_number(&output.stdout).ok_or_else(|| Error::Rasterize {
            path: pdf.to_path_buf(),
            reason: format!("could not read page count from {:?}", output.stdout.trim()),
        })
    }

    /// Render the given 0-based pages to PNG and decode them.
    ///
    /// Pages that fail to render are skipped; it is an error only when no
    /// page renders at all.
    pub fn rasterize(&self, pdf: &Path, pages: &[usize]) -> Result<RasterizedPdf> {
        let dir = tempfile::Builder::new().prefix("pdf-squeeze-raster-").tempdir()?;
        let mut rendered = Vec::with_capacity(pages.len());

        for &index in pages {
            let png = dir.path().join(format!("page-{:03}.png", index + 1));
            match self.render_page(pdf, index, &png).and_then(|()| load_png(&png)) {
                Ok(image) => rendered.push(RasterPage {
                    index,
                    path: png,
                    image,
                }),
                Err(e) => log::debug!("page {} of {} not rendered: {e}", index + 1, pdf.display()),
            }
        }

        if rendered.is_empty() {
            return Err(Error::Rasterize {
                path: pdf.to_path_buf(),
                reason: "no pages rendered".to_string(),
            });
        }

        Ok(RasterizedPdf {
            _dir: dir,
            pages: rendered,
        })
    }

    fn render_page(&self, pdf: &Path, index: usize, png: &Path) -> Result<()> {
        let page = index + 1;
        let mut cmd = Command::new(&self.gs);
        cmd.args([
            "-dSAFER",
            "-dBATCH",
            "-dNOPAUSE",
            "-dQUIET",
            "-sDEVICE=png16m",
            "-dTextAlphaBits=4",
            "-dGraphicsAlphaBits=4",
        ])
        .arg(format!("-r{}", self.dpi))
        .arg(format!("-dFirstPage={page}"))
        .arg(format!("-dLastPage={page}"))
        .arg(format!("-sOutputFile={}", png.display()))
        .arg(pdf);

        run_with_timeout("gs", &mut cmd, self.timeout)?;

        if png.is_file() {
            Ok(())
        } else {
            Err(Error::Rasterize {
                path: pdf.to_path_buf(),
                reason: format!("page {page} produced no image"),
            })
        }
    }
}

/// Encode RGB8 pixels as a PNG.
pub fn save_png(img: &ImgVec<RGB8>, path: &Path) -> Result<()> {
    let (width, height) = (img.width(), img.height());
    let bytes: Vec<u8> = img.pixels().flat_map(|p| [p.r, p.g, p.b]).collect();
    let buffer = image::RgbImage::from_raw(width as u32, height as u32, bytes).ok_or_else(|| {
        Error::ImageLoad {
            path: path.to_path_buf(),
            reason: "pixel buffer does not match dimensions".to_string(),
        }
    })?;
    buffer.save(path).map_err(|e| Error::ImageLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Decode a PNG into RGB8 pixels.
pub fn load_png(path: &Path) -> Result<ImgVec<RGB8>> {
    let decoded = image::open(path).map_err(|e| Error::ImageLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let rgb = decoded.to_rgb8();
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);
    let pixels: Vec<RGB8> = rgb.pixels().map(|p| RGB8::new(p[0], p[1], p[2])).collect();
    Ok(ImgVec::new(pixels, width, height))
}

fn last_number(stdout: &str) -> Option<usize> {
    stdout
        .lines()
        .map(str::trim)
        .rev()
        .find_map(|l| l.parse::<usize>().ok())
}

fn escape_postscript(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '(' | ')' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_all_when_short() {
        for selection in [PageSelection::First, PageSelection::Distributed, PageSelection::Random] {
            assert_eq!(select_pages(3, 5, selection, 7), vec![0, 1, 2]);
        }
    }

    #[test]
    fn test_select_first() {
        assert_eq!(select_pages(20, 3, PageSelection::First, 0), vec![0, 1, 2]);
    }

    #[test]
    fn test_select_distributed() {
        assert_eq!(select_pages(10, 5, PageSelection::Distributed, 0), vec![0, 2, 4, 6, 8]);
        assert_eq!(select_pages(7, 3, PageSelection::Distributed, 0), vec![0, 2, 4]);
    }

    #[test]
    fn test_select_random_is_seeded() {
        let a = select_pages(100, 5, PageSelection::Random, 42);
        let b = select_pages(100, 5, PageSelection::Random, 42);
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
        assert!(a.iter().all(|&p| p < 100));
    }

    #[test]
    fn test_select_empty_document() {
        assert!(select_pages(0, 5, PageSelection::Distributed, 0).is_empty());
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!("First".parse::<PageSelection>().unwrap(), PageSelection::First);
        assert!("middle".parse::<PageSelection>().is_err());
    }

    #[test]
    fn test_escape_postscript() {
        assert_eq!(escape_postscript("/tmp/a (1).pdf"), "/tmp/a \\(1\\).pdf");
        assert_eq!(escape_postscript("C:\\x.pdf"), "C:\\\\x.pdf");
    }

    #[test]
    fn test_load_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        let img = image::RgbImage::from_fn(4, 3, |x, y| image::Rgb([x as u8 * 10, y as u8 * 20, 7]));
        img.save(&path).unwrap();

        let loaded = load_png(&path).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (4, 3));
        let pixels: Vec<RGB8> = loaded.pixels().collect();
        assert_eq!(pixels[5], RGB8::new(10, 20, 7));
    }

    #[test]
    fn test_save_png_keeps_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crop.png");
        let pixels: Vec<RGB8> = (0..6_u8).map(|i| RGB8::new(i, i * 2, 255 - i)).collect();
        let img = ImgVec::new(pixels.clone(), 3, 2);

        save_png(&img, &path).unwrap();
        let loaded = load_png(&path).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (3, 2));
        assert_eq!(loaded.pixels().collect::<Vec<_>>(), pixels);
    }

    #[test]
    fn test_last_number() {
        assert_eq!(last_number("WARNING: repaired\n12\n"), Some(12));
        assert_eq!(last_number("no pages here"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_page_count_prefers_qpdf_and_keeps_gs_sandboxed() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let qpdf = dir.path().join("qpdf");
        std::fs::write(&qpdf, "#!/bin/sh\necho 7\n").unwrap();
        // Refuses to count unless run with SAFER
        let gs = dir.path().join("gs");
        std::fs::write(
            &gs,
            "#!/bin/sh\ncase \"$*\" in *NOSAFER*) exit 1 ;; *-dSAFER*--permit-file-read=*) echo 4 ;; *) exit 1 ;; esac\n",
        )
        .unwrap();
        for script in [&qpdf, &gs] {
            std::fs::set_permissions(script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let timeout = Duration::from_secs(10);
        let pdf = Path::new("/docs/a.pdf");
        let with_qpdf = Rasterizer::new(&gs, 72, timeout).with_qpdf(Some(qpdf.as_path()));
        assert_eq!(with_qpdf.page_count(pdf).unwrap(), 7);

        let gs_only = Rasterizer::new(&gs, 72, timeout);
        assert_eq!(gs_only.page_count(pdf).unwrap(), 4);
    }

    #[test]
    fn test_load_png_missing() {
        let result = load_png(Path::new("/nonexistent/page.png"));
        assert!(matches!(result, Err(Error::ImageLoad { .. })));
    }
}
