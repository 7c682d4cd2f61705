//! Recognizing scanned documents: PDFs without an embedded text layer.
//!
//! Scans are where OCR with JBIG2 recompression pays off, so the OCR and
//! scan strategies only run on documents this module reports as text-free.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::exec::run_with_timeout;
use crate::tools::{ToolKind, Tools};

/// Whether `pdf` embeds any fonts, i.e. carries a text layer.
///
/// `pdffonts` is asked first. Without it, qpdf's JSON object dump is
/// searched for font dictionaries.
pub fn has_text_layer(tools: &Tools, pdf: &Path, timeout: Duration) -> Result<bool> {
    if let Some(pdffonts) = tools.path(ToolKind::Pdffonts) {
        let mut cmd = Command::new(pdffonts);
        cmd.arg(pdf);
        match run_with_timeout("pdffonts", &mut cmd, timeout) {
            Ok(output) => return Ok(lists_fonts(&output.stdout)),
            Err(e) => log::debug!("pdffonts failed on {}: {e}", pdf.display()),
        }
    }

    if let Some(qpdf) = tools.path(ToolKind::Qpdf) {
        let mut cmd = Command::new(qpdf);
        cmd.args(["--json", "--json-key=objects"]).arg(pdf);
        let output = run_with_timeout("qpdf", &mut cmd, timeout)?;
        return Ok(declares_fonts(&output.stdout));
    }

    Err(Error::ToolMissing("pdffonts or qpdf".to_string()))
}

/// True when `pdf` has no text layer. Undetermined documents count as not
/// scanned.
#[must_use]
pub fn is_scanned(tools: &Tools, pdf: &Path, timeout: Duration) -> bool {
    match has_text_layer(tools, pdf, timeout) {
        Ok(has_text) => !has_text,
        Err(e) => {
            log::debug!("text layer of {} unknown: {e}", pdf.display());
            false
        }
    }
}

/// `pdffonts` prints a two-line header followed by one line per font.
fn lists_fonts(stdout: &str) -> bool {
    stdout.lines().filter(|l| !l.trim().is_empty()).count() > 2
}

fn declares_fonts(qpdf_json: &str) -> bool {
    qpdf_json.contains("\"/Font\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDFFONTS_HEADER: &str = "\
name                                 type              encoding         emb sub uni object ID
------------------------------------ ----------------- ---------------- --- --- --- ---------
";

    #[test]
    fn test_pdffonts_output() {
        assert!(!lists_fonts(PDFFONTS_HEADER));
        let with_font = format!(
            "{PDFFONTS_HEADER}ABCDEE+Calibri                       TrueType          WinAnsi          yes yes no       8  0\n"
        );
        assert!(lists_fonts(&with_font));
    }

    #[test]
    fn test_qpdf_json_fonts() {
        let text = r#"{"objects": {"obj:4 0 R": {"/BaseFont": "/Helvetica", "/Type": "/Font"}}}"#;
        let image_only = r#"{"objects": {"obj:4 0 R": {"/Subtype": "/Image", "/Type": "/XObject"}}}"#;
        assert!(declares_fonts(text));
        assert!(!declares_fonts(image_only));
    }

    #[test]
    fn test_no_detector_is_error() {
        let result = has_text_layer(&Tools::none(), Path::new("a.pdf"), Duration::from_secs(1));
        assert!(matches!(result, Err(Error::ToolMissing(_))));
        assert!(!is_scanned(&Tools::none(), Path::new("a.pdf"), Duration::from_secs(1)));
    }

    #[cfg(unix)]
    #[test]
    fn test_pdffonts_script() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("pdffonts");
        // Font list only for text.pdf
        let body = format!(
            "#!/bin/sh\ncat <<'EOF'\n{PDFFONTS_HEADER}EOF\ncase \"$1\" in *text.pdf) echo 'Helvetica Type 1 Standard no no no 5 0' ;; esac\n"
        );
        std::fs::write(&script, body).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let tools = Tools::none().with_path(ToolKind::Pdffonts, &script);
        let timeout = Duration::from_secs(10);
        assert!(has_text_layer(&tools, Path::new("/docs/text.pdf"), timeout).unwrap());
        assert!(is_scanned(&tools, Path::new("/docs/scan.pdf"), timeout));
    }
}
