//! Report artifacts.
//!
//! # Submodules
//!
//! - [`html`]: styled standalone HTML page
//! - [`docx`]: Word document built from a line classifier
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── Chilquinta_Report_2025-05-06.md
//! ├── Chilquinta_Report_2025-05-06.html
//! └── Chilquinta_Report_2025-05-06.docx
//! ```

pub mod docx;
pub mod html;

use crate::models::Branding;
use chrono::NaiveDate;
use docx::DocxError;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// Everything produced from one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub markdown: String,
    pub html: String,
    pub docx: Vec<u8>,
    pub markdown_filename: String,
    pub html_filename: String,
    pub docx_filename: String,
}

/// Run both renderers over the same markdown.
#[instrument(level = "info", skip_all, fields(chars = markdown.chars().count()))]
pub fn render_artifacts(
    markdown: &str,
    branding: &Branding,
    date: NaiveDate,
) -> Result<Artifacts, DocxError> {
    let html = html::render_html(markdown, branding, date);
    let docx = docx::render_docx(markdown)?;
    info!(html_bytes = html.len(), docx_bytes = docx.len(), "Rendered report");
    Ok(Artifacts {
        markdown: markdown.to_string(),
        html,
        docx,
        markdown_filename: branding.report_filename(date, "md"),
        html_filename: branding.report_filename(date, "html"),
        docx_filename: branding.report_filename(date, "docx"),
    })
}

/// Write the three artifacts into `output_dir`, returning their paths.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display()))]
pub async fn write_artifacts(
    artifacts: &Artifacts,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let files: [(&str, &[u8]); 3] = [
        (&artifacts.markdown_filename, artifacts.markdown.as_bytes()),
        (&artifacts.html_filename, artifacts.html.as_bytes()),
        (&artifacts.docx_filename, &artifacts.docx),
    ];
    let mut written = Vec::with_capacity(files.len());
    for (name, bytes) in files {
        let path = output_dir.join(name);
        fs::write(&path, bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "Wrote artifact");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    #[test]
    fn test_render_artifacts_names_and_content() {
        let artifacts =
            render_artifacts("### 🍊 A\n\ntexto", &Branding::new("Chilquinta"), date()).unwrap();
        assert_eq!(artifacts.markdown, "### 🍊 A\n\ntexto");
        assert_eq!(artifacts.html_filename, "Chilquinta_Report_2025-06-02.html");
        assert_eq!(artifacts.docx_filename, "Chilquinta_Report_2025-06-02.docx");
        assert_eq!(artifacts.markdown_filename, "Chilquinta_Report_2025-06-02.md");
        assert!(artifacts.html.contains("<h3>🍊 A</h3>"));
        assert_eq!(&artifacts.docx[..2], b"PK");
    }

    #[tokio::test]
    async fn test_write_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = render_artifacts("hola", &Branding::new("X"), date()).unwrap();
        let paths = write_artifacts(&artifacts, tmp.path()).await.unwrap();
        assert_eq!(paths.len(), 3);
        for path in &paths {
            assert!(path.is_file(), "{} missing", path.display());
        }
        let md = std::fs::read_to_string(tmp.path().join("X_Report_2025-06-02.md")).unwrap();
        assert_eq!(md, "hola");
    }
}
