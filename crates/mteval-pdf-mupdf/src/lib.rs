use std::path::Path;

use mupdf::{Document, TextPageFlags};

use mteval_core::{BackendError, PdfBackend};

/// MuPDF-based implementation of [`PdfBackend`].
///
/// This crate isolates the mupdf dependency (AGPL-3.0) so that the rest of
/// the pipeline does not transitively depend on it.
///
/// Every text line on every page is kept by default. Running headers and
/// footers can be cut with [`MupdfBackend::with_header_exclusion`] and
/// [`MupdfBackend::with_footer_exclusion`] when they would otherwise be
/// aligned as sentences of their own.
#[derive(Debug, Clone, Default)]
pub struct MupdfBackend {
    /// Fraction of page height from the top to drop, if any.
    header_exclusion_ratio: Option<f32>,
    /// Fraction of page height from the bottom to drop, if any.
    footer_exclusion_ratio: Option<f32>,
}

impl MupdfBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop blocks lying entirely in the top `ratio` of each page. `0.0`
    /// disables.
    pub fn with_header_exclusion(mut self, ratio: f32) -> Self {
        self.header_exclusion_ratio = (ratio > 0.0).then_some(ratio);
        self
    }

    /// Drop blocks starting in the bottom `ratio` of each page. `0.0`
    /// disables.
    pub fn with_footer_exclusion(mut self, ratio: f32) -> Self {
        self.footer_exclusion_ratio = (ratio > 0.0).then_some(ratio);
        self
    }

    /// Vertical limits `(header_bottom, footer_top)` for a page spanning
    /// `y0..y1`.
    fn bands(&self, y0: f32, y1: f32) -> (Option<f32>, Option<f32>) {
        let height = y1 - y0;
        (
            self.header_exclusion_ratio.map(|r| y0 + height * r),
            self.footer_exclusion_ratio.map(|r| y1 - height * r),
        )
    }
}

/// Whether a block spanning `top..bottom` survives the header and footer
/// bands.
fn keep_block(top: f32, bottom: f32, header: Option<f32>, footer: Option<f32>) -> bool {
    if header.is_some_and(|h| bottom <= h) {
        return false;
    }
    if footer.is_some_and(|f| top >= f) {
        return false;
    }
    true
}

fn extraction(e: impl std::fmt::Display) -> BackendError {
    BackendError::ExtractionError(e.to_string())
}

impl PdfBackend for MupdfBackend {
    fn extract_text(&self, path: &Path) -> Result<String, BackendError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| BackendError::OpenError("invalid path encoding".into()))?;

        let document =
            Document::open(path_str).map_err(|e| BackendError::OpenError(e.to_string()))?;

        let mut pages_text = Vec::new();
        let mut dropped_blocks = 0usize;

        for page_result in document.pages().map_err(extraction)? {
            let page = page_result.map_err(extraction)?;
            let text_page = page
                .to_text_page(TextPageFlags::empty())
                .map_err(extraction)?;
            let bounds = page.bounds().map_err(extraction)?;
            let (header, footer) = self.bands(bounds.y0, bounds.y1);

            // One line per text line; blocks are separated by a blank line so
            // paragraph boundaries reach the aligner.
            let mut blocks = Vec::new();
            for block in text_page.blocks() {
                let b = block.bounds();
                if !keep_block(b.y0, b.y1, header, footer) {
                    dropped_blocks += 1;
                    continue;
                }
                let mut block_text = String::new();
                for line in block.lines() {
                    let line_text: String = line
                        .chars()
                        .map(|c| c.char().unwrap_or('\u{FFFD}'))
                        .collect();
                    let line_text = line_text.trim_end();
                    if line_text.is_empty() {
                        continue;
                    }
                    block_text.push_str(line_text);
                    block_text.push('\n');
                }
                if !block_text.is_empty() {
                    blocks.push(block_text);
                }
            }
            pages_text.push(blocks.join("\n"));
        }

        tracing::debug!(
            path = %path.display(),
            pages = pages_text.len(),
            dropped_blocks,
            "extracted PDF text"
        );
        Ok(pages_text.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusion_is_off_by_default() {
        let backend = MupdfBackend::new();
        assert_eq!(backend.bands(0.0, 800.0), (None, None));
        assert!(keep_block(0.0, 10.0, None, None));
        assert!(keep_block(790.0, 800.0, None, None));
    }

    #[test]
    fn bands_cut_header_and_footer() {
        let backend = MupdfBackend::new()
            .with_header_exclusion(0.05)
            .with_footer_exclusion(0.05);
        let (header, footer) = backend.bands(0.0, 1000.0);
        assert_eq!(header, Some(50.0));
        assert_eq!(footer, Some(950.0));
        assert!(!keep_block(10.0, 40.0, header, footer));
        assert!(keep_block(40.0, 60.0, header, footer));
        assert!(!keep_block(960.0, 990.0, header, footer));
    }

    #[test]
    fn zero_ratio_disables() {
        let backend = MupdfBackend::new().with_header_exclusion(0.0);
        assert_eq!(backend.bands(0.0, 100.0).0, None);
    }

    /// Minimal PDF with one Helvetica line per page.
    fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
        let font_id = 3 + 2 * pages.len();
        let kids: Vec<String> = (0..pages.len())
            .map(|i| format!("{} 0 R", 3 + 2 * i))
            .collect();
        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                pages.len()
            ),
        ];
        for (i, text) in pages.iter().enumerate() {
            let content_id = 4 + 2 * i;
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 {font_id} 0 R >> >> /Contents {content_id} 0 R >>"
            ));
            let stream = format!("BT /F1 24 Tf 72 700 Td ({text}) Tj ET");
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                stream.len(),
                stream
            ));
        }
        objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref = out.len();
        let mut tail = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            tail.push_str(&format!("{offset:010} 00000 n \n"));
        }
        tail.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
            objects.len() + 1
        ));
        out.extend_from_slice(tail.as_bytes());
        out
    }

    #[test]
    fn pages_are_extracted_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two_pages.pdf");
        std::fs::write(&path, pdf_with_pages(&["First page text", "Second page text"])).unwrap();

        let text = MupdfBackend::new().extract_text(&path).unwrap();
        let first = text.find("First page text").expect("page 1 text");
        let second = text.find("Second page text").expect("page 2 text");
        assert!(first < second);
    }

    #[test]
    fn header_band_drops_top_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("header.pdf");
        std::fs::write(&path, pdf_with_pages(&["Running header"])).unwrap();

        // The line sits about 70pt below the top of a 792pt page.
        let text = MupdfBackend::new()
            .with_header_exclusion(0.2)
            .extract_text(&path)
            .unwrap();
        assert!(!text.contains("Running header"));
    }

    #[test]
    fn missing_file_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = MupdfBackend::new()
            .extract_text(&dir.path().join("absent.pdf"))
            .unwrap_err();
        assert!(matches!(err, BackendError::OpenError(_)));
    }
}
