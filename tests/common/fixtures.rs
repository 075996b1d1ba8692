//! Test fixtures and PDF builders.
//!
//! Real documents are produced with printpdf so the MuPDF renderer and
//! the lopdf writer can be exercised end to end.

use anyhow::Result;
use printpdf::*;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Builder for multi-page test PDFs with a text layer.
///
/// Each line is placed with its own text object, one line per 10 mm from
/// the top margin, in 12 pt Helvetica.
#[derive(Debug, Clone)]
pub struct TestPdfBuilder {
    title: String,
    pages: Vec<Vec<String>>,
    page_width: Mm,
    page_height: Mm,
}

impl TestPdfBuilder {
    pub fn new() -> Self {
        Self {
            title: "Test Document".to_string(),
            pages: vec![Vec::new()],
            page_width: Mm(210.0),  // A4 width
            page_height: Mm(297.0), // A4 height
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    /// Adds a line of text to the current page.
    pub fn with_line(mut self, line: &str) -> Self {
        if let Some(page) = self.pages.last_mut() {
            page.push(line.to_string());
        }
        self
    }

    /// Starts a new page; following lines land on it.
    pub fn new_page(mut self) -> Self {
        self.pages.push(Vec::new());
        self
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Builds the PDF in memory.
    pub fn build_bytes(self) -> Result<Vec<u8>> {
        let (doc, first_page, first_layer) =
            PdfDocument::new(&self.title, self.page_width, self.page_height, "Layer 1");
        let font = doc.add_builtin_font(BuiltinFont::Helvetica)?;

        for (index, lines) in self.pages.iter().enumerate() {
            let (page, layer) = if index == 0 {
                (first_page, first_layer)
            } else {
                doc.add_page(self.page_width, self.page_height, "Layer 1")
            };
            let layer = doc.get_page(page).get_layer(layer);
            for (i, line) in lines.iter().enumerate() {
                let y = self.page_height.0 - 30.0 - 10.0 * i as f32;
                layer.use_text(line.as_str(), 12.0, Mm(20.0), Mm(y), &font);
            }
        }

        Ok(doc.save_to_bytes()?)
    }

    /// Builds the PDF and writes it to the specified path.
    pub fn build(self, output_path: &Path) -> Result<PathBuf> {
        let bytes = self.build_bytes()?;
        let mut writer = BufWriter::new(fs::File::create(output_path)?);
        std::io::Write::write_all(&mut writer, &bytes)?;
        Ok(output_path.to_path_buf())
    }
}

impl Default for TestPdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Two pages: contact details on the first, nothing sensitive on the second.
pub fn contact_sheet() -> TestPdfBuilder {
    TestPdfBuilder::new()
        .with_title("Contact Sheet")
        .with_line("Contact: jane.doe@example.com")
        .with_line("Office hours Monday to Friday")
        .new_page()
        .with_line("Nothing to see here")
}
