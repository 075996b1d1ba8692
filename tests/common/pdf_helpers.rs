//! PDF inspection helpers.

use anyhow::Result;
use lopdf::{Document, Object};
use redactkit::{MuPdfRenderer, PageRenderer};

/// Text of the whole document as seen by pdf-extract.
///
/// Image-only documents have no text layer, which pdf-extract may report
/// as an error or even a panic; both read as empty text here.
pub fn extract_text(bytes: &[u8]) -> String {
    std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .ok()
        .and_then(|r| r.ok())
        .unwrap_or_default()
}

/// Text layer of one page as seen by the MuPDF renderer.
pub fn page_text(bytes: &[u8], page: usize) -> Result<String> {
    let renderer = MuPdfRenderer::from_bytes(bytes)?;
    let blocks = renderer.extract_structured_text(page)?;
    Ok(blocks
        .iter()
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("\n"))
}

pub fn page_count(bytes: &[u8]) -> Result<usize> {
    Ok(Document::load_mem(bytes)?.get_pages().len())
}

/// Validates that a PDF is loadable and has basic structure.
pub fn is_valid_pdf(bytes: &[u8]) -> bool {
    Document::load_mem(bytes).is_ok()
}

/// True when page `page` (zero-based) draws at least one image XObject.
pub fn page_has_image(bytes: &[u8], page: usize) -> Result<bool> {
    let doc = Document::load_mem(bytes)?;
    let page_id = *doc
        .get_pages()
        .get(&(page as u32 + 1))
        .ok_or_else(|| anyhow::anyhow!("no page {}", page))?;
    let page_dict = doc.get_dictionary(page_id)?;
    let resources = match page_dict.get(b"Resources")? {
        Object::Reference(id) => doc.get_dictionary(*id)?,
        Object::Dictionary(dict) => dict,
        _ => return Ok(false),
    };
    let xobjects = match resources.get(b"XObject") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id)?,
        Ok(Object::Dictionary(dict)) => dict,
        _ => return Ok(false),
    };
    for (_, value) in xobjects.iter() {
        let stream = match value {
            Object::Reference(id) => doc.get_object(*id)?.as_stream()?,
            Object::Stream(stream) => stream,
            _ => continue,
        };
        if let Ok(subtype) = stream.dict.get(b"Subtype").and_then(Object::as_name) {
            if subtype == b"Image" {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// `[llx, lly, urx, ury]` of a page's MediaBox.
pub fn media_box(bytes: &[u8], page: usize) -> Result<Vec<f32>> {
    let doc = Document::load_mem(bytes)?;
    let page_id = *doc
        .get_pages()
        .get(&(page as u32 + 1))
        .ok_or_else(|| anyhow::anyhow!("no page {}", page))?;
    let values = doc.get_dictionary(page_id)?.get(b"MediaBox")?.as_array()?;
    values
        .iter()
        .map(|v| match v {
            Object::Integer(i) => Ok(*i as f32),
            Object::Real(r) => Ok(*r),
            other => Err(anyhow::anyhow!("unexpected MediaBox entry {:?}", other)),
        })
        .collect()
}
