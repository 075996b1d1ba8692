//! Output document assembly.
//!
//! The redactor only talks to [`DocumentWriter`]. [`LopdfWriter`] builds a
//! fresh PDF with lopdf: rasterized pages become a single full-page image
//! XObject, untouched pages are deep-copied from the source document.

use crate::error::{RedactorError, RedactorResult};
use crate::geometry::PageSize;
use crate::transform::Rotation;
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeMap;

/// Output page parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSpec {
    /// Corrected page size in user units.
    pub size: PageSize,
    /// Orientation correction, applied as `/Rotate` to copied content.
    pub rotation: Rotation,
}

/// Index of a page opened with [`DocumentWriter::begin_page`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageHandle(pub usize);

pub trait DocumentWriter {
    fn begin_page(&mut self, spec: PageSpec) -> RedactorResult<PageHandle>;

    /// Draws `image` stretched over the whole page.
    fn draw_image(&mut self, page: PageHandle, image: &RgbImage) -> RedactorResult<()>;

    /// Copies the content of `source_page` unchanged.
    ///
    /// Either the whole page is copied or the target page is left as it
    /// was; a failed copy never leaves partial content behind.
    fn copy_page_content(&mut self, page: PageHandle, source_page: usize) -> RedactorResult<()>;

    /// Serializes the document. The writer cannot be reused afterwards.
    fn finalize(&mut self) -> RedactorResult<Vec<u8>>;
}

#[derive(Debug)]
enum PageBody {
    Empty,
    Images(Vec<ObjectId>),
    Copied {
        contents: Option<Object>,
        resources: Option<Object>,
        media_box: Option<Object>,
        crop_box: Option<Object>,
        rotate: i64,
    },
}

#[derive(Debug)]
struct PendingPage {
    spec: PageSpec,
    body: PageBody,
}

pub struct LopdfWriter {
    document: Document,
    source: Option<Document>,
    pages: Vec<PendingPage>,
    finalized: bool,
}

impl Default for LopdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl LopdfWriter {
    /// A writer without a source document; pages can only be drawn.
    pub fn new() -> Self {
        Self {
            document: Document::with_version("1.5"),
            source: None,
            pages: Vec::new(),
            finalized: false,
        }
    }

    /// A writer that can copy pages out of `source`.
    pub fn with_source(source: &[u8]) -> RedactorResult<Self> {
        let source = Document::load_mem(source)?;
        Ok(Self {
            source: Some(source),
            ..Self::new()
        })
    }

    fn page_mut(&mut self, page: PageHandle) -> RedactorResult<&mut PendingPage> {
        if self.finalized {
            return Err(writer_error("document already finalized"));
        }
        self.pages
            .get_mut(page.0)
            .ok_or_else(|| RedactorError::invalid_input("page", format!("unknown page handle {}", page.0)))
    }

    fn build_page(&mut self, pages_id: ObjectId, page: PendingPage) -> RedactorResult<ObjectId> {
        let PageSize { width, height } = page.spec.size;
        let default_box = || {
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(width),
                Object::Real(height),
            ])
        };

        let mut dict = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        };

        match page.body {
            PageBody::Empty => {
                dict.set("MediaBox", default_box());
                dict.set("Resources", Dictionary::new());
            }
            PageBody::Images(images) => {
                let mut xobjects = Dictionary::new();
                let mut operations = Vec::new();
                for (i, image_id) in images.iter().enumerate() {
                    let name = format!("Im{}", i);
                    xobjects.set(name.as_bytes().to_vec(), *image_id);
                    operations.push(Operation::new("q", vec![]));
                    operations.push(Operation::new(
                        "cm",
                        vec![
                            Object::Real(width),
                            Object::Integer(0),
                            Object::Integer(0),
                            Object::Real(height),
                            Object::Integer(0),
                            Object::Integer(0),
                        ],
                    ));
                    operations.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
                    operations.push(Operation::new("Q", vec![]));
                }
                let content = Content { operations }.encode()?;
                let content_id = self
                    .document
                    .add_object(Stream::new(Dictionary::new(), content));
                dict.set("MediaBox", default_box());
                dict.set("Resources", dictionary! { "XObject" => xobjects });
                dict.set("Contents", content_id);
            }
            PageBody::Copied {
                contents,
                resources,
                media_box,
                crop_box,
                rotate,
            } => {
                dict.set("MediaBox", media_box.unwrap_or_else(default_box));
                if let Some(crop_box) = crop_box {
                    dict.set("CropBox", crop_box);
                }
                dict.set("Resources", resources.unwrap_or_else(|| Dictionary::new().into()));
                if let Some(contents) = contents {
                    dict.set("Contents", contents);
                }
                if rotate != 0 {
                    dict.set("Rotate", rotate);
                }
            }
        }
        Ok(self.document.add_object(dict))
    }
}

impl DocumentWriter for LopdfWriter {
    fn begin_page(&mut self, spec: PageSpec) -> RedactorResult<PageHandle> {
        if self.finalized {
            return Err(writer_error("document already finalized"));
        }
        self.pages.push(PendingPage {
            spec,
            body: PageBody::Empty,
        });
        Ok(PageHandle(self.pages.len() - 1))
    }

    fn draw_image(&mut self, page: PageHandle, image: &RgbImage) -> RedactorResult<()> {
        if matches!(self.page_mut(page)?.body, PageBody::Copied { .. }) {
            return Err(writer_error("cannot draw over copied page content"));
        }
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width() as i64,
                "Height" => image.height() as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => Object::Integer(8),
            },
            image.as_raw().clone(),
        );
        let image_id = self.document.add_object(stream);

        let target = self.page_mut(page)?;
        match &mut target.body {
            PageBody::Images(images) => images.push(image_id),
            body => *body = PageBody::Images(vec![image_id]),
        }
        Ok(())
    }

    fn copy_page_content(&mut self, page: PageHandle, source_page: usize) -> RedactorResult<()> {
        let spec = self.page_mut(page)?.spec;
        if !matches!(self.page_mut(page)?.body, PageBody::Empty) {
            return Err(writer_error("page already has content"));
        }
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| writer_error("no source document to copy from"))?;
        let page_id = source
            .get_pages()
            .get(&(source_page as u32 + 1))
            .copied()
            .ok_or_else(|| {
                RedactorError::invalid_input(
                    "source_page",
                    format!("source has no page {}", source_page),
                )
            })?;

        let mut importer = Importer::new(source, self.document.max_id);
        let page_dict = source.get_dictionary(page_id)?;
        let contents = match page_dict.get(b"Contents") {
            Ok(obj) => Some(importer.import(obj)?),
            Err(_) => None,
        };
        let mut import_inherited = |key: &[u8]| -> RedactorResult<Option<Object>> {
            match inherited(source, page_id, key) {
                Some(obj) => Ok(Some(importer.import(obj)?)),
                None => Ok(None),
            }
        };
        let resources = import_inherited(b"Resources")?;
        let media_box = import_inherited(b"MediaBox")?;
        let crop_box = import_inherited(b"CropBox")?;
        let source_rotate = match inherited(source, page_id, b"Rotate") {
            Some(Object::Integer(degrees)) => *degrees,
            _ => 0,
        };

        // Nothing touches the output document until every object imported.
        let (max_id, objects) = importer.finish();
        self.document.max_id = max_id;
        self.document.objects.extend(objects);

        let rotate = (source_rotate + i64::from(spec.rotation.degrees())).rem_euclid(360);
        self.page_mut(page)?.body = PageBody::Copied {
            contents,
            resources,
            media_box,
            crop_box,
            rotate,
        };
        Ok(())
    }

    fn finalize(&mut self) -> RedactorResult<Vec<u8>> {
        if self.finalized {
            return Err(writer_error("document already finalized"));
        }
        self.finalized = true;

        let pages_id = self.document.new_object_id();
        let pending = std::mem::take(&mut self.pages);
        let count = pending.len();
        let mut kids = Vec::with_capacity(count);
        for page in pending {
            kids.push(Object::Reference(self.build_page(pages_id, page)?));
        }

        self.document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count as i64,
            }),
        );
        let catalog_id = self.document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        self.document.trailer.set("Root", catalog_id);
        self.document.compress();

        let mut bytes = Vec::new();
        self.document
            .save_to(&mut bytes)
            .map_err(|e| RedactorError::Writer {
                message: "failed to serialize document".to_string(),
                source: Some(Box::new(e)),
            })?;
        log::debug!("wrote {} page(s), {} bytes", count, bytes.len());
        Ok(bytes)
    }
}

fn writer_error(message: &str) -> RedactorError {
    RedactorError::Writer {
        message: message.to_string(),
        source: None,
    }
}

/// Looks a page attribute up, following `/Parent` for inheritable keys.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..64 {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Deep copy of objects from a source document under fresh ids.
///
/// `/Parent` links are dropped so the source page tree is never pulled in.
struct Importer<'a> {
    source: &'a Document,
    max_id: u32,
    ids: BTreeMap<ObjectId, ObjectId>,
    objects: BTreeMap<ObjectId, Object>,
}

impl<'a> Importer<'a> {
    fn new(source: &'a Document, max_id: u32) -> Self {
        Self {
            source,
            max_id,
            ids: BTreeMap::new(),
            objects: BTreeMap::new(),
        }
    }

    fn import(&mut self, object: &Object) -> RedactorResult<Object> {
        Ok(match object {
            Object::Reference(id) => Object::Reference(self.import_reference(*id)?),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.import(item))
                    .collect::<RedactorResult<Vec<_>>>()?,
            ),
            Object::Dictionary(dict) => Object::Dictionary(self.import_dictionary(dict)?),
            Object::Stream(stream) => {
                let mut copy = stream.clone();
                copy.dict = self.import_dictionary(&stream.dict)?;
                Object::Stream(copy)
            }
            other => other.clone(),
        })
    }

    fn import_dictionary(&mut self, dict: &Dictionary) -> RedactorResult<Dictionary> {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.import(value)?);
        }
        Ok(copy)
    }

    fn import_reference(&mut self, id: ObjectId) -> RedactorResult<ObjectId> {
        if let Some(mapped) = self.ids.get(&id) {
            return Ok(*mapped);
        }
        self.max_id += 1;
        let new_id = (self.max_id, 0);
        self.ids.insert(id, new_id);
        let object = self.source.get_object(id)?;
        let copied = self.import(object)?;
        self.objects.insert(new_id, copied);
        Ok(new_id)
    }

    fn finish(self) -> (u32, BTreeMap<ObjectId, Object>) {
        (self.max_id, self.objects)
    }
}
