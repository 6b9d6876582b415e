//! Helpers for building small PDFs in tests

use std::io::Write;
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{Dictionary, Document, Object, Stream};

pub fn name(n: &str) -> Object {
    Object::Name(n.as_bytes().to_vec())
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn image_stream(width: i64, height: i64, entries: Vec<(&str, Object)>, content: Vec<u8>) -> Stream {
    let mut dict = Dictionary::new();
    dict.set("Type", name("XObject"));
    dict.set("Subtype", name("Image"));
    dict.set("Width", Object::Integer(width));
    dict.set("Height", Object::Integer(height));
    for (key, value) in entries {
        dict.set(key, value);
    }
    Stream::new(dict, content)
}

/// Build a document with one page per entry, each page referencing its
/// image streams from `/Resources /XObject`
pub fn build_pdf(pages: Vec<Vec<Stream>>) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for images in pages {
        let mut xobjects = Dictionary::new();
        for (i, stream) in images.into_iter().enumerate() {
            let id = doc.add_object(stream);
            xobjects.set(format!("Im{}", i), Object::Reference(id));
        }
        let mut resources = Dictionary::new();
        resources.set("XObject", Object::Dictionary(xobjects));

        let mut page = Dictionary::new();
        page.set("Type", name("Page"));
        page.set("Parent", Object::Reference(pages_id));
        page.set("Resources", Object::Dictionary(resources));
        page.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ]),
        );
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", name("Pages"));
    pages_dict.set("Count", Object::Integer(kids.len() as i64));
    pages_dict.set("Kids", Object::Array(kids));
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let mut catalog = Dictionary::new();
    catalog.set("Type", name("Catalog"));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    doc
}

pub fn save_pdf(mut doc: Document, path: &Path) {
    doc.save(path).unwrap();
}
