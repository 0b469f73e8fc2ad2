// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Test fixtures shared with downstream crates through the `test-fixtures`
// feature. Not for production use: builders panic on failure.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};

/// Build a PDF whose pages each carry one image XObject (`Some((w, h))`,
/// Flate-free DeviceRGB samples) or no image at all (`None`).
pub fn sample_pdf(pages: &[Option<(u32, u32)>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();

    for layout in pages {
        let mut resources = Dictionary::new();
        let mut ops = Vec::new();
        if let Some((w, h)) = layout {
            let mut image_dict = Dictionary::new();
            image_dict.set("Type", Object::Name(b"XObject".to_vec()));
            image_dict.set("Subtype", Object::Name(b"Image".to_vec()));
            image_dict.set("Width", Object::Integer(i64::from(*w)));
            image_dict.set("Height", Object::Integer(i64::from(*h)));
            image_dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
            image_dict.set("BitsPerComponent", Object::Integer(8));
            let samples = vec![128u8; (*w as usize) * (*h as usize) * 3];
            let image_id = doc.add_object(Stream::new(image_dict, samples));

            let mut xobjects = Dictionary::new();
            xobjects.set("Im0", Object::Reference(image_id));
            resources.set("XObject", Object::Dictionary(xobjects));
            ops = vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Integer(i64::from(*w)),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(i64::from(*h)),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ];
        }
        let content = Content { operations: ops };
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            content.encode().expect("encode content"),
        ));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set("Contents", Object::Reference(content_id));
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
        kids.push(Object::Reference(doc.add_object(Object::Dictionary(page))));
    }

    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set("Count", Object::Integer(kids.len() as i64));
    pages_dict.set("Kids", Object::Array(kids));
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(Object::Dictionary(catalog));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save sample pdf");
    bytes
}
