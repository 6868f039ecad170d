use crate::error::DocumentError;
use lopdf::{Document, Object, ObjectId, dictionary};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Limit when walking up the page tree; deeper chains are treated as a loop.
const MAX_TREE_DEPTH: usize = 64;

/// Builds a new document holding the pages of `source`, in page order.
///
/// Every page gets the attributes it used to inherit, so that it no longer
/// depends on the old page tree, and is attached to a fresh `Pages` node
/// under a fresh catalog. The document information dictionary is carried
/// over; the old catalog and page tree are dropped along with everything
/// else that is no longer referenced.
pub(crate) fn copy_pages(mut source: Document) -> Result<Document, DocumentError> {
    let page_ids: Vec<ObjectId> = source.get_pages().into_values().collect();
    if page_ids.is_empty() {
        return Err(DocumentError::NoPages);
    }

    let inherited: Vec<_> = page_ids
        .iter()
        .map(|&page_id| inherited_attributes(&source, page_id))
        .collect();

    let mut output = Document::with_version(source.version.clone());
    output.objects = std::mem::take(&mut source.objects);
    output.max_id = source.max_id;

    let pages_id = output.new_object_id();
    for (&page_id, attributes) in page_ids.iter().zip(inherited) {
        let page = output
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|_| DocumentError::InvalidPage(page_id.0, page_id.1))?;
        for (key, value) in attributes {
            if !page.has(key) {
                page.set(key, value);
            }
        }
        page.set("Parent", pages_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|&page_id| Object::Reference(page_id)).collect();
    output.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
        }),
    );
    let catalog_id = output.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    output.trailer.set("Root", catalog_id);
    if let Ok(info) = source.trailer.get(b"Info") {
        output.trailer.set("Info", info.clone());
    }

    output.prune_objects();
    Ok(output)
}

/// Inheritable attributes visible on a page, nearest definition first.
fn inherited_attributes(document: &Document, page_id: ObjectId) -> Vec<(&'static [u8], Object)> {
    let mut found: Vec<(&'static [u8], Object)> = Vec::new();
    let mut node = document.get_dictionary(page_id).ok();
    let mut depth = 0;

    while let Some(dict) = node {
        for key in INHERITABLE {
            if found.iter().all(|(name, _)| *name != key) {
                if let Ok(value) = dict.get(key) {
                    found.push((key, value.clone()));
                }
            }
        }

        depth += 1;
        if depth > MAX_TREE_DEPTH {
            break;
        }
        node = dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|parent_id| document.get_dictionary(parent_id))
            .ok();
    }

    found
}
