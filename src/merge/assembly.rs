//! Construction of one output document from source excerpts.
//!
//! [`TargetBuilder`] wraps the lopdf object-graph surgery needed to build a
//! target: importing source object graphs into the output's id space,
//! appending pages in exactly the requested order (repeats included),
//! copying Info-dictionary metadata from the first source, and tracking the
//! minimum PDF version the output must declare.

use std::collections::{BTreeMap, HashMap};

use lopdf::{dictionary, Dictionary, Document as Pdf, Object, ObjectId};

use crate::document::DocumentId;
use crate::error::{Error, Result};

/// Version a freshly created output document starts at. Sources can only
/// raise it, never lower it.
const BASE_VERSION: &str = "1.4";

/// Builder for one output PDF.
pub struct TargetBuilder {
    doc: Pdf,
    pages_id: ObjectId,
    /// Page-number-to-object map of every source imported so far, keyed by
    /// source document id. Populated once per source per target.
    imported: HashMap<DocumentId, BTreeMap<u32, ObjectId>>,
    min_version: String,
}

impl TargetBuilder {
    /// Start an empty output document: a catalog and a page tree with no
    /// pages.
    pub fn new() -> Self {
        let mut doc = Pdf::with_version(BASE_VERSION);
        let pages_id = doc.new_object_id();
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            dictionary! {
                "Type" => "Pages",
                "Kids" => Object::Array(Vec::new()),
                "Count" => 0,
            }
            .into(),
        );
        doc.trailer.set("Root", Object::Reference(catalog_id));

        Self {
            doc,
            pages_id,
            imported: HashMap::new(),
            min_version: BASE_VERSION.to_string(),
        }
    }

    /// Raise the output's minimum version to `version` if it is newer.
    pub fn observe_version(&mut self, version: &str) {
        if version_rank(version) > version_rank(&self.min_version) {
            self.min_version = version.to_string();
        }
    }

    /// The minimum version the output will be persisted at.
    pub fn min_version(&self) -> &str {
        &self.min_version
    }

    /// Import a source document's object graph into the output.
    ///
    /// Objects are renumbered past the output's current id space and copied
    /// wholesale; which of them survive is decided by pruning in
    /// [`finish`](Self::finish). Importing the same source twice within one
    /// target is a no-op, so repeated page appends share one stored copy.
    pub fn import_source(&mut self, id: DocumentId, source: &Pdf) {
        if self.imported.contains_key(&id) {
            return;
        }

        let mut imported = source.clone();
        imported.renumber_objects_with(self.doc.max_id + 1);
        self.doc.max_id = imported.max_id;
        let page_map = imported.get_pages();
        self.doc.objects.extend(imported.objects);
        self.imported.insert(id, page_map);
    }

    /// Number of pages the imported source `id` has, if imported.
    pub fn imported_page_count(&self, id: DocumentId) -> Option<usize> {
        self.imported.get(&id).map(BTreeMap::len)
    }

    /// Append one page of an imported source to the output page tree.
    ///
    /// Pages are re-parented onto the output's page tree so that the
    /// source's own tree (and every page that was not selected) becomes
    /// unreachable and is dropped during compaction.
    pub fn append_page(&mut self, source: DocumentId, page: u32) -> Result<()> {
        let page_id = self
            .imported
            .get(&source)
            .and_then(|pages| pages.get(&page))
            .copied()
            .ok_or_else(|| {
                Error::assembly(format!("page {page} of document {source} was not imported"))
            })?;

        if let Ok(Object::Dictionary(page_dict)) = self.doc.get_object_mut(page_id) {
            page_dict.set("Parent", Object::Reference(self.pages_id));
        }

        let pages = self
            .doc
            .get_object_mut(self.pages_id)
            .map_err(|e| Error::assembly(format!("failed to get page tree: {e}")))?;
        let Object::Dictionary(pages_dict) = pages else {
            return Err(Error::assembly("page tree node is not a dictionary"));
        };

        let kids = pages_dict
            .get_mut(b"Kids")
            .map_err(|_| Error::assembly("page tree node missing Kids array"))?;
        let Object::Array(kids) = kids else {
            return Err(Error::assembly("Kids is not an array"));
        };
        kids.push(Object::Reference(page_id));

        let count = pages_dict
            .get(b"Count")
            .and_then(|c| c.as_i64())
            .unwrap_or(0);
        pages_dict.set("Count", Object::Integer(count + 1));

        Ok(())
    }

    /// Copy every Info-dictionary entry of `source` into the output.
    ///
    /// Each key is copied best-effort: values that are not self-contained
    /// (references, streams, or containers holding either) cannot be
    /// transplanted without dragging their object graph along, so they are
    /// skipped with a warning. A skipped key never fails the target.
    pub fn copy_info_from(&mut self, source: &Pdf) {
        let Some(source_info) = info_dictionary(source) else {
            return;
        };
        let entries: Vec<(Vec<u8>, Object)> = source_info
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        for (key, value) in entries {
            if is_self_contained(&value) {
                self.set_info_entry(key, value);
            } else {
                tracing::warn!(
                    "could not copy metadata key {} while merging documents",
                    String::from_utf8_lossy(&key)
                );
            }
        }
    }

    fn set_info_entry(&mut self, key: Vec<u8>, value: Object) {
        // get or create the output's Info dictionary
        let info_id = match self.doc.trailer.get(b"Info").and_then(Object::as_reference) {
            Ok(id) => id,
            Err(_) => {
                let id = self.doc.add_object(Dictionary::new());
                self.doc.trailer.set("Info", Object::Reference(id));
                id
            }
        };

        if let Ok(Object::Dictionary(info)) = self.doc.get_object_mut(info_id) {
            info.set(key, value);
        }
    }

    /// Compact the output and hand it over for persistence.
    ///
    /// Pruning removes everything unreachable from the catalog — imported
    /// source page trees, unselected pages and their resources — then the
    /// remaining objects are compressed, renumbered densely, and stamped
    /// with the accumulated minimum version.
    pub fn finish(mut self) -> Pdf {
        self.doc.prune_objects();
        self.doc.compress();
        self.doc.renumber_objects();
        self.doc.version = self.min_version;
        self.doc
    }
}

impl Default for TargetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a document's Info dictionary whether it is stored inline in the
/// trailer or behind a reference.
fn info_dictionary(doc: &Pdf) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Whether an object can be moved between documents without carrying any
/// referenced objects along.
fn is_self_contained(obj: &Object) -> bool {
    match obj {
        Object::Reference(_) | Object::Stream(_) => false,
        Object::Array(items) => items.iter().all(is_self_contained),
        Object::Dictionary(dict) => dict.iter().all(|(_, value)| is_self_contained(value)),
        _ => true,
    }
}

/// Order PDF versions as `(major, minor)` pairs. Unparseable versions rank
/// lowest so a corrupt header can never raise (or hold down) the output
/// version.
fn version_rank(version: &str) -> (u16, u16) {
    let mut parts = version.splitn(2, '.');
    let major = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    (major, minor)
}
