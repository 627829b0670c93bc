//! Immutable section snapshots, the comparison unit of section-level diffing
use crate::types::{Key, Size};
use crate::view::ItemDelegate;
use std::fmt;
use std::rc::Rc;

/// A cell-level declaration. The core only reads its identity, the renderer
/// it needs registered, and its size.
pub trait ItemDescriptor {
    fn key(&self) -> &Key;

    /// Identifier the view layer registers and dequeues the cell renderer by.
    fn reuse_identifier(&self) -> &str;

    fn size(&self, container: Size) -> Size;

    /// Optional per-item event capability.
    fn delegate(&self) -> Option<&dyn ItemDelegate> {
        None
    }
}

/// Header or footer declaration.
pub trait SupplementaryDescriptor {
    fn key(&self) -> &Key;
    fn reuse_identifier(&self) -> &str;
    fn size(&self, container: Size) -> Size;
}

/// One section as declared at a point in time.
///
/// Equality is structural: section key, header key, footer key and the item
/// keys in order. Descriptor contents are never compared, so an item whose
/// content changed under the same key compares equal.
#[derive(Clone)]
pub struct SectionSnapshot {
    key: Key,
    header: Option<Rc<dyn SupplementaryDescriptor>>,
    items: Vec<Rc<dyn ItemDescriptor>>,
    footer: Option<Rc<dyn SupplementaryDescriptor>>,
}

impl SectionSnapshot {
    pub fn new(key: impl Into<Key>) -> Self {
        SectionSnapshot {
            key: key.into(),
            header: None,
            items: Vec::new(),
            footer: None,
        }
    }

    pub fn with_header(mut self, header: Rc<dyn SupplementaryDescriptor>) -> Self {
        self.header = Some(header);
        self
    }

    pub fn with_footer(mut self, footer: Rc<dyn SupplementaryDescriptor>) -> Self {
        self.footer = Some(footer);
        self
    }

    pub fn with_item(mut self, item: Rc<dyn ItemDescriptor>) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_items<I>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = Rc<dyn ItemDescriptor>>,
    {
        self.items.extend(items);
        self
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn header(&self) -> Option<&Rc<dyn SupplementaryDescriptor>> {
        self.header.as_ref()
    }

    pub fn footer(&self) -> Option<&Rc<dyn SupplementaryDescriptor>> {
        self.footer.as_ref()
    }

    pub fn items(&self) -> &[Rc<dyn ItemDescriptor>] {
        &self.items
    }

    pub fn item(&self, index: usize) -> Option<&Rc<dyn ItemDescriptor>> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn header_key(&self) -> Option<&Key> {
        self.header.as_ref().map(|h| h.key())
    }

    pub fn footer_key(&self) -> Option<&Key> {
        self.footer.as_ref().map(|f| f.key())
    }

    pub fn item_keys(&self) -> Vec<&Key> {
        self.items.iter().map(|item| item.key()).collect()
    }

    /// True when header or footer identity differs from `other`.
    pub fn supplementaries_differ(&self, other: &SectionSnapshot) -> bool {
        self.header_key() != other.header_key() || self.footer_key() != other.footer_key()
    }
}

impl PartialEq for SectionSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && !self.supplementaries_differ(other)
            && self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(other.items.iter())
                .all(|(a, b)| a.key() == b.key())
    }
}

impl fmt::Debug for SectionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectionSnapshot")
            .field("key", &self.key)
            .field("header", &self.header_key())
            .field("items", &self.item_keys())
            .field("footer", &self.footer_key())
            .finish()
    }
}
