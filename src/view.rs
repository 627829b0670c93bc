//! Contract between the reconciler and the external grid view.
//!
//! The view layer owns cells, layout and gestures. The reconciler drives it
//! through [`ViewCollaborator`] and receives its interaction events back
//! through [`crate::Coordinator::dispatch_event`].
use crate::snapshot::{ItemDescriptor, SectionSnapshot};
use crate::types::{EditScript, IndexPath, Key};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RendererKind {
    Header,
    Item,
    Footer,
}

/// Called exactly once by the view after a batch has landed.
pub type CompletionHandler = Box<dyn FnOnce()>;

pub trait ViewCollaborator {
    /// Registration must be idempotent on the view side.
    fn register_renderer(&self, kind: RendererKind, reuse_identifier: &str);

    /// Applies every edit in `update` as one atomic visual change. The view may
    /// complete synchronously or later, but must call `on_complete` exactly
    /// once, after its index space reflects `update.snapshot`.
    ///
    /// Until `on_complete` runs, the coordinator's query methods still answer
    /// from the previously applied sections. Counts and items needed while
    /// the batch is being applied must come from `update.snapshot`.
    fn apply_batch(&self, update: BatchUpdate, on_complete: CompletionHandler);

    /// Non-animated full replace. Used when nothing has been applied yet.
    fn full_reload(&self, sections: &[SectionSnapshot]);
}

/// Item-level edits for one section present before and after a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionUpdate {
    pub key: Key,
    pub old_index: usize,
    pub new_index: usize,
    pub items: EditScript,
    pub supplementaries_changed: bool,
}

/// Everything a view needs to animate from the applied sections to `snapshot`.
pub struct BatchUpdate {
    pub sections: EditScript,
    pub items: Vec<SectionUpdate>,
    pub snapshot: Vec<SectionSnapshot>,
    pub animated: bool,
}

impl BatchUpdate {
    /// No structural change at either level.
    pub fn is_empty(&self) -> bool {
        self.sections.removals.is_empty()
            && self.sections.inserts.is_empty()
            && self.sections.moves.is_empty()
            && self
                .items
                .iter()
                .all(|u| u.items.is_empty() && !u.supplementaries_changed)
    }

    /// Compact JSON description for logs.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "sections": self.sections,
            "items": self.items,
            "section_count": self.snapshot.len(),
            "animated": self.animated,
        })
    }
}

impl fmt::Debug for BatchUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BatchUpdate({})", self.summary())
    }
}

/// Interaction lifecycle notifications forwarded from the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemEvent {
    Selected,
    Deselected,
    Highlighted,
    Unhighlighted,
    WillDisplay,
    DidEndDisplaying,
}

/// Optional capability an item can expose through
/// [`ItemDescriptor::delegate`]. Every method is permissive by default.
pub trait ItemDelegate {
    fn should_select(&self, _path: IndexPath) -> bool {
        true
    }

    fn should_highlight(&self, _path: IndexPath) -> bool {
        true
    }

    fn on_event(&self, _event: ItemEvent, _path: IndexPath) {}
}

type EventCallback = Box<dyn Fn(ItemEvent, IndexPath, &dyn ItemDescriptor)>;
type Predicate = Box<dyn Fn(IndexPath, &dyn ItemDescriptor) -> bool>;

/// Caller supplied handlers. Absent handlers are no-ops, absent predicates
/// answer `true`.
#[derive(Default)]
pub struct EventHandlers {
    on_event: Option<EventCallback>,
    should_select: Option<Predicate>,
    should_highlight: Option<Predicate>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_event(
        mut self,
        handler: impl Fn(ItemEvent, IndexPath, &dyn ItemDescriptor) + 'static,
    ) -> Self {
        self.on_event = Some(Box::new(handler));
        self
    }

    pub fn should_select(
        mut self,
        predicate: impl Fn(IndexPath, &dyn ItemDescriptor) -> bool + 'static,
    ) -> Self {
        self.should_select = Some(Box::new(predicate));
        self
    }

    pub fn should_highlight(
        mut self,
        predicate: impl Fn(IndexPath, &dyn ItemDescriptor) -> bool + 'static,
    ) -> Self {
        self.should_highlight = Some(Box::new(predicate));
        self
    }

    pub(crate) fn emit(&self, event: ItemEvent, path: IndexPath, item: &dyn ItemDescriptor) {
        if let Some(handler) = &self.on_event {
            handler(event, path, item);
        }
    }

    pub(crate) fn allows_select(&self, path: IndexPath, item: &dyn ItemDescriptor) -> bool {
        self.should_select
            .as_ref()
            .is_none_or(|predicate| predicate(path, item))
    }

    pub(crate) fn allows_highlight(&self, path: IndexPath, item: &dyn ItemDescriptor) -> bool {
        self.should_highlight
            .as_ref()
            .is_none_or(|predicate| predicate(path, item))
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_event", &self.on_event.is_some())
            .field("should_select", &self.should_select.is_some())
            .field("should_highlight", &self.should_highlight.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn summary_is_valid_json() {
        let update = BatchUpdate {
            sections: EditScript {
                inserts: BTreeSet::from([2]),
                ..EditScript::default()
            },
            items: vec![SectionUpdate {
                key: Key::from("s"),
                old_index: 0,
                new_index: 0,
                items: EditScript::default(),
                supplementaries_changed: true,
            }],
            snapshot: Vec::new(),
            animated: true,
        };
        let summary = update.summary();
        assert_eq!(summary["sections"]["inserts"], serde_json::json!([2]));
        assert_eq!(summary["items"][0]["key"], serde_json::json!("s"));
        assert!(!update.is_empty());
    }

    #[test]
    fn empty_update_detection() {
        let update = BatchUpdate {
            sections: EditScript::default(),
            items: vec![SectionUpdate {
                key: Key::from(1i64),
                old_index: 0,
                new_index: 0,
                items: EditScript::default(),
                supplementaries_changed: false,
            }],
            snapshot: Vec::new(),
            animated: false,
        };
        assert!(update.is_empty());
    }

    #[test]
    fn handlers_default_to_permissive() {
        struct Dummy(Key);
        impl ItemDescriptor for Dummy {
            fn key(&self) -> &Key {
                &self.0
            }
            fn reuse_identifier(&self) -> &str {
                "dummy"
            }
            fn size(&self, _container: crate::types::Size) -> crate::types::Size {
                crate::types::Size::ZERO
            }
        }

        let item = Dummy(Key::from("d"));
        let path = IndexPath::new(0, 0);
        let handlers = EventHandlers::new();
        assert!(handlers.allows_select(path, &item));
        assert!(handlers.allows_highlight(path, &item));

        let picky = EventHandlers::new().should_select(|path, _| path.item > 0);
        assert!(!picky.allows_select(path, &item));
        assert!(picky.allows_select(IndexPath::new(0, 1), &item));
    }
}
