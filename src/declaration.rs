//! Declaration trees and their flattening into section snapshots
use crate::snapshot::SectionSnapshot;
use crate::types::next_id;
use indexmap::IndexMap;
use log::trace;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Receives change notifications from reactive sources.
pub trait ChangeObserver {
    fn collection_changed(&self);
}

/// A collection of declaration nodes that can change over time.
///
/// Observers are held weakly and keyed by a token, so subscribing twice with
/// the same token replaces the earlier registration.
pub trait ReactiveSource {
    /// Stable identity of this source for the lifetime of the process.
    fn source_id(&self) -> u64;

    /// The children currently held, in order.
    fn nodes(&self) -> Vec<DeclarationNode>;

    fn subscribe(&self, token: u64, observer: Weak<dyn ChangeObserver>);

    fn unsubscribe(&self, token: u64);
}

#[derive(Clone)]
pub enum DeclarationNode {
    Leaf(SectionSnapshot),
    Reactive(Rc<dyn ReactiveSource>),
    Group(Vec<DeclarationNode>),
}

impl DeclarationNode {
    pub fn leaf(section: SectionSnapshot) -> Self {
        DeclarationNode::Leaf(section)
    }

    pub fn group(children: impl IntoIterator<Item = DeclarationNode>) -> Self {
        DeclarationNode::Group(children.into_iter().collect())
    }

    pub fn reactive<S: ReactiveSource + 'static>(source: &Rc<S>) -> Self {
        DeclarationNode::Reactive(source.clone())
    }
}

impl From<SectionSnapshot> for DeclarationNode {
    fn from(section: SectionSnapshot) -> Self {
        DeclarationNode::Leaf(section)
    }
}

impl fmt::Debug for DeclarationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclarationNode::Leaf(section) => f.debug_tuple("Leaf").field(section).finish(),
            DeclarationNode::Reactive(source) => f
                .debug_tuple("Reactive")
                .field(&source.source_id())
                .finish(),
            DeclarationNode::Group(children) => f.debug_tuple("Group").field(children).finish(),
        }
    }
}

/// Flattens `node` depth-first into the sections it currently declares.
/// Sections without items are dropped.
pub fn flatten(node: &DeclarationNode) -> Vec<SectionSnapshot> {
    flatten_with(node, &mut |_| {})
}

/// Like [`flatten`], reporting every reactive source visited.
pub fn flatten_with(
    node: &DeclarationNode,
    on_reactive: &mut dyn FnMut(&Rc<dyn ReactiveSource>),
) -> Vec<SectionSnapshot> {
    let mut sections = Vec::new();
    collect(node, on_reactive, &mut sections);

    let declared = sections.len();
    sections.retain(|section| !section.is_empty());
    if sections.len() != declared {
        trace!("flatten: elided {} empty section(s)", declared - sections.len());
    }
    sections
}

fn collect(
    node: &DeclarationNode,
    on_reactive: &mut dyn FnMut(&Rc<dyn ReactiveSource>),
    out: &mut Vec<SectionSnapshot>,
) {
    match node {
        DeclarationNode::Leaf(section) => out.push(section.clone()),
        DeclarationNode::Group(children) => {
            for child in children {
                collect(child, on_reactive, out);
            }
        }
        DeclarationNode::Reactive(source) => {
            on_reactive(source);
            for child in source.nodes() {
                collect(&child, on_reactive, out);
            }
        }
    }
}

/// Ordered reactive list of declaration nodes. Every mutation notifies the
/// live observers once, after the list itself is no longer borrowed.
pub struct ReactiveList {
    id: u64,
    nodes: RefCell<Vec<DeclarationNode>>,
    observers: RefCell<IndexMap<u64, Weak<dyn ChangeObserver>>>,
}

impl ReactiveList {
    pub fn new(nodes: impl IntoIterator<Item = DeclarationNode>) -> Rc<Self> {
        Rc::new(ReactiveList {
            id: next_id(),
            nodes: RefCell::new(nodes.into_iter().collect()),
            observers: RefCell::new(IndexMap::new()),
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    pub fn set(&self, nodes: impl IntoIterator<Item = DeclarationNode>) {
        *self.nodes.borrow_mut() = nodes.into_iter().collect();
        self.notify();
    }

    pub fn push(&self, node: impl Into<DeclarationNode>) {
        self.nodes.borrow_mut().push(node.into());
        self.notify();
    }

    /// Panics if `index > len`, like `Vec::insert`.
    pub fn insert(&self, index: usize, node: impl Into<DeclarationNode>) {
        self.nodes.borrow_mut().insert(index, node.into());
        self.notify();
    }

    pub fn remove(&self, index: usize) -> Option<DeclarationNode> {
        let removed = {
            let mut nodes = self.nodes.borrow_mut();
            (index < nodes.len()).then(|| nodes.remove(index))
        };
        if removed.is_some() {
            self.notify();
        }
        removed
    }

    /// Arbitrary in-place edit, followed by a single notification.
    pub fn update<R>(&self, edit: impl FnOnce(&mut Vec<DeclarationNode>) -> R) -> R {
        let result = {
            let mut nodes = self.nodes.borrow_mut();
            edit(&mut *nodes)
        };
        self.notify();
        result
    }

    /// Number of observers still alive.
    pub fn observer_count(&self) -> usize {
        self.observers
            .borrow()
            .values()
            .filter(|observer| observer.strong_count() > 0)
            .count()
    }

    fn notify(&self) {
        let live: Vec<Rc<dyn ChangeObserver>> = {
            let mut observers = self.observers.borrow_mut();
            observers.retain(|_, observer| observer.strong_count() > 0);
            observers.values().filter_map(Weak::upgrade).collect()
        };
        trace!("reactive list {}: notifying {} observer(s)", self.id, live.len());
        for observer in live {
            observer.collection_changed();
        }
    }
}

impl ReactiveSource for ReactiveList {
    fn source_id(&self) -> u64 {
        self.id
    }

    fn nodes(&self) -> Vec<DeclarationNode> {
        self.nodes.borrow().clone()
    }

    fn subscribe(&self, token: u64, observer: Weak<dyn ChangeObserver>) {
        self.observers.borrow_mut().insert(token, observer);
    }

    fn unsubscribe(&self, token: u64) {
        self.observers.borrow_mut().shift_remove(&token);
    }
}
