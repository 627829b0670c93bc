//! Reconciliation coordinator: owns the applied sections and serializes
//! reconciliation passes so that at most one batch is in flight.
//!
//! Everything here runs on the single interactive context that owns the view.
//! The coordinator is built on `Rc` and is therefore `!Send`, which keeps that
//! requirement checked at compile time.
use crate::config::ReconcilerConfig;
use crate::declaration::{flatten_with, ChangeObserver, DeclarationNode, ReactiveSource};
use crate::diff_engine::{check_unique_keys, diff, diff_by};
use crate::errors::ReconcilerError;
use crate::snapshot::{ItemDescriptor, SectionSnapshot, SupplementaryDescriptor};
use crate::types::{next_id, IndexPath, Key, Size};
use crate::view::{
    BatchUpdate, EventHandlers, ItemEvent, RendererKind, SectionUpdate, ViewCollaborator,
};
use indexmap::{IndexMap, IndexSet};
use log::{debug, error, trace, warn};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Applying,
}

/// Drives a [`ViewCollaborator`] from a declaration tree.
///
/// Cloning yields another handle to the same coordinator. Reactive sources
/// only hold it weakly; once the last handle is dropped every subscription is
/// revoked.
#[derive(Clone)]
pub struct Coordinator {
    inner: Rc<CoordinatorInner>,
}

struct CoordinatorInner {
    token: u64,
    self_ref: Weak<CoordinatorInner>,
    config: ReconcilerConfig,
    view: Rc<dyn ViewCollaborator>,
    root: RefCell<DeclarationNode>,
    applied: RefCell<Vec<SectionSnapshot>>,
    phase: Cell<Phase>,
    pending: Cell<usize>,
    force_reload: Cell<bool>,
    subscriptions: RefCell<IndexMap<u64, Weak<dyn ReactiveSource>>>,
    registered: RefCell<IndexSet<(RendererKind, String)>>,
    handlers: RefCell<EventHandlers>,
}

impl Coordinator {
    /// Nothing is applied until the first [`Coordinator::request_reconcile`].
    pub fn new(
        root: DeclarationNode,
        view: Rc<dyn ViewCollaborator>,
        config: ReconcilerConfig,
    ) -> Self {
        let inner = Rc::new_cyclic(|self_ref| CoordinatorInner {
            token: next_id(),
            self_ref: self_ref.clone(),
            config,
            view,
            root: RefCell::new(root),
            applied: RefCell::new(Vec::new()),
            phase: Cell::new(Phase::Idle),
            pending: Cell::new(0),
            force_reload: Cell::new(false),
            subscriptions: RefCell::new(IndexMap::new()),
            registered: RefCell::new(IndexSet::new()),
            handlers: RefCell::new(EventHandlers::default()),
        });
        debug!("Coordinator {}: created", inner.token);
        Coordinator { inner }
    }

    /// Reconcile now if idle, otherwise coalesce into one trailing pass.
    pub fn request_reconcile(&self) {
        self.inner.request_reconcile();
    }

    /// Replaces the declaration tree and reconciles against it.
    pub fn set_root(&self, root: DeclarationNode) {
        *self.inner.root.borrow_mut() = root;
        self.inner.request_reconcile();
    }

    /// Content changes under a stable key are invisible to the structural
    /// diff. This schedules a full non-animated reload on the next pass.
    pub fn force_reload(&self) {
        self.inner.force_reload.set(true);
        self.inner.request_reconcile();
    }

    pub fn set_event_handlers(&self, handlers: EventHandlers) {
        *self.inner.handlers.borrow_mut() = handlers;
    }

    pub fn phase(&self) -> Phase {
        self.inner.phase.get()
    }

    pub fn pending_requests(&self) -> usize {
        self.inner.pending.get()
    }

    /// Sections as last applied to the view.
    pub fn applied_sections(&self) -> Vec<SectionSnapshot> {
        self.inner.applied.borrow().clone()
    }

    pub fn section_count(&self) -> usize {
        self.inner.applied.borrow().len()
    }

    pub fn item_count(&self, section: usize) -> usize {
        self.inner
            .applied
            .borrow()
            .get(section)
            .map_or(0, SectionSnapshot::len)
    }

    pub fn section_key(&self, section: usize) -> Option<Key> {
        self.inner
            .applied
            .borrow()
            .get(section)
            .map(|s| s.key().clone())
    }

    pub fn item_at(&self, path: IndexPath) -> Option<Rc<dyn ItemDescriptor>> {
        self.inner
            .applied
            .borrow()
            .get(path.section)
            .and_then(|s| s.item(path.item))
            .cloned()
    }

    pub fn header_at(&self, section: usize) -> Option<Rc<dyn SupplementaryDescriptor>> {
        self.inner
            .applied
            .borrow()
            .get(section)
            .and_then(|s| s.header())
            .cloned()
    }

    pub fn footer_at(&self, section: usize) -> Option<Rc<dyn SupplementaryDescriptor>> {
        self.inner
            .applied
            .borrow()
            .get(section)
            .and_then(|s| s.footer())
            .cloned()
    }

    /// Zero when the path is not applied.
    pub fn item_size(&self, path: IndexPath, container: Size) -> Size {
        self.item_at(path)
            .map_or(Size::ZERO, |item| item.size(container))
    }

    /// Zero when the section has no header.
    pub fn header_size(&self, section: usize, container: Size) -> Size {
        self.header_at(section)
            .map_or(Size::ZERO, |header| header.size(container))
    }

    /// Zero when the section has no footer.
    pub fn footer_size(&self, section: usize, container: Size) -> Size {
        self.footer_at(section)
            .map_or(Size::ZERO, |footer| footer.size(container))
    }

    /// Forwards a view event to the caller's handler, then to the item's own
    /// delegate, in that order.
    pub fn dispatch_event(&self, event: ItemEvent, path: IndexPath) -> Result<(), ReconcilerError> {
        let item = self.lookup(path)?;
        trace!("Coordinator {}: {:?} at {:?}", self.inner.token, event, path);
        self.inner.handlers.borrow().emit(event, path, &*item);
        if let Some(delegate) = item.delegate() {
            delegate.on_event(event, path);
        }
        Ok(())
    }

    /// Both the caller's predicate and the item delegate must agree.
    pub fn should_select(&self, path: IndexPath) -> bool {
        match self.lookup(path) {
            Ok(item) => {
                self.inner.handlers.borrow().allows_select(path, &*item)
                    && item.delegate().is_none_or(|d| d.should_select(path))
            }
            Err(_) => false,
        }
    }

    pub fn should_highlight(&self, path: IndexPath) -> bool {
        match self.lookup(path) {
            Ok(item) => {
                self.inner.handlers.borrow().allows_highlight(path, &*item)
                    && item.delegate().is_none_or(|d| d.should_highlight(path))
            }
            Err(_) => false,
        }
    }

    fn lookup(&self, path: IndexPath) -> Result<Rc<dyn ItemDescriptor>, ReconcilerError> {
        self.item_at(path).ok_or_else(|| {
            warn!(
                "Coordinator {}: no applied item at [{}, {}]",
                self.inner.token, path.section, path.item
            );
            ReconcilerError::IndexPathOutOfBounds {
                section: path.section,
                item: path.item,
            }
        })
    }
}

impl CoordinatorInner {
    fn request_reconcile(&self) {
        if self.phase.get() == Phase::Applying {
            let pending = self.pending.get() + 1;
            self.pending.set(pending);
            debug!("Coordinator {}: batch in flight, {} request(s) pending", self.token, pending);
            return;
        }

        self.phase.set(Phase::Applying);
        let sections = self.flatten_root();
        self.validate_keys(&sections);
        self.register_renderers(&sections);

        let force = self.force_reload.replace(false);
        if force || self.applied.borrow().is_empty() {
            debug!(
                "Coordinator {}: full reload with {} section(s)",
                self.token,
                sections.len()
            );
            *self.applied.borrow_mut() = sections.clone();
            self.view.full_reload(&sections);
            self.finish_pass();
            return;
        }

        let update = {
            let applied = self.applied.borrow();
            plan_batch(&applied, sections.clone(), self.config.animated)
        };
        debug!("Coordinator {}: applying {:?}", self.token, update);

        let weak = self.self_ref.clone();
        self.view.apply_batch(
            update,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.complete_batch(sections);
                }
            }),
        );
    }

    fn complete_batch(&self, sections: Vec<SectionSnapshot>) {
        if self.phase.get() != Phase::Applying {
            error!("Coordinator {}: batch completed while idle; ignoring", self.token);
            return;
        }
        *self.applied.borrow_mut() = sections;
        self.finish_pass();
    }

    /// Back to idle; any requests that arrived meanwhile collapse into one
    /// pass over the live tree.
    fn finish_pass(&self) {
        self.phase.set(Phase::Idle);
        let pending = self.pending.replace(0);
        if pending > 0 {
            debug!(
                "Coordinator {}: replaying {} coalesced request(s) as one pass",
                self.token, pending
            );
            self.request_reconcile();
        }
    }

    fn flatten_root(&self) -> Vec<SectionSnapshot> {
        let mut seen: IndexMap<u64, Weak<dyn ReactiveSource>> = IndexMap::new();
        let sections = {
            let root = self.root.borrow();
            flatten_with(&root, &mut |source| {
                seen.insert(source.source_id(), Rc::downgrade(source));
            })
        };
        self.sync_subscriptions(seen);
        sections
    }

    /// Subscribes to every reactive source in the current tree and drops the
    /// ones that left it.
    fn sync_subscriptions(&self, seen: IndexMap<u64, Weak<dyn ReactiveSource>>) {
        let previous = std::mem::take(&mut *self.subscriptions.borrow_mut());
        for (id, source) in &previous {
            if !seen.contains_key(id) {
                if let Some(source) = source.upgrade() {
                    trace!("Coordinator {}: unsubscribing from source {}", self.token, id);
                    source.unsubscribe(self.token);
                }
            }
        }

        let observer: Weak<dyn ChangeObserver> = self.self_ref.clone();
        for source in seen.values().filter_map(Weak::upgrade) {
            source.subscribe(self.token, observer.clone());
        }
        *self.subscriptions.borrow_mut() = seen;
    }

    fn validate_keys(&self, sections: &[SectionSnapshot]) {
        let section_keys: Vec<&Key> = sections.iter().map(SectionSnapshot::key).collect();
        let mut problems = Vec::new();
        if let Err(err) = check_unique_keys(&section_keys, "sections") {
            problems.push(err);
        }
        for section in sections {
            let scope = format!("items of section {}", section.key());
            if let Err(err) = check_unique_keys(&section.item_keys(), &scope) {
                problems.push(err);
            }
        }

        for problem in &problems {
            error!("Coordinator {}: {}", self.token, problem);
        }
        debug_assert!(
            !self.config.assert_unique_keys || problems.is_empty(),
            "duplicate keys in declaration: {:?}",
            problems
        );
    }

    /// Idempotent: each `(kind, reuse identifier)` pair reaches the view once.
    fn register_renderers(&self, sections: &[SectionSnapshot]) {
        let mut wanted: Vec<(RendererKind, &str)> = Vec::new();
        for section in sections {
            if let Some(header) = section.header() {
                wanted.push((RendererKind::Header, header.reuse_identifier()));
            }
            for item in section.items() {
                wanted.push((RendererKind::Item, item.reuse_identifier()));
            }
            if let Some(footer) = section.footer() {
                wanted.push((RendererKind::Footer, footer.reuse_identifier()));
            }
        }

        for (kind, reuse_identifier) in wanted {
            let fresh = self
                .registered
                .borrow_mut()
                .insert((kind, reuse_identifier.to_string()));
            if fresh {
                trace!(
                    "Coordinator {}: registering {:?} renderer '{}'",
                    self.token, kind, reuse_identifier
                );
                self.view.register_renderer(kind, reuse_identifier);
            }
        }
    }
}

impl ChangeObserver for CoordinatorInner {
    fn collection_changed(&self) {
        self.request_reconcile();
    }
}

impl Drop for CoordinatorInner {
    fn drop(&mut self) {
        for source in self.subscriptions.get_mut().values().filter_map(Weak::upgrade) {
            source.unsubscribe(self.token);
        }
        debug!("Coordinator {}: dropped", self.token);
    }
}

/// Section-level script against `applied`, plus an item-level script for
/// every section the section diff marks as mutated.
fn plan_batch(applied: &[SectionSnapshot], target: Vec<SectionSnapshot>, animated: bool) -> BatchUpdate {
    let sections = diff_by(applied, &target, SectionSnapshot::key, |a, b| a == b);

    let position_in_target: HashMap<&Key, usize> = target
        .iter()
        .enumerate()
        .map(|(i, s)| (s.key(), i))
        .collect();

    let mut items = Vec::with_capacity(sections.mutations.len());
    for &old_index in &sections.mutations {
        let before = &applied[old_index];
        let Some(&new_index) = position_in_target.get(before.key()) else {
            continue;
        };
        let after = &target[new_index];
        items.push(SectionUpdate {
            key: before.key().clone(),
            old_index,
            new_index,
            items: diff(&before.item_keys(), &after.item_keys()),
            supplementaries_changed: before.supplementaries_differ(after),
        });
    }

    BatchUpdate {
        sections,
        items,
        snapshot: target,
        animated,
    }
}
