//! Declarative adapter for index-addressed grid views.
//!
//! A tree of [`DeclarationNode`]s describes the sections a grid should show.
//! The [`Coordinator`] flattens that tree into [`SectionSnapshot`]s, diffs them
//! against what the view last applied, and hands the resulting edit scripts to
//! a [`ViewCollaborator`] as one batch. Requests that arrive while a batch is
//! in flight are coalesced into a single trailing pass.
mod config;
mod coordinator;
mod declaration;
mod diff_engine;
mod errors;
mod snapshot;
mod types;
mod view;

pub use config::ReconcilerConfig;
pub use coordinator::{Coordinator, Phase};
pub use declaration::{
    flatten, flatten_with, ChangeObserver, DeclarationNode, ReactiveList, ReactiveSource,
};
pub use diff_engine::{check_unique_keys, diff, diff_by, find_duplicate_key};
pub use errors::ReconcilerError;
pub use snapshot::{ItemDescriptor, SectionSnapshot, SupplementaryDescriptor};
pub use types::{next_id, EditScript, IndexPath, Key, Move, Size};
pub use view::{
    BatchUpdate, CompletionHandler, EventHandlers, ItemDelegate, ItemEvent, RendererKind,
    SectionUpdate, ViewCollaborator,
};
