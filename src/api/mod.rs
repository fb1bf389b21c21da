//! Purpose: Define the stable public Rust API boundary for contactsheet.
//! Exports: Pager, iterator, stores, cursor/page model, errors, view helpers.
//! Role: Public, additive-only surface; the only path to the core modules.
//! Invariants: `Pager` performs no writes and caches nothing across calls.

mod helpers;

pub use crate::core::collate::collate;
pub use crate::core::cursor::{
    Cursor, Direction, Document, Page, PageCursors, PageItem, Row,
};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind, PageError};
pub use crate::core::iter::{DocumentIterator, Filter, IteratorOptions, Transform};
pub use crate::core::memory::MemoryViewStore;
pub use crate::core::pager::{Pager, PagerOptions, PreviousOptions};
pub use crate::core::remote::RemoteViewStore;
pub use crate::core::store::{QueryOptions, ViewRef, ViewStore};
pub use helpers::{CollectKeysOptions, CollectOptions, collect_view, collect_view_keys};
