//! Purpose: Data model for cursor-paged view traversal.
//! Exports: `Cursor`, `Row`, `Page`, `PageItem`, `PageCursors`, `Direction`, `Document`.
//! Invariants: A cursor names a position in a view's sort order, not row content.
//! Invariants: All four page cursors are always present, possibly `None`.

use crate::core::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Documents are opaque JSON to the engine.
pub type Document = Value;

/// Position marker into a view's sort order: the row's key plus the doc id
/// that disambiguates rows sharing the same key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub key: Value,
    pub id: Option<String>,
}

impl Cursor {
    pub fn new(key: Value, id: Option<String>) -> Self {
        Self { key, id }
    }

    /// Reject malformed cursors before any query is issued. A null key can
    /// never name a position: view rows always carry a concrete key.
    pub fn validate(&self) -> Result<(), Error> {
        if self.key.is_null() {
            return Err(Error::new(ErrorKind::Usage).with_message("cursor key must not be null"));
        }
        Ok(())
    }
}

/// One raw record returned by a range query. `doc` is `None` when the query
/// omitted documents; the iterator also uses it as its exclusion marker while
/// filtering, so excluded rows never leave the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub key: Value,
    pub id: String,
    pub doc: Option<Document>,
}

impl Row {
    pub fn new(key: Value, id: impl Into<String>, doc: Option<Document>) -> Self {
        Self {
            key,
            id: id.into(),
            doc,
        }
    }

    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.key.clone(), Some(self.id.clone()))
    }
}

/// Post-transform, post-filter, user-visible unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageItem {
    pub cursor: Cursor,
    pub doc: Document,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageCursors {
    /// Cursor of the first item; `None` for an empty page.
    pub start: Option<Cursor>,
    /// Cursor of the last item; equals `start` for a one-item page.
    pub end: Option<Cursor>,
    /// Entry cursor of the adjacent page behind, when one exists.
    pub previous: Option<Cursor>,
    /// Entry cursor of the adjacent page ahead, when one exists.
    pub next: Option<Cursor>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<PageItem>,
    pub cursors: PageCursors,
}

/// Traversal order over a view. `previous`/`next` on a pager are defined
/// relative to this, not to absolute key order.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }

    pub fn is_descending(self) -> bool {
        matches!(self, Direction::Descending)
    }
}
