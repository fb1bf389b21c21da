//! Purpose: The consumed ordered-view-store interface.
//! Exports: `ViewRef`, `QueryOptions`, `ViewStore`.
//! Invariants: Queries are read-only and parameterized entirely by their arguments.
//! Invariants: Fewer rows than `limit` signals exhaustion in the query direction.

use crate::core::cursor::Row;
use crate::core::error::Error;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Names a design-document view within a database.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ViewRef {
    pub design: String,
    pub view: String,
}

impl ViewRef {
    pub fn new(design: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            design: design.into(),
            view: view.into(),
        }
    }
}

impl fmt::Display for ViewRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.design, self.view)
    }
}

/// One range query against a view.
///
/// `start_key` is the inclusive lower bound of the traversal, or the upper
/// bound when `descending`; `start_key_doc_id` breaks ties on `start_key`.
/// `end_key`/`end_key_doc_id` form the inclusive far boundary. `skip` drops
/// rows after bounding and before `limit` (skip-paging mode).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryOptions {
    pub descending: bool,
    pub start_key: Option<Value>,
    pub start_key_doc_id: Option<String>,
    pub end_key: Option<Value>,
    pub end_key_doc_id: Option<String>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    pub include_docs: bool,
}

/// A range-query handle to an ordered view store. Implementations are
/// stateless and safely shared across concurrent traversals.
#[async_trait]
pub trait ViewStore: Send + Sync {
    async fn query(&self, view: &ViewRef, options: &QueryOptions) -> Result<Vec<Row>, Error>;
}
