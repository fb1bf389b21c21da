//! Purpose: Single-direction, resumable producer of pages of enriched, filtered view rows.
//! Exports: `DocumentIterator`, `IteratorOptions`, `Transform`, `Filter`.
//! Role: Owns the retry-until-filled fetch loop that keeps page boundaries
//! stable when filtering discards fetched rows.
//! Invariants: Exhaustion is monotonic; after it, `fetch_page` yields `Ok(None)`.
//! Invariants: Transforms may run concurrently but results are reassembled in
//! fetch order before filtering or slicing.

use crate::core::cursor::{Cursor, Direction, Document, Row};
use crate::core::error::{Error, ErrorKind};
use crate::core::store::{QueryOptions, ViewRef, ViewStore};
use futures::Stream;
use futures::future::{self, BoxFuture};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Asynchronous per-row enrichment, e.g. fetching the images of an import batch.
pub type Transform =
    Arc<dyn Fn(Document) -> BoxFuture<'static, Result<Document, Error>> + Send + Sync>;

/// Synchronous predicate; returning `true` excludes the row from results.
pub type Filter = Arc<dyn Fn(&Document) -> bool + Send + Sync>;

#[derive(Clone, Default)]
pub struct IteratorOptions {
    pub direction: Direction,
    /// Position to start at, inclusive. Absent means the beginning.
    pub start: Option<Cursor>,
    /// Inclusive traversal boundary.
    pub end: Option<Cursor>,
    pub transform: Option<Transform>,
    pub filter: Option<Filter>,
    /// Advance with `skip` + `limit` instead of `start_key`/`start_key_doc_id`.
    /// Needed for views where the same key yields multiple docs and the store
    /// mishandles doc-id resumption.
    pub skip_paging: bool,
}

impl fmt::Debug for IteratorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IteratorOptions")
            .field("direction", &self.direction)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("transform", &self.transform.is_some())
            .field("filter", &self.filter.is_some())
            .field("skip_paging", &self.skip_paging)
            .finish()
    }
}

/// Stateful traversal over one view in one direction.
///
/// `fetch_page` mutates the resumption point, so a single iterator must not
/// be driven by more than one in-flight call; `&mut self` enforces that.
pub struct DocumentIterator {
    store: Arc<dyn ViewStore>,
    view: ViewRef,
    page_size: Option<usize>,
    options: IteratorOptions,
    cursor: Option<Cursor>,
    consumed: usize,
    exhausted: bool,
}

impl fmt::Debug for DocumentIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentIterator")
            .field("view", &self.view)
            .field("page_size", &self.page_size)
            .field("options", &self.options)
            .field("cursor", &self.cursor)
            .field("consumed", &self.consumed)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl DocumentIterator {
    /// `page_size` of `None` fetches the whole remaining view in one page.
    pub fn new(
        store: Arc<dyn ViewStore>,
        view: ViewRef,
        page_size: Option<usize>,
        options: IteratorOptions,
    ) -> Result<Self, Error> {
        if page_size == Some(0) {
            return Err(Error::new(ErrorKind::Usage).with_message("page size must be at least 1"));
        }
        let cursor = options.start.clone();
        Ok(Self {
            store,
            view,
            page_size,
            options,
            cursor,
            consumed: 0,
            exhausted: false,
        })
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Produce the next page of surviving rows, or `Ok(None)` once the view
    /// is exhausted in this direction.
    ///
    /// Each round requests one row beyond what the page still needs; getting
    /// that extra row back is the proof that more data exists, and its cursor
    /// becomes the resumption point. Rows dropped by the filter still count
    /// as progress, so the loop re-fetches until the page fills or the store
    /// runs dry.
    pub async fn fetch_page(&mut self) -> Result<Option<Vec<Row>>, Error> {
        if self.exhausted {
            return Ok(None);
        }

        let mut page: Vec<Row> = Vec::new();
        loop {
            let remaining = self.page_size.map(|size| size - page.len());
            let limit = remaining.map(|remaining| remaining + 1);
            let mut rows = self
                .store
                .query(&self.view, &self.query_options(limit))
                .await?;
            let fetched = rows.len();

            let probe = if limit.is_some_and(|limit| fetched == limit) {
                rows.pop()
            } else {
                None
            };

            self.transform_rows(&mut rows).await?;
            self.consumed += rows.len();
            if let Some(filter) = &self.options.filter {
                for row in &mut rows {
                    if let Some(doc) = &row.doc {
                        if filter(doc) {
                            row.doc = None;
                        }
                    }
                }
                rows.retain(|row| row.doc.is_some());
            }
            debug!(
                view = %self.view,
                fetched,
                surviving = rows.len(),
                "fetched view rows"
            );
            page.append(&mut rows);

            match probe {
                None => {
                    // The store returned fewer rows than requested: this
                    // direction is done, whatever the page holds.
                    debug!(view = %self.view, rows = page.len(), "view exhausted");
                    self.exhausted = true;
                    self.cursor = None;
                    return Ok(Some(page));
                }
                Some(next_start) => {
                    self.cursor = Some(next_start.cursor());
                    if self.page_size.is_some_and(|size| page.len() >= size) {
                        return Ok(Some(page));
                    }
                }
            }
        }
    }

    /// Consume the iterator as a lazy, finite stream of pages. Useful for
    /// one-shot walks of an entire view (export, migration).
    pub fn into_pages(self) -> impl Stream<Item = Result<Vec<Row>, Error>> + Send {
        futures::stream::try_unfold(self, |mut iter| async move {
            Ok(iter.fetch_page().await?.map(|rows| (rows, iter)))
        })
    }

    async fn transform_rows(&self, rows: &mut [Row]) -> Result<(), Error> {
        let Some(transform) = &self.options.transform else {
            return Ok(());
        };

        let mut pending = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter_mut().enumerate() {
            if let Some(doc) = row.doc.take() {
                let enriched = transform(doc);
                pending.push(async move { (index, enriched.await) });
            }
        }
        // join_all drives the transforms concurrently; writing results back
        // by index restores fetch order no matter which finished first.
        for (index, outcome) in future::join_all(pending).await {
            rows[index].doc = Some(outcome?);
        }
        Ok(())
    }

    fn query_options(&self, limit: Option<usize>) -> QueryOptions {
        let mut options = QueryOptions {
            descending: self.options.direction.is_descending(),
            limit,
            include_docs: true,
            ..QueryOptions::default()
        };
        if self.options.skip_paging {
            if let Some(start) = &self.options.start {
                options.start_key = Some(start.key.clone());
            }
            if self.consumed > 0 {
                options.skip = Some(self.consumed);
            }
        } else if let Some(cursor) = &self.cursor {
            options.start_key = Some(cursor.key.clone());
            options.start_key_doc_id = cursor.id.clone();
        }
        if let Some(end) = &self.options.end {
            options.end_key = Some(end.key.clone());
            options.end_key_doc_id = end.id.clone();
        }
        options
    }
}
