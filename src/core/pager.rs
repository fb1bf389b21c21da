//! Purpose: Stateless-per-call pagination façade over `DocumentIterator`.
//! Exports: `Pager`, `PagerOptions`, `PreviousOptions`.
//! Role: Turns one-directional range queries into a stable two-directional
//! paging API (`at`, `previous`, `next`).
//! Invariants: Each navigation call owns its iterators; the pager holds no
//! per-call state, so calls are independent and idempotent.
//! Invariants: `previous`/`next` take the start cursor of the page just
//! consumed; behavior on arbitrary interior cursors is undefined.

use crate::core::cursor::{Cursor, Direction, Page, PageItem, Row};
use crate::core::error::{Error, ErrorKind, PageError};
use crate::core::iter::{DocumentIterator, Filter, IteratorOptions, Transform};
use crate::core::store::{ViewRef, ViewStore};
use futures::future::LocalBoxFuture;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Default)]
pub struct PagerOptions {
    pub direction: Direction,
    pub transform: Option<Transform>,
    pub filter: Option<Filter>,
    /// Backward traversal boundary: `previous` never walks past this cursor.
    pub start_key: Option<Cursor>,
    /// Forward traversal boundary: `at` and `next` never walk past this cursor.
    pub stop_key: Option<Cursor>,
}

impl fmt::Debug for PagerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagerOptions")
            .field("direction", &self.direction)
            .field("transform", &self.transform.is_some())
            .field("filter", &self.filter.is_some())
            .field("start_key", &self.start_key)
            .field("stop_key", &self.stop_key)
            .finish()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PreviousOptions {
    /// When backward traversal reaches a short first page, re-anchor through
    /// `at(None)` so the caller sees a full-sized page, the same shape a
    /// forward-from-start traversal would produce.
    pub full_page_at_end: bool,
}

impl Default for PreviousOptions {
    fn default() -> Self {
        Self {
            full_page_at_end: true,
        }
    }
}

pub struct Pager {
    store: Arc<dyn ViewStore>,
    view: ViewRef,
    page_size: usize,
    options: PagerOptions,
}

impl fmt::Debug for Pager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pager")
            .field("view", &self.view)
            .field("page_size", &self.page_size)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Pager {
    pub fn new(
        store: Arc<dyn ViewStore>,
        view: ViewRef,
        page_size: usize,
        options: PagerOptions,
    ) -> Result<Self, Error> {
        if page_size == 0 {
            return Err(Error::new(ErrorKind::Usage).with_message("page size must be at least 1"));
        }
        Ok(Self {
            store,
            view,
            page_size,
            options,
        })
    }

    /// Return the page starting at `cursor`, or the first page when `cursor`
    /// is absent. `cursors.previous` is filled in by peeking one page back;
    /// the absence of a previous page is not an error here.
    pub async fn at(&self, cursor: Option<&Cursor>) -> Result<Page, PageError> {
        if let Some(cursor) = cursor {
            cursor.validate()?;
        }
        debug!(view = %self.view, at = cursor.is_some(), "page requested");

        let mut iter = self.iterator(
            self.page_size + 1,
            cursor.cloned(),
            self.options.direction,
            self.options.stop_key.clone(),
        )?;
        let rows = iter.fetch_page().await?.unwrap_or_default();
        if rows.is_empty() {
            return Err(PageError::Exhausted);
        }

        let mut page = rows_to_page(&rows, 0, self.page_size);
        if let Some(start) = page.cursors.start.clone() {
            // Boxed to break the `at` <-> `previous` async recursion.
            let peek: LocalBoxFuture<'_, Result<Page, PageError>> =
                Box::pin(self.previous(&start, PreviousOptions::default()));
            match peek.await {
                Ok(previous_page) => page.cursors.previous = previous_page.cursors.start,
                Err(PageError::Exhausted) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(page)
    }

    /// Return the page immediately following the page that starts at `cursor`.
    ///
    /// Fetches `2 * page_size + 1` surviving rows from `cursor`: the first
    /// `page_size` reconstruct the consumed page, the rest form the result.
    pub async fn next(&self, cursor: &Cursor) -> Result<Page, PageError> {
        cursor.validate()?;
        debug!(view = %self.view, key = %cursor.key, "next page requested");

        let mut iter = self.iterator(
            2 * self.page_size + 1,
            Some(cursor.clone()),
            self.options.direction,
            self.options.stop_key.clone(),
        )?;
        let rows = iter.fetch_page().await?.unwrap_or_default();
        if rows.len() <= self.page_size {
            return Err(PageError::Exhausted);
        }
        Ok(rows_to_page(&rows, self.page_size, self.page_size))
    }

    /// Return the page immediately preceding the page that starts at `cursor`.
    ///
    /// Walks the opposite direction from `cursor` (bounded by `start_key`),
    /// then reverses the window back into primary order. The row at `cursor`
    /// itself anchors `cursors.next` and is never part of the result.
    pub async fn previous(
        &self,
        cursor: &Cursor,
        options: PreviousOptions,
    ) -> Result<Page, PageError> {
        cursor.validate()?;
        debug!(view = %self.view, key = %cursor.key, "previous page requested");

        let mut iter = self.iterator(
            2 * self.page_size + 1,
            Some(cursor.clone()),
            self.options.direction.reversed(),
            self.options.start_key.clone(),
        )?;
        let mut rows = iter.fetch_page().await?.unwrap_or_default();
        if rows.len() < 2 {
            // One row is the anchor itself; a previous page needs more.
            return Err(PageError::Exhausted);
        }
        rows.reverse();
        let anchor = rows.pop();

        let page_index = rows.len().saturating_sub(self.page_size);
        let mut page = rows_to_page(&rows, page_index, self.page_size);
        if let Some(anchor) = anchor {
            page.cursors.next = Some(anchor.cursor());
        }

        if options.full_page_at_end
            && page.cursors.previous.is_none()
            && page.items.len() < self.page_size
        {
            let reanchor: LocalBoxFuture<'_, Result<Page, PageError>> = Box::pin(self.at(None));
            return reanchor.await;
        }
        Ok(page)
    }

    fn iterator(
        &self,
        page_size: usize,
        start: Option<Cursor>,
        direction: Direction,
        end: Option<Cursor>,
    ) -> Result<DocumentIterator, PageError> {
        let options = IteratorOptions {
            direction,
            start,
            end,
            transform: self.options.transform.clone(),
            filter: self.options.filter.clone(),
            skip_paging: false,
        };
        DocumentIterator::new(self.store.clone(), self.view.clone(), Some(page_size), options)
            .map_err(PageError::from)
    }
}

/// Assemble a page from rows in primary order. `page_index` is where the
/// page starts; the row at `page_index + page_size`, when present, is the
/// entry cursor of the next page, and the row at index 0 is the entry cursor
/// of the previous page when the slice starts past it.
fn rows_to_page(rows: &[Row], page_index: usize, page_size: usize) -> Page {
    let mut page = Page::default();
    if page_index >= rows.len() {
        return page;
    }
    let end = rows.len().min(page_index + page_size);
    for row in &rows[page_index..end] {
        let cursor = row.cursor();
        if page.cursors.start.is_none() {
            page.cursors.start = Some(cursor.clone());
        }
        page.cursors.end = Some(cursor.clone());
        page.items.push(PageItem {
            cursor,
            doc: row.doc.clone().unwrap_or(Value::Null),
        });
    }
    if page_index > 0 {
        page.cursors.previous = Some(rows[0].cursor());
    }
    if rows.len() > page_index + page_size {
        page.cursors.next = Some(rows[page_index + page_size].cursor());
    }
    page
}

#[cfg(test)]
mod tests {
    use super::{Pager, PagerOptions, PreviousOptions, rows_to_page};
    use crate::core::cursor::{Cursor, Direction, Document, Page, Row};
    use crate::core::error::{ErrorKind, PageError};
    use crate::core::memory::MemoryViewStore;
    use crate::core::store::ViewRef;
    use serde_json::json;
    use std::sync::Arc;

    fn view() -> ViewRef {
        ViewRef::new("images", "by_creation_time")
    }

    fn seed(count: usize) -> Arc<MemoryViewStore> {
        let store = MemoryViewStore::new();
        store.create_view(&view());
        for n in 1..=count {
            store.insert(
                &view(),
                Row::new(json!([n]), format!("id-{n}"), Some(json!({"n": n}))),
            );
        }
        Arc::new(store)
    }

    fn pager(store: Arc<MemoryViewStore>, page_size: usize) -> Pager {
        Pager::new(store, view(), page_size, PagerOptions::default()).expect("pager")
    }

    fn ns(page: &Page) -> Vec<u64> {
        page.items
            .iter()
            .map(|item| item.doc["n"].as_u64().unwrap_or(0))
            .collect()
    }

    fn key_of(cursor: &Option<Cursor>) -> serde_json::Value {
        cursor.as_ref().expect("cursor").key.clone()
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let err = Pager::new(seed(0), view(), 0, PagerOptions::default()).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn rows_to_page_sets_all_four_cursors() {
        let rows: Vec<Row> = (1..=5)
            .map(|n| Row::new(json!([n]), format!("id-{n}"), Some(json!({"n": n}))))
            .collect();
        let page = rows_to_page(&rows, 2, 2);
        assert_eq!(ns(&page), vec![3, 4]);
        assert_eq!(key_of(&page.cursors.start), json!([3]));
        assert_eq!(key_of(&page.cursors.end), json!([4]));
        assert_eq!(key_of(&page.cursors.previous), json!([1]));
        assert_eq!(key_of(&page.cursors.next), json!([5]));
    }

    #[test]
    fn one_item_page_bounds_itself() {
        let rows = vec![Row::new(json!([1]), "id-1", Some(json!({"n": 1})))];
        let page = rows_to_page(&rows, 0, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.cursors.start, page.cursors.end);
        assert!(page.cursors.previous.is_none());
        assert!(page.cursors.next.is_none());
    }

    #[test]
    fn out_of_range_index_yields_empty_page() {
        let page = rows_to_page(&[], 0, 3);
        assert!(page.items.is_empty());
        assert!(page.cursors.start.is_none());
        assert!(page.cursors.end.is_none());
    }

    #[tokio::test]
    async fn at_start_has_next_but_no_previous() {
        let pager = pager(seed(5), 2);
        let page = pager.at(None).await.expect("page");
        assert_eq!(ns(&page), vec![1, 2]);
        assert_eq!(key_of(&page.cursors.start), json!([1]));
        assert_eq!(key_of(&page.cursors.end), json!([2]));
        assert_eq!(key_of(&page.cursors.next), json!([3]));
        assert!(page.cursors.previous.is_none());
    }

    #[tokio::test]
    async fn at_interior_cursor_fills_previous() {
        let pager = pager(seed(5), 2);
        let page = pager
            .at(Some(&Cursor::new(json!([3]), Some("id-3".to_string()))))
            .await
            .expect("page");
        assert_eq!(ns(&page), vec![3, 4]);
        assert_eq!(key_of(&page.cursors.previous), json!([1]));
        assert_eq!(key_of(&page.cursors.next), json!([5]));
    }

    #[tokio::test]
    async fn at_beyond_the_end_is_exhausted() {
        let pager = pager(seed(5), 2);
        let err = pager
            .at(Some(&Cursor::new(json!([99]), None)))
            .await
            .expect_err("err");
        assert!(err.is_exhausted());
    }

    #[tokio::test]
    async fn at_on_empty_view_is_exhausted() {
        let pager = pager(seed(0), 2);
        let err = pager.at(None).await.expect_err("err");
        assert!(err.is_exhausted());
    }

    #[tokio::test]
    async fn forward_round_trip_visits_every_row_once() {
        let pager = pager(seed(5), 2);
        let mut seen: Vec<u64> = Vec::new();
        let mut pages = 0;

        let mut page = pager.at(None).await.expect("page");
        loop {
            seen.extend(ns(&page));
            pages += 1;
            let start = page.cursors.start.clone().expect("start");
            match pager.next(&start).await {
                Ok(next_page) => page = next_page,
                Err(err) => {
                    assert!(err.is_exhausted());
                    break;
                }
            }
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(pages, 3);
    }

    #[tokio::test]
    async fn consecutive_pages_share_a_boundary_cursor() {
        let pager = pager(seed(5), 2);
        let first = pager.at(None).await.expect("page");
        let start = first.cursors.start.clone().expect("start");
        let second = pager.next(&start).await.expect("page");
        assert_eq!(first.cursors.next, second.cursors.start);
    }

    #[tokio::test]
    async fn next_of_last_page_is_exhausted() {
        let pager = pager(seed(5), 2);
        let err = pager
            .next(&Cursor::new(json!([5]), Some("id-5".to_string())))
            .await
            .expect_err("err");
        assert!(err.is_exhausted());
    }

    #[tokio::test]
    async fn previous_then_next_reproduces_the_page() {
        let pager = pager(seed(6), 2);
        // Interior page: starts at row 3.
        let interior_start = Cursor::new(json!([3]), Some("id-3".to_string()));
        let before = pager
            .previous(&interior_start, PreviousOptions::default())
            .await
            .expect("page");
        assert_eq!(ns(&before), vec![1, 2]);
        assert_eq!(key_of(&before.cursors.next), json!([3]));

        let start = before.cursors.start.clone().expect("start");
        let again = pager.next(&start).await.expect("page");
        assert_eq!(ns(&again), vec![3, 4]);
        assert_eq!(again.cursors.start, Some(interior_start));
    }

    #[tokio::test]
    async fn previous_of_first_page_is_exhausted() {
        let pager = pager(seed(5), 2);
        let err = pager
            .previous(
                &Cursor::new(json!([1]), Some("id-1".to_string())),
                PreviousOptions::default(),
            )
            .await
            .expect_err("err");
        assert!(err.is_exhausted());
    }

    #[tokio::test]
    async fn previous_reanchors_to_a_full_first_page() {
        // Pages of 3 over 5 rows: a backward walk from row 3 only finds two
        // rows behind it, so the default re-anchors at the beginning.
        let pager = pager(seed(5), 3);
        let page = pager
            .previous(
                &Cursor::new(json!([3]), Some("id-3".to_string())),
                PreviousOptions::default(),
            )
            .await
            .expect("page");
        assert_eq!(ns(&page), vec![1, 2, 3]);
        assert_eq!(key_of(&page.cursors.next), json!([4]));

        let page = pager
            .previous(
                &Cursor::new(json!([3]), Some("id-3".to_string())),
                PreviousOptions {
                    full_page_at_end: false,
                },
            )
            .await
            .expect("page");
        assert_eq!(ns(&page), vec![1, 2]);
        assert_eq!(key_of(&page.cursors.next), json!([3]));
    }

    #[tokio::test]
    async fn filtered_rows_never_truncate_the_traversal() {
        let excluded = |doc: &Document| {
            let n = doc["n"].as_u64().unwrap_or(0);
            n == 2 || n == 4
        };
        let options = PagerOptions {
            filter: Some(Arc::new(excluded)),
            ..PagerOptions::default()
        };
        let pager = Pager::new(seed(5), view(), 3, options).expect("pager");
        let page = pager.at(None).await.expect("page");
        assert_eq!(ns(&page), vec![1, 3, 5]);
        assert!(page.cursors.next.is_none());
    }

    #[tokio::test]
    async fn stop_key_bounds_forward_traversal() {
        let options = PagerOptions {
            stop_key: Some(Cursor::new(json!([3]), None)),
            ..PagerOptions::default()
        };
        let pager = Pager::new(seed(10), view(), 5, options).expect("pager");
        let page = pager.at(None).await.expect("page");
        assert_eq!(ns(&page), vec![1, 2, 3]);
        assert!(page.cursors.next.is_none());
    }

    #[tokio::test]
    async fn start_key_bounds_backward_traversal() {
        let options = PagerOptions {
            start_key: Some(Cursor::new(json!([2]), None)),
            ..PagerOptions::default()
        };
        let pager = Pager::new(seed(5), view(), 2, options).expect("pager");
        let page = pager
            .previous(
                &Cursor::new(json!([4]), Some("id-4".to_string())),
                PreviousOptions::default(),
            )
            .await
            .expect("page");
        assert_eq!(ns(&page), vec![2, 3]);
    }

    #[tokio::test]
    async fn descending_pager_pages_in_reverse_key_order() {
        let options = PagerOptions {
            direction: Direction::Descending,
            ..PagerOptions::default()
        };
        let pager = Pager::new(seed(5), view(), 2, options).expect("pager");
        let page = pager.at(None).await.expect("page");
        assert_eq!(ns(&page), vec![5, 4]);
        assert_eq!(key_of(&page.cursors.next), json!([3]));

        let start = page.cursors.start.clone().expect("start");
        let page = pager.next(&start).await.expect("page");
        assert_eq!(ns(&page), vec![3, 2]);
    }

    #[tokio::test]
    async fn malformed_cursor_is_rejected_before_querying() {
        let pager = pager(seed(5), 2);
        let err = pager
            .next(&Cursor::new(json!(null), None))
            .await
            .expect_err("err");
        match err {
            PageError::Iteration(inner) => assert_eq!(inner.kind(), ErrorKind::Usage),
            PageError::Exhausted => panic!("expected iteration error"),
        }
    }
}
