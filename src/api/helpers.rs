//! Purpose: Whole-view collection helpers built on `DocumentIterator`.
//! Exports: `collect_view`, `collect_view_keys`, their options.
//! Role: One-shot consumption of a view (exports, audits, per-key lookups).
//! Invariants: `collect_view_keys` preserves the order of the supplied keys.

use crate::core::cursor::{Cursor, Direction, Row};
use crate::core::error::Error;
use crate::core::iter::{DocumentIterator, Filter, IteratorOptions, Transform};
use crate::core::store::{ViewRef, ViewStore};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct CollectOptions {
    /// Batch size used while walking the view.
    pub page_size: usize,
    pub direction: Direction,
    pub start: Option<Cursor>,
    pub end: Option<Cursor>,
    pub transform: Option<Transform>,
    pub filter: Option<Filter>,
    pub skip_paging: bool,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            page_size: 100,
            direction: Direction::Ascending,
            start: None,
            end: None,
            transform: None,
            filter: None,
            skip_paging: false,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CollectKeysOptions {
    /// Batch size used while walking each key's rows.
    pub page_size: usize,
}

impl Default for CollectKeysOptions {
    fn default() -> Self {
        Self { page_size: 100 }
    }
}

/// Walk a view to exhaustion and return every surviving row.
pub async fn collect_view(
    store: Arc<dyn ViewStore>,
    view: &ViewRef,
    options: CollectOptions,
) -> Result<Vec<Row>, Error> {
    let iterator_options = IteratorOptions {
        direction: options.direction,
        start: options.start,
        end: options.end,
        transform: options.transform,
        filter: options.filter,
        skip_paging: options.skip_paging,
    };
    let mut iter =
        DocumentIterator::new(store, view.clone(), Some(options.page_size), iterator_options)?;

    let mut rows = Vec::new();
    while let Some(mut batch) = iter.fetch_page().await? {
        rows.append(&mut batch);
    }
    debug!(view = %view, rows = rows.len(), "collected view");
    Ok(rows)
}

/// For each key, collect every row matching it. Uses skip-paging because
/// views where one key yields many docs defeat doc-id resumption.
pub async fn collect_view_keys(
    store: Arc<dyn ViewStore>,
    view: &ViewRef,
    keys: &[Value],
    options: CollectKeysOptions,
) -> Result<Vec<Row>, Error> {
    let mut rows = Vec::new();
    for key in keys {
        let collected = collect_view(
            store.clone(),
            view,
            CollectOptions {
                page_size: options.page_size,
                start: Some(Cursor::new(key.clone(), None)),
                end: Some(Cursor::new(key.clone(), None)),
                skip_paging: true,
                ..CollectOptions::default()
            },
        )
        .await?;
        rows.extend(collected);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::{CollectKeysOptions, CollectOptions, collect_view, collect_view_keys};
    use crate::core::cursor::Row;
    use crate::core::memory::MemoryViewStore;
    use crate::core::store::ViewRef;
    use serde_json::json;
    use std::sync::Arc;

    fn view() -> ViewRef {
        ViewRef::new("images", "batch_by_ctime")
    }

    #[tokio::test]
    async fn collects_the_whole_view_across_batches() {
        let store = MemoryViewStore::new();
        for n in 1..=7 {
            store.insert(
                &view(),
                Row::new(json!([n]), format!("id-{n}"), Some(json!({"n": n}))),
            );
        }
        let rows = collect_view(
            Arc::new(store),
            &view(),
            CollectOptions {
                page_size: 3,
                ..CollectOptions::default()
            },
        )
        .await
        .expect("rows");
        let ids: Vec<&str> = rows.iter().map(|row| row.id.as_str()).collect();
        assert_eq!(ids, vec!["id-1", "id-2", "id-3", "id-4", "id-5", "id-6", "id-7"]);
    }

    #[tokio::test]
    async fn collects_rows_per_key_in_supplied_order() {
        let store = MemoryViewStore::new();
        for (key, id) in [
            ("batch-1", "a"),
            ("batch-1", "b"),
            ("batch-1", "c"),
            ("batch-2", "d"),
            ("batch-3", "e"),
        ] {
            store.insert(&view(), Row::new(json!(key), id, Some(json!({"id": id}))));
        }
        let store = Arc::new(store);
        let rows = collect_view_keys(
            store,
            &view(),
            &[json!("batch-3"), json!("batch-1")],
            CollectKeysOptions { page_size: 2 },
        )
        .await
        .expect("rows");
        let ids: Vec<&str> = rows.iter().map(|row| row.id.as_str()).collect();
        assert_eq!(ids, vec!["e", "a", "b", "c"]);
    }
}
