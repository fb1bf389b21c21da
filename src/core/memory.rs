//! Purpose: In-memory view store for fixtures and tests.
//! Exports: `MemoryViewStore`.
//! Role: Local stand-in for a remote store; honors every `QueryOptions` field.
//! Invariants: Rows are held sorted by collation order, ties broken by doc id.

use crate::core::collate::collate;
use crate::core::cursor::Row;
use crate::core::error::{Error, ErrorKind};
use crate::core::store::{QueryOptions, ViewRef, ViewStore};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryViewStore {
    views: Mutex<HashMap<ViewRef, Vec<Row>>>,
}

impl MemoryViewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a view with no rows. Querying an unregistered view fails
    /// with `NotFound`, the way a missing design document does remotely.
    pub fn create_view(&self, view: &ViewRef) {
        let mut views = self.views.lock().unwrap_or_else(|poison| poison.into_inner());
        views.entry(view.clone()).or_default();
    }

    pub fn insert(&self, view: &ViewRef, row: Row) {
        let mut views = self.views.lock().unwrap_or_else(|poison| poison.into_inner());
        let rows = views.entry(view.clone()).or_default();
        let position = rows
            .binary_search_by(|existing| cmp_rows(existing, &row))
            .unwrap_or_else(|insert_at| insert_at);
        rows.insert(position, row);
    }

    pub fn len(&self, view: &ViewRef) -> usize {
        let views = self.views.lock().unwrap_or_else(|poison| poison.into_inner());
        views.get(view).map_or(0, Vec::len)
    }
}

fn cmp_rows(a: &Row, b: &Row) -> Ordering {
    collate(&a.key, &b.key).then_with(|| a.id.cmp(&b.id))
}

fn before_start(row: &Row, options: &QueryOptions) -> bool {
    let Some(start_key) = &options.start_key else {
        return false;
    };
    let ordering = collate(&row.key, start_key);
    let ordering = if options.descending {
        ordering.reverse()
    } else {
        ordering
    };
    match ordering {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal => match &options.start_key_doc_id {
            Some(doc_id) => {
                let id_ordering = if options.descending {
                    row.id.cmp(doc_id).reverse()
                } else {
                    row.id.cmp(doc_id)
                };
                id_ordering == Ordering::Less
            }
            None => false,
        },
    }
}

fn past_end(row: &Row, options: &QueryOptions) -> bool {
    let Some(end_key) = &options.end_key else {
        return false;
    };
    let ordering = collate(&row.key, end_key);
    let ordering = if options.descending {
        ordering.reverse()
    } else {
        ordering
    };
    match ordering {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => match &options.end_key_doc_id {
            Some(doc_id) => {
                let id_ordering = if options.descending {
                    row.id.cmp(doc_id).reverse()
                } else {
                    row.id.cmp(doc_id)
                };
                id_ordering == Ordering::Greater
            }
            None => false,
        },
    }
}

#[async_trait]
impl ViewStore for MemoryViewStore {
    async fn query(&self, view: &ViewRef, options: &QueryOptions) -> Result<Vec<Row>, Error> {
        let stored = {
            let views = self.views.lock().unwrap_or_else(|poison| poison.into_inner());
            views.get(view).cloned().ok_or_else(|| {
                Error::new(ErrorKind::NotFound)
                    .with_message("view not found")
                    .with_view(view.to_string())
            })?
        };

        let mut rows: Vec<Row> = if options.descending {
            stored.into_iter().rev().collect()
        } else {
            stored
        };

        rows.retain(|row| !before_start(row, options));
        if let Some(cut) = rows.iter().position(|row| past_end(row, options)) {
            rows.truncate(cut);
        }
        if let Some(skip) = options.skip {
            rows.drain(..skip.min(rows.len()));
        }
        if let Some(limit) = options.limit {
            rows.truncate(limit);
        }
        if !options.include_docs {
            for row in &mut rows {
                row.doc = None;
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryViewStore;
    use crate::core::cursor::Row;
    use crate::core::error::ErrorKind;
    use crate::core::store::{QueryOptions, ViewRef, ViewStore};
    use serde_json::{Value, json};

    fn fixture() -> (MemoryViewStore, ViewRef) {
        let store = MemoryViewStore::new();
        let view = ViewRef::new("images", "by_creation_time");
        for (key, id) in [
            (json!([1]), "a"),
            (json!([1]), "b"),
            (json!([2]), "a"),
            (json!([3]), "c"),
            (json!([4]), "d"),
        ] {
            store.insert(&view, Row::new(key, id, Some(json!({"id": id}))));
        }
        (store, view)
    }

    fn keys(rows: &[Row]) -> Vec<(Value, String)> {
        rows.iter().map(|row| (row.key.clone(), row.id.clone())).collect()
    }

    #[tokio::test]
    async fn missing_view_is_not_found() {
        let store = MemoryViewStore::new();
        let view = ViewRef::new("images", "nope");
        let err = store
            .query(&view, &QueryOptions::default())
            .await
            .expect_err("err");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn rows_come_back_in_collation_order() {
        let (store, view) = fixture();
        let rows = store.query(&view, &QueryOptions::default()).await.expect("rows");
        assert_eq!(
            keys(&rows),
            vec![
                (json!([1]), "a".to_string()),
                (json!([1]), "b".to_string()),
                (json!([2]), "a".to_string()),
                (json!([3]), "c".to_string()),
                (json!([4]), "d".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn start_key_doc_id_breaks_ties() {
        let (store, view) = fixture();
        let options = QueryOptions {
            start_key: Some(json!([1])),
            start_key_doc_id: Some("b".to_string()),
            limit: Some(2),
            ..QueryOptions::default()
        };
        let rows = store.query(&view, &options).await.expect("rows");
        assert_eq!(
            keys(&rows),
            vec![(json!([1]), "b".to_string()), (json!([2]), "a".to_string())]
        );
    }

    #[tokio::test]
    async fn descending_traversal_reverses_bounds() {
        let (store, view) = fixture();
        let options = QueryOptions {
            descending: true,
            start_key: Some(json!([3])),
            end_key: Some(json!([1])),
            ..QueryOptions::default()
        };
        let rows = store.query(&view, &options).await.expect("rows");
        assert_eq!(
            keys(&rows),
            vec![
                (json!([3]), "c".to_string()),
                (json!([2]), "a".to_string()),
                (json!([1]), "b".to_string()),
                (json!([1]), "a".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn skip_and_limit_page_through_duplicates() {
        let (store, view) = fixture();
        let options = QueryOptions {
            start_key: Some(json!([1])),
            end_key: Some(json!([1])),
            skip: Some(1),
            limit: Some(5),
            ..QueryOptions::default()
        };
        let rows = store.query(&view, &options).await.expect("rows");
        assert_eq!(keys(&rows), vec![(json!([1]), "b".to_string())]);
    }

    #[tokio::test]
    async fn include_docs_false_strips_documents() {
        let (store, view) = fixture();
        let options = QueryOptions {
            limit: Some(1),
            include_docs: true,
            ..QueryOptions::default()
        };
        let rows = store.query(&view, &options).await.expect("rows");
        assert!(rows[0].doc.is_some());

        let options = QueryOptions {
            limit: Some(1),
            include_docs: false,
            ..QueryOptions::default()
        };
        let rows = store.query(&view, &options).await.expect("rows");
        assert!(rows[0].doc.is_none());
    }
}
