//! Purpose: HTTP client for a CouchDB-style ordered view store.
//! Exports: `RemoteViewStore`.
//! Role: Implements `ViewStore` against `GET /{db}/_design/{design}/_view/{view}`.
//! Invariants: Start/end keys are JSON-encoded in the query string; doc ids are not.
//! Invariants: Transport failures and malformed bodies surface as store errors.
#![allow(clippy::result_large_err)]

use crate::core::cursor::Row;
use crate::core::error::{Error, ErrorKind};
use crate::core::store::{QueryOptions, ViewRef, ViewStore};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Clone)]
pub struct RemoteViewStore {
    inner: Arc<RemoteInner>,
}

struct RemoteInner {
    base_url: Url,
    database: String,
    agent: ureq::Agent,
}

impl RemoteViewStore {
    pub fn new(base_url: Url, database: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();
        Self {
            inner: Arc::new(RemoteInner {
                base_url,
                database: database.into(),
                agent,
            }),
        }
    }

    pub fn database(&self) -> &str {
        &self.inner.database
    }

    fn view_url(&self, view: &ViewRef, options: &QueryOptions) -> Result<Url, Error> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                Error::new(ErrorKind::Usage).with_message("store base url cannot be a base")
            })?
            .pop_if_empty()
            .extend([
                self.inner.database.as_str(),
                "_design",
                view.design.as_str(),
                "_view",
                view.view.as_str(),
            ]);

        {
            let mut pairs = url.query_pairs_mut();
            if options.descending {
                pairs.append_pair("descending", "true");
            }
            if options.include_docs {
                pairs.append_pair("include_docs", "true");
            }
            if let Some(start_key) = &options.start_key {
                pairs.append_pair("startkey", &encode_key(start_key, view)?);
            }
            if let Some(doc_id) = &options.start_key_doc_id {
                pairs.append_pair("startkey_docid", doc_id);
            }
            if let Some(end_key) = &options.end_key {
                pairs.append_pair("endkey", &encode_key(end_key, view)?);
            }
            if let Some(doc_id) = &options.end_key_doc_id {
                pairs.append_pair("endkey_docid", doc_id);
            }
            if let Some(limit) = options.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
            if let Some(skip) = options.skip {
                pairs.append_pair("skip", &skip.to_string());
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl ViewStore for RemoteViewStore {
    async fn query(&self, view: &ViewRef, options: &QueryOptions) -> Result<Vec<Row>, Error> {
        let url = self.view_url(view, options)?;
        let agent = self.inner.agent.clone();
        let view_name = view.to_string();
        let body = tokio::task::spawn_blocking(move || fetch_body(&agent, &url, &view_name))
            .await
            .map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("view query task failed")
                    .with_source(err)
            })??;
        decode_rows(&body, view)
    }
}

fn encode_key(key: &Value, view: &ViewRef) -> Result<String, Error> {
    serde_json::to_string(key).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode view key")
            .with_view(view.to_string())
            .with_source(err)
    })
}

fn fetch_body(agent: &ureq::Agent, url: &Url, view: &str) -> Result<String, Error> {
    let response = match agent.request_url("GET", url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(404, _)) => {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message("view not found")
                .with_view(view));
        }
        Err(ureq::Error::Status(status, _)) => {
            return Err(Error::new(ErrorKind::Transport)
                .with_message("view request failed")
                .with_view(view)
                .with_status(status));
        }
        Err(err) => {
            return Err(Error::new(ErrorKind::Transport)
                .with_message("view request failed")
                .with_view(view)
                .with_source(err));
        }
    };

    let mut body = String::new();
    response
        .into_reader()
        .read_to_string(&mut body)
        .map_err(|err| {
            Error::new(ErrorKind::Transport)
                .with_message("failed to read view response")
                .with_view(view)
                .with_source(err)
        })?;
    Ok(body)
}

#[derive(Deserialize)]
struct ViewEnvelope {
    rows: Vec<EnvelopeRow>,
}

#[derive(Deserialize)]
struct EnvelopeRow {
    id: String,
    key: Value,
    #[serde(default)]
    doc: Option<Value>,
}

fn decode_rows(body: &str, view: &ViewRef) -> Result<Vec<Row>, Error> {
    let envelope: ViewEnvelope = serde_json::from_str(body).map_err(|err| {
        Error::new(ErrorKind::Decode)
            .with_message("malformed view response")
            .with_view(view.to_string())
            .with_source(err)
    })?;
    Ok(envelope
        .rows
        .into_iter()
        .map(|row| Row::new(row.key, row.id, row.doc))
        .collect())
}
