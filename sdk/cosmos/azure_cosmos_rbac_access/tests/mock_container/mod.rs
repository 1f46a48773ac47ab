// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! An in-memory container that stands in for [`ContainerClient`](azure_cosmos_rbac_access::clients::ContainerClient).

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use azure_cosmos_rbac_access::{
    clients::{ContainerClientMethods, FeedPager},
    models::{ContainerProperties, FeedPage, ItemResponse, PartitionKeyDefinition, ResponseMetadata},
    AuthMode, Diagnostics, ItemQuery, PartitionKey, Query, Settings, ShutdownSignal, StoreError,
    StoreResult,
};
use futures::StreamExt;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};

pub const WRITE_CHARGE: f64 = 6.67;
pub const READ_CHARGE: f64 = 1.0;
pub const QUERY_CHARGE: f64 = 2.83;
pub const DELETE_CHARGE: f64 = 6.1;
pub const FAILURE_CHARGE: f64 = 1.24;

pub const DATABASE: &str = "demodb";
pub const CONTAINER: &str = "democontainer";

/// The calls the mock has served, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockOperation {
    ReadContainer,
    Create,
    Upsert,
    Read,
    Query,
    Delete,
}

#[derive(Default)]
struct State {
    documents: BTreeMap<(String, String), Value>,
    operations: Vec<MockOperation>,
    lsn: i64,
    activity: u64,
    page_size: Option<usize>,
    throttles: u32,
    writes_before_failure: Option<(usize, u16)>,
    denied: Vec<(MockOperation, u16)>,
}

impl State {
    fn metadata(&mut self, charge: f64) -> ResponseMetadata {
        self.activity += 1;
        ResponseMetadata {
            request_charge: charge,
            activity_id: Some(format!("00000000-0000-0000-0000-{:012}", self.activity)),
        }
    }

    fn failure(&mut self, status: u16, message: &str) -> StoreError {
        let metadata = self.metadata(FAILURE_CHARGE);
        let diagnostics = Diagnostics {
            status,
            activity_id: metadata.activity_id,
            request_charge: FAILURE_CHARGE,
            retry_after: (status == 429).then(|| Duration::from_millis(5)),
            message: Some(message.to_string()),
            ..Default::default()
        };
        match status {
            404 => StoreError::NotFound(diagnostics),
            409 => StoreError::Conflict(diagnostics),
            429 => StoreError::Throttled(diagnostics),
            _ => StoreError::Service(diagnostics),
        }
    }

    fn not_found(&mut self) -> StoreError {
        self.failure(404, "Entity with the specified id does not exist in the system.")
    }

    /// Logs the call and applies the configured throttling and denials.
    fn begin(&mut self, operation: MockOperation) -> StoreResult<()> {
        self.operations.push(operation);
        if self.throttles > 0 {
            self.throttles -= 1;
            return Err(self.failure(429, "Request rate is large."));
        }
        match self.denied.iter().find(|(o, _)| *o == operation).copied() {
            Some((_, status)) => Err(self.failure(status, "Request blocked by Auth.")),
            None => Ok(()),
        }
    }
}

/// Serves one container's documents from memory.
#[derive(Clone, Default)]
pub struct MockContainer {
    state: Arc<Mutex<State>>,
}

impl MockContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits query results into pages of at most `size` documents.
    pub fn set_page_size(&self, size: usize) {
        self.state.lock().unwrap().page_size = Some(size);
    }

    /// Fails the next `count` calls as if the client's throttling retries ran out.
    pub fn throttle(&self, count: u32) {
        self.state.lock().unwrap().throttles = count;
    }

    /// Lets `successes` more creates and upserts through, then fails every later one with `status`.
    pub fn fail_writes_after(&self, successes: usize, status: u16) {
        self.state.lock().unwrap().writes_before_failure = Some((successes, status));
    }

    /// Fails every call of `operation` with `status`.
    pub fn deny(&self, operation: MockOperation, status: u16) {
        self.state.lock().unwrap().denied.push((operation, status));
    }

    pub fn documents(&self, partition_key: &str) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .documents
            .iter()
            .filter(|((pk, _), _)| pk == partition_key)
            .map(|(_, doc)| doc.clone())
            .collect()
    }

    pub fn operations(&self) -> Vec<MockOperation> {
        self.state.lock().unwrap().operations.clone()
    }

    fn write<T: Serialize + DeserializeOwned>(
        &self,
        partition_key: &PartitionKey,
        item: &T,
        upsert: bool,
    ) -> StoreResult<ItemResponse<T>> {
        let mut state = self.state.lock().unwrap();
        state.begin(if upsert {
            MockOperation::Upsert
        } else {
            MockOperation::Create
        })?;

        let mut doc = serde_json::to_value(item)?;
        if doc["pk"].as_str() != Some(partition_key.value()) {
            return Err(state.failure(
                400,
                "PartitionKey extracted from document doesn't match the one specified in the header.",
            ));
        }
        if let Some((remaining, status)) = state.writes_before_failure {
            if remaining == 0 {
                return Err(state.failure(status, "Request blocked by Auth."));
            }
            state.writes_before_failure = Some((remaining - 1, status));
        }

        let id = doc["id"].as_str().unwrap_or_default().to_string();
        let key = (partition_key.value().to_string(), id);
        if !upsert && state.documents.contains_key(&key) {
            return Err(state.failure(409, "Entity with the specified id already exists in the system."));
        }

        state.lsn += 1;
        doc["_rid"] = json!(format!("rid{}", state.lsn));
        doc["_etag"] = json!(format!("\"{:08x}\"", state.lsn));
        doc["_ts"] = json!(1_727_770_500 + state.lsn);
        doc["_attachments"] = json!("attachments/");
        state.documents.insert(key, doc.clone());

        Ok(ItemResponse {
            item: serde_json::from_value(doc)?,
            metadata: state.metadata(WRITE_CHARGE),
        })
    }
}

/// Evaluates `c.id IN (@a, @b)` and conjunctions of `c.field = @name`.
fn matches(query: &Query, doc: &Value) -> bool {
    let Some((_, predicate)) = query.text().split_once(" WHERE ") else {
        return true;
    };
    if let Some(names) = predicate
        .strip_prefix("c.id IN (")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return names
            .split(',')
            .filter_map(|name| query.parameter(name.trim()))
            .any(|value| doc.get("id") == Some(value));
    }
    predicate.split(" AND ").all(|clause| match clause.split_once(" = ") {
        Some((path, name)) => {
            let field = path.trim().trim_start_matches("c.");
            query
                .parameter(name.trim())
                .is_some_and(|value| doc.get(field) == Some(value))
        }
        None => false,
    })
}

impl ContainerClientMethods for MockContainer {
    async fn read(&self) -> StoreResult<ItemResponse<ContainerProperties>> {
        let mut state = self.state.lock().unwrap();
        state.begin(MockOperation::ReadContainer)?;
        Ok(ItemResponse {
            item: ContainerProperties {
                id: CONTAINER.to_string(),
                partition_key: Some(PartitionKeyDefinition {
                    paths: vec!["/pk".to_string()],
                }),
                ..Default::default()
            },
            metadata: state.metadata(READ_CHARGE),
        })
    }

    async fn create_item<T: Serialize + DeserializeOwned>(
        &self,
        partition_key: &PartitionKey,
        item: &T,
    ) -> StoreResult<ItemResponse<T>> {
        self.write(partition_key, item, false)
    }

    async fn upsert_item<T: Serialize + DeserializeOwned>(
        &self,
        partition_key: &PartitionKey,
        item: &T,
    ) -> StoreResult<ItemResponse<T>> {
        self.write(partition_key, item, true)
    }

    async fn read_item<T: DeserializeOwned>(
        &self,
        partition_key: &PartitionKey,
        item_id: &str,
    ) -> StoreResult<ItemResponse<T>> {
        let mut state = self.state.lock().unwrap();
        state.begin(MockOperation::Read)?;
        let key = (partition_key.value().to_string(), item_id.to_string());
        match state.documents.get(&key).cloned() {
            Some(doc) => Ok(ItemResponse {
                item: serde_json::from_value(doc)?,
                metadata: state.metadata(READ_CHARGE),
            }),
            None => Err(state.not_found()),
        }
    }

    async fn read_many_items<T: DeserializeOwned + Send + 'static>(
        &self,
        identities: &[(String, PartitionKey)],
    ) -> StoreResult<FeedPage<T>> {
        let mut state = self.state.lock().unwrap();
        state.begin(MockOperation::Query)?;
        let mut items = Vec::new();
        for (id, partition_key) in identities {
            let key = (partition_key.value().to_string(), id.clone());
            if let Some(doc) = state.documents.get(&key) {
                items.push(serde_json::from_value(doc.clone())?);
            }
        }
        Ok(FeedPage::new(items, None, state.metadata(QUERY_CHARGE)))
    }

    fn query_items<T: DeserializeOwned + Send + 'static>(
        &self,
        query: impl Into<ItemQuery>,
        partition_key: &PartitionKey,
    ) -> FeedPager<T> {
        let query: ItemQuery = query.into();
        let mut state = self.state.lock().unwrap();
        let query = match state
            .begin(MockOperation::Query)
            .and_then(|()| query.to_query().map_err(StoreError::from))
        {
            Ok(query) => query,
            Err(error) => return futures::stream::once(async move { Err(error) }).boxed(),
        };

        let matching: Vec<Value> = state
            .documents
            .iter()
            .filter(|((pk, _), doc)| pk == partition_key.value() && matches(&query, doc))
            .map(|(_, doc)| doc.clone())
            .collect();
        let page_size = state.page_size.unwrap_or(100).max(1);
        let chunks: Vec<Vec<Value>> = if matching.is_empty() {
            vec![Vec::new()]
        } else {
            matching.chunks(page_size).map(<[Value]>::to_vec).collect()
        };

        let last = chunks.len() - 1;
        let mut pages = Vec::new();
        for (index, chunk) in chunks.into_iter().enumerate() {
            let continuation = (index < last).then(|| (index + 1).to_string());
            let items = chunk
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<Vec<T>, _>>()
                .map_err(StoreError::from);
            let metadata = state.metadata(QUERY_CHARGE);
            pages.push(items.map(|items| FeedPage::new(items, continuation, metadata)));
        }
        futures::stream::iter(pages).boxed()
    }

    async fn delete_item(
        &self,
        partition_key: &PartitionKey,
        item_id: &str,
    ) -> StoreResult<ResponseMetadata> {
        let mut state = self.state.lock().unwrap();
        state.begin(MockOperation::Delete)?;
        let key = (partition_key.value().to_string(), item_id.to_string());
        match state.documents.remove(&key) {
            Some(_) => Ok(state.metadata(DELETE_CHARGE)),
            None => Err(state.not_found()),
        }
    }
}

/// A `Write` sink shared with the test, optionally triggering shutdown after some lines.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
    stop: Option<(usize, ShutdownSignal)>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_after(lines: usize, signal: ShutdownSignal) -> Self {
        Self {
            bytes: Arc::default(),
            stop: Some((lines, signal)),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8(self.bytes.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut bytes = self.bytes.lock().unwrap();
        bytes.extend_from_slice(buf);
        if let Some((lines, signal)) = &self.stop {
            if bytes.iter().filter(|b| **b == b'\n').count() >= *lines {
                signal.trigger();
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Settings for `mode` against a mock account, with no pauses between operations.
pub fn settings(mode: AuthMode) -> Settings {
    let text = json!({
        "RBACTestMode": mode.as_str(),
        "cosmosdb_uri": "https://mock.documents.azure.com:443/",
        "cosmosdb_accountkey": "bW9jay1hY2NvdW50LWtleQ==",
        "aad_tenant_id": "00000000-0000-0000-0000-000000000001",
        "aad_application_id": "00000000-0000-0000-0000-000000000002",
        "aad_application_secret": "mock-secret",
        "cosmosdb_dbname": DATABASE,
        "cosmosdb_containername": CONTAINER,
        "request_interval": 0,
        "graph_edge_interval": 0
    });
    Settings::from_json(&text.to_string()).unwrap()
}
