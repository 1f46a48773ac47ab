// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! Documents written by the workloads, and response envelopes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reporter::DocumentSnapshot;
use crate::PartitionKey;

/// Counter value written by the upsert step to show that the document changed.
pub const UPSERT_SENTINEL: i64 = -1;

pub const VERTEX_LABEL: &str = "demo_vertex";
pub const EDGE_LABEL: &str = "demo_edge";

/// Properties maintained by the service. Never sent on writes.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct SystemProperties {
    #[serde(rename = "_rid", default, skip_serializing)]
    pub resource_id: Option<String>,

    #[serde(rename = "_self", default, skip_serializing)]
    pub self_link: Option<String>,

    #[serde(rename = "_etag", default, skip_serializing)]
    pub etag: Option<String>,

    #[serde(rename = "_attachments", default, skip_serializing)]
    pub attachments: Option<String>,

    #[serde(rename = "_ts", default, skip_serializing)]
    pub last_modified: Option<i64>,
}

/// Properties of a database.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct DatabaseProperties {
    pub id: String,

    #[serde(flatten)]
    pub system_properties: SystemProperties,
}

/// How a container is partitioned.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct PartitionKeyDefinition {
    pub paths: Vec<String>,
}

/// Properties of a container.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct ContainerProperties {
    pub id: String,

    #[serde(rename = "partitionKey", default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<PartitionKeyDefinition>,

    #[serde(flatten)]
    pub system_properties: SystemProperties,
}

/// The document written by the document workload.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct DemoDocument {
    pub id: String,
    pub pk: String,
    pub counter: i64,
    pub timestamp: String,

    #[serde(flatten)]
    pub system_properties: SystemProperties,
}

impl DemoDocument {
    /// A fresh document for `round` with a new random id. The round becomes the counter.
    pub fn new(round: i64, partition_key: &PartitionKey, timestamp: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            pk: partition_key.value().to_string(),
            counter: round,
            timestamp: timestamp.into(),
            system_properties: SystemProperties::default(),
        }
    }
}

/// One value of a multi-value vertex property.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct GraphVertexProperty {
    pub id: String,
    #[serde(rename = "_value")]
    pub value: String,
}

impl GraphVertexProperty {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            value: value.into(),
        }
    }
}

/// A vertex stored in the Gremlin document shape.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct GraphVertex {
    pub label: String,
    pub id: String,
    pub pk: String,
    pub counter: Vec<GraphVertexProperty>,
    pub timestamp: Vec<GraphVertexProperty>,
    pub property01: Vec<GraphVertexProperty>,

    #[serde(flatten)]
    pub system_properties: SystemProperties,
}

impl GraphVertex {
    pub fn new(round: i64, partition_key: &PartitionKey, timestamp: impl Into<String>) -> Self {
        Self {
            label: VERTEX_LABEL.to_string(),
            id: Uuid::new_v4().to_string(),
            pk: partition_key.value().to_string(),
            counter: vec![GraphVertexProperty::new(round.to_string())],
            timestamp: vec![GraphVertexProperty::new(timestamp)],
            property01: vec![GraphVertexProperty::new(format!("round-{}", round))],
            system_properties: SystemProperties::default(),
        }
    }

    pub fn reference(&self) -> VertexRef {
        VertexRef {
            id: self.id.clone(),
            label: self.label.clone(),
            pk: self.pk.clone(),
        }
    }
}

/// The identity of a vertex, enough to attach edges to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexRef {
    pub id: String,
    pub label: String,
    pub pk: String,
}

/// An edge stored in the Gremlin document shape, in the partition of its source vertex.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct GraphEdge {
    pub label: String,
    pub id: String,
    pub pk: String,

    #[serde(rename = "_isEdge")]
    pub is_edge: bool,

    #[serde(rename = "_sink")]
    pub sink: String,

    #[serde(rename = "_sinkLabel")]
    pub sink_label: String,

    #[serde(rename = "_sinkPartition")]
    pub sink_partition: String,

    #[serde(rename = "_vertexId")]
    pub vertex_id: String,

    #[serde(rename = "_vertexLabel")]
    pub vertex_label: String,

    #[serde(flatten)]
    pub system_properties: SystemProperties,
}

impl GraphEdge {
    pub fn between(source: &VertexRef, sink: &VertexRef) -> Self {
        Self {
            label: EDGE_LABEL.to_string(),
            id: Uuid::new_v4().to_string(),
            pk: source.pk.clone(),
            is_edge: true,
            sink: sink.id.clone(),
            sink_label: sink.label.clone(),
            sink_partition: sink.pk.clone(),
            vertex_id: source.id.clone(),
            vertex_label: source.label.clone(),
            system_properties: SystemProperties::default(),
        }
    }
}

/// A compact, printable view of a document.
pub trait Snapshot {
    fn snapshot(&self) -> DocumentSnapshot;
}

fn with_system_fields(mut snapshot: DocumentSnapshot, system: &SystemProperties) -> DocumentSnapshot {
    if let Some(ts) = system.last_modified {
        snapshot = snapshot.with_field("_ts", ts);
    }
    if let Some(etag) = &system.etag {
        snapshot = snapshot.with_field("_etag", etag);
    }
    snapshot
}

impl Snapshot for DemoDocument {
    fn snapshot(&self) -> DocumentSnapshot {
        let snapshot = DocumentSnapshot::new(&self.id, &self.pk).with_field("counter", self.counter);
        with_system_fields(snapshot, &self.system_properties)
    }
}

impl Snapshot for GraphVertex {
    fn snapshot(&self) -> DocumentSnapshot {
        let mut snapshot = DocumentSnapshot::new(&self.id, &self.pk).with_field("label", &self.label);
        if let Some(counter) = self.counter.first() {
            snapshot = snapshot.with_field("counter", &counter.value);
        }
        with_system_fields(snapshot, &self.system_properties)
    }
}

impl Snapshot for GraphEdge {
    fn snapshot(&self) -> DocumentSnapshot {
        let snapshot = DocumentSnapshot::new(&self.id, &self.pk)
            .with_field("label", &self.label)
            .with_field("_vertexId", &self.vertex_id)
            .with_field("_sink", &self.sink);
        with_system_fields(snapshot, &self.system_properties)
    }
}

/// Per-response metadata reported by the service.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResponseMetadata {
    /// Request units charged (`x-ms-request-charge`).
    pub request_charge: f64,

    /// Correlation id (`x-ms-activity-id`).
    pub activity_id: Option<String>,
}

impl ResponseMetadata {
    pub(crate) fn new(request_charge: Option<f64>, activity_id: Option<&str>) -> Self {
        Self {
            request_charge: request_charge.unwrap_or_default(),
            activity_id: activity_id.map(str::to_string),
        }
    }

    /// Folds another response into this one, summing charges and keeping the latest id.
    pub fn accumulate(&mut self, other: &ResponseMetadata) {
        self.request_charge += other.request_charge;
        if other.activity_id.is_some() {
            self.activity_id = other.activity_id.clone();
        }
    }
}

/// A single document plus response metadata.
#[derive(Clone, Debug)]
pub struct ItemResponse<T> {
    pub item: T,
    pub metadata: ResponseMetadata,
}

/// One page of a feed (query or read-many) result.
#[derive(Clone, Debug)]
pub struct FeedPage<T> {
    items: Vec<T>,
    continuation: Option<String>,
    metadata: ResponseMetadata,
}

impl<T> FeedPage<T> {
    pub fn new(items: Vec<T>, continuation: Option<String>, metadata: ResponseMetadata) -> Self {
        Self {
            items,
            continuation,
            metadata,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn continuation(&self) -> Option<&str> {
        self.continuation.as_deref()
    }

    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }
}
