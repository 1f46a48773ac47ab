// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! The repeating workloads.
//!
//! A round of the document workload walks one fresh document through every operation:
//!
//! ```text
//! Create -> Upsert -> Read -> ReadMany -> QueryItem -> QueryText -> Delete -> (next round)
//! ```
//!
//! A round of the graph workload creates one vertex and then a batch of edges on it.
//! Every step runs whether or not the previous one succeeded; failures are reported and the
//! loop moves on. The round counter is the only state carried between rounds.

mod edges;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use time::OffsetDateTime;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::clients::{ContainerClientMethods, FeedPager};
use crate::config::{AuthMode, DataModel, Settings};
use crate::models::{
    DemoDocument, GraphEdge, GraphVertex, ResponseMetadata, Snapshot, UPSERT_SENTINEL,
};
use crate::reporter::{format_timestamp, DocumentSnapshot, Operation, OperationOutcome};
use crate::{ItemQuery, OutcomeReporter, PartitionKey, Query, StoreResult};

pub use edges::EdgeBatch;

/// Parameters of a workload run.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkloadOptions {
    pub data_model: DataModel,

    /// Partition key of everything written, the name of the authentication mode.
    pub partition_key: PartitionKey,

    /// Pause after every document operation and after each vertex.
    pub request_interval: Duration,
    pub graph_edges_per_round: u64,
    pub graph_edge_interval: Duration,
}

impl WorkloadOptions {
    pub fn from_settings(settings: &Settings, mode: AuthMode) -> Self {
        Self {
            data_model: settings.data_model,
            partition_key: PartitionKey::from(mode),
            request_interval: settings.request_interval,
            graph_edges_per_round: settings.graph_edges_per_round,
            graph_edge_interval: settings.graph_edge_interval,
        }
    }
}

/// Asks a running workload to stop before its next operation.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    triggered: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Completes once the signal has been triggered.
    pub async fn triggered(&self) {
        let notified = self.notify.notified();
        if self.is_triggered() {
            return;
        }
        notified.await;
    }
}

/// The steps of a document round, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentStep {
    Create,
    Upsert,
    Read,
    ReadMany,
    QueryByPredicate,
    QueryByText,
    Delete,
}

impl DocumentStep {
    pub const FIRST: DocumentStep = DocumentStep::Create;

    /// The step that follows this one within the round, `None` after the last.
    pub fn next(self) -> Option<DocumentStep> {
        match self {
            DocumentStep::Create => Some(DocumentStep::Upsert),
            DocumentStep::Upsert => Some(DocumentStep::Read),
            DocumentStep::Read => Some(DocumentStep::ReadMany),
            DocumentStep::ReadMany => Some(DocumentStep::QueryByPredicate),
            DocumentStep::QueryByPredicate => Some(DocumentStep::QueryByText),
            DocumentStep::QueryByText => Some(DocumentStep::Delete),
            DocumentStep::Delete => None,
        }
    }

    pub fn operation(self) -> Operation {
        match self {
            DocumentStep::Create => Operation::CreateItem,
            DocumentStep::Upsert => Operation::UpsertItem,
            DocumentStep::Read => Operation::ReadItem,
            DocumentStep::ReadMany => Operation::ReadMany,
            DocumentStep::QueryByPredicate => Operation::QueryItem,
            DocumentStep::QueryByText => Operation::QueryText,
            DocumentStep::Delete => Operation::DeleteItem,
        }
    }
}

type StepResult = StoreResult<(ResponseMetadata, Vec<DocumentSnapshot>)>;

/// Runs rounds against a container and reports every operation.
pub struct WorkloadDriver<C> {
    container: C,
    options: WorkloadOptions,
    reporter: OutcomeReporter,
    shutdown: ShutdownSignal,
    round: i64,
}

impl<C: ContainerClientMethods> WorkloadDriver<C> {
    pub fn new(
        container: C,
        options: WorkloadOptions,
        reporter: OutcomeReporter,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            container,
            options,
            reporter,
            shutdown,
            round: 1,
        }
    }

    /// The round that runs next.
    pub fn round(&self) -> i64 {
        self.round
    }

    pub fn container(&self) -> &C {
        &self.container
    }

    /// Runs rounds until shutdown is requested.
    pub async fn run(&mut self) {
        while self.run_round().await {}
        debug!(round = self.round, "workload stopped");
    }

    /// Runs at most `rounds` rounds. Returns how many completed.
    pub async fn run_rounds(&mut self, rounds: u64) -> u64 {
        let mut completed = 0;
        while completed < rounds && self.run_round().await {
            completed += 1;
        }
        completed
    }

    /// Runs the current round. Returns `false` if shutdown cut it short.
    async fn run_round(&mut self) -> bool {
        if self.shutdown.is_triggered() {
            return false;
        }
        let completed = match self.options.data_model {
            DataModel::Document => self.document_round().await,
            DataModel::Graph => self.graph_round().await,
        };
        if completed {
            self.round += 1;
        }
        completed
    }

    async fn document_round(&mut self) -> bool {
        let mut document = DemoDocument::new(
            self.round,
            &self.options.partition_key,
            format_timestamp(OffsetDateTime::now_utc()),
        );

        let mut step = Some(DocumentStep::FIRST);
        while let Some(current) = step {
            if self.shutdown.is_triggered() {
                return false;
            }
            let started = Instant::now();
            let result = self.document_step(current, &mut document).await;
            self.record(current.operation(), started.elapsed(), result);
            self.pause(self.options.request_interval).await;
            step = current.next();
        }
        true
    }

    async fn document_step(&self, step: DocumentStep, document: &mut DemoDocument) -> StepResult {
        let partition_key = &self.options.partition_key;
        match step {
            DocumentStep::Create => self
                .container
                .create_item(partition_key, &*document)
                .await
                .map(|r| (r.metadata, vec![r.item.snapshot()])),
            DocumentStep::Upsert => {
                document.counter = UPSERT_SENTINEL;
                self.container
                    .upsert_item(partition_key, &*document)
                    .await
                    .map(|r| (r.metadata, vec![r.item.snapshot()]))
            }
            DocumentStep::Read => self
                .container
                .read_item::<DemoDocument>(partition_key, &document.id)
                .await
                .map(|r| (r.metadata, vec![r.item.snapshot()])),
            DocumentStep::ReadMany => self
                .container
                .read_many_items::<DemoDocument>(&[(document.id.clone(), partition_key.clone())])
                .await
                .map(|page| {
                    let snapshots = page.items().iter().map(Snapshot::snapshot).collect();
                    (page.metadata().clone(), snapshots)
                }),
            DocumentStep::QueryByPredicate => {
                self.query(ItemQuery::IdEquals(document.id.clone())).await
            }
            DocumentStep::QueryByText => {
                let query = Query::from("SELECT * FROM c WHERE c.id = @id AND c.pk = @pk")
                    .with_parameter("@id", &document.id)
                    .and_then(|q| q.with_parameter("@pk", partition_key.value()))?;
                self.query(query).await
            }
            DocumentStep::Delete => self
                .container
                .delete_item(partition_key, &document.id)
                .await
                .map(|metadata| {
                    (
                        metadata,
                        vec![DocumentSnapshot::new(&document.id, &document.pk)],
                    )
                }),
        }
    }

    /// Drains every page of a query in the workload partition.
    async fn query(&self, query: impl Into<ItemQuery>) -> StepResult {
        let mut pages: FeedPager<DemoDocument> = self
            .container
            .query_items(query, &self.options.partition_key);
        let mut metadata = ResponseMetadata::default();
        let mut snapshots = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page?;
            metadata.accumulate(page.metadata());
            snapshots.extend(page.items().iter().map(Snapshot::snapshot));
        }
        Ok((metadata, snapshots))
    }

    async fn graph_round(&mut self) -> bool {
        if self.shutdown.is_triggered() {
            return false;
        }

        let partition_key = self.options.partition_key.clone();
        let vertex = GraphVertex::new(
            self.round,
            &partition_key,
            format_timestamp(OffsetDateTime::now_utc()),
        );
        let started = Instant::now();
        let created = self
            .container
            .create_item(&partition_key, &vertex)
            .await
            .map(|r| (r.item.reference(), r.metadata, r.item.snapshot()));
        let (vertex, result) = match created {
            Ok((reference, metadata, snapshot)) => (Some(reference), Ok((metadata, vec![snapshot]))),
            Err(error) => (None, Err(error)),
        };
        self.record(Operation::CreateVertex, started.elapsed(), result);
        self.pause(self.options.request_interval).await;

        // Without a vertex there is nothing to attach edges to.
        let Some(vertex) = vertex else {
            return true;
        };

        let mut edges = EdgeBatch::new(self.options.graph_edges_per_round);
        for _ in edges.by_ref() {
            if self.shutdown.is_triggered() {
                return false;
            }
            let edge = GraphEdge::between(&vertex, &vertex);
            let started = Instant::now();
            let result = self
                .container
                .create_item(&partition_key, &edge)
                .await
                .map(|r| (r.metadata, vec![r.item.snapshot()]));
            let failed = result.is_err();
            self.record(Operation::CreateEdge, started.elapsed(), result);
            if failed {
                break;
            }
            self.pause(self.options.graph_edge_interval).await;
        }
        debug!(
            round = self.round,
            created = edges.produced(),
            requested = edges.total(),
            "edge batch finished"
        );
        true
    }

    fn record(&mut self, operation: Operation, elapsed: Duration, result: StepResult) {
        let outcome = match result {
            Ok((metadata, documents)) => {
                OperationOutcome::success(self.round, operation, elapsed, &metadata, documents)
            }
            Err(error) => {
                warn!(
                    round = self.round,
                    %operation,
                    status = error.diagnostics().map(|d| d.status),
                    retry_after = ?error.diagnostics().and_then(|d| d.retry_after),
                    activity_id = error.activity_id(),
                    %error,
                    "operation failed"
                );
                OperationOutcome::failure(self.round, operation, elapsed, &error)
            }
        };
        if let Err(error) = self.reporter.report(&outcome) {
            warn!(%error, "unable to write report line");
        }
    }

    /// Waits for `interval`, or less if shutdown is requested meanwhile.
    async fn pause(&self, interval: Duration) {
        if interval.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = self.shutdown.triggered() => {}
        }
    }
}
