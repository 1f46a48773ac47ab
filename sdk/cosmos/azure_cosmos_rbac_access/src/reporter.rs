// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! One human-readable line per operation.
//!
//! ```text
//! 2024-10-01 08:15:02.123456, round 00000001, CreateItem,   Consumed:0007.05 RUs, Elapsed:12 ms, ActivityId:6f3c..., {id: ..., pk: KeyAuth, counter: 1, _ts: 1727770502, _etag: "..."}
//! 2024-10-01 08:15:03.125001, round 00000001, ReadItem,     FAILED, Consumed:0001.24 RUs, Elapsed:3 ms, ActivityId:0b7e..., Error: resource not found (status 404, ...)
//! ```
//!
//! The format is meant for people, not for parsing.

use std::fmt;
use std::io::{self, Write};
use std::time::Duration;

use time::{format_description::BorrowedFormatItem, macros::format_description, OffsetDateTime};

use crate::models::ResponseMetadata;
use crate::StoreError;

const TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6]");

/// UTC timestamp with microsecond precision, as used in report lines and documents.
pub fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(TIMESTAMP).unwrap_or_else(|_| at.to_string())
}

/// The key fields of a document.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSnapshot {
    id: String,
    pk: String,
    fields: Vec<(&'static str, String)>,
}

impl DocumentSnapshot {
    pub fn new(id: impl Into<String>, pk: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pk: pk.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: &'static str, value: impl fmt::Display) -> Self {
        self.fields.push((name, value.to_string()));
        self
    }
}

impl fmt::Display for DocumentSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{id: {}, pk: {}", self.id, self.pk)?;
        for (name, value) in &self.fields {
            write!(f, ", {}: {}", name, value)?;
        }
        f.write_str("}")
    }
}

/// The operations the workloads perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateItem,
    UpsertItem,
    ReadItem,
    ReadMany,
    QueryItem,
    QueryText,
    DeleteItem,
    CreateVertex,
    CreateEdge,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateItem => "CreateItem",
            Operation::UpsertItem => "UpsertItem",
            Operation::ReadItem => "ReadItem",
            Operation::ReadMany => "ReadMany",
            Operation::QueryItem => "QueryItem",
            Operation::QueryText => "QueryText",
            Operation::DeleteItem => "DeleteItem",
            Operation::CreateVertex => "CreateVertex",
            Operation::CreateEdge => "CreateEdge",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of one operation, success or failure.
#[derive(Clone, Debug)]
pub struct OperationOutcome {
    pub round: i64,
    pub operation: Operation,
    pub elapsed: Duration,
    pub request_charge: f64,
    pub activity_id: Option<String>,

    /// Snapshots of the affected documents, or the error message.
    pub result: Result<Vec<DocumentSnapshot>, String>,
}

impl OperationOutcome {
    pub fn success(
        round: i64,
        operation: Operation,
        elapsed: Duration,
        metadata: &ResponseMetadata,
        documents: Vec<DocumentSnapshot>,
    ) -> Self {
        Self {
            round,
            operation,
            elapsed,
            request_charge: metadata.request_charge,
            activity_id: metadata.activity_id.clone(),
            result: Ok(documents),
        }
    }

    pub fn failure(round: i64, operation: Operation, elapsed: Duration, error: &StoreError) -> Self {
        Self {
            round,
            operation,
            elapsed,
            request_charge: error.request_charge(),
            activity_id: error.activity_id().map(str::to_string),
            result: Err(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn documents(&self) -> &[DocumentSnapshot] {
        match &self.result {
            Ok(documents) => documents,
            Err(_) => &[],
        }
    }
}

/// Renders an outcome as it appears in the output, stamped with `at`.
pub fn format_outcome(at: OffsetDateTime, outcome: &OperationOutcome) -> String {
    let operation = format!("{},", outcome.operation);
    let head = format!(
        "{}, round {:08}, {:<14}",
        format_timestamp(at),
        outcome.round,
        operation
    );
    let costs = format!(
        "Consumed:{:07.2} RUs, Elapsed:{} ms, ActivityId:{}",
        outcome.request_charge,
        outcome.elapsed.as_millis(),
        outcome.activity_id.as_deref().unwrap_or("-")
    );

    match &outcome.result {
        Ok(documents) => {
            let documents = match documents.as_slice() {
                [single] => single.to_string(),
                many => format!(
                    "[{}]",
                    many.iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            };
            format!("{}{}, {}", head, costs, documents)
        }
        Err(message) => format!("{}FAILED, {}, Error: {}", head, costs, message),
    }
}

/// Writes report lines to a sink, stdout in the binary.
pub struct OutcomeReporter {
    sink: Box<dyn Write + Send>,
}

impl OutcomeReporter {
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            sink: Box::new(sink),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn report(&mut self, outcome: &OperationOutcome) -> io::Result<()> {
        let line = format_outcome(OffsetDateTime::now_utc(), outcome);
        self.write_line(&line)
    }

    /// Writes a timestamped free-form line, such as the start banner.
    pub fn note(&mut self, message: &str) -> io::Result<()> {
        let line = format!("{}, {}", format_timestamp(OffsetDateTime::now_utc()), message);
        self.write_line(&line)
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.sink, "{}", line)?;
        self.sink.flush()
    }
}

impl fmt::Debug for OutcomeReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutcomeReporter").finish_non_exhaustive()
    }
}
