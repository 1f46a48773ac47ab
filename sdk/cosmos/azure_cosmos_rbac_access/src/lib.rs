// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod clients;
pub mod config;
pub mod credentials;
mod error;
pub mod models;
mod partition_key;
pub mod query;
pub mod reporter;
pub mod workload;

#[doc(inline)]
pub use clients::CosmosClient;

pub use config::{AuthMode, DataModel, Secret, Settings};
pub use credentials::{CredentialResolver, SessionDescriptor};
pub use error::*;
pub use partition_key::PartitionKey;
pub use query::{ItemQuery, Query};
pub use reporter::{OperationOutcome, OutcomeReporter};
pub use workload::{ShutdownSignal, WorkloadDriver, WorkloadOptions};
