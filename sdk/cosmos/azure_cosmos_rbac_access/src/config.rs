// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! Settings loaded once from `appSettings.json`.
//!
//! The file is a flat JSON object. Every value may be written as a string, which is what
//! most existing settings files do; numeric settings also accept JSON numbers. Empty
//! strings are treated as absent.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::ConfigurationError;

pub use azure_core::credentials::Secret;

/// Default settings file, resolved against the working directory.
pub const SETTINGS_FILE: &str = "appSettings.json";

pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_EDGES_PER_ROUND: u64 = 500_000;
pub const DEFAULT_EDGE_INTERVAL: Duration = Duration::from_millis(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Region the client prefers when the account is replicated.
pub const DEFAULT_REGION: &str = "East US";

/// How the client authenticates against the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMode {
    /// Account primary key (`KeyAuth`).
    KeyAuth,

    /// Entra ID application with a client secret (`RBAC_AADauth`).
    AadApplication,

    /// Managed identity of the hosting platform (`RBAC_MIauth`).
    ManagedIdentity,
}

impl AuthMode {
    /// The name used in settings files. It is also the partition key of every document
    /// written in this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::KeyAuth => "KeyAuth",
            AuthMode::AadApplication => "RBAC_AADauth",
            AuthMode::ManagedIdentity => "RBAC_MIauth",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "KeyAuth" => Ok(AuthMode::KeyAuth),
            "RBAC_AADauth" => Ok(AuthMode::AadApplication),
            "RBAC_MIauth" => Ok(AuthMode::ManagedIdentity),
            _ => Err(ConfigurationError::invalid(
                "RBACTestMode",
                s,
                "expected KeyAuth, RBAC_AADauth or RBAC_MIauth",
            )),
        }
    }
}

/// Shape of the documents written by the workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataModel {
    /// Plain documents (`DocumentDB`).
    #[default]
    Document,

    /// Gremlin-style vertices and edges (`Graph`).
    Graph,
}

impl FromStr for DataModel {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("DocumentDB") {
            Ok(DataModel::Document)
        } else if s.eq_ignore_ascii_case("Graph") {
            Ok(DataModel::Graph)
        } else {
            Err(ConfigurationError::invalid(
                "cosmosdb_datamodel",
                s,
                "expected DocumentDB or Graph",
            ))
        }
    }
}

/// Immutable settings for one process run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub application_name: Option<String>,

    /// The mode as written in the file. [`CredentialResolver::select_mode`](crate::CredentialResolver::select_mode)
    /// decides which mode is actually used.
    pub auth_mode: String,
    pub tenant_id: Option<String>,
    pub managed_identity_client_id: Option<String>,
    pub application_id: Option<String>,
    pub application_secret: Option<Secret>,
    pub endpoint: String,

    /// Preferred region, in either display (`East US`) or normalized (`eastus`) form.
    pub region: String,
    pub account_key: Option<Secret>,
    pub database: String,
    pub container: String,
    pub data_model: DataModel,
    pub request_interval: Duration,
    pub graph_edges_per_round: u64,
    pub graph_edge_interval: Duration,

    /// End-to-end budget of a single operation, throttling retries included.
    pub request_timeout: Duration,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberSetting {
    Number(u64),
    Text(String),
}

#[derive(Deserialize, Default)]
struct RawSettings {
    application_name: Option<String>,
    aad_tenant_id: Option<String>,
    aad_managed_user_id: Option<String>,
    aad_application_id: Option<String>,
    aad_application_secret: Option<String>,
    #[serde(rename = "RBACTestMode")]
    rbac_test_mode: Option<String>,
    cosmosdb_uri: Option<String>,
    cosmosdb_region: Option<String>,
    cosmosdb_accountkey: Option<String>,
    cosmosdb_dbname: Option<String>,
    cosmosdb_containername: Option<String>,
    cosmosdb_datamodel: Option<String>,
    request_interval: Option<NumberSetting>,
    graph_edges_per_round: Option<NumberSetting>,
    graph_edge_interval: Option<NumberSetting>,
    request_timeout_secs: Option<NumberSetting>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(key: &'static str, value: Option<String>) -> Result<String, ConfigurationError> {
    non_empty(value).ok_or(ConfigurationError::MissingSetting(key))
}

fn number(key: &'static str, value: Option<NumberSetting>) -> Result<Option<u64>, ConfigurationError> {
    match value {
        None => Ok(None),
        Some(NumberSetting::Number(n)) => Ok(Some(n)),
        Some(NumberSetting::Text(text)) => match non_empty(Some(text)) {
            None => Ok(None),
            Some(text) => text
                .parse()
                .map(Some)
                .map_err(|e| ConfigurationError::invalid(key, text, e)),
        },
    }
}

impl Settings {
    /// Reads and validates a settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parses and validates settings from JSON text.
    ///
    /// Credential material is not checked here, since which fields are required depends
    /// on the authentication mode; see [`CredentialResolver`](crate::CredentialResolver).
    pub fn from_json(text: &str) -> Result<Self, ConfigurationError> {
        let raw: RawSettings = serde_json::from_str(text)?;

        let data_model = match non_empty(raw.cosmosdb_datamodel) {
            Some(model) => model.parse()?,
            None => DataModel::default(),
        };

        Ok(Settings {
            application_name: non_empty(raw.application_name),
            auth_mode: required("RBACTestMode", raw.rbac_test_mode)?,
            tenant_id: non_empty(raw.aad_tenant_id),
            managed_identity_client_id: non_empty(raw.aad_managed_user_id),
            application_id: non_empty(raw.aad_application_id),
            application_secret: non_empty(raw.aad_application_secret).map(Secret::new),
            endpoint: required("cosmosdb_uri", raw.cosmosdb_uri)?,
            region: non_empty(raw.cosmosdb_region).unwrap_or_else(|| DEFAULT_REGION.to_string()),
            account_key: non_empty(raw.cosmosdb_accountkey).map(Secret::new),
            database: required("cosmosdb_dbname", raw.cosmosdb_dbname)?,
            container: required("cosmosdb_containername", raw.cosmosdb_containername)?,
            data_model,
            request_interval: number("request_interval", raw.request_interval)?
                .map_or(DEFAULT_REQUEST_INTERVAL, Duration::from_millis),
            graph_edges_per_round: number("graph_edges_per_round", raw.graph_edges_per_round)?
                .unwrap_or(DEFAULT_EDGES_PER_ROUND),
            graph_edge_interval: number("graph_edge_interval", raw.graph_edge_interval)?
                .map_or(DEFAULT_EDGE_INTERVAL, Duration::from_millis),
            request_timeout: number("request_timeout_secs", raw.request_timeout_secs)?
                .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs),
        })
    }

    /// The application name sent with every request, `test_with_{mode}` unless configured.
    pub fn application_name(&self, mode: AuthMode) -> String {
        self.application_name
            .clone()
            .unwrap_or_else(|| format!("test_with_{}", mode))
    }
}
