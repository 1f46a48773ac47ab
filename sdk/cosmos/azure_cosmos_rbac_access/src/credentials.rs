// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! Turns settings into an authenticated session description.
//!
//! Resolution only validates settings and builds credentials. No token is requested until
//! the first store request is signed.

use std::sync::Arc;
use std::time::Duration;

use azure_core::credentials::TokenCredential;
use azure_core::http::ClientOptions;
use azure_data_cosmos::{regions::Region, CosmosAccountEndpoint, CosmosAccountReference};
use azure_identity::{
    ClientSecretCredential, ClientSecretCredentialOptions, ManagedIdentityCredential,
    ManagedIdentityCredentialOptions, UserAssignedId,
};
use tracing::{info, warn};
use url::Url;

use crate::config::{AuthMode, Settings};
use crate::ConfigurationError;

/// Everything a [`CosmosClient`](crate::CosmosClient) needs to talk to the account.
#[derive(Debug, Clone)]
pub struct SessionDescriptor {
    mode: AuthMode,
    endpoint: Url,
    account: CosmosAccountReference,
    region: Region,
    application_name: String,
    request_timeout: Duration,
}

impl SessionDescriptor {
    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The endpoint together with the credential of the selected mode.
    pub fn account(&self) -> &CosmosAccountReference {
        &self.account
    }

    /// Region the client routes to first.
    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    /// End-to-end budget of each operation.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Whether the session may create the database. Only key authentication holds the
    /// management permissions for it; the RBAC modes expect it to exist.
    pub fn provisions_database(&self) -> bool {
        self.mode == AuthMode::KeyAuth
    }
}

/// Builds [`SessionDescriptor`]s from [`Settings`].
#[derive(Debug, Clone, Default)]
pub struct CredentialResolver {
    client_options: ClientOptions,
}

impl CredentialResolver {
    /// `client_options` configure the token requests of the RBAC modes.
    pub fn new(client_options: ClientOptions) -> Self {
        Self { client_options }
    }

    /// Maps the configured mode name onto a mode. Unknown names select managed identity.
    pub fn select_mode(configured: &str) -> AuthMode {
        match configured.parse::<AuthMode>() {
            Ok(mode) => mode,
            Err(_) => {
                let selected = AuthMode::ManagedIdentity;
                warn!(
                    configured,
                    %selected,
                    "unrecognized authentication mode, falling back to managed identity"
                );
                selected
            }
        }
    }

    /// Validates the settings required by `mode` and builds its credential.
    pub fn resolve(
        &self,
        mode: AuthMode,
        settings: &Settings,
    ) -> Result<SessionDescriptor, ConfigurationError> {
        let endpoint = parse_endpoint(&settings.endpoint)?;
        let account_endpoint = CosmosAccountEndpoint::from(endpoint.clone());

        let account = match mode {
            AuthMode::KeyAuth => {
                let key = settings
                    .account_key
                    .as_ref()
                    .ok_or(ConfigurationError::MissingSetting("cosmosdb_accountkey"))?;
                azure_core::base64::decode(key.secret()).map_err(|e| {
                    ConfigurationError::invalid("cosmosdb_accountkey", "<redacted>", e)
                })?;
                CosmosAccountReference::with_master_key(account_endpoint, key.clone())
            }
            AuthMode::AadApplication => {
                let tenant_id = require("aad_tenant_id", settings.tenant_id.as_ref())?;
                let client_id = require("aad_application_id", settings.application_id.as_ref())?;
                let secret = settings
                    .application_secret
                    .clone()
                    .ok_or(ConfigurationError::MissingSetting("aad_application_secret"))?;
                let credential: Arc<dyn TokenCredential> = ClientSecretCredential::new(
                    tenant_id,
                    client_id.to_string(),
                    secret,
                    Some(ClientSecretCredentialOptions {
                        client_options: self.client_options.clone(),
                    }),
                )
                .map_err(|e| ConfigurationError::invalid("aad_tenant_id", tenant_id, e))?;
                CosmosAccountReference::with_credential(account_endpoint, credential)
            }
            AuthMode::ManagedIdentity => {
                let tenant_id = require("aad_tenant_id", settings.tenant_id.as_ref())?;
                info!(
                    tenant_id,
                    client_id = settings
                        .managed_identity_client_id
                        .as_deref()
                        .unwrap_or("system-assigned"),
                    "using managed identity"
                );
                let credential: Arc<dyn TokenCredential> =
                    ManagedIdentityCredential::new(Some(ManagedIdentityCredentialOptions {
                        user_assigned_id: settings
                            .managed_identity_client_id
                            .clone()
                            .map(UserAssignedId::ClientId),
                        client_options: self.client_options.clone(),
                    }))
                    .map_err(|e| {
                        ConfigurationError::invalid(
                            "aad_managed_user_id",
                            settings
                                .managed_identity_client_id
                                .as_deref()
                                .unwrap_or_default(),
                            e,
                        )
                    })?;
                CosmosAccountReference::with_credential(account_endpoint, credential)
            }
        };

        Ok(SessionDescriptor {
            mode,
            endpoint,
            account,
            region: Region::from(settings.region.clone()),
            application_name: settings.application_name(mode),
            request_timeout: settings.request_timeout,
        })
    }
}

fn require<'a>(key: &'static str, value: Option<&'a String>) -> Result<&'a str, ConfigurationError> {
    value
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigurationError::MissingSetting(key))
}

fn parse_endpoint(value: &str) -> Result<Url, ConfigurationError> {
    let url = Url::parse(value).map_err(|e| ConfigurationError::invalid("cosmosdb_uri", value, e))?;
    if !matches!(url.scheme(), "https" | "http") || url.cannot_be_a_base() {
        return Err(ConfigurationError::invalid(
            "cosmosdb_uri",
            value,
            "expected an http(s) account endpoint",
        ));
    }
    Ok(url)
}
