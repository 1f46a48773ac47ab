// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

use std::time::Duration;

use azure_data_cosmos::RoutingStrategy;
use tracing::info;

use crate::clients::DatabaseClient;
use crate::credentials::SessionDescriptor;
use crate::{StoreError, StoreResult};

/// Client for an Azure Cosmos DB account.
#[derive(Debug, Clone)]
pub struct CosmosClient {
    inner: azure_data_cosmos::CosmosClient,
    request_timeout: Duration,
}

impl CosmosClient {
    /// Connects to the account described by `session`.
    ///
    /// The application name is appended to the user agent of every request, and requests
    /// are routed to the session's region first.
    pub async fn connect(session: &SessionDescriptor) -> StoreResult<Self> {
        let inner = azure_data_cosmos::CosmosClient::builder()
            .with_user_agent_suffix(session.application_name())
            .build(
                session.account().clone(),
                RoutingStrategy::ProximityTo(session.region().clone()),
            )
            .await?;
        Ok(Self {
            inner,
            request_timeout: session.request_timeout(),
        })
    }

    /// Gets a [`DatabaseClient`] for the database with the specified id.
    pub fn database_client(&self, id: &str) -> DatabaseClient {
        DatabaseClient::new(self.inner.database_client(id), self.request_timeout)
    }

    /// Creates the database unless it already exists.
    ///
    /// Returns `true` when the database was created by this call.
    pub async fn create_database_if_not_exists(&self, id: &str) -> StoreResult<bool> {
        match self.inner.create_database(id, None).await {
            Ok(response) => {
                info!(
                    database = id,
                    request_charge = response.request_charge(),
                    "created database"
                );
                Ok(true)
            }
            Err(error) => match StoreError::from(error) {
                StoreError::Conflict(_) => Ok(false),
                error => Err(error),
            },
        }
    }
}
