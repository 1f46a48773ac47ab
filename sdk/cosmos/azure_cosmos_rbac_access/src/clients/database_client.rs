// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

use std::time::Duration;

use crate::clients::ContainerClient;
use crate::models::{DatabaseProperties, ItemResponse, ResponseMetadata};
use crate::StoreResult;

/// A client for working with a specific database in a Cosmos DB account.
///
/// You can get a `DatabaseClient` by calling [`CosmosClient::database_client()`](crate::CosmosClient::database_client()).
pub struct DatabaseClient {
    inner: azure_data_cosmos::clients::DatabaseClient,
    request_timeout: Duration,
}

impl DatabaseClient {
    pub(crate) fn new(
        inner: azure_data_cosmos::clients::DatabaseClient,
        request_timeout: Duration,
    ) -> Self {
        Self {
            inner,
            request_timeout,
        }
    }

    /// Reads the properties of the database. Fails with `NotFound` if it does not exist.
    pub async fn read(&self) -> StoreResult<ItemResponse<DatabaseProperties>> {
        let response = self.inner.read(None).await?;
        let metadata =
            ResponseMetadata::new(response.request_charge(), response.diagnostics().activity_id());
        Ok(ItemResponse {
            item: response.into_body().json()?,
            metadata,
        })
    }

    /// Gets a [`ContainerClient`] for the container with the specified name.
    ///
    /// The container's metadata is resolved here, so this fails with `NotFound` if the
    /// container does not exist, or with a service error if the identity may not read it.
    pub async fn container_client(&self, name: &str) -> StoreResult<ContainerClient> {
        let inner = self.inner.container_client(name).await?;
        Ok(ContainerClient::new(inner, self.request_timeout))
    }

    /// Returns the identifier of the Cosmos database.
    pub fn id(&self) -> &str {
        self.inner.id()
    }
}

impl std::fmt::Debug for DatabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseClient")
            .field("id", &self.id())
            .finish_non_exhaustive()
    }
}
