// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

use std::time::Duration;

use azure_data_cosmos::{
    ContentResponseOnWrite, EndToEndOperationLatencyPolicy, ItemReadOptions, ItemWriteOptions,
    OperationOptions, QueryOptions,
};
use futures::{stream::BoxStream, StreamExt, TryStreamExt};
use serde::{de::DeserializeOwned, Serialize};

use crate::models::{ContainerProperties, FeedPage, ItemResponse, ResponseMetadata};
use crate::{ItemQuery, PartitionKey, Query, StoreError, StoreResult};

/// Pages of query results, fetched lazily as the stream is polled.
pub type FeedPager<T> = BoxStream<'static, StoreResult<FeedPage<T>>>;

/// Defines the methods provided by a [`ContainerClient`]
///
/// This trait is intended to allow you to mock out the `ContainerClient` when testing your application.
/// Rather than depending on `ContainerClient`, you can depend on a generic parameter constrained by this trait, or an `impl ContainerClientMethods` type.
pub trait ContainerClientMethods {
    /// Reads the properties of the container. Fails with `NotFound` if it does not exist.
    #[allow(async_fn_in_trait)] // REASON: See https://github.com/Azure/azure-sdk-for-rust/issues/1796 for detailed justification
    async fn read(&self) -> StoreResult<ItemResponse<ContainerProperties>>;

    /// Creates a new item. Fails with `Conflict` if an item with the same id exists in the partition.
    ///
    /// # Arguments
    /// * `partition_key` - The partition key of the new item.
    /// * `item` - The item to create. Its `pk` property must match `partition_key`.
    #[allow(async_fn_in_trait)] // REASON: See https://github.com/Azure/azure-sdk-for-rust/issues/1796 for detailed justification
    async fn create_item<T: Serialize + DeserializeOwned>(
        &self,
        partition_key: &PartitionKey,
        item: &T,
    ) -> StoreResult<ItemResponse<T>>;

    /// Creates the item, or replaces the item with the same id and partition key.
    #[allow(async_fn_in_trait)] // REASON: See https://github.com/Azure/azure-sdk-for-rust/issues/1796 for detailed justification
    async fn upsert_item<T: Serialize + DeserializeOwned>(
        &self,
        partition_key: &PartitionKey,
        item: &T,
    ) -> StoreResult<ItemResponse<T>>;

    /// Reads a single item. Fails with `NotFound` if it does not exist.
    #[allow(async_fn_in_trait)] // REASON: See https://github.com/Azure/azure-sdk-for-rust/issues/1796 for detailed justification
    async fn read_item<T: DeserializeOwned>(
        &self,
        partition_key: &PartitionKey,
        item_id: &str,
    ) -> StoreResult<ItemResponse<T>>;

    /// Reads several items by id and partition key.
    ///
    /// Items that do not exist are left out of the result, so it may be shorter than `identities`.
    /// The request charges of all underlying requests are summed.
    #[allow(async_fn_in_trait)] // REASON: See https://github.com/Azure/azure-sdk-for-rust/issues/1796 for detailed justification
    async fn read_many_items<T: DeserializeOwned + Send + 'static>(
        &self,
        identities: &[(String, PartitionKey)],
    ) -> StoreResult<FeedPage<T>>;

    /// Queries items within a single partition.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # async fn doc() {
    /// # use azure_cosmos_rbac_access::{clients::{ContainerClient, ContainerClientMethods}, models::DemoDocument, ItemQuery, PartitionKey};
    /// # use futures::StreamExt;
    /// # let container: ContainerClient = panic!("this is a non-running example");
    /// let mut pages = container.query_items::<DemoDocument>(
    ///     ItemQuery::IdEquals("u1".into()),
    ///     &PartitionKey::from("KeyAuth"));
    /// while let Some(page) = pages.next().await {
    ///     println!("{} items", page.unwrap().items().len());
    /// }
    /// # }
    /// ```
    fn query_items<T: DeserializeOwned + Send + 'static>(
        &self,
        query: impl Into<ItemQuery>,
        partition_key: &PartitionKey,
    ) -> FeedPager<T>;

    /// Deletes an item. Fails with `NotFound` if it does not exist.
    #[allow(async_fn_in_trait)] // REASON: See https://github.com/Azure/azure-sdk-for-rust/issues/1796 for detailed justification
    async fn delete_item(
        &self,
        partition_key: &PartitionKey,
        item_id: &str,
    ) -> StoreResult<ResponseMetadata>;
}

/// A client for working with a specific container in a Cosmos DB account.
///
/// Throttled requests are retried and session tokens are tracked by the underlying
/// [`azure_data_cosmos`] client; this type maps its responses onto [`ItemResponse`],
/// [`FeedPage`] and [`StoreError`].
///
/// You can get a `ContainerClient` by calling [`DatabaseClient::container_client()`](crate::clients::DatabaseClient::container_client()).
#[derive(Clone)]
pub struct ContainerClient {
    inner: azure_data_cosmos::clients::ContainerClient,
    request_timeout: Duration,
}

/// `SELECT * FROM c WHERE c.id IN (@id0, @id1, ...)`
fn id_in_query(ids: &[&str]) -> Result<Query, serde_json::Error> {
    let names: Vec<String> = (0..ids.len()).map(|i| format!("@id{}", i)).collect();
    let mut query = Query::from(format!(
        "SELECT * FROM c WHERE c.id IN ({})",
        names.join(", ")
    ));
    for (name, id) in names.into_iter().zip(ids) {
        query = query.with_parameter(name, id)?;
    }
    Ok(query)
}

/// Groups identities by partition, in the order partitions first appear, without duplicate ids.
fn group_by_partition(identities: &[(String, PartitionKey)]) -> Vec<(&PartitionKey, Vec<&str>)> {
    let mut partitions: Vec<(&PartitionKey, Vec<&str>)> = Vec::new();
    for (id, partition_key) in identities {
        match partitions.iter_mut().find(|(pk, _)| *pk == partition_key) {
            Some((_, ids)) if !ids.contains(&id.as_str()) => ids.push(id.as_str()),
            Some(_) => {}
            None => partitions.push((partition_key, vec![id.as_str()])),
        }
    }
    partitions
}

impl ContainerClient {
    pub(crate) fn new(
        inner: azure_data_cosmos::clients::ContainerClient,
        request_timeout: Duration,
    ) -> Self {
        Self {
            inner,
            request_timeout,
        }
    }

    /// Options shared by every operation: the end-to-end timeout, and written documents
    /// echoed back so callers see `_ts` and `_etag`.
    fn operation_options(&self) -> OperationOptions {
        let mut options = OperationOptions::default();
        options.end_to_end_latency_policy =
            Some(EndToEndOperationLatencyPolicy::new(self.request_timeout));
        options.content_response_on_write = Some(ContentResponseOnWrite::Enabled);
        options
    }

    fn write_options(&self) -> ItemWriteOptions {
        ItemWriteOptions::default().with_operation_options(self.operation_options())
    }

    async fn write_item<T: Serialize + DeserializeOwned>(
        &self,
        partition_key: &PartitionKey,
        item: &T,
        upsert: bool,
    ) -> StoreResult<ItemResponse<T>> {
        let response = if upsert {
            self.inner
                .upsert_item(partition_key.to_sdk(), item, Some(self.write_options()))
                .await?
        } else {
            self.inner
                .create_item(partition_key.to_sdk(), item, Some(self.write_options()))
                .await?
        };
        let metadata =
            ResponseMetadata::new(response.request_charge(), response.diagnostics().activity_id());
        Ok(ItemResponse {
            item: response.into_body().json()?,
            metadata,
        })
    }
}

impl ContainerClientMethods for ContainerClient {
    async fn read(&self) -> StoreResult<ItemResponse<ContainerProperties>> {
        let response = self.inner.read(None).await?;
        let metadata =
            ResponseMetadata::new(response.request_charge(), response.diagnostics().activity_id());
        Ok(ItemResponse {
            item: response.into_body().json()?,
            metadata,
        })
    }

    async fn create_item<T: Serialize + DeserializeOwned>(
        &self,
        partition_key: &PartitionKey,
        item: &T,
    ) -> StoreResult<ItemResponse<T>> {
        self.write_item(partition_key, item, false).await
    }

    async fn upsert_item<T: Serialize + DeserializeOwned>(
        &self,
        partition_key: &PartitionKey,
        item: &T,
    ) -> StoreResult<ItemResponse<T>> {
        self.write_item(partition_key, item, true).await
    }

    async fn read_item<T: DeserializeOwned>(
        &self,
        partition_key: &PartitionKey,
        item_id: &str,
    ) -> StoreResult<ItemResponse<T>> {
        let options = ItemReadOptions::default().with_operation_options(self.operation_options());
        let response = self
            .inner
            .read_item::<T>(partition_key.to_sdk(), item_id, Some(options))
            .await?;
        let metadata =
            ResponseMetadata::new(response.request_charge(), response.diagnostics().activity_id());
        Ok(ItemResponse {
            item: response.into_body().json()?,
            metadata,
        })
    }

    async fn read_many_items<T: DeserializeOwned + Send + 'static>(
        &self,
        identities: &[(String, PartitionKey)],
    ) -> StoreResult<FeedPage<T>> {
        let mut items = Vec::new();
        let mut metadata = ResponseMetadata::default();
        for (partition_key, ids) in group_by_partition(identities) {
            let mut pager: FeedPager<T> = self.query_items(id_in_query(&ids)?, partition_key);
            while let Some(page) = pager.next().await {
                let page = page?;
                metadata.accumulate(page.metadata());
                items.extend(page.into_items());
            }
        }
        Ok(FeedPage::new(items, None, metadata))
    }

    fn query_items<T: DeserializeOwned + Send + 'static>(
        &self,
        query: impl Into<ItemQuery>,
        partition_key: &PartitionKey,
    ) -> FeedPager<T> {
        let query: ItemQuery = query.into();
        let options = QueryOptions::default().with_operation_options(self.operation_options());
        let pages = query
            .to_query()
            .map_err(StoreError::from)
            .and_then(|query| query.to_sdk().map_err(StoreError::from))
            .and_then(|query| {
                self.inner
                    .query_items::<T>(query, partition_key.to_sdk(), Some(options))
                    .map_err(StoreError::from)
            });
        match pages {
            Ok(pages) => pages
                .into_pages()
                .map_ok(|page| {
                    let metadata =
                        ResponseMetadata::new(page.request_charge(), page.diagnostics().activity_id());
                    let continuation = page.continuation().map(str::to_string);
                    FeedPage::new(page.into_items(), continuation, metadata)
                })
                .map_err(StoreError::from)
                .boxed(),
            Err(error) => futures::stream::once(async move { Err(error) }).boxed(),
        }
    }

    async fn delete_item(
        &self,
        partition_key: &PartitionKey,
        item_id: &str,
    ) -> StoreResult<ResponseMetadata> {
        let options = ItemWriteOptions::default().with_operation_options(self.operation_options());
        let response = self
            .inner
            .delete_item(partition_key.to_sdk(), item_id, Some(options))
            .await?;
        Ok(ResponseMetadata::new(
            response.request_charge(),
            response.diagnostics().activity_id(),
        ))
    }
}

impl std::fmt::Debug for ContainerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerClient")
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}
