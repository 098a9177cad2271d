use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    options::{CountOptions, FindOptions},
    Client, Collection,
};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{ProductStore, UpdateOutcome, PRODUCTS_COLLECTION};
use crate::config::MongoConfig;
use crate::error::{StoreError, StoreResult};
use crate::id::ProductId;
use crate::models::{Product, UpdateProductRequest};
use crate::query::{Pagination, ProductFilter, SortMode};

/// MongoDB-backed store. The client and collection handle are created on
/// first use and shared by every request afterwards.
pub struct MongoProductStore {
    config: MongoConfig,
    collection: OnceCell<Collection<Product>>,
}

impl MongoProductStore {
    pub fn new(config: MongoConfig) -> Self {
        MongoProductStore {
            config,
            collection: OnceCell::new(),
        }
    }

    async fn collection(&self) -> StoreResult<&Collection<Product>> {
        self.collection
            .get_or_try_init(|| async {
                let client = Client::with_uri_str(&self.config.uri).await?;
                let database = client.database(&self.config.database_name);
                info!(
                    database = %self.config.database_name,
                    "MongoDB connection established"
                );
                Ok::<_, StoreError>(database.collection::<Product>(PRODUCTS_COLLECTION))
            })
            .await
    }
}

#[async_trait]
impl ProductStore for MongoProductStore {
    async fn count(&self, filter: &ProductFilter) -> StoreResult<u64> {
        let collection = self.collection().await?;
        let count = collection
            .count_documents(filter.to_document(), CountOptions::default())
            .await?;
        Ok(count)
    }

    async fn find_page(
        &self,
        filter: &ProductFilter,
        sort: SortMode,
        pagination: Pagination,
    ) -> StoreResult<Vec<Product>> {
        let collection = self.collection().await?;
        let options = FindOptions::builder()
            .sort(sort.to_document())
            .skip(pagination.skip())
            .limit(i64::try_from(pagination.limit).unwrap_or(i64::MAX))
            .build();

        debug!(?pagination, ?sort, "Fetching product page");
        let cursor = collection.find(filter.to_document(), options).await?;
        let products: Vec<Product> = cursor.try_collect().await?;
        Ok(products)
    }

    async fn insert(&self, mut product: Product) -> StoreResult<Product> {
        let collection = self.collection().await?;
        let result = collection.insert_one(&product, None).await?;
        product.id = Some(ProductId::try_from(result.inserted_id)?);
        Ok(product)
    }

    async fn find_by_id(&self, id: &ProductId) -> StoreResult<Option<Product>> {
        let collection = self.collection().await?;
        let product = collection.find_one(id.lookup_filter(), None).await?;
        Ok(product)
    }

    async fn update_by_id(
        &self,
        id: &ProductId,
        update: &UpdateProductRequest,
    ) -> StoreResult<UpdateOutcome> {
        let collection = self.collection().await?;

        if !update.is_empty() {
            let changed = update.to_changed_filter()?;
            let filter = doc! { "$and": [ id.lookup_filter(), changed ] };
            let set = update.to_set_document(Utc::now())?;
            let result = collection
                .update_one(filter, doc! { "$set": set }, None)
                .await?;
            if result.matched_count > 0 {
                return Ok(UpdateOutcome {
                    matched_count: result.matched_count,
                    modified_count: result.modified_count,
                });
            }
        }

        // Nothing to change: tell an unchanged product apart from a missing one.
        let matched_count = collection
            .count_documents(id.lookup_filter(), CountOptions::builder().limit(1u64).build())
            .await?;
        Ok(UpdateOutcome {
            matched_count,
            modified_count: 0,
        })
    }

    async fn delete_by_id(&self, id: &ProductId) -> StoreResult<u64> {
        let collection = self.collection().await?;
        let result = collection.delete_one(id.lookup_filter(), None).await?;
        Ok(result.deleted_count)
    }
}
