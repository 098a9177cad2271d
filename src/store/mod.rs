use async_trait::async_trait;

use crate::error::StoreResult;
use crate::id::ProductId;
use crate::models::{Product, UpdateProductRequest};
use crate::query::{Pagination, ProductFilter, SortMode};

pub mod memory;
pub mod mongo;

pub use memory::InMemoryProductStore;
pub use mongo::MongoProductStore;

pub const PRODUCTS_COLLECTION: &str = "products";

/// Result of a merge into an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
}

/// Persistence operations over the products collection.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn count(&self, filter: &ProductFilter) -> StoreResult<u64>;

    /// Matching products in `sort` order, windowed by `pagination`.
    async fn find_page(
        &self,
        filter: &ProductFilter,
        sort: SortMode,
        pagination: Pagination,
    ) -> StoreResult<Vec<Product>>;

    /// Stores `product` and returns it with its assigned identifier.
    async fn insert(&self, product: Product) -> StoreResult<Product>;

    async fn find_by_id(&self, id: &ProductId) -> StoreResult<Option<Product>>;

    async fn update_by_id(
        &self,
        id: &ProductId,
        update: &UpdateProductRequest,
    ) -> StoreResult<UpdateOutcome>;

    /// Returns the number of removed documents.
    async fn delete_by_id(&self, id: &ProductId) -> StoreResult<u64>;
}
