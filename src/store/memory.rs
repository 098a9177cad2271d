use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use parking_lot::RwLock;

use super::{ProductStore, UpdateOutcome};
use crate::error::StoreResult;
use crate::id::ProductId;
use crate::models::{Product, UpdateProductRequest};
use crate::query::{Pagination, ProductFilter, SortMode};

/// Process-local store with the same query semantics as the MongoDB backend.
/// Insertion order is the natural order.
#[derive(Default)]
pub struct InMemoryProductStore {
    products: RwLock<Vec<Product>>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record exactly as given, keeping a caller-supplied identifier.
    pub fn seed(&self, product: Product) {
        self.products.write().push(product);
    }

    pub fn len(&self) -> usize {
        self.products.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.read().is_empty()
    }
}

fn id_key(product: &Product) -> String {
    product.id.as_ref().map(ProductId::to_string).unwrap_or_default()
}

fn sort_products(products: &mut [Product], sort: SortMode) {
    match sort {
        SortMode::Default => {}
        SortMode::PriceLow => products.sort_by(|a, b| {
            a.price.total_cmp(&b.price).then_with(|| id_key(a).cmp(&id_key(b)))
        }),
        SortMode::PriceHigh => products.sort_by(|a, b| {
            b.price.total_cmp(&a.price).then_with(|| id_key(a).cmp(&id_key(b)))
        }),
        SortMode::Name => products.sort_by(|a, b| {
            a.title.cmp(&b.title).then_with(|| id_key(a).cmp(&id_key(b)))
        }),
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn count(&self, filter: &ProductFilter) -> StoreResult<u64> {
        let matcher = filter.matcher();
        let products = self.products.read();
        Ok(products.iter().filter(|p| matcher.matches(p)).count() as u64)
    }

    async fn find_page(
        &self,
        filter: &ProductFilter,
        sort: SortMode,
        pagination: Pagination,
    ) -> StoreResult<Vec<Product>> {
        let matcher = filter.matcher();
        let mut matching: Vec<Product> = self
            .products
            .read()
            .iter()
            .filter(|p| matcher.matches(p))
            .cloned()
            .collect();
        sort_products(&mut matching, sort);

        let skip = usize::try_from(pagination.skip()).unwrap_or(usize::MAX);
        let limit = usize::try_from(pagination.limit).unwrap_or(usize::MAX);
        Ok(matching.into_iter().skip(skip).take(limit).collect())
    }

    async fn insert(&self, mut product: Product) -> StoreResult<Product> {
        product.id = Some(ProductId::canonical(ObjectId::new()));
        self.products.write().push(product.clone());
        Ok(product)
    }

    async fn find_by_id(&self, id: &ProductId) -> StoreResult<Option<Product>> {
        let products = self.products.read();
        Ok(products
            .iter()
            .find(|p| p.id.as_ref().is_some_and(|stored| id.matches(stored)))
            .cloned())
    }

    async fn update_by_id(
        &self,
        id: &ProductId,
        update: &UpdateProductRequest,
    ) -> StoreResult<UpdateOutcome> {
        let mut products = self.products.write();
        let Some(product) = products
            .iter_mut()
            .find(|p| p.id.as_ref().is_some_and(|stored| id.matches(stored)))
        else {
            return Ok(UpdateOutcome {
                matched_count: 0,
                modified_count: 0,
            });
        };

        let modified = update.apply_to(product, Utc::now());
        Ok(UpdateOutcome {
            matched_count: 1,
            modified_count: u64::from(modified),
        })
    }

    async fn delete_by_id(&self, id: &ProductId) -> StoreResult<u64> {
        let mut products = self.products.write();
        let position = products
            .iter()
            .position(|p| p.id.as_ref().is_some_and(|stored| id.matches(stored)));
        Ok(match position {
            Some(index) => {
                products.remove(index);
                1
            }
            None => 0,
        })
    }
}
