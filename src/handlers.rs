use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::{
    error::{AppError, Result},
    id::ProductId,
    models::{CreateProductRequest, Product, UpdateProductRequest},
    query::{ListParams, ProductQuery},
    store::ProductStore,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total_pages: u64,
}

/// Counts the matching products, then reads the requested window of them.
pub async fn fetch_page(store: &dyn ProductStore, query: &ProductQuery) -> Result<ProductPage> {
    let total_count = store
        .count(&query.filter)
        .await
        .map_err(AppError::store("Failed to fetch products"))?;

    let products = store
        .find_page(&query.filter, query.sort, query.pagination)
        .await
        .map_err(AppError::store("Failed to fetch products"))?;

    Ok(ProductPage {
        products,
        total_pages: query.pagination.total_pages(total_count),
    })
}

pub async fn list_products(
    store: web::Data<dyn ProductStore>,
    params: web::Query<ListParams>,
) -> Result<HttpResponse> {
    let query = ProductQuery::from(params.into_inner());
    debug!(?query, "Listing products");

    let page = fetch_page(store.get_ref(), &query).await?;

    info!(
        returned = page.products.len(),
        total_pages = page.total_pages,
        "Retrieved products"
    );
    Ok(HttpResponse::Ok().json(page))
}

pub async fn create_product(
    store: web::Data<dyn ProductStore>,
    body: web::Json<CreateProductRequest>,
) -> Result<HttpResponse> {
    debug!("Creating new product: {:?}", body);

    let product = body.into_inner().into_product(Utc::now())?;
    let created = store
        .insert(product)
        .await
        .map_err(AppError::store("Failed to create product"))?;

    if let Some(id) = &created.id {
        info!("Product created successfully with ID: {}", id);
    }
    Ok(HttpResponse::Created().json(created))
}

pub async fn get_product(
    store: web::Data<dyn ProductStore>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let id = ProductId::parse(&id);
    debug!("Fetching product with ID: {}", id);

    let product = store
        .find_by_id(&id)
        .await
        .map_err(AppError::store("Failed to fetch product"))?;

    match product {
        Some(product) => Ok(HttpResponse::Ok().json(product)),
        None => {
            debug!("Product not found: {}", id);
            Err(AppError::product_not_found())
        }
    }
}

pub async fn update_product(
    store: web::Data<dyn ProductStore>,
    id: web::Path<String>,
    update: web::Json<UpdateProductRequest>,
) -> Result<HttpResponse> {
    let id = ProductId::parse(&id);
    debug!("Updating product {}: {:?}", id, update);

    update.check()?;
    let outcome = store
        .update_by_id(&id, &update)
        .await
        .map_err(AppError::store("Failed to update product"))?;

    if outcome.matched_count == 0 {
        debug!("Product not found for update: {}", id);
        return Err(AppError::product_not_found());
    }

    info!(
        modified = outcome.modified_count,
        fields = update.field_count(),
        "Product updated successfully: {}",
        id
    );
    Ok(HttpResponse::Ok().json(json!({
        "message": "Product updated",
        "modifiedCount": outcome.modified_count,
    })))
}

pub async fn delete_product(
    store: web::Data<dyn ProductStore>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let id = ProductId::parse(&id);
    debug!("Deleting product: {}", id);

    let deleted_count = store
        .delete_by_id(&id)
        .await
        .map_err(AppError::store("Failed to delete product"))?;

    if deleted_count == 0 {
        debug!("Product not found for deletion: {}", id);
        return Err(AppError::product_not_found());
    }

    info!("Product deleted successfully: {}", id);
    Ok(HttpResponse::Ok().json(json!({
        "message": "Product deleted",
        "deletedCount": deleted_count,
    })))
}
