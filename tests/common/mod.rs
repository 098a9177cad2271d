#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};
use storefront_catalog_api::store::InMemoryProductStore;

pub const ADMIN_TOKEN: &str = "test-admin-token";

/// Initialises the full application around an `Arc<dyn ProductStore>`.
#[allow(unused_macros)]
macro_rules! init_app {
    ($store:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::from($store))
                .configure(storefront_catalog_api::configure(
                    storefront_catalog_api::auth::AdminAuth::new(common::ADMIN_TOKEN),
                )),
        )
        .await
    };
}

/// Sends a GET and returns the status with the decoded JSON body.
#[allow(unused_macros)]
macro_rules! get_json {
    ($app:expr, $uri:expr) => {{
        let resp = actix_web::test::call_service(
            &$app,
            actix_web::test::TestRequest::get().uri($uri).to_request(),
        )
        .await;
        let status = resp.status();
        let body: serde_json::Value = actix_web::test::read_body_json(resp).await;
        (status, body)
    }};
}

/// Creates a product through the API and returns the stored JSON.
#[allow(unused_macros)]
macro_rules! create_product {
    ($app:expr, $body:expr) => {{
        let req = actix_web::test::TestRequest::post()
            .uri("/products")
            .set_json($body)
            .to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::CREATED);
        let created: serde_json::Value = actix_web::test::read_body_json(resp).await;
        created
    }};
}

pub fn admin_header() -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", ADMIN_TOKEN))
}

pub fn memory_store() -> Arc<InMemoryProductStore> {
    Arc::new(InMemoryProductStore::new())
}

pub fn shoe(title: &str, price: f64, category: &str) -> Value {
    json!({
        "title": title,
        "price": price,
        "category": category,
        "brand": "Acme",
        "variants": [
            { "color": "black", "image": "black.png",
              "sizes": [ { "size": "42", "stock": 4 } ] }
        ]
    })
}
