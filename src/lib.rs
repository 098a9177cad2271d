pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod id;
pub mod models;
pub mod query;
pub mod store;

use actix_web::{error::JsonPayloadError, web, HttpRequest};
use tracing::debug;

use auth::AdminAuth;
use error::AppError;
use handlers::{create_product, delete_product, get_product, list_products, update_product};

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    debug!("Rejected request body: {}", err);
    AppError::Validation(format!("Invalid request body: {}", err)).into()
}

/// Registers the `/products` routes. The store must be registered as
/// `web::Data<dyn ProductStore>` on the enclosing app.
pub fn configure(admin: AdminAuth) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .service(
                web::resource("/products")
                    .route(web::get().to(list_products))
                    .route(web::post().to(create_product)),
            )
            .service(
                web::resource("/products/{id}")
                    .route(web::get().to(get_product))
                    .route(web::put().to(update_product).wrap(admin.clone()))
                    .route(web::delete().to(delete_product).wrap(admin)),
            );
    }
}
