use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use storefront_catalog_api::{
    auth::AdminAuth,
    config::AppConfig,
    configure,
    store::{MongoProductStore, ProductStore},
};
use tracing::{error, info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{self, EnvFilter};

fn cors(allowed_origins: &[String]) -> Cors {
    if allowed_origins.is_empty() {
        return Cors::permissive();
    }
    allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allow_any_method()
        .allow_any_header()
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(Level::INFO.into())
                .add_directive("actix_web=info".parse().expect("valid directive"))
                .add_directive("storefront_catalog_api=debug".parse().expect("valid directive")),
        )
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting storefront catalog API on {}", config.server_address());

    // Connects on first request; every worker shares the same handle.
    let store: Arc<dyn ProductStore> = Arc::new(MongoProductStore::new(config.mongo.clone()));
    let store = web::Data::from(store);
    let admin = AdminAuth::new(config.admin_token.as_str());
    let origins = config.cors_allowed_origins.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .wrap(cors(&origins))
            .app_data(store.clone())
            .service(web::scope("/api").configure(configure(admin.clone())))
    })
    .bind(config.server_address())?
    .run()
    .await
}
