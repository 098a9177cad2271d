use dotenv::dotenv;
use std::env;

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub mongo: MongoConfig,
    pub admin_token: String,
    pub cors_allowed_origins: Vec<String>,
}

/// Connection settings for the backing document store.
#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database_name: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let mongo = MongoConfig {
            uri: env::var("MONGODB_URI")
                .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "storefront".to_string()),
        };

        let admin_token = env::var("ADMIN_TOKEN")
            .map_err(|e| AppError::Config(format!("Missing environment variable 'ADMIN_TOKEN': {}", e)))?;
        if admin_token.trim().is_empty() {
            return Err(AppError::Config("ADMIN_TOKEN must not be empty".to_string()));
        }

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|e| AppError::Config(format!("Invalid PORT: {}", e)))?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|origins| parse_origins(&origins))
            .unwrap_or_default();

        Ok(AppConfig {
            host,
            port,
            mongo,
            admin_token,
            cors_allowed_origins,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::parse_origins;

    #[test]
    fn origins_are_trimmed_and_blank_entries_dropped() {
        assert_eq!(
            parse_origins(" http://localhost:3000, ,https://shop.example.com "),
            vec!["http://localhost:3000", "https://shop.example.com"]
        );
        assert!(parse_origins("").is_empty());
    }
}
