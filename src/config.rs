//! Environment-driven configuration, read once at startup.

use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub cors_allowed_origins: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3001),
            database_url: env::var("DATABASE_URL").unwrap_or_default(),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        }
    }
}

/// Payment gateway credentials and endpoint.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub base_url: String,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self {
            key_id: env::var("PAYMENT_GATEWAY_KEY_ID").unwrap_or_default(),
            key_secret: env::var("PAYMENT_GATEWAY_KEY_SECRET").unwrap_or_default(),
            base_url: env::var("PAYMENT_GATEWAY_URL")
                .unwrap_or_else(|_| "https://api.razorpay.com".to_string()),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.key_id.trim().is_empty() && !self.key_secret.trim().is_empty()
    }
}

/// Plate-recognition provider credentials and endpoint.
#[derive(Clone, Debug)]
pub struct PlateProviderConfig {
    pub api_token: String,
    pub base_url: String,
}

impl PlateProviderConfig {
    pub fn from_env() -> Self {
        Self {
            api_token: env::var("PLATE_RECOGNIZER_API_TOKEN").unwrap_or_default(),
            base_url: env::var("PLATE_RECOGNIZER_URL")
                .unwrap_or_else(|_| "https://api.platerecognizer.com".to_string()),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_token.trim().is_empty()
    }
}
