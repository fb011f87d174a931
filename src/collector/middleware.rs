//! Bearer-token authentication for the collector API.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};

/// Collector configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct CollectorConfig {
    /// Token uploads must present (from LOGSHIP_COLLECTOR_TOKEN)
    pub api_token: Option<String>,
}

impl CollectorConfig {
    /// Load the collector configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            api_token: std::env::var("LOGSHIP_COLLECTOR_TOKEN").ok(),
        }
    }

    /// No authentication (local development and most tests).
    pub fn disabled() -> Self {
        Self { api_token: None }
    }

    /// Require a specific token (for testing).
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            api_token: Some(token.into()),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Reject requests that do not carry the configured bearer token.
pub async fn auth_middleware(
    State(config): State<CollectorConfig>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let expected = match &config.api_token {
        Some(token) => token,
        None => return Ok(next.run(request).await),
    };

    let bearer = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match bearer {
        Some(token) if token == expected => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!("Invalid collector token provided");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("Missing or malformed Authorization header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_disabled_has_no_token() {
        let config = CollectorConfig::disabled();
        assert!(config.api_token.is_none());
    }

    #[test]
    fn config_with_token_requires_that_token() {
        let config = CollectorConfig::with_token("test-token");
        assert_eq!(config.api_token, Some("test-token".to_string()));
    }
}
