//! Authentication
//!
//! Bearer tokens map to [`Principal`]s. The middleware resolves the token
//! and stores the principal in the request extensions, where handlers pick
//! it up with `Extension<Principal>`.
//!
//! ```text
//! Authorization: Bearer your-token-here
//! ```
//!
//! # Configuration
//!
//! - `SUBSIDY_AUTH_ENABLED`: enable authentication (default: true)
//! - `SUBSIDY_API_TOKENS`: `token=principal;token=principal`, where a
//!   principal is `[lms_user_id:]role@scope[,role@scope...]`, for example
//!   `s3cret=operator@*;t0ken=1234:learner@3f0c2b0e-...`

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use subsidy_core::{GrantParseError, Principal, Role, Scope};

use crate::error::ApiError;
use crate::state::AppState;

/// Detail returned when no credentials were sent
pub const MISSING_CREDENTIALS: &str = "Authentication credentials were not provided.";

/// Detail returned for an unknown token
pub const INVALID_TOKEN: &str = "Invalid token.";

/// Authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Whether authentication is enabled
    pub enabled: bool,
    /// Bearer token -> principal
    pub tokens: HashMap<String, Principal>,
    /// Paths that don't require authentication
    pub public_paths: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tokens: HashMap::new(),
            public_paths: vec![
                "/".to_string(),
                "/health".to_string(),
                "/healthz".to_string(),
                "/api/v1/health".to_string(),
            ],
        }
    }
}

impl AuthConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self, GrantParseError> {
        let enabled = std::env::var("SUBSIDY_AUTH_ENABLED")
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(true);

        let tokens = match std::env::var("SUBSIDY_API_TOKENS") {
            Ok(v) => parse_tokens(&v)?,
            Err(_) => HashMap::new(),
        };

        Ok(Self {
            enabled,
            tokens,
            ..Default::default()
        })
    }

    /// Register a token
    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }

    /// Check if a path is public (doesn't require authentication)
    pub fn is_public_path(&self, path: &str) -> bool {
        self.public_paths
            .iter()
            .any(|p| path == p || (p != "/" && path.starts_with(&format!("{}/", p))))
    }

    /// Principal for a bearer token
    pub fn principal_for(&self, token: &str) -> Option<&Principal> {
        self.tokens.get(token)
    }
}

/// Parse `token=principal;token=principal`
pub fn parse_tokens(raw: &str) -> Result<HashMap<String, Principal>, GrantParseError> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (token, principal) = entry
                .split_once('=')
                .ok_or_else(|| GrantParseError::Malformed(entry.to_string()))?;
            Ok((token.trim().to_string(), Principal::parse(principal)?))
        })
        .collect()
}

/// Principal used for every request when authentication is disabled
pub fn development_principal() -> Principal {
    Principal::new(None).with_grant(Role::Operator, Scope::All)
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_config = &state.auth_config;

    if !auth_config.enabled {
        request.extensions_mut().insert(development_principal());
        return next.run(request).await;
    }

    if auth_config.is_public_path(request.uri().path()) {
        return next.run(request).await;
    }

    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim);

    let Some(token) = token else {
        return ApiError::unauthorized(MISSING_CREDENTIALS).into_response();
    };

    match auth_config.principal_for(token) {
        Some(principal) => {
            request.extensions_mut().insert(principal.clone());
            next.run(request).await
        }
        None => {
            tracing::debug!(path = %request.uri().path(), "Rejected unknown bearer token");
            ApiError::unauthorized(INVALID_TOKEN).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subsidy_core::RoleGrant;
    use uuid::Uuid;

    #[test]
    fn test_auth_config_default() {
        let config = AuthConfig::default();
        assert!(config.enabled);
        assert!(config.tokens.is_empty());
        assert!(config.is_public_path("/health"));
        assert!(config.is_public_path("/healthz"));
    }

    #[test]
    fn test_auth_config_public_paths() {
        let config = AuthConfig::default();
        assert!(config.is_public_path("/"));
        assert!(config.is_public_path("/api/v1/health"));
        assert!(!config.is_public_path("/api/v1/transactions/"));
        assert!(!config.is_public_path("/api/v1/subsidies/"));
    }

    #[test]
    fn test_parse_tokens() {
        let enterprise = Uuid::new_v4();
        let tokens = parse_tokens(&format!("op=operator@*; adm=admin@{} ;", enterprise)).unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(
            tokens["adm"].grants,
            vec![RoleGrant {
                role: Role::Admin,
                scope: Scope::Enterprise(enterprise)
            }]
        );
        assert_eq!(tokens["op"], development_principal());
    }

    #[test]
    fn test_parse_tokens_errors() {
        assert!(matches!(parse_tokens("no-principal"), Err(GrantParseError::Malformed(_))));
        assert!(matches!(parse_tokens("t=root@*"), Err(GrantParseError::UnknownRole(_))));
    }

    #[test]
    fn test_principal_lookup() {
        let config = AuthConfig::default().with_token("t1", development_principal());
        assert!(config.principal_for("t1").is_some());
        assert!(config.principal_for("t2").is_none());
    }
}
