//! Origin allow-list.
//!
//! Every `/api` request must declare an `Origin` that is on the configured
//! list, unless the service runs with allow-all (never in production). A
//! request without an `Origin` header is treated as disallowed. The check runs
//! as middleware, before authentication and before any handler.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use url::Url;

use crate::error::AppError;
use crate::state::AppState;

/// Set of origins permitted to call the API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginPolicy {
    allowed: Vec<String>,
    allow_all: bool,
}

impl OriginPolicy {
    /// Build a policy from configured origins.
    ///
    /// Each entry is normalized to `scheme://host[:port]`, so a trailing slash
    /// or default port in configuration does not cause a mismatch.
    ///
    /// # Errors
    ///
    /// Returns a description of the first entry that is not an http(s) URL.
    pub fn from_origins(origins: &[String], allow_all: bool) -> Result<Self, String> {
        let mut allowed = Vec::with_capacity(origins.len());
        for origin in origins {
            let normalized =
                normalize(origin).ok_or_else(|| format!("invalid origin '{origin}'"))?;
            if !allowed.contains(&normalized) {
                allowed.push(normalized);
            }
        }
        Ok(Self { allowed, allow_all })
    }

    /// Policy that accepts every origin.
    #[must_use]
    pub const fn allow_all() -> Self {
        Self {
            allowed: Vec::new(),
            allow_all: true,
        }
    }

    /// Whether no origin is listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Whether a request declaring `origin` may proceed.
    #[must_use]
    pub fn permits(&self, origin: Option<&str>) -> bool {
        if self.allow_all {
            return true;
        }
        origin
            .and_then(normalize)
            .is_some_and(|o| self.allowed.contains(&o))
    }

    /// CORS layer answering browser preflights for the same origins.
    #[must_use]
    pub fn cors_layer(&self) -> CorsLayer {
        let origins = if self.allow_all {
            AllowOrigin::any()
        } else {
            AllowOrigin::list(
                self.allowed
                    .iter()
                    .filter_map(|o| HeaderValue::from_str(o).ok()),
            )
        };

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any)
    }
}

fn normalize(origin: &str) -> Option<String> {
    let url = Url::parse(origin.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    Some(url.origin().ascii_serialization())
}

/// Middleware refusing requests whose origin is not allowed.
pub async fn origin_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok());

    if !state.config().origins.permits(origin) {
        tracing::warn!(
            origin = origin.unwrap_or("<none>"),
            path = %request.uri().path(),
            "Refused request from disallowed origin"
        );
        return AppError::Forbidden("forbidden origin".to_string()).into_response();
    }

    next.run(request).await
}
