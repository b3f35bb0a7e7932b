//! Caller authentication.
//!
//! Handlers take a [`Caller`] argument to require a valid bearer credential.
//! A missing, forged or expired credential rejects the request with 401
//! before the handler body runs.

pub mod token;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use panaderia_core::Role;
use tracing::Span;

pub use token::{Claims, TokenError, TokenSigner};

use crate::error::{AppError, set_sentry_user};
use crate::state::AppState;

/// Authenticated caller resolved from the bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Credential subject; matched against the `owner_id` of records.
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Role,
}

impl Caller {
    /// Whether the caller may act on behalf of any customer.
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Reject non-staff callers.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` for customers.
    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Forbidden("staff role required".to_string()))
        }
    }

    /// Reject callers that are neither staff nor the recorded owner.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` on an ownership mismatch.
    pub fn require_owner_or_staff(&self, owned: bool) -> Result<(), AppError> {
        if self.is_staff() || owned {
            Ok(())
        } else {
            Err(AppError::Forbidden("not the owner of this record".to_string()))
        }
    }
}

impl From<Claims> for Caller {
    fn from(claims: Claims) -> Self {
        Self {
            subject: claims.sub,
            email: claims.email,
            name: claims.name,
            role: claims.role,
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("missing bearer credential".to_string()))?;

        let claims = state.signer().verify(token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer credential");
            AppError::Unauthorized(e.to_string())
        })?;

        let caller = Self::from(claims);
        Span::current().record("caller", caller.subject.as_str());
        set_sentry_user(&caller.subject, caller.email.as_deref());
        Ok(caller)
    }
}
