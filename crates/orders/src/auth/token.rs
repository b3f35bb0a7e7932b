//! Signed bearer credentials.
//!
//! Credentials are HS256 JWTs. Claims carry the caller's subject, role and an
//! expiry in Unix seconds; an expired credential is refused with no leeway.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use panaderia_core::Role;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from signing or verifying a credential.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Not a JWT, or the payload is not valid claims.
    #[error("malformed credential")]
    Malformed,
    /// Signature does not match the payload.
    #[error("invalid credential signature")]
    InvalidSignature,
    /// The credential has expired.
    #[error("credential expired")]
    Expired,
    /// The claims could not be signed.
    #[error("signing error: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Malformed,
        }
    }
}

/// Claims carried by a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Stable caller identifier.
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: Role,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

/// Signs and verifies bearer credentials with a shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: SecretString,
    validation: Validation,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Create a signer.
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self { secret, validation }
    }

    /// Sign `claims` into a bearer credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be serialized.
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let key = EncodingKey::from_secret(self.secret.expose_secret().as_bytes());
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Issue a credential valid for `ttl` from now.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn mint(
        &self,
        subject: &str,
        role: Role,
        email: Option<&str>,
        name: Option<&str>,
        ttl: chrono::Duration,
    ) -> Result<String, TokenError> {
        self.sign(&Claims {
            sub: subject.to_string(),
            email: email.map(String::from),
            name: name.map(String::from),
            role,
            exp: (Utc::now() + ttl).timestamp(),
        })
    }

    /// Verify a credential against the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential is malformed, forged, or expired.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());
        let claims = jsonwebtoken::decode::<Claims>(token.trim(), &key, &self.validation)?.claims;
        if claims.sub.trim().is_empty() {
            return Err(TokenError::Malformed);
        }
        Ok(claims)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new(SecretString::from("k3Y!x9#Lm2$qR7&vT4*zW8^bN5@cF1%h".to_string()))
    }

    fn claims(ttl_secs: i64) -> Claims {
        Claims {
            sub: "cust-1".to_string(),
            email: Some("ana@example.com".to_string()),
            name: None,
            role: Role::Customer,
            exp: Utc::now().timestamp() + ttl_secs,
        }
    }

    #[test]
    fn test_sign_then_verify() {
        let claims = claims(3_600);
        let token = signer().sign(&claims).unwrap();
        assert_eq!(signer().verify(&token).unwrap(), claims);
    }

    #[test]
    fn test_expired() {
        let token = signer().sign(&claims(-10)).unwrap();
        assert_eq!(signer().verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let token = signer().sign(&claims(3_600)).unwrap();
        let mut forged = claims(3_600);
        forged.role = Role::Owner;
        let forged_token = signer().sign(&forged).unwrap();

        // Staff payload under the customer credential's signature.
        let (head_and_payload, _) = forged_token.rsplit_once('.').unwrap();
        let (_, signature) = token.rsplit_once('.').unwrap();
        let spliced = format!("{head_and_payload}.{signature}");

        assert_eq!(signer().verify(&spliced), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let token = signer().sign(&claims(3_600)).unwrap();
        let other =
            TokenSigner::new(SecretString::from("another-key-0123456789abcdefghijk".to_string()));
        assert_eq!(other.verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_malformed() {
        assert_eq!(signer().verify(""), Err(TokenError::Malformed));
        assert_eq!(signer().verify("no-dots"), Err(TokenError::Malformed));
        assert_eq!(signer().verify("a.b.c"), Err(TokenError::Malformed));
    }

    #[test]
    fn test_blank_subject_is_rejected() {
        let mut anonymous = claims(3_600);
        anonymous.sub = "  ".to_string();
        let token = signer().sign(&anonymous).unwrap();
        assert_eq!(signer().verify(&token), Err(TokenError::Malformed));
    }

    #[test]
    fn test_mint_is_valid_now() {
        let token = signer()
            .mint("staff-1", Role::Employee, None, Some("Rosa"), chrono::Duration::hours(1))
            .unwrap();
        let claims = signer().verify(&token).unwrap();
        assert_eq!(claims.role, Role::Employee);
        assert_eq!(claims.name.as_deref(), Some("Rosa"));
    }
}
