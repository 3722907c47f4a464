//! Signed bearer tokens (HS256 JWT).
//!
//! Tokens carry the user id in `sub`, are valid for four hours, and name
//! this service as both issuer and audience. Verification checks the
//! header algorithm, the MAC (constant time), issuer, audience and the
//! `nbf`/`exp` window.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use prime_shine_core::UserId;

/// Issuer and audience of every token.
pub const ISSUER: &str = "prime-shine-api";

/// How long a token stays valid.
pub const TOKEN_TTL_HOURS: i64 = 4;

/// Errors that can occur while issuing or verifying a token.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("unsupported signing algorithm")]
    UnsupportedAlgorithm,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("wrong issuer or audience")]
    WrongIssuer,
    #[error("invalid signing key")]
    Key,
    #[error("claims encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Registered claims carried by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: Vec<String>,
}

/// Issues and verifies tokens with a shared secret.
#[derive(Clone)]
pub struct TokenService {
    secret: SecretString,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl TokenService {
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Issue a token for `user_id`, valid from now.
    ///
    /// # Errors
    ///
    /// Returns `TokenError` if the claims cannot be encoded.
    pub fn issue(&self, user_id: UserId) -> Result<String, TokenError> {
        self.issue_at(user_id, Utc::now())
    }

    /// Verify a token and return the user it was issued to.
    ///
    /// # Errors
    ///
    /// Returns `TokenError` describing why the token was rejected.
    pub fn verify(&self, token: &str) -> Result<UserId, TokenError> {
        self.verify_at(token, Utc::now())
    }

    fn issue_at(&self, user_id: UserId, now: DateTime<Utc>) -> Result<String, TokenError> {
        let header = Header {
            alg: "HS256".to_owned(),
            typ: "JWT".to_owned(),
        };
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
            iss: ISSUER.to_owned(),
            aud: vec![ISSUER.to_owned()],
        };

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );
        let signature = self.mac(&signing_input)?.finalize().into_bytes();

        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<UserId, TokenError> {
        let (signing_input, signature) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;
        let (header, claims) = signing_input
            .split_once('.')
            .ok_or(TokenError::Malformed)?;

        let header: Header = decode_segment(header)?;
        if header.alg != "HS256" {
            return Err(TokenError::UnsupportedAlgorithm);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;
        self.mac(signing_input)?
            .verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let claims: Claims = decode_segment(claims)?;
        if claims.iss != ISSUER || !claims.aud.iter().any(|aud| aud == ISSUER) {
            return Err(TokenError::WrongIssuer);
        }

        let now = now.timestamp();
        if claims.nbf > now {
            return Err(TokenError::NotYetValid);
        }
        if claims.exp <= now {
            return Err(TokenError::Expired);
        }

        claims
            .sub
            .parse::<i32>()
            .map(UserId::new)
            .map_err(|_| TokenError::Malformed)
    }

    fn mac(&self, signing_input: &str) -> Result<Hmac<Sha256>, TokenError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| TokenError::Key)?;
        mac.update(signing_input.as_bytes());
        Ok(mac)
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(SecretString::from("k8#Lq2!vX9@mN4$pR7&tW1*zB6^cF3%h"))
    }

    #[test]
    fn test_issue_then_verify() {
        let tokens = service();
        let token = tokens.issue(UserId::new(12)).unwrap();

        assert_eq!(token.matches('.').count(), 2);
        assert_eq!(tokens.verify(&token).unwrap(), UserId::new(12));
    }

    #[test]
    fn test_claims_shape() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let token = service().issue_at(UserId::new(3), now).unwrap();
        let claims: Claims = decode_segment(token.split('.').nth(1).unwrap()).unwrap();

        assert_eq!(claims.sub, "3");
        assert_eq!(claims.iat, 1_700_000_000);
        assert_eq!(claims.nbf, 1_700_000_000);
        assert_eq!(claims.exp, 1_700_000_000 + 4 * 3600);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.aud, vec![ISSUER.to_owned()]);
    }

    #[test]
    fn test_expired_and_early_tokens() {
        let tokens = service();
        let issued = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let token = tokens.issue_at(UserId::new(1), issued).unwrap();

        assert!(matches!(
            tokens.verify_at(&token, issued + Duration::hours(5)),
            Err(TokenError::Expired)
        ));
        assert!(matches!(
            tokens.verify_at(&token, issued - Duration::minutes(1)),
            Err(TokenError::NotYetValid)
        ));
        assert!(tokens.verify_at(&token, issued + Duration::hours(3)).is_ok());
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = service().issue(UserId::new(1)).unwrap();
        let other = TokenService::new(SecretString::from("another-signing-key-entirely-0123"));

        assert!(matches!(
            other.verify(&token),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let tokens = service();
        let token = tokens.issue(UserId::new(1)).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(
            serde_json::json!({
                "sub": "2", "iat": 0, "nbf": 0, "exp": i64::MAX,
                "iss": ISSUER, "aud": [ISSUER]
            })
            .to_string(),
        );
        parts[1] = &forged;

        assert!(matches!(
            tokens.verify(&parts.join(".")),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            service().verify("not-a-token"),
            Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        assert!(!format!("{:?}", service()).contains("k8#"));
    }
}
