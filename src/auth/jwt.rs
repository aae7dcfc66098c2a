use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::claims::{Claims, TokenScope};
use crate::config::JwtConfig;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid or expired token")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("invalid scope for token")]
    WrongScope,
}

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub algorithm: Algorithm,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub email_ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> anyhow::Result<Self> {
        let algorithm = Algorithm::from_str(&cfg.algorithm)
            .with_context(|| format!("unknown JWT_ALGORITHM {}", cfg.algorithm))?;
        anyhow::ensure!(
            matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512),
            "JWT_ALGORITHM must be one of HS256, HS384, HS512"
        );
        Ok(Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            algorithm,
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs((cfg.access_ttl_minutes.max(1) as u64) * 60),
            email_ttl: Duration::from_secs((cfg.email_ttl_minutes.max(1) as u64) * 60),
        })
    }

    fn sign_with_scope(&self, email: &str, scope: TokenScope) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match scope {
            TokenScope::AccessToken => self.access_ttl,
            TokenScope::EmailToken => self.email_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: email.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            scope,
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)?;
        debug!(email = %email, scope = ?scope, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, email: &str) -> anyhow::Result<String> {
        self.sign_with_scope(email, TokenScope::AccessToken)
    }

    pub fn sign_email(&self, email: &str) -> anyhow::Result<String> {
        self.sign_with_scope(email, TokenScope::EmailToken)
    }

    /// Checks signature, expiry, issuer and audience. Scope is left to the caller.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(email = %data.claims.sub, scope = ?data.claims.scope, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.scope != TokenScope::AccessToken {
            return Err(TokenError::WrongScope);
        }
        Ok(claims)
    }

    /// Returns the email carried by an email-scoped token.
    pub fn verify_email(&self, token: &str) -> Result<String, TokenError> {
        let claims = self.verify(token)?;
        if claims.scope != TokenScope::EmailToken {
            return Err(TokenError::WrongScope);
        }
        Ok(claims.sub)
    }
}
