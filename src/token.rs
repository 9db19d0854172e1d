//! Bearer token payload decoding
//!
//! The client never verifies token signatures; it only reads the payload
//! segment to recover the subject (user id) the backend issued the token for.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use serde::Deserialize;
use thiserror::Error;

use crate::models::EntityId;

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

/// base64url, padding optional
const URL_SAFE: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Some issuers emit the standard alphabet in the payload
const STANDARD: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// Token decoding errors
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("expected 3 dot-separated segments, found {0}")]
    Segments(usize),

    #[error("payload is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("payload has no subject claim")]
    MissingSubject,
}

/// Claims the client reads from the token payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenClaims {
    pub sub: EntityId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_admin: Option<bool>,
    #[serde(default)]
    pub exp: Option<i64>,
}

#[derive(Deserialize)]
struct RawClaims {
    sub: Option<EntityId>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    is_admin: Option<bool>,
    #[serde(default)]
    exp: Option<i64>,
}

/// Decode the payload segment of a `header.payload.signature` token
pub fn decode_claims(token: &str) -> Result<TokenClaims, TokenError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::Segments(segments.len()));
    }

    let payload = segments[1];
    let bytes = match URL_SAFE.decode(payload) {
        Ok(bytes) => bytes,
        Err(err) => STANDARD.decode(payload).map_err(|_| err)?,
    };

    let raw: RawClaims = serde_json::from_slice(&bytes)?;
    let sub = raw.sub.ok_or(TokenError::MissingSubject)?;

    Ok(TokenClaims {
        sub,
        email: raw.email,
        is_admin: raw.is_admin,
        exp: raw.exp,
    })
}

/// User id the token was issued for
pub fn subject(token: &str) -> Result<EntityId, TokenError> {
    decode_claims(token).map(|claims| claims.sub)
}
