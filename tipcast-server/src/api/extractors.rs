//! Custom Axum extractors for request authentication.
//!
//! Provides:
//! - `SignedBody<T>` — verifies the `Tipcast-Signature` header against a
//!   signed JSON body (used by the inbound webhook endpoint).
//! - `AdminAuth` — verifies the `Tipcast-Admin-Authorization` header
//!   against the hashed admin secret (used by the admin API).
//!
//! All cryptographic operations are delegated to [`tipcast_sdk::signature`].

use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use tipcast_sdk::signature::{
    ADMIN_AUTH_HEADER, SIGNATURE_HEADER, Signature, SignatureError, SignedObject,
};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// SignedBody — provider webhook authentication via signed JSON body
// ---------------------------------------------------------------------------

/// An Axum extractor that verifies the `Tipcast-Signature` header and
/// deserializes + authenticates the JSON request body.
///
/// # Header format
///
/// ```text
/// Tipcast-Signature: {unix_timestamp}.{base64_signature}
/// ```
///
/// The signature is `HMAC-SHA256("{timestamp}.{json_body}", provider_secret)`.
pub struct SignedBody<T: Signature>(pub T);

/// Errors that can occur during signed-body verification.
#[derive(Debug, thiserror::Error)]
pub enum SignedBodyError {
    #[error("missing Tipcast-Signature header")]
    MissingHeader,
    #[error("invalid Tipcast-Signature header format")]
    InvalidHeader,
    #[error("invalid signature encoding")]
    InvalidBase64,
    #[error("failed to read request body")]
    BodyReadError,
    #[error("invalid JSON body: {0}")]
    JsonError(serde_json::Error),
    #[error("signature verification failed")]
    VerificationFailed,
}

impl From<SignatureError> for SignedBodyError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::InvalidFormat => Self::InvalidHeader,
            SignatureError::InvalidBase64 => Self::InvalidBase64,
            SignatureError::Json(e) => Self::JsonError(e),
            SignatureError::SignatureMismatch | SignatureError::Expired => Self::VerificationFailed,
        }
    }
}

impl IntoResponse for SignedBodyError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            SignedBodyError::MissingHeader => {
                (StatusCode::UNAUTHORIZED, "missing Tipcast-Signature header")
            }
            SignedBodyError::InvalidHeader => (
                StatusCode::BAD_REQUEST,
                "invalid Tipcast-Signature header format",
            ),
            SignedBodyError::InvalidBase64 => {
                (StatusCode::BAD_REQUEST, "invalid signature encoding")
            }
            SignedBodyError::BodyReadError => {
                (StatusCode::BAD_REQUEST, "failed to read request body")
            }
            SignedBodyError::JsonError(_) => (StatusCode::BAD_REQUEST, "invalid JSON body"),
            SignedBodyError::VerificationFailed => {
                (StatusCode::UNAUTHORIZED, "signature verification failed")
            }
        };
        (status, message).into_response()
    }
}

impl<T: Signature + Send> FromRequest<AppState> for SignedBody<T> {
    type Rejection = SignedBodyError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let header_value = req
            .headers()
            .get(SIGNATURE_HEADER)
            .ok_or(SignedBodyError::MissingHeader)?
            .to_str()
            .map_err(|_| SignedBodyError::InvalidHeader)?
            .to_owned();

        let body_bytes = axum::body::to_bytes(req.into_body(), 1024 * 1024)
            .await
            .map_err(|_| SignedBodyError::BodyReadError)?;

        let json =
            String::from_utf8(body_bytes.to_vec()).map_err(|_| SignedBodyError::BodyReadError)?;

        let signed = SignedObject::<T>::from_header_and_body(&header_value, json)?;

        let provider = state.config.provider.read().await;
        let verified_body = signed.verify(provider.secret_bytes())?;
        drop(provider);

        Ok(SignedBody(verified_body))
    }
}

// ---------------------------------------------------------------------------
// AdminAuth — admin API authentication
// ---------------------------------------------------------------------------

/// An Axum extractor that checks the `Tipcast-Admin-Authorization` header
/// against the hashed admin secret.
pub struct AdminAuth;

/// Errors that can occur during admin authentication.
#[derive(Debug, thiserror::Error)]
pub enum AdminAuthError {
    #[error("missing Tipcast-Admin-Authorization header")]
    MissingHeader,
    #[error("admin authentication failed")]
    Unauthorized,
}

impl IntoResponse for AdminAuthError {
    fn into_response(self) -> Response {
        match self {
            AdminAuthError::MissingHeader => (
                StatusCode::UNAUTHORIZED,
                "missing Tipcast-Admin-Authorization header",
            )
                .into_response(),
            AdminAuthError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "admin authentication failed").into_response()
            }
        }
    }
}

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AdminAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(ADMIN_AUTH_HEADER)
            .ok_or(AdminAuthError::MissingHeader)?
            .to_str()
            .map_err(|_| AdminAuthError::Unauthorized)?;

        let admin = state.config.admin.read().await;
        if admin.verify(header_value) {
            Ok(AdminAuth)
        } else {
            Err(AdminAuthError::Unauthorized)
        }
    }
}
