//! OAuth 2.0 Token endpoint handler.
//!
//! # Example
//!
//! ```ignore
//! POST /token
//! Content-Type: application/x-www-form-urlencoded
//! Authorization: Basic <base64(client_id:client_secret)>
//!
//! grant_type=authorization_code
//! &code=SplxlOBeZQQYbYS6WxSbIA
//! &redirect_uri=https://app.example.com/callback
//! &code_verifier=dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, error, info, warn};

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::service::{TokenEndpointService, ValidatedGrant};
use crate::oauth::token::{TokenError, TokenRequest, TokenResponse};

/// Issues tokens for a validated grant.
///
/// Token formats and lifetimes belong to the embedding server.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Issues tokens for `grant`.
    ///
    /// # Errors
    ///
    /// Returns an error if tokens cannot be issued.
    async fn issue(&self, grant: &ValidatedGrant) -> AuthResult<TokenResponse>;
}

/// State required for the token endpoint.
#[derive(Clone)]
pub struct TokenState {
    service: Arc<TokenEndpointService>,
    issuer: Arc<dyn TokenIssuer>,
}

impl TokenState {
    /// Creates a new token state.
    pub fn new(service: Arc<TokenEndpointService>, issuer: Arc<dyn TokenIssuer>) -> Self {
        Self { service, issuer }
    }
}

/// OAuth 2.0 token endpoint handler.
///
/// Handles POST requests with an `application/x-www-form-urlencoded` body.
///
/// # Client Authentication
///
/// Clients can authenticate using:
/// - HTTP Basic Auth header: `Authorization: Basic <base64(client_id:client_secret)>`
/// - Request body: `client_id` and `client_secret` parameters
/// - Client assertion (JWT): `client_assertion_type` and `client_assertion` parameters
/// - Public client: Just `client_id` parameter (for authorization_code with PKCE)
pub async fn token_handler(
    State(state): State<TokenState>,
    headers: HeaderMap,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Response {
    let Form(request) = match form {
        Ok(form) => form,
        Err(rejection) => {
            debug!(error = %rejection, "Rejected token request body");
            return token_error_response(
                &AuthError::invalid_request("Malformed token request body"),
                false,
            );
        }
    };

    debug!(
        grant_type = %request.grant_type,
        client_id = ?request.client_id,
        "Processing token request"
    );

    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let used_basic = authorization.is_some_and(is_basic_scheme);

    let grant = match state.service.exchange(&request, authorization).await {
        Ok(grant) => grant,
        Err(e) => {
            log_failure(&e, &request.grant_type, "Token request failed");
            return token_error_response(&e, used_basic);
        }
    };

    match state.issuer.issue(&grant).await {
        Ok(response) => {
            info!(
                client_id = %grant.client.client.client_id,
                grant_type = %request.grant_type,
                "Token issued successfully"
            );
            token_success_response(response)
        }
        Err(e) => {
            log_failure(&e, &request.grant_type, "Token issuance failed");
            token_error_response(&e, used_basic)
        }
    }
}

fn log_failure(error: &AuthError, grant_type: &str, message: &str) {
    if error.is_server_error() {
        error!(grant_type, category = %error.category(), error = %error, "{message}");
    } else {
        warn!(grant_type, category = %error.category(), error = %error, "{message}");
    }
}

fn is_basic_scheme(value: &str) -> bool {
    value
        .trim()
        .split_once(' ')
        .is_some_and(|(scheme, _)| scheme.eq_ignore_ascii_case("basic"))
}

/// Build a success response for token endpoint.
fn token_success_response(response: TokenResponse) -> Response {
    (
        StatusCode::OK,
        [
            (header::CACHE_CONTROL, "no-store"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(response),
    )
        .into_response()
}

/// Build an error response for token endpoint.
fn token_error_response(error: &AuthError, used_basic: bool) -> Response {
    let token_error = TokenError::from(error);
    let status = StatusCode::from_u16(token_error.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = (
        status,
        [
            (header::CACHE_CONTROL, "no-store"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(token_error),
    )
        .into_response();

    // RFC 6749 Section 5.2
    if status == StatusCode::UNAUTHORIZED && used_basic {
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"token\""),
        );
    }

    response
}
