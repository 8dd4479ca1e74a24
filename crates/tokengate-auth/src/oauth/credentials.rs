//! Classification of the client credentials presented in a token request.
//!
//! A request carries credentials in at most one of these shapes:
//!
//! - `Authorization: Basic` header (`client_secret_basic`)
//! - `client_id` + `client_secret` body parameters (`client_secret_post`)
//! - `client_assertion_type` + `client_assertion` (`client_secret_jwt`,
//!   `private_key_jwt`)
//! - `client_id` alone (public clients)
//!
//! Presenting more than one shape is rejected instead of picking one, so a
//! request can never fall back from a failing method to another.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::oauth::client_assertion::{JWT_BEARER_ASSERTION_TYPE, extract_client_id_unverified};
use crate::oauth::client_auth::AuthFailureReason;
use crate::oauth::token::TokenRequest;

/// Credentials presented by the caller, classified by shape.
#[derive(Clone, PartialEq, Eq)]
pub enum ClientCredentials {
    /// HTTP Basic authentication.
    Basic {
        /// Decoded username.
        client_id: String,
        /// Decoded password.
        client_secret: String,
    },

    /// Secret in the request body.
    Post {
        /// Body `client_id`.
        client_id: String,
        /// Body `client_secret`.
        client_secret: String,
    },

    /// JWT bearer client assertion.
    Assertion {
        /// Body `client_id`, if sent alongside the assertion.
        client_id: Option<String>,
        /// The compact JWS.
        assertion: String,
    },

    /// Only a `client_id`, as sent by public clients.
    ClientIdOnly {
        /// Body `client_id`.
        client_id: String,
    },

    /// No credentials at all.
    Absent,
}

// Secrets and assertions stay out of debug output.
impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic { client_id, .. } => f
                .debug_struct("Basic")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Self::Post { client_id, .. } => f
                .debug_struct("Post")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Self::Assertion { client_id, .. } => f
                .debug_struct("Assertion")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Self::ClientIdOnly { client_id } => f
                .debug_struct("ClientIdOnly")
                .field("client_id", client_id)
                .finish(),
            Self::Absent => f.write_str("Absent"),
        }
    }
}

impl ClientCredentials {
    /// Classifies the credentials of a token request.
    ///
    /// `authorization` is the raw `Authorization` header value, if any.
    /// Non-Basic schemes are ignored.
    ///
    /// # Errors
    ///
    /// Returns the failure reason if the credentials are malformed, combine
    /// several methods, or disagree about the `client_id`.
    pub fn from_request(
        request: &TokenRequest,
        authorization: Option<&str>,
    ) -> Result<Self, AuthFailureReason> {
        let basic = match authorization {
            Some(value) => parse_basic_auth(value)?,
            None => None,
        };
        let body_client_id = request.client_id.as_deref().filter(|id| !id.is_empty());
        let has_secret = request.client_secret.is_some();
        let has_assertion =
            request.client_assertion.is_some() || request.client_assertion_type.is_some();

        let methods = [basic.is_some(), has_secret, has_assertion]
            .into_iter()
            .filter(|present| *present)
            .count();
        if methods > 1 {
            return Err(AuthFailureReason::MultipleMethods);
        }

        if let Some((client_id, client_secret)) = basic {
            if body_client_id.is_some_and(|id| id != client_id) {
                return Err(AuthFailureReason::ClientIdMismatch);
            }
            return Ok(Self::Basic {
                client_id,
                client_secret,
            });
        }

        if let Some(client_secret) = &request.client_secret {
            let client_id = body_client_id.ok_or(AuthFailureReason::MissingClientId)?;
            return Ok(Self::Post {
                client_id: client_id.to_string(),
                client_secret: client_secret.clone(),
            });
        }

        if has_assertion {
            if request.client_assertion_type.as_deref() != Some(JWT_BEARER_ASSERTION_TYPE) {
                return Err(AuthFailureReason::UnsupportedAssertionType);
            }
            let assertion = request
                .client_assertion
                .as_deref()
                .filter(|a| !a.is_empty())
                .ok_or(AuthFailureReason::MissingAssertion)?;
            return Ok(Self::Assertion {
                client_id: body_client_id.map(str::to_string),
                assertion: assertion.to_string(),
            });
        }

        Ok(match body_client_id {
            Some(client_id) => Self::ClientIdOnly {
                client_id: client_id.to_string(),
            },
            None => Self::Absent,
        })
    }

    /// Returns the client ID stated outside any assertion.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        match self {
            Self::Basic { client_id, .. }
            | Self::Post { client_id, .. }
            | Self::ClientIdOnly { client_id } => Some(client_id),
            Self::Assertion { client_id, .. } => client_id.as_deref(),
            Self::Absent => None,
        }
    }

    /// Returns the client ID used to look up the client registration.
    ///
    /// For assertions without a body `client_id`, this is the unverified
    /// `sub` (or `iss`) of the assertion.
    #[must_use]
    pub fn resolve_client_id(&self) -> Option<String> {
        match self {
            Self::Assertion {
                client_id: None,
                assertion,
            } => extract_client_id_unverified(assertion),
            other => other.client_id().map(str::to_string),
        }
    }

    /// Returns a short label for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Basic { .. } => "basic",
            Self::Post { .. } => "post",
            Self::Assertion { .. } => "assertion",
            Self::ClientIdOnly { .. } => "client_id",
            Self::Absent => "none",
        }
    }
}

/// Parses an `Authorization` header into Basic credentials.
///
/// Returns `Ok(None)` for other schemes. The username and password are
/// form-url-decoded after base64 decoding, per RFC 6749 Section 2.3.1.
///
/// # Errors
///
/// Returns `MalformedBasicCredentials` if the header uses the Basic scheme
/// but cannot be decoded.
pub fn parse_basic_auth(header_value: &str) -> Result<Option<(String, String)>, AuthFailureReason> {
    let header_value = header_value.trim();
    let Some((scheme, encoded)) = header_value.split_once(' ') else {
        return Ok(None);
    };
    if !scheme.eq_ignore_ascii_case("basic") {
        return Ok(None);
    }

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| AuthFailureReason::MalformedBasicCredentials)?;
    let credentials =
        String::from_utf8(decoded).map_err(|_| AuthFailureReason::MalformedBasicCredentials)?;

    // Split on first colon (password may contain colons)
    let (client_id, client_secret) = credentials
        .split_once(':')
        .ok_or(AuthFailureReason::MalformedBasicCredentials)?;

    let client_id = form_urldecode(client_id)?;
    if client_id.is_empty() {
        return Err(AuthFailureReason::MalformedBasicCredentials);
    }
    let client_secret = form_urldecode(client_secret)?;

    Ok(Some((client_id, client_secret)))
}

fn form_urldecode(value: &str) -> Result<String, AuthFailureReason> {
    let value = value.replace('+', " ");
    urlencoding::decode(&value)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| AuthFailureReason::MalformedBasicCredentials)
}
