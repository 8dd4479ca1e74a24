//! Token endpoint orchestration for the authorization code grant.
//!
//! The service runs the two decisions of a token request in order:
//!
//! 1. Client authentication ([`ClientAuthenticator`])
//! 2. Code redemption, including PKCE ([`PkceValidator`])
//!
//! A request that fails authentication never reaches the code store, so a
//! caller without valid credentials cannot consume someone else's code.
//! Once a code has been fetched it stays consumed whatever the outcome.

use std::sync::Arc;
use std::time::Duration;

use crate::AuthResult;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::jwks::KeyResolver;
use crate::oauth::client_assertion::ClientAssertionValidator;
use crate::oauth::client_auth::{AuthFailureReason, AuthenticatedClient, ClientAuthenticator};
use crate::oauth::code::{AuthorizationCodeRecord, generate_code};
use crate::oauth::credentials::ClientCredentials;
use crate::oauth::pkce::{CodeChallengeMethod, PkceError, PkceValidator};
use crate::oauth::token::TokenRequest;
use crate::storage::{AuthorizationCodeStorage, ClientStorage, CodeFetch, JtiStorage};
use crate::types::GrantType;

/// A token request that passed client authentication and code redemption.
///
/// Tokens may be issued for it.
#[derive(Debug, Clone)]
pub struct ValidatedGrant {
    /// The authenticated client.
    pub client: AuthenticatedClient,

    /// The redeemed authorization code.
    pub code: AuthorizationCodeRecord,
}

/// Token endpoint service.
#[derive(Clone)]
pub struct TokenEndpointService {
    clients: Arc<dyn ClientStorage>,
    codes: Arc<dyn AuthorizationCodeStorage>,
    authenticator: ClientAuthenticator,
    pkce: PkceValidator,
    code_lifetime: Duration,
}

impl TokenEndpointService {
    /// Creates a service from configuration and its collaborators.
    pub fn new(
        config: &AuthConfig,
        clients: Arc<dyn ClientStorage>,
        codes: Arc<dyn AuthorizationCodeStorage>,
        jti: Arc<dyn JtiStorage>,
        key_resolver: Arc<dyn KeyResolver>,
    ) -> Self {
        let assertions = ClientAssertionValidator::from_config(config, jti);
        Self {
            clients,
            codes,
            authenticator: ClientAuthenticator::new(assertions, key_resolver),
            pkce: PkceValidator::new(&config.pkce),
            code_lifetime: config.authorization_code_lifetime,
        }
    }

    /// Returns the client authenticator.
    #[must_use]
    pub fn authenticator(&self) -> &ClientAuthenticator {
        &self.authenticator
    }

    /// Authenticates the client of a token request.
    ///
    /// `authorization` is the raw `Authorization` header value, if any.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` for every authentication failure, or a
    /// storage error if the client lookup fails.
    pub async fn authenticate_request(
        &self,
        request: &TokenRequest,
        authorization: Option<&str>,
    ) -> AuthResult<AuthenticatedClient> {
        let credentials = ClientCredentials::from_request(request, authorization)
            .map_err(|reason| reject(None, reason))?;

        let client_id = credentials
            .resolve_client_id()
            .ok_or_else(|| reject(None, AuthFailureReason::MissingCredentials))?;

        let client = self
            .clients
            .find_by_client_id(&client_id)
            .await?
            .ok_or_else(|| reject(Some(&client_id), AuthFailureReason::UnknownClient))?;

        let auth_method = self
            .authenticator
            .authenticate(&client, &credentials)
            .await
            .into_result()?;

        Ok(AuthenticatedClient {
            client,
            auth_method,
        })
    }

    /// Redeems the authorization code of a request for an authenticated
    /// client.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for a missing `grant_type` or `code`,
    /// `unsupported_grant_type` for other grants, `unauthorized_client` if
    /// the client may not use the grant, and `invalid_grant` if the code is
    /// unknown, consumed, expired, bound to another client or redirect URI,
    /// or fails PKCE.
    pub async fn redeem_authorization_code(
        &self,
        client: &AuthenticatedClient,
        request: &TokenRequest,
    ) -> AuthResult<AuthorizationCodeRecord> {
        if request.grant_type.is_empty() {
            return Err(AuthError::invalid_request("Missing grant_type"));
        }
        if GrantType::parse(&request.grant_type) != Some(GrantType::AuthorizationCode) {
            return Err(AuthError::unsupported_grant_type(&request.grant_type));
        }
        if !client.client.is_grant_type_allowed(GrantType::AuthorizationCode) {
            return Err(AuthError::unauthorized_client(
                "Client is not allowed to use the authorization_code grant",
            ));
        }

        let code = request
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::invalid_request("Missing code"))?;

        let record = match self.codes.fetch_and_invalidate(code).await? {
            CodeFetch::Found(record) => record,
            CodeFetch::AlreadyConsumed => {
                tracing::warn!(
                    client_id = %client.client.client_id,
                    "Authorization code reuse attempted"
                );
                return Err(AuthError::invalid_grant(
                    "Authorization code has already been used",
                ));
            }
            CodeFetch::NotFound => {
                return Err(AuthError::invalid_grant("Invalid authorization code"));
            }
        };

        if record.client_id != client.client.client_id {
            tracing::warn!(
                client_id = %client.client.client_id,
                code_client_id = %record.client_id,
                "Authorization code presented by another client"
            );
            return Err(AuthError::invalid_grant(
                "Authorization code was not issued to this client",
            ));
        }

        if record.is_expired() {
            return Err(AuthError::invalid_grant("Authorization code expired"));
        }

        if let Some(expected) = &record.redirect_uri
            && request.redirect_uri.as_deref() != Some(expected.as_str())
        {
            return Err(AuthError::invalid_grant("redirect_uri mismatch"));
        }

        self.pkce
            .verify(&record, request.code_verifier.as_deref())
            .map_err(|e| {
                tracing::debug!(
                    client_id = %client.client.client_id,
                    error = %e,
                    "PKCE verification failed"
                );
                match e {
                    PkceError::VerificationFailed => AuthError::PkceVerificationFailed,
                    other => AuthError::invalid_grant(other.to_string()),
                }
            })?;

        Ok(record)
    }

    /// Authenticates the client and redeems its authorization code.
    ///
    /// # Errors
    ///
    /// Returns the first failure of [`authenticate_request`] or
    /// [`redeem_authorization_code`].
    ///
    /// [`authenticate_request`]: Self::authenticate_request
    /// [`redeem_authorization_code`]: Self::redeem_authorization_code
    pub async fn exchange(
        &self,
        request: &TokenRequest,
        authorization: Option<&str>,
    ) -> AuthResult<ValidatedGrant> {
        let client = self.authenticate_request(request, authorization).await?;
        let code = self.redeem_authorization_code(&client, request).await?;

        tracing::info!(
            client_id = %client.client.client_id,
            method = %client.auth_method,
            pkce = code.uses_pkce(),
            "Authorization code redeemed"
        );

        Ok(ValidatedGrant { client, code })
    }

    /// Issues and stores an authorization code, as the authorization
    /// endpoint does once the resource owner has consented.
    ///
    /// `code_challenge_method` defaults to `plain` when a challenge is given
    /// without one.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for an unknown challenge method, or a
    /// storage error.
    pub async fn issue_authorization_code(
        &self,
        client_id: &str,
        redirect_uri: Option<&str>,
        code_challenge: Option<&str>,
        code_challenge_method: Option<&str>,
    ) -> AuthResult<AuthorizationCodeRecord> {
        let mut record = AuthorizationCodeRecord::new(generate_code(), client_id, self.code_lifetime);

        if let Some(uri) = redirect_uri {
            record = record.with_redirect_uri(uri);
        }

        match (code_challenge, code_challenge_method) {
            (Some(challenge), method) => {
                let method = method
                    .map(CodeChallengeMethod::parse)
                    .transpose()
                    .map_err(|e| AuthError::invalid_request(e.to_string()))?;
                record = record.with_pkce(challenge, method);
            }
            (None, Some(_)) => {
                return Err(AuthError::invalid_request(
                    "code_challenge_method requires code_challenge",
                ));
            }
            (None, None) => {}
        }

        self.codes.store(&record).await?;
        Ok(record)
    }
}

fn reject(client_id: Option<&str>, reason: AuthFailureReason) -> AuthError {
    tracing::warn!(client_id = ?client_id, reason = %reason, "Client authentication failed");
    AuthError::client_authentication_failed()
}
