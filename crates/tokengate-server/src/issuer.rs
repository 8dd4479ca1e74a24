//! Opaque token issuance.
//!
//! The server hands out random bearer strings; nothing here is
//! introspectable. A deployment that needs signed access tokens plugs its
//! own [`TokenIssuer`] into [`TokenState`](tokengate_auth::http::TokenState).

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use tokengate_auth::AuthResult;
use tokengate_auth::http::TokenIssuer;
use tokengate_auth::oauth::{TokenResponse, ValidatedGrant};
use tokengate_auth::types::GrantType;

use crate::config::TokensConfig;

/// Issues random opaque access and refresh tokens.
#[derive(Debug, Clone)]
pub struct OpaqueTokenIssuer {
    config: TokensConfig,
}

impl OpaqueTokenIssuer {
    pub fn new(config: TokensConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TokenIssuer for OpaqueTokenIssuer {
    async fn issue(&self, grant: &ValidatedGrant) -> AuthResult<TokenResponse> {
        let mut response = TokenResponse::new(
            random_token(),
            self.config.access_token_lifetime.as_secs(),
            grant.code.scope.clone(),
        );

        if self.config.refresh_tokens
            && grant
                .client
                .client
                .is_grant_type_allowed(GrantType::RefreshToken)
        {
            response = response.with_refresh_token(random_token());
        }

        Ok(response)
    }
}

/// 256 bits of randomness, base64url without padding.
fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokengate_auth::oauth::{AuthenticatedClient, AuthorizationCodeRecord};
    use tokengate_auth::types::{Client, TokenEndpointAuthMethod};

    use super::*;

    fn grant(grant_types: Vec<GrantType>) -> ValidatedGrant {
        let mut client = Client::new("app", TokenEndpointAuthMethod::ClientSecretBasic);
        client.grant_types = grant_types;
        ValidatedGrant {
            client: AuthenticatedClient {
                client,
                auth_method: TokenEndpointAuthMethod::ClientSecretBasic,
            },
            code: AuthorizationCodeRecord::new("code", "app", Duration::from_secs(60))
                .with_scope("openid"),
        }
    }

    #[tokio::test]
    async fn test_issues_distinct_opaque_tokens() {
        let issuer = OpaqueTokenIssuer::new(TokensConfig::default());
        let grant = grant(vec![GrantType::AuthorizationCode, GrantType::RefreshToken]);

        let first = issuer.issue(&grant).await.unwrap();
        let second = issuer.issue(&grant).await.unwrap();

        assert_eq!(first.access_token.len(), 43);
        assert_ne!(first.access_token, second.access_token);
        assert_eq!(first.expires_in, 3600);
        assert_eq!(first.scope.as_deref(), Some("openid"));
        assert!(first.refresh_token.is_some());
    }

    #[tokio::test]
    async fn test_refresh_token_requires_grant() {
        let issuer = OpaqueTokenIssuer::new(TokensConfig::default());
        let response = issuer
            .issue(&grant(vec![GrantType::AuthorizationCode]))
            .await
            .unwrap();
        assert!(response.refresh_token.is_none());

        let issuer = OpaqueTokenIssuer::new(TokensConfig {
            refresh_tokens: false,
            ..TokensConfig::default()
        });
        let response = issuer
            .issue(&grant(vec![GrantType::AuthorizationCode, GrantType::RefreshToken]))
            .await
            .unwrap();
        assert!(response.refresh_token.is_none());
    }
}
