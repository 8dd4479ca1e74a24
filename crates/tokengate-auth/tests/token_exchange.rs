//! End-to-end token endpoint scenarios through the public API.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::json;
use time::OffsetDateTime;

use tokengate_auth::config::{AuthConfig, JwksCacheConfig, PkceConfig};
use tokengate_auth::jwks::ClientJwksCache;
use tokengate_auth::oauth::{
    AuthorizationCodeRecord, CodeChallengeMethod, PkceChallenge, PkceValidator, PkceVerifier,
    SigningAlgorithm, TokenEndpointService, TokenRequest,
};
use tokengate_auth::storage::{
    ClientStorage, InMemoryAuthorizationCodeStorage, InMemoryClientStorage, InMemoryJtiStorage,
};
use tokengate_auth::types::{Client, TokenEndpointAuthMethod};

const ISSUER: &str = "https://as.example.com";
const REDIRECT_URI: &str = "https://rp.example.com/callback";
const SECRET: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

fn config() -> AuthConfig {
    AuthConfig {
        issuer: ISSUER.to_string(),
        ..AuthConfig::default()
    }
}

async fn service_with(clients: Vec<Client>) -> TokenEndpointService {
    let storage = Arc::new(InMemoryClientStorage::new());
    for client in &clients {
        storage.create(client).await.expect("client registration");
    }

    TokenEndpointService::new(
        &config(),
        storage,
        Arc::new(InMemoryAuthorizationCodeStorage::new()),
        Arc::new(InMemoryJtiStorage::new()),
        Arc::new(ClientJwksCache::new(JwksCacheConfig::default()).expect("jwks cache")),
    )
}

fn basic(id: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", id, secret)))
}

fn client_assertion(client_id: &str, alg: Algorithm) -> String {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let claims = json!({
        "iss": client_id,
        "sub": client_id,
        "aud": format!("{}/token", ISSUER),
        "jti": format!("{}-{}", client_id, rand::random::<u64>()),
        "iat": now,
        "exp": now + 120,
    });
    jsonwebtoken::encode(
        &Header::new(alg),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("sign assertion")
}

#[tokio::test]
async fn default_method_is_client_secret_basic() {
    let client: Client = serde_json::from_value(json!({
        "client_id": "default-method",
        "client_secret": SECRET,
        "redirect_uris": [REDIRECT_URI],
    }))
    .unwrap();
    assert_eq!(
        client.token_endpoint_auth_method,
        TokenEndpointAuthMethod::ClientSecretBasic
    );
    assert_eq!(
        serde_json::to_value(&client).unwrap()["token_endpoint_auth_method"],
        "client_secret_basic"
    );

    let service = service_with(vec![client]).await;

    let code = service
        .issue_authorization_code("default-method", Some(REDIRECT_URI), None, None)
        .await
        .unwrap()
        .code;
    let request = TokenRequest::authorization_code(code).with_redirect_uri(REDIRECT_URI);
    let grant = service
        .exchange(&request, Some(&basic("default-method", SECRET)))
        .await
        .unwrap();
    assert_eq!(
        grant.client.auth_method,
        TokenEndpointAuthMethod::ClientSecretBasic
    );

    let code = service
        .issue_authorization_code("default-method", Some(REDIRECT_URI), None, None)
        .await
        .unwrap()
        .code;
    let request = TokenRequest::authorization_code(code)
        .with_redirect_uri(REDIRECT_URI)
        .with_client_id("default-method")
        .with_client_secret(SECRET);
    let err = service.exchange(&request, None).await.unwrap_err();
    assert_eq!(err.oauth_error_code(), "invalid_client");
    assert_eq!(err.http_status(), 401);
}

#[tokio::test]
async fn client_secret_jwt_with_registered_algorithm() {
    let client = Client::new("jwt-client", TokenEndpointAuthMethod::ClientSecretJwt)
        .with_secret(SECRET)
        .with_signing_alg(SigningAlgorithm::HS256)
        .with_redirect_uri(REDIRECT_URI);
    let service = service_with(vec![client]).await;

    let code = service
        .issue_authorization_code("jwt-client", None, None, None)
        .await
        .unwrap()
        .code;

    let request = TokenRequest::authorization_code(&code)
        .with_client_assertion(client_assertion("jwt-client", Algorithm::HS384));
    let err = service.exchange(&request, None).await.unwrap_err();
    assert_eq!(err.oauth_error_code(), "invalid_client");
    assert_eq!(err.http_status(), 401);

    // The failed attempt did not consume the code
    let request = TokenRequest::authorization_code(&code)
        .with_client_assertion(client_assertion("jwt-client", Algorithm::HS256));
    let grant = service.exchange(&request, None).await.unwrap();
    assert_eq!(grant.client.client.client_id, "jwt-client");
    assert_eq!(
        grant.client.auth_method,
        TokenEndpointAuthMethod::ClientSecretJwt
    );
}

#[tokio::test]
async fn pkce_code_redeems_exactly_once() {
    let client = Client::new("pkce-client", TokenEndpointAuthMethod::ClientSecretPost)
        .with_secret(SECRET)
        .with_redirect_uri(REDIRECT_URI);
    let service = service_with(vec![client]).await;

    let verifier = PkceVerifier::generate();
    let challenge = PkceChallenge::derive(&verifier, CodeChallengeMethod::S256);
    let code = service
        .issue_authorization_code(
            "pkce-client",
            Some(REDIRECT_URI),
            Some(challenge.as_str()),
            Some("S256"),
        )
        .await
        .unwrap()
        .code;

    let request = TokenRequest::authorization_code(&code)
        .with_redirect_uri(REDIRECT_URI)
        .with_client_id("pkce-client")
        .with_client_secret(SECRET)
        .with_code_verifier(verifier.as_str());
    assert!(service.exchange(&request, None).await.is_ok());

    let err = service.exchange(&request, None).await.unwrap_err();
    assert_eq!(err.oauth_error_code(), "invalid_grant");

    let other = request.clone().with_code_verifier(PkceVerifier::generate().into_inner());
    let err = service.exchange(&other, None).await.unwrap_err();
    assert_eq!(err.oauth_error_code(), "invalid_grant");
}

#[tokio::test]
async fn pkce_default_method_rejects_bad_or_missing_verifier() {
    let client = Client::new("pkce-client", TokenEndpointAuthMethod::ClientSecretBasic)
        .with_secret(SECRET)
        .with_redirect_uri(REDIRECT_URI);
    let service = service_with(vec![client]).await;
    let header = basic("pkce-client", SECRET);
    let verifier = PkceVerifier::generate();

    for code_verifier in [Some("invalid_code_verifier"), None] {
        let code = service
            .issue_authorization_code("pkce-client", None, Some(verifier.as_str()), None)
            .await
            .unwrap()
            .code;

        let mut request = TokenRequest::authorization_code(code);
        request.code_verifier = code_verifier.map(str::to_string);

        let err = service.exchange(&request, Some(&header)).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
        assert_eq!(err.http_status(), 400);
    }
}

#[test]
fn pkce_validator_follows_rfc_7636() {
    let validator = PkceValidator::new(&PkceConfig::default());
    let record = AuthorizationCodeRecord::new("code", "client", Duration::from_secs(60)).with_pkce(
        "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM",
        Some(CodeChallengeMethod::S256),
    );

    assert!(validator.validate(&record, Some("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk")));
    assert!(!validator.validate(&record, Some("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM")));
    assert!(!validator.validate(&record, Some("")));
    assert!(!validator.validate(&record, None));

    let plain = AuthorizationCodeRecord::new("code", "client", Duration::from_secs(60))
        .with_pkce("same-value", None);
    assert!(validator.validate(&plain, Some("same-value")));
    assert!(!validator.validate(&plain, Some("Same-value")));

    let without = AuthorizationCodeRecord::new("code", "client", Duration::from_secs(60));
    assert!(validator.validate(&without, None));
    assert!(validator.validate(&without, Some("anything")));
}
