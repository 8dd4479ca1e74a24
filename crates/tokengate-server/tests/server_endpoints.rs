use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http_body_util::BodyExt;
use tokengate_auth::oauth::{CodeChallengeMethod, PkceChallenge, PkceVerifier};
use tokengate_auth::types::{Client, GrantType, TokenEndpointAuthMethod};
use tokengate_server::config::AppConfig;
use tokengate_server::{ServerBuilder, TokengateServer};
use tower::ServiceExt;

const REDIRECT_URI: &str = "https://app.example.com/callback";

async fn server() -> TokengateServer {
    let mut native = Client::new("native", TokenEndpointAuthMethod::None)
        .with_redirect_uri(REDIRECT_URI);
    native.grant_types = vec![GrantType::AuthorizationCode, GrantType::RefreshToken];

    let cfg = AppConfig {
        clients: vec![
            native,
            Client::new("backend", TokenEndpointAuthMethod::ClientSecretPost)
                .with_secret("backend-secret")
                .with_redirect_uri(REDIRECT_URI),
        ],
        ..AppConfig::default()
    };
    ServerBuilder::new()
        .with_config(cfg)
        .build()
        .await
        .expect("server builds")
}

fn form(body: String, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoint() {
    let server = server().await;
    let response = server
        .router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["status"], "ok");
}

#[tokio::test]
async fn public_client_redeems_pkce_code_once() {
    let server = server().await;
    let verifier = PkceVerifier::generate();
    let challenge = PkceChallenge::derive(&verifier, CodeChallengeMethod::S256);
    let code = server
        .service()
        .issue_authorization_code(
            "native",
            Some(REDIRECT_URI),
            Some(challenge.as_str()),
            Some("S256"),
        )
        .await
        .unwrap()
        .code;

    let body = format!(
        "grant_type=authorization_code&client_id=native&code={code}&redirect_uri=https%3A%2F%2Fapp.example.com%2Fcallback&code_verifier={}",
        verifier.as_str()
    );

    let response = server.router().oneshot(form(body.clone(), None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    let tokens = json(response).await;
    assert_eq!(tokens["token_type"], "Bearer");
    assert_eq!(tokens["expires_in"], 3600);
    assert!(tokens["access_token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(tokens["refresh_token"].is_string());

    let response = server.router().oneshot(form(body, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "invalid_grant");
}

#[tokio::test]
async fn wrong_method_gets_basic_challenge() {
    let server = server().await;
    let basic = format!("Basic {}", STANDARD.encode("backend:backend-secret"));

    let response = server
        .router()
        .oneshot(form(
            "grant_type=authorization_code&code=unused".to_string(),
            Some(&basic),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[header::WWW_AUTHENTICATE],
        "Basic realm=\"token\""
    );
    let body = json(response).await;
    assert_eq!(body["error"], "invalid_client");
    assert_eq!(body["error_description"], "Client authentication failed");
}

#[tokio::test]
async fn token_endpoint_only_accepts_post() {
    let server = server().await;
    let response = server
        .router()
        .oneshot(Request::get("/token").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn duplicate_clients_fail_to_build() {
    let client = Client::new("twice", TokenEndpointAuthMethod::None).with_redirect_uri(REDIRECT_URI);
    let cfg = AppConfig {
        clients: vec![client.clone(), client],
        ..AppConfig::default()
    };
    assert!(ServerBuilder::new().with_config(cfg).build().await.is_err());
}

#[tokio::test]
async fn zero_cleanup_interval_fails_to_build() {
    let mut cfg = AppConfig::default();
    cfg.storage.cleanup_interval = std::time::Duration::ZERO;
    assert!(ServerBuilder::new().with_config(cfg).build().await.is_err());
}
