//! Federated login: account linking rules and the provider redirect flow

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use cardapio_api::accounts::{self, AccountError, AuthMethods};
use cardapio_api::{ApiServer, ApiServerConfig};
use cardapio_auth::{FederatedIdentity, IdentityProvider, OAuthError, Provider};
use cardapio_db::repository::users;
use mockall::mock;
use sea_orm::DatabaseConnection;
use tower::ServiceExt;

mock! {
    pub Idp {}

    #[async_trait]
    impl IdentityProvider for Idp {
        fn provider(&self) -> Provider;
        fn authorize_url(&self, state: &str, redirect_uri: &str) -> Result<String, OAuthError>;
        async fn exchange(&self, code: &str, redirect_uri: &str) -> Result<FederatedIdentity, OAuthError>;
    }
}

/// Helper to create an in-memory database with migrations applied
async fn create_test_db() -> DatabaseConnection {
    let db = cardapio_db::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    cardapio_db::migrate(&db)
        .await
        .expect("Failed to run migrations");

    db
}

fn create_test_app(db: DatabaseConnection, providers: Vec<Arc<dyn IdentityProvider>>) -> Router {
    let config = ApiServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        enable_cors: false,
        session_secret: "test-secret".to_string(),
        session_validity: chrono::Duration::hours(1),
        public_url: "http://localhost:8080".to_string(),
        allow_signup: true,
    };

    ApiServer::new(config, db, providers).build_router()
}

fn identity(provider: Provider, subject: &str, email: &str, verified: bool) -> FederatedIdentity {
    FederatedIdentity {
        provider,
        subject: subject.to_string(),
        email: email.to_string(),
        email_verified: verified,
        name: "Ana Souza".to_string(),
    }
}

/// A Google stand-in whose code exchange answers with `who`
fn google_idp(who: FederatedIdentity, exchanges: usize) -> MockIdp {
    let mut idp = MockIdp::new();
    idp.expect_provider().return_const(Provider::Google);
    idp.expect_authorize_url().returning(|state, redirect_uri| {
        Ok(format!(
            "https://accounts.google.test/auth?state={}&redirect_uri={}",
            state, redirect_uri
        ))
    });
    idp.expect_exchange()
        .times(exchanges)
        .returning(move |_, _| Ok(who.clone()));
    idp
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// Value of cookie `name` among the response's `Set-Cookie` headers
fn cookie_value(response: &Response, name: &str) -> Option<String> {
    set_cookies(response).into_iter().find_map(|cookie| {
        cookie
            .split(';')
            .next()
            .and_then(|pair| pair.strip_prefix(&format!("{}=", name)))
            .map(str::to_string)
    })
}

async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Run `/login/google` then the callback carrying the state it issued
async fn google_round_trip(app: &Router) -> Response {
    let start = get(app, "/login/google", None).await;
    let state = cookie_value(&start, "oauth_state").expect("state cookie");

    get(
        app,
        &format!("/login/google/callback?code=auth-code&state={}", state),
        Some(&format!("oauth_state={}", state)),
    )
    .await
}

// ============================================================================
// Linking rules
// ============================================================================

#[tokio::test]
async fn test_repeat_login_reuses_account() {
    let db = create_test_db().await;
    let who = identity(Provider::Google, "g-123", "Ana@Example.com", true);

    let first = accounts::login_federated(&db, &who).await.unwrap();
    let second = accounts::login_federated(&db, &who).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.email, "ana@example.com");
    assert!(first.password_hash.is_none());
    assert_eq!(AuthMethods::of(&second), AuthMethods::GoogleLinked);
}

#[tokio::test]
async fn test_concurrent_first_logins_share_one_account() {
    let db = create_test_db().await;
    let who = identity(Provider::Google, "g-123", "ana@example.com", true);

    let (first, second) = tokio::join!(
        accounts::login_federated(&db, &who),
        accounts::login_federated(&db, &who)
    );

    let first = first.unwrap();
    let second = second.unwrap();
    assert_eq!(first.id, second.id);

    let account = users::find_by_google_id(&db, "g-123").await.unwrap().unwrap();
    assert_eq!(account.id, first.id);
    assert!(users::find_by_id(&db, first.id + 1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_verified_email_links_local_account() {
    let db = create_test_db().await;
    let local = accounts::register(&db, Some("Ana"), Some("ana@example.com"), Some("segredo"))
        .await
        .unwrap();

    let linked = accounts::login_federated(
        &db,
        &identity(Provider::Google, "g-123", "ANA@example.com", true),
    )
    .await
    .unwrap();

    assert_eq!(linked.id, local.id);
    assert_eq!(linked.google_id.as_deref(), Some("g-123"));
    assert_eq!(AuthMethods::of(&linked), AuthMethods::Mixed);

    // The password keeps working
    let by_password = accounts::login_local(&db, Some("ana@example.com"), Some("segredo"))
        .await
        .unwrap();
    assert_eq!(by_password.id, local.id);
}

#[tokio::test]
async fn test_unverified_email_does_not_link() {
    let db = create_test_db().await;
    let local = accounts::register(&db, Some("Ana"), Some("ana@example.com"), Some("segredo"))
        .await
        .unwrap();

    let result = accounts::login_federated(
        &db,
        &identity(Provider::Google, "g-123", "ana@example.com", false),
    )
    .await;

    assert!(matches!(
        result,
        Err(AccountError::EmailNotVerified(Provider::Google))
    ));
    let unchanged = users::get(&db, local.id).await.unwrap();
    assert!(unchanged.google_id.is_none());
    assert_eq!(AuthMethods::of(&unchanged), AuthMethods::LocalOnly);
}

#[tokio::test]
async fn test_different_identity_for_same_provider_rejected() {
    let db = create_test_db().await;
    accounts::login_federated(
        &db,
        &identity(Provider::Google, "g-123", "ana@example.com", true),
    )
    .await
    .unwrap();

    let result = accounts::login_federated(
        &db,
        &identity(Provider::Google, "g-999", "ana@example.com", true),
    )
    .await;

    assert!(matches!(
        result,
        Err(AccountError::IdentityMismatch(Provider::Google))
    ));
}

#[tokio::test]
async fn test_two_providers_make_mixed_account() {
    let db = create_test_db().await;
    let via_google = accounts::login_federated(
        &db,
        &identity(Provider::Google, "g-123", "ana@example.com", true),
    )
    .await
    .unwrap();

    let via_facebook = accounts::login_federated(
        &db,
        &identity(Provider::Facebook, "fb-456", "ana@example.com", true),
    )
    .await
    .unwrap();

    assert_eq!(via_google.id, via_facebook.id);
    assert!(via_facebook.google_login);
    assert!(via_facebook.facebook_login);
    assert_eq!(AuthMethods::of(&via_facebook), AuthMethods::Mixed);
}

#[tokio::test]
async fn test_display_name_refreshed_on_login() {
    let db = create_test_db().await;
    let mut who = identity(Provider::Facebook, "fb-456", "ana@example.com", true);
    accounts::login_federated(&db, &who).await.unwrap();

    who.name = "Ana S.".to_string();
    let refreshed = accounts::login_federated(&db, &who).await.unwrap();
    assert_eq!(refreshed.name, "Ana S.");

    // An empty name from the provider keeps the stored one
    who.name = String::new();
    let kept = accounts::login_federated(&db, &who).await.unwrap();
    assert_eq!(kept.name, "Ana S.");
}

// ============================================================================
// Redirect flow
// ============================================================================

#[tokio::test]
async fn test_login_redirects_to_provider_with_state() {
    let idp = google_idp(identity(Provider::Google, "g-1", "a@example.com", true), 0);
    let app = create_test_app(create_test_db().await, vec![Arc::new(idp)]);

    let response = get(&app, "/login/google", None).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let state = cookie_value(&response, "oauth_state").unwrap();
    assert_eq!(state.len(), 32);

    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://accounts.google.test/auth"));
    assert!(location.contains(&format!("state={}", state)));
    assert!(location.contains("redirect_uri=http://localhost:8080/login/google/callback"));
}

#[tokio::test]
async fn test_callback_starts_session_once_per_identity() {
    let db = create_test_db().await;
    let idp = google_idp(identity(Provider::Google, "g-123", "ana@example.com", true), 2);
    let app = create_test_app(db.clone(), vec![Arc::new(idp)]);

    for _ in 0..2 {
        let response = google_round_trip(&app).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/dashboard");
        assert!(cookie_value(&response, "session_token").is_some());
        assert!(set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("oauth_state=;") && c.contains("Max-Age=0")));
    }

    let account = users::find_by_google_id(&db, "g-123").await.unwrap().unwrap();
    assert_eq!(account.name, "Ana Souza");
    assert!(users::find_by_id(&db, account.id + 1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_callback_session_opens_dashboard() {
    let idp = google_idp(identity(Provider::Google, "g-123", "ana@example.com", true), 1);
    let app = create_test_app(create_test_db().await, vec![Arc::new(idp)]);

    let response = google_round_trip(&app).await;
    let token = cookie_value(&response, "session_token").unwrap();

    let response = get(&app, "/dashboard", Some(&format!("session_token={}", token))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_callback_with_mismatched_state() {
    let idp = google_idp(identity(Provider::Google, "g-1", "a@example.com", true), 0);
    let app = create_test_app(create_test_db().await, vec![Arc::new(idp)]);

    let response = get(
        &app,
        "/login/google/callback?code=auth-code&state=forged",
        Some("oauth_state=expected"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/login?erro=estado_invalido"
    );
    assert!(cookie_value(&response, "session_token").is_none());

    // No state cookie at all
    let response = get(&app, "/login/google/callback?code=auth-code&state=forged", None).await;
    assert_eq!(
        response.headers()[header::LOCATION],
        "/login?erro=estado_invalido"
    );
}

#[tokio::test]
async fn test_failed_exchange_redirects_to_login() {
    let mut idp = MockIdp::new();
    idp.expect_provider().return_const(Provider::Google);
    idp.expect_authorize_url()
        .returning(|state, _| Ok(format!("https://accounts.google.test/auth?state={}", state)));
    idp.expect_exchange()
        .times(1)
        .returning(|_, _| Err(OAuthError::Rejected("invalid_grant".to_string())));
    let app = create_test_app(create_test_db().await, vec![Arc::new(idp)]);

    let response = google_round_trip(&app).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/login?erro=login_falhou"
    );
}

#[tokio::test]
async fn test_unconfigured_provider() {
    let app = create_test_app(create_test_db().await, Vec::new());

    for uri in ["/login/facebook", "/login/facebook/callback?code=x&state=y"] {
        let response = get(&app, uri, None).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/login?erro=provedor_indisponivel"
        );
    }
}
