//! HTTP surface of the cardápio backend
//!
//! JSON API under `/api`, server-rendered pages for the browser, OAuth
//! redirects, and the OpenAPI document with Swagger UI.

pub mod accounts;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;

use std::{net::SocketAddr, sync::Arc};

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use cardapio_auth::{IdentityProvider, Provider, SessionSigner};
use sea_orm::DatabaseConnection;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use error::ApiError;

/// Application state shared across handlers
pub struct AppState {
    pub db: DatabaseConnection,
    pub sessions: SessionSigner,
    pub google: Option<Arc<dyn IdentityProvider>>,
    pub facebook: Option<Arc<dyn IdentityProvider>>,
    /// Externally visible base URL, used for OAuth redirect URIs
    pub public_url: String,
    pub allow_signup: bool,
    /// Mark cookies `Secure` (public URL is https)
    pub secure_cookies: bool,
}

impl AppState {
    pub fn identity_provider(&self, provider: Provider) -> Option<&Arc<dyn IdentityProvider>> {
        match provider {
            Provider::Google => self.google.as_ref(),
            Provider::Facebook => self.facebook.as_ref(),
        }
    }

    pub fn redirect_uri(&self, provider: Provider) -> String {
        format!(
            "{}/login/{}/callback",
            self.public_url.trim_end_matches('/'),
            provider
        )
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cardápio API",
        version = "0.1.0",
        description = "Restaurant menu management: accounts, categories, products and the generated menu"
    ),
    paths(
        handlers::health::health_check,
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::get_current_user,
        handlers::auth::delete_current_user,
        handlers::categories::list_categories,
        handlers::categories::create_category,
        handlers::categories::get_category,
        handlers::categories::update_category,
        handlers::categories::delete_category,
        handlers::categories::list_category_products,
        handlers::products::list_products,
        handlers::products::create_product,
        handlers::products::get_product,
        handlers::products::update_product,
        handlers::products::delete_product,
        handlers::products::get_menu,
    ),
    components(
        schemas(
            models::HealthResponse,
            models::ErrorResponse,
            models::RegisterRequest,
            models::LoginRequest,
            models::LoginMethods,
            models::UserResponse,
            models::SessionResponse,
            models::CategoryRequest,
            models::CategoryResponse,
            models::ProductRequest,
            models::ProductResponse,
            models::MenuItemResponse,
            models::MenuCategoryResponse,
            models::MenuResponse,
            accounts::AuthMethods,
        )
    ),
    tags(
        (name = "auth", description = "Accounts and sessions"),
        (name = "categories", description = "Category management"),
        (name = "products", description = "Product management and the menu"),
        (name = "system", description = "System health and info endpoints")
    )
)]
pub struct ApiDoc;

/// API server configuration
pub struct ApiServerConfig {
    /// Address to bind the API server
    pub bind_addr: SocketAddr,
    /// Enable CORS (for development)
    pub enable_cors: bool,
    /// Secret used to sign session tokens
    pub session_secret: String,
    pub session_validity: chrono::Duration,
    /// Base URL browsers reach the service at
    pub public_url: String,
    pub allow_signup: bool,
}

/// API Server
pub struct ApiServer {
    config: ApiServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    /// Create a new API server; each identity provider is enabled for the
    /// provider it reports
    pub fn new(
        config: ApiServerConfig,
        db: DatabaseConnection,
        identity_providers: Vec<Arc<dyn IdentityProvider>>,
    ) -> Self {
        let mut google = None;
        let mut facebook = None;
        for idp in identity_providers {
            match idp.provider() {
                Provider::Google => google = Some(idp),
                Provider::Facebook => facebook = Some(idp),
            }
        }

        let state = Arc::new(AppState {
            db,
            sessions: SessionSigner::new(
                config.session_secret.as_bytes(),
                config.session_validity,
            ),
            google,
            facebook,
            secure_cookies: config.public_url.starts_with("https://"),
            public_url: config.public_url.clone(),
            allow_signup: config.allow_signup,
        });

        Self { config, state }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        use handlers::{auth, categories, health, oauth, pages, products};

        let api_doc = ApiDoc::openapi();

        // Build PUBLIC routes (no authentication required)
        let public_router = Router::new()
            .route("/api/health", get(health::health_check))
            .route("/api/auth/register", post(auth::register))
            .route("/api/auth/login", post(auth::login))
            .route("/api/auth/logout", post(auth::logout))
            .route("/login", get(pages::login_page).post(pages::login_submit))
            .route(
                "/cadastro_usuario",
                get(pages::signup_page).post(pages::signup_submit),
            )
            .route("/logout", get(pages::logout_page))
            .route("/login/{provider}", get(oauth::oauth_login))
            .route("/login/{provider}/callback", get(oauth::oauth_callback))
            .with_state(self.state.clone());

        // Build PROTECTED API routes (401 without a session)
        let protected_api = Router::new()
            .route(
                "/api/auth/me",
                get(auth::get_current_user).delete(auth::delete_current_user),
            )
            .route(
                "/api/categorias",
                get(categories::list_categories).post(categories::create_category),
            )
            .route(
                "/api/categorias/",
                get(categories::list_categories).post(categories::create_category),
            )
            .route(
                "/api/categorias/{id}",
                get(categories::get_category)
                    .put(categories::update_category)
                    .delete(categories::delete_category),
            )
            .route(
                "/api/categorias/{id}/produtos",
                get(categories::list_category_products),
            )
            .route(
                "/api/produtos",
                get(products::list_products).post(products::create_product),
            )
            .route(
                "/api/produtos/",
                get(products::list_products).post(products::create_product),
            )
            .route("/api/produtos/cardapio", get(products::get_menu))
            .route(
                "/api/produtos/{id}",
                get(products::get_product)
                    .put(products::update_product)
                    .delete(products::delete_product),
            )
            .with_state(self.state.clone())
            .route_layer(axum_middleware::from_fn_with_state(
                self.state.clone(),
                middleware::require_auth,
            ));

        // Build PROTECTED pages (redirect to /login without a session)
        let protected_pages = Router::new()
            .route("/", get(pages::dashboard))
            .route("/dashboard", get(pages::dashboard))
            .route("/cardapio", get(pages::menu_page))
            .route(
                "/categorias",
                get(pages::categories_page).post(pages::categories_submit),
            )
            .route(
                "/create_categoria",
                get(pages::create_category_page).post(pages::create_category_submit),
            )
            .route(
                "/edit_categoria/{id}",
                get(pages::edit_category_page).post(pages::edit_category_submit),
            )
            .route("/delete_categoria/{id}", post(pages::delete_category_submit))
            .route(
                "/create_product",
                get(pages::create_product_page).post(pages::create_product_submit),
            )
            .with_state(self.state.clone())
            .route_layer(axum_middleware::from_fn_with_state(
                self.state.clone(),
                middleware::require_page_auth,
            ));

        let router = Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", api_doc))
            .merge(public_router)
            .merge(protected_api)
            .merge(protected_pages);

        // Configure CORS
        let cors = if self.config.enable_cors {
            use tower_http::cors::AllowOrigin;

            let public_origin = self.config.public_url.trim_end_matches('/').to_string();

            // Cookie auth needs credentials, so origins must be explicit
            let cors_layer = CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
                .allow_credentials(true)
                .allow_origin(AllowOrigin::predicate(
                    move |origin: &HeaderValue, _| {
                        let origin_str = origin.to_str().unwrap_or("");
                        origin_str == public_origin
                            || origin_str.starts_with("http://localhost:")
                            || origin_str.starts_with("http://127.0.0.1:")
                    },
                ));

            Some(cors_layer)
        } else {
            None
        };

        // Build middleware stack
        let mut router = router.layer(TraceLayer::new_for_http());

        if let Some(cors) = cors {
            router = router.layer(cors);
        }

        router
    }

    /// Start the API server
    pub async fn start(self) -> Result<(), anyhow::Error> {
        let router = self.build_router();

        info!("Starting API server on {}", self.config.bind_addr);
        info!(
            "OpenAPI spec: http://{}/api/openapi.json",
            self.config.bind_addr
        );
        info!("Swagger UI: http://{}/swagger-ui", self.config.bind_addr);
        for provider in [Provider::Google, Provider::Facebook] {
            if self.state.identity_provider(provider).is_some() {
                info!("{} login enabled", provider);
            }
        }

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        axum::serve(listener, router)
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_value(&doc).unwrap();

        assert!(json["paths"]["/api/produtos/cardapio"].is_object());
        assert!(json["paths"]["/api/categorias/{id}"].is_object());
    }
}
