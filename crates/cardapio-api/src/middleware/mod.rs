//! API Middleware
//!
//! Session authentication for the JSON API and the HTML pages.

pub mod auth;

pub use auth::{
    authenticate, clear_cookie, read_cookie, require_auth, require_page_auth, set_cookie,
    AuthUser, OAUTH_STATE_COOKIE, SESSION_COOKIE,
};
