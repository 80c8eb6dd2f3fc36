//! Request and response bodies
//!
//! Field names on the wire are the Portuguese ones the web client uses
//! (`nome`, `preco`, `categoria_id`, ...).

use std::collections::BTreeMap;
use std::str::FromStr;

use cardapio_db::entities::{category, product, user};
use cardapio_db::{Menu, MenuBucket, MenuItem};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::accounts::AuthMethods;
use crate::error::ApiError;

/// Timestamp format of the menu's `atualizado_em`
pub const MENU_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

// ============================================================================
// Accounts
// ============================================================================

/// Local account registration
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[serde(rename = "nome", default)]
    #[schema(example = "Cantina da Ana")]
    pub name: Option<String>,
    #[serde(default)]
    #[schema(example = "ana@example.com")]
    pub email: Option<String>,
    /// Login secret; may already be hashed by the client
    #[serde(rename = "senha", default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "senha", default)]
    pub password: Option<String>,
}

/// Login methods attached to an account
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginMethods {
    #[serde(rename = "senha")]
    pub password: bool,
    pub google: bool,
    pub facebook: bool,
    /// Overall state: `local_only`, `google_linked`, `facebook_linked` or `mixed`
    #[serde(rename = "estado")]
    pub state: AuthMethods,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
    #[serde(rename = "metodos_login")]
    pub login_methods: LoginMethods,
    #[serde(rename = "criado_em")]
    pub created_at: DateTime<Utc>,
}

impl From<&user::Model> for UserResponse {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            login_methods: LoginMethods {
                password: user.password_hash.is_some(),
                google: user.google_login,
                facebook: user.facebook_login,
                state: AuthMethods::of(user),
            },
            created_at: user.created_at,
        }
    }
}

/// Issued on registration and login; the token is also set as a cookie
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    #[serde(rename = "usuario")]
    pub user: UserResponse,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Categories
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CategoryRequest {
    #[serde(rename = "nome", default)]
    #[schema(example = "Bebidas")]
    pub name: Option<String>,
    /// An empty string clears the description on update
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponse {
    pub id: i32,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "descricao")]
    pub description: Option<String>,
    #[serde(rename = "quantidade_produtos")]
    pub product_count: u64,
    #[serde(rename = "criado_em")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "atualizado_em")]
    pub updated_at: DateTime<Utc>,
}

impl CategoryResponse {
    pub fn new(category: category::Model, product_count: u64) -> Self {
        Self {
            id: category.id,
            name: category.name,
            description: category.description,
            product_count,
            created_at: category.created_at,
            updated_at: category.updated_at,
        }
    }
}

// ============================================================================
// Products
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProductRequest {
    #[serde(rename = "nome", default)]
    #[schema(example = "X-Burguer")]
    pub name: Option<String>,
    /// Number or numeric string, at most two fractional digits are kept
    #[serde(rename = "preco", default)]
    #[schema(value_type = Option<String>, example = "12.50")]
    pub price: Option<serde_json::Value>,
    #[serde(rename = "categoria_id", default)]
    pub category_id: Option<i32>,
    #[serde(rename = "disponivel", default)]
    pub available: Option<bool>,
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
    #[serde(rename = "quantidade", default)]
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: i32,
    #[serde(rename = "nome")]
    pub name: String,
    /// Fixed-point price with two fractional digits
    #[serde(rename = "preco")]
    #[schema(example = "12.50")]
    pub price: String,
    #[serde(rename = "disponivel")]
    pub available: bool,
    #[serde(rename = "descricao")]
    pub description: Option<String>,
    #[serde(rename = "quantidade")]
    pub quantity: Option<i32>,
    #[serde(rename = "categoria_id")]
    pub category_id: Option<i32>,
    #[serde(rename = "criado_em")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "atualizado_em")]
    pub updated_at: DateTime<Utc>,
}

impl From<product::Model> for ProductResponse {
    fn from(product: product::Model) -> Self {
        Self {
            id: product.id,
            price: product.price().to_string(),
            name: product.name,
            available: product.available,
            description: product.description,
            quantity: product.quantity,
            category_id: product.category_id,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

/// Filters for the product list
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    /// Only available (`true`) or only unavailable (`false`) products
    pub disponivel: Option<bool>,
}

/// Parse a price given as a JSON number or a numeric string
pub fn parse_price(value: &serde_json::Value) -> Result<Decimal, ApiError> {
    let text = match value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.trim().replace(',', "."),
        _ => return Err(ApiError::Validation("price must be a number".to_string())),
    };

    // `Decimal::from_str` also takes digit separators such as `1_000`
    if !text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    {
        return Err(ApiError::Validation(format!(
            "price '{}' is not a valid number",
            text
        )));
    }

    let price = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| ApiError::Validation(format!("price '{}' is not a valid number", text)))?;

    if price.is_sign_negative() && !price.is_zero() {
        return Err(ApiError::Validation("price must not be negative".to_string()));
    }

    Ok(price)
}

// ============================================================================
// Menu
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MenuItemResponse {
    pub id: i32,
    pub nome: String,
    pub preco: f64,
    pub quantidade: Option<i32>,
    pub descricao: Option<String>,
}

impl From<MenuItem> for MenuItemResponse {
    fn from(item: MenuItem) -> Self {
        Self {
            id: item.id,
            nome: item.name,
            preco: item.price,
            quantidade: item.quantity,
            descricao: item.description,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct MenuCategoryResponse {
    pub disponiveis: Vec<MenuItemResponse>,
    pub indisponiveis: Vec<MenuItemResponse>,
}

impl From<MenuBucket> for MenuCategoryResponse {
    fn from(bucket: MenuBucket) -> Self {
        Self {
            disponiveis: bucket.available.into_iter().map(Into::into).collect(),
            indisponiveis: bucket.unavailable.into_iter().map(Into::into).collect(),
        }
    }
}

/// The cardápio: products grouped by category name, split by availability
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MenuResponse {
    /// Generation time, `dd/mm/yyyy HH:MM:SS` (UTC)
    pub atualizado_em: String,
    pub categorias: BTreeMap<String, MenuCategoryResponse>,
    pub total_produtos: usize,
    pub usuario: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub erro: Option<String>,
}

impl From<Menu> for MenuResponse {
    fn from(menu: Menu) -> Self {
        Self {
            atualizado_em: menu.generated_at.format(MENU_TIMESTAMP_FORMAT).to_string(),
            categorias: menu
                .categories
                .into_iter()
                .map(|(name, bucket)| (name, bucket.into()))
                .collect(),
            total_produtos: menu.total_products,
            usuario: menu.owner,
            erro: menu.error,
        }
    }
}

// ============================================================================
// OAuth and HTML forms
// ============================================================================

/// Query string of a provider callback
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub senha: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub senha: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryForm {
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub descricao: String,
}

/// HTML product form; checkboxes are only sent when ticked
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductForm {
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub preco: String,
    #[serde(default)]
    pub categoria_id: String,
    #[serde(default)]
    pub disponivel: Option<String>,
    #[serde(default)]
    pub descricao: String,
    #[serde(default)]
    pub quantidade: String,
}

/// Optional `?erro=` message shown on HTML pages
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMessage {
    pub erro: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_price_accepts_numbers_and_strings() {
        assert_eq!(parse_price(&json!(12.5)).unwrap().to_string(), "12.5");
        assert_eq!(parse_price(&json!("12.50")).unwrap().to_string(), "12.50");
        assert_eq!(parse_price(&json!("7,25")).unwrap().to_string(), "7.25");
        assert_eq!(parse_price(&json!(3)).unwrap(), Decimal::from(3));
        assert!(parse_price(&json!(0)).is_ok());
    }

    #[test]
    fn test_parse_price_rejects_garbage() {
        assert!(matches!(
            parse_price(&json!("doze reais")),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(parse_price(&json!(true)), Err(ApiError::Validation(_))));
        assert!(matches!(parse_price(&json!(null)), Err(ApiError::Validation(_))));
        assert!(matches!(parse_price(&json!(-1.0)), Err(ApiError::Validation(_))));
        assert!(matches!(parse_price(&json!("-0.01")), Err(ApiError::Validation(_))));
        assert!(matches!(parse_price(&json!("1_000")), Err(ApiError::Validation(_))));
        assert!(matches!(parse_price(&json!("1 000")), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_register_request_uses_portuguese_names() {
        let request: RegisterRequest = serde_json::from_value(json!({
            "nome": "Ana",
            "email": "ana@example.com",
            "senha": "segredo"
        }))
        .unwrap();

        assert_eq!(request.name.as_deref(), Some("Ana"));
        assert_eq!(request.password.as_deref(), Some("segredo"));

        let empty: RegisterRequest = serde_json::from_value(json!({})).unwrap();
        assert!(empty.name.is_none());
    }

    #[test]
    fn test_menu_response_shape() {
        let mut categories = BTreeMap::new();
        categories.insert(
            "Bebidas".to_string(),
            MenuBucket {
                available: vec![MenuItem {
                    id: 1,
                    name: "Suco".to_string(),
                    price: 7.5,
                    quantity: Some(3),
                    description: None,
                }],
                unavailable: vec![],
            },
        );
        let menu = Menu {
            generated_at: Utc::now(),
            categories,
            total_products: 1,
            owner: "Ana".to_string(),
            error: None,
        };

        let json = serde_json::to_value(MenuResponse::from(menu)).unwrap();

        assert_eq!(json["total_produtos"], 1);
        assert_eq!(json["usuario"], "Ana");
        assert_eq!(json["categorias"]["Bebidas"]["disponiveis"][0]["nome"], "Suco");
        assert_eq!(json["categorias"]["Bebidas"]["disponiveis"][0]["preco"], 7.5);
        assert!(json["categorias"]["Bebidas"]["indisponiveis"]
            .as_array()
            .unwrap()
            .is_empty());
        assert!(json.get("erro").is_none());
        // dd/mm/yyyy HH:MM:SS
        assert_eq!(json["atualizado_em"].as_str().unwrap().len(), 19);
    }
}
