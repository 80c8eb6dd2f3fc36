use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use cardapio_db::build_menu;
use cardapio_db::repository::products::{self, NewProduct, ProductChanges};
use tracing::{debug, info};

use super::non_blank;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::models::*;
use crate::AppState;

fn check_quantity(quantity: Option<i32>) -> Result<Option<i32>, ApiError> {
    match quantity {
        Some(q) if q < 0 => Err(ApiError::Validation(
            "field 'quantidade' must not be negative".to_string(),
        )),
        other => Ok(other),
    }
}

/// Validate a create request
pub(crate) fn new_product_from(req: ProductRequest) -> Result<NewProduct, ApiError> {
    let name = non_blank(req.name.as_deref())
        .ok_or_else(|| ApiError::Validation("field 'nome' is required".to_string()))?;
    let price = req
        .price
        .as_ref()
        .ok_or_else(|| ApiError::Validation("field 'preco' is required".to_string()))
        .and_then(parse_price)?;
    let category_id = req
        .category_id
        .ok_or_else(|| ApiError::Validation("field 'categoria_id' is required".to_string()))?;

    Ok(NewProduct {
        name,
        price,
        available: req.available.unwrap_or(true),
        description: non_blank(req.description.as_deref()),
        quantity: Some(check_quantity(req.quantity)?.unwrap_or(0)),
        category_id: Some(category_id),
    })
}

/// A category lookup that missed means the caller does not own it
fn category_not_found(err: cardapio_db::RepoError) -> ApiError {
    match ApiError::from(err) {
        ApiError::NotFound(_) => ApiError::not_found("category"),
        other => other,
    }
}

/// List the caller's products, by id
#[utoipa::path(
    get,
    path = "/api/produtos",
    params(ProductQuery),
    responses(
        (status = 200, description = "Products", body = Vec<ProductResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    debug!(user_id = user.user_id, ?query, "Listing products");

    let rows = match query.disponivel {
        Some(true) => products::find_available_for_owner(&state.db, user.user_id).await?,
        Some(false) => products::find_all_for_owner(&state.db, user.user_id)
            .await?
            .into_iter()
            .filter(|p| !p.available)
            .collect(),
        None => products::find_all_for_owner(&state.db, user.user_id).await?,
    };

    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Create a product in one of the caller's categories
#[utoipa::path(
    post,
    path = "/api/produtos",
    request_body = ProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Missing field or invalid price", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse)
    ),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<ProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let new_product = new_product_from(req)?;

    let created = products::create(&state.db, user.user_id, new_product)
        .await
        .map_err(category_not_found)?;

    info!(user_id = user.user_id, product_id = created.id, "Created product");
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// Get one product
#[utoipa::path(
    get,
    path = "/api/produtos/{id}",
    params(("id" = i32, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = ProductResponse),
        (status = 404, description = "Product not found", body = ErrorResponse)
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = products::find_by_id_and_owner(&state.db, id, user.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("product"))?;

    Ok(Json(product.into()))
}

/// Update the fields present in the body
#[utoipa::path(
    put,
    path = "/api/produtos/{id}",
    params(("id" = i32, Path, description = "Product ID")),
    request_body = ProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
        (status = 400, description = "Invalid field", body = ErrorResponse),
        (status = 404, description = "Product or category not found", body = ErrorResponse)
    ),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(req): ApiJson<ProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let name = match req.name.as_deref() {
        Some(raw) => Some(
            non_blank(Some(raw))
                .ok_or_else(|| ApiError::Validation("field 'nome' must not be blank".to_string()))?,
        ),
        None => None,
    };
    let price = req.price.as_ref().map(parse_price).transpose()?;

    let changes = ProductChanges {
        name,
        price,
        available: req.available,
        description: req.description.as_deref().map(|d| non_blank(Some(d))),
        quantity: check_quantity(req.quantity)?.map(Some),
        category_id: req.category_id.map(Some),
    };

    // Tell a foreign category apart from a foreign product
    if products::find_by_id_and_owner(&state.db, id, user.user_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("product"));
    }

    let updated = products::save(&state.db, id, user.user_id, changes)
        .await
        .map_err(category_not_found)?;

    Ok(Json(updated.into()))
}

/// Delete a product
#[utoipa::path(
    delete,
    path = "/api/produtos/{id}",
    params(("id" = i32, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Product not found", body = ErrorResponse)
    ),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<StatusCode, ApiError> {
    if !products::delete_by_id_and_owner(&state.db, id, user.user_id).await? {
        return Err(ApiError::not_found("product"));
    }

    info!(user_id = user.user_id, product_id = id, "Deleted product");
    Ok(StatusCode::NO_CONTENT)
}

/// The caller's cardápio
///
/// Always answers 200; when the menu cannot be built the body carries
/// `erro` and no categories.
#[utoipa::path(
    get,
    path = "/api/produtos/cardapio",
    responses(
        (status = 200, description = "Menu grouped by category", body = MenuResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "products"
)]
pub async fn get_menu(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<MenuResponse> {
    let mut menu = build_menu(&state.db, user.user_id).await;
    if menu.owner.is_empty() {
        menu.owner = user.name;
    }
    Json(menu.into())
}
