use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use cardapio_db::repository::categories::{self, CategoryChanges, NewCategory};
use cardapio_db::repository::products;
use tracing::{debug, info};

use super::non_blank;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::AuthUser;
use crate::models::*;
use crate::AppState;

/// List the caller's categories, by name
#[utoipa::path(
    get,
    path = "/api/categorias",
    responses(
        (status = 200, description = "Categories", body = Vec<CategoryResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<CategoryResponse>>, ApiError> {
    debug!(user_id = user.user_id, "Listing categories");

    let rows = categories::find_all_for_owner(&state.db, user.user_id).await?;
    let counts = categories::product_counts_for_owner(&state.db, user.user_id).await?;

    Ok(Json(
        rows.into_iter()
            .map(|c| {
                let count = counts.get(&c.id).copied().unwrap_or(0);
                CategoryResponse::new(c, count)
            })
            .collect(),
    ))
}

/// Create a category
#[utoipa::path(
    post,
    path = "/api/categorias",
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 400, description = "Missing name", body = ErrorResponse),
        (status = 409, description = "Name already used", body = ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<CategoryRequest>,
) -> Result<(StatusCode, Json<CategoryResponse>), ApiError> {
    let name = non_blank(req.name.as_deref())
        .ok_or_else(|| ApiError::Validation("field 'nome' is required".to_string()))?;

    if categories::exists_by_name_for_owner(&state.db, user.user_id, &name).await? {
        return Err(ApiError::Conflict(format!(
            "category '{}' already exists",
            name
        )));
    }

    let created = categories::create(
        &state.db,
        user.user_id,
        NewCategory {
            name,
            description: non_blank(req.description.as_deref()),
        },
    )
    .await?;

    info!(user_id = user.user_id, category_id = created.id, "Created category");
    Ok((StatusCode::CREATED, Json(CategoryResponse::new(created, 0))))
}

/// Get one category
#[utoipa::path(
    get,
    path = "/api/categorias/{id}",
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category", body = CategoryResponse),
        (status = 404, description = "Category not found", body = ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<CategoryResponse>, ApiError> {
    let category = categories::find_by_id_and_owner(&state.db, id, user.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("category"))?;
    let count = products::count_for_category_and_owner(&state.db, id, user.user_id).await?;

    Ok(Json(CategoryResponse::new(category, count)))
}

/// Rename a category or change its description
#[utoipa::path(
    put,
    path = "/api/categorias/{id}",
    params(("id" = i32, Path, description = "Category ID")),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = CategoryResponse),
        (status = 400, description = "Blank name", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse),
        (status = 409, description = "Name already used", body = ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(req): ApiJson<CategoryRequest>,
) -> Result<Json<CategoryResponse>, ApiError> {
    let name = match req.name.as_deref() {
        Some(raw) => Some(
            non_blank(Some(raw))
                .ok_or_else(|| ApiError::Validation("field 'nome' must not be blank".to_string()))?,
        ),
        None => None,
    };
    let description = req.description.as_deref().map(|d| non_blank(Some(d)));

    let updated = categories::save(
        &state.db,
        id,
        user.user_id,
        CategoryChanges { name, description },
    )
    .await
    .map_err(|e| match ApiError::from(e) {
        ApiError::NotFound(_) => ApiError::not_found("category"),
        other => other,
    })?;
    let count = products::count_for_category_and_owner(&state.db, id, user.user_id).await?;

    Ok(Json(CategoryResponse::new(updated, count)))
}

/// Delete a category; refused while it still has products
#[utoipa::path(
    delete,
    path = "/api/categorias/{id}",
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Category not found", body = ErrorResponse),
        (status = 409, description = "Category still has products", body = ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<StatusCode, ApiError> {
    if !categories::delete_by_id_and_owner(&state.db, id, user.user_id).await? {
        return Err(ApiError::not_found("category"));
    }

    info!(user_id = user.user_id, category_id = id, "Deleted category");
    Ok(StatusCode::NO_CONTENT)
}

/// Products listed under one category
#[utoipa::path(
    get,
    path = "/api/categorias/{id}/produtos",
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Products of the category", body = Vec<ProductResponse>),
        (status = 404, description = "Category not found", body = ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn list_category_products(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    if categories::find_by_id_and_owner(&state.db, id, user.user_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("category"));
    }

    let rows = products::find_by_category_and_owner(&state.db, id, user.user_id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}
