use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use tracing::debug;

use crate::entities::category::{
    self, ActiveModel as CategoryActive, Entity as Category, Model as CategoryModel,
};
use crate::entities::product::{self, Entity as Product};
use crate::error::{RepoError, RepoResult};

/// Fields of a category being created
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

/// A category, only if `owner_id` owns it
pub async fn find_by_id_and_owner<C: ConnectionTrait>(
    db: &C,
    id: i32,
    owner_id: i32,
) -> RepoResult<Option<CategoryModel>> {
    Ok(Category::find_by_id(id)
        .filter(category::Column::UserId.eq(owner_id))
        .one(db)
        .await?)
}

/// Categories of an owner, by name
pub async fn find_all_for_owner<C: ConnectionTrait>(
    db: &C,
    owner_id: i32,
) -> RepoResult<Vec<CategoryModel>> {
    Ok(Category::find()
        .filter(category::Column::UserId.eq(owner_id))
        .order_by_asc(category::Column::Name)
        .all(db)
        .await?)
}

/// Advisory check; the unique index on `(user_id, name)` is what actually
/// guarantees uniqueness.
pub async fn exists_by_name_for_owner<C: ConnectionTrait>(
    db: &C,
    owner_id: i32,
    name: &str,
) -> RepoResult<bool> {
    Ok(Category::find()
        .filter(category::Column::UserId.eq(owner_id))
        .filter(category::Column::Name.eq(name))
        .count(db)
        .await?
        > 0)
}

pub async fn count_for_owner<C: ConnectionTrait>(db: &C, owner_id: i32) -> RepoResult<u64> {
    Ok(Category::find()
        .filter(category::Column::UserId.eq(owner_id))
        .count(db)
        .await?)
}

/// Number of products per category id for one owner
pub async fn product_counts_for_owner<C: ConnectionTrait>(
    db: &C,
    owner_id: i32,
) -> RepoResult<HashMap<i32, u64>> {
    let rows: Vec<(Option<i32>, i64)> = Product::find()
        .select_only()
        .column(product::Column::CategoryId)
        .column_as(product::Column::Id.count(), "product_count")
        .filter(product::Column::UserId.eq(owner_id))
        .filter(product::Column::CategoryId.is_not_null())
        .group_by(product::Column::CategoryId)
        .into_tuple()
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(category_id, count)| category_id.map(|id| (id, count.max(0) as u64)))
        .collect())
}

/// Insert a category for `owner_id`. A name already used by this owner
/// yields [`RepoError::Conflict`], including when two inserts race.
pub async fn create<C: ConnectionTrait>(
    db: &C,
    owner_id: i32,
    new_category: NewCategory,
) -> RepoResult<CategoryModel> {
    let now = Utc::now();

    let model = CategoryActive {
        name: Set(new_category.name),
        description: Set(new_category.description),
        user_id: Set(owner_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    model.insert(db).await.map_err(|e| match RepoError::from(e) {
        RepoError::Conflict(_) => RepoError::Conflict("category name already in use".to_string()),
        other => other,
    })
}

/// Apply `changes` to a category owned by `owner_id`
pub async fn save<C: ConnectionTrait>(
    db: &C,
    id: i32,
    owner_id: i32,
    changes: CategoryChanges,
) -> RepoResult<CategoryModel> {
    let current = find_by_id_and_owner(db, id, owner_id)
        .await?
        .ok_or(RepoError::NotFound)?;

    let mut model: CategoryActive = current.into();

    if let Some(name) = changes.name {
        model.name = Set(name);
    }
    if let Some(description) = changes.description {
        model.description = Set(description);
    }
    model.updated_at = Set(Utc::now());

    model.update(db).await.map_err(|e| match RepoError::from(e) {
        RepoError::Conflict(_) => RepoError::Conflict("category name already in use".to_string()),
        other => other,
    })
}

/// Delete a category owned by `owner_id`.
///
/// Returns `Ok(false)` when nothing matched. A category that still has
/// products is not deleted: the call fails with [`RepoError::Conflict`].
pub async fn delete_by_id_and_owner<C: ConnectionTrait>(
    db: &C,
    id: i32,
    owner_id: i32,
) -> RepoResult<bool> {
    let Some(existing) = find_by_id_and_owner(db, id, owner_id).await? else {
        return Ok(false);
    };

    let products = Product::find()
        .filter(product::Column::CategoryId.eq(existing.id))
        .count(db)
        .await?;
    if products > 0 {
        debug!(category_id = id, products, "Refusing to delete non-empty category");
        return Err(RepoError::Conflict(format!(
            "category still has {} product(s)",
            products
        )));
    }

    // The NO ACTION foreign key still rejects a product inserted meanwhile
    let result = Category::delete_many()
        .filter(category::Column::Id.eq(existing.id))
        .filter(category::Column::UserId.eq(owner_id))
        .exec(db)
        .await
        .map_err(|e| match RepoError::from(e) {
            RepoError::Conflict(_) => RepoError::Conflict("category still has products".to_string()),
            other => other,
        })?;

    Ok(result.rows_affected > 0)
}
