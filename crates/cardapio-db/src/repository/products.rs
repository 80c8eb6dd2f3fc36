use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::entities::category::{Entity as Category, Model as CategoryModel};
use crate::entities::product::{
    self, ActiveModel as ProductActive, Entity as Product, Model as ProductModel, PRICE_SCALE,
};
use crate::error::{RepoError, RepoResult};
use crate::repository::categories;

/// Fields of a product being created
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price: Decimal,
    pub available: bool,
    pub description: Option<String>,
    pub quantity: Option<i32>,
    pub category_id: Option<i32>,
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub available: Option<bool>,
    pub description: Option<Option<String>>,
    pub quantity: Option<Option<i32>>,
    pub category_id: Option<Option<i32>>,
}

/// Convert a price to the stored cents, rounding half away from zero to two
/// fractional digits
pub fn price_to_cents(price: Decimal) -> RepoResult<i64> {
    (price.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero)
        * Decimal::ONE_HUNDRED)
        .to_i64()
        .ok_or_else(|| RepoError::Invalid(format!("price {} is out of range", price)))
}

/// A product, only if `owner_id` owns it
pub async fn find_by_id_and_owner<C: ConnectionTrait>(
    db: &C,
    id: i32,
    owner_id: i32,
) -> RepoResult<Option<ProductModel>> {
    Ok(Product::find_by_id(id)
        .filter(product::Column::UserId.eq(owner_id))
        .one(db)
        .await?)
}

/// Products of an owner, by id
pub async fn find_all_for_owner<C: ConnectionTrait>(
    db: &C,
    owner_id: i32,
) -> RepoResult<Vec<ProductModel>> {
    Ok(Product::find()
        .filter(product::Column::UserId.eq(owner_id))
        .order_by_asc(product::Column::Id)
        .all(db)
        .await?)
}

/// All products of an owner paired with their category, ordered by id
pub async fn find_all_with_category_for_owner<C: ConnectionTrait>(
    db: &C,
    owner_id: i32,
) -> RepoResult<Vec<(ProductModel, Option<CategoryModel>)>> {
    Ok(Product::find()
        .find_also_related(Category)
        .filter(product::Column::UserId.eq(owner_id))
        .order_by_asc(product::Column::Id)
        .all(db)
        .await?)
}

/// Products in one of the owner's categories, by id
pub async fn find_by_category_and_owner<C: ConnectionTrait>(
    db: &C,
    category_id: i32,
    owner_id: i32,
) -> RepoResult<Vec<ProductModel>> {
    Ok(Product::find()
        .filter(product::Column::CategoryId.eq(category_id))
        .filter(product::Column::UserId.eq(owner_id))
        .order_by_asc(product::Column::Id)
        .all(db)
        .await?)
}

/// Products marked available, by id
pub async fn find_available_for_owner<C: ConnectionTrait>(
    db: &C,
    owner_id: i32,
) -> RepoResult<Vec<ProductModel>> {
    Ok(Product::find()
        .filter(product::Column::UserId.eq(owner_id))
        .filter(product::Column::Available.eq(true))
        .order_by_asc(product::Column::Id)
        .all(db)
        .await?)
}

/// Case-insensitive name lookup; the lowest id wins when several match
pub async fn find_by_name_for_owner<C: ConnectionTrait>(
    db: &C,
    owner_id: i32,
    name: &str,
) -> RepoResult<Option<ProductModel>> {
    Ok(Product::find()
        .filter(product::Column::UserId.eq(owner_id))
        .filter(Expr::expr(Func::lower(Expr::col(product::Column::Name))).eq(name.to_lowercase()))
        .order_by_asc(product::Column::Id)
        .one(db)
        .await?)
}

pub async fn count_for_owner<C: ConnectionTrait>(db: &C, owner_id: i32) -> RepoResult<u64> {
    Ok(Product::find()
        .filter(product::Column::UserId.eq(owner_id))
        .count(db)
        .await?)
}

pub async fn count_available_for_owner<C: ConnectionTrait>(
    db: &C,
    owner_id: i32,
) -> RepoResult<u64> {
    Ok(Product::find()
        .filter(product::Column::UserId.eq(owner_id))
        .filter(product::Column::Available.eq(true))
        .count(db)
        .await?)
}

/// Products in a category, counted within the owner's rows
pub async fn count_for_category_and_owner<C: ConnectionTrait>(
    db: &C,
    category_id: i32,
    owner_id: i32,
) -> RepoResult<u64> {
    Ok(Product::find()
        .filter(product::Column::CategoryId.eq(category_id))
        .filter(product::Column::UserId.eq(owner_id))
        .count(db)
        .await?)
}

/// Fail with [`RepoError::NotFound`] unless `category_id` belongs to `owner_id`
async fn ensure_category_owned<C: ConnectionTrait>(
    db: &C,
    category_id: i32,
    owner_id: i32,
) -> RepoResult<()> {
    categories::find_by_id_and_owner(db, category_id, owner_id)
        .await?
        .map(|_| ())
        .ok_or(RepoError::NotFound)
}

/// Insert a product for `owner_id`. The category, when given, must belong
/// to the same owner.
pub async fn create<C: ConnectionTrait>(
    db: &C,
    owner_id: i32,
    new_product: NewProduct,
) -> RepoResult<ProductModel> {
    if let Some(category_id) = new_product.category_id {
        ensure_category_owned(db, category_id, owner_id).await?;
    }

    let now = Utc::now();
    let model = ProductActive {
        name: Set(new_product.name),
        price_cents: Set(price_to_cents(new_product.price)?),
        available: Set(new_product.available),
        description: Set(new_product.description),
        quantity: Set(new_product.quantity),
        category_id: Set(new_product.category_id),
        user_id: Set(owner_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    Ok(model.insert(db).await?)
}

/// Apply `changes` to a product owned by `owner_id`
pub async fn save<C: ConnectionTrait>(
    db: &C,
    id: i32,
    owner_id: i32,
    changes: ProductChanges,
) -> RepoResult<ProductModel> {
    let current = find_by_id_and_owner(db, id, owner_id)
        .await?
        .ok_or(RepoError::NotFound)?;

    if let Some(Some(category_id)) = changes.category_id {
        ensure_category_owned(db, category_id, owner_id).await?;
    }

    let mut model: ProductActive = current.into();

    if let Some(name) = changes.name {
        model.name = Set(name);
    }
    if let Some(price) = changes.price {
        model.price_cents = Set(price_to_cents(price)?);
    }
    if let Some(available) = changes.available {
        model.available = Set(available);
    }
    if let Some(description) = changes.description {
        model.description = Set(description);
    }
    if let Some(quantity) = changes.quantity {
        model.quantity = Set(quantity);
    }
    if let Some(category_id) = changes.category_id {
        model.category_id = Set(category_id);
    }
    model.updated_at = Set(Utc::now());

    Ok(model.update(db).await?)
}

/// Returns whether a row was removed
pub async fn delete_by_id_and_owner<C: ConnectionTrait>(
    db: &C,
    id: i32,
    owner_id: i32,
) -> RepoResult<bool> {
    let result = Product::delete_many()
        .filter(product::Column::Id.eq(id))
        .filter(product::Column::UserId.eq(owner_id))
        .exec(db)
        .await?;

    Ok(result.rows_affected > 0)
}
