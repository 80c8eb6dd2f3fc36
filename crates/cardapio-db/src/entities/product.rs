//! Product entity
//!
//! Prices are fixed-point with two fractional digits and live in the
//! `price_cents` column; use [`Model::price`] to read them as a decimal.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Number of fractional digits kept for prices
pub const PRICE_SCALE: u32 = 2;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    /// Price in cents
    pub price_cents: i64,

    /// Whether the product is currently offered
    pub available: bool,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub quantity: Option<i32>,

    /// Category the product is listed under (same owner)
    pub category_id: Option<i32>,

    /// Owning user
    pub user_id: i32,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

impl Model {
    pub fn price(&self) -> Decimal {
        Decimal::new(self.price_cents, PRICE_SCALE)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_update = "Cascade",
        on_delete = "NoAction"
    )]
    Category,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Owner,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
