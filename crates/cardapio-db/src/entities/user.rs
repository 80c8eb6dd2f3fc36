//! User entity: the tenant that owns categories and products

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// User id (primary key)
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Display name
    pub name: String,

    /// User email (unique)
    #[sea_orm(unique)]
    pub email: String,

    /// Argon2id hash of the login secret, NULL for federated-only accounts
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    /// Whether the account has signed in with Google
    pub google_login: bool,

    /// Google subject identifier
    #[sea_orm(unique)]
    pub google_id: Option<String>,

    /// Whether the account has signed in with Facebook
    pub facebook_login: bool,

    /// Facebook user identifier
    #[sea_orm(unique)]
    pub facebook_id: Option<String>,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// User owns categories
    #[sea_orm(has_many = "super::category::Entity")]
    Categories,

    /// User owns products
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Categories.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
