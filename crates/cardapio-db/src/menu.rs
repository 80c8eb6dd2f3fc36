//! Menu (cardápio) read model
//!
//! Groups one owner's products by category name and splits each group by
//! availability. Categories iterate in ascending name order, items in
//! ascending product id order. Products without a category are left out of
//! the menu.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use sea_orm::ConnectionTrait;
use serde::Serialize;
use tracing::{debug, error};

use crate::entities::product::Model as ProductModel;
use crate::error::RepoResult;
use crate::repository::{products, users};

/// Lightweight product entry shown on the menu
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuItem {
    pub id: i32,
    pub name: String,
    pub price: f64,
    pub quantity: Option<i32>,
    pub description: Option<String>,
}

impl From<&ProductModel> for MenuItem {
    fn from(product: &ProductModel) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            price: product.price().to_f64().unwrap_or_default(),
            quantity: product.quantity,
            description: product.description.clone(),
        }
    }
}

/// Products of one category, split by availability
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MenuBucket {
    pub available: Vec<MenuItem>,
    pub unavailable: Vec<MenuItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Menu {
    pub generated_at: DateTime<Utc>,
    pub categories: BTreeMap<String, MenuBucket>,
    /// Number of products listed across all buckets
    pub total_products: usize,
    /// Display name of the owner
    pub owner: String,
    /// Set when the menu could not be built; the catalog is then empty
    pub error: Option<String>,
}

impl Menu {
    /// Empty menu carrying an error indicator
    pub fn degraded(owner: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            generated_at: Utc::now(),
            categories: BTreeMap::new(),
            total_products: 0,
            owner: owner.into(),
            error: Some(error.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Build the menu for `owner_id`.
///
/// Never fails: any persistence error is logged and reported through
/// [`Menu::error`] with an empty catalog.
pub async fn build_menu<C: ConnectionTrait>(db: &C, owner_id: i32) -> Menu {
    match try_build_menu(db, owner_id).await {
        Ok(menu) => menu,
        Err(e) => {
            error!(owner_id, "Failed to build menu: {}", e);
            Menu::degraded(String::new(), "failed to load menu")
        }
    }
}

async fn try_build_menu<C: ConnectionTrait>(db: &C, owner_id: i32) -> RepoResult<Menu> {
    let owner = users::get(db, owner_id).await?;
    let rows = products::find_all_with_category_for_owner(db, owner_id).await?;

    let mut categories: BTreeMap<String, MenuBucket> = BTreeMap::new();
    let mut total_products = 0;

    for (product, category) in &rows {
        let Some(category) = category else {
            debug!(product_id = product.id, "Skipping product without category");
            continue;
        };

        let bucket = categories.entry(category.name.clone()).or_default();
        if product.available {
            bucket.available.push(MenuItem::from(product));
        } else {
            bucket.unavailable.push(MenuItem::from(product));
        }
        total_products += 1;
    }

    Ok(Menu {
        generated_at: Utc::now(),
        categories,
        total_products,
        owner: owner.name,
        error: None,
    })
}
